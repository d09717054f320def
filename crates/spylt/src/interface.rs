//! Typed JavaScript client for the generated API.
//!
//! Each route becomes an exported function documented with JSDoc that calls
//! the page-global `fetchSync` helper and unwraps `response`.

use crate::introspect::validate_routes;
use crate::types::{Param, RouteDescriptor, SpyltResult, WireType};

/// A generated interface module.
#[derive(Debug, Clone)]
pub struct Interface {
    pub source: String,
    /// True when a route takes or returns a dataframe.
    pub uses_tables: bool,
}

/// Generate the JavaScript interface for `routes`.
pub fn create_interface(routes: &[RouteDescriptor]) -> SpyltResult<Interface> {
    validate_routes(routes)?;

    let functions: Vec<String> = routes.iter().map(js_function).collect();
    let uses_tables = routes.iter().any(|r| {
        r.return_type == Some(WireType::Table)
            || r.params.iter().any(|p| p.wire_type == Some(WireType::Table))
    });

    let mut source = functions.join("\n\n");
    source.push('\n');
    Ok(Interface {
        source,
        uses_tables,
    })
}

fn js_function(route: &RouteDescriptor) -> String {
    let mut out = String::from("/**\n");
    let doc = route.docstring.as_deref().unwrap_or(&route.name);
    for line in doc.lines() {
        if line.is_empty() {
            out.push_str(" *\n");
        } else {
            out.push_str(&format!(" * {}\n", line.replace("*/", "*\\/")));
        }
    }
    for param in &route.params {
        let ty = param.wire_type.map_or("any", |t| t.js_type());
        out.push_str(&format!(" * @param {{{ty}}} {}\n", param.name));
    }
    let returns = route.return_type.map_or("any", |t| t.js_type());
    out.push_str(&format!(" * @returns {{{returns}}}\n */\n"));

    let args: Vec<&str> = route.params.iter().map(|p| p.name.as_str()).collect();
    let query: Vec<String> = route.params.iter().map(query_part).collect();
    let url = if query.is_empty() {
        format!("/api/{}", route.name)
    } else {
        format!("/api/{}?{}", route.name, query.join("&"))
    };

    out.push_str(&format!(
        "export function {}({}) {{\n    const res = fetchSync(`{url}`)\n    return res.response\n}}",
        route.name,
        args.join(", ")
    ));
    out
}

/// Querystring fragment for one parameter, inside a template literal.
fn query_part(param: &Param) -> String {
    let name = &param.name;
    match param.wire_type {
        Some(WireType::List) => {
            format!("${{{name}.map((v) => `{name}=${{encodeURIComponent(v)}}`).join('&')}}")
        }
        Some(WireType::Table) => {
            format!("{name}=${{encodeURIComponent(JSON.stringify({name}))}}")
        }
        _ => format!("{name}=${{encodeURIComponent({name})}}"),
    }
}
