//! Quart server generator.
//!
//! Synthesizes a complete server module from route descriptors: forwarded
//! imports, the app bootstrap, one GET handler per route and the run footer.

use crate::introspect::validate_routes;
use crate::types::{Param, RouteDescriptor, SpyltResult, WireType};

/// Generate the server module source.
pub fn emit(routes: &[RouteDescriptor], imports: &[String]) -> SpyltResult<String> {
    validate_routes(routes)?;

    let uses = |ty: WireType| {
        routes
            .iter()
            .flat_map(|r| &r.params)
            .any(|p| p.wire_type == Some(ty))
    };
    let uses_tables = uses(WireType::Table);
    let uses_bools = uses(WireType::Boolean);

    let mut out = String::new();

    // Imports
    for import in imports {
        out.push_str(import);
        out.push('\n');
    }
    out.push_str("from quart import Quart, request\n");
    out.push_str("from quart_cors import cors\n");
    if uses_tables {
        out.push_str("import json as _json\n");
        out.push_str("import pandas as _pd\n");
    }

    // Bootstrap
    out.push_str(
        r#"
app = Quart(__name__)
app = cors(app, allow_origin="*")
"#,
    );

    if uses_bools {
        out.push_str(
            r#"

def _as_bool(value):
    return value.lower() in ("1", "true", "yes", "on")
"#,
        );
    }

    out.push_str(
        r#"

@app.route("/")
async def root_():
    with open("index.html", encoding="utf-8") as fh:
        return fh.read()
"#,
    );

    // Handlers
    for route in routes {
        out.push_str("\n\n");
        out.push_str(&handler(route));
    }

    out.push_str("\n\napp.run()\n");

    tracing::info!("Emitted server with {} route(s)", routes.len());
    Ok(out)
}

/// One route handler: registration, decoding prologue, rewritten body.
fn handler(route: &RouteDescriptor) -> String {
    let indent = route.indent();
    let mut out = format!(
        "@app.route(\"/api/{name}\")\nasync def {name}():\n",
        name = route.name
    );
    for param in &route.params {
        out.push_str(indent);
        out.push_str(&format!("{} = {}\n", param.name, decode_expr(param)));
    }
    if route.body.is_empty() {
        out.push_str(indent);
        out.push_str("return {\"response\": None}\n");
    }
    for line in &route.body {
        out.push_str(line);
    }
    out
}

/// Expression reading `param` from the querystring as its declared type.
pub fn decode_expr(param: &Param) -> String {
    let key = &param.name;
    let default = param.default.as_deref();
    match param.wire_type {
        Some(WireType::List) => match default {
            Some(d) => format!("request.args.getlist('{key}') or {d}"),
            None => format!("request.args.getlist('{key}')"),
        },
        Some(WireType::Table) => match default {
            Some(d) => format!(
                "_pd.DataFrame(_json.loads(request.args['{key}'])) \
                 if '{key}' in request.args else {d}"
            ),
            None => format!("_pd.DataFrame(_json.loads(request.args.get('{key}', '[]')))"),
        },
        ty => {
            let caster = match ty {
                Some(WireType::Integer) => "int",
                Some(WireType::Boolean) => "_as_bool",
                _ => "str",
            };
            match default {
                Some(d) => format!("request.args.get('{key}', default={d}, type={caster})"),
                None => format!("request.args.get('{key}', type={caster})"),
            }
        }
    }
}
