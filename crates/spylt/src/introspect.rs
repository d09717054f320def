//! Introspector: turns backend functions into route descriptors.
//!
//! Works from the parsed syntax tree: parameters come from the real
//! parameter list, and every `return` owned by a function is rewritten at
//! its exact position so the generated handler answers with
//! `{"response": <value>}`.

use rustpython_parser::ast::{self, Ranged};

use crate::source::{FunctionDef, SourceFile};
use crate::types::{Extraction, Param, RouteDescriptor, SpyltError, SpyltResult, WireType};

/// Module roots that belong to the tool or the caller's own package and are
/// never forwarded to the generated server.
const LOCAL_ROOTS: &[&str] = &["spylt", "src", "__future__"];

/// Extract route descriptors for `functions` and the third-party imports of `source`.
pub fn extract<S: AsRef<str>>(functions: &[S], source: &SourceFile) -> SpyltResult<Extraction> {
    let imports = third_party_imports(source);

    let mut routes = Vec::with_capacity(functions.len());
    for name in functions {
        let name = name.as_ref();
        let def = source
            .function(name)
            .ok_or_else(|| SpyltError::FunctionNotFound(name.to_string()))?;
        routes.push(describe(&def, source));
    }

    validate_routes(&routes)?;

    tracing::info!(
        "Extracted {} route(s) and {} import(s) from {}",
        routes.len(),
        imports.len(),
        source.path().display()
    );
    Ok(Extraction { routes, imports })
}

/// Check that there is something to emit and that every parameter is typed.
pub fn validate_routes(routes: &[RouteDescriptor]) -> SpyltResult<()> {
    if routes.is_empty() {
        return Err(SpyltError::NoRoutesDefined);
    }
    for route in routes {
        if route.unresolved_params().next().is_some() {
            return Err(SpyltError::TypesNotDefined {
                function: route.name.clone(),
                params: route.params.iter().map(|p| p.name.clone()).collect(),
            });
        }
    }
    Ok(())
}

/// Build the descriptor for one function.
pub fn describe(def: &FunctionDef<'_>, source: &SourceFile) -> RouteDescriptor {
    let return_type = def
        .returns
        .and_then(|expr| WireType::from_annotation(source.text_of(expr)));

    RouteDescriptor {
        name: def.name.to_string(),
        params: params(def, source),
        return_type,
        docstring: docstring(def.body),
        body: rewrite_body(def, return_type, source),
    }
}

fn params(def: &FunctionDef<'_>, source: &SourceFile) -> Vec<Param> {
    let args = def.args;

    if let Some(vararg) = &args.vararg {
        tracing::warn!(
            "{}(): *{} cannot be read from a querystring and is skipped",
            def.name,
            vararg.arg.as_str()
        );
    }
    if let Some(kwarg) = &args.kwarg {
        tracing::warn!(
            "{}(): **{} cannot be read from a querystring and is skipped",
            def.name,
            kwarg.arg.as_str()
        );
    }

    args.posonlyargs
        .iter()
        .chain(&args.args)
        .chain(&args.kwonlyargs)
        .map(|arg| {
            let annotation = arg
                .def
                .annotation
                .as_deref()
                .map(|expr| source.text_of(expr).to_string());
            Param {
                name: arg.def.arg.as_str().to_string(),
                wire_type: annotation.as_deref().and_then(WireType::from_annotation),
                annotation,
                default: arg
                    .default
                    .as_deref()
                    .map(|expr| source.text_of(expr).to_string()),
            }
        })
        .collect()
}

fn docstring(body: &[ast::Stmt]) -> Option<String> {
    let ast::Stmt::Expr(stmt) = body.first()? else {
        return None;
    };
    let ast::Expr::Constant(constant) = stmt.value.as_ref() else {
        return None;
    };
    let ast::Constant::Str(text) = &constant.value else {
        return None;
    };
    let cleaned = text
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();
    Some(cleaned)
}

/// Collect the `return` statements a function owns, skipping nested scopes.
fn collect_returns<'a>(body: &'a [ast::Stmt], out: &mut Vec<&'a ast::StmtReturn>) {
    for stmt in body {
        match stmt {
            ast::Stmt::Return(ret) => out.push(ret),
            ast::Stmt::If(s) => {
                collect_returns(&s.body, out);
                collect_returns(&s.orelse, out);
            }
            ast::Stmt::For(s) => {
                collect_returns(&s.body, out);
                collect_returns(&s.orelse, out);
            }
            ast::Stmt::AsyncFor(s) => {
                collect_returns(&s.body, out);
                collect_returns(&s.orelse, out);
            }
            ast::Stmt::While(s) => {
                collect_returns(&s.body, out);
                collect_returns(&s.orelse, out);
            }
            ast::Stmt::With(s) => collect_returns(&s.body, out),
            ast::Stmt::AsyncWith(s) => collect_returns(&s.body, out),
            ast::Stmt::Try(s) => {
                collect_returns(&s.body, out);
                collect_handler_returns(&s.handlers, out);
                collect_returns(&s.orelse, out);
                collect_returns(&s.finalbody, out);
            }
            ast::Stmt::TryStar(s) => {
                collect_returns(&s.body, out);
                collect_handler_returns(&s.handlers, out);
                collect_returns(&s.orelse, out);
                collect_returns(&s.finalbody, out);
            }
            ast::Stmt::Match(s) => {
                for case in &s.cases {
                    collect_returns(&case.body, out);
                }
            }
            _ => {}
        }
    }
}

#[allow(irrefutable_let_patterns)]
fn collect_handler_returns<'a>(
    handlers: &'a [ast::ExceptHandler],
    out: &mut Vec<&'a ast::StmtReturn>,
) {
    for handler in handlers {
        if let ast::ExceptHandler::ExceptHandler(handler) = handler {
            collect_returns(&handler.body, out);
        }
    }
}

/// Wrap a returned expression in the response shape.
pub fn wrap_response(expr: &str, return_type: Option<WireType>) -> String {
    match return_type {
        Some(WireType::Table) => format!(
            "{{\"response\": (__frame := {expr}).to_dict(orient=\"records\"), \
             \"table\": __frame.to_html()}}"
        ),
        _ => format!("{{\"response\": {expr}}}"),
    }
}

fn needs_parens(value: &ast::Expr) -> bool {
    matches!(
        value,
        ast::Expr::Tuple(_)
            | ast::Expr::NamedExpr(_)
            | ast::Expr::Yield(_)
            | ast::Expr::YieldFrom(_)
    )
}

/// Body lines of `def` with every owned `return` rewritten.
fn rewrite_body(
    def: &FunctionDef<'_>,
    return_type: Option<WireType>,
    source: &SourceFile,
) -> Vec<String> {
    let (Some(first), Some(last)) = (def.body.first(), def.body.last()) else {
        return Vec::new();
    };

    let body_start = usize::from(first.start());
    let mut region_start = source.line_start(body_start);
    let mut prefix = "";
    if !source.text()[region_start..body_start].trim().is_empty() {
        // `def f(): return x` keeps its body on the header line.
        region_start = body_start;
        prefix = "    ";
    }
    let region_end = source.line_end(usize::from(last.end()));

    let mut returns = Vec::new();
    collect_returns(def.body, &mut returns);

    let mut edits: Vec<(usize, usize, String)> = returns
        .iter()
        .map(|ret| match &ret.value {
            Some(value) => {
                let mut expr = source.text_of(value.as_ref()).to_string();
                // Node ranges exclude enclosing parentheses, and these forms
                // are not valid as a bare dict value.
                if needs_parens(value) {
                    expr = format!("({expr})");
                }
                (
                    usize::from(value.start()),
                    usize::from(value.end()),
                    wrap_response(&expr, return_type),
                )
            }
            None => (
                usize::from(ret.range.start()),
                usize::from(ret.range.end()),
                format!("return {}", wrap_response("None", None)),
            ),
        })
        .collect();
    edits.sort_by(|a, b| b.0.cmp(&a.0));

    let mut region = source.text()[region_start..region_end].to_string();
    for (start, end, replacement) in edits {
        region.replace_range(start - region_start..end - region_start, &replacement);
    }
    if !region.ends_with('\n') {
        region.push('\n');
    }

    tracing::debug!("{}(): rewrote {} return(s)", def.name, returns.len());

    region
        .split_inclusive('\n')
        .enumerate()
        .map(|(i, line)| {
            if i == 0 {
                format!("{prefix}{line}")
            } else {
                line.to_string()
            }
        })
        .collect()
}

/// Top-level imports of third-party modules, normalised: plain imports
/// first, then `from` imports, each sorted and de-duplicated.
pub fn third_party_imports(source: &SourceFile) -> Vec<String> {
    let mut plain = Vec::new();
    let mut from = Vec::new();

    for stmt in source.statements() {
        match stmt {
            ast::Stmt::Import(import) => {
                if import
                    .names
                    .iter()
                    .any(|alias| is_local(alias.name.as_str()))
                {
                    continue;
                }
                plain.push(source.text_of(stmt).trim().to_string());
            }
            ast::Stmt::ImportFrom(import) => {
                let text = source.text_of(stmt).trim();
                let relative = text
                    .strip_prefix("from")
                    .is_some_and(|rest| rest.trim_start().starts_with('.'));
                let module = import.module.as_ref().map_or("", |m| m.as_str());
                if relative || is_local(module) {
                    continue;
                }
                from.push(text.to_string());
            }
            _ => {}
        }
    }

    plain.sort();
    plain.dedup();
    from.sort();
    from.dedup();
    plain.extend(from);
    plain
}

fn is_local(module: &str) -> bool {
    let root = module.split('.').next().unwrap_or(module);
    LOCAL_ROOTS.contains(&root)
}
