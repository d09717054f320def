//! Module bindings: a Svelte component plus its props and backend routes.
//!
//! A [`Module`] is built either explicitly through its registration methods
//! or by [`Module::load`], which reads the binding straight out of the
//! backend file's syntax tree instead of executing it.

use std::path::{Path, PathBuf};

use rustpython_parser::ast;
use serde_json::{Map, Number, Value};

use crate::emit::emit;
use crate::interface::{create_interface, Interface};
use crate::introspect::extract;
use crate::linker::create_linker;
use crate::pointer::Pointer;
use crate::source::{FunctionDef, SourceFile};
use crate::types::{Extraction, SpyltError, SpyltResult};

/// Decorator names that register a function with a binding, as in `@interop(app)`.
const REGISTER_DECORATORS: &[&str] = &["interop", "interopable"];

/// A Svelte component bound to Python backend functions.
#[derive(Debug, Clone)]
pub struct Module {
    component: String,
    backend: PathBuf,
    props: Map<String, Value>,
    routes: Vec<String>,
}

impl Module {
    /// Bind `component` (as imported by the linker) to functions in `backend`.
    pub fn new(component: impl Into<String>, backend: impl Into<PathBuf>) -> Self {
        Self {
            component: component.into(),
            backend: backend.into(),
            props: Map::new(),
            routes: Vec::new(),
        }
    }

    /// Set one initial prop. A repeated key keeps its first position.
    pub fn add_prop(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.props.insert(key.into(), value.into());
        self
    }

    pub fn add_props<I, K, V>(&mut self, props: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (key, value) in props {
            self.add_prop(key, value);
        }
        self
    }

    /// Register a backend function by name. Duplicates are ignored.
    pub fn add_route(&mut self, name: impl Into<String>) -> &mut Self {
        let name = name.into();
        if !self.routes.contains(&name) {
            self.routes.push(name);
        }
        self
    }

    pub fn set_apis<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.add_route(name);
        }
        self
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn backend(&self) -> &Path {
        &self.backend
    }

    pub fn props(&self) -> &Map<String, Value> {
        &self.props
    }

    pub fn routes(&self) -> &[String] {
        &self.routes
    }

    /// Entry module mounting the component with its props.
    pub fn create_linker(&self) -> String {
        create_linker(&self.component, &self.props)
    }

    /// Route descriptors and forwarded imports for the registered functions.
    pub fn extract(&self) -> SpyltResult<Extraction> {
        let source = SourceFile::read(&self.backend)?;
        extract(&self.routes, &source)
    }

    /// Quart server source for the registered functions.
    pub fn create_api(&self) -> SpyltResult<String> {
        let extraction = self.extract()?;
        emit(&extraction.routes, &extraction.imports)
    }

    /// JavaScript interface for the registered functions.
    pub fn create_interface(&self) -> SpyltResult<Interface> {
        let extraction = self.extract()?;
        create_interface(&extraction.routes)
    }

    /// Read the module named by `pointer`, resolving paths against `root`.
    pub fn load(pointer: &Pointer, root: &Path) -> SpyltResult<Self> {
        let backend = root.join(&pointer.backend);
        let source = SourceFile::read(&backend)?;
        let module = Self::from_source(&source, &pointer.binding)?;

        let component = root.join(&module.component);
        if !component.exists() {
            return Err(SpyltError::ComponentNotFound(component));
        }

        tracing::info!(
            "Loaded module '{}' ({} prop(s), {} route(s))",
            pointer.binding,
            module.props.len(),
            module.routes.len()
        );
        Ok(module)
    }

    /// Scan a parsed backend file for everything registered on `binding`.
    pub fn from_source(source: &SourceFile, binding: &str) -> SpyltResult<Self> {
        let mut module: Option<Self> = None;
        let mut props = Vec::new();
        let mut routes = Vec::new();

        for stmt in source.statements() {
            if let Some(def) = FunctionDef::from_stmt(stmt) {
                if def.decorators.iter().any(|d| registers(d, binding)) {
                    routes.push(def.name.to_string());
                }
                continue;
            }
            match stmt {
                ast::Stmt::Assign(assign) => {
                    let targets_binding = assign.targets.iter().any(|t| is_name(t, binding));
                    if let Some(component) = required_component(&assign.value) {
                        if targets_binding {
                            module = Some(Self::new(component, source.path()));
                        }
                    }
                }
                ast::Stmt::Expr(expr) => {
                    let ast::Expr::Call(call) = expr.value.as_ref() else {
                        continue;
                    };
                    match method_on(&call.func, binding) {
                        Some("add_props") => {
                            for keyword in &call.keywords {
                                props.push(prop_from_keyword(keyword, source)?);
                            }
                        }
                        Some("set_apis") => routes.extend(call.args.iter().filter_map(name_of)),
                        _ if is_name(&call.func, binding) => {
                            routes.extend(call.args.iter().filter_map(name_of))
                        }
                        _ => {}
                    }
                }
                _ => {}
            }
        }

        let mut module = module.ok_or_else(|| SpyltError::BindingNotFound {
            binding: binding.to_string(),
            path: source.path().to_path_buf(),
        })?;
        module.add_props(props);
        module.set_apis(routes);
        Ok(module)
    }
}

fn name_of(expr: &ast::Expr) -> Option<String> {
    match expr {
        ast::Expr::Name(name) => Some(name.id.as_str().to_string()),
        _ => None,
    }
}

fn is_name(expr: &ast::Expr, name: &str) -> bool {
    matches!(expr, ast::Expr::Name(n) if n.id.as_str() == name)
}

/// `binding.method` → `Some("method")`.
fn method_on<'a>(expr: &'a ast::Expr, binding: &str) -> Option<&'a str> {
    match expr {
        ast::Expr::Attribute(attr) if is_name(&attr.value, binding) => Some(attr.attr.as_str()),
        _ => None,
    }
}

/// The path passed to `require_svelte("...")`, if `expr` is such a call.
fn required_component(expr: &ast::Expr) -> Option<String> {
    let ast::Expr::Call(call) = expr else {
        return None;
    };
    let callee = match call.func.as_ref() {
        ast::Expr::Name(name) => name.id.as_str(),
        ast::Expr::Attribute(attr) => attr.attr.as_str(),
        _ => return None,
    };
    if callee != "require_svelte" {
        return None;
    }
    match call.args.first()? {
        ast::Expr::Constant(c) => match &c.value {
            ast::Constant::Str(path) => Some(path.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// Whether a decorator registers its function on `binding`.
fn registers(decorator: &ast::Expr, binding: &str) -> bool {
    match decorator {
        // @app
        ast::Expr::Name(_) => is_name(decorator, binding),
        // @app.backend
        ast::Expr::Attribute(_) => method_on(decorator, binding) == Some("backend"),
        ast::Expr::Call(call) => {
            // @app.backend()
            if method_on(&call.func, binding) == Some("backend") {
                return true;
            }
            // @interop(app)
            let callee = match call.func.as_ref() {
                ast::Expr::Name(name) => name.id.as_str(),
                ast::Expr::Attribute(attr) => attr.attr.as_str(),
                _ => return false,
            };
            REGISTER_DECORATORS.contains(&callee)
                && call.args.first().is_some_and(|a| is_name(a, binding))
        }
        _ => false,
    }
}

fn prop_from_keyword(keyword: &ast::Keyword, source: &SourceFile) -> SpyltResult<(String, Value)> {
    let Some(key) = &keyword.arg else {
        return Err(SpyltError::UnsupportedProp {
            key: "**".to_string(),
            reason: "props must be passed as explicit keywords".to_string(),
        });
    };
    let key = key.as_str().to_string();
    let value = literal_value(&keyword.value, source).map_err(|reason| {
        SpyltError::UnsupportedProp {
            key: key.clone(),
            reason,
        }
    })?;
    Ok((key, value))
}

/// Convert a Python literal expression to a JSON value.
fn literal_value(expr: &ast::Expr, source: &SourceFile) -> Result<Value, String> {
    match expr {
        ast::Expr::Constant(c) => match &c.value {
            ast::Constant::None => Ok(Value::Null),
            ast::Constant::Bool(b) => Ok(Value::Bool(*b)),
            ast::Constant::Str(s) => Ok(Value::String(s.clone())),
            ast::Constant::Float(f) => Number::from_f64(*f)
                .map(Value::Number)
                .ok_or_else(|| format!("{f} is not a finite number")),
            ast::Constant::Int(_) => number_from_text(source.text_of(expr)),
            _ => Err(format!("unsupported literal `{}`", source.text_of(expr))),
        },
        // Negative numbers parse as a unary minus applied to a constant.
        ast::Expr::UnaryOp(_) => number_from_text(source.text_of(expr)),
        ast::Expr::List(list) => list
            .elts
            .iter()
            .map(|e| literal_value(e, source))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        ast::Expr::Tuple(tuple) => tuple
            .elts
            .iter()
            .map(|e| literal_value(e, source))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        ast::Expr::Dict(dict) => {
            let mut map = Map::new();
            for (key, value) in dict.keys.iter().zip(&dict.values) {
                let key = match key.as_ref().map(|k| literal_value(k, source)) {
                    Some(Ok(Value::String(key))) => key,
                    _ => return Err("dictionary keys must be strings".to_string()),
                };
                map.insert(key, literal_value(value, source)?);
            }
            Ok(Value::Object(map))
        }
        _ => Err(format!(
            "`{}` is not a literal value",
            source.text_of(expr)
        )),
    }
}

fn number_from_text(text: &str) -> Result<Value, String> {
    let cleaned: String = text.chars().filter(|c| *c != '_' && !c.is_whitespace()).collect();
    if let Ok(n) = cleaned.parse::<i64>() {
        return Ok(Value::from(n));
    }
    if let Ok(n) = cleaned.parse::<u64>() {
        return Ok(Value::from(n));
    }
    cleaned
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| format!("`{text}` is not a supported number"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const APP_PY: &str = r#"import requests
from spylt import require_svelte, interop

app = require_svelte("./src/App.svelte")
other = require_svelte("./src/Other.svelte")

app.add_props(text="Pooping...", age=5)
app.add_props(text="Replaced", tags=["a", "b"], nested={"on": True, "ratio": -0.5})
other.add_props(ignored=1)


@app.backend()
def say_hello(name: str) -> str:
    """Says hello to the user"""
    return f"Hello {name}"


@interop(app)
def say_hi() -> str:
    return "Hello world!"


@other.backend()
def not_mine(x: int) -> int:
    return x


def plain(q: str) -> str:
    return requests.get(q).text


app.set_apis(plain)
app(say_hello)
"#;

    fn parse(text: &str) -> SourceFile {
        SourceFile::parse("src/App.py", text).unwrap()
    }

    #[test]
    fn reads_binding_props_and_routes() {
        let module = Module::from_source(&parse(APP_PY), "app").unwrap();
        assert_eq!(module.component(), "./src/App.svelte");
        assert_eq!(module.backend(), Path::new("src/App.py"));
        assert_eq!(module.routes(), ["say_hello", "say_hi", "plain"]);
        assert_eq!(
            Value::Object(module.props().clone()),
            json!({
                "text": "Replaced",
                "age": 5,
                "tags": ["a", "b"],
                "nested": {"on": true, "ratio": -0.5}
            })
        );
        let keys: Vec<_> = module.props().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["text", "age", "tags", "nested"]);
    }

    const DECORATED_PY: &str = r#"import spylt
from spylt import interopable

app = spylt.require_svelte("./src/App.svelte")


@app.backend
def first(a: int) -> int:
    return a


@app
def second(a: int) -> int:
    return a


@interopable(app)
async def third(a: int) -> int:
    return a


@app.backend()
def fourth(a: int) -> int:
    return a


@interopable(other)
def foreign(a: int) -> int:
    return a
"#;

    #[test]
    fn every_decorator_form_registers_in_source_order() {
        let module = Module::from_source(&parse(DECORATED_PY), "app").unwrap();
        assert_eq!(module.component(), "./src/App.svelte");
        assert_eq!(module.routes(), ["first", "second", "third", "fourth"]);
    }

    #[test]
    fn other_bindings_are_independent() {
        let module = Module::from_source(&parse(APP_PY), "other").unwrap();
        assert_eq!(module.component(), "./src/Other.svelte");
        assert_eq!(module.routes(), ["not_mine"]);
        assert_eq!(module.props().len(), 1);
    }

    #[test]
    fn missing_binding_is_reported() {
        let err = Module::from_source(&parse(APP_PY), "nope").unwrap_err();
        assert!(matches!(err, SpyltError::BindingNotFound { binding, .. } if binding == "nope"));
    }

    #[test]
    fn non_literal_props_are_rejected() {
        let source = parse(
            "from spylt import require_svelte\napp = require_svelte(\"./App.svelte\")\napp.add_props(now=time.time())\n",
        );
        let err = Module::from_source(&source, "app").unwrap_err();
        assert!(matches!(err, SpyltError::UnsupportedProp { key, .. } if key == "now"));
    }

    #[test]
    fn builder_registration() {
        let mut module = Module::new("./App.svelte", "App.py");
        module
            .add_prop("text", "hi")
            .add_props([("age", json!(5)), ("text", json!("bye"))])
            .add_route("a")
            .set_apis(["b", "a"]);
        assert_eq!(module.routes(), ["a", "b"]);
        assert_eq!(Value::Object(module.props().clone()), json!({"text": "bye", "age": 5}));
        assert!(module.create_linker().contains("text: \"bye\",\n      age: 5"));
    }

    #[test]
    fn load_checks_component_and_builds_api() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/App.py"), APP_PY).unwrap();

        let pointer = Pointer {
            backend: PathBuf::from("./src/App.py"),
            binding: "app".into(),
        };
        let err = Module::load(&pointer, dir.path()).unwrap_err();
        assert!(matches!(err, SpyltError::ComponentNotFound(_)));

        std::fs::write(dir.path().join("src/App.svelte"), "<!-- point ./src/App.py:app -->\n").unwrap();
        let module = Module::load(&pointer, dir.path()).unwrap();
        let api = module.create_api().unwrap();
        assert!(api.starts_with("import requests\n"));
        assert!(api.contains("@app.route(\"/api/say_hi\")"));
        assert!(api.contains("    return {\"response\": requests.get(q).text}\n"));

        let iface = module.create_interface().unwrap();
        assert!(iface.source.contains("export function plain(q)"));
    }
}
