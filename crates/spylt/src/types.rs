//! Core data types shared by the introspector, emitter and linker.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Wire type a route parameter is decoded as.
///
/// This is a closed set: anything not listed here cannot be carried over a
/// querystring by the generated server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireType {
    String,
    Integer,
    Boolean,
    List,
    Table,
}

/// Annotation spellings that resolve to a wire type.
const TYPE_TABLE: &[(&str, WireType)] = &[
    ("str", WireType::String),
    ("int", WireType::Integer),
    ("bool", WireType::Boolean),
    ("list", WireType::List),
    ("List", WireType::List),
    ("typing.List", WireType::List),
    ("DataFrame", WireType::Table),
    ("pd.DataFrame", WireType::Table),
    ("pandas.DataFrame", WireType::Table),
];

impl WireType {
    /// Resolve a Python annotation (as written in source) to a wire type.
    ///
    /// Subscripted generics resolve by their base, so `list[str]` is a list.
    pub fn from_annotation(annotation: &str) -> Option<Self> {
        let text = annotation.trim().trim_matches(|c| c == '"' || c == '\'');
        let base = text.split('[').next().unwrap_or(text).trim();
        TYPE_TABLE
            .iter()
            .find(|(name, _)| *name == base)
            .map(|(_, ty)| *ty)
    }

    /// JSDoc type name used by the generated interface.
    pub fn js_type(&self) -> &'static str {
        match self {
            WireType::String => "string",
            WireType::Integer => "number",
            WireType::Boolean => "boolean",
            WireType::List => "any[]",
            WireType::Table => "object[]",
        }
    }
}

/// One parameter of a backend function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    /// Annotation text exactly as written, if any.
    pub annotation: Option<String>,
    pub wire_type: Option<WireType>,
    /// Default value as Python source text.
    pub default: Option<String>,
}

impl Param {
    /// A parameter with a resolved type and no default.
    pub fn typed(name: &str, wire_type: WireType) -> Self {
        Self {
            name: name.to_string(),
            annotation: None,
            wire_type: Some(wire_type),
            default: None,
        }
    }
}

/// Extracted metadata for one backend function destined to become an HTTP endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDescriptor {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<WireType>,
    pub docstring: Option<String>,
    /// Function body lines with every `return` already rewritten.
    pub body: Vec<String>,
}

impl RouteDescriptor {
    /// Indentation of the body, used for the decoding prologue.
    pub fn indent(&self) -> &str {
        self.body
            .iter()
            .find(|line| !line.trim().is_empty())
            .map(|line| &line[..line.len() - line.trim_start().len()])
            .filter(|indent| !indent.is_empty())
            .unwrap_or("    ")
    }

    pub fn unresolved_params(&self) -> impl Iterator<Item = &Param> {
        self.params.iter().filter(|p| p.wire_type.is_none())
    }
}

/// Output of the introspector.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Extraction {
    pub routes: Vec<RouteDescriptor>,
    pub imports: Vec<String>,
}

/// Errors that can occur while compiling a Spylt project.
#[derive(thiserror::Error, Debug)]
pub enum SpyltError {
    #[error(
        "No Python file is being pointed to in {path}. Add a comment at the top of the \
         component (ex: <!-- point ./src/App.py:app -->)"
    )]
    PointerNotFound { path: PathBuf },

    #[error(
        "No routes were defined on the Python backend. \
         Define backend logic with functions decorated with @app.backend()"
    )]
    NoRoutesDefined,

    #[error(
        "No types are set on arguments \"{}\" of function {function}(). \
         Annotate the arguments so they can be decoded correctly",
        params.join(", ")
    )]
    TypesNotDefined {
        function: String,
        params: Vec<String>,
    },

    #[error("Bundling failed: {0}")]
    BundleFailed(String),

    #[error("{} already exists", .0.display())]
    FileExists(PathBuf),

    #[error("Instance of module '{binding}' does not exist in {}", path.display())]
    BindingNotFound { binding: String, path: PathBuf },

    #[error("Svelte component not found: {}", .0.display())]
    ComponentNotFound(PathBuf),

    #[error("Function not found: {0}()")]
    FunctionNotFound(String),

    #[error("Syntax error in {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Unsupported value for prop '{key}': {reason}")]
    UnsupportedProp { key: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result type.
pub type SpyltResult<T> = Result<T, SpyltError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotation_lookup() {
        assert_eq!(WireType::from_annotation("str"), Some(WireType::String));
        assert_eq!(WireType::from_annotation("int"), Some(WireType::Integer));
        assert_eq!(WireType::from_annotation("bool"), Some(WireType::Boolean));
        assert_eq!(WireType::from_annotation("list[str]"), Some(WireType::List));
        assert_eq!(
            WireType::from_annotation("typing.List[int]"),
            Some(WireType::List)
        );
        assert_eq!(
            WireType::from_annotation("pd.DataFrame"),
            Some(WireType::Table)
        );
        assert_eq!(WireType::from_annotation("'str'"), Some(WireType::String));
    }

    #[test]
    fn unknown_annotations_stay_unresolved() {
        assert_eq!(WireType::from_annotation("float"), None);
        assert_eq!(WireType::from_annotation("dict[str, int]"), None);
        assert_eq!(WireType::from_annotation("Optional[str]"), None);
    }

    #[test]
    fn indent_defaults_to_four_spaces() {
        let route = RouteDescriptor {
            name: "f".into(),
            params: vec![],
            return_type: None,
            docstring: None,
            body: vec![],
        };
        assert_eq!(route.indent(), "    ");

        let tabbed = RouteDescriptor {
            body: vec!["\treturn {\"response\": 1}\n".into()],
            ..route
        };
        assert_eq!(tabbed.indent(), "\t");
    }

    #[test]
    fn types_not_defined_message_names_params() {
        let err = SpyltError::TypesNotDefined {
            function: "add".into(),
            params: vec!["a".into(), "b".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("\"a, b\""));
        assert!(msg.contains("add()"));
    }
}
