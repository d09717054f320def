//! Parsed Python backend source.
//!
//! The backend file is read and parsed once; everything downstream works on
//! the syntax tree and slices of the original text.

use std::path::{Path, PathBuf};

use rustpython_parser::ast::{self, Ranged};
use rustpython_parser::text_size::TextRange;
use rustpython_parser::Parse;

use crate::types::{SpyltError, SpyltResult};

/// A Python module held as text plus its top-level statements.
pub struct SourceFile {
    path: PathBuf,
    text: String,
    suite: ast::Suite,
}

/// Borrowed view over `def` and `async def` statements.
#[derive(Clone, Copy)]
pub struct FunctionDef<'a> {
    pub name: &'a str,
    pub args: &'a ast::Arguments,
    pub body: &'a [ast::Stmt],
    pub decorators: &'a [ast::Expr],
    pub returns: Option<&'a ast::Expr>,
    pub range: TextRange,
}

impl<'a> FunctionDef<'a> {
    pub fn from_stmt(stmt: &'a ast::Stmt) -> Option<Self> {
        match stmt {
            ast::Stmt::FunctionDef(def) => Some(Self {
                name: def.name.as_str(),
                args: &def.args,
                body: &def.body,
                decorators: &def.decorator_list,
                returns: def.returns.as_deref(),
                range: def.range,
            }),
            ast::Stmt::AsyncFunctionDef(def) => Some(Self {
                name: def.name.as_str(),
                args: &def.args,
                body: &def.body,
                decorators: &def.decorator_list,
                returns: def.returns.as_deref(),
                range: def.range,
            }),
            _ => None,
        }
    }
}

impl SourceFile {
    /// Read and parse a Python file.
    pub fn read(path: &Path) -> SpyltResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(path, text)
    }

    /// Parse Python text that notionally lives at `path`.
    pub fn parse(path: impl Into<PathBuf>, text: impl Into<String>) -> SpyltResult<Self> {
        let path = path.into();
        let text = text.into();
        let suite = ast::Suite::parse(&text, &path.to_string_lossy()).map_err(|e| {
            let (line, column) = line_column(&text, usize::from(e.offset));
            SpyltError::Parse {
                path: path.clone(),
                message: format!("{e} (line {line}, column {column})"),
            }
        })?;
        tracing::debug!(
            "Parsed {} ({} top-level statements)",
            path.display(),
            suite.len()
        );
        Ok(Self { path, text, suite })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn statements(&self) -> &[ast::Stmt] {
        &self.suite
    }

    /// Source text covered by `range`.
    pub fn slice(&self, range: TextRange) -> &str {
        &self.text[usize::from(range.start())..usize::from(range.end())]
    }

    /// Source text of any node.
    pub fn text_of<T: Ranged>(&self, node: &T) -> &str {
        self.slice(node.range())
    }

    /// Top-level function definitions in source order.
    pub fn functions(&self) -> impl Iterator<Item = FunctionDef<'_>> {
        self.suite.iter().filter_map(FunctionDef::from_stmt)
    }

    /// Look up a top-level function by name. The last definition wins, as it
    /// would at runtime.
    pub fn function(&self, name: &str) -> Option<FunctionDef<'_>> {
        self.functions().filter(|f| f.name == name).last()
    }

    /// Byte offset of the start of the line containing `offset`.
    pub fn line_start(&self, offset: usize) -> usize {
        self.text[..offset].rfind('\n').map_or(0, |i| i + 1)
    }

    /// Byte offset just past the newline ending the line containing `offset`.
    pub fn line_end(&self, offset: usize) -> usize {
        self.text[offset..]
            .find('\n')
            .map_or(self.text.len(), |i| offset + i + 1)
    }
}

/// 1-based line and column of a byte offset.
fn line_column(text: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(text.len());
    let before = &text[..offset];
    let line = before.matches('\n').count() + 1;
    let column = before
        .rfind('\n')
        .map_or(before.chars().count(), |i| before[i + 1..].chars().count())
        + 1;
    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BACKEND: &str = r#"from spylt import require_svelte

app = require_svelte("./src/App.svelte")

@app.backend()
def say_hello(name: str) -> str:
    return f"Hello {name}"

async def later():
    return 1
"#;

    #[test]
    fn finds_sync_and_async_functions() {
        let source = SourceFile::parse("App.py", BACKEND).unwrap();
        let names: Vec<_> = source.functions().map(|f| f.name).collect();
        assert_eq!(names, vec!["say_hello", "later"]);
        assert!(source.function("missing").is_none());
    }

    #[test]
    fn slices_decorators_without_at_sign() {
        let source = SourceFile::parse("App.py", BACKEND).unwrap();
        let def = source.function("say_hello").unwrap();
        assert_eq!(source.text_of(&def.decorators[0]), "app.backend()");
    }

    #[test]
    fn line_bounds() {
        let source = SourceFile::parse("x.py", "a = 1\nb = 2\n").unwrap();
        assert_eq!(source.line_start(8), 6);
        assert_eq!(source.line_end(6), 12);
        assert_eq!(source.line_end(0), 6);
    }

    #[test]
    fn syntax_errors_report_location() {
        let err = SourceFile::parse("bad.py", "def f(:\n    pass\n")
            .err()
            .expect("should not parse");
        match err {
            SpyltError::Parse { path, message } => {
                assert_eq!(path, PathBuf::from("bad.py"));
                assert!(message.contains("line 1"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn redefinition_resolves_to_last() {
        let text = "def f():\n    return 1\n\ndef f():\n    return 2\n";
        let source = SourceFile::parse("x.py", text).unwrap();
        let def = source.function("f").unwrap();
        assert!(source.slice(def.range).contains("return 2"));
    }
}
