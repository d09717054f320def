//! Pointer comments linking a Svelte component to its Python backend.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::types::{SpyltError, SpyltResult};

static POINTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*<!--\s*point\s+(?P<path>[^\s:]+)\s*:\s*(?P<binding>[A-Za-z_][A-Za-z0-9_]*)\s*-->")
        .expect("pointer pattern is valid")
});

/// Backend file and module binding named by a component's pointer comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pointer {
    pub backend: PathBuf,
    pub binding: String,
}

impl Pointer {
    /// Parse `<!-- point ./src/App.py:app -->`.
    pub fn parse(line: &str) -> Option<Self> {
        let caps = POINTER.captures(line)?;
        Some(Self {
            backend: PathBuf::from(&caps["path"]),
            binding: caps["binding"].to_string(),
        })
    }
}

impl std::fmt::Display for Pointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.backend.display(), self.binding)
    }
}

/// Read the pointer comment on the first line of a component file.
pub fn find_pointer(component: &Path) -> SpyltResult<Pointer> {
    let text = std::fs::read_to_string(component)?;
    let first = text.lines().next().unwrap_or_default();
    let pointer = Pointer::parse(first).ok_or_else(|| SpyltError::PointerNotFound {
        path: component.to_path_buf(),
    })?;
    tracing::debug!("{} points to {pointer}", component.display());
    Ok(pointer)
}
