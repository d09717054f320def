use std::path::Path;

use super::load_module;

/// Linker source for the module behind `component`.
pub fn link(root: &Path, component: &Path) -> anyhow::Result<String> {
    let module = load_module(root, component)?;
    Ok(module.create_linker())
}
