//! User-facing command flows. Each takes the project root explicitly.

pub mod build;
pub mod interface;
pub mod link;
pub mod new;

pub use build::{build, BuildOptions};
pub use interface::write_interface;
pub use link::link;
pub use new::new_project;

use std::path::Path;

use anyhow::Context;
use spylt::{find_pointer, Module};

/// Follow the component's pointer comment to its module binding.
pub(crate) fn load_module(root: &Path, component: &Path) -> anyhow::Result<Module> {
    let component_path = root.join(component);
    let pointer = find_pointer(&component_path)
        .with_context(|| format!("reading {}", component_path.display()))?;
    let module = Module::load(&pointer, root)
        .with_context(|| format!("loading module {pointer}"))?;
    Ok(module)
}

/// Write `contents` to `path`, creating parent directories.
pub(crate) fn write_output(path: &Path, contents: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("writing {}", path.display()))
}
