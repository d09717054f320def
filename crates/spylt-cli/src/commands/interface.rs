use std::path::Path;
use std::time::Instant;

use super::{load_module, write_output};

/// Generate the JavaScript interface and write it to `out` under `root`.
///
/// Returns whether any route exchanges dataframes.
pub fn write_interface(root: &Path, component: &Path, out: &Path) -> anyhow::Result<bool> {
    let started = Instant::now();
    let module = load_module(root, component)?;
    let interface = module.create_interface()?;

    let out_path = root.join(out);
    write_output(&out_path, &interface.source)?;
    tracing::info!("Wrote interface to {}", out_path.display());

    if interface.uses_tables {
        println!(
            "ⓘ This project uses Pandas dataframes in some places. \
             Consider `npm install dataframe-js` to work with them in the browser."
        );
    }
    println!(
        "✓ Done in {:.2}s, `{}` should now be available in your project",
        started.elapsed().as_secs_f64(),
        out.display()
    );
    Ok(interface.uses_tables)
}
