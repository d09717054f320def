use std::path::{Path, PathBuf};
use std::time::Instant;

use spylt::BundlerConfig;

use super::{load_module, write_output};

/// Inputs and outputs of one build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub component: PathBuf,
    pub html: PathBuf,
    pub py: PathBuf,
    pub bundler: BundlerConfig,
}

/// Compile the backend into a server and the frontend into one HTML page.
///
/// Nothing is written unless every stage succeeds.
pub async fn build(root: &Path, options: &BuildOptions) -> anyhow::Result<()> {
    let started = Instant::now();
    let module = load_module(root, &options.component)?;
    let server = module.create_api()?;
    println!(
        "✓ Backend code compiled in {:.2}s",
        started.elapsed().as_secs_f64()
    );

    let started = Instant::now();
    let linker = module.create_linker();
    let bundle = spylt::bundle(&linker, &options.bundler, root).await?;
    let html = bundle.to_html();
    println!(
        "✓ Frontend code compiled in {:.2}s",
        started.elapsed().as_secs_f64()
    );

    let py_path = root.join(&options.py);
    let html_path = root.join(&options.html);
    write_output(&py_path, &server)?;
    write_output(&html_path, &html)?;
    tracing::info!(
        "Wrote {} and {}",
        py_path.display(),
        html_path.display()
    );

    println!(
        "You can now run the app with `python3 {}`",
        options.py.display()
    );
    Ok(())
}
