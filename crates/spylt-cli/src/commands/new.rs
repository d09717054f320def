use std::path::Path;
use std::process::Stdio;
use std::time::Instant;

use anyhow::{bail, Context};
use spylt::SpyltError;
use tokio::process::Command;

use crate::templates::{scaffold, NPM_REQUIREMENTS};

/// Scaffold a new project in `dir`, which must not exist yet.
pub async fn new_project(dir: &Path, install: bool) -> anyhow::Result<()> {
    if dir.exists() {
        return Err(SpyltError::FileExists(dir.to_path_buf()).into());
    }
    let npm = if install {
        match which::which("npm") {
            Ok(npm) => Some(npm),
            Err(_) => bail!(
                "Node and npm are not installed. Consider installing with nvm: \
                 https://github.com/nvm-sh/nvm#installing-and-updating"
            ),
        }
    } else {
        None
    };

    let started = Instant::now();
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    for (relative, contents) in scaffold(&name) {
        super::write_output(&dir.join(relative), &contents)?;
        tracing::debug!("Wrote {relative}");
    }

    if let Some(npm) = npm {
        println!("Installing required dependencies...");
        let status = Command::new(&npm)
            .arg("install")
            .arg("--save-dev")
            .args(NPM_REQUIREMENTS)
            .current_dir(dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .with_context(|| format!("running {}", npm.display()))?;
        if !status.success() {
            bail!("npm install exited with {status}");
        }
    }

    println!(
        "✓ Project {} scaffolded in {:.2}s.\n\
         You can now run the following to get started:\n\n    \
         cd {}\n    \
         spylt interface\n    \
         spylt build\n    \
         python3 main.py",
        dir.display(),
        started.elapsed().as_secs_f64(),
        dir.display()
    );
    Ok(())
}
