//! Bundler adapter.
//!
//! Pipes the linker source into an external bundler, collects the script
//! and stylesheet it writes into the build cache, and splices them into a
//! self-contained HTML page. The build cache never outlives the call.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::types::{SpyltError, SpyltResult};

/// Scratch directory, relative to the project root.
pub const BUILD_CACHE_DIR: &str = "__buildcache__";

/// Default bundler invocation; `{out}` is replaced by the script output path.
pub const DEFAULT_BUNDLER: &str = "npx rollup --silent --config --file {out}";

/// Default time the bundler may run before it is killed.
pub const DEFAULT_BUNDLE_TIMEOUT: Duration = Duration::from_secs(120);

static SOURCE_MAP_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*//# sourceMappingURL=\S*[ \t]*\r?\n?").expect("valid pattern")
});
static SOURCE_MAP_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/\*# sourceMappingURL=[^*]*\*/").expect("valid pattern"));
static HTML_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)[ \t]*<!--.*?-->[ \t]*\n?").expect("valid pattern"));

/// Page shell; `{css}` and `{js}` mark where the assets go.
const HTML_SHELL: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Document</title>
    <style>{css}</style>
</head>
<body>
    <!-- Synchronous GET used by the generated API interface. -->
    <script>
        function fetchSync(url) {
            const xhr = new XMLHttpRequest();
            xhr.open('GET', url, false);
            xhr.send();

            if (xhr.status === 200) {
                return JSON.parse(xhr.responseText);
            } else {
                throw new Error('Failed to fetch data');
            }
        }
    </script>
    <!-- Bundled application. -->
    <script>{js}</script>
</body>
</html>
"#;

/// How to run the external bundler.
#[derive(Debug, Clone)]
pub struct BundlerConfig {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl Default for BundlerConfig {
    fn default() -> Self {
        let mut parts = DEFAULT_BUNDLER.split_whitespace().map(str::to_string);
        Self {
            program: parts.next().unwrap_or_default(),
            args: parts.collect(),
            timeout: DEFAULT_BUNDLE_TIMEOUT,
        }
    }
}

impl BundlerConfig {
    /// Split a whitespace-separated command line into program and arguments.
    pub fn from_command_line(command: &str, timeout: Duration) -> SpyltResult<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| SpyltError::BundleFailed("bundler command is empty".to_string()))?;
        Ok(Self {
            program,
            args: parts.collect(),
            timeout,
        })
    }
}

/// Script and stylesheet produced by the bundler.
#[derive(Debug, Clone, PartialEq)]
pub struct Bundle {
    pub js: String,
    pub css: Option<String>,
}

impl Bundle {
    /// Self-contained HTML page embedding this bundle.
    pub fn to_html(&self) -> String {
        render_html(&self.js, self.css.as_deref().unwrap_or_default())
    }
}

/// Removes the build cache when dropped, on every exit path.
struct BuildCache {
    path: PathBuf,
}

impl BuildCache {
    fn create(root: &Path) -> io::Result<Self> {
        let path = root.join(BUILD_CACHE_DIR);
        if path.exists() {
            tracing::debug!("Removing stale build cache {}", path.display());
            std::fs::remove_dir_all(&path)?;
        }
        std::fs::create_dir_all(&path)?;
        Ok(Self { path })
    }
}

impl Drop for BuildCache {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => tracing::debug!("Removed build cache {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "Failed to remove build cache {}: {e}",
                self.path.display()
            ),
        }
    }
}

/// Run the bundler in `root` with `linker` on stdin.
pub async fn bundle(linker: &str, config: &BundlerConfig, root: &Path) -> SpyltResult<Bundle> {
    let cache = BuildCache::create(root)?;
    let out = format!("./{BUILD_CACHE_DIR}/bundle.js");
    let args: Vec<String> = config.args.iter().map(|a| a.replace("{out}", &out)).collect();

    tracing::info!("Running bundler: {} {}", config.program, args.join(" "));

    let mut child = Command::new(&config.program)
        .args(&args)
        .current_dir(root)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            SpyltError::BundleFailed(format!("could not start `{}`: {e}", config.program))
        })?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| SpyltError::BundleFailed("bundler stdin unavailable".to_string()))?;

    let run = async move {
        if let Err(e) = stdin.write_all(linker.as_bytes()).await {
            // The bundler may exit without reading its input; its status decides.
            if e.kind() != io::ErrorKind::BrokenPipe {
                return Err(e);
            }
        }
        drop(stdin);
        child.wait_with_output().await
    };

    let output = tokio::time::timeout(config.timeout, run)
        .await
        .map_err(|_| {
            SpyltError::BundleFailed(format!(
                "`{}` timed out after {}s",
                config.program,
                config.timeout.as_secs_f32()
            ))
        })?
        .map_err(|e| SpyltError::BundleFailed(format!("`{}` failed: {e}", config.program)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SpyltError::BundleFailed(format!(
            "`{}` exited with {}: {}",
            config.program,
            output.status,
            stderr.trim()
        )));
    }

    let js_path = cache.path.join("bundle.js");
    let js = std::fs::read_to_string(&js_path).map_err(|e| {
        SpyltError::BundleFailed(format!("no script output at {}: {e}", js_path.display()))
    })?;
    let css = match std::fs::read_to_string(cache.path.join("bundle.css")) {
        Ok(css) => Some(css),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };

    tracing::info!(
        "Bundled {} bytes of script, {} bytes of style",
        js.len(),
        css.as_ref().map_or(0, String::len)
    );
    Ok(Bundle { js, css })
}

/// Remove strict-mode pragmas and source-map footers from bundled output.
pub fn strip_asset(text: &str) -> String {
    let text = text.replace("\"use strict\";", "").replace("'use strict';", "");
    let text = SOURCE_MAP_LINE.replace_all(&text, "");
    SOURCE_MAP_BLOCK.replace_all(&text, "").trim().to_string()
}

/// Splice script and stylesheet into the page shell.
pub fn render_html(js: &str, css: &str) -> String {
    let shell = HTML_COMMENT.replace_all(HTML_SHELL, "");

    // Split around the placeholders so asset text is never reinterpreted.
    let (head, rest) = shell.split_once("{css}").unwrap_or((&shell, ""));
    let (middle, tail) = rest.split_once("{js}").unwrap_or((rest, ""));
    let mut html = String::with_capacity(shell.len() + js.len() + css.len());
    html.push_str(head);
    html.push_str(&strip_asset(css));
    html.push_str(middle);
    html.push_str(&strip_asset(js));
    html.push_str(tail);
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> BundlerConfig {
        BundlerConfig {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            timeout: Duration::from_secs(10),
        }
    }

    #[test]
    fn default_bundler_is_rollup() {
        let config = BundlerConfig::default();
        assert_eq!(config.program, "npx");
        assert_eq!(config.args[0], "rollup");
        assert!(config.args.contains(&"{out}".to_string()));
        assert_eq!(config.timeout, DEFAULT_BUNDLE_TIMEOUT);
    }

    #[test]
    fn empty_command_is_rejected() {
        let err = BundlerConfig::from_command_line("   ", DEFAULT_BUNDLE_TIMEOUT).unwrap_err();
        assert!(matches!(err, SpyltError::BundleFailed(_)));
    }

    #[test]
    fn html_embeds_assets_and_strips_comments() {
        let html = render_html(
            "\"use strict\";\nvar app = (function () {})();\n//# sourceMappingURL=bundle.js.map\n",
            "main{color:red}\n/*# sourceMappingURL=bundle.css.map */",
        );
        assert!(html.contains("<script>var app = (function () {})();</script>"));
        assert!(html.contains("<style>main{color:red}</style>"));
        assert!(html.contains("function fetchSync(url) {"));
        assert!(!html.contains("use strict"));
        assert!(!html.contains("sourceMappingURL"));
        assert!(!html.contains("<!--"));
    }

    #[test]
    fn placeholders_inside_assets_are_left_alone() {
        let html = render_html("const s = '{css}';", "");
        assert!(html.contains("const s = '{css}';"));
        assert!(html.contains("<style></style>"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn collects_outputs_and_removes_cache() {
        let dir = tempfile::tempdir().unwrap();
        let config = sh("cat > {out}; printf 'main{color:red}' > ./__buildcache__/bundle.css");

        let bundle = bundle("var app = 1;", &config, dir.path()).await.unwrap();
        assert_eq!(bundle.js, "var app = 1;");
        assert_eq!(bundle.css.as_deref(), Some("main{color:red}"));
        assert!(!dir.path().join(BUILD_CACHE_DIR).exists());

        let html = bundle.to_html();
        assert!(html.contains("<script>var app = 1;</script>"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stylesheet_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = bundle("x", &sh("cat > {out}"), dir.path()).await.unwrap();
        assert_eq!(bundle.css, None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_fails_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let config = sh("cat > {out}; echo 'rollup exploded' >&2; exit 3");

        let err = bundle("x", &config, dir.path()).await.unwrap_err();
        match err {
            SpyltError::BundleFailed(msg) => assert!(msg.contains("rollup exploded"), "{msg}"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!dir.path().join(BUILD_CACHE_DIR).exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn missing_output_fails_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let err = bundle("x", &sh("cat > /dev/null"), dir.path()).await.unwrap_err();
        assert!(matches!(err, SpyltError::BundleFailed(_)));
        assert!(!dir.path().join(BUILD_CACHE_DIR).exists());
    }

    #[tokio::test]
    async fn missing_bundler_fails_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let config = BundlerConfig {
            program: "spylt-test-no-such-bundler".to_string(),
            args: vec![],
            timeout: Duration::from_secs(5),
        };
        let err = bundle("x", &config, dir.path()).await.unwrap_err();
        assert!(matches!(err, SpyltError::BundleFailed(msg) if msg.contains("could not start")));
        assert!(!dir.path().join(BUILD_CACHE_DIR).exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hung_bundler_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = sh("sleep 5");
        config.timeout = Duration::from_millis(200);

        let err = bundle("x", &config, dir.path()).await.unwrap_err();
        assert!(matches!(err, SpyltError::BundleFailed(msg) if msg.contains("timed out")));
        assert!(!dir.path().join(BUILD_CACHE_DIR).exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stale_cache_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join(BUILD_CACHE_DIR);
        std::fs::create_dir_all(&stale).unwrap();
        std::fs::write(stale.join("old.js"), "stale").unwrap();

        let config = sh("cat > /dev/null; ls ./__buildcache__ > ./__buildcache__/listing; mv ./__buildcache__/listing {out}");
        let bundle = bundle("x", &config, dir.path()).await.unwrap();
        assert!(!bundle.js.contains("old.js"), "{}", bundle.js);
    }
}
