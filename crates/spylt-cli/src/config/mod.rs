//! Configuration resolution: explicit flag, then environment, then default.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use spylt::bundle::{BundlerConfig, DEFAULT_BUNDLER, DEFAULT_BUNDLE_TIMEOUT};

pub const COMPONENT_ENV: &str = "SPYLT_COMPONENT";
pub const BUNDLER_ENV: &str = "SPYLT_BUNDLER";
pub const BUNDLE_TIMEOUT_ENV: &str = "SPYLT_BUNDLE_TIMEOUT";

pub const DEFAULT_COMPONENT: &str = "src/App.svelte";

/// Resolve the root UI component, relative to the project root.
pub fn resolve_component(explicit: Option<&str>) -> PathBuf {
    PathBuf::from(pick(explicit, std::env::var(COMPONENT_ENV).ok(), DEFAULT_COMPONENT))
}

/// Resolve the bundler command line and its timeout.
pub fn resolve_bundler(
    explicit: Option<&str>,
    timeout_secs: Option<u64>,
) -> anyhow::Result<BundlerConfig> {
    let command = pick(explicit, std::env::var(BUNDLER_ENV).ok(), DEFAULT_BUNDLER);
    let timeout = match timeout_secs {
        Some(secs) => secs,
        None => match std::env::var(BUNDLE_TIMEOUT_ENV) {
            Ok(raw) => parse_timeout(&raw)?,
            Err(_) => DEFAULT_BUNDLE_TIMEOUT.as_secs(),
        },
    };
    if timeout == 0 {
        bail!("bundle timeout must be at least one second");
    }
    Ok(BundlerConfig::from_command_line(
        &command,
        Duration::from_secs(timeout),
    )?)
}

fn pick(explicit: Option<&str>, env: Option<String>, default: &str) -> String {
    explicit
        .map(str::to_string)
        .or_else(|| env.filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| default.to_string())
}

fn parse_timeout(raw: &str) -> anyhow::Result<u64> {
    raw.trim().parse().with_context(|| {
        format!("{BUNDLE_TIMEOUT_ENV} must be a whole number of seconds, got '{raw}'")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_beats_env_beats_default() {
        assert_eq!(pick(Some("a"), Some("b".into()), "c"), "a");
        assert_eq!(pick(None, Some("b".into()), "c"), "b");
        assert_eq!(pick(None, None, "c"), "c");
        assert_eq!(pick(None, Some("  ".into()), "c"), "c");
    }

    #[test]
    fn explicit_bundler_is_split() {
        let config = resolve_bundler(Some("node build.js --out {out}"), Some(5)).unwrap();
        assert_eq!(config.program, "node");
        assert_eq!(config.args, vec!["build.js", "--out", "{out}"]);
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn bad_timeouts_are_rejected() {
        assert!(parse_timeout("soon").is_err());
        assert_eq!(parse_timeout(" 30 ").unwrap(), 30);
        assert!(resolve_bundler(Some("npx rollup"), Some(0)).is_err());
    }

    #[test]
    fn empty_bundler_is_rejected() {
        assert!(resolve_bundler(Some("   "), Some(1)).is_err());
    }
}
