//! Files written into a freshly scaffolded project.

/// Dev dependencies installed by `spylt new`.
pub const NPM_REQUIREMENTS: &[&str] = &[
    "@rollup/plugin-commonjs",
    "@rollup/plugin-node-resolve",
    "rollup",
    "rollup-plugin-css-only",
    "rollup-plugin-livereload",
    "rollup-plugin-svelte",
    "rollup-plugin-terser",
    "svelte",
];

const APP_SVELTE: &str = include_str!("App.svelte.tmpl");
const APP_PY: &str = include_str!("App.py.tmpl");
const ROLLUP_CONFIG: &str = include_str!("rollup.config.js.tmpl");
const PACKAGE_JSON: &str = include_str!("package.json.tmpl");
const GITIGNORE: &str = include_str!("gitignore.tmpl");

/// Scaffold files as `(relative path, contents)` for a project named `name`.
pub fn scaffold(name: &str) -> Vec<(&'static str, String)> {
    vec![
        ("src/App.svelte", APP_SVELTE.to_string()),
        ("src/App.py", APP_PY.to_string()),
        ("rollup.config.js", ROLLUP_CONFIG.to_string()),
        ("package.json", PACKAGE_JSON.replace("{name}", &package_name(name))),
        (".gitignore", GITIGNORE.to_string()),
    ]
}

/// npm package names are lowercase and URL-safe.
fn package_name(name: &str) -> String {
    let cleaned: String = name
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches(['.', '_', '-']);
    if cleaned.is_empty() {
        "spylt-app".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_names_are_sanitised() {
        assert_eq!(package_name("My App"), "my-app");
        assert_eq!(package_name(".hidden"), "hidden");
        assert_eq!(package_name("???"), "spylt-app");
    }

    #[test]
    fn component_points_at_backend() {
        let files = scaffold("demo");
        let (_, svelte) = files.iter().find(|(p, _)| *p == "src/App.svelte").unwrap();
        assert_eq!(svelte.lines().next(), Some("<!-- point ./src/App.py:app -->"));

        let (_, package) = files.iter().find(|(p, _)| *p == "package.json").unwrap();
        assert!(package.contains("\"name\": \"demo\""));
    }
}
