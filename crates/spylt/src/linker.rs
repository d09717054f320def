//! Linker source generation.
//!
//! The linker is the tiny entry module handed to the bundler: it imports the
//! root component and mounts it with the module's initial props.

use serde_json::{Map, Value};

/// Encode a JSON value as a JavaScript literal expression.
///
/// Objects keep insertion order and use bare keys where the key is a valid
/// identifier; every scalar goes through the JSON encoder so strings are
/// always quoted and escaped. `</` is broken up so a value can never close
/// the inline `<script>` it ends up in.
pub fn encode_js_value(value: &Value) -> String {
    match value {
        Value::Object(map) => format!("{{{}}}", encode_entries(map).join(", ")),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(encode_js_value).collect();
            format!("[{}]", items.join(", "))
        }
        Value::String(_) => value.to_string().replace("</", "<\\/"),
        scalar => scalar.to_string(),
    }
}

fn encode_entries(map: &Map<String, Value>) -> Vec<String> {
    map.iter()
        .map(|(key, value)| format!("{}: {}", js_key(key), encode_js_value(value)))
        .collect()
}

fn js_key(key: &str) -> String {
    let mut chars = key.chars();
    let is_ident = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if is_ident {
        key.to_string()
    } else {
        Value::String(key.to_string()).to_string()
    }
}

/// Build the entry module that instantiates `component` with `props`.
pub fn create_linker(component: &str, props: &Map<String, Value>) -> String {
    let props = encode_entries(props).join(",\n      ");
    let component = component.replace('\\', "/").replace('\'', "\\'");
    format!(
        "import App from '{component}';

const app = new App({{
    target: document.body,
    props: {{
      {props}
    }}
}});

export default app;"
    )
}
