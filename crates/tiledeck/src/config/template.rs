//! `{{dotted.path}}` substitution against the live configuration tree.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

use super::model::Config;
use crate::text;

static TEMPLATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("valid template regex")
});

pub fn has_template(value: &str) -> bool {
    value.contains("{{")
}

/// Look up a dotted path in a JSON tree, e.g. `wow.folders.addons`.
pub fn lookup<'a>(tree: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(tree, |node, segment| match node {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

/// Replace every template reference in `input`.
///
/// A reference resolves to the looked-up string, env-expanded. Missing paths
/// and non-string values resolve to an empty string.
pub fn render_with(input: &str, tree: &Value) -> String {
    if !has_template(input) {
        return input.to_string();
    }
    TEMPLATE_RE
        .replace_all(input, |caps: &Captures<'_>| {
            lookup(tree, &caps[1])
                .and_then(Value::as_str)
                .map(text::expand_env)
                .unwrap_or_default()
        })
        .into_owned()
}

/// Render templates against `config`.
pub fn render(input: &str, config: &Config) -> String {
    if !has_template(input) {
        return input.to_string();
    }
    match serde_json::to_value(config) {
        Ok(tree) => render_with(input, &tree),
        Err(err) => {
            tracing::warn!(error = %err, "failed to serialize config for template rendering");
            String::new()
        }
    }
}
