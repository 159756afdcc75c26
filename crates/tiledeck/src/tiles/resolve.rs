//! Target resolution: turn a stored tile target into a literal OS target.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::config::{Config, template};
use crate::text;

static EXE_BOUNDARY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(.+?\.(?:exe|bat|cmd|com|lnk))(?:\s+(.*))?$").expect("valid exe boundary regex")
});

static PROTOCOL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]+:\S*$").expect("valid protocol regex"));

/// Render templates, expand env vars and strip one layer of quotes.
pub fn resolve_value(raw: &str, config: &Config) -> String {
    let rendered = template::render(raw, config);
    text::expand_and_unquote(&rendered)
}

/// Resolved path of a launcher, env-expanded. Empty when unknown or unset.
pub fn launcher_path(config: &Config, key: &str) -> String {
    config
        .launchers
        .get(key)
        .map(|launcher| text::expand_and_unquote(&launcher.path))
        .unwrap_or_default()
}

/// Split an app target into a command and trailing arguments.
///
/// Tries, in order: the whole string as an existing file, a quote-aware
/// token split, then a split at the first executable extension.
pub fn split_app_command<F>(target: &str, is_file: F) -> (String, Vec<String>)
where
    F: Fn(&str) -> bool,
{
    let target = target.trim();
    if target.is_empty() {
        return (String::new(), Vec::new());
    }
    let unquoted = text::strip_wrapping_quotes(target);
    if is_file(unquoted) {
        return (unquoted.to_string(), Vec::new());
    }

    let mut tokens = text::split_command_line(target);
    if !tokens.is_empty() && is_file(&tokens[0]) {
        let command = tokens.remove(0);
        return (command, tokens);
    }

    if let Some(caps) = EXE_BOUNDARY_RE.captures(target) {
        let command = text::strip_wrapping_quotes(&caps[1]).to_string();
        let args = caps
            .get(2)
            .map(|rest| text::split_command_line(rest.as_str()))
            .unwrap_or_default();
        return (command, args);
    }

    if tokens.is_empty() {
        return (unquoted.to_string(), Vec::new());
    }
    let command = tokens.remove(0);
    (command, tokens)
}

/// Normalize a URL target to absolute http(s). Bare hosts gain `https://`.
pub fn normalize_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
        return None;
    }
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let parsed = Url::parse(&candidate).ok()?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some_and(|h| !h.is_empty()) => Some(candidate),
        _ => None,
    }
}

/// Whether a target matches the generic `scheme:` grammar.
pub fn is_protocol_target(raw: &str) -> bool {
    PROTOCOL_RE.is_match(raw)
}
