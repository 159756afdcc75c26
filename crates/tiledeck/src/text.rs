//! String and path primitives shared by the config, tile and program layers.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static ENV_VAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%([A-Za-z_][A-Za-z0-9_()]*)%").expect("valid env var regex"));

static DRIVE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]:([\\/]|$)").expect("valid drive regex"));

/// Strip control characters, trim, and cap the result at `max` characters.
pub fn clean(raw: &str, max: usize) -> String {
    let stripped: String = raw.chars().filter(|c| !c.is_control()).collect();
    stripped.trim().chars().take(max).collect()
}

/// Like [`clean`], but for JSON values: only strings are accepted.
pub fn clean_value(value: Option<&serde_json::Value>, max: usize) -> Option<String> {
    value.and_then(|v| v.as_str()).map(|s| clean(s, max))
}

/// Expand `%NAME%` references using the process environment.
///
/// Unknown variables are left verbatim, matching how the Windows shell
/// treats them.
pub fn expand_env(input: &str) -> String {
    expand_env_with(input, |name| std::env::var(name).ok())
}

/// Expand `%NAME%` references with a caller-supplied lookup.
pub fn expand_env_with<F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    if !input.contains('%') {
        return input.to_string();
    }
    ENV_VAR_RE
        .replace_all(input, |caps: &Captures<'_>| {
            lookup(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Remove a single layer of matching wrapping quotes.
pub fn strip_wrapping_quotes(input: &str) -> &str {
    let trimmed = input.trim();
    for quote in ['"', '\''] {
        if trimmed.len() >= 2 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
            return &trimmed[1..trimmed.len() - 1];
        }
    }
    trimmed
}

/// Split a command line into tokens.
///
/// Double quotes group words and are removed; backslashes are literal so
/// Windows paths survive untouched.
pub fn split_command_line(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;

    for c in input.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        tokens.push(current);
    }
    tokens
}

/// Quote a value as a single-quoted PowerShell literal.
///
/// Inside single quotes PowerShell performs no expansion; the only escape is
/// a doubled single quote.
pub fn powershell_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\'' | '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' => {
                out.push(c);
                out.push(c);
            }
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Whether a string is shaped like a filesystem path rather than a bare
/// program name.
pub fn looks_like_path(value: &str) -> bool {
    value.contains('/')
        || value.contains('\\')
        || value.starts_with('~')
        || value.starts_with('.')
        || DRIVE_RE.is_match(value)
}

/// Whether a string looks like an absolute path on either Windows or Unix.
pub fn looks_absolute(value: &str) -> bool {
    value.starts_with('/') || value.starts_with('\\') || DRIVE_RE.is_match(value)
}

/// Last path segment, splitting on both separator styles.
pub fn file_name_of(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Lower-cased extension including the dot, or an empty string.
pub fn extension_of(path: &str) -> String {
    let name = file_name_of(path);
    match name.rfind('.') {
        Some(idx) if idx > 0 => name[idx..].to_ascii_lowercase(),
        _ => String::new(),
    }
}

/// Lower-case alphanumeric key used for fuzzy comparisons.
pub fn match_key(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Lower-case alphanumeric words.
pub fn words(value: &str) -> Vec<String> {
    value
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Expand env vars, then strip wrapping quotes.
pub fn expand_and_unquote(value: &str) -> String {
    let expanded = expand_env(value.trim());
    strip_wrapping_quotes(&expanded).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_strips_controls_and_caps() {
        assert_eq!(clean("  he\u{0007}llo\n ", 80), "hello");
        assert_eq!(clean("abcdef", 3), "abc");
        assert_eq!(clean("\t\r\n", 10), "");
    }

    #[test]
    fn expand_env_replaces_known_and_keeps_unknown() {
        let lookup = |name: &str| match name {
            "LOCALAPPDATA" => Some(r"C:\Users\me\AppData\Local".to_string()),
            "ProgramFiles(x86)" => Some(r"C:\Program Files (x86)".to_string()),
            _ => None,
        };
        assert_eq!(
            expand_env_with(r"%LOCALAPPDATA%\Programs", lookup),
            r"C:\Users\me\AppData\Local\Programs"
        );
        assert_eq!(
            expand_env_with(r"%ProgramFiles(x86)%\Game", lookup),
            r"C:\Program Files (x86)\Game"
        );
        assert_eq!(expand_env_with("%NOPE%\\x", lookup), "%NOPE%\\x");
        assert_eq!(expand_env_with("100% sure", lookup), "100% sure");
    }

    #[test]
    fn strip_wrapping_quotes_removes_one_layer() {
        assert_eq!(strip_wrapping_quotes(r#""C:\a b\c.exe""#), r"C:\a b\c.exe");
        assert_eq!(strip_wrapping_quotes("'x'"), "x");
        assert_eq!(strip_wrapping_quotes(r#"""x"""#), r#""x""#);
        assert_eq!(strip_wrapping_quotes("\"unbalanced"), "\"unbalanced");
    }

    #[test]
    fn split_command_line_respects_quotes() {
        assert_eq!(
            split_command_line(r#""C:\Program Files\App\app.exe" --flag "two words""#),
            vec![r"C:\Program Files\App\app.exe", "--flag", "two words"]
        );
        assert_eq!(split_command_line("  a   b "), vec!["a", "b"]);
        assert_eq!(split_command_line(r#"run """#), vec!["run", ""]);
        assert!(split_command_line("   ").is_empty());
    }

    #[test]
    fn powershell_literal_doubles_quotes() {
        assert_eq!(powershell_literal(r"C:\it's"), r"'C:\it''s'");
        assert_eq!(powershell_literal("a$(b)`c"), "'a$(b)`c'");
        assert_eq!(powershell_literal("x\ny"), "'xy'");
    }

    #[test]
    fn path_shape_heuristics() {
        assert!(looks_like_path(r"C:\Windows\notepad.exe"));
        assert!(looks_like_path("./bin/tool"));
        assert!(looks_like_path("C:"));
        assert!(!looks_like_path("notepad"));
        assert!(!looks_like_path("notepad.exe"));

        assert!(looks_absolute(r"D:\Games"));
        assert!(looks_absolute("/home/me"));
        assert!(!looks_absolute(r"relative\dir"));
    }

    #[test]
    fn file_name_and_extension_handle_both_separators() {
        assert_eq!(file_name_of(r"C:\Windows\System32\notepad.exe"), "notepad.exe");
        assert_eq!(file_name_of("/usr/bin/env"), "env");
        assert_eq!(extension_of(r"C:\x\App.LNK"), ".lnk");
        assert_eq!(extension_of("/usr/bin/env"), "");
        assert_eq!(extension_of(".hidden"), "");
    }

    #[test]
    fn match_key_and_words() {
        assert_eq!(match_key("Visual Studio Code"), "visualstudiocode");
        assert_eq!(words("Battle.net Launcher-x64"), vec!["battle", "net", "launcher", "x64"]);
    }
}
