//! Resolve a free-text program name to a concrete executable.

use std::cmp::Ordering;
use std::ffi::OsString;
use std::path::Path;

use tracing::debug;

use super::index::{ProgramEntry, ProgramIndex, ProgramSource};
use crate::text;

/// Score margin that accepts the top match outright.
pub const WIDE_MARGIN: i64 = 35;
/// Smaller margin accepted when the top match is a configured launcher path.
pub const LAUNCHER_MARGIN: i64 = 15;
/// Length slack for a near-exact key match.
pub const NEAR_EXACT_SLACK: usize = 3;

const PATH_EXTENSIONS: [&str; 4] = [".exe", ".com", ".bat", ".cmd"];

/// Something that can turn a program name into a path.
pub trait ProgramLookup: Send + Sync {
    fn resolve(&self, input: &str) -> Option<String>;
}

impl ProgramLookup for ProgramIndex {
    fn resolve(&self, input: &str) -> Option<String> {
        let path = resolve_program_path(input, self);
        (!path.is_empty()).then_some(path)
    }
}

/// A scored index entry.
#[derive(Debug, Clone)]
pub struct ScoredEntry<'a> {
    pub entry: &'a ProgramEntry,
    pub score: i64,
}

fn query_parts(query: &str) -> (Vec<String>, String) {
    (text::words(query), text::match_key(query))
}

/// Score an entry against a query; `None` when any token misses.
fn score_entry(entry: &ProgramEntry, tokens: &[String], query_key: &str) -> Option<i64> {
    if tokens.is_empty() {
        return None;
    }
    let mut score = 0i64;
    for token in tokens {
        let label_score = if entry.label_words.iter().any(|w| w == token) {
            25
        } else if entry.label_words.iter().any(|w| w.starts_with(token.as_str())) {
            15
        } else if entry.label_key.contains(token.as_str()) {
            8
        } else {
            0
        };
        let file_score = if entry.file_key.contains(token.as_str()) { 6 } else { 0 };
        if label_score == 0 && file_score == 0 {
            return None;
        }
        score += label_score + file_score;
    }

    if !query_key.is_empty() {
        if entry.stem_key == query_key {
            score += 120;
        }
        if entry.label_key == query_key {
            score += 100;
        }
    }
    score += match entry.ext.as_str() {
        ".exe" => 5,
        ".lnk" => 3,
        _ => 0,
    };
    Some(score + entry.source.weight())
}

fn compare(a: &ScoredEntry<'_>, b: &ScoredEntry<'_>) -> Ordering {
    b.score
        .cmp(&a.score)
        .then(a.entry.source.cmp(&b.entry.source))
        .then(a.entry.path.len().cmp(&b.entry.path.len()))
}

/// Entries matching every query token, best first.
pub fn rank<'a>(index: &'a ProgramIndex, query: &str) -> Vec<ScoredEntry<'a>> {
    let (tokens, query_key) = query_parts(query);
    let mut scored: Vec<ScoredEntry<'a>> = index
        .entries()
        .iter()
        .filter_map(|entry| {
            score_entry(entry, &tokens, &query_key).map(|score| ScoredEntry { entry, score })
        })
        .collect();
    scored.sort_by(compare);
    scored
}

/// Ranked entries for listing. An empty query lists entries by label.
pub fn search<'a>(index: &'a ProgramIndex, query: &str, limit: usize) -> Vec<&'a ProgramEntry> {
    if query.trim().is_empty() {
        let mut entries: Vec<&ProgramEntry> = index.entries().iter().collect();
        entries.sort_by(|a, b| {
            a.label
                .to_lowercase()
                .cmp(&b.label.to_lowercase())
                .then(a.source.cmp(&b.source))
        });
        entries.truncate(limit);
        return entries;
    }
    rank(index, query)
        .into_iter()
        .take(limit)
        .map(|scored| scored.entry)
        .collect()
}

fn near_exact(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b {
        return true;
    }
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    long.starts_with(short) && long.len() - short.len() <= NEAR_EXACT_SLACK
}

/// Pick the top entry only when it is unambiguous.
fn accept<'a>(ranked: &[ScoredEntry<'a>], query_key: &str) -> Option<&'a ProgramEntry> {
    let top = ranked.first()?;
    let runner_up = ranked.get(1).map_or(0, |s| s.score);
    let margin = top.score - runner_up;

    if margin >= WIDE_MARGIN {
        return Some(top.entry);
    }
    if margin >= LAUNCHER_MARGIN && top.entry.source == ProgramSource::LauncherPath {
        return Some(top.entry);
    }
    if near_exact(&top.entry.stem_key, query_key) || near_exact(&top.entry.label_key, query_key) {
        return Some(top.entry);
    }
    None
}

fn find_on_path(name: &str, path_var: Option<OsString>) -> Option<String> {
    let path_var = path_var?;
    let has_ext = !text::extension_of(name).is_empty();
    for dir in std::env::split_paths(&path_var) {
        let mut names = vec![name.to_string()];
        if !has_ext {
            names.extend(PATH_EXTENSIONS.iter().map(|ext| format!("{name}{ext}")));
        }
        for candidate in names {
            let full = dir.join(&candidate);
            if full.is_file() {
                return Some(full.display().to_string());
            }
        }
    }
    None
}

/// Resolve `input` to an executable path, or an empty string.
pub fn resolve_program_path(input: &str, index: &ProgramIndex) -> String {
    resolve_with(input, index, std::env::var_os("PATH"))
}

/// [`resolve_program_path`] with an explicit `PATH` value.
pub fn resolve_with(input: &str, index: &ProgramIndex, path_var: Option<OsString>) -> String {
    let expanded = text::expand_and_unquote(input);
    if expanded.is_empty() {
        return String::new();
    }

    if Path::new(&expanded).is_file() {
        return expanded;
    }

    if !expanded.contains(['/', '\\'])
        && let Some(found) = find_on_path(&expanded, path_var)
    {
        debug!(input = %expanded, path = %found, "resolved program on PATH");
        return found;
    }

    let ranked = rank(index, &expanded);
    let (_, query_key) = query_parts(&expanded);
    match accept(&ranked, &query_key) {
        Some(entry) => {
            debug!(input = %expanded, path = %entry.path, score = ranked[0].score, "resolved program from index");
            entry.path.clone()
        }
        None => {
            debug!(input = %expanded, candidates = ranked.len(), "no confident program match");
            String::new()
        }
    }
}
