//! Merge arbitrary JSON over computed defaults.
//!
//! The merge never fails: every field that is missing, wrong-typed or out of
//! range falls back to its default, numeric ranges are clamped, and built-in
//! profiles, pages and tiles are always present in the result.

use std::collections::{BTreeMap, HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use super::autodetect;
use super::defaults::{
    DefaultEnv, builtin_profiles, create_default_config, is_builtin_tile_id,
};
use super::model::{Config, Launcher, LogLevel, Page, Profile};
use crate::text;
use crate::tiles::{Tile, normalize_tile};

static LAUNCHER_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("valid launcher key regex"));

pub const MIN_WINDOW_MS: u64 = 250;
pub const MAX_WINDOW_MS: u64 = 3_600_000;
pub const MIN_RATE_MAX: u32 = 3;
pub const MAX_RATE_MAX: u32 = 100_000;
pub const MIN_LOG_FILES: u32 = 3;
pub const MAX_LOG_FILES: u32 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
    /// Fill empty launcher paths from existing candidates.
    pub autodetect: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self { autodetect: true }
    }
}

pub fn is_valid_launcher_key(key: &str) -> bool {
    LAUNCHER_KEY_RE.is_match(key)
}

/// Merge `raw` over defaults derived from the process environment.
pub fn merge_with_defaults(raw: &Value, options: MergeOptions) -> Config {
    merge_with_env(raw, options, &DefaultEnv::from_process())
}

/// Merge `raw` over defaults derived from `env`.
pub fn merge_with_env(raw: &Value, options: MergeOptions, env: &DefaultEnv) -> Config {
    let mut config = create_default_config(raw, env);

    if let Some(host) = text::clean_value(raw.get("host"), 255)
        && !host.is_empty()
    {
        config.host = host;
    }
    if let Some(port) = parse_port(raw.get("port")) {
        config.port = port;
    }
    if let Some(token) = text::clean_value(raw.get("token"), 256)
        && token.chars().count() >= crate::admission::MIN_TOKEN_LEN
    {
        config.token = token;
    }
    if let Some(dir) = text::clean_value(raw.get("workspaceDir"), 1024)
        && text::looks_absolute(&dir)
    {
        config.workspace_dir = dir;
    }

    if let Some(rate) = raw.get("rateLimit").and_then(Value::as_object) {
        if let Some(window) = clamp_number(rate.get("windowMs"), MIN_WINDOW_MS, MAX_WINDOW_MS) {
            config.rate_limit.window_ms = window;
        }
        if let Some(max) = clamp_number(rate.get("max"), MIN_RATE_MAX.into(), MAX_RATE_MAX.into()) {
            config.rate_limit.max = max as u32;
        }
    }

    if let Some(wow) = raw.get("wow").and_then(Value::as_object) {
        if let Some(name) = non_empty(wow.get("processName"), 128) {
            config.wow.process_name = name;
        }
        if let Some(folders) = wow.get("folders").and_then(Value::as_object) {
            let slots = [
                ("addons", &mut config.wow.folders.addons),
                ("logs", &mut config.wow.folders.logs),
                ("wtf", &mut config.wow.folders.wtf),
            ];
            for (key, slot) in slots {
                if let Some(path) = non_empty(folders.get(key), 1024) {
                    *slot = path;
                }
            }
        }
    }

    if let Some(logging) = raw.get("logging").and_then(Value::as_object) {
        if let Some(enabled) = logging.get("enabled").and_then(Value::as_bool) {
            config.logging.enabled = enabled;
        }
        if let Some(dir) = non_empty(logging.get("dir"), 1024) {
            config.logging.dir = dir;
        }
        if let Some(files) =
            clamp_number(logging.get("maxFiles"), MIN_LOG_FILES.into(), MAX_LOG_FILES.into())
        {
            config.logging.max_files = files as u32;
        }
        if let Some(level) = logging
            .get("level")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<LogLevel>().ok())
        {
            config.logging.level = level;
        }
    }

    if let Some(launchers) = raw.get("launchers").and_then(Value::as_object) {
        merge_launchers(&mut config.launchers, launchers);
    }

    if let Some(profiles) = normalize_profiles(raw.get("profiles")) {
        config.profiles = profiles;
    }
    union_builtin_profiles(&mut config.profiles);

    if let Some(Value::Array(items)) = raw.get("tiles") {
        config.tiles = merge_tiles(items, std::mem::take(&mut config.tiles));
    }

    if options.autodetect {
        autodetect::autodetect_launchers(&mut config, None);
    }

    config
}

fn non_empty(value: Option<&Value>, max: usize) -> Option<String> {
    text::clean_value(value, max).filter(|s| !s.is_empty())
}

fn parse_port(value: Option<&Value>) -> Option<u16> {
    let value = value?;
    let port = value
        .as_u64()
        .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))?;
    if (1..=65_535).contains(&port) {
        u16::try_from(port).ok()
    } else {
        None
    }
}

/// Numeric values are clamped into `[min, max]`; non-numbers are rejected.
fn clamp_number(value: Option<&Value>, min: u64, max: u64) -> Option<u64> {
    let number = value?.as_f64()?;
    if !number.is_finite() {
        return None;
    }
    let clamped = number.round().clamp(min as f64, max as f64);
    Some(clamped as u64)
}

fn string_list(value: Option<&Value>, max: usize) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| non_empty(Some(item), max))
            .collect(),
        _ => Vec::new(),
    }
}

/// Order-preserving union, de-duplicated case-insensitively.
fn union_candidates(base: &mut Vec<String>, extra: Vec<String>) {
    let mut seen = HashSet::new();
    base.retain(|c| seen.insert(c.to_lowercase()));
    for candidate in extra {
        if seen.insert(candidate.to_lowercase()) {
            base.push(candidate);
        }
    }
}

fn merge_launchers(launchers: &mut BTreeMap<String, Launcher>, raw: &Map<String, Value>) {
    for (key, value) in raw {
        if !is_valid_launcher_key(key) {
            continue;
        }
        let Some(entry) = value.as_object() else {
            continue;
        };
        let launcher = launchers.entry(key.clone()).or_insert_with(|| Launcher {
            label: key.clone(),
            path: String::new(),
            candidates: Vec::new(),
        });
        if let Some(label) = non_empty(entry.get("label"), 80) {
            launcher.label = label;
        }
        if let Some(path) = text::clean_value(entry.get("path"), 1024) {
            launcher.path = path;
        }
        union_candidates(&mut launcher.candidates, string_list(entry.get("candidates"), 1024));
    }
}

/// All-or-nothing: `None` when the input yields no valid profile.
fn normalize_profiles(value: Option<&Value>) -> Option<Vec<Profile>> {
    let Some(Value::Array(items)) = value else {
        return None;
    };
    let mut seen = HashSet::new();
    let mut profiles = Vec::new();
    for item in items {
        let (Some(id), Some(label)) = (non_empty(item.get("id"), 64), non_empty(item.get("label"), 80))
        else {
            continue;
        };
        if !seen.insert(id.clone()) {
            continue;
        }
        profiles.push(Profile {
            id,
            label,
            pages: normalize_pages(item.get("pages")),
        });
    }
    (!profiles.is_empty()).then_some(profiles)
}

fn normalize_pages(value: Option<&Value>) -> Vec<Page> {
    let mut seen = HashSet::new();
    let pages: Vec<Page> = match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| {
                let id = non_empty(item.get("id"), 64)?;
                let label = non_empty(item.get("label"), 80)?;
                seen.insert(id.clone()).then_some(Page { id, label })
            })
            .collect(),
        _ => Vec::new(),
    };
    if pages.is_empty() {
        vec![Page::new("main", "Main")]
    } else {
        pages
    }
}

fn union_builtin_profiles(profiles: &mut Vec<Profile>) {
    for builtin in builtin_profiles() {
        match profiles.iter_mut().find(|p| p.id == builtin.id) {
            Some(profile) => {
                for page in builtin.pages {
                    if !profile.pages.iter().any(|p| p.id == page.id) {
                        profile.pages.push(page);
                    }
                }
            }
            None => profiles.push(builtin),
        }
    }
}

/// Normalize incoming tiles, last write wins per id, then append any
/// built-in tile the input lacks.
fn merge_tiles(items: &[Value], defaults: Vec<Tile>) -> Vec<Tile> {
    let mut tiles: Vec<Tile> = Vec::with_capacity(items.len() + defaults.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    for mut tile in items.iter().filter_map(normalize_tile) {
        tile.builtin = is_builtin_tile_id(&tile.id);
        match index.get(&tile.id) {
            Some(&slot) => tiles[slot] = tile,
            None => {
                index.insert(tile.id.clone(), tiles.len());
                tiles.push(tile);
            }
        }
    }
    for tile in defaults {
        if !index.contains_key(&tile.id) {
            index.insert(tile.id.clone(), tiles.len());
            tiles.push(tile);
        }
    }
    tiles
}
