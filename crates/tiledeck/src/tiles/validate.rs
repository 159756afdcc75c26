//! Tile decoding and validation.
//!
//! A single decoder applies the shared field rules. The bulk entry point
//! ([`normalize_tile`]) is lenient and drops invalid tiles; the interactive
//! entry point ([`sanitize_custom_tile`]) is strict and reports every
//! violation, then adds checks against the live configuration and the
//! filesystem.

use std::fmt;
use std::path::Path;

use serde_json::Value;
use thiserror::Error;

use super::model::{IconMode, NamedAction, ShowIf, Tile, TileKind, TileType};
use super::resolve;
use crate::config::{Config, is_builtin_tile_id, template};
use crate::programs::ProgramLookup;
use crate::text;

pub const MAX_ID: usize = 64;
pub const MAX_LABEL: usize = 80;
pub const MAX_SUBTITLE: usize = 140;
pub const MAX_TYPE: usize = 32;
pub const MAX_ICON: usize = 12;
pub const MAX_TARGET: usize = 1024;
pub const MAX_ARG: usize = 512;
pub const MAX_ARGS: usize = 16;
pub const MAX_ICON_DATA: usize = 2 * 1024 * 1024;

/// A single field-level problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: &'static str,
    pub message: String,
}

impl Violation {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Error)]
pub enum TileError {
    #[error("{}", join_violations(.0))]
    Invalid(Vec<Violation>),

    #[error("built-in tile '{0}' cannot be modified")]
    Builtin(String),
}

impl TileError {
    fn single(field: &'static str, message: impl Into<String>) -> Self {
        TileError::Invalid(vec![Violation::new(field, message)])
    }

    pub fn violations(&self) -> &[Violation] {
        match self {
            TileError::Invalid(violations) => violations,
            TileError::Builtin(_) => &[],
        }
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Lenient,
    Strict,
}

fn required(
    raw: &Value,
    key: &str,
    field: &'static str,
    max: usize,
    violations: &mut Vec<Violation>,
) -> String {
    let value = text::clean_value(raw.get(key), max).unwrap_or_default();
    if value.is_empty() {
        violations.push(Violation::new(field, "is required"));
    }
    value
}

fn optional(raw: &Value, key: &str, max: usize) -> String {
    text::clean_value(raw.get(key), max).unwrap_or_default()
}

fn decode_args(raw: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = raw else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(text::clean(s, MAX_ARG)),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
        .filter(|arg| !arg.is_empty())
        .take(MAX_ARGS)
        .collect()
}

fn decode_icon_data(raw: Option<&Value>, mode: Mode, violations: &mut Vec<Violation>) -> Option<String> {
    let data = match raw {
        None | Some(Value::Null) => return None,
        Some(Value::String(s)) if s.trim().is_empty() => return None,
        Some(Value::String(s)) => s.trim(),
        Some(_) => {
            if mode == Mode::Strict {
                violations.push(Violation::new("iconData", "must be a data URL string"));
            }
            return None;
        }
    };
    let problem = if !data.starts_with("data:") {
        Some("must be a data URL")
    } else if data.len() > MAX_ICON_DATA {
        Some("exceeds the 2 MiB limit")
    } else {
        None
    };
    match problem {
        None => Some(data.to_string()),
        Some(message) => {
            if mode == Mode::Strict {
                violations.push(Violation::new("iconData", message));
            }
            None
        }
    }
}

fn check_target_shape(tile_type: TileType, target: &str, violations: &mut Vec<Violation>) -> String {
    if template::has_template(target) {
        return target.to_string();
    }
    match tile_type {
        TileType::Url => match resolve::normalize_url(target) {
            Some(url) => url,
            None => {
                violations.push(Violation::new("target", "must be an http(s) URL"));
                target.to_string()
            }
        },
        TileType::Protocol if !resolve::is_protocol_target(target) => {
            violations.push(Violation::new(
                "target",
                "must look like scheme:value with no whitespace",
            ));
            target.to_string()
        }
        _ => target.to_string(),
    }
}

/// Apply the shared field rules. In strict mode a missing id is allowed and
/// left empty for the caller to assign.
fn decode(raw: &Value, mode: Mode) -> Result<Tile, Vec<Violation>> {
    let mut violations = Vec::new();
    if !raw.is_object() {
        return Err(vec![Violation::new("tile", "must be an object")]);
    }

    let id = match mode {
        Mode::Lenient => required(raw, "id", "id", MAX_ID, &mut violations),
        Mode::Strict => optional(raw, "id", MAX_ID),
    };
    let profile = required(raw, "profile", "profile", MAX_ID, &mut violations);
    let page = match optional(raw, "page", MAX_ID) {
        page if page.is_empty() => "main".to_string(),
        page => page,
    };
    let label = required(raw, "label", "label", MAX_LABEL, &mut violations);
    let type_name = required(raw, "type", "type", MAX_TYPE, &mut violations);

    let subtitle = optional(raw, "subtitle", MAX_SUBTITLE);
    let icon = optional(raw, "icon", MAX_ICON);
    let show_if = ShowIf::parse_lenient(&optional(raw, "showIf", MAX_TYPE));
    let icon_mode = IconMode::parse_lenient(&optional(raw, "iconMode", MAX_TYPE));
    let icon_data = decode_icon_data(raw.get("iconData"), mode, &mut violations);

    let target = optional(raw, "target", MAX_TARGET);
    let kind = match type_name.parse::<TileType>() {
        Err(()) => {
            if !type_name.is_empty() {
                violations.push(Violation::new(
                    "type",
                    format!("unknown tile type '{type_name}'"),
                ));
            }
            None
        }
        Ok(TileType::Action) => {
            let action = optional(raw, "action", MAX_TYPE);
            match action.parse::<NamedAction>() {
                Ok(action) => Some(TileKind::Action { action }),
                Err(()) => {
                    violations.push(Violation::new(
                        "action",
                        format!("unknown action '{action}'"),
                    ));
                    None
                }
            }
        }
        Ok(TileType::App) => {
            let launcher_key = Some(optional(raw, "launcherKey", MAX_ID)).filter(|k| !k.is_empty());
            if launcher_key.is_none() && target.is_empty() {
                violations.push(Violation::new("target", "app tiles need a target or launcherKey"));
            }
            Some(TileKind::App {
                launcher_key,
                target: target.clone(),
                args: decode_args(raw.get("args")),
                start_in: optional(raw, "startIn", MAX_TARGET),
            })
        }
        Ok(tile_type) => {
            if target.is_empty() {
                violations.push(Violation::new("target", "is required"));
                None
            } else {
                let target = check_target_shape(tile_type, &target, &mut violations);
                Some(match tile_type {
                    TileType::Url => TileKind::Url { target },
                    TileType::Protocol => TileKind::Protocol { target },
                    _ => TileKind::Folder { target },
                })
            }
        }
    };

    match kind {
        Some(kind) if violations.is_empty() => Ok(Tile {
            id,
            profile,
            page,
            label,
            subtitle,
            builtin: raw.get("builtin").and_then(Value::as_bool).unwrap_or(false),
            show_if,
            icon_mode,
            icon,
            icon_data,
            kind,
        }),
        _ => Err(violations),
    }
}

/// Bulk-path normalization: `None` for any invalid tile. An invalid
/// `iconData` is dropped instead of rejecting the tile.
pub fn normalize_tile(raw: &Value) -> Option<Tile> {
    decode(raw, Mode::Lenient).ok()
}

/// Everything [`sanitize_custom_tile`] checks against.
pub struct SanitizeContext<'a> {
    pub config: &'a Config,
    pub programs: &'a dyn ProgramLookup,
}

pub fn generate_custom_id() -> String {
    format!("custom-{}", nanoid::nanoid!(10))
}

fn expand_path(raw: &str) -> String {
    text::expand_and_unquote(raw)
}

/// Interactive-path validation for a user-submitted tile.
///
/// `existing` is the stored tile with the same id, if any.
pub fn sanitize_custom_tile(
    raw: &Value,
    existing: Option<&Tile>,
    ctx: &SanitizeContext<'_>,
) -> Result<Tile, TileError> {
    let raw_id = text::clean_value(raw.get("id"), MAX_ID).unwrap_or_default();
    if is_builtin_tile_id(&raw_id) || existing.is_some_and(|t| t.builtin) {
        return Err(TileError::Builtin(raw_id));
    }

    let mut tile = decode(raw, Mode::Strict).map_err(TileError::Invalid)?;
    tile.builtin = false;
    tile.id = match existing {
        Some(existing) => existing.id.clone(),
        None if !tile.id.is_empty() => tile.id,
        None => generate_custom_id(),
    };

    if ctx.config.profile(&tile.profile).is_none() {
        return Err(TileError::single(
            "profile",
            format!("unknown profile '{}'", tile.profile),
        ));
    }
    if !ctx.config.has_page(&tile.profile, &tile.page) {
        return Err(TileError::single(
            "page",
            format!("unknown page '{}' in profile '{}'", tile.page, tile.profile),
        ));
    }

    match &mut tile.kind {
        TileKind::App {
            launcher_key,
            target,
            args,
            start_in,
        } => {
            match launcher_key {
                Some(key) if !ctx.config.launchers.contains_key(key.as_str()) => {
                    return Err(TileError::single(
                        "launcherKey",
                        format!("unknown launcher '{key}'"),
                    ));
                }
                Some(_) => {}
                None => {
                    let (command, trailing) = resolve_custom_command(target, ctx)?;
                    *target = command;
                    if !trailing.is_empty() {
                        let mut merged = trailing;
                        merged.append(args);
                        merged.truncate(MAX_ARGS);
                        *args = merged;
                    }
                }
            }
            if !start_in.is_empty() && !template::has_template(start_in) {
                let expanded = expand_path(start_in);
                if !Path::new(&expanded).is_dir() {
                    return Err(TileError::single(
                        "startIn",
                        format!("directory not found: {expanded}"),
                    ));
                }
                *start_in = text::strip_wrapping_quotes(start_in).to_string();
            }
        }
        TileKind::Folder { target } if !template::has_template(target.as_str()) => {
            let expanded = expand_path(target);
            if !Path::new(&expanded).is_dir() {
                return Err(TileError::single(
                    "target",
                    format!("directory not found: {expanded}"),
                ));
            }
            *target = text::strip_wrapping_quotes(target).to_string();
        }
        _ => {}
    }

    Ok(tile)
}

/// Turn a freshly submitted app target into an absolute command.
fn resolve_custom_command(
    target: &str,
    ctx: &SanitizeContext<'_>,
) -> Result<(String, Vec<String>), TileError> {
    if template::has_template(target) {
        return Err(TileError::single(
            "target",
            "templates are not allowed in custom app targets",
        ));
    }
    let expanded = text::expand_env(target.trim());
    let (command, trailing) =
        resolve::split_app_command(&expanded, |candidate| Path::new(candidate).is_file());
    if command.is_empty() {
        return Err(TileError::single("target", "is required"));
    }

    if text::looks_like_path(&command) {
        if !Path::new(&command).is_file() {
            return Err(TileError::single(
                "target",
                format!("file not found: {command}"),
            ));
        }
        return Ok((command, trailing));
    }

    match ctx.programs.resolve(&command) {
        Some(path) => Ok((path, trailing)),
        None => Err(TileError::single(
            "target",
            format!("could not find a program matching '{command}'; enter the full path"),
        )),
    }
}
