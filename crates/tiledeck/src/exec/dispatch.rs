//! Turn tiles and named actions into launch plans.

use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::config::Config;
use crate::text;
use crate::tiles::{NamedAction, Tile, TileKind, resolve};

/// What to hand to the OS. Every variant is an argument vector; nothing is
/// ever passed through a shell string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LaunchPlan {
    Spawn {
        program: String,
        args: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        cwd: Option<String>,
    },
    /// Open with the OS shell handler (folders, URLs, protocols, shortcuts).
    Open { target: String },
}

impl LaunchPlan {
    /// The resolved target reported back to clients.
    pub fn target(&self) -> &str {
        match self {
            LaunchPlan::Spawn { program, .. } => program,
            LaunchPlan::Open { target } => target,
        }
    }

    fn spawn(program: &str, args: Vec<String>) -> Self {
        LaunchPlan::Spawn {
            program: program.to_string(),
            args,
            cwd: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown launcher '{0}'")]
    UnknownLauncher(String),

    #[error("launcher '{0}' has no path configured")]
    LauncherNotSet(String),

    #[error("target is empty")]
    EmptyTarget,

    #[error("target not found: {path}")]
    MissingTarget { path: String },

    #[error("folder not found: {path}")]
    MissingFolder { path: String },

    #[error("invalid url: {target}")]
    InvalidUrl { target: String },

    #[error("invalid protocol target: {target}")]
    InvalidProtocol { target: String },

    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

fn launcher_program(config: &Config, key: &str) -> Result<String, DispatchError> {
    if !config.launchers.contains_key(key) {
        return Err(DispatchError::UnknownLauncher(key.to_string()));
    }
    let path = resolve::launcher_path(config, key);
    if path.is_empty() {
        return Err(DispatchError::LauncherNotSet(key.to_string()));
    }
    Ok(path)
}

fn open_folder(path: String) -> Result<LaunchPlan, DispatchError> {
    if path.is_empty() {
        return Err(DispatchError::EmptyTarget);
    }
    if !Path::new(&path).is_dir() {
        return Err(DispatchError::MissingFolder { path });
    }
    Ok(LaunchPlan::Open { target: path })
}

/// Shortcuts go to the shell; path-shaped commands must exist.
fn command_plan(
    command: String,
    args: Vec<String>,
    cwd: Option<String>,
) -> Result<LaunchPlan, DispatchError> {
    if command.is_empty() {
        return Err(DispatchError::EmptyTarget);
    }
    if text::looks_like_path(&command) && !Path::new(&command).is_file() {
        return Err(DispatchError::MissingTarget { path: command });
    }
    if text::extension_of(&command) == ".lnk" {
        return Ok(LaunchPlan::Open { target: command });
    }
    Ok(LaunchPlan::Spawn {
        program: command,
        args,
        cwd,
    })
}

pub fn plan_tile(tile: &Tile, config: &Config) -> Result<LaunchPlan, DispatchError> {
    match &tile.kind {
        TileKind::Action { action } => plan_action(*action, config),
        TileKind::App {
            launcher_key,
            target,
            args,
            start_in,
        } => {
            let mut resolved_args: Vec<String> = args
                .iter()
                .map(|arg| resolve::resolve_value(arg, config))
                .filter(|arg| !arg.is_empty())
                .collect();

            let cwd = match resolve::resolve_value(start_in, config) {
                dir if dir.is_empty() => None,
                dir if Path::new(&dir).is_dir() => Some(dir),
                dir => return Err(DispatchError::MissingFolder { path: dir }),
            };

            let command = match launcher_key {
                Some(key) => launcher_program(config, key)?,
                None => {
                    let resolved = resolve::resolve_value(target, config);
                    let (command, mut trailing) =
                        resolve::split_app_command(&resolved, |p| Path::new(p).is_file());
                    trailing.append(&mut resolved_args);
                    resolved_args = trailing;
                    command
                }
            };
            command_plan(command, resolved_args, cwd)
        }
        TileKind::Folder { target } => open_folder(resolve::resolve_value(target, config)),
        TileKind::Url { target } => {
            let resolved = resolve::resolve_value(target, config);
            resolve::normalize_url(&resolved)
                .map(|url| LaunchPlan::Open { target: url })
                .ok_or(DispatchError::InvalidUrl { target: resolved })
        }
        TileKind::Protocol { target } => {
            let resolved = resolve::resolve_value(target, config);
            if resolve::is_protocol_target(&resolved) {
                Ok(LaunchPlan::Open { target: resolved })
            } else {
                Err(DispatchError::InvalidProtocol { target: resolved })
            }
        }
    }
}

pub fn plan_action(action: NamedAction, config: &Config) -> Result<LaunchPlan, DispatchError> {
    let workspace = text::expand_and_unquote(&config.workspace_dir);
    let folder = |raw: &str| open_folder(text::expand_and_unquote(raw));

    match action {
        NamedAction::Terminal => Ok(LaunchPlan::spawn("wt.exe", vec!["-d".to_string(), workspace])),
        NamedAction::Powershell => Ok(LaunchPlan::spawn(
            "powershell.exe",
            vec![
                "-NoExit".to_string(),
                "-Command".to_string(),
                format!("Set-Location -LiteralPath {}", text::powershell_literal(&workspace)),
            ],
        )),
        NamedAction::Explorer => Ok(LaunchPlan::spawn("explorer.exe", Vec::new())),
        NamedAction::TaskManager => Ok(LaunchPlan::spawn("taskmgr.exe", Vec::new())),
        NamedAction::Browser => {
            command_plan(launcher_program(config, "chrome")?, Vec::new(), None)
        }
        NamedAction::WowStart => command_plan(launcher_program(config, "wow")?, Vec::new(), None),
        NamedAction::OpenWorkspace => open_folder(workspace),
        NamedAction::WowAddons => folder(&config.wow.folders.addons),
        NamedAction::WowLogs => folder(&config.wow.folders.logs),
        NamedAction::WowWtf => folder(&config.wow.folders.wtf),
    }
}
