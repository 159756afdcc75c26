//! Tile data model.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A launchable unit shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tile {
    pub id: String,
    pub profile: String,
    pub page: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subtitle: String,
    #[serde(default)]
    pub builtin: bool,
    #[serde(default)]
    pub show_if: ShowIf,
    #[serde(default)]
    pub icon_mode: IconMode,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_data: Option<String>,
    #[serde(flatten)]
    pub kind: TileKind,
}

impl Tile {
    pub fn tile_type(&self) -> TileType {
        self.kind.tile_type()
    }
}

/// Type-specific payload, tagged by `type` in the persisted form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TileKind {
    Action {
        action: NamedAction,
    },
    #[serde(rename_all = "camelCase")]
    App {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        launcher_key: Option<String>,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        target: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<String>,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        start_in: String,
    },
    Folder {
        target: String,
    },
    Url {
        target: String,
    },
    Protocol {
        target: String,
    },
}

impl TileKind {
    pub fn tile_type(&self) -> TileType {
        match self {
            TileKind::Action { .. } => TileType::Action,
            TileKind::App { .. } => TileType::App,
            TileKind::Folder { .. } => TileType::Folder,
            TileKind::Url { .. } => TileType::Url,
            TileKind::Protocol { .. } => TileType::Protocol,
        }
    }
}

/// Closed set of tile types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileType {
    Action,
    App,
    Folder,
    Url,
    Protocol,
}

impl FromStr for TileType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "action" => Ok(TileType::Action),
            "app" => Ok(TileType::App),
            "folder" => Ok(TileType::Folder),
            "url" => Ok(TileType::Url),
            "protocol" => Ok(TileType::Protocol),
            _ => Err(()),
        }
    }
}

/// Visibility predicate evaluated against live process state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShowIf {
    #[default]
    #[serde(rename = "")]
    Always,
    #[serde(rename = "wowRunning")]
    WowRunning,
    #[serde(rename = "wowNotRunning")]
    WowNotRunning,
}

impl ShowIf {
    /// Lenient parse: anything unrecognized means "always visible".
    pub fn parse_lenient(value: &str) -> Self {
        match value {
            "wowRunning" => ShowIf::WowRunning,
            "wowNotRunning" => ShowIf::WowNotRunning,
            _ => ShowIf::Always,
        }
    }

    pub fn is_visible(self, wow_running: bool) -> bool {
        match self {
            ShowIf::Always => true,
            ShowIf::WowRunning => wow_running,
            ShowIf::WowNotRunning => !wow_running,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IconMode {
    #[default]
    Auto,
    Emoji,
    Image,
}

impl IconMode {
    pub fn parse_lenient(value: &str) -> Self {
        match value {
            "emoji" => IconMode::Emoji,
            "image" => IconMode::Image,
            _ => IconMode::Auto,
        }
    }
}

/// Whitelisted OS actions a tile of type `action` may trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NamedAction {
    Terminal,
    Powershell,
    Explorer,
    TaskManager,
    Browser,
    OpenWorkspace,
    WowStart,
    WowAddons,
    WowLogs,
    WowWtf,
}

impl NamedAction {
    pub const ALL: [NamedAction; 10] = [
        NamedAction::Terminal,
        NamedAction::Powershell,
        NamedAction::Explorer,
        NamedAction::TaskManager,
        NamedAction::Browser,
        NamedAction::OpenWorkspace,
        NamedAction::WowStart,
        NamedAction::WowAddons,
        NamedAction::WowLogs,
        NamedAction::WowWtf,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NamedAction::Terminal => "terminal",
            NamedAction::Powershell => "powershell",
            NamedAction::Explorer => "explorer",
            NamedAction::TaskManager => "taskManager",
            NamedAction::Browser => "browser",
            NamedAction::OpenWorkspace => "openWorkspace",
            NamedAction::WowStart => "wowStart",
            NamedAction::WowAddons => "wowAddons",
            NamedAction::WowLogs => "wowLogs",
            NamedAction::WowWtf => "wowWtf",
        }
    }
}

impl FromStr for NamedAction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NamedAction::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or(())
    }
}

impl fmt::Display for NamedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
