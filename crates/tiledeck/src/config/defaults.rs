//! Built-in defaults: launchers, profiles, tiles and environment-derived paths.

use std::collections::BTreeMap;

use serde_json::Value;

use super::model::{
    Config, Launcher, LogLevel, LoggingConfig, Page, Profile, RateLimitConfig, WowConfig,
    WowFolders,
};
use crate::admission::generate_token;
use crate::text;
use crate::tiles::{IconMode, NamedAction, ShowIf, Tile, TileKind};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3210;
pub const DEFAULT_RATE_WINDOW_MS: u64 = 10_000;
pub const DEFAULT_RATE_MAX: u32 = 120;
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_LOG_MAX_FILES: u32 = 14;
pub const DEFAULT_WOW_PROCESS: &str = "Wow.exe";

/// Environment-derived locations used to seed defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultEnv {
    pub program_files: String,
    pub program_files_x86: String,
    pub local_app_data: String,
    pub current_dir: String,
}

impl DefaultEnv {
    pub fn from_process() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            program_files: var("ProgramFiles").unwrap_or_else(|| r"C:\Program Files".to_string()),
            program_files_x86: var("ProgramFiles(x86)")
                .unwrap_or_else(|| r"C:\Program Files (x86)".to_string()),
            local_app_data: var("LOCALAPPDATA")
                .or_else(|| dirs::data_local_dir().map(|d| d.display().to_string()))
                .unwrap_or_else(|| r"C:\Users\Default\AppData\Local".to_string()),
            current_dir: std::env::current_dir()
                .map(|d| d.display().to_string())
                .unwrap_or_else(|_| ".".to_string()),
        }
    }

    fn wow_root(&self) -> String {
        join(&self.program_files_x86, &["World of Warcraft", "_retail_"])
    }
}

/// Join path segments using the separator style of `base`.
fn join(base: &str, parts: &[&str]) -> String {
    let sep = if base.contains('\\') || !base.contains('/') {
        '\\'
    } else {
        '/'
    };
    let mut out = base.trim_end_matches(['\\', '/']).to_string();
    for part in parts {
        out.push(sep);
        out.push_str(part);
    }
    out
}

pub const BUILTIN_TILE_IDS: [&str; 11] = [
    "vscode-workspace",
    "terminal",
    "powershell",
    "workspace-folder",
    "task-manager",
    "explorer",
    "wow-start",
    "wow-addons",
    "wow-logs",
    "wow-wtf",
    "battlenet",
];

pub fn is_builtin_tile_id(id: &str) -> bool {
    BUILTIN_TILE_IDS.contains(&id)
}

pub fn builtin_launchers(env: &DefaultEnv) -> BTreeMap<String, Launcher> {
    let pf = env.program_files.as_str();
    let pf86 = env.program_files_x86.as_str();
    let local = env.local_app_data.as_str();

    let launcher = |label: &str, candidates: Vec<String>| Launcher {
        label: label.to_string(),
        path: String::new(),
        candidates,
    };

    BTreeMap::from([
        (
            "vscode".to_string(),
            launcher(
                "VS Code",
                vec![
                    join(local, &["Programs", "Microsoft VS Code", "Code.exe"]),
                    join(pf, &["Microsoft VS Code", "Code.exe"]),
                ],
            ),
        ),
        (
            "chrome".to_string(),
            launcher(
                "Google Chrome",
                vec![
                    join(pf, &["Google", "Chrome", "Application", "chrome.exe"]),
                    join(pf86, &["Google", "Chrome", "Application", "chrome.exe"]),
                    join(local, &["Google", "Chrome", "Application", "chrome.exe"]),
                ],
            ),
        ),
        (
            "wow".to_string(),
            launcher(
                "World of Warcraft",
                vec![
                    join(&env.wow_root(), &["Wow.exe"]),
                    join(pf, &["World of Warcraft", "_retail_", "Wow.exe"]),
                ],
            ),
        ),
        (
            "battlenet".to_string(),
            launcher(
                "Battle.net",
                vec![
                    join(pf86, &["Battle.net", "Battle.net Launcher.exe"]),
                    join(pf, &["Battle.net", "Battle.net Launcher.exe"]),
                ],
            ),
        ),
    ])
}

pub fn builtin_profiles() -> Vec<Profile> {
    vec![
        Profile {
            id: "work".to_string(),
            label: "Work".to_string(),
            pages: vec![Page::new("main", "Main"), Page::new("tools", "Tools")],
        },
        Profile {
            id: "gaming".to_string(),
            label: "Gaming".to_string(),
            pages: vec![Page::new("main", "Main")],
        },
    ]
}

fn tile(id: &str, profile: &str, page: &str, label: &str, icon: &str, kind: TileKind) -> Tile {
    Tile {
        id: id.to_string(),
        profile: profile.to_string(),
        page: page.to_string(),
        label: label.to_string(),
        subtitle: String::new(),
        builtin: true,
        show_if: ShowIf::Always,
        icon_mode: IconMode::Emoji,
        icon: icon.to_string(),
        icon_data: None,
        kind,
    }
}

fn folder(target: &str) -> TileKind {
    TileKind::Folder {
        target: target.to_string(),
    }
}

fn launcher_app(key: &str, args: &[&str]) -> TileKind {
    TileKind::App {
        launcher_key: Some(key.to_string()),
        target: String::new(),
        args: args.iter().map(|a| a.to_string()).collect(),
        start_in: String::new(),
    }
}

pub fn builtin_tiles() -> Vec<Tile> {
    let action = |action| TileKind::Action { action };
    let mut tiles = vec![
        tile(
            "vscode-workspace",
            "work",
            "main",
            "VS Code",
            "🧑‍💻",
            launcher_app("vscode", &["{{workspaceDir}}"]),
        ),
        tile("terminal", "work", "main", "Terminal", "⌨️", action(NamedAction::Terminal)),
        tile(
            "powershell",
            "work",
            "main",
            "PowerShell",
            "💠",
            action(NamedAction::Powershell),
        ),
        tile(
            "workspace-folder",
            "work",
            "main",
            "Workspace",
            "📁",
            folder("{{workspaceDir}}"),
        ),
        tile(
            "task-manager",
            "work",
            "tools",
            "Task Manager",
            "📊",
            action(NamedAction::TaskManager),
        ),
        tile("explorer", "work", "tools", "Explorer", "🗂️", action(NamedAction::Explorer)),
        tile(
            "wow-start",
            "gaming",
            "main",
            "Play WoW",
            "⚔️",
            action(NamedAction::WowStart),
        ),
        tile(
            "wow-addons",
            "gaming",
            "main",
            "AddOns",
            "🧩",
            folder("{{wow.folders.addons}}"),
        ),
        tile("wow-logs", "gaming", "main", "Logs", "📜", folder("{{wow.folders.logs}}")),
        tile("wow-wtf", "gaming", "main", "WTF", "⚙️", folder("{{wow.folders.wtf}}")),
        tile(
            "battlenet",
            "gaming",
            "main",
            "Battle.net",
            "🎮",
            launcher_app("battlenet", &[]),
        ),
    ];
    if let Some(start) = tiles.iter_mut().find(|t| t.id == "wow-start") {
        start.show_if = ShowIf::WowNotRunning;
    }
    tiles
}

/// Build a fully populated default configuration.
///
/// Recognized legacy fields in `raw` seed the result: `paths.<launcher>`
/// becomes the launcher path, `workspace` the workspace dir and `wowProcess`
/// the WoW process name.
pub fn create_default_config(raw: &Value, env: &DefaultEnv) -> Config {
    let wow_root = env.wow_root();
    let mut config = Config {
        host: DEFAULT_HOST.to_string(),
        port: DEFAULT_PORT,
        token: generate_token(),
        workspace_dir: env.current_dir.clone(),
        rate_limit: RateLimitConfig {
            window_ms: DEFAULT_RATE_WINDOW_MS,
            max: DEFAULT_RATE_MAX,
        },
        wow: WowConfig {
            process_name: DEFAULT_WOW_PROCESS.to_string(),
            folders: WowFolders {
                addons: join(&wow_root, &["Interface", "AddOns"]),
                logs: join(&wow_root, &["Logs"]),
                wtf: join(&wow_root, &["WTF"]),
            },
        },
        logging: LoggingConfig {
            enabled: true,
            dir: DEFAULT_LOG_DIR.to_string(),
            max_files: DEFAULT_LOG_MAX_FILES,
            level: LogLevel::Info,
        },
        launchers: builtin_launchers(env),
        profiles: builtin_profiles(),
        tiles: builtin_tiles(),
    };

    if let Some(paths) = raw.get("paths").and_then(Value::as_object) {
        for (key, launcher) in config.launchers.iter_mut() {
            if let Some(path) = text::clean_value(paths.get(key), 1024)
                && !path.is_empty()
            {
                launcher.path = path;
            }
        }
    }
    if let Some(workspace) = text::clean_value(raw.get("workspace"), 1024)
        && text::looks_absolute(&workspace)
    {
        config.workspace_dir = workspace;
    }
    if let Some(process) = text::clean_value(raw.get("wowProcess"), 128)
        && !process.is_empty()
    {
        config.wow.process_name = process;
    }

    config
}
