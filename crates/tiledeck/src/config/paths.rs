//! Config file location.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

pub const APP_NAME: &str = "tiledeck";
pub const CONFIG_ENV: &str = "TILEDECK_CONFIG";
pub const CONFIG_FILE: &str = "config.json";
pub const DEV_CONFIG_FILE: &str = "tiledeck.config.json";

/// Inputs to config path resolution, separated from the process so tests
/// can drive every branch.
#[derive(Debug, Default, Clone)]
pub struct PathSources {
    pub explicit: Option<String>,
    pub env_override: Option<String>,
    pub development: bool,
    pub working_dir: Option<PathBuf>,
}

impl PathSources {
    pub fn from_process(explicit: Option<String>) -> Self {
        Self {
            explicit,
            env_override: env::var(CONFIG_ENV).ok().filter(|v| !v.trim().is_empty()),
            development: cfg!(debug_assertions),
            working_dir: env::current_dir().ok(),
        }
    }
}

pub fn expand_str_path(text: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(text).context("expanding path")?;
    Ok(PathBuf::from(expanded.to_string()))
}

fn with_file_name(path: PathBuf) -> PathBuf {
    if path.is_dir() {
        path.join(CONFIG_FILE)
    } else {
        path
    }
}

pub fn default_config_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir).join(APP_NAME));
    }

    if let Some(mut dir) = dirs::config_dir() {
        dir.push(APP_NAME);
        return Ok(dir);
    }

    dirs::home_dir()
        .map(|home| home.join(".config").join(APP_NAME))
        .ok_or_else(|| anyhow!("unable to determine configuration directory"))
}

/// Resolve the config file: explicit flag, then `TILEDECK_CONFIG`, then a
/// project-local file in development builds, then the per-user config dir.
pub fn resolve_config_path(sources: &PathSources) -> Result<PathBuf> {
    if let Some(explicit) = &sources.explicit {
        return expand_str_path(explicit).map(with_file_name);
    }
    if let Some(value) = &sources.env_override {
        return expand_str_path(value).map(with_file_name);
    }
    if sources.development
        && let Some(cwd) = &sources.working_dir
    {
        return Ok(cwd.join(DEV_CONFIG_FILE));
    }
    Ok(default_config_dir()?.join(CONFIG_FILE))
}

/// Resolve `dir` against the directory holding the config file.
pub fn resolve_relative(config_path: &Path, dir: &str) -> PathBuf {
    let dir = expand_str_path(dir).unwrap_or_else(|_| PathBuf::from(dir));
    if dir.is_absolute() {
        return dir;
    }
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(dir),
        _ => dir,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_wins_and_directories_get_file_name() {
        let dir = TempDir::new().unwrap();
        let sources = PathSources {
            explicit: Some(dir.path().display().to_string()),
            env_override: Some("/elsewhere/config.json".to_string()),
            development: true,
            working_dir: Some(PathBuf::from("/work")),
        };
        assert_eq!(
            resolve_config_path(&sources).unwrap(),
            dir.path().join(CONFIG_FILE)
        );
    }

    #[test]
    fn env_override_then_development_file() {
        let sources = PathSources {
            explicit: None,
            env_override: Some("/srv/tiledeck/custom.json".to_string()),
            development: true,
            working_dir: Some(PathBuf::from("/work")),
        };
        assert_eq!(
            resolve_config_path(&sources).unwrap(),
            PathBuf::from("/srv/tiledeck/custom.json")
        );

        let sources = PathSources {
            env_override: None,
            ..sources
        };
        assert_eq!(
            resolve_config_path(&sources).unwrap(),
            PathBuf::from("/work").join(DEV_CONFIG_FILE)
        );
    }

    #[test]
    fn packaged_builds_use_config_dir() {
        let sources = PathSources::default();
        let path = resolve_config_path(&sources).unwrap();
        assert!(path.ends_with(Path::new(APP_NAME).join(CONFIG_FILE)));
    }

    #[test]
    fn relative_dirs_resolve_against_config_dir() {
        let config = Path::new("/etc/tiledeck/config.json");
        assert_eq!(resolve_relative(config, "logs"), PathBuf::from("/etc/tiledeck/logs"));
        assert_eq!(resolve_relative(config, "/var/log/td"), PathBuf::from("/var/log/td"));
    }
}
