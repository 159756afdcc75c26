//! Launcher autodetection from OS-standard install locations.

use std::path::Path;

use tracing::debug;

use super::model::Config;
use crate::text;

/// A launcher whose path was filled in.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Detected {
    pub key: String,
    pub path: String,
}

pub fn autodetect_launchers(config: &mut Config, only: Option<&str>) -> Vec<Detected> {
    autodetect_with(config, only, |path| Path::new(path).is_file())
}

/// Fill every empty or stale launcher path with its first existing
/// candidate. `only` restricts the pass to a single launcher key.
pub fn autodetect_with<F>(config: &mut Config, only: Option<&str>, exists: F) -> Vec<Detected>
where
    F: Fn(&str) -> bool,
{
    let mut detected = Vec::new();
    for (key, launcher) in config.launchers.iter_mut() {
        if only.is_some_and(|k| k != key) {
            continue;
        }
        let current = text::expand_and_unquote(&launcher.path);
        if !current.is_empty() && exists(&current) {
            continue;
        }
        let found = launcher
            .candidates
            .iter()
            .find(|candidate| exists(&text::expand_and_unquote(candidate)));
        if let Some(candidate) = found {
            debug!(launcher = %key, path = %candidate, "autodetected launcher");
            launcher.path = candidate.clone();
            detected.push(Detected {
                key: key.clone(),
                path: candidate.clone(),
            });
        }
    }
    detected
}
