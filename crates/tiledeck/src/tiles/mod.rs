//! Tiles: model, validation and target resolution.

mod model;
pub mod resolve;
mod validate;

pub use model::{IconMode, NamedAction, ShowIf, Tile, TileKind, TileType};
pub use validate::{
    SanitizeContext, TileError, Violation, generate_custom_id, normalize_tile,
    sanitize_custom_tile,
};

use crate::config::Config;

/// Tiles a dashboard should display.
///
/// Tiles pointing at an unknown profile or page are skipped, as are tiles
/// whose `showIf` predicate fails. Optional filters narrow by profile/page.
pub fn visible_tiles<'a>(
    config: &'a Config,
    wow_running: bool,
    profile: Option<&str>,
    page: Option<&str>,
) -> Vec<&'a Tile> {
    config
        .tiles
        .iter()
        .filter(|tile| config.has_page(&tile.profile, &tile.page))
        .filter(|tile| profile.is_none_or(|p| tile.profile == p))
        .filter(|tile| page.is_none_or(|p| tile.page == p))
        .filter(|tile| tile.show_if.is_visible(wow_running))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DefaultEnv, MergeOptions, merge_with_env};
    use serde_json::json;

    #[test]
    fn visibility_respects_show_if_and_references() {
        let env = DefaultEnv {
            program_files: r"C:\Program Files".to_string(),
            program_files_x86: r"C:\Program Files (x86)".to_string(),
            local_app_data: r"C:\Users\me\AppData\Local".to_string(),
            current_dir: r"C:\work".to_string(),
        };
        let raw = json!({
            "tiles": [
                { "id": "orphan", "profile": "ghost", "page": "main", "label": "Orphan",
                  "type": "url", "target": "example.com" }
            ]
        });
        let config = merge_with_env(&raw, MergeOptions { autodetect: false }, &env);
        assert!(config.tile("orphan").is_some());

        let ids = |tiles: Vec<&Tile>| tiles.iter().map(|t| t.id.clone()).collect::<Vec<_>>();

        let idle = ids(visible_tiles(&config, false, Some("gaming"), None));
        assert!(idle.contains(&"wow-start".to_string()));
        assert!(!idle.contains(&"orphan".to_string()));

        let playing = ids(visible_tiles(&config, true, Some("gaming"), Some("main")));
        assert!(!playing.contains(&"wow-start".to_string()));
        assert!(playing.contains(&"wow-addons".to_string()));

        let all = ids(visible_tiles(&config, false, None, None));
        assert!(!all.contains(&"orphan".to_string()));
        assert!(all.contains(&"terminal".to_string()));
    }
}
