//! Configuration: model, defaults, merge engine and persistence.

mod autodetect;
mod defaults;
mod merge;
mod model;
pub mod paths;
mod store;
pub mod template;

pub use autodetect::{Detected, autodetect_launchers, autodetect_with};
pub use defaults::{
    BUILTIN_TILE_IDS, DEFAULT_PORT, DefaultEnv, builtin_profiles, builtin_tiles,
    create_default_config, is_builtin_tile_id,
};
pub use merge::{MergeOptions, is_valid_launcher_key, merge_with_defaults, merge_with_env};
pub use model::{
    Config, Launcher, LogLevel, LoggingConfig, Page, Profile, REDACTED, RateLimitConfig,
    WowConfig, WowFolders,
};
pub use store::{
    ConfigStore, LoadReport, LoadSource, PersistError, PersistResult, StagedWrite, backup_path,
    read_config, write_config,
};
