//! Tracing subscriber setup: console output plus an optional rolling file.

use std::env;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;
use crate::config::paths::resolve_relative;

pub const LOG_FILE_PREFIX: &str = "tiledeck";
pub const LOG_FILE_SUFFIX: &str = "log";

/// Console flags from the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOptions {
    pub quiet: bool,
    pub verbose: u8,
    pub debug: bool,
    pub trace: bool,
    pub json: bool,
    pub no_color: bool,
    pub diagnostics: bool,
}

impl LogOptions {
    /// Filter level: CLI flags override the configured level.
    pub fn level(&self, configured: &LoggingConfig) -> &'static str {
        if self.trace {
            "trace"
        } else if self.debug {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => configured.level.as_filter(),
                1 => "debug",
                _ => "trace",
            }
        }
    }

    fn ansi(&self) -> bool {
        !(self.no_color || env::var_os("NO_COLOR").is_some() || !io::stderr().is_terminal())
    }
}

/// Where and how many rotated log files to keep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLog {
    pub dir: PathBuf,
    pub max_files: usize,
}

impl FileLog {
    /// File logging settings, or `None` when disabled. A relative directory
    /// resolves against the config file's directory.
    pub fn from_config(config: &LoggingConfig, config_path: &Path) -> Option<Self> {
        config.enabled.then(|| Self {
            dir: resolve_relative(config_path, &config.dir),
            max_files: config.max_files as usize,
        })
    }

    fn appender(&self) -> Result<RollingFileAppender> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating log directory {}", self.dir.display()))?;
        RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(LOG_FILE_PREFIX)
            .filename_suffix(LOG_FILE_SUFFIX)
            .max_log_files(self.max_files)
            .build(&self.dir)
            .with_context(|| format!("opening log file in {}", self.dir.display()))
    }
}

/// Install the global subscriber. `RUST_LOG` takes precedence over every
/// other level source. The returned guard flushes the file writer on drop
/// and must live as long as the process.
pub fn init_logging(
    options: &LogOptions,
    config: &LoggingConfig,
    file: Option<&FileLog>,
) -> Result<Option<WorkerGuard>> {
    let level = options.level(config);
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tiledeck={level},tower_http={level}")));

    let json_layer = options.json.then(|| fmt::layer().json().with_writer(io::stderr));
    let text_layer = (!options.json).then(|| {
        fmt::layer()
            .with_writer(io::stderr)
            .with_ansi(options.ansi())
            .with_target(options.diagnostics)
            .with_file(options.diagnostics)
            .with_line_number(options.diagnostics)
    });

    let (file_layer, guard) = match file {
        Some(file) => {
            let (writer, guard) = tracing_appender::non_blocking(file.appender()?);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(file_layer)
        .try_init()
        .ok();

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    fn logging(level: LogLevel) -> LoggingConfig {
        LoggingConfig {
            enabled: true,
            dir: "logs".to_string(),
            max_files: 14,
            level,
        }
    }

    #[test]
    fn cli_flags_override_configured_level() {
        let config = logging(LogLevel::Warn);
        assert_eq!(LogOptions::default().level(&config), "warn");
        let verbose = LogOptions {
            verbose: 1,
            ..Default::default()
        };
        assert_eq!(verbose.level(&config), "debug");
        let trace = LogOptions {
            trace: true,
            quiet: true,
            ..Default::default()
        };
        assert_eq!(trace.level(&config), "trace");
        let quiet = LogOptions {
            quiet: true,
            ..Default::default()
        };
        assert_eq!(quiet.level(&config), "error");
    }

    #[test]
    fn file_log_follows_config() {
        let path = Path::new("/srv/tiledeck/config.json");
        let file = FileLog::from_config(&logging(LogLevel::Info), path).unwrap();
        assert_eq!(file.dir, PathBuf::from("/srv/tiledeck/logs"));
        assert_eq!(file.max_files, 14);

        let mut disabled = logging(LogLevel::Info);
        disabled.enabled = false;
        assert!(FileLog::from_config(&disabled, path).is_none());
    }
}
