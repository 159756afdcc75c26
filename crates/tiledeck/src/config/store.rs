//! In-memory configuration with atomic on-disk persistence.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

use super::merge::{MergeOptions, merge_with_defaults};
use super::model::Config;

pub type PersistResult<T> = Result<T, PersistError>;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("persist task failed: {0}")]
    Task(String),
}

impl PersistError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// `<name>.bak` next to `path`.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "config.json".into());
    name.push(".bak");
    path.with_file_name(name)
}

/// A fully written temp file waiting to replace its target.
///
/// Dropping it without calling [`StagedWrite::commit`] removes the temp file
/// and leaves the target untouched.
pub struct StagedWrite {
    temp: NamedTempFile,
    target: PathBuf,
}

impl StagedWrite {
    pub fn stage(target: &Path, bytes: &[u8]) -> PersistResult<Self> {
        let dir = match target.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| PersistError::io(&dir, e))?;

        let mut temp = NamedTempFile::new_in(&dir).map_err(|e| PersistError::io(&dir, e))?;
        temp.write_all(bytes)
            .and_then(|()| temp.as_file().sync_all())
            .map_err(|e| PersistError::io(temp.path(), e))?;

        Ok(Self {
            temp,
            target: target.to_path_buf(),
        })
    }

    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    /// Copy the current target to `.bak`, then rename the temp file over it.
    pub fn commit(self) -> PersistResult<()> {
        if self.target.is_file() {
            let backup = backup_path(&self.target);
            fs::copy(&self.target, &backup).map_err(|e| PersistError::io(&backup, e))?;
        }
        self.temp
            .persist(&self.target)
            .map_err(|e| PersistError::io(&self.target, e.error))?;
        Ok(())
    }
}

/// Serialize `config` as pretty JSON and write it atomically.
pub fn write_config(path: &Path, config: &Config) -> PersistResult<()> {
    let mut bytes = serde_json::to_vec_pretty(config)?;
    bytes.push(b'\n');
    StagedWrite::stage(path, &bytes)?.commit()
}

/// Where the loaded configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    /// Parsed from the config file.
    File,
    /// The config file was unreadable; parsed from `.bak`.
    Backup,
    /// Neither file parsed; pure defaults.
    Defaults,
    /// No config file existed; defaults were written.
    Created,
}

/// Outcome of a load: where the config came from and what went wrong on
/// the way. Loading happens before logging is installed, so problems are
/// returned for the caller to report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub source: LoadSource,
    pub problems: Vec<String>,
}

fn read_json(path: &Path) -> io::Result<Value> {
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn token_of(raw: &Value) -> Option<&str> {
    raw.get("token").and_then(Value::as_str)
}

/// Read and merge the config at `path` without touching the disk.
pub fn read_config(path: &Path, options: MergeOptions) -> (Config, LoadReport, bool) {
    let mut problems = Vec::new();
    let (raw, source) = match read_json(path) {
        Ok(raw) => (raw, LoadSource::File),
        Err(err) if err.kind() == io::ErrorKind::NotFound => (Value::Null, LoadSource::Created),
        Err(err) => {
            problems.push(format!("failed to read {}: {err}", path.display()));
            let backup = backup_path(path);
            match read_json(&backup) {
                Ok(raw) => (raw, LoadSource::Backup),
                Err(err) => {
                    problems.push(format!("backup {} unusable: {err}", backup.display()));
                    (Value::Null, LoadSource::Defaults)
                }
            }
        }
    };
    let config = merge_with_defaults(&raw, options);
    let token_generated = token_of(&raw) != Some(config.token.as_str());
    (config, LoadReport { source, problems }, token_generated)
}

/// Single in-memory source of truth for the configuration.
pub struct ConfigStore {
    path: PathBuf,
    current: RwLock<Config>,
    write_gate: Mutex<()>,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            path: path.into(),
            current: RwLock::new(config),
            write_gate: Mutex::new(()),
        }
    }

    /// Load from disk, falling back to `.bak` and then to defaults.
    ///
    /// A missing file, or a file whose token had to be generated, is written
    /// back immediately.
    pub fn load(path: impl Into<PathBuf>, options: MergeOptions) -> (Self, LoadReport) {
        let path = path.into();
        let (config, mut report, token_generated) = read_config(&path, options);

        let needs_write = report.source == LoadSource::Created
            || (report.source == LoadSource::File && token_generated);
        if needs_write && let Err(err) = write_config(&path, &config) {
            report
                .problems
                .push(format!("failed to write {}: {err}", path.display()));
        }

        (Self::new(path, config), report)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Synchronous read for startup code running outside the async runtime.
    pub fn read_blocking<R>(&self, f: impl FnOnce(&Config) -> R) -> R {
        f(&self.current.blocking_read())
    }

    pub async fn snapshot(&self) -> Config {
        self.current.read().await.clone()
    }

    pub async fn read<R>(&self, f: impl FnOnce(&Config) -> R) -> R {
        let guard = self.current.read().await;
        f(&guard)
    }

    /// Apply a synchronous edit. The change is kept in memory even if the
    /// following [`ConfigStore::persist`] fails.
    pub async fn mutate<R>(&self, f: impl FnOnce(&mut Config) -> R) -> R {
        let mut guard = self.current.write().await;
        f(&mut guard)
    }

    pub async fn replace(&self, config: Config) {
        *self.current.write().await = config;
    }

    /// Write the current configuration to disk atomically.
    pub async fn persist(&self) -> PersistResult<()> {
        let _gate = self.write_gate.lock().await;
        let config = self.snapshot().await;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_config(&path, &config))
            .await
            .map_err(|e| PersistError::Task(e.to_string()))?
    }
}
