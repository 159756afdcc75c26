//! Running-process detection with a short-lived cache.

use std::collections::HashSet;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::text;

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(4);
pub const STATUS_TTL: Duration = Duration::from_secs(3);

/// Lists running process image names, lower-cased.
#[async_trait]
pub trait ProcessProbe: Send + Sync {
    async fn running(&self) -> Result<HashSet<String>>;
}

#[derive(Debug, Clone)]
pub struct SystemProcessProbe {
    timeout: Duration,
}

impl Default for SystemProcessProbe {
    fn default() -> Self {
        Self {
            timeout: PROBE_TIMEOUT,
        }
    }
}

#[async_trait]
impl ProcessProbe for SystemProcessProbe {
    async fn running(&self) -> Result<HashSet<String>> {
        let mut cmd = if cfg!(windows) {
            let mut cmd = Command::new("tasklist");
            cmd.args(["/FO", "CSV", "/NH"]);
            cmd
        } else {
            let mut cmd = Command::new("ps");
            cmd.args(["-A", "-o", "comm="]);
            cmd
        };
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .context("process listing timed out")?
            .context("failed to list processes")?;
        if !output.status.success() {
            bail!("process listing exited with {}", output.status);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(if cfg!(windows) {
            parse_tasklist(&stdout)
        } else {
            parse_ps(&stdout)
        })
    }
}

/// Image names from `tasklist /FO CSV /NH` output.
pub fn parse_tasklist(output: &str) -> HashSet<String> {
    output
        .lines()
        .filter_map(|line| {
            let rest = line.trim().strip_prefix('"')?;
            let name = rest.split('"').next()?;
            (!name.is_empty()).then(|| name.to_lowercase())
        })
        .collect()
}

/// Command names from `ps -A -o comm=` output.
pub fn parse_ps(output: &str) -> HashSet<String> {
    output
        .lines()
        .map(|line| text::file_name_of(line.trim()).to_lowercase())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Case-insensitive match with or without a trailing `.exe`.
pub fn name_matches(running: &HashSet<String>, name: &str) -> bool {
    let name = name.trim().to_lowercase();
    if name.is_empty() {
        return false;
    }
    let bare = name.strip_suffix(".exe").unwrap_or(&name);
    running.contains(bare) || running.contains(&format!("{bare}.exe"))
}

struct Snapshot {
    taken: Instant,
    names: Arc<HashSet<String>>,
}

/// Memoizes the process list for [`STATUS_TTL`].
pub struct ProcessStatusCache {
    probe: Arc<dyn ProcessProbe>,
    ttl: Duration,
    snapshot: Mutex<Option<Snapshot>>,
}

impl ProcessStatusCache {
    pub fn new(probe: Arc<dyn ProcessProbe>) -> Self {
        Self::with_ttl(probe, STATUS_TTL)
    }

    pub fn with_ttl(probe: Arc<dyn ProcessProbe>, ttl: Duration) -> Self {
        Self {
            probe,
            ttl,
            snapshot: Mutex::new(None),
        }
    }

    /// Current process names. A failed probe reads as nothing running.
    pub async fn running(&self) -> Arc<HashSet<String>> {
        let mut snapshot = self.snapshot.lock().await;
        if let Some(cached) = snapshot.as_ref()
            && cached.taken.elapsed() < self.ttl
        {
            return cached.names.clone();
        }

        let names = match self.probe.running().await {
            Ok(names) => names,
            Err(e) => {
                warn!("process probe failed: {:#}", e);
                HashSet::new()
            }
        };
        debug!(count = names.len(), "refreshed process list");
        let names = Arc::new(names);
        *snapshot = Some(Snapshot {
            taken: Instant::now(),
            names: names.clone(),
        });
        names
    }

    pub async fn is_running(&self, name: &str) -> bool {
        name_matches(self.running().await.as_ref(), name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProbe {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProcessProbe for CountingProbe {
        async fn running(&self) -> Result<HashSet<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(["wow.exe".to_string()].into_iter().collect())
        }
    }

    struct FailingProbe;

    #[async_trait]
    impl ProcessProbe for FailingProbe {
        async fn running(&self) -> Result<HashSet<String>> {
            bail!("no tasklist here")
        }
    }

    #[test]
    fn parses_tasklist_csv() {
        let out = "\"System Idle Process\",\"0\",\"Services\",\"0\",\"8 K\"\r\n\"Wow.exe\",\"4242\",\"Console\",\"1\",\"2,000,000 K\"\r\n";
        let names = parse_tasklist(out);
        assert!(names.contains("wow.exe"));
        assert!(names.contains("system idle process"));
    }

    #[test]
    fn parses_ps_output() {
        let names = parse_ps("  systemd\n/usr/bin/Xorg\nbash\n\n");
        assert!(names.contains("xorg"));
        assert!(names.contains("bash"));
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn matches_with_or_without_exe() {
        let running: HashSet<String> = ["wow.exe".to_string(), "wine".to_string()].into();
        assert!(name_matches(&running, "Wow.exe"));
        assert!(name_matches(&running, "WOW"));
        assert!(name_matches(&running, "wine.exe"));
        assert!(!name_matches(&running, "wowclassic.exe"));
        assert!(!name_matches(&running, ""));
    }

    #[tokio::test]
    async fn cache_reuses_snapshot_within_ttl() {
        let probe = Arc::new(CountingProbe {
            calls: AtomicUsize::new(0),
        });
        let cache = ProcessStatusCache::new(probe.clone());
        assert!(cache.is_running("Wow.exe").await);
        assert!(cache.is_running("wow").await);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);

        let uncached = ProcessStatusCache::with_ttl(probe.clone(), Duration::ZERO);
        uncached.running().await;
        uncached.running().await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failed_probe_reads_as_not_running() {
        let cache = ProcessStatusCache::new(Arc::new(FailingProbe));
        assert!(!cache.is_running("Wow.exe").await);
    }
}
