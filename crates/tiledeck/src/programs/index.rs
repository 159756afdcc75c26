//! Searchable index of launchable files.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::resolver::ProgramLookup;
use crate::config::Launcher;
use crate::text;

pub const LAUNCHABLE_EXTENSIONS: [&str; 5] = [".exe", ".lnk", ".bat", ".cmd", ".com"];
pub const MAX_FILES_PER_ROOT: usize = 4_000;
pub const MAX_FILES_TOTAL: usize = 12_000;
pub const INDEX_TTL: Duration = Duration::from_secs(5 * 60);

const NOISE_TOKENS: [&str; 8] = [
    "x64", "x86", "win64", "win32", "64bit", "32bit", "launcher", "setup",
];

/// Where an index entry came from, in descending trust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ProgramSource {
    LauncherPath,
    LauncherCandidate,
    StartMenu,
    LocalPrograms,
    ProgramFiles,
    Desktop,
}

impl ProgramSource {
    pub fn weight(self) -> i64 {
        match self {
            ProgramSource::LauncherPath => 40,
            ProgramSource::LauncherCandidate => 30,
            ProgramSource::StartMenu => 20,
            ProgramSource::LocalPrograms => 15,
            ProgramSource::ProgramFiles => 10,
            ProgramSource::Desktop => 5,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramEntry {
    pub label: String,
    pub path: String,
    pub source: ProgramSource,
    pub ext: String,
    pub file_name: String,
    #[serde(skip)]
    pub(crate) label_words: Vec<String>,
    #[serde(skip)]
    pub(crate) label_key: String,
    #[serde(skip)]
    pub(crate) stem_key: String,
    #[serde(skip)]
    pub(crate) file_key: String,
}

impl ProgramEntry {
    pub fn new(path: impl Into<String>, source: ProgramSource) -> Self {
        let path = path.into();
        let file_name = text::file_name_of(&path).to_string();
        let ext = text::extension_of(&path);
        let stem = file_name
            .get(..file_name.len() - ext.len())
            .unwrap_or(&file_name)
            .to_string();
        let label = derive_label(&stem);

        Self {
            label_words: text::words(&label),
            label_key: text::match_key(&label),
            stem_key: text::match_key(&stem),
            file_key: text::match_key(&file_name),
            label,
            path,
            source,
            ext,
            file_name,
        }
    }
}

/// Human label from a file stem with noise tokens removed.
pub fn derive_label(stem: &str) -> String {
    let kept: Vec<&str> = stem
        .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|word| !word.is_empty())
        .filter(|word| {
            let bare = word.trim_matches(|c: char| "()[]".contains(c)).to_ascii_lowercase();
            !NOISE_TOKENS.contains(&bare.as_str())
        })
        .collect();
    if kept.is_empty() {
        stem.trim().to_string()
    } else {
        kept.join(" ")
    }
}

pub fn is_launchable(path: &str) -> bool {
    LAUNCHABLE_EXTENSIONS.contains(&text::extension_of(path).as_str())
}

/// A directory tree scanned for launchable files.
#[derive(Debug, Clone)]
pub struct ScanRoot {
    pub path: PathBuf,
    pub source: ProgramSource,
    pub max_depth: usize,
}

/// OS-standard install directories present in the environment.
pub fn default_scan_roots() -> Vec<ScanRoot> {
    scan_roots_with(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
}

pub fn scan_roots_with<F>(lookup: F) -> Vec<ScanRoot>
where
    F: Fn(&str) -> Option<String>,
{
    let start_menu = ["Microsoft", "Windows", "Start Menu", "Programs"];
    let mut roots = Vec::new();
    let mut push = |base: Option<String>, parts: &[&str], source, max_depth| {
        if let Some(base) = base {
            let mut path = PathBuf::from(base);
            path.extend(parts);
            roots.push(ScanRoot {
                path,
                source,
                max_depth,
            });
        }
    };

    push(lookup("APPDATA"), &start_menu, ProgramSource::StartMenu, 6);
    push(lookup("ProgramData"), &start_menu, ProgramSource::StartMenu, 6);
    push(lookup("LOCALAPPDATA"), &["Programs"], ProgramSource::LocalPrograms, 5);
    push(lookup("ProgramFiles"), &[], ProgramSource::ProgramFiles, 4);
    push(lookup("ProgramFiles(x86)"), &[], ProgramSource::ProgramFiles, 4);
    push(
        lookup("USERPROFILE").or_else(|| dirs::home_dir().map(|d| d.display().to_string())),
        &["Desktop"],
        ProgramSource::Desktop,
        2,
    );
    push(lookup("PUBLIC"), &["Desktop"], ProgramSource::Desktop, 2);
    roots
}

#[derive(Debug, Default, Clone)]
pub struct ProgramIndex {
    entries: Vec<ProgramEntry>,
}

impl ProgramIndex {
    /// Build an index from entries in trust order; later duplicates of a
    /// path (case-insensitive) are dropped.
    pub fn from_entries(entries: impl IntoIterator<Item = ProgramEntry>) -> Self {
        let mut seen = HashSet::new();
        let entries = entries
            .into_iter()
            .filter(|entry| seen.insert(entry.path.to_lowercase()))
            .collect();
        Self { entries }
    }

    /// Seed from launchers, then scan `roots`.
    pub fn build(launchers: &BTreeMap<String, Launcher>, roots: &[ScanRoot]) -> Self {
        let mut entries = Vec::new();

        for launcher in launchers.values() {
            let path = text::expand_and_unquote(&launcher.path);
            if !path.is_empty() && Path::new(&path).is_file() {
                entries.push(ProgramEntry::new(path, ProgramSource::LauncherPath));
            }
        }
        for launcher in launchers.values() {
            for candidate in &launcher.candidates {
                let path = text::expand_and_unquote(candidate);
                if Path::new(&path).is_file() {
                    entries.push(ProgramEntry::new(path, ProgramSource::LauncherCandidate));
                }
            }
        }

        let mut total = 0usize;
        for root in roots {
            if total >= MAX_FILES_TOTAL {
                break;
            }
            if !root.path.is_dir() {
                continue;
            }
            let budget = MAX_FILES_PER_ROOT.min(MAX_FILES_TOTAL - total);
            let found = scan_root(root, budget);
            debug!(root = %root.path.display(), files = found.len(), "scanned program root");
            total += found.len();
            entries.extend(found);
        }

        Self::from_entries(entries)
    }

    pub fn entries(&self) -> &[ProgramEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn scan_root(root: &ScanRoot, budget: usize) -> Vec<ProgramEntry> {
    WalkDir::new(&root.path)
        .max_depth(root.max_depth)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| !entry.file_type().is_dir())
        .filter_map(|entry| {
            let path = entry.path().to_str()?.to_string();
            is_launchable(&path).then(|| ProgramEntry::new(path, root.source))
        })
        .take(budget)
        .collect()
}

struct CachedIndex {
    built_at: Instant,
    index: Arc<ProgramIndex>,
}

/// TTL cache in front of [`ProgramIndex::build`].
pub struct ProgramCatalog {
    roots: Vec<ScanRoot>,
    ttl: Duration,
    fixed: bool,
    cache: Mutex<Option<CachedIndex>>,
}

impl ProgramCatalog {
    pub fn new(roots: Vec<ScanRoot>, ttl: Duration) -> Self {
        Self {
            roots,
            ttl,
            fixed: false,
            cache: Mutex::new(None),
        }
    }

    pub fn system() -> Self {
        Self::new(default_scan_roots(), INDEX_TTL)
    }

    /// A catalog that always serves `index` and never rescans.
    pub fn fixed(index: ProgramIndex) -> Self {
        Self {
            roots: Vec::new(),
            ttl: Duration::MAX,
            fixed: true,
            cache: Mutex::new(Some(CachedIndex {
                built_at: Instant::now(),
                index: Arc::new(index),
            })),
        }
    }

    fn fresh(&self) -> Option<Arc<ProgramIndex>> {
        let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache
            .as_ref()
            .filter(|cached| self.fixed || cached.built_at.elapsed() < self.ttl)
            .map(|cached| Arc::clone(&cached.index))
    }

    /// Cached index, rebuilt on a blocking thread when stale.
    pub async fn index(
        self: &Arc<Self>,
        launchers: &BTreeMap<String, Launcher>,
    ) -> Arc<ProgramIndex> {
        if let Some(index) = self.fresh() {
            return index;
        }
        let catalog = Arc::clone(self);
        let launchers = launchers.clone();
        match tokio::task::spawn_blocking(move || catalog.rebuild(&launchers)).await {
            Ok(index) => index,
            Err(err) => {
                warn!(error = %err, "program index build failed");
                Arc::new(ProgramIndex::default())
            }
        }
    }

    /// Synchronous form of [`ProgramCatalog::index`].
    pub fn index_blocking(&self, launchers: &BTreeMap<String, Launcher>) -> Arc<ProgramIndex> {
        self.fresh().unwrap_or_else(|| self.rebuild(launchers))
    }

    fn rebuild(&self, launchers: &BTreeMap<String, Launcher>) -> Arc<ProgramIndex> {
        if self.fixed
            && let Some(index) = self.fresh()
        {
            return index;
        }
        let index = Arc::new(ProgramIndex::build(launchers, &self.roots));
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        *cache = Some(CachedIndex {
            built_at: Instant::now(),
            index: Arc::clone(&index),
        });
        index
    }

    /// Drop the cached index. A fixed catalog ignores this.
    pub fn invalidate(&self) {
        if self.fixed {
            return;
        }
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        *cache = None;
    }
}

/// Resolves against a catalog, building the index only on first use.
pub struct CatalogLookup<'a> {
    catalog: &'a ProgramCatalog,
    launchers: &'a BTreeMap<String, Launcher>,
}

impl<'a> CatalogLookup<'a> {
    pub fn new(catalog: &'a ProgramCatalog, launchers: &'a BTreeMap<String, Launcher>) -> Self {
        Self { catalog, launchers }
    }
}

impl ProgramLookup for CatalogLookup<'_> {
    fn resolve(&self, input: &str) -> Option<String> {
        self.catalog.index_blocking(self.launchers).resolve(input)
    }
}
