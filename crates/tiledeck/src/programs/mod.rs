//! Program index and free-text program resolution.

mod index;
mod resolver;

pub use index::{
    CatalogLookup, INDEX_TTL, ProgramCatalog, ProgramEntry, ProgramIndex, ProgramSource, ScanRoot,
    default_scan_roots, derive_label, is_launchable, scan_roots_with,
};
pub use resolver::{
    ProgramLookup, ScoredEntry, rank, resolve_program_path, resolve_with, search,
};
