//! In-memory model of Gradle version catalogs.

pub mod reader;
pub mod toml;
pub mod writer;

pub use reader::CatalogReader;
pub use writer::CatalogWriter;

use crate::repository::ModuleCoordinate;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// File name suffix identifying a version catalog.
pub const CATALOG_SUFFIX: &str = ".versions.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Library,
    Plugin,
}

impl EntryKind {
    /// Catalog table holding entries of this kind.
    pub fn section(self) -> &'static str {
        match self {
            EntryKind::Library => "libraries",
            EntryKind::Plugin => "plugins",
        }
    }
}

/// Where an entry's version comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSource {
    Literal(String),
    /// Named `[versions]` record, already resolved to its literal.
    Reference { name: String, resolved: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Unique name in the catalog; plugins are exposed as `plugins.<key>`.
    pub alias: String,
    /// Key as written in its section.
    pub key: String,
    pub kind: EntryKind,
    pub coordinate: ModuleCoordinate,
    pub version: VersionSource,
}

impl CatalogEntry {
    pub fn current_version(&self) -> &str {
        match &self.version {
            VersionSource::Literal(version) => version,
            VersionSource::Reference { resolved, .. } => resolved,
        }
    }

    pub fn version_ref(&self) -> Option<&str> {
        match &self.version {
            VersionSource::Literal(_) => None,
            VersionSource::Reference { name, .. } => Some(name),
        }
    }
}

/// One catalog file. Read once per run and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Catalog {
    /// Relative path without the catalog suffix, e.g. `libs`.
    pub name: String,
    pub path: PathBuf,
    /// Location relative to the catalogs directory; mirrored in the output.
    pub relative_path: PathBuf,
    /// Exact file content, kept so output can be rendered from it.
    pub source: String,
    /// `[versions]` table resolved to literals.
    pub versions: BTreeMap<String, String>,
    pub entries: BTreeMap<String, CatalogEntry>,
}

impl Catalog {
    pub fn entry(&self, alias: &str) -> Option<&CatalogEntry> {
        self.entries.get(alias)
    }

    /// Entries pinned through the given `[versions]` record.
    pub fn entries_sharing<'a>(&'a self, reference: &'a str) -> impl Iterator<Item = &'a CatalogEntry> {
        self.entries
            .values()
            .filter(move |entry| entry.version_ref() == Some(reference))
    }
}

/// Name a catalog is reported under: its relative path minus the suffix.
pub fn catalog_name(relative_path: &std::path::Path) -> String {
    let display = relative_path
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    display
        .strip_suffix(CATALOG_SUFFIX)
        .map(str::to_string)
        .unwrap_or(display)
}
