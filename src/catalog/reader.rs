use crate::catalog::toml::{self as catalog_toml, VersionDecl};
use crate::catalog::{
    CATALOG_SUFFIX, Catalog, CatalogEntry, EntryKind, VersionSource, catalog_name,
};
use crate::config::ReferencePolicy;
use crate::error::{Result, UpdateError};
use crate::repository::ModuleCoordinate;
use crate::utils::PathValidator;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use toml_edit::{DocumentMut, Item, TableLike};
use tracing::{debug, warn};

/// Loads every catalog below a directory. Catalog files are only ever read.
pub struct CatalogReader {
    reference_policy: ReferencePolicy,
    excluded: Option<PathBuf>,
}

impl CatalogReader {
    pub fn new(reference_policy: ReferencePolicy) -> Self {
        Self {
            reference_policy,
            excluded: None,
        }
    }

    /// Skip `dir` while scanning (the output directory when nested).
    pub fn excluding(mut self, dir: impl Into<PathBuf>) -> Self {
        self.excluded = Some(dir.into());
        self
    }

    /// Parses each `*.versions.toml` file below `dir`, sorted by path.
    ///
    /// The outer error means the directory itself could not be scanned; a
    /// malformed catalog only fails its own slot.
    pub fn parse_directory(&self, dir: &Path) -> Result<Vec<Result<Catalog>>> {
        let mut files = Vec::new();
        self.collect_catalog_files(dir, &mut files)?;
        files.sort();

        Ok(files
            .iter()
            .map(|path| {
                let loaded = self.parse_file(dir, path);
                if let Err(e) = &loaded {
                    warn!(error = %e, "catalog rejected");
                }
                loaded
            })
            .collect())
    }

    fn collect_catalog_files(&self, dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                if self
                    .excluded
                    .as_ref()
                    .is_some_and(|excluded| PathValidator::is_within(&path, excluded))
                {
                    debug!(path = %path.display(), "skipping excluded directory");
                    continue;
                }
                self.collect_catalog_files(&path, files)?;
            } else if path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(CATALOG_SUFFIX))
            {
                files.push(path);
            }
        }
        Ok(())
    }

    pub fn parse_file(&self, root: &Path, path: &Path) -> Result<Catalog> {
        let relative_path = path.strip_prefix(root).unwrap_or(path).to_path_buf();
        let name = catalog_name(&relative_path);
        let source = fs::read_to_string(path)
            .map_err(|e| UpdateError::catalog_parse(&name, path, format!("cannot read file: {e}")))?;

        self.parse_str(&name, path, &relative_path, source)
    }

    pub fn parse_str(
        &self,
        name: &str,
        path: &Path,
        relative_path: &Path,
        source: String,
    ) -> Result<Catalog> {
        let fail = |message: String| UpdateError::catalog_parse(name, path, message);

        let doc = source
            .parse::<DocumentMut>()
            .map_err(|e| fail(format!("invalid TOML: {e}")))?;

        let versions = Self::read_versions(&doc).map_err(fail)?;

        let mut entries = BTreeMap::new();
        for kind in [EntryKind::Library, EntryKind::Plugin] {
            for entry in Self::read_section(&doc, kind, &versions).map_err(fail)? {
                if entries.contains_key(&entry.alias) {
                    return Err(fail(format!("duplicate alias '{}'", entry.alias)));
                }
                entries.insert(entry.alias.clone(), entry);
            }
        }

        if self.reference_policy == ReferencePolicy::RequireSameModule {
            Self::check_shared_references(&entries).map_err(fail)?;
        }

        debug!(catalog = name, entries = entries.len(), "catalog parsed");

        Ok(Catalog {
            name: name.to_string(),
            path: path.to_path_buf(),
            relative_path: relative_path.to_path_buf(),
            source,
            versions,
            entries,
        })
    }

    fn read_versions(doc: &DocumentMut) -> std::result::Result<BTreeMap<String, String>, String> {
        let Some(item) = doc.get("versions") else {
            return Ok(BTreeMap::new());
        };
        let table = item
            .as_table_like()
            .ok_or_else(|| "[versions] must be a table".to_string())?;

        let mut versions = BTreeMap::new();
        for (key, value) in table.iter() {
            let literal = catalog_toml::literal_version(value)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| format!("version '{key}' has no concrete version"))?;
            versions.insert(key.to_string(), literal);
        }
        Ok(versions)
    }

    fn read_section(
        doc: &DocumentMut,
        kind: EntryKind,
        versions: &BTreeMap<String, String>,
    ) -> std::result::Result<Vec<CatalogEntry>, String> {
        let section = kind.section();
        let Some(item) = doc.get(section) else {
            return Ok(Vec::new());
        };
        let table = item
            .as_table_like()
            .ok_or_else(|| format!("[{section}] must be a table"))?;

        // Gradle treats `-`, `_` and `.` in aliases as the same separator.
        let mut normalized: HashMap<String, String> = HashMap::new();
        let mut entries = Vec::new();

        for (key, value) in table.iter() {
            let accessor = key.replace(['-', '_'], ".");
            if let Some(previous) = normalized.insert(accessor, key.to_string()) {
                return Err(format!(
                    "duplicate alias '{key}' in [{section}] (clashes with '{previous}')"
                ));
            }

            let (coordinate, declaration) = Self::read_entry(key, value, kind)?;

            let version = match declaration {
                VersionDecl::Absent => {
                    debug!(alias = key, "entry without version is not updatable");
                    continue;
                }
                VersionDecl::Literal(version) if version.trim().is_empty() => {
                    return Err(format!("[{section}] '{key}' has an empty version"));
                }
                VersionDecl::Literal(version) => VersionSource::Literal(version),
                VersionDecl::Reference(name) => {
                    let resolved = versions.get(&name).ok_or_else(|| {
                        format!("[{section}] '{key}' references unknown version '{name}'")
                    })?;
                    VersionSource::Reference {
                        name,
                        resolved: resolved.clone(),
                    }
                }
            };

            let alias = match kind {
                EntryKind::Library => key.to_string(),
                EntryKind::Plugin => format!("plugins.{key}"),
            };

            entries.push(CatalogEntry {
                alias,
                key: key.to_string(),
                kind,
                coordinate,
                version,
            });
        }

        Ok(entries)
    }

    fn read_entry(
        key: &str,
        value: &Item,
        kind: EntryKind,
    ) -> std::result::Result<(ModuleCoordinate, VersionDecl), String> {
        let section = kind.section();

        if let Some(notation) = value.as_str() {
            return match kind {
                EntryKind::Library => match catalog_toml::parse_module_notation(notation) {
                    Some((group, artifact, version)) => Ok((
                        ModuleCoordinate::new(group, artifact),
                        version.map_or(VersionDecl::Absent, VersionDecl::Literal),
                    )),
                    None => Err(format!("[{section}] '{key}': invalid notation '{notation}'")),
                },
                EntryKind::Plugin => match notation.rsplit_once(':') {
                    Some((id, version)) if !id.is_empty() && !version.is_empty() => Ok((
                        ModuleCoordinate::plugin(id),
                        VersionDecl::Literal(version.to_string()),
                    )),
                    _ => Err(format!("[{section}] '{key}': invalid notation '{notation}'")),
                },
            };
        }

        let table: &dyn TableLike = value
            .as_table_like()
            .ok_or_else(|| format!("[{section}] '{key}' must be a string or a table"))?;

        let coordinate = catalog_toml::coordinate_of(table, kind)
            .map_err(|message| format!("[{section}] '{key}': {message}"))?;
        let declaration = catalog_toml::version_decl(table)
            .map_err(|message| format!("[{section}] '{key}': {message}"))?;

        Ok((coordinate, declaration))
    }

    /// Entries sharing a version reference must all name the same module.
    fn check_shared_references(
        entries: &BTreeMap<String, CatalogEntry>,
    ) -> std::result::Result<(), String> {
        let mut owners: HashMap<&str, &CatalogEntry> = HashMap::new();
        for entry in entries.values() {
            let Some(reference) = entry.version_ref() else {
                continue;
            };
            match owners.get(reference) {
                Some(owner) if owner.coordinate != entry.coordinate => {
                    return Err(format!(
                        "version reference '{reference}' is shared by different modules: \
                         '{}' ({}) and '{}' ({})",
                        owner.alias, owner.coordinate, entry.alias, entry.coordinate
                    ));
                }
                Some(_) => {}
                None => {
                    owners.insert(reference, entry);
                }
            }
        }
        Ok(())
    }
}
