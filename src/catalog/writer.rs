use crate::catalog::Catalog;
use crate::catalog::toml::{apply_splices, entry_version_splices, version_splices};
use crate::error::{Result, UpdateError};
use crate::update::{UnitKey, UpdatePlan};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use toml_edit::{Document, Item, TableLike};
use tracing::debug;

fn section<'a>(doc: &'a Document<&str>, name: &str) -> Option<&'a dyn TableLike> {
    doc.as_table().get(name).and_then(Item::as_table_like)
}

/// Renders proposed catalogs next to, never over, the originals.
pub struct CatalogWriter;

impl CatalogWriter {
    /// Catalog source with every planned version applied. Only the version
    /// literals change; everything else is carried over byte for byte.
    pub fn render(catalog: &Catalog, plan: &UpdatePlan) -> Result<String> {
        if !plan.has_updates() {
            return Ok(catalog.source.clone());
        }

        let fail = |message: String| UpdateError::write(&catalog.name, &catalog.path, message);
        let source = catalog.source.as_str();

        let doc = Document::parse(source).map_err(|e| fail(format!("cannot re-read catalog: {e}")))?;

        let mut splices = Vec::new();
        for candidate in plan.candidates.values() {
            let found = match &candidate.unit.key {
                UnitKey::Reference(name) => section(&doc, "versions")
                    .and_then(|versions| versions.get(name))
                    .map(|item| version_splices(item, source, &candidate.to)),
                UnitKey::Alias(alias) => {
                    let entry = catalog
                        .entry(alias)
                        .ok_or_else(|| fail(format!("unknown alias '{alias}'")))?;
                    section(&doc, entry.kind.section())
                        .and_then(|section| section.get(&entry.key))
                        .map(|item| entry_version_splices(item, source, &candidate.to))
                }
            }
            .unwrap_or_default();

            if found.is_empty() {
                return Err(fail(format!(
                    "cannot locate version of '{}' in the catalog",
                    candidate.unit.key
                )));
            }
            splices.extend(found);
        }

        Ok(apply_splices(source, splices))
    }

    /// Writes the rendered catalog under `output_dir`, mirroring its
    /// location below the catalogs directory. The file appears complete or
    /// not at all.
    pub fn write_updates(catalog: &Catalog, plan: &UpdatePlan, output_dir: &Path) -> Result<PathBuf> {
        let content = Self::render(catalog, plan)?;
        let target = output_dir.join(&catalog.relative_path);
        let fail = |message: String| UpdateError::write(&catalog.name, &target, message);

        let parent = target
            .parent()
            .ok_or_else(|| fail("output path has no parent directory".to_string()))?;
        fs::create_dir_all(parent)
            .map_err(|e| fail(format!("cannot create {}: {e}", parent.display())))?;

        let mut staged = NamedTempFile::new_in(parent)
            .map_err(|e| fail(format!("cannot create temporary file: {e}")))?;
        staged
            .write_all(content.as_bytes())
            .and_then(|()| staged.as_file().sync_all())
            .map_err(|e| fail(format!("cannot write temporary file: {e}")))?;
        staged
            .persist(&target)
            .map_err(|e| fail(format!("cannot move file into place: {}", e.error)))?;

        debug!(
            catalog = %catalog.name,
            path = %target.display(),
            updates = plan.candidates.len(),
            "catalog written"
        );
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogReader;
    use crate::config::ReferencePolicy;
    use crate::repository::ModuleCoordinate;
    use crate::update::{Lookup, UpdatePlanner, UpdatePolicy};
    use std::collections::HashMap;
    use tempfile::tempdir;

    const SOURCE: &str = r#"# Project dependencies
[versions]
jackson = "2.15.0"   # keep in sync with the BOM
kotlin = { strictly = "1.9.20" }

[libraries]
# core
guava = "com.google.guava:guava:30.0-jre"
jackson-core = { module = "com.fasterxml.jackson.core:jackson-core", version.ref = "jackson" }
jackson-core-kts = { module = "com.fasterxml.jackson.core:jackson-core", version.ref = "jackson" }
okio = { group = "com.squareup.okio", name = "okio", version = "3.5.0" }   # io

[plugins]
kotlin-jvm = { id = "org.jetbrains.kotlin.jvm", version.ref = "kotlin" }
"#;

    fn catalog() -> Catalog {
        CatalogReader::new(ReferencePolicy::RequireSameModule)
            .parse_str(
                "libs",
                Path::new("gradle/libs.versions.toml"),
                Path::new("libs.versions.toml"),
                SOURCE.to_string(),
            )
            .unwrap()
    }

    fn plan_with(pairs: &[(ModuleCoordinate, &[&str])]) -> UpdatePlan {
        let lookups: HashMap<ModuleCoordinate, Lookup> = pairs
            .iter()
            .map(|(c, versions)| (c.clone(), Ok(versions.iter().map(|v| v.to_string()).collect())))
            .collect();
        UpdatePlanner::new(UpdatePolicy::default()).plan(&catalog(), &lookups)
    }

    #[test]
    fn no_candidates_renders_source_verbatim() {
        let rendered = CatalogWriter::render(&catalog(), &UpdatePlan::default()).unwrap();
        assert_eq!(rendered, SOURCE);
    }

    #[test]
    fn only_version_tokens_change() {
        let plan = plan_with(&[
            (ModuleCoordinate::new("com.google.guava", "guava"), &["30.0-jre", "30.1-jre"]),
            (
                ModuleCoordinate::new("com.fasterxml.jackson.core", "jackson-core"),
                &["2.15.0", "2.16.0"],
            ),
            (ModuleCoordinate::new("com.squareup.okio", "okio"), &["3.6.0"]),
            (
                ModuleCoordinate::plugin("org.jetbrains.kotlin.jvm"),
                &["1.9.20", "1.9.22"],
            ),
        ]);
        assert_eq!(plan.candidates.len(), 4);

        let rendered = CatalogWriter::render(&catalog(), &plan).unwrap();
        let expected = SOURCE
            .replace("\"2.15.0\"", "\"2.16.0\"")
            .replace("30.0-jre", "30.1-jre")
            .replace("\"3.5.0\"", "\"3.6.0\"")
            .replace("\"1.9.20\"", "\"1.9.22\"");
        assert_eq!(rendered, expected);
    }

    fn single_entry_catalog(source: &str) -> Catalog {
        CatalogReader::new(ReferencePolicy::RequireSameModule)
            .parse_str(
                "libs",
                Path::new("libs.versions.toml"),
                Path::new("libs.versions.toml"),
                source.to_string(),
            )
            .unwrap()
    }

    fn guava_plan(catalog: &Catalog) -> UpdatePlan {
        let lookups: HashMap<ModuleCoordinate, Lookup> = HashMap::from([(
            ModuleCoordinate::new("com.google.guava", "guava"),
            Ok(vec!["30.0-jre".to_string(), "30.1-jre".to_string()]),
        )]);
        UpdatePlanner::new(UpdatePolicy::default()).plan(catalog, &lookups)
    }

    #[test]
    fn crlf_line_endings_survive_updates() {
        let source = "# c\r\n[versions]\r\nx = \"1\"\r\n\r\n[libraries]\r\nguava = \"com.google.guava:guava:30.0-jre\"\r\n";
        let catalog = single_entry_catalog(source);

        let rendered = CatalogWriter::render(&catalog, &guava_plan(&catalog)).unwrap();

        assert_eq!(rendered, source.replace("30.0-jre", "30.1-jre"));
    }

    #[test]
    fn literal_string_entry_keeps_single_quotes() {
        let source = "[libraries]\nguava = 'com.google.guava:guava:30.0-jre' # pin\n";
        let catalog = single_entry_catalog(source);

        let rendered = CatalogWriter::render(&catalog, &guava_plan(&catalog)).unwrap();

        assert_eq!(
            rendered,
            "[libraries]\nguava = 'com.google.guava:guava:30.1-jre' # pin\n"
        );
    }

    #[test]
    fn rich_version_moves_every_matching_key() {
        let source = "[versions]\nguava = { strictly = \"30.0-jre\", prefer = \"30.0-jre\" }\n\n[libraries]\nguava = { module = \"com.google.guava:guava\", version.ref = \"guava\" }\n";
        let catalog = single_entry_catalog(source);

        let rendered = CatalogWriter::render(&catalog, &guava_plan(&catalog)).unwrap();

        assert_eq!(rendered, source.replace("30.0-jre", "30.1-jre"));
    }

    #[test]
    fn writes_mirrored_file_and_leaves_source_alone() {
        let out = tempdir().unwrap();
        let plan = plan_with(&[(
            ModuleCoordinate::new("com.google.guava", "guava"),
            &["30.1-jre"],
        )]);

        let written = CatalogWriter::write_updates(&catalog(), &plan, out.path()).unwrap();

        assert_eq!(written, out.path().join("libs.versions.toml"));
        let content = fs::read_to_string(&written).unwrap();
        assert!(content.contains("com.google.guava:guava:30.1-jre"));
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 1);
    }

    #[test]
    fn unwritable_output_leaves_no_file() {
        let root = tempdir().unwrap();
        let blocker = root.path().join("updates");
        fs::write(&blocker, "not a directory").unwrap();

        let err = CatalogWriter::write_updates(&catalog(), &UpdatePlan::default(), &blocker)
            .unwrap_err();

        assert!(matches!(err, UpdateError::Write { .. }));
        assert_eq!(fs::read_to_string(&blocker).unwrap(), "not a directory");
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 1);
    }
}
