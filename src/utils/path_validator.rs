use crate::error::{Result, UpdateError};
use std::path::{Component, Path, PathBuf};

/// Directory checks run before a catalog is read or written.
pub struct PathValidator;

impl PathValidator {
    /// The catalogs directory must exist and be a directory.
    pub fn validate_catalogs_directory(path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();

        let canonical = path.canonicalize().map_err(|e| {
            UpdateError::Config(format!(
                "Invalid catalogs directory '{}': {e}",
                path.display()
            ))
        })?;

        if !canonical.is_dir() {
            return Err(UpdateError::Config(format!(
                "Catalogs path '{}' is not a directory",
                canonical.display()
            )));
        }

        Ok(canonical)
    }

    /// The output directory may live inside the catalogs directory but must
    /// never be the catalogs directory itself.
    pub fn ensure_distinct_output(
        catalogs_dir: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
    ) -> Result<()> {
        let catalogs = Self::normalize(catalogs_dir.as_ref());
        let output = Self::normalize(output_dir.as_ref());

        if catalogs == output {
            return Err(UpdateError::Config(format!(
                "Output directory '{}' must differ from the catalogs directory",
                output_dir.as_ref().display()
            )));
        }

        Ok(())
    }

    /// True when `candidate` is `base` or lies below it.
    pub fn is_within(candidate: impl AsRef<Path>, base: impl AsRef<Path>) -> bool {
        Self::normalize(candidate.as_ref()).starts_with(Self::normalize(base.as_ref()))
    }

    /// Canonical form when the path exists, lexical clean-up otherwise.
    fn normalize(path: &Path) -> PathBuf {
        if let Ok(canonical) = path.canonicalize() {
            return canonical;
        }

        let mut normalized = PathBuf::new();
        for component in path.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    normalized.pop();
                }
                other => normalized.push(other.as_os_str()),
            }
        }

        // Resolve the longest existing prefix so a not-yet-created output
        // directory still compares equal to its canonical parent chain.
        let mut existing = normalized.clone();
        let mut missing = Vec::new();
        while !existing.as_os_str().is_empty() {
            if let Ok(canonical) = existing.canonicalize() {
                let mut resolved = canonical;
                resolved.extend(missing.iter().rev());
                return resolved;
            }
            match existing.file_name() {
                Some(name) => missing.push(name.to_os_string()),
                None => break,
            }
            existing.pop();
        }

        normalized
    }
}
