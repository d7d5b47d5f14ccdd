use crate::catalog::EntryKind;
use crate::repository::ModuleCoordinate;
use std::ops::Range;
use toml_edit::{Item, TableLike, Value};

/// Keys of a rich version table that carry a concrete version, by preference.
pub const RICH_VERSION_KEYS: &[&str] = &["require", "strictly", "prefer"];

/// How an entry declares its version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionDecl {
    /// Platform-managed entry without a version.
    Absent,
    Literal(String),
    Reference(String),
}

/// Parse a Maven coordinate (e.g., "com.example:artifact:1.0.0")
pub fn parse_module_notation(notation: &str) -> Option<(String, String, Option<String>)> {
    let parts: Vec<&str> = notation.split(':').map(str::trim).collect();
    if parts.iter().any(|part| part.is_empty()) {
        return None;
    }
    match parts.as_slice() {
        [group, artifact] => Some((group.to_string(), artifact.to_string(), None)),
        [group, artifact, version] => Some((
            group.to_string(),
            artifact.to_string(),
            Some(version.to_string()),
        )),
        _ => None,
    }
}

/// Concrete version of a `[versions]` record or a `version` field: either a
/// plain string or the first of `require`/`strictly`/`prefer`.
pub fn literal_version(item: &Item) -> Option<String> {
    if let Some(version) = item.as_str() {
        return Some(version.to_string());
    }

    let table = item.as_table_like()?;
    RICH_VERSION_KEYS
        .iter()
        .find_map(|key| table.get(key).and_then(Item::as_str))
        .map(str::to_string)
}

/// Reads the `version` field of a table-form entry.
pub fn version_decl(entry: &dyn TableLike) -> Result<VersionDecl, String> {
    let Some(version) = entry.get("version") else {
        return Ok(VersionDecl::Absent);
    };

    if let Some(reference) = version.as_table_like().and_then(|t| t.get("ref")) {
        return reference
            .as_str()
            .map(|name| VersionDecl::Reference(name.to_string()))
            .ok_or_else(|| "`version.ref` must be a string".to_string());
    }

    literal_version(version)
        .map(VersionDecl::Literal)
        .ok_or_else(|| "unsupported `version` declaration".to_string())
}

/// Extracts the coordinate of a table-form entry.
pub fn coordinate_of(entry: &dyn TableLike, kind: EntryKind) -> Result<ModuleCoordinate, String> {
    match kind {
        EntryKind::Plugin => entry
            .get("id")
            .and_then(Item::as_str)
            .filter(|id| !id.trim().is_empty())
            .map(|id| ModuleCoordinate::plugin(id.trim()))
            .ok_or_else(|| "missing required field `id`".to_string()),
        EntryKind::Library => {
            if let Some(module) = entry.get("module") {
                let notation = module
                    .as_str()
                    .ok_or_else(|| "`module` must be a string".to_string())?;
                return match parse_module_notation(notation) {
                    Some((group, artifact, None)) => Ok(ModuleCoordinate::new(group, artifact)),
                    _ => Err(format!("invalid module notation '{notation}'")),
                };
            }

            match (
                entry.get("group").and_then(Item::as_str),
                entry.get("name").and_then(Item::as_str),
            ) {
                (Some(group), Some(name)) if !group.is_empty() && !name.is_empty() => {
                    Ok(ModuleCoordinate::new(group, name))
                }
                _ => Err("missing required field `module` (or `group` and `name`)".to_string()),
            }
        }
    }
}

/// Replacement of one string literal in the catalog source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Splice {
    pub span: Range<usize>,
    pub text: String,
}

/// Spells `new` as a TOML string in the same quote style as `raw`, falling
/// back to a basic string when the original spelling cannot carry it.
fn requote(raw: &str, current: &str, new: &str) -> String {
    let plain = !new
        .chars()
        .any(|c| c == '"' || c == '\'' || c == '\\' || c.is_control());

    for delimiter in ["\"\"\"", "'''", "\"", "'"] {
        let inner = raw
            .strip_prefix(delimiter)
            .and_then(|rest| rest.strip_suffix(delimiter));
        if let Some(inner) = inner {
            if plain && inner == current {
                return format!("{delimiter}{new}{delimiter}");
            }
            break;
        }
    }

    Value::from(new).to_string()
}

/// Splice replacing the string held by `item` with `replacement`.
fn string_splice(item: &Item, source: &str, replacement: &str) -> Option<Splice> {
    let current = item.as_str()?;
    let span = item.span()?;
    let raw = source.get(span.clone())?;
    Some(Splice {
        text: requote(raw, current, replacement),
        span,
    })
}

/// Splices setting a version item (plain string or rich version table) to
/// `new_version`. Every rich key holding the current version moves with it.
/// Empty when the item holds no concrete version.
///
/// `item` must come from a [`toml_edit::Document`] parsed from `source`.
pub fn version_splices(item: &Item, source: &str, new_version: &str) -> Vec<Splice> {
    if item.is_str() {
        return string_splice(item, source, new_version).into_iter().collect();
    }

    let (Some(table), Some(current)) = (item.as_table_like(), literal_version(item)) else {
        return Vec::new();
    };
    RICH_VERSION_KEYS
        .iter()
        .filter_map(|key| table.get(key))
        .filter(|inner| inner.as_str() == Some(current.as_str()))
        .filter_map(|inner| string_splice(inner, source, new_version))
        .collect()
}

/// Splices setting the literal version of a `[libraries]` or `[plugins]`
/// entry to `new_version`.
pub fn entry_version_splices(item: &Item, source: &str, new_version: &str) -> Vec<Splice> {
    if let Some(notation) = item.as_str() {
        return notation
            .rsplit_once(':')
            .and_then(|(head, _)| string_splice(item, source, &format!("{head}:{new_version}")))
            .into_iter()
            .collect();
    }

    item.as_table_like()
        .and_then(|table| table.get("version"))
        .map(|version| version_splices(version, source, new_version))
        .unwrap_or_default()
}

/// Applies non-overlapping splices to `source`.
pub fn apply_splices(source: &str, mut splices: Vec<Splice>) -> String {
    splices.sort_by_key(|splice| splice.span.start);
    let mut rendered = source.to_string();
    for splice in splices.into_iter().rev() {
        rendered.replace_range(splice.span, &splice.text);
    }
    rendered
}
