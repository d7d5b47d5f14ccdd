use crate::error::{Result, UpdateError};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

/// Version representation split into numeric segments and an optional
/// qualifier (`"31.0-rc1"` → `[31, 0]` + `"rc1"`).
#[derive(Debug, Clone)]
pub struct VersionToken {
    pub original: String,
    pub segments: Vec<u64>,
    pub qualifier: Option<String>,
}

impl VersionToken {
    /// Best-effort segmentation. Only blank input is refused.
    pub fn parse(version: &str) -> Result<Self> {
        let trimmed = version.trim();
        if trimmed.is_empty() {
            return Err(UpdateError::VersionParse(
                "version string is empty".to_string(),
            ));
        }

        let mut segments = Vec::new();
        let mut rest = trimmed;

        loop {
            let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
            if digits == 0 {
                break;
            }

            let (number, tail) = rest.split_at(digits);
            // Runs too long for u64 stay in the qualifier.
            let Ok(value) = number.parse::<u64>() else {
                break;
            };
            segments.push(value);

            match tail.chars().next() {
                Some('.' | '-' | '_' | '+') => rest = &tail[1..],
                _ => {
                    rest = tail;
                    break;
                }
            }
        }

        let qualifier = (!rest.is_empty()).then(|| rest.to_string());

        Ok(Self {
            original: version.to_string(),
            segments,
            qualifier,
        })
    }

    /// Leading numeric segment; an absent segment counts as zero.
    pub fn major(&self) -> u64 {
        self.segments.first().copied().unwrap_or(0)
    }

    /// Leading alphabetic run of the qualifier, lower-cased
    /// (`"RC1"` → `"rc"`, `"beta.2"` → `"beta"`).
    pub fn qualifier_label(&self) -> Option<String> {
        let qualifier = self.qualifier.as_deref()?;
        let label: String = qualifier
            .trim_start_matches(|c: char| !c.is_ascii_alphanumeric())
            .chars()
            .take_while(|c| c.is_alphabetic())
            .flat_map(char::to_lowercase)
            .collect();

        if label.is_empty() {
            Some(qualifier.to_lowercase())
        } else {
            Some(label)
        }
    }

    fn segment(&self, index: usize) -> u64 {
        self.segments.get(index).copied().unwrap_or(0)
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl PartialEq for VersionToken {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for VersionToken {}

impl PartialOrd for VersionToken {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionToken {
    fn cmp(&self, other: &Self) -> Ordering {
        let width = self.segments.len().max(other.segments.len());
        for index in 0..width {
            match self.segment(index).cmp(&other.segment(index)) {
                Ordering::Equal => continue,
                other => return other,
            }
        }

        match (&self.qualifier, &other.qualifier) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
        }
    }
}

pub struct VersionComparator;

impl VersionComparator {
    pub fn compare(a: &VersionToken, b: &VersionToken) -> Ordering {
        a.cmp(b)
    }

    /// A version is ineligible iff its qualifier label is in `rejected`
    /// (compared case-insensitively). Unqualified versions are always eligible.
    pub fn is_eligible(version: &VersionToken, rejected: &BTreeSet<String>) -> bool {
        match version.qualifier_label() {
            Some(label) => !rejected.iter().any(|r| r.eq_ignore_ascii_case(&label)),
            None => true,
        }
    }

    /// Check if version `a` is newer than version `b`
    pub fn is_newer(a: &VersionToken, b: &VersionToken) -> bool {
        a > b
    }

    /// Highest of the given versions, if any.
    pub fn latest<'a>(versions: impl IntoIterator<Item = &'a VersionToken>) -> Option<&'a VersionToken> {
        versions.into_iter().max()
    }
}
