//! File type filters
//!
//! A filter is an `{id, value, label}` triple whose value lists glob
//! alternatives (`*.csv|*.tsv`). Directories always pass so the user can keep
//! navigating.

use regex::Regex;
use serde::Deserialize;
use tracing::warn;

use crate::entity::Entity;
use crate::errors::{NavError, NavResult};
use crate::utils::glob_to_regex;

const BUNDLED_FILTERS: &str = include_str!("../resources/filters.toml");

/// Filter as written in TOML
#[derive(Debug, Clone, Deserialize)]
struct FilterDef {
    id: String,
    value: String,
    label: String,
}

#[derive(Debug, Default, Deserialize)]
struct FilterFile {
    #[serde(default)]
    filters: Vec<FilterDef>,
}

/// A compiled filter
#[derive(Debug, Clone)]
pub struct FileFilter {
    pub id: String,
    pub value: String,
    pub label: String,
    patterns: Vec<Regex>,
}

impl FileFilter {
    /// Id of the filter that lets everything through
    pub const ALL: &'static str = "ALL";

    pub fn new(id: impl Into<String>, value: impl Into<String>, label: impl Into<String>) -> NavResult<Self> {
        let id = id.into();
        let value = value.into();
        let patterns = value
            .split('|')
            .map(str::trim)
            .filter(|glob| !glob.is_empty())
            .map(|glob| {
                Regex::new(&glob_to_regex(glob, false))
                    .map_err(|e| NavError::Config(format!("filter {}: {}", id, e)))
            })
            .collect::<NavResult<Vec<_>>>()?;
        Ok(Self { id, value, label: label.into(), patterns })
    }

    /// The pass-everything filter
    pub fn all() -> Self {
        Self {
            id: Self::ALL.to_string(),
            value: "*".to_string(),
            label: "All files".to_string(),
            patterns: Vec::new(),
        }
    }

    pub fn is_all(&self) -> bool {
        self.id.eq_ignore_ascii_case(Self::ALL)
    }

    /// Whether a file name matches (case-insensitive)
    pub fn matches_name(&self, name: &str) -> bool {
        self.is_all() || self.patterns.iter().any(|re| re.is_match(name))
    }

    /// Directories always pass; files must match
    pub fn accepts(&self, entity: &Entity) -> bool {
        entity.is_dir() || self.matches_name(&entity.name)
    }
}

/// Ordered set of filters offered to the caller
#[derive(Debug, Clone)]
pub struct FilterSet {
    filters: Vec<FileFilter>,
}

impl Default for FilterSet {
    fn default() -> Self {
        Self { filters: vec![FileFilter::all()] }
    }
}

impl FilterSet {
    /// Parse a `[[filters]]` TOML document
    pub fn from_toml(content: &str) -> NavResult<Self> {
        let file: FilterFile = toml_edit::de::from_str(content).map_err(|e| NavError::Config(e.to_string()))?;
        let filters = file
            .filters
            .into_iter()
            .map(|def| {
                if def.id.eq_ignore_ascii_case(FileFilter::ALL) {
                    Ok(FileFilter { label: def.label, ..FileFilter::all() })
                } else {
                    FileFilter::new(def.id, def.value, def.label)
                }
            })
            .collect::<NavResult<Vec<_>>>()?;
        if filters.is_empty() {
            return Ok(Self::default());
        }
        Ok(Self { filters })
    }

    /// Filters shipped in `resources/filters.toml`
    pub fn bundled() -> Self {
        Self::from_toml(BUNDLED_FILTERS).unwrap_or_else(|e| {
            warn!(error = %e, "bundled filters unusable, offering all files only");
            Self::default()
        })
    }

    /// Keep only the listed ids (comma separated, order of the set kept).
    /// An empty list keeps everything.
    pub fn restrict(&self, ids: &str) -> Self {
        let wanted: Vec<&str> = ids.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
        if wanted.is_empty() {
            return self.clone();
        }
        let filters: Vec<FileFilter> = self
            .filters
            .iter()
            .filter(|f| wanted.iter().any(|w| w.eq_ignore_ascii_case(&f.id)))
            .cloned()
            .collect();
        if filters.is_empty() { Self::default() } else { Self { filters } }
    }

    pub fn get(&self, id: &str) -> Option<&FileFilter> {
        self.filters.iter().find(|f| f.id.eq_ignore_ascii_case(id))
    }

    /// First filter of the set, used when no default is requested
    pub fn first(&self) -> &FileFilter {
        &self.filters[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileFilter> {
        self.filters.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_filters() {
        let set = FilterSet::bundled();
        assert!(set.first().is_all());
        let csv = set.get("csv").unwrap();
        assert!(csv.matches_name("DATA.CSV"));
        assert!(csv.matches_name("data.tsv"));
        assert!(!csv.matches_name("data.csv.bak"));
    }

    #[test]
    fn test_directories_always_pass() {
        let txt = FileFilter::new("TXT", "*.txt", "Text").unwrap();
        assert!(txt.accepts(&Entity::directory("local", "/data.d", "data.d")));
        assert!(!txt.accepts(&Entity::file("local", "/a.csv", "a.csv")));
        assert!(txt.accepts(&Entity::file("local", "/a.txt", "a.txt")));
    }

    #[test]
    fn test_restrict() {
        let set = FilterSet::bundled().restrict("xml, ALL");
        let ids: Vec<&str> = set.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["ALL", "XML"]);
        assert!(FilterSet::bundled().restrict("nope").first().is_all());
    }
}
