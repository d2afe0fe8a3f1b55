//! Geofence filtering against a species reference list.

use crate::error::{Error, Result};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Decides whether a species name is plausible for the configured region.
///
/// Backed by a static reference list of species known to occur in the
/// region, loaded once per process. When no list is configured the filter
/// accepts everything (geofencing is then left to the primary classifier's
/// own region constraint).
#[derive(Debug, Clone)]
pub struct GeoFilter {
    reference: Option<HashSet<String>>,
}

impl GeoFilter {
    /// A filter with no reference list; accepts every species.
    pub fn unrestricted() -> Self {
        Self { reference: None }
    }

    /// Build a filter from a reference list file.
    ///
    /// # File Format
    /// - One species name per line
    /// - Blank lines are ignored
    /// - Matching is case-insensitive
    pub fn from_list_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::SpeciesListRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let reader = BufReader::new(file);
        let mut reference = HashSet::new();

        for line in reader.lines() {
            let line = line.map_err(|e| Error::SpeciesListRead {
                path: path.to_path_buf(),
                source: e,
            })?;

            let trimmed = line.trim();
            if !trimmed.is_empty() {
                reference.insert(trimmed.to_lowercase());
            }
        }

        Ok(Self {
            reference: Some(reference),
        })
    }

    /// Build a filter from an in-memory species list.
    pub fn from_species<I, S>(species: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            reference: Some(
                species
                    .into_iter()
                    .map(|s| s.as_ref().to_lowercase())
                    .collect(),
            ),
        }
    }

    /// Whether a species is plausible for the region.
    pub fn accepts(&self, species: &str) -> bool {
        self.reference
            .as_ref()
            .is_none_or(|list| list.contains(&species.to_lowercase()))
    }

    /// Number of species in the reference list, if one is loaded.
    pub fn len(&self) -> Option<usize> {
        self.reference.as_ref().map(HashSet::len)
    }

    /// Whether a reference list is loaded and empty.
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_unrestricted_accepts_anything() {
        let filter = GeoFilter::unrestricted();
        assert!(filter.accepts("American Robin"));
        assert!(filter.accepts("Emperor Penguin"));
    }

    #[test]
    fn test_reference_list_membership() {
        let filter = GeoFilter::from_species(["American Robin", "Blue Jay"]);
        assert!(filter.accepts("American Robin"));
        assert!(!filter.accepts("Emperor Penguin"));
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let filter = GeoFilter::from_species(["American Robin"]);
        assert!(filter.accepts("american robin"));
        assert!(filter.accepts("AMERICAN ROBIN"));
    }

    #[test]
    fn test_from_list_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "American Robin").unwrap();
        writeln!(file).unwrap(); // blank line ignored
        writeln!(file, "  Blue Jay  ").unwrap();

        let filter = GeoFilter::from_list_file(file.path()).unwrap();
        assert_eq!(filter.len(), Some(2));
        assert!(filter.accepts("Blue Jay"));
        assert!(!filter.accepts("House Finch"));
    }

    #[test]
    fn test_from_list_file_not_found() {
        let result = GeoFilter::from_list_file(Path::new("nonexistent.txt"));
        assert!(result.is_err());
    }
}
