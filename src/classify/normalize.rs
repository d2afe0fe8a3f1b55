//! Normalization of raw classifier output into uniform predictions.

use super::{Prediction, RawEntry, Source};
use crate::constants::confidence;
use tracing::warn;

/// Normalize raw classifier entries for one image into predictions.
///
/// Malformed entries (missing species or confidence, or confidence outside
/// `[0.0, 1.0]`) are dropped with a warning. A bad entry never fails the
/// batch.
#[allow(clippy::cast_possible_truncation)]
pub fn normalize(image_id: &str, entries: Vec<RawEntry>, source: Source) -> Vec<Prediction> {
    let mut predictions = Vec::with_capacity(entries.len());

    for entry in entries {
        let Some(species) = entry.species.filter(|s| !s.trim().is_empty()) else {
            warn!("Dropping {source} entry for {image_id}: missing species label");
            continue;
        };

        let Some(raw_confidence) = entry.confidence else {
            warn!("Dropping {source} entry '{species}' for {image_id}: missing confidence");
            continue;
        };

        let score = raw_confidence as f32;
        if !(confidence::MIN..=confidence::MAX).contains(&score) || !score.is_finite() {
            warn!(
                "Dropping {source} entry '{species}' for {image_id}: confidence {raw_confidence} outside [0, 1]"
            );
            continue;
        }

        predictions.push(Prediction {
            species,
            confidence: score,
            source,
            raw: entry.detail,
        });
    }

    predictions
}

/// Extract a display name from a semicolon-delimited taxonomy path.
///
/// SpeciesNet labels look like
/// `uuid;class;order;family;genus;species;american robin`; only the final
/// non-empty segment is the usable name. Underscores become spaces and the
/// result is title-cased.
pub fn species_from_taxonomy(label: &str) -> String {
    let name = label
        .split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .next_back()
        .unwrap_or(label);

    title_case(&name.replace('_', " "))
}

/// Capitalize the first letter of each whitespace-separated word.
fn title_case(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_keeps_valid_entries() {
        let entries = vec![
            RawEntry {
                species: Some("American Robin".to_string()),
                confidence: Some(0.88),
                detail: None,
            },
            RawEntry {
                species: Some("Blue Jay".to_string()),
                confidence: Some(0.42),
                detail: None,
            },
        ];

        let predictions = normalize("img-1", entries, Source::Primary);
        assert_eq!(predictions.len(), 2);
        assert_eq!(predictions[0].species, "American Robin");
        assert_eq!(predictions[0].confidence, 0.88);
        assert_eq!(predictions[0].source, Source::Primary);
    }

    #[test]
    fn test_normalize_drops_missing_species() {
        let entries = vec![RawEntry {
            species: None,
            confidence: Some(0.9),
            detail: None,
        }];
        assert!(normalize("img-1", entries, Source::Primary).is_empty());
    }

    #[test]
    fn test_normalize_drops_blank_species() {
        let entries = vec![RawEntry {
            species: Some("   ".to_string()),
            confidence: Some(0.9),
            detail: None,
        }];
        assert!(normalize("img-1", entries, Source::Primary).is_empty());
    }

    #[test]
    fn test_normalize_drops_missing_confidence() {
        let entries = vec![RawEntry {
            species: Some("American Robin".to_string()),
            confidence: None,
            detail: None,
        }];
        assert!(normalize("img-1", entries, Source::Primary).is_empty());
    }

    #[test]
    fn test_normalize_drops_out_of_range_confidence() {
        let entries = vec![
            RawEntry {
                species: Some("American Robin".to_string()),
                confidence: Some(1.2),
                detail: None,
            },
            RawEntry {
                species: Some("Blue Jay".to_string()),
                confidence: Some(-0.1),
                detail: None,
            },
        ];
        assert!(normalize("img-1", entries, Source::Fallback).is_empty());
    }

    #[test]
    fn test_species_from_taxonomy_full_path() {
        let label = "abc123;aves;passeriformes;turdidae;turdus;migratorius;american robin";
        assert_eq!(species_from_taxonomy(label), "American Robin");
    }

    #[test]
    fn test_species_from_taxonomy_trailing_semicolons() {
        assert_eq!(species_from_taxonomy("aves;bird;;"), "Bird");
    }

    #[test]
    fn test_species_from_taxonomy_plain_label() {
        assert_eq!(species_from_taxonomy("blue_jay"), "Blue Jay");
    }

    #[test]
    fn test_title_case_words() {
        assert_eq!(title_case("american robin"), "American Robin");
        assert_eq!(title_case("HOUSE FINCH"), "House Finch");
    }
}
