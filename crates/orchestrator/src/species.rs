//! Species resolution: normalize, look up, enrich-or-insert.
//!
//! The resolver guarantees at most one catalog row per normalized
//! scientific name. Failures here are non-fatal to identification; the
//! caller logs and carries a null species id instead.

use std::sync::OnceLock;

use ai_core::{SpeciesCandidate, UNKNOWN};
use database::{species, Database, NewSpecies, Species, SpeciesEnrichment};
use regex::Regex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::OrchestratorError;

/// Fallback watering cadence when the free text yields nothing.
pub const DEFAULT_WATER_FREQUENCY_DAYS: i32 = 7;

/// Normalize a scientific name: lowercase, trim, collapse internal
/// whitespace to single spaces.
pub fn normalize_scientific_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Title-case the first whitespace-delimited token of a normalized name,
/// used as the genus fallback.
fn genus_from_name(normalized: &str) -> String {
    match normalized.split_whitespace().next() {
        Some(token) => {
            let mut chars = token.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => UNKNOWN.to_string(),
            }
        }
        None => UNKNOWN.to_string(),
    }
}

/// Extract a watering cadence in days from free text like "every 5-7
/// days" or "weekly". First integer wins, clamped to 1..=60; absent
/// numbers fall back to 7 days.
pub fn parse_water_frequency_days(text: &str) -> i32 {
    let lowered = text.to_lowercase();
    if lowered.contains("daily") {
        return 1;
    }
    if lowered.contains("weekly") {
        return 7;
    }

    static NUMBER_RE: OnceLock<Regex> = OnceLock::new();
    let number = NUMBER_RE
        .get_or_init(|| Regex::new(r"\d+").expect("static regex compiles"))
        .find(&lowered)
        .and_then(|m| m.as_str().parse::<i32>().ok());

    match number {
        Some(days) => days.clamp(1, 60),
        None => DEFAULT_WATER_FREQUENCY_DAYS,
    }
}

/// Merge common names case-insensitively, preserving the stored order and
/// appending new entries in their incoming order. Returns `None` when
/// nothing new arrived.
fn merge_common_names(existing: &[String], incoming: &[String]) -> Option<Vec<String>> {
    let mut merged: Vec<String> = existing.to_vec();
    let mut seen: Vec<String> = existing.iter().map(|n| n.to_lowercase()).collect();

    for name in incoming {
        let key = name.to_lowercase();
        if !key.is_empty() && !seen.contains(&key) {
            seen.push(key);
            merged.push(name.clone());
        }
    }

    if merged.len() == existing.len() {
        None
    } else {
        Some(merged)
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed == UNKNOWN {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Deduplicating enricher over the species catalog.
pub struct SpeciesResolver {
    db: Database,
}

impl SpeciesResolver {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Resolve a routed identification candidate to a catalog row id.
    ///
    /// Present rows are enriched only where empty; absent rows are
    /// inserted with explicit defaults. An insert race is resolved by
    /// re-reading the winner and enriching it.
    pub async fn resolve(&self, candidate: &SpeciesCandidate) -> Result<Uuid, OrchestratorError> {
        let normalized = normalize_scientific_name(&candidate.scientific_name);
        if normalized.is_empty() {
            return Err(OrchestratorError::InvalidInput(
                "candidate has no scientific name".to_string(),
            ));
        }

        if let Some(existing) = species::find_by_scientific_name(self.db.pool(), &normalized).await? {
            return self.enrich(&existing, candidate).await;
        }

        let new = self.build_new(&normalized, candidate);
        match species::insert_species(self.db.pool(), &new).await {
            Ok(row) => {
                info!(species = %normalized, id = %row.id, "inserted new species");
                Ok(row.id)
            }
            Err(err) if err.is_unique_violation() => {
                // Lost an insert race; the winner's row is there now.
                debug!(species = %normalized, "insert race lost, enriching winner");
                let winner = species::find_by_scientific_name(self.db.pool(), &normalized)
                    .await?
                    .ok_or(err)?;
                self.enrich(&winner, candidate).await
            }
            Err(err) => Err(err.into()),
        }
    }

    fn build_new(&self, normalized: &str, candidate: &SpeciesCandidate) -> NewSpecies {
        let genus = non_empty(&candidate.genus).unwrap_or_else(|| genus_from_name(normalized));
        NewSpecies {
            scientific_name: normalized.to_string(),
            common_names: candidate
                .common_names
                .iter()
                .filter(|n| !n.trim().is_empty())
                .cloned()
                .collect(),
            family: non_empty(&candidate.family).unwrap_or_else(|| UNKNOWN.to_string()),
            genus,
            toxicity: candidate.toxicity.clone(),
            description: candidate.description.clone(),
            plant_id_species_id: candidate.provider_species_id.clone(),
        }
    }

    async fn enrich(
        &self,
        existing: &Species,
        candidate: &SpeciesCandidate,
    ) -> Result<Uuid, OrchestratorError> {
        // Only fill holes; existing values win.
        let fill = |current: &Option<String>, incoming: &Option<String>| match current.as_deref() {
            None | Some("") => incoming.clone(),
            _ => None,
        };
        let update = SpeciesEnrichment {
            common_names: merge_common_names(&existing.common_names, &candidate.common_names),
            toxicity: fill(&existing.toxicity, &candidate.toxicity),
            description: fill(&existing.description, &candidate.description),
            plant_id_species_id: fill(
                &existing.plant_id_species_id,
                &candidate.provider_species_id,
            ),
        };

        if !update.is_empty() {
            species::enrich_species(self.db.pool(), existing.id, &update).await?;
            debug!(id = %existing.id, "species enriched");
        }

        Ok(existing.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_whitespace_and_case() {
        assert_eq!(
            normalize_scientific_name("  Epipremnum   AUREUM \n"),
            "epipremnum aureum"
        );
        // Idempotent.
        assert_eq!(
            normalize_scientific_name("epipremnum aureum"),
            "epipremnum aureum"
        );
    }

    #[test]
    fn test_genus_fallback_title_cases_first_token() {
        assert_eq!(genus_from_name("monstera deliciosa"), "Monstera");
        assert_eq!(genus_from_name("ficus"), "Ficus");
    }

    #[test]
    fn test_water_frequency_parsing() {
        assert_eq!(parse_water_frequency_days("every 5-7 days"), 5);
        assert_eq!(parse_water_frequency_days("water every 10 days"), 10);
        assert_eq!(parse_water_frequency_days("weekly"), 7);
        assert_eq!(parse_water_frequency_days("daily misting"), 1);
        assert_eq!(parse_water_frequency_days("when the soil feels dry"), 7);
        // Clamped to something sane.
        assert_eq!(parse_water_frequency_days("every 500 days"), 60);
        assert_eq!(parse_water_frequency_days("0 days"), 1);
    }

    #[test]
    fn test_merge_preserves_existing_order() {
        let existing = vec!["Pothos".to_string(), "Devil's Ivy".to_string()];
        let incoming = vec![
            "devil's ivy".to_string(), // case-insensitive duplicate
            "Golden Pothos".to_string(),
        ];
        let merged = merge_common_names(&existing, &incoming).unwrap();
        assert_eq!(
            merged,
            vec![
                "Pothos".to_string(),
                "Devil's Ivy".to_string(),
                "Golden Pothos".to_string()
            ]
        );
    }

    #[test]
    fn test_merge_with_nothing_new_is_none() {
        let existing = vec!["Pothos".to_string()];
        assert_eq!(merge_common_names(&existing, &["POTHOS".to_string()]), None);
        assert_eq!(merge_common_names(&existing, &[]), None);
    }

    mod integration {
        use super::*;
        use sqlx::PgPool;

        fn candidate(name: &str) -> SpeciesCandidate {
            SpeciesCandidate {
                scientific_name: name.to_string(),
                common_names: vec!["Pothos".to_string()],
                family: "Araceae".to_string(),
                genus: String::new(),
                confidence: 0.9,
                similar_image_url: None,
                provider_species_id: Some("sp-1".to_string()),
                description: None,
                toxicity: Some("mildly toxic if ingested".to_string()),
            }
        }

        #[sqlx::test(migrations = "../database/migrations")]
        async fn test_resolve_twice_is_idempotent(pool: PgPool) {
            let resolver = SpeciesResolver::new(Database::from_pool(pool.clone()));

            let first = resolver.resolve(&candidate("Epipremnum  Aureum")).await.unwrap();
            let second = resolver.resolve(&candidate("EPIPREMNUM AUREUM")).await.unwrap();
            assert_eq!(first, second);

            let row = database::species::get_species(&pool, first).await.unwrap();
            assert_eq!(row.scientific_name, "epipremnum aureum");
            // Genus fell back to the title-cased first token.
            assert_eq!(row.genus, "Epipremnum");
            assert_eq!(row.toxicity.as_deref(), Some("mildly toxic if ingested"));
        }

        #[sqlx::test(migrations = "../database/migrations")]
        async fn test_enrichment_never_overwrites(pool: PgPool) {
            let resolver = SpeciesResolver::new(Database::from_pool(pool.clone()));
            let id = resolver.resolve(&candidate("Calathea ornata")).await.unwrap();

            let mut second_opinion = candidate("calathea ornata");
            second_opinion.toxicity = Some("completely safe".to_string());
            resolver.resolve(&second_opinion).await.unwrap();

            let row = database::species::get_species(&pool, id).await.unwrap();
            // The first stored value wins.
            assert_eq!(row.toxicity.as_deref(), Some("mildly toxic if ingested"));
        }

        #[sqlx::test(migrations = "../database/migrations")]
        async fn test_resolve_merges_new_common_names(pool: PgPool) {
            let resolver = SpeciesResolver::new(Database::from_pool(pool.clone()));
            let id = resolver.resolve(&candidate("Monstera deliciosa")).await.unwrap();

            let mut richer = candidate("monstera deliciosa");
            richer.common_names = vec!["Pothos".to_string(), "Swiss Cheese Plant".to_string()];
            resolver.resolve(&richer).await.unwrap();

            let row = database::species::get_species(&pool, id).await.unwrap();
            assert_eq!(
                row.common_names,
                vec!["Pothos".to_string(), "Swiss Cheese Plant".to_string()]
            );
        }

        #[sqlx::test(migrations = "../database/migrations")]
        async fn test_concurrent_resolution_single_row(pool: PgPool) {
            let resolver_a = SpeciesResolver::new(Database::from_pool(pool.clone()));
            let resolver_b = SpeciesResolver::new(Database::from_pool(pool.clone()));

            let candidate_a = candidate("Ficus lyrata");
            let candidate_b = candidate("ficus LYRATA");
            let (a, b) = tokio::join!(
                resolver_a.resolve(&candidate_a),
                resolver_b.resolve(&candidate_b),
            );
            assert_eq!(a.unwrap(), b.unwrap());

            let row = database::species::find_by_scientific_name(&pool, "ficus lyrata")
                .await
                .unwrap();
            assert!(row.is_some());
        }
    }
}
