//! Species catalog operations.
//!
//! The catalog holds exactly one row per normalized scientific name,
//! enforced by a unique index on `lower(scientific_name)`. Inserts racing
//! on the same name surface a unique violation the resolver recovers from.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{DatabaseError, Result};
use crate::models::{NewSpecies, Species, SpeciesEnrichment};

const SPECIES_COLUMNS: &str = "id, scientific_name, common_names, family, genus, light, \
     water_frequency, humidity, temperature, difficulty, toxicity, description, \
     plant_id_species_id, created_at, updated_at";

/// Case-insensitive lookup by scientific name.
pub async fn find_by_scientific_name(pool: &PgPool, name: &str) -> Result<Option<Species>> {
    let row = sqlx::query_as::<_, Species>(&format!(
        "SELECT {SPECIES_COLUMNS} FROM species WHERE lower(scientific_name) = lower($1)"
    ))
    .bind(name)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Get a species by id.
pub async fn get_species(pool: &PgPool, id: Uuid) -> Result<Species> {
    sqlx::query_as::<_, Species>(&format!(
        "SELECT {SPECIES_COLUMNS} FROM species WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Species",
        id: id.to_string(),
    })
}

/// Insert a new species row and return it.
///
/// A concurrent insert of the same normalized name loses with
/// `AlreadyExists`; callers re-read and enrich instead.
pub async fn insert_species(pool: &PgPool, new: &NewSpecies) -> Result<Species> {
    sqlx::query_as::<_, Species>(&format!(
        r#"
        INSERT INTO species (scientific_name, common_names, family, genus,
                             toxicity, description, plant_id_species_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {SPECIES_COLUMNS}
        "#
    ))
    .bind(&new.scientific_name)
    .bind(&new.common_names)
    .bind(&new.family)
    .bind(&new.genus)
    .bind(&new.toxicity)
    .bind(&new.description)
    .bind(&new.plant_id_species_id)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return DatabaseError::AlreadyExists {
                    entity: "Species",
                    id: new.scientific_name.clone(),
                };
            }
        }
        DatabaseError::Sqlx(e)
    })
}

/// Apply enrichment updates to an existing row.
///
/// Only the fields present in the enrichment are written; callers are
/// expected to skip the call entirely when the update set is empty.
pub async fn enrich_species(pool: &PgPool, id: Uuid, update: &SpeciesEnrichment) -> Result<()> {
    if update.is_empty() {
        return Ok(());
    }

    sqlx::query(
        r#"
        UPDATE species
        SET common_names = COALESCE($2, common_names),
            toxicity = COALESCE($3, toxicity),
            description = COALESCE($4, description),
            plant_id_species_id = COALESCE($5, plant_id_species_id),
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(&update.common_names)
    .bind(&update.toxicity)
    .bind(&update.description)
    .bind(&update.plant_id_species_id)
    .execute(pool)
    .await?;

    Ok(())
}
