//! Plant creation on top of the species catalog.
//!
//! A new plant's watering cadence is derived at creation from the
//! resolved species' free-text watering description; plants without a
//! species fall back to a weekly cadence.

use database::{plant, species, Database, Plant};
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::OrchestratorError;
use crate::species::{parse_water_frequency_days, DEFAULT_WATER_FREQUENCY_DAYS};

/// Client-supplied fields for a new plant.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPlantRequest {
    /// Catalog species, usually from a prior identify call.
    pub species_id: Option<Uuid>,
    pub nickname: Option<String>,
    pub location_in_home: String,
    pub light_exposure: String,
}

/// Creates plants with their derived care schedule.
pub struct PlantService {
    db: Database,
}

impl PlantService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a plant for a user.
    ///
    /// When the request names a species, its free-text watering
    /// description drives `watering_frequency_days`; a missing species or
    /// description means the weekly default.
    pub async fn create(
        &self,
        user_id: Uuid,
        request: &NewPlantRequest,
    ) -> Result<Plant, OrchestratorError> {
        if request.location_in_home.trim().is_empty() {
            return Err(OrchestratorError::InvalidInput(
                "locationInHome is required".to_string(),
            ));
        }
        if request.light_exposure.trim().is_empty() {
            return Err(OrchestratorError::InvalidInput(
                "lightExposure is required".to_string(),
            ));
        }

        let watering_frequency_days = match request.species_id {
            Some(species_id) => {
                let row = species::get_species(self.db.pool(), species_id)
                    .await
                    .map_err(|e| OrchestratorError::from_lookup(e, "Species"))?;
                match row.water_frequency.as_deref() {
                    Some(text) => {
                        let days = parse_water_frequency_days(text);
                        debug!(species = %row.scientific_name, days, "derived watering cadence");
                        days
                    }
                    None => DEFAULT_WATER_FREQUENCY_DAYS,
                }
            }
            None => DEFAULT_WATER_FREQUENCY_DAYS,
        };

        let plant = plant::create_plant(
            self.db.pool(),
            &plant::NewPlant {
                user_id,
                species_id: request.species_id,
                nickname: request.nickname.clone(),
                location_in_home: request.location_in_home.trim().to_string(),
                light_exposure: request.light_exposure.trim().to_string(),
                watering_frequency_days,
            },
        )
        .await?;

        info!(plant = %plant.id, watering_frequency_days, "plant created");
        Ok(plant)
    }
}
