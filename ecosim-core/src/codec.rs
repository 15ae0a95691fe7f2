//! Persisted ecosystem files.
//!
//! The on-disk form is a JSON object tree with camelCase keys. The social matrix
//! is written as a flat array of `speciesCount²` entries (see
//! [`SocialMatrix::to_linear`]) and vectors as `{x, y, z}` objects.

use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::description::{
    EcosystemDescription, ParticleDescription, SocialDescription, SocialMatrix, SpeciesDescription,
};
use crate::error::DescriptionError;

/// Serde adapter writing a `glam::Vec3` as `{"x": .., "y": .., "z": ..}`.
pub mod vec3_xyz {
    use glam::Vec3;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Xyz {
        x: f32,
        y: f32,
        z: f32,
    }

    pub fn serialize<S: Serializer>(value: &Vec3, serializer: S) -> Result<S::Ok, S::Error> {
        Xyz { x: value.x, y: value.y, z: value.z }.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec3, D::Error> {
        let Xyz { x, y, z } = Xyz::deserialize(deserializer)?;
        Ok(Vec3::new(x, y, z))
    }
}

// Every field is optional on read so that a truncated file surfaces as a
// malformed description instead of a parse error.
#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct EcosystemRecord {
    #[serde(default)]
    name: String,
    #[serde(default)]
    is_random_description: bool,
    #[serde(default)]
    species_data: Vec<SpeciesDescription>,
    #[serde(default)]
    social_data: Vec<SocialDescription>,
    #[serde(default)]
    to_spawn: Option<Vec<ParticleDescription>>,
}

impl From<&EcosystemDescription> for EcosystemRecord {
    fn from(description: &EcosystemDescription) -> Self {
        Self {
            name: description.name.clone(),
            is_random_description: description.is_random_description,
            species_data: description.species_data.clone(),
            social_data: description.social_data.to_linear(),
            to_spawn: Some(description.to_spawn.clone()),
        }
    }
}

impl EcosystemRecord {
    fn into_description(self) -> Result<EcosystemDescription, DescriptionError> {
        let to_spawn = match self.to_spawn {
            Some(to_spawn) => to_spawn,
            None => return Err(DescriptionError::Malformed("missing toSpawn".to_string())),
        };

        let side = self.species_data.len();
        let description = EcosystemDescription {
            social_data: SocialMatrix::from_linear(self.social_data, side)?,
            name: self.name,
            is_random_description: self.is_random_description,
            species_data: self.species_data,
            to_spawn,
        };

        if !description.is_well_formed() {
            return Err(DescriptionError::Malformed(format!(
                "'{}' needs a name, at least one species and a {side}x{side} social matrix",
                description.name
            )));
        }
        description.validate()?;
        Ok(description)
    }
}

impl EcosystemDescription {
    /// Pretty-printed JSON form of this description.
    pub fn to_json(&self) -> Result<String, DescriptionError> {
        Ok(serde_json::to_string_pretty(&EcosystemRecord::from(self))?)
    }

    /// Parses and checks a description. Any structural problem is returned as an
    /// error; the caller decides whether to keep its current ecosystem.
    pub fn from_json(text: &str) -> Result<Self, DescriptionError> {
        let record: EcosystemRecord = serde_json::from_str(text)?;
        record.into_description()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DescriptionError> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?)?;
        info!("Saved ecosystem '{}' to {}", self.name, path.display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DescriptionError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        match Self::from_json(&text) {
            Ok(description) => {
                info!(
                    "Loaded ecosystem '{}' ({} species, {} particles) from {}",
                    description.name,
                    description.species_count(),
                    description.to_spawn.len(),
                    path.display()
                );
                Ok(description)
            }
            Err(err) => {
                warn!("Rejected ecosystem file {}: {}", path.display(), err);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::tests::sample_description;

    #[test]
    fn json_round_trip_is_exact() {
        let description = sample_description();
        let json = description.to_json().unwrap();
        let restored = EcosystemDescription::from_json(&json).unwrap();
        assert_eq!(restored, description);

        // Saving the restored copy yields identical text.
        assert_eq!(restored.to_json().unwrap(), json);
    }

    #[test]
    fn social_matrix_is_written_observed_major() {
        let description = sample_description();
        let json = description.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let linear = value["socialData"].as_array().unwrap();
        assert_eq!(linear.len(), 4);

        // Entry 1 is (observer 1, observed 0).
        let expected = description.social_data.get(1, 0).social_force as f64;
        let written = linear[1]["socialForce"].as_f64().unwrap();
        assert!((written - expected).abs() < 1e-6);
    }

    #[test]
    fn file_uses_documented_field_names() {
        let json = sample_description().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["name"], "tidepool");
        assert_eq!(value["isRandomDescription"], true);
        assert_eq!(value["speciesData"][0]["forceSteps"], 3);
        assert!(value["speciesData"][1]["color"]["b"].is_number());
        assert!(value["toSpawn"][1]["velocity"]["z"].is_number());
        assert_eq!(value["toSpawn"][1]["species"], 1);
    }

    #[test]
    fn missing_spawn_list_is_malformed() {
        let mut value: serde_json::Value =
            serde_json::from_str(&sample_description().to_json().unwrap()).unwrap();
        value.as_object_mut().unwrap().remove("toSpawn");
        let result = EcosystemDescription::from_json(&value.to_string());
        assert!(matches!(result, Err(DescriptionError::Malformed(_))));
    }

    #[test]
    fn empty_name_is_malformed() {
        let mut description = sample_description();
        description.name.clear();
        let json = description.to_json().unwrap();
        let result = EcosystemDescription::from_json(&json);
        assert!(matches!(result, Err(DescriptionError::Malformed(_))));
    }

    #[test]
    fn unrelated_json_is_malformed_not_a_crash() {
        let result = EcosystemDescription::from_json(r#"{"framerate": 60}"#);
        assert!(matches!(result, Err(DescriptionError::Malformed(_))));

        let result = EcosystemDescription::from_json("not json at all");
        assert!(matches!(result, Err(DescriptionError::Json(_))));
    }

    #[test]
    fn truncated_social_matrix_is_rejected() {
        let mut value: serde_json::Value =
            serde_json::from_str(&sample_description().to_json().unwrap()).unwrap();
        value["socialData"].as_array_mut().unwrap().pop();
        let result = EcosystemDescription::from_json(&value.to_string());
        assert!(matches!(
            result,
            Err(DescriptionError::Shape { expected: 4, found: 3 })
        ));
    }

    #[test]
    fn out_of_range_species_is_rejected_on_load() {
        let mut value: serde_json::Value =
            serde_json::from_str(&sample_description().to_json().unwrap()).unwrap();
        value["toSpawn"][0]["species"] = serde_json::json!(9);
        let result = EcosystemDescription::from_json(&value.to_string());
        assert!(matches!(result, Err(DescriptionError::SpeciesIndex { species: 9, .. })));
    }

    #[test]
    fn save_then_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tidepool.json");
        let description = sample_description();
        description.save(&path).unwrap();
        let loaded = EcosystemDescription::load(&path).unwrap();
        assert_eq!(loaded, description);
    }

    #[test]
    fn loading_missing_file_reports_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = EcosystemDescription::load(dir.path().join("absent.json"));
        assert!(matches!(result, Err(DescriptionError::Io(_))));
    }
}
