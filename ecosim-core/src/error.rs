use thiserror::Error;

/// Failures produced while loading, saving or checking an ecosystem description.
///
/// None of these ever cross into the simulation engine: loaders return them to
/// the caller, which keeps the previously live ecosystem.
#[derive(Error, Debug)]
pub enum DescriptionError {
    #[error("Failed to access ecosystem file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse ecosystem JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed ecosystem description: {0}")]
    Malformed(String),

    #[error("Social matrix holds {found} entries, expected {expected}")]
    Shape { expected: usize, found: usize },

    #[error(
        "Particle {particle} references species {species}, but only {species_count} species exist"
    )]
    SpeciesIndex {
        particle: usize,
        species: usize,
        species_count: usize,
    },
}
