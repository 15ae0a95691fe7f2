//! Data model shared by every ecosim crate: the [`EcosystemDescription`]
//! aggregate and its persisted JSON form.

pub mod codec;
pub mod description;
pub mod error;

pub use description::{
    EcosystemDescription, ParticleDescription, Rgba, SocialDescription, SocialMatrix,
    SpeciesDescription,
};
pub use error::DescriptionError;

// Re-exported so downstream crates agree on one vector type.
pub use glam::{Quat, Vec3};
