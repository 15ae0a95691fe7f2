//! Multi-species particle ecosystem: seeded generation, fixed-step
//! integration with delayed social forces, and live reset handling.

pub mod app;
pub mod engine;
pub mod frame;
pub mod generator;
pub mod parameters;
pub mod reset;
pub mod seed;

pub use app::{AppError, EcosystemApp};
pub use engine::{Particle, ParticleSimulationEngine, ParticleState};
pub use frame::Frame;
pub use generator::{
    hash_seed, GenerationPhase, MetaSeed, RandomEcosystemGenerator, META_SEED_COUNT,
};
pub use parameters::ParameterFacade;
pub use reset::{ResetController, ResetError, ResetEvent, ResetState};
pub use seed::{SeedSource, SyllableSeedSource};

pub mod prelude {
    pub use crate::{
        EcosystemApp, Frame, ParameterFacade, ParticleSimulationEngine, RandomEcosystemGenerator,
        ResetController, ResetEvent,
    };
    pub use ecosim_config::{Config, ResetBehavior};
    pub use ecosim_core::EcosystemDescription;
}
