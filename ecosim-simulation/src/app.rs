//! Explicit wiring of engine, generator, reset controller and parameters for
//! a host application.

use std::path::Path;

use crossbeam_channel::Receiver;
use ecosim_config::{Config, ResetBehavior};
use ecosim_core::{DescriptionError, EcosystemDescription};
use log::{debug, info, warn};
use thiserror::Error;

use crate::engine::ParticleSimulationEngine;
use crate::frame::Frame;
use crate::generator::RandomEcosystemGenerator;
use crate::parameters::ParameterFacade;
use crate::reset::{ResetController, ResetError, ResetEvent};
use crate::seed::SeedSource;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Ecosystem file error: {0}")]
    Description(#[from] DescriptionError),

    #[error("Reset error: {0}")]
    Reset(#[from] ResetError),
}

pub struct EcosystemApp {
    engine: ParticleSimulationEngine,
    generator: RandomEcosystemGenerator,
    reset: ResetController,
    parameters: ParameterFacade,
    reset_behavior: ResetBehavior,
    current_seed: Option<String>,
    accumulator: f32,
}

impl EcosystemApp {
    pub fn new(config: &Config) -> Self {
        Self::with_generator(config, RandomEcosystemGenerator::new(config.generation.clone()))
    }

    pub fn with_seed_source(
        config: &Config,
        seed_source: impl SeedSource + Send + 'static,
    ) -> Self {
        Self::with_generator(
            config,
            RandomEcosystemGenerator::with_seed_source(config.generation.clone(), seed_source),
        )
    }

    fn with_generator(config: &Config, generator: RandomEcosystemGenerator) -> Self {
        Self {
            engine: ParticleSimulationEngine::new(config.simulation.clone()),
            generator,
            reset: ResetController::new(&config.reset),
            parameters: ParameterFacade::new(config.generation.clone(), config.simulation.clone()),
            reset_behavior: config.reset.behavior,
            current_seed: None,
            accumulator: 0.0,
        }
    }

    pub fn engine(&self) -> &ParticleSimulationEngine {
        &self.engine
    }

    pub fn parameters(&self) -> &ParameterFacade {
        &self.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut ParameterFacade {
        &mut self.parameters
    }

    pub fn reset_controller(&self) -> &ResetController {
        &self.reset
    }

    pub fn subscribe(&mut self) -> Receiver<ResetEvent> {
        self.reset.subscribe()
    }

    pub fn reset_behavior(&self) -> ResetBehavior {
        self.reset_behavior
    }

    pub fn set_reset_behavior(&mut self, behavior: ResetBehavior) {
        self.reset_behavior = behavior;
    }

    pub fn current_seed(&self) -> Option<&str> {
        self.current_seed.as_deref()
    }

    pub fn set_frame(&mut self, frame: Frame) {
        self.engine.set_frame(frame);
    }

    /// Generates an ecosystem from `seed` with the current bounds and
    /// schedules it. Returns the generated description's name.
    pub fn generate_random_ecosystem(&mut self, seed: &str) -> Result<String, AppError> {
        self.generator.set_bounds(self.parameters.bounds().clone());
        let description = self.generator.generate_from_seed(seed);
        let name = description.name.clone();
        self.reset.request(description, self.reset_behavior)?;
        self.current_seed = Some(seed.to_string());
        Ok(name)
    }

    /// Same as [`generate_random_ecosystem`](Self::generate_random_ecosystem)
    /// with a seed from the seed source.
    pub fn generate_unnamed_ecosystem(&mut self) -> Result<String, AppError> {
        self.generator.set_bounds(self.parameters.bounds().clone());
        let (seed, description) = self.generator.generate_random_ecosystem();
        self.reset.request(description, self.reset_behavior)?;
        self.current_seed = Some(seed.clone());
        Ok(seed)
    }

    /// Loads an ecosystem file. On failure the live ecosystem is left as it
    /// was. A seeded file becomes the seed that [`restart`](Self::restart)
    /// regenerates, since generated names are their seeds.
    pub fn load_ecosystem(&mut self, path: impl AsRef<Path>) -> Result<(), AppError> {
        let path = path.as_ref();
        let description = match EcosystemDescription::load(path) {
            Ok(description) => description,
            Err(err) => {
                warn!("Keeping live ecosystem, failed to load {}: {}", path.display(), err);
                return Err(err.into());
            }
        };
        let seed = description
            .is_random_description
            .then(|| description.name.clone());
        self.reset.request(description, self.reset_behavior)?;
        self.current_seed = seed;
        Ok(())
    }

    pub fn save_ecosystem(&self, path: impl AsRef<Path>) -> Result<(), AppError> {
        self.engine.description().save(path)?;
        Ok(())
    }

    /// Regenerates the current seed with the current bounds, or respawns the
    /// live description when it did not come from a seed.
    pub fn restart(&mut self) -> Result<(), AppError> {
        match self.current_seed.clone() {
            Some(seed) => {
                info!("Restarting seed '{}'", seed);
                self.generate_random_ecosystem(&seed)?;
            }
            None => {
                let description = self.engine.description().clone();
                info!("Respawning '{}'", description.name);
                self.reset.request(description, self.reset_behavior)?;
            }
        }
        Ok(())
    }

    /// One fixed step: staged settings, pending reset, then integration.
    pub fn tick(&mut self) {
        if let Some(settings) = self.parameters.take_settings_update() {
            self.engine.apply_settings(settings);
        }

        let dt = self.engine.settings().fixed_delta_time;
        self.reset.advance(dt, &mut self.engine);
        self.parameters
            .set_generation_controls_enabled(self.engine.description().is_random_description);

        self.engine.step();
    }

    /// Runs as many fixed steps as `real_dt` covers after time scaling, at
    /// most `max_substeps`. Returns the number of steps run.
    pub fn update(&mut self, real_dt: f32) -> u32 {
        let dt = self.engine.settings().fixed_delta_time;
        let max_substeps = self.engine.settings().max_substeps;
        self.accumulator += real_dt.max(0.0) * self.parameters.time_scale();

        let mut substeps = 0;
        while self.accumulator >= dt && substeps < max_substeps {
            self.tick();
            self.accumulator -= dt;
            substeps += 1;
        }

        if substeps == max_substeps && self.accumulator >= dt {
            debug!("Dropping {:.4}s of backlog after {} substeps", self.accumulator, substeps);
            self.accumulator %= dt;
        }
        substeps
    }
}
