//! Seeded random ecosystems.
//!
//! Generation is split into phases, and each phase draws from its own
//! [`Pcg32`] stream. All streams are seeded from sub-seeds that are drawn up
//! front from the hashed seed string, so the number of draws one phase makes
//! never shifts the values another phase sees.

use ecosim_config::GenerationBounds;
use ecosim_core::{
    EcosystemDescription, ParticleDescription, Rgba, SocialDescription, SocialMatrix,
    SpeciesDescription,
};
use glam::Vec3;
use log::{debug, info};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::seed::{SeedSource, SyllableSeedSource};

/// Sub-seeds drawn for every generation. Only the first four are consumed.
pub const META_SEED_COUNT: usize = 10;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a over the UTF-8 bytes of `seed`.
pub fn hash_seed(seed: &str) -> u64 {
    seed.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationPhase {
    SocialMatrix,
    Species,
    Spawns,
    Colors,
}

impl GenerationPhase {
    pub fn index(self) -> usize {
        match self {
            GenerationPhase::SocialMatrix => 0,
            GenerationPhase::Species => 1,
            GenerationPhase::Spawns => 2,
            GenerationPhase::Colors => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaSeed {
    sub_seeds: [u64; META_SEED_COUNT],
}

impl MetaSeed {
    pub fn from_seed(seed: &str) -> Self {
        let mut rng = Pcg32::seed_from_u64(hash_seed(seed));
        let mut sub_seeds = [0u64; META_SEED_COUNT];
        for sub_seed in sub_seeds.iter_mut() {
            *sub_seed = rng.gen();
        }
        Self { sub_seeds }
    }

    pub fn sub_seed(&self, index: usize) -> u64 {
        self.sub_seeds[index]
    }

    /// A fresh stream for `phase`, independent of every other phase.
    pub fn phase_rng(&self, phase: GenerationPhase) -> Pcg32 {
        Pcg32::seed_from_u64(self.sub_seed(phase.index()))
    }
}

fn uniform(rng: &mut Pcg32, min: f32, max: f32) -> f32 {
    min + (max - min) * rng.gen::<f32>()
}

// --- Phases ---

pub fn generate_social_matrix(rng: &mut Pcg32, bounds: &GenerationBounds) -> SocialMatrix {
    let max_force = bounds.max_social_force;
    let max_range = bounds.max_social_range;

    SocialMatrix::from_fn(bounds.species_count(), |observer, observed| {
        let social_force = uniform(rng, -max_force, max_force);
        let range_limit = if observer == observed && social_force <= 0.0 {
            max_range * bounds.max_self_hate_factor
        } else {
            max_range
        };
        SocialDescription {
            social_force,
            social_range: uniform(rng, 0.0, range_limit),
        }
    })
}

/// Species attributes. Colors are filled in by [`generate_colors`].
pub fn generate_species(rng: &mut Pcg32, bounds: &GenerationBounds) -> Vec<SpeciesDescription> {
    let max_steps = bounds.max_force_steps.max(0) as u32;

    (0..bounds.species_count())
        .map(|_| {
            let drag = uniform(
                rng,
                bounds.drag_center - bounds.drag_spread,
                bounds.drag_center + bounds.drag_spread,
            )
            .clamp(0.0, 1.0);
            // Float rounding can land exactly on the upper bound.
            let drawn_steps = (rng.gen::<f32>() * max_steps as f32).floor() as u32;
            let force_steps = drawn_steps.min(max_steps.saturating_sub(1));
            let collision_force =
                uniform(rng, bounds.min_collision_force, bounds.max_collision_force);

            SpeciesDescription {
                force_steps,
                drag,
                collision_force,
                color: Rgba::WHITE,
            }
        })
        .collect()
}

/// Positions uniform inside the spawn sphere, species assigned round-robin.
pub fn generate_spawns(rng: &mut Pcg32, bounds: &GenerationBounds) -> Vec<ParticleDescription> {
    let species_count = bounds.species_count();

    (0..bounds.particle_count())
        .map(|index| ParticleDescription {
            position: point_in_unit_sphere(rng) * bounds.spawn_radius,
            velocity: Vec3::ZERO,
            species: index % species_count,
        })
        .collect()
}

fn point_in_unit_sphere(rng: &mut Pcg32) -> Vec3 {
    loop {
        let candidate = Vec3::new(
            uniform(rng, -1.0, 1.0),
            uniform(rng, -1.0, 1.0),
            uniform(rng, -1.0, 1.0),
        );
        if candidate.length_squared() <= 1.0 {
            return candidate;
        }
    }
}

/// Evenly spaced hues from a random starting point, with slight jitter in
/// saturation and value.
pub fn generate_colors(rng: &mut Pcg32, count: usize) -> Vec<Rgba> {
    let offset = rng.gen::<f32>();
    (0..count)
        .map(|index| {
            let hue = (offset + index as f32 / count as f32).fract();
            let saturation = uniform(rng, 0.6, 0.85);
            let value = uniform(rng, 0.8, 1.0);
            hsv_to_rgb(hue, saturation, value)
        })
        .collect()
}

fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> Rgba {
    let sector = hue * 6.0;
    let chroma = value * saturation;
    let x = chroma * (1.0 - ((sector % 2.0) - 1.0).abs());
    let (r, g, b) = match sector as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = value - chroma;
    Rgba::new(r + m, g + m, b + m, 1.0)
}

// --- Generator ---

pub struct RandomEcosystemGenerator {
    bounds: GenerationBounds,
    seed_source: Box<dyn SeedSource + Send>,
}

impl RandomEcosystemGenerator {
    pub fn new(bounds: GenerationBounds) -> Self {
        Self::with_seed_source(bounds, SyllableSeedSource::new())
    }

    pub fn with_seed_source(
        bounds: GenerationBounds,
        seed_source: impl SeedSource + Send + 'static,
    ) -> Self {
        Self {
            bounds,
            seed_source: Box::new(seed_source),
        }
    }

    pub fn bounds(&self) -> &GenerationBounds {
        &self.bounds
    }

    pub fn set_bounds(&mut self, bounds: GenerationBounds) {
        self.bounds = bounds;
    }

    /// Pure function of `(seed, bounds)`. Out-of-range bounds are clamped.
    pub fn generate(seed: &str, bounds: &GenerationBounds) -> EcosystemDescription {
        let bounds = bounds.sanitized();
        let meta = MetaSeed::from_seed(seed);

        let mut social_rng = meta.phase_rng(GenerationPhase::SocialMatrix);
        let social_data = generate_social_matrix(&mut social_rng, &bounds);
        let mut species_rng = meta.phase_rng(GenerationPhase::Species);
        let mut species_data = generate_species(&mut species_rng, &bounds);
        let to_spawn = generate_spawns(&mut meta.phase_rng(GenerationPhase::Spawns), &bounds);
        let mut color_rng = meta.phase_rng(GenerationPhase::Colors);
        let colors = generate_colors(&mut color_rng, species_data.len());
        for (species, color) in species_data.iter_mut().zip(colors) {
            species.color = color;
        }

        let name = if seed.is_empty() {
            format!("ecosystem-{:016x}", hash_seed(seed))
        } else {
            seed.to_string()
        };
        debug!(
            "Generated '{}': {} species, {} particles",
            name,
            species_data.len(),
            to_spawn.len()
        );

        EcosystemDescription {
            name,
            is_random_description: true,
            social_data,
            species_data,
            to_spawn,
        }
    }

    /// Generates from `seed` with the current bounds.
    pub fn generate_from_seed(&self, seed: &str) -> EcosystemDescription {
        Self::generate(seed, &self.bounds)
    }

    /// Generates from a seed drawn from the seed source. Returns the seed
    /// with the description, since the name differs from it for empty seeds.
    pub fn generate_random_ecosystem(&mut self) -> (String, EcosystemDescription) {
        let seed = self.seed_source.next_seed();
        info!("Generating random ecosystem from seed '{}'", seed);
        let description = self.generate_from_seed(&seed);
        (seed, description)
    }
}
