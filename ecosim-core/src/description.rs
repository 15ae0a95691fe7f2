//! In-memory model of one ecosystem: species attributes, the pairwise social
//! matrix and the particles to spawn.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::DescriptionError;

// --- Species & Pair Attributes ---

/// Straight-alpha color, each channel in `0..=1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::new(1.0, 1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for Rgba {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Attributes shared by every particle of one species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeciesDescription {
    /// Length of the social-force delay line, in simulation steps.
    pub force_steps: u32,
    /// Fraction of velocity removed every step, in `[0, 1]`.
    pub drag: f32,
    /// This species' share of the collision repulsion strength.
    pub collision_force: f32,
    /// Passed through to the renderer only.
    pub color: Rgba,
}

/// How one species (the observer) reacts to another (the observed).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialDescription {
    /// Positive attracts, negative repels.
    pub social_force: f32,
    pub social_range: f32,
}

/// Initial state of one spawned particle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParticleDescription {
    #[serde(with = "crate::codec::vec3_xyz")]
    pub position: Vec3,
    #[serde(with = "crate::codec::vec3_xyz")]
    pub velocity: Vec3,
    pub species: usize,
}

// --- Social Matrix ---

/// Square matrix of [`SocialDescription`] indexed by `(observer, observed)`.
///
/// Stored densely, observer-major. The persisted file uses a different
/// linearization, see [`SocialMatrix::to_linear`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SocialMatrix {
    side: usize,
    cells: Vec<SocialDescription>,
}

impl SocialMatrix {
    /// A `side` x `side` matrix of neutral relations.
    pub fn new(side: usize) -> Self {
        Self {
            side,
            cells: vec![SocialDescription::default(); side * side],
        }
    }

    /// Builds the matrix by calling `f(observer, observed)` in observer-major order.
    pub fn from_fn(side: usize, mut f: impl FnMut(usize, usize) -> SocialDescription) -> Self {
        let mut cells = Vec::with_capacity(side * side);
        for observer in 0..side {
            for observed in 0..side {
                cells.push(f(observer, observed));
            }
        }
        Self { side, cells }
    }

    pub fn side(&self) -> usize {
        self.side
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Relation of `observer` towards `observed`.
    ///
    /// # Panics
    ///
    /// Panics if either index is not below [`side`](Self::side). Species indices
    /// only come from the generator or a validated loader, so an out-of-range
    /// index is a bug upstream.
    pub fn get(&self, observer: usize, observed: usize) -> &SocialDescription {
        assert!(
            observer < self.side && observed < self.side,
            "social matrix index ({observer}, {observed}) out of range for {} species",
            self.side
        );
        &self.cells[observer * self.side + observed]
    }

    /// Mutable access, with the same bounds contract as [`get`](Self::get).
    pub fn get_mut(&mut self, observer: usize, observed: usize) -> &mut SocialDescription {
        assert!(
            observer < self.side && observed < self.side,
            "social matrix index ({observer}, {observed}) out of range for {} species",
            self.side
        );
        &mut self.cells[observer * self.side + observed]
    }

    /// Flattens the matrix row-major by observed species, then observing species.
    pub fn to_linear(&self) -> Vec<SocialDescription> {
        let mut linear = Vec::with_capacity(self.cells.len());
        for observed in 0..self.side {
            for observer in 0..self.side {
                linear.push(*self.get(observer, observed));
            }
        }
        linear
    }

    /// Inverse of [`to_linear`](Self::to_linear) for a matrix of `side` species.
    pub fn from_linear(
        linear: Vec<SocialDescription>,
        side: usize,
    ) -> Result<Self, DescriptionError> {
        if linear.len() != side * side {
            return Err(DescriptionError::Shape {
                expected: side * side,
                found: linear.len(),
            });
        }
        Ok(Self::from_fn(side, |observer, observed| linear[observed * side + observer]))
    }
}

// --- Aggregate Root ---

/// Complete configuration needed to (re)populate the simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct EcosystemDescription {
    pub name: String,
    /// `true` when produced from a seed, `false` for hand-authored presets.
    pub is_random_description: bool,
    pub social_data: SocialMatrix,
    pub species_data: Vec<SpeciesDescription>,
    pub to_spawn: Vec<ParticleDescription>,
}

impl EcosystemDescription {
    /// Sentinel with no species and no particles.
    pub fn empty() -> Self {
        Self {
            name: String::new(),
            is_random_description: false,
            social_data: SocialMatrix::default(),
            species_data: Vec::new(),
            to_spawn: Vec::new(),
        }
    }

    pub fn species_count(&self) -> usize {
        self.species_data.len()
    }

    /// Cheap check used to spot failed deserialization.
    pub fn is_well_formed(&self) -> bool {
        !self.name.is_empty() && !self.social_data.is_empty() && !self.species_data.is_empty()
    }

    /// Checks the structural invariants: a square social matrix matching the
    /// species count, and every spawn referencing an existing species.
    pub fn validate(&self) -> Result<(), DescriptionError> {
        let species_count = self.species_count();
        if self.social_data.side() != species_count {
            return Err(DescriptionError::Shape {
                expected: species_count * species_count,
                found: self.social_data.side() * self.social_data.side(),
            });
        }

        if let Some((particle, spawn)) = self
            .to_spawn
            .iter()
            .enumerate()
            .find(|(_, spawn)| spawn.species >= species_count)
        {
            return Err(DescriptionError::SpeciesIndex {
                particle,
                species: spawn.species,
                species_count,
            });
        }

        Ok(())
    }
}

impl Default for EcosystemDescription {
    fn default() -> Self {
        Self::empty()
    }
}
