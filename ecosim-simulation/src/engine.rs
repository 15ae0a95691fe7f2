//! Fixed-step integration of the particle ecosystem.
//!
//! Every step runs a brute-force all-pairs scan. Forces are gathered in a
//! read-only pass (parallel over observers, sequential over the others so
//! sums are reproducible), then applied to each particle in index order:
//! collision, delayed social force, drag, field containment and finally a
//! semi-implicit Euler position update.
//!
//! Positions live in the display frame. Every distance threshold and force
//! magnitude is multiplied by the frame scale, so zooming the host view does
//! not change the behavior of the ecosystem.

use std::collections::VecDeque;

use ecosim_config::SimulationSettings;
use ecosim_core::{EcosystemDescription, Rgba, SocialMatrix, SpeciesDescription};
use glam::Vec3;
use log::{debug, info, trace, warn};
use rayon::prelude::*;

use crate::frame::Frame;

/// Below this separation two particles have no usable direction.
const DIRECTION_EPSILON: f32 = 1e-6;

// --- Particle State ---

/// Live state of one particle, owned by the engine.
#[derive(Debug, Clone)]
pub struct Particle {
    pub position: Vec3,
    pub velocity: Vec3,
    pub species: usize,
    /// Averaged social forces, newest at the front.
    force_delay: VecDeque<Vec3>,
}

impl Particle {
    fn spawn(position: Vec3, velocity: Vec3, species: usize, force_steps: u32) -> Self {
        Self {
            position,
            velocity,
            species,
            force_delay: VecDeque::with_capacity(force_steps as usize + 1),
        }
    }

    /// Number of social forces waiting in the delay line.
    pub fn delayed_forces(&self) -> usize {
        self.force_delay.len()
    }
}

/// Copy of one particle handed to the rendering side after a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleState {
    pub position: Vec3,
    pub velocity: Vec3,
    pub species: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct Accumulated {
    collision: Vec3,
    social_sum: Vec3,
    neighbors: u32,
}

// --- Engine ---

pub struct ParticleSimulationEngine {
    particles: Vec<Particle>,
    description: EcosystemDescription,
    settings: SimulationSettings,
    frame: Frame,
    ticks: u64,
}

impl ParticleSimulationEngine {
    pub fn new(settings: SimulationSettings) -> Self {
        Self {
            particles: Vec::new(),
            description: EcosystemDescription::empty(),
            settings,
            frame: Frame::IDENTITY,
            ticks: 0,
        }
    }

    pub fn description(&self) -> &EcosystemDescription {
        &self.description
    }

    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    /// Replaces the physical settings. Call between steps only.
    pub fn apply_settings(&mut self, settings: SimulationSettings) {
        debug!(
            "Applying simulation settings: dt={} radius={} field=({}, {})",
            settings.fixed_delta_time,
            settings.particle_radius,
            settings.field_radius,
            settings.field_force
        );
        self.settings = settings;
    }

    pub fn frame(&self) -> Frame {
        self.frame
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    /// Number of completed steps since the engine was created.
    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    /// Destroys every live particle. The loaded description is kept.
    pub fn clear(&mut self) {
        self.particles.clear();
    }

    /// Replaces all live particles with the spawn list of `description`.
    ///
    /// Spawn positions and velocities are in simulation-local space and are
    /// mapped through the current frame. Delay lines start empty.
    ///
    /// # Panics
    ///
    /// Panics if the social matrix does not match the species list or a spawn
    /// references a missing species. Descriptions come from the generator or a
    /// validated loader, so either case is a bug.
    pub fn repopulate(&mut self, description: EcosystemDescription) {
        let species_count = description.species_count();
        assert_eq!(
            description.social_data.side(),
            species_count,
            "social matrix side does not match species count"
        );

        let frame = self.frame;
        self.particles = description
            .to_spawn
            .iter()
            .map(|spawn| {
                assert!(
                    spawn.species < species_count,
                    "spawn species {} out of range for {} species",
                    spawn.species,
                    species_count
                );
                Particle::spawn(
                    frame.transform_point(spawn.position),
                    frame.transform_vector(spawn.velocity),
                    spawn.species,
                    description.species_data[spawn.species].force_steps,
                )
            })
            .collect();

        info!(
            "Populated ecosystem '{}' with {} particles across {} species",
            description.name,
            self.particles.len(),
            species_count
        );
        self.description = description;
    }

    /// Copies species colors from `description` without touching particles or
    /// physics. Returns how many species were recolored.
    pub fn update_colors(&mut self, description: &EcosystemDescription) -> usize {
        let mut updated = 0;
        for (current, incoming) in self
            .description
            .species_data
            .iter_mut()
            .zip(&description.species_data)
        {
            current.color = incoming.color;
            updated += 1;
        }
        if updated != description.species_count() || updated != self.description.species_count() {
            warn!(
                "Color update matched {} species (live {}, incoming {})",
                updated,
                self.description.species_count(),
                description.species_count()
            );
        }
        updated
    }

    pub fn species_colors(&self) -> Vec<Rgba> {
        self.description.species_data.iter().map(|s| s.color).collect()
    }

    /// Moves the simulation into a new display frame. Positions and velocities
    /// are remapped so the relative configuration is unchanged.
    pub fn set_frame(&mut self, frame: Frame) {
        if !frame.is_valid() {
            warn!("Ignoring invalid frame {:?}", frame);
            return;
        }
        if frame == self.frame {
            return;
        }

        let old = self.frame;
        for particle in &mut self.particles {
            let local_position = old.inverse_transform_point(particle.position);
            let local_velocity = old.inverse_transform_vector(particle.velocity);
            particle.position = frame.transform_point(local_position);
            particle.velocity = frame.transform_vector(local_velocity);
        }
        debug!("Remapped {} particles from {:?} to {:?}", self.particles.len(), old, frame);
        self.frame = frame;
    }

    /// Advances the ecosystem by one fixed step.
    pub fn step(&mut self) {
        let dt = self.settings.fixed_delta_time;
        let scale = self.frame.scale;
        let diameter = self.settings.particle_diameter() * scale;

        let accumulated: Vec<Accumulated> = {
            let particles = &self.particles;
            let species = &self.description.species_data;
            let social = &self.description.social_data;
            particles
                .par_iter()
                .enumerate()
                .map(|(index, particle)| {
                    accumulate(index, particle, particles, species, social, diameter, scale)
                })
                .collect()
        };

        let field_center = self.frame.transform_point(Vec3::from(self.settings.field_center));
        let field_radius = self.settings.field_radius * scale;
        let field_force = self.settings.field_force;

        for (particle, forces) in self.particles.iter_mut().zip(accumulated) {
            let attributes = &self.description.species_data[particle.species];

            particle.velocity += forces.collision / dt;

            let social_force = if forces.neighbors > 0 {
                forces.social_sum / forces.neighbors as f32
            } else {
                Vec3::ZERO
            };
            particle.force_delay.push_front(social_force);
            if particle.force_delay.len() > attributes.force_steps as usize {
                if let Some(delayed) = particle.force_delay.pop_back() {
                    particle.velocity += delayed / dt;
                }
            }

            particle.velocity *= 1.0 - attributes.drag;

            let to_center = field_center - particle.position;
            if to_center.length() > field_radius {
                particle.velocity += to_center * field_force;
            }

            particle.position += particle.velocity * dt;
        }

        self.ticks += 1;
        if let Some(first) = self.particles.first() {
            trace!(
                "Tick {}: particle 0 at {:?} moving {:?}",
                self.ticks,
                first.position,
                first.velocity
            );
        }
    }

    /// Per-particle state for rendering. Only meaningful between steps.
    pub fn snapshot(&self) -> Vec<ParticleState> {
        self.particles
            .iter()
            .map(|particle| ParticleState {
                position: particle.position,
                velocity: particle.velocity,
                species: particle.species,
            })
            .collect()
    }
}

// Collision and social contributions felt by `particle` from every other one.
fn accumulate(
    index: usize,
    particle: &Particle,
    particles: &[Particle],
    species: &[SpeciesDescription],
    social: &SocialMatrix,
    diameter: f32,
    scale: f32,
) -> Accumulated {
    let mut forces = Accumulated::default();
    let own_collision = species[particle.species].collision_force;

    for (other_index, other) in particles.iter().enumerate() {
        if other_index == index {
            continue;
        }

        let to_other = other.position - particle.position;
        let distance = to_other.length();
        let direction = if distance < DIRECTION_EPSILON {
            Vec3::ZERO
        } else {
            to_other / distance
        };

        if distance < diameter {
            let penetration = 1.0 - distance / diameter;
            let magnitude = (own_collision + species[other.species].collision_force) * 0.5;
            forces.collision -= direction * penetration * magnitude * scale;
        }

        let relation = social.get(particle.species, other.species);
        if distance < relation.social_range * scale {
            forces.social_sum += direction * relation.social_force * scale;
            forces.neighbors += 1;
        }
    }

    forces
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ecosim_core::{ParticleDescription, SocialDescription};
    use glam::Quat;

    const DT: f32 = 1.0 / 64.0;

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() <= 1e-4 * expected.abs().max(1.0),
            "expected {expected}, got {actual}"
        );
    }

    /// Settings with no field influence for particles near the origin.
    pub(crate) fn quiet_settings() -> SimulationSettings {
        SimulationSettings {
            fixed_delta_time: DT,
            particle_radius: 0.01,
            field_radius: 100.0,
            field_force: 0.0,
            ..SimulationSettings::default()
        }
    }

    /// One species with the given delay, self-relation and collision strength.
    pub(crate) fn single_species(
        force_steps: u32,
        social: SocialDescription,
        collision_force: f32,
        positions: &[Vec3],
    ) -> EcosystemDescription {
        EcosystemDescription {
            name: "test".to_string(),
            is_random_description: false,
            social_data: SocialMatrix::from_fn(1, |_, _| social),
            species_data: vec![SpeciesDescription {
                force_steps,
                drag: 0.0,
                collision_force,
                color: Rgba::WHITE,
            }],
            to_spawn: positions
                .iter()
                .map(|&position| ParticleDescription {
                    position,
                    velocity: Vec3::ZERO,
                    species: 0,
                })
                .collect(),
        }
    }

    fn attracting_pair(force_steps: u32, force: f32) -> EcosystemDescription {
        single_species(
            force_steps,
            SocialDescription { social_force: force, social_range: 1.0 },
            0.0,
            &[Vec3::new(-0.25, 0.0, 0.0), Vec3::new(0.25, 0.0, 0.0)],
        )
    }

    fn engine_with(description: EcosystemDescription) -> ParticleSimulationEngine {
        let mut engine = ParticleSimulationEngine::new(quiet_settings());
        engine.repopulate(description);
        engine
    }

    #[test]
    fn zero_delay_applies_social_force_same_tick() {
        let force = 0.001;
        let mut engine = engine_with(attracting_pair(0, force));
        engine.step();

        let [left, right] = [&engine.particles()[0], &engine.particles()[1]];
        assert_close(left.velocity.x, force / DT);
        assert_close(right.velocity.x, -force / DT);
        assert_eq!(left.delayed_forces(), 0);
    }

    #[test]
    fn delayed_social_force_waits_force_steps_ticks() {
        let force = 0.001;
        let steps = 3;
        let mut engine = engine_with(attracting_pair(steps, force));

        for tick in 1..=steps {
            engine.step();
            assert_eq!(engine.particles()[0].velocity, Vec3::ZERO, "moved early on tick {tick}");
            assert_eq!(engine.particles()[0].delayed_forces(), tick as usize);
        }

        engine.step();
        assert_close(engine.particles()[0].velocity.x, force / DT);
        assert_close(engine.particles()[1].velocity.x, -force / DT);
        assert_eq!(engine.particles()[0].delayed_forces(), steps as usize);
    }

    #[test]
    fn social_force_is_averaged_over_neighbors() {
        let force = 0.002;
        let mut engine = engine_with(single_species(
            0,
            SocialDescription { social_force: force, social_range: 1.0 },
            0.0,
            &[Vec3::ZERO, Vec3::new(0.5, 0.0, 0.0), Vec3::new(0.0, 0.5, 0.0)],
        ));
        engine.step();

        // Pulled towards +x and +y equally, each weighted by one half.
        let velocity = engine.particles()[0].velocity;
        assert_close(velocity.x, force / 2.0 / DT);
        assert_close(velocity.y, force / 2.0 / DT);
    }

    #[test]
    fn out_of_range_neighbors_are_ignored() {
        let mut engine = engine_with(single_species(
            0,
            SocialDescription { social_force: 0.01, social_range: 0.4 },
            0.0,
            &[Vec3::ZERO, Vec3::new(0.5, 0.0, 0.0)],
        ));
        engine.step();
        assert_eq!(engine.particles()[0].velocity, Vec3::ZERO);
    }

    #[test]
    fn overlapping_particles_separate() {
        let settings = quiet_settings();
        let diameter = settings.particle_diameter();
        let mut engine = engine_with(single_species(
            0,
            SocialDescription::default(),
            1.0,
            &[Vec3::ZERO, Vec3::new(0.5 * diameter, 0.0, 0.0)],
        ));
        engine.step();

        let axis = Vec3::X;
        let relative = engine.particles()[1].velocity - engine.particles()[0].velocity;
        let separation_speed = relative.dot(axis);
        assert!(separation_speed > 0.0);
        // Penetration 0.5 at unit strength.
        assert_close(engine.particles()[0].velocity.x, -0.5 / DT);
    }

    #[test]
    fn collision_threshold_scales_with_frame() {
        let diameter = quiet_settings().particle_diameter();
        let description = single_species(
            0,
            SocialDescription::default(),
            1.0,
            &[Vec3::ZERO, Vec3::new(0.75 * diameter, 0.0, 0.0)],
        );

        let mut engine = ParticleSimulationEngine::new(quiet_settings());
        engine.set_frame(Frame::from_scale(2.0));
        engine.repopulate(description);

        // Spawned 1.5 local diameters apart in display space, still inside 2x diameter.
        let gap = engine.particles()[1].position.x - engine.particles()[0].position.x;
        assert_close(gap, 1.5 * diameter);
        engine.step();
        assert!(engine.particles()[0].velocity.x < 0.0);
    }

    #[test]
    fn field_pulls_escaped_particle_back() {
        let mut settings = quiet_settings();
        settings.field_radius = 1.0;
        settings.field_force = 0.1;

        let mut engine = ParticleSimulationEngine::new(settings);
        engine.repopulate(single_species(
            0,
            SocialDescription::default(),
            0.0,
            &[Vec3::new(2.0, 0.0, 0.0)],
        ));
        engine.step();

        let particle = &engine.particles()[0];
        assert_close(particle.velocity.x, -2.0 * 0.1);
        assert!(particle.velocity.dot(Vec3::new(2.0, 0.0, 0.0)) < 0.0);
    }

    #[test]
    fn drag_damps_velocity_before_integration() {
        let mut description = single_species(0, SocialDescription::default(), 0.0, &[Vec3::ZERO]);
        description.species_data[0].drag = 0.25;
        description.to_spawn[0].velocity = Vec3::new(1.0, 0.0, 0.0);

        let mut engine = engine_with(description);
        engine.step();

        let particle = &engine.particles()[0];
        assert_close(particle.velocity.x, 0.75);
        assert_close(particle.position.x, 0.75 * DT);
    }

    #[test]
    fn repopulate_resets_particles_and_delay_lines() {
        let mut engine = engine_with(attracting_pair(5, 0.001));
        for _ in 0..3 {
            engine.step();
        }
        assert_eq!(engine.particles()[0].delayed_forces(), 3);

        let replacement = single_species(
            2,
            SocialDescription::default(),
            0.0,
            &[Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z],
        );
        engine.repopulate(replacement.clone());
        assert_eq!(engine.particle_count(), replacement.to_spawn.len());
        assert!(engine.particles().iter().all(|p| p.delayed_forces() == 0));
        assert_eq!(engine.description(), &replacement);
    }

    #[test]
    fn frame_change_preserves_relative_configuration() {
        let mut engine = engine_with(attracting_pair(0, 0.0));
        engine.particles[1].velocity = Vec3::new(0.0, 1.0, 0.0);

        let frame = Frame::new(
            Vec3::new(3.0, 0.0, 0.0),
            Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
            2.0,
        );
        engine.set_frame(frame);

        let [a, b] = [&engine.particles()[0], &engine.particles()[1]];
        assert_close(a.position.distance(b.position), 1.0);
        assert!(a.position.abs_diff_eq(Vec3::new(3.0, -0.5, 0.0), 1e-5));
        assert!(b.velocity.abs_diff_eq(Vec3::new(-2.0, 0.0, 0.0), 1e-5));

        // Back to identity restores the original layout.
        engine.set_frame(Frame::IDENTITY);
        assert!(engine.particles()[1].position.abs_diff_eq(Vec3::new(0.25, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn invalid_frame_is_ignored() {
        let mut engine = engine_with(attracting_pair(0, 0.0));
        engine.set_frame(Frame::from_scale(0.0));
        assert_eq!(engine.frame(), Frame::IDENTITY);
    }

    #[test]
    fn stepping_is_reproducible() {
        let positions: Vec<Vec3> = (0..24)
            .map(|i| Vec3::new((i % 5) as f32 * 0.03, (i / 5) as f32 * 0.03, (i % 3) as f32 * 0.01))
            .collect();
        let description = single_species(
            2,
            SocialDescription { social_force: -0.0005, social_range: 0.1 },
            0.002,
            &positions,
        );

        let mut first = engine_with(description.clone());
        let mut second = engine_with(description);
        for _ in 0..20 {
            first.step();
            second.step();
        }
        assert_eq!(first.snapshot(), second.snapshot());
        assert_eq!(first.tick_count(), 20);
    }

    #[test]
    fn color_update_keeps_particles() {
        let mut engine = engine_with(attracting_pair(0, 0.001));
        engine.step();
        let before = engine.snapshot();

        let mut recolored = engine.description().clone();
        recolored.species_data[0].color = Rgba::new(0.2, 0.4, 0.6, 1.0);
        recolored.to_spawn.clear();
        assert_eq!(engine.update_colors(&recolored), 1);

        assert_eq!(engine.snapshot(), before);
        assert_eq!(engine.species_colors(), vec![Rgba::new(0.2, 0.4, 0.6, 1.0)]);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn unknown_species_fails_fast() {
        let mut description = attracting_pair(0, 0.001);
        description.to_spawn[1].species = 4;
        engine_with(description);
    }
}
