use ecosim_config::{GenerationBounds, SimulationSettings};
use log::debug;

/// Host-facing knobs.
///
/// Generation values take effect on the next generated ecosystem. Simulation
/// values are staged here and handed to the engine at the next tick boundary
/// through [`take_settings_update`](Self::take_settings_update).
#[derive(Debug, Clone)]
pub struct ParameterFacade {
    bounds: GenerationBounds,
    settings: SimulationSettings,
    settings_dirty: bool,
    generation_controls_enabled: bool,
}

impl ParameterFacade {
    pub fn new(bounds: GenerationBounds, settings: SimulationSettings) -> Self {
        Self {
            bounds,
            settings,
            settings_dirty: false,
            generation_controls_enabled: false,
        }
    }

    pub fn bounds(&self) -> &GenerationBounds {
        &self.bounds
    }

    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    /// Generation sliders are live only while a seeded ecosystem is running;
    /// hand-authored presets lock them.
    pub fn generation_controls_enabled(&self) -> bool {
        self.generation_controls_enabled
    }

    pub(crate) fn set_generation_controls_enabled(&mut self, enabled: bool) {
        self.generation_controls_enabled = enabled;
    }

    /// Staged simulation settings, if any setter ran since the last call.
    pub fn take_settings_update(&mut self) -> Option<SimulationSettings> {
        if !self.settings_dirty {
            return None;
        }
        self.settings_dirty = false;
        debug!("Handing staged simulation settings to the engine");
        Some(self.settings.clone())
    }

    // --- Generation bounds ---

    pub fn species_count(&self) -> i32 {
        self.bounds.species_count
    }

    pub fn set_species_count(&mut self, count: i32) {
        self.bounds.species_count = count;
    }

    pub fn particle_count(&self) -> i32 {
        self.bounds.particle_count
    }

    pub fn set_particle_count(&mut self, count: i32) {
        self.bounds.particle_count = count;
    }

    pub fn max_social_force(&self) -> f32 {
        self.bounds.max_social_force
    }

    pub fn set_max_social_force(&mut self, force: f32) {
        self.bounds.max_social_force = force;
    }

    pub fn max_social_range(&self) -> f32 {
        self.bounds.max_social_range
    }

    pub fn set_max_social_range(&mut self, range: f32) {
        self.bounds.max_social_range = range;
    }

    pub fn drag_center(&self) -> f32 {
        self.bounds.drag_center
    }

    pub fn set_drag_center(&mut self, drag: f32) {
        self.bounds.drag_center = drag;
    }

    pub fn drag_spread(&self) -> f32 {
        self.bounds.drag_spread
    }

    pub fn set_drag_spread(&mut self, spread: f32) {
        self.bounds.drag_spread = spread;
    }

    /// `(min, max)` collision force per species.
    pub fn collision_bounds(&self) -> (f32, f32) {
        (self.bounds.min_collision_force, self.bounds.max_collision_force)
    }

    pub fn set_collision_bounds(&mut self, min: f32, max: f32) {
        self.bounds.min_collision_force = min;
        self.bounds.max_collision_force = max;
    }

    pub fn max_force_steps(&self) -> i32 {
        self.bounds.max_force_steps
    }

    pub fn set_max_force_steps(&mut self, steps: i32) {
        self.bounds.max_force_steps = steps;
    }

    // --- Simulation settings ---

    pub fn particle_radius(&self) -> f32 {
        self.settings.particle_radius
    }

    pub fn set_particle_radius(&mut self, radius: f32) {
        self.settings.particle_radius = radius.max(0.0);
        self.settings_dirty = true;
    }

    pub fn field_force(&self) -> f32 {
        self.settings.field_force
    }

    pub fn set_field_force(&mut self, force: f32) {
        self.settings.field_force = force;
        self.settings_dirty = true;
    }

    pub fn field_radius(&self) -> f32 {
        self.settings.field_radius
    }

    pub fn set_field_radius(&mut self, radius: f32) {
        self.settings.field_radius = radius.max(0.0);
        self.settings_dirty = true;
    }

    pub fn time_scale(&self) -> f32 {
        self.settings.time_scale
    }

    /// Read by the tick accumulator, so it applies immediately.
    pub fn set_time_scale(&mut self, scale: f32) {
        self.settings.time_scale = scale.max(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facade() -> ParameterFacade {
        ParameterFacade::new(GenerationBounds::default(), SimulationSettings::default())
    }

    #[test]
    fn generation_setters_do_not_stage_settings() {
        let mut parameters = facade();
        parameters.set_species_count(9);
        parameters.set_particle_count(40);
        parameters.set_collision_bounds(0.1, 0.2);

        assert_eq!(parameters.species_count(), 9);
        assert_eq!(parameters.bounds().particle_count, 40);
        assert_eq!(parameters.collision_bounds(), (0.1, 0.2));
        assert!(parameters.take_settings_update().is_none());
    }

    #[test]
    fn simulation_setters_are_taken_once() {
        let mut parameters = facade();
        parameters.set_particle_radius(0.05);
        parameters.set_field_force(0.2);

        let update = parameters.take_settings_update().unwrap();
        assert_eq!(update.particle_radius, 0.05);
        assert_eq!(update.field_force, 0.2);
        assert!(parameters.take_settings_update().is_none());
    }

    #[test]
    fn negative_radius_is_clamped() {
        let mut parameters = facade();
        parameters.set_particle_radius(-1.0);
        parameters.set_time_scale(-2.0);
        assert_eq!(parameters.particle_radius(), 0.0);
        assert_eq!(parameters.time_scale(), 0.0);
    }
}
