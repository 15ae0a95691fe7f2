use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub simulation: SimulationSettings,
    #[serde(default)]
    pub generation: GenerationBounds,
    #[serde(default)]
    pub reset: ResetSettings,
    #[serde(default)]
    pub transport: TransportConfig,
}

// --- Simulation Settings ---

/// Physical parameters of the integration engine. Changes apply between ticks.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SimulationSettings {
    #[serde(default = "default_fixed_delta_time")]
    pub fixed_delta_time: f32,
    /// Simulated seconds per real second.
    #[serde(default = "default_time_scale")]
    pub time_scale: f32,
    #[serde(default = "default_particle_radius")]
    pub particle_radius: f32,
    #[serde(default = "default_field_radius")]
    pub field_radius: f32,
    #[serde(default = "default_field_force")]
    pub field_force: f32,
    /// Field center in simulation-local space.
    #[serde(default)]
    pub field_center: [f32; 3],
    /// Cap on fixed steps run for one real frame.
    #[serde(default = "default_max_substeps")]
    pub max_substeps: u32,
}

fn default_fixed_delta_time() -> f32 { 1.0 / 60.0 }
fn default_time_scale() -> f32 { 1.0 }
fn default_particle_radius() -> f32 { 0.01 }
fn default_field_radius() -> f32 { 1.0 }
fn default_field_force() -> f32 { 0.01 }
fn default_max_substeps() -> u32 { 8 }

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            fixed_delta_time: default_fixed_delta_time(),
            time_scale: default_time_scale(),
            particle_radius: default_particle_radius(),
            field_radius: default_field_radius(),
            field_force: default_field_force(),
            field_center: [0.0; 3],
            max_substeps: default_max_substeps(),
        }
    }
}

impl SimulationSettings {
    pub fn particle_diameter(&self) -> f32 {
        self.particle_radius * 2.0
    }
}

// --- Generation Bounds ---

/// Bounds for the random ecosystem generator.
///
/// Counts are signed so that out-of-range values survive parsing; the
/// generator only ever sees [`GenerationBounds::sanitized`] values.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GenerationBounds {
    #[serde(default = "default_species_count")]
    pub species_count: i32,
    #[serde(default = "default_particle_count")]
    pub particle_count: i32,
    #[serde(default = "default_max_social_force")]
    pub max_social_force: f32,
    #[serde(default = "default_max_social_range")]
    pub max_social_range: f32,
    /// Range multiplier for self-repulsion.
    #[serde(default = "default_max_self_hate_factor")]
    pub max_self_hate_factor: f32,
    #[serde(default = "default_drag_center")]
    pub drag_center: f32,
    #[serde(default = "default_drag_spread")]
    pub drag_spread: f32,
    #[serde(default = "default_max_force_steps")]
    pub max_force_steps: i32,
    #[serde(default = "default_min_collision_force")]
    pub min_collision_force: f32,
    #[serde(default = "default_max_collision_force")]
    pub max_collision_force: f32,
    #[serde(default = "default_spawn_radius")]
    pub spawn_radius: f32,
}

fn default_species_count() -> i32 { 6 }
fn default_particle_count() -> i32 { 500 }
fn default_max_social_force() -> f32 { 0.002 }
fn default_max_social_range() -> f32 { 0.3 }
fn default_max_self_hate_factor() -> f32 { 1.5 }
fn default_drag_center() -> f32 { 0.1 }
fn default_drag_spread() -> f32 { 0.05 }
fn default_max_force_steps() -> i32 { 30 }
fn default_min_collision_force() -> f32 { 0.0005 }
fn default_max_collision_force() -> f32 { 0.003 }
fn default_spawn_radius() -> f32 { 0.5 }

impl Default for GenerationBounds {
    fn default() -> Self {
        Self {
            species_count: default_species_count(),
            particle_count: default_particle_count(),
            max_social_force: default_max_social_force(),
            max_social_range: default_max_social_range(),
            max_self_hate_factor: default_max_self_hate_factor(),
            drag_center: default_drag_center(),
            drag_spread: default_drag_spread(),
            max_force_steps: default_max_force_steps(),
            min_collision_force: default_min_collision_force(),
            max_collision_force: default_max_collision_force(),
            spawn_radius: default_spawn_radius(),
        }
    }
}

impl GenerationBounds {
    /// Clamps every bound to a usable value instead of rejecting it.
    pub fn sanitized(&self) -> Self {
        let min_collision_force = non_negative(self.min_collision_force);
        Self {
            species_count: self.species_count.max(1),
            particle_count: self.particle_count.max(0),
            max_social_force: non_negative(self.max_social_force),
            max_social_range: non_negative(self.max_social_range),
            max_self_hate_factor: non_negative(self.max_self_hate_factor),
            drag_center: if self.drag_center.is_nan() {
                0.0
            } else {
                self.drag_center.clamp(0.0, 1.0)
            },
            drag_spread: non_negative(self.drag_spread),
            max_force_steps: self.max_force_steps.max(0),
            min_collision_force,
            max_collision_force: non_negative(self.max_collision_force).max(min_collision_force),
            spawn_radius: non_negative(self.spawn_radius),
        }
    }

    pub fn species_count(&self) -> usize {
        self.species_count.max(1) as usize
    }

    pub fn particle_count(&self) -> usize {
        self.particle_count.max(0) as usize
    }
}

// NaN collapses to zero as well.
fn non_negative(value: f32) -> f32 {
    if value > 0.0 { value } else { 0.0 }
}

// --- Reset Settings ---

/// How a newly applied ecosystem replaces the live one.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResetBehavior {
    /// Keep particles, update species colors only.
    None,
    /// Destroy all particles and respawn from the new description.
    #[default]
    ResetPositions,
    FadeInOut,
    SmoothTransition,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ResetSettings {
    #[serde(default)]
    pub behavior: ResetBehavior,
    /// Seconds a timed transition lasts.
    #[serde(default = "default_reset_time")]
    pub reset_time: f32,
    /// Lets `FadeInOut` and `SmoothTransition` degrade to a delayed
    /// `ResetPositions` instead of being refused.
    #[serde(default)]
    pub allow_transition_fallback: bool,
}

fn default_reset_time() -> f32 { 1.0 }

impl Default for ResetSettings {
    fn default() -> Self {
        Self {
            behavior: ResetBehavior::default(),
            reset_time: default_reset_time(),
            allow_transition_fallback: false,
        }
    }
}

// --- Transport Configuration ---

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SerializerType {
    #[default]
    Json,
    Binary,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
    Stdio,
    File,
    #[default]
    Null,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TransportConfig {
    #[serde(default)]
    pub serializer: SerializerType,
    #[serde(default)]
    pub sender: SenderType,
    /// Required by the file sender.
    #[serde(default)]
    pub output_path: Option<String>,
    /// Ticks between exported snapshots.
    #[serde(default = "default_output_frequency")]
    pub output_frequency: u32,
}

fn default_output_frequency() -> u32 { 1 }

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            serializer: SerializerType::default(),
            sender: SenderType::default(),
            output_path: None,
            output_frequency: default_output_frequency(),
        }
    }
}
