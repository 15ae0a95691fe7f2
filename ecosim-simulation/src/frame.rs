use glam::{Quat, Vec3};

/// Similarity transform (translation, rotation, uniform scale) placing the
/// simulation-local space inside the host's display space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: f32,
}

impl Frame {
    pub const IDENTITY: Frame = Frame {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: 1.0,
    };

    pub fn new(translation: Vec3, rotation: Quat, scale: f32) -> Self {
        Self { translation, rotation, scale }
    }

    pub fn from_scale(scale: f32) -> Self {
        Self { scale, ..Self::IDENTITY }
    }

    /// A frame is usable when its scale is positive and everything is finite.
    pub fn is_valid(&self) -> bool {
        self.scale.is_finite()
            && self.scale > 0.0
            && self.translation.is_finite()
            && self.rotation.is_finite()
    }

    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        self.translation + self.rotation * (local * self.scale)
    }

    pub fn transform_vector(&self, local: Vec3) -> Vec3 {
        self.rotation * (local * self.scale)
    }

    pub fn inverse_transform_point(&self, world: Vec3) -> Vec3 {
        self.rotation.inverse() * (world - self.translation) / self.scale
    }

    pub fn inverse_transform_vector(&self, world: Vec3) -> Vec3 {
        self.rotation.inverse() * world / self.scale
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::IDENTITY
    }
}
