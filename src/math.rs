//! Math types for Sonora

pub use glam::{Quat, Vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    pub fn identity() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }

    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

/// Spatial state handed to the engine for objects, listeners and event instances.
///
/// The engine uses a left-handed frame where an unrotated emitter faces +Z with +Y up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attributes3d {
    pub position: Vec3,
    pub velocity: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
}

impl Attributes3d {
    pub fn from_pose(pose: Pose, velocity: Vec3) -> Self {
        Self {
            position: pose.position,
            velocity,
            forward: pose.forward(),
            up: pose.up(),
        }
    }
}

impl Default for Attributes3d {
    fn default() -> Self {
        Self::from_pose(Pose::identity(), Vec3::ZERO)
    }
}
