use glam::{Mat4, Vec3};

/// Model placement: position, Euler rotation in degrees per axis, non-uniform scale.
///
/// The matrix composition order is fixed at translate, then rotate X, rotate Y,
/// rotate Z, then scale. Reordering changes the resulting orientation, so every
/// consumer relies on this exact sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    /// Euler angles in degrees, applied per axis in X, Y, Z order.
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Compose the model matrix: translate * rotate_x * rotate_y * rotate_z * scale.
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position)
            * Mat4::from_rotation_x(self.rotation.x.to_radians())
            * Mat4::from_rotation_y(self.rotation.y.to_radians())
            * Mat4::from_rotation_z(self.rotation.z.to_radians())
            * Mat4::from_scale(self.scale)
    }
}
