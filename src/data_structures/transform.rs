//! Local transforms for scene nodes.
//!
//! A [`Transform`] is the translation / rotation / scale triple that the
//! settings file writes and that the scene graph turns into world matrices.

use cgmath::{Deg, One, Rad, Rotation3};

/// Position, rotation (as quaternion) and scale of a node relative to its parent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: cgmath::Vector3<f32>,
    pub rotation: cgmath::Quaternion<f32>,
    pub scale: cgmath::Vector3<f32>,
}

impl Transform {
    /// Identity transform (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            position: cgmath::Vector3::new(0.0, 0.0, 0.0),
            // `Quaternion::one()` is the identity quaternion (no rotation)
            rotation: cgmath::Quaternion::one(),
            scale: cgmath::Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn to_matrix(&self) -> cgmath::Matrix4<f32> {
        cgmath::Matrix4::from_translation(self.position)
            * cgmath::Matrix4::from(self.rotation)
            * cgmath::Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }
}

/// Orientation from Euler angles in radians, applied as intrinsic X, then Y, then Z.
pub fn quaternion_from_euler(x: Rad<f32>, y: Rad<f32>, z: Rad<f32>) -> cgmath::Quaternion<f32> {
    cgmath::Quaternion::from_angle_x(x)
        * cgmath::Quaternion::from_angle_y(y)
        * cgmath::Quaternion::from_angle_z(z)
}

/// Same as [`quaternion_from_euler`] but takes degrees, which is what settings files store.
pub fn quaternion_from_euler_degrees(degrees: [f32; 3]) -> cgmath::Quaternion<f32> {
    quaternion_from_euler(
        Deg(degrees[0]).into(),
        Deg(degrees[1]).into(),
        Deg(degrees[2]).into(),
    )
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}
