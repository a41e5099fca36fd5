//! Perspective camera.
//!
//! The camera owns its pose and its projection matrix. In flat mode the
//! projection is derived from the perspective parameters; while presenting to
//! a VR display it is overwritten every frame with the eye's projection.

use cgmath::{Deg, One, SquareMatrix};

/// wgpu's clip space has z in [0, 1] while cgmath builds OpenGL style matrices with z in [-1, 1].
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

pub const DEFAULT_FOVY: Deg<f32> = Deg(45.0);
pub const DEFAULT_ZNEAR: f32 = 0.5;
pub const DEFAULT_ZFAR: f32 = 10000.0;

#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub position: cgmath::Vector3<f32>,
    pub rotation: cgmath::Quaternion<f32>,
    pub fovy: Deg<f32>,
    pub aspect: f32,
    pub znear: f32,
    pub zfar: f32,
    projection: cgmath::Matrix4<f32>,
}

impl Camera {
    pub fn new(fovy: Deg<f32>, aspect: f32, znear: f32, zfar: f32) -> Self {
        let mut camera = Self {
            position: cgmath::Vector3::new(0.0, 0.0, 0.0),
            rotation: cgmath::Quaternion::one(),
            fovy,
            aspect,
            znear,
            zfar,
            projection: cgmath::Matrix4::identity(),
        };
        camera.update_projection_matrix();
        camera
    }

    /// Recomputes the projection from fovy / aspect / near / far.
    pub fn update_projection_matrix(&mut self) {
        self.projection = cgmath::perspective(self.fovy, self.aspect, self.znear, self.zfar);
    }

    /// Replaces the projection with a column-major matrix supplied by a VR device.
    pub fn set_projection(&mut self, projection: cgmath::Matrix4<f32>) {
        self.projection = projection;
    }

    /// Recomputes the aspect ratio from a render target size. A zero-height target is ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if height == 0 {
            log::warn!("Ignoring camera resize to {}x{}", width, height);
            return;
        }
        self.aspect = width as f32 / height as f32;
        self.update_projection_matrix();
    }

    pub fn projection_matrix(&self) -> cgmath::Matrix4<f32> {
        self.projection
    }

    /// Inverse of the camera's world matrix.
    pub fn view_matrix(&self) -> cgmath::Matrix4<f32> {
        let world =
            cgmath::Matrix4::from_translation(self.position) * cgmath::Matrix4::from(self.rotation);
        world.invert().unwrap_or_else(cgmath::Matrix4::identity)
    }

    pub fn view_projection(&self) -> cgmath::Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * self.projection * self.view_matrix()
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(DEFAULT_FOVY, 1.0, DEFAULT_ZNEAR, DEFAULT_ZFAR)
    }
}
