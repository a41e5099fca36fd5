//! Light sources that settings directives add to the scene.

use cgmath::{InnerSpace, Rotation};

use crate::data_structures::{color::Color, scene_graph::NodeId};

/// Default position of a directional light; its direction is from here towards its target.
pub const DIRECTIONAL_LIGHT_POSITION: [f32; 3] = [0.0, 1.0, 0.0];

#[derive(Clone, Debug, PartialEq)]
pub enum Light {
    Ambient(AmbientLight),
    Directional(DirectionalLight),
    Area(AreaLight),
}

#[derive(Clone, Debug, PartialEq)]
pub struct AmbientLight {
    pub color: Color,
    pub intensity: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DirectionalLight {
    pub color: Color,
    pub intensity: f32,
    pub position: cgmath::Vector3<f32>,
    /// The target node this light is aimed at. It lives in the scene next to the light.
    pub target: NodeId,
    /// Position after applying the scene root; refreshed by `Scene::update_world_transforms`.
    pub world_position: cgmath::Vector3<f32>,
}

impl DirectionalLight {
    pub fn new(color: Color, intensity: f32, target: NodeId) -> Self {
        let position = DIRECTIONAL_LIGHT_POSITION.into();
        Self {
            color,
            intensity,
            position,
            target,
            world_position: position,
        }
    }
}

/// A one-sided rectangular emitter. `width` and `height` are world units.
#[derive(Clone, Debug, PartialEq)]
pub struct AreaLight {
    pub name: String,
    pub color: Color,
    pub intensity: f32,
    pub width: f32,
    pub height: f32,
    pub position: cgmath::Vector3<f32>,
    pub rotation: cgmath::Quaternion<f32>,
    pub world_position: cgmath::Vector3<f32>,
    pub world_normal: cgmath::Vector3<f32>,
}

impl AreaLight {
    pub fn new(
        name: String,
        color: Color,
        intensity: f32,
        width: f32,
        height: f32,
        position: cgmath::Vector3<f32>,
        rotation: cgmath::Quaternion<f32>,
    ) -> Self {
        Self {
            name,
            color,
            intensity,
            width,
            height,
            position,
            rotation,
            world_position: position,
            world_normal: Self::local_normal(rotation),
        }
    }

    /// The emitting face points down the rotated -Z axis.
    pub(crate) fn local_normal(rotation: cgmath::Quaternion<f32>) -> cgmath::Vector3<f32> {
        rotation
            .rotate_vector(-cgmath::Vector3::unit_z())
            .normalize()
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }
}
