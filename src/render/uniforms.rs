//! Uniform buffer layouts shared with `shader.wgsl`.
//!
//! Every struct here mirrors a WGSL struct field by field, including the
//! padding WGSL inserts after `vec3<f32>` members.

use cgmath::{Matrix, SquareMatrix};

use crate::{
    camera::Camera,
    data_structures::{light::Light, scene_graph::Scene},
};

/// Lights of each kind beyond this are ignored by the shader.
pub const MAX_DIRECTIONAL_LIGHTS: usize = 4;
pub const MAX_AREA_LIGHTS: usize = 4;

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        Self {
            view_proj: cgmath::Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera) {
        self.view_proj = camera.view_projection().into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DirectionalLightRaw {
    /// Direction the light travels in, world space.
    direction: [f32; 3],
    intensity: f32,
    color: [f32; 3],
    _padding: f32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct AreaLightRaw {
    position: [f32; 3],
    intensity: f32,
    normal: [f32; 3],
    area: f32,
    color: [f32; 3],
    _padding: f32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightsUniform {
    ambient: [f32; 3],
    directional_count: u32,
    directional: [DirectionalLightRaw; MAX_DIRECTIONAL_LIGHTS],
    area: [AreaLightRaw; MAX_AREA_LIGHTS],
    area_count: u32,
    _padding: [u32; 3],
}

impl LightsUniform {
    /// Collects the scene's lights. World transforms must be up to date.
    pub fn from_scene(scene: &Scene) -> Self {
        let mut uniform = Self {
            ambient: [0.0; 3],
            directional_count: 0,
            directional: [DirectionalLightRaw::default(); MAX_DIRECTIONAL_LIGHTS],
            area: [AreaLightRaw::default(); MAX_AREA_LIGHTS],
            area_count: 0,
            _padding: [0; 3],
        };
        let mut dropped = 0;
        for light in scene.lights() {
            match light {
                Light::Ambient(ambient) => {
                    let [r, g, b] = ambient.color.scaled(ambient.intensity);
                    uniform.ambient[0] += r;
                    uniform.ambient[1] += g;
                    uniform.ambient[2] += b;
                }
                Light::Directional(light) => {
                    let Some(slot) = uniform.directional.get_mut(uniform.directional_count as usize)
                    else {
                        dropped += 1;
                        continue;
                    };
                    *slot = DirectionalLightRaw {
                        direction: scene.light_direction(light).into(),
                        intensity: light.intensity,
                        color: light.color.scaled(1.0),
                        _padding: 0.0,
                    };
                    uniform.directional_count += 1;
                }
                Light::Area(light) => {
                    let Some(slot) = uniform.area.get_mut(uniform.area_count as usize) else {
                        dropped += 1;
                        continue;
                    };
                    *slot = AreaLightRaw {
                        position: light.world_position.into(),
                        intensity: light.intensity,
                        normal: light.world_normal.into(),
                        area: light.area(),
                        color: light.color.scaled(1.0),
                        _padding: 0.0,
                    };
                    uniform.area_count += 1;
                }
            }
        }
        if dropped > 0 {
            log::warn!("{} lights exceed the shader's limits and are not rendered", dropped);
        }
        uniform
    }

    pub fn directional_count(&self) -> u32 {
        self.directional_count
    }

    pub fn area_count(&self) -> u32 {
        self.area_count
    }

    pub fn ambient(&self) -> [f32; 3] {
        self.ambient
    }
}

/// Model and normal matrix of one mesh.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshUniform {
    model: [[f32; 4]; 4],
    normal: [[f32; 4]; 4],
}

impl MeshUniform {
    pub fn new(model: cgmath::Matrix4<f32>) -> Self {
        let normal = model
            .invert()
            .map(|m| m.transpose())
            .unwrap_or_else(cgmath::Matrix4::identity);
        Self {
            model: model.into(),
            normal: normal.into(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    diffuse: [f32; 4],
}

impl MaterialUniform {
    pub fn new(diffuse: [f32; 3]) -> Self {
        let [r, g, b] = diffuse;
        Self {
            diffuse: [r, g, b, 1.0],
        }
    }
}
