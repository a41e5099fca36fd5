//! Scene graph: the model group, lights and light targets owned by a configurator.
//!
//! The graph is only as deep as the settings file can express: one
//! [`ModelGroup`] carrying every loaded model under a shared transform, and an
//! ordered list of [`SceneNode`]s for lights and the targets directional lights
//! aim at. Everything hangs off the scene root, whose matrix is the identity
//! in flat mode and the current eye's view matrix while presenting.

use cgmath::{EuclideanSpace, InnerSpace, SquareMatrix, Transform as _};

use crate::data_structures::{
    color::Color,
    light::{AmbientLight, AreaLight, DirectionalLight, Light},
    model::Model,
    transform::Transform,
};

/// Clear colour used until a `background-color` directive says otherwise.
pub const DEFAULT_BACKGROUND: u32 = 0x99DDFF;

pub const MODEL_GROUP_NAME: &str = "ModelGroup";

/// Handle to a node in [`Scene::nodes`]. Nodes are never removed, so handles stay valid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A point other nodes can refer to, e.g. what a directional light shines at.
#[derive(Clone, Debug, PartialEq)]
pub struct Target {
    pub position: cgmath::Vector3<f32>,
    pub world_position: cgmath::Vector3<f32>,
}

impl Target {
    pub fn new(position: cgmath::Vector3<f32>) -> Self {
        Self {
            position,
            world_position: position,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SceneNode {
    Light(Light),
    Target(Target),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModelGroup {
    name: String,
    pub transform: Transform,
    models: Vec<Model>,
    world: cgmath::Matrix4<f32>,
}

impl ModelGroup {
    fn new() -> Self {
        Self {
            name: MODEL_GROUP_NAME.to_string(),
            transform: Transform::default(),
            models: Vec::new(),
            world: cgmath::Matrix4::identity(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends a model and returns its index. Indices are stable since models are never removed.
    pub fn add(&mut self, model: Model) -> usize {
        self.models.push(model);
        self.models.len() - 1
    }

    pub fn models(&self) -> &[Model] {
        &self.models
    }

    pub fn world_matrix(&self) -> cgmath::Matrix4<f32> {
        self.world
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Scene {
    pub background: Color,
    /// Parent transform of everything in the scene.
    pub root: cgmath::Matrix4<f32>,
    model_group: ModelGroup,
    nodes: Vec<SceneNode>,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            background: Color::from_hex(DEFAULT_BACKGROUND),
            root: cgmath::Matrix4::identity(),
            model_group: ModelGroup::new(),
            nodes: Vec::new(),
        }
    }

    pub fn add(&mut self, node: SceneNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn add_ambient_light(&mut self, color: Color, intensity: f32) -> NodeId {
        self.add(SceneNode::Light(Light::Ambient(AmbientLight { color, intensity })))
    }

    /// Adds the light's target first and then the light; both become scene nodes.
    ///
    /// Returns `(light, target)`.
    pub fn add_directional_light(
        &mut self,
        color: Color,
        intensity: f32,
        target: cgmath::Vector3<f32>,
    ) -> (NodeId, NodeId) {
        let target = self.add(SceneNode::Target(Target::new(target)));
        let light = self.add(SceneNode::Light(Light::Directional(DirectionalLight::new(
            color, intensity, target,
        ))));
        (light, target)
    }

    pub fn add_area_light(&mut self, light: AreaLight) -> NodeId {
        self.add(SceneNode::Light(Light::Area(light)))
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.0)
    }

    pub fn target(&self, id: NodeId) -> Option<&Target> {
        match self.node(id) {
            Some(SceneNode::Target(target)) => Some(target),
            _ => None,
        }
    }

    pub fn lights(&self) -> impl Iterator<Item = &Light> {
        self.nodes.iter().filter_map(|node| match node {
            SceneNode::Light(light) => Some(light),
            SceneNode::Target(_) => None,
        })
    }

    pub fn model_group(&self) -> &ModelGroup {
        &self.model_group
    }

    pub fn model_group_mut(&mut self) -> &mut ModelGroup {
        &mut self.model_group
    }

    /// Direction the light travels in, from its world position towards its target's.
    ///
    /// Falls back to straight down when the target is missing or sits on the light.
    pub fn light_direction(&self, light: &DirectionalLight) -> cgmath::Vector3<f32> {
        let down = -cgmath::Vector3::unit_y();
        let Some(target) = self.target(light.target) else {
            return down;
        };
        let direction = target.world_position - light.world_position;
        if direction.magnitude2() <= f32::EPSILON {
            return down;
        }
        direction.normalize()
    }

    /// Recomputes world matrices and positions of every node from the scene root.
    pub fn update_world_transforms(&mut self) {
        let root = self.root;
        self.model_group.world = root * self.model_group.transform.to_matrix();
        let to_world =
            |p: cgmath::Vector3<f32>| root.transform_point(cgmath::Point3::from_vec(p)).to_vec();
        for node in self.nodes.iter_mut() {
            match node {
                SceneNode::Target(target) => target.world_position = to_world(target.position),
                SceneNode::Light(Light::Directional(light)) => {
                    light.world_position = to_world(light.position)
                }
                SceneNode::Light(Light::Area(light)) => {
                    light.world_position = to_world(light.position);
                    let normal = root.transform_vector(AreaLight::local_normal(light.rotation));
                    if normal.magnitude2() > f32::EPSILON {
                        light.world_normal = normal.normalize();
                    }
                }
                SceneNode::Light(Light::Ambient(_)) => (),
            }
        }
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}
