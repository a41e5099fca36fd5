//! Scene data: transforms, colours, models, lights and the scene graph.
//!
//! - `transform` holds position / rotation / scale and Euler conversions
//! - `color` is the RGB colour type used by backgrounds and lights
//! - `model` contains CPU-side meshes and materials produced by the loaders
//! - `light` defines ambient, directional and area lights
//! - `scene_graph` ties the above together into the scene a configurator owns

pub mod color;
pub mod light;
pub mod model;
pub mod scene_graph;
pub mod transform;
