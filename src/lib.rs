//! boop
//!
//! Renders a 3D scene described by a plain-text settings file, to a window
//! and, when a VR display is available, stereoscopically to the display.
//! Runs natively and in the browser (WASM).
//!
//! High-level modules
//! - `settings`: settings file parsing and the configurator that applies it
//! - `resources`: asset loaders for settings files, OBJ/MTL and GLB models
//! - `data_structures`: scene graph, lights, models, transforms and colours
//! - `camera`: the perspective camera
//! - `display`: flat and stereo frame loops and VR device abstractions
//! - `render`: the wgpu renderer
//! - `app`: the winit application tying everything together
//! - `config`: runtime configuration from the environment
//!

pub mod app;
pub mod camera;
pub mod config;
pub mod data_structures;
pub mod display;
pub mod error;
pub mod render;
pub mod resources;
pub mod settings;

pub use camera::Camera;
pub use config::RuntimeConfig;
pub use data_structures::{color::Color, scene_graph::Scene};
pub use display::{DisplayLoop, Mode};
pub use error::{ConfigError, DisplayError, SettingsIssue};
pub use settings::{LoadReport, SceneConfigurator};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn run_web() -> Result<(), JsValue> {
    app::run(RuntimeConfig::default()).map_err(|e| JsValue::from_str(&format!("{:#}", e)))
}
