//! Settings files and the configurator that applies them to a scene.
//!
//! A settings file is plain text. Blank lines and lines starting with `#` are
//! ignored; every other line is a `key: value` directive:
//!
//! ```text
//! # A lit teapot
//! background-color: #99DDFF
//! model-obj: models/teapot.obj
//! model-rotation: 0 90 0
//! ambient-light: 0.4 #FFFFFF
//! directional-light: 1.0 #FFFFFF 0 0 -5
//! ```
//!
//! [`SceneConfigurator::load`] applies directives in file order. Problems that
//! only affect one line are logged, recorded in the returned [`LoadReport`]
//! and skipped. Model directives do not block: they queue [`AssetTask`]s which
//! the host runs on its executor, and the finished models are inserted into
//! the model group by [`SceneConfigurator::apply_completed_loads`].

use std::rc::Rc;

use futures::{
    channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded},
    future::LocalBoxFuture,
};

use crate::{
    camera::Camera,
    data_structures::{
        color::Color,
        light::AreaLight,
        model::Model,
        scene_graph::Scene,
        transform::quaternion_from_euler_degrees,
    },
    error::{ConfigError, SettingsIssue},
    resources::{AssetLoader, load_model_glb, load_model_obj},
};

pub mod directive;
pub mod values;

pub use directive::{AreaLightSpec, Directive, DirectiveKey};
pub use values::{parse_css_color, parse_hex, parse_number};

use values::Diagnostics;

/// Separator between a directive's key and its value.
pub const KEY_VALUE_SEPARATOR: &str = ": ";

/// A model fetch and parse that has not run yet. Drive it on any single-threaded executor.
pub type AssetTask = LocalBoxFuture<'static, ()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetFormat {
    Obj,
    Glb,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRequest {
    pub format: AssetFormat,
    pub path: String,
}

/// What a finished [`AssetTask`] delivers back to its configurator.
#[derive(Debug)]
pub struct AssetOutcome {
    pub request: AssetRequest,
    pub result: anyhow::Result<Model>,
}

/// Summary of one settings load.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LoadReport {
    /// Directives that changed the scene or queued an asset load.
    pub applied: usize,
    pub requested_assets: Vec<AssetRequest>,
    pub issues: Vec<SettingsIssue>,
}

/// Owns the scene and camera and applies settings directives to them.
pub struct SceneConfigurator<L: AssetLoader + 'static> {
    loader: Rc<L>,
    scene: Scene,
    camera: Camera,
    pending: Vec<AssetTask>,
    completed_tx: UnboundedSender<AssetOutcome>,
    completed_rx: UnboundedReceiver<AssetOutcome>,
}

impl<L: AssetLoader + 'static> SceneConfigurator<L> {
    pub fn new(loader: L) -> Self {
        let (completed_tx, completed_rx) = unbounded();
        Self {
            loader: Rc::new(loader),
            scene: Scene::new(),
            camera: Camera::default(),
            pending: Vec::new(),
            completed_tx,
            completed_rx,
        }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Both halves at once, for the display loop which mutates the root and the projection.
    pub fn scene_and_camera_mut(&mut self) -> (&mut Scene, &mut Camera) {
        (&mut self.scene, &mut self.camera)
    }

    /// Fetches the settings file through the loader and applies it.
    pub async fn fetch_and_load(&mut self, path: &str) -> Result<LoadReport, ConfigError> {
        let text = self
            .loader
            .load_string(path)
            .await
            .map_err(|source| ConfigError::Fetch {
                path: path.to_string(),
                source,
            })?;
        self.load(&text)
    }

    /// Applies every directive in `text` in order.
    ///
    /// Only an empty settings text is an error; anything wrong with a single
    /// line is reported in the returned [`LoadReport`].
    pub fn load(&mut self, text: &str) -> Result<LoadReport, ConfigError> {
        if text.trim().is_empty() {
            return Err(ConfigError::Unreadable);
        }
        let mut diag = Diagnostics::default();
        let mut report = LoadReport::default();

        for (idx, line) in text.lines().enumerate() {
            if line.starts_with('#') || line.trim().is_empty() {
                continue;
            }
            diag.at_line(idx + 1);
            let tokens: Vec<&str> = line.split(KEY_VALUE_SEPARATOR).collect();
            let [key, value] = tokens.as_slice() else {
                diag.report(SettingsIssue::MalformedLine {
                    line: diag.line(),
                    text: line.to_string(),
                });
                continue;
            };
            let Some(key) = DirectiveKey::from_key(key) else {
                diag.report(SettingsIssue::UnknownDirective {
                    line: diag.line(),
                    key: key.to_string(),
                });
                continue;
            };
            if let Some(directive) = Directive::parse(key, value, &mut diag) {
                log::debug!("line {}: applying {}", diag.line(), directive.key().as_str());
                if let Some(request) = self.apply(directive) {
                    report.requested_assets.push(request);
                }
                report.applied += 1;
            }
        }

        report.issues = diag.into_issues();
        log::info!(
            "Applied {} settings directives with {} issues, {} models loading",
            report.applied,
            report.issues.len(),
            report.requested_assets.len()
        );
        Ok(report)
    }

    /// Applies one directive. Returns the asset request if it queued a load.
    pub fn apply(&mut self, directive: Directive) -> Option<AssetRequest> {
        match directive {
            Directive::BackgroundColor(color) => self.scene.background = color,
            Directive::ModelObj(path) => {
                return Some(self.queue_load(AssetFormat::Obj, path));
            }
            Directive::ModelGlb(path) => {
                return Some(self.queue_load(AssetFormat::Glb, path));
            }
            Directive::ModelTranslation(xyz) => {
                self.scene.model_group_mut().transform.position = xyz.into()
            }
            Directive::ModelRotation(degrees) => {
                self.scene.model_group_mut().transform.rotation =
                    quaternion_from_euler_degrees(degrees)
            }
            Directive::ModelScale(xyz) => self.scene.model_group_mut().transform.scale = xyz.into(),
            Directive::CameraTranslation(xyz) => self.camera.position = xyz.into(),
            Directive::CameraRotation(degrees) => {
                self.camera.rotation = quaternion_from_euler_degrees(degrees)
            }
            Directive::AmbientLight { intensity, color } => {
                self.scene
                    .add_ambient_light(Color::from_hex(color), intensity);
            }
            Directive::DirectionalLight {
                intensity,
                color,
                target,
            } => {
                self.scene
                    .add_directional_light(Color::from_hex(color), intensity, target.into());
            }
            Directive::AreaLight(spec) => {
                self.scene.add_area_light(AreaLight::new(
                    spec.name,
                    spec.color,
                    spec.intensity,
                    spec.width,
                    spec.height,
                    spec.position.into(),
                    quaternion_from_euler_degrees(spec.rotation),
                ));
            }
        }
        None
    }

    fn queue_load(&mut self, format: AssetFormat, path: String) -> AssetRequest {
        let request = AssetRequest { format, path };
        let loader = Rc::clone(&self.loader);
        let completed = self.completed_tx.clone();
        let task_request = request.clone();
        self.pending.push(Box::pin(async move {
            let result = match task_request.format {
                AssetFormat::Obj => load_model_obj(loader.as_ref(), &task_request.path).await,
                AssetFormat::Glb => load_model_glb(loader.as_ref(), &task_request.path).await,
            };
            let outcome = AssetOutcome {
                request: task_request,
                result,
            };
            if completed.unbounded_send(outcome).is_err() {
                log::warn!("A model finished loading after its configurator was dropped");
            }
        }));
        request
    }

    /// Hands over the asset loads queued since the last call so the host can spawn them.
    pub fn take_asset_tasks(&mut self) -> Vec<AssetTask> {
        std::mem::take(&mut self.pending)
    }

    /// Inserts every model that finished loading into the model group.
    ///
    /// Failed loads are logged and dropped. Returns the outcomes in completion
    /// order, with successful models moved into the scene.
    pub fn apply_completed_loads(&mut self) -> Vec<Result<AssetRequest, (AssetRequest, anyhow::Error)>> {
        let mut applied = Vec::new();
        while let Ok(outcome) = self.completed_rx.try_recv() {
            match outcome.result {
                Ok(model) => {
                    log::info!(
                        "Loaded {} ({} meshes, {} triangles)",
                        outcome.request.path,
                        model.meshes.len(),
                        model.triangle_count()
                    );
                    self.scene.model_group_mut().add(model);
                    applied.push(Ok(outcome.request));
                }
                Err(e) => {
                    log::error!("Could not load {}: {:#}", outcome.request.path, e);
                    applied.push(Err((outcome.request, e)));
                }
            }
        }
        applied
    }
}
