#![allow(dead_code)]

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use anyhow::anyhow;
use boop::{
    camera::Camera,
    data_structures::{color::Color, scene_graph::Scene},
    display::{
        Availability, DeviceProvider, Eye, EyeParameters, Renderer, Viewport, VrDisplay,
        VrFrameData, XrSession, XrView,
    },
    resources::AssetLoader,
};
use futures::future::{self, LocalBoxFuture};

pub const EPSILON: f32 = 1e-5;

pub fn assert_close(actual: f32, expected: f32) {
    assert!(
        (actual - expected).abs() < EPSILON,
        "expected {} but got {}",
        expected,
        actual
    );
}

pub fn assert_vec3_close(actual: cgmath::Vector3<f32>, expected: [f32; 3]) {
    assert_close(actual.x, expected[0]);
    assert_close(actual.y, expected[1]);
    assert_close(actual.z, expected[2]);
}

/// Quaternions q and -q are the same rotation.
pub fn assert_quat_close(actual: cgmath::Quaternion<f32>, expected: cgmath::Quaternion<f32>) {
    let dot = actual.s * expected.s
        + actual.v.x * expected.v.x
        + actual.v.y * expected.v.y
        + actual.v.z * expected.v.z;
    assert!(
        (dot.abs() - 1.0).abs() < 1e-4,
        "expected {:?} but got {:?}",
        expected,
        actual
    );
}

/// Serves assets from memory and remembers what was asked for.
#[derive(Debug, Default, Clone)]
pub struct MemoryLoader {
    files: Rc<RefCell<HashMap<String, Vec<u8>>>>,
    requests: Rc<RefCell<Vec<String>>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.files
            .borrow_mut()
            .insert(path.to_string(), contents.into());
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl AssetLoader for MemoryLoader {
    async fn load_string(&self, path: &str) -> anyhow::Result<String> {
        let bytes = self.load_binary(path).await?;
        Ok(String::from_utf8(bytes)?)
    }

    async fn load_binary(&self, path: &str) -> anyhow::Result<Vec<u8>> {
        self.requests.borrow_mut().push(path.to_string());
        self.files
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("{} not found", path))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    PixelRatio(f64),
    Size(u32, u32),
    Clear(Color),
    ClearDepth,
    Viewport(Viewport),
    Render {
        root: cgmath::Matrix4<f32>,
        projection: cgmath::Matrix4<f32>,
    },
    Present,
}

#[derive(Debug, Default)]
pub struct RecordingRenderer {
    pub calls: Vec<Call>,
}

impl RecordingRenderer {
    pub fn take(&mut self) -> Vec<Call> {
        std::mem::take(&mut self.calls)
    }
}

impl Renderer for RecordingRenderer {
    fn set_pixel_ratio(&mut self, ratio: f64) {
        self.calls.push(Call::PixelRatio(ratio));
    }

    fn set_size(&mut self, width: u32, height: u32) {
        self.calls.push(Call::Size(width, height));
    }

    fn clear(&mut self, color: Color) {
        self.calls.push(Call::Clear(color));
    }

    fn clear_depth(&mut self) {
        self.calls.push(Call::ClearDepth);
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.calls.push(Call::Viewport(viewport));
    }

    fn render(&mut self, scene: &Scene, camera: &Camera) {
        self.calls.push(Call::Render {
            root: scene.root,
            projection: camera.projection_matrix(),
        });
    }

    fn present(&mut self) {
        self.calls.push(Call::Present);
    }
}

#[derive(Debug)]
pub struct MockHost {
    pub size: (u32, u32),
    pub ratio: f64,
    pub frame_requests: usize,
}

impl MockHost {
    pub fn new(width: u32, height: u32, ratio: f64) -> Self {
        Self {
            size: (width, height),
            ratio,
            frame_requests: 0,
        }
    }
}

impl boop::display::Host for MockHost {
    fn element_size(&self) -> (u32, u32) {
        self.size
    }

    fn pixel_ratio(&self) -> f64 {
        self.ratio
    }

    fn request_animation_frame(&mut self) {
        self.frame_requests += 1;
    }
}

pub fn translation(x: f32, y: f32, z: f32) -> cgmath::Matrix4<f32> {
    cgmath::Matrix4::from_translation(cgmath::Vector3::new(x, y, z))
}

pub fn scale(s: f32) -> cgmath::Matrix4<f32> {
    cgmath::Matrix4::from_scale(s)
}

/// Distinct matrices per eye so tests can tell them apart.
pub fn sample_frame_data() -> VrFrameData {
    VrFrameData {
        left_projection: scale(2.0),
        left_view: translation(0.03, 0.0, 0.0),
        right_projection: scale(3.0),
        right_view: translation(-0.03, 0.0, 0.0),
    }
}

/// Shared state of a [`MockVrDisplay`], kept by the test after the display moved into the loop.
#[derive(Debug)]
pub struct VrState {
    pub presenting: bool,
    pub eye: EyeParameters,
    pub reject_present: Option<String>,
    pub reject_exit: Option<String>,
    pub frame: Option<VrFrameData>,
    pub frame_requests: usize,
    pub submitted: usize,
    pub exits: usize,
}

impl VrState {
    pub fn new(render_width: u32, render_height: u32) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            presenting: false,
            eye: EyeParameters {
                render_width,
                render_height,
            },
            reject_present: None,
            reject_exit: None,
            frame: Some(sample_frame_data()),
            frame_requests: 0,
            submitted: 0,
            exits: 0,
        }))
    }
}

pub struct MockVrDisplay {
    pub state: Rc<RefCell<VrState>>,
}

impl VrDisplay for MockVrDisplay {
    fn is_presenting(&self) -> bool {
        self.state.borrow().presenting
    }

    fn eye_parameters(&self, _eye: Eye) -> EyeParameters {
        self.state.borrow().eye
    }

    fn request_present(&mut self) -> LocalBoxFuture<'static, Result<(), String>> {
        let mut state = self.state.borrow_mut();
        let result = match state.reject_present.clone() {
            Some(reason) => Err(reason),
            None => {
                state.presenting = true;
                Ok(())
            }
        };
        Box::pin(future::ready(result))
    }

    fn exit_present(&mut self) -> LocalBoxFuture<'static, Result<(), String>> {
        let mut state = self.state.borrow_mut();
        state.exits += 1;
        let result = match state.reject_exit.clone() {
            Some(reason) => Err(reason),
            None => {
                state.presenting = false;
                Ok(())
            }
        };
        Box::pin(future::ready(result))
    }

    fn request_animation_frame(&mut self) {
        self.state.borrow_mut().frame_requests += 1;
    }

    fn frame_data(&mut self) -> Option<VrFrameData> {
        self.state.borrow().frame
    }

    fn submit_frame(&mut self) {
        self.state.borrow_mut().submitted += 1;
    }
}

#[derive(Debug)]
pub struct XrState {
    pub active: bool,
    pub framebuffer: (u32, u32),
    pub views: Option<Vec<XrView>>,
    pub frame_requests: usize,
}

impl XrState {
    pub fn new(width: u32, height: u32, views: Vec<XrView>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            active: false,
            framebuffer: (width, height),
            views: Some(views),
            frame_requests: 0,
        }))
    }
}

pub struct MockXrSession {
    pub state: Rc<RefCell<XrState>>,
}

impl XrSession for MockXrSession {
    fn is_active(&self) -> bool {
        self.state.borrow().active
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        self.state.borrow().framebuffer
    }

    fn begin(&mut self) -> LocalBoxFuture<'static, Result<(), String>> {
        self.state.borrow_mut().active = true;
        Box::pin(future::ready(Ok(())))
    }

    fn end(&mut self) -> LocalBoxFuture<'static, Result<(), String>> {
        self.state.borrow_mut().active = false;
        Box::pin(future::ready(Ok(())))
    }

    fn request_animation_frame(&mut self) {
        self.state.borrow_mut().frame_requests += 1;
    }

    fn views(&mut self) -> Option<Vec<XrView>> {
        self.state.borrow().views.clone()
    }
}

/// Which device a [`MockProvider`] reports on every query.
#[derive(Clone)]
pub enum MockDevice {
    Nothing,
    Polled(Rc<RefCell<VrState>>),
    Managed(Rc<RefCell<XrState>>),
}

pub struct MockProvider {
    pub device: MockDevice,
    pub queries: Rc<RefCell<usize>>,
}

impl MockProvider {
    pub fn new(device: MockDevice) -> Self {
        Self {
            device,
            queries: Rc::new(RefCell::new(0)),
        }
    }
}

impl DeviceProvider for MockProvider {
    fn query(&self) -> LocalBoxFuture<'static, Availability> {
        *self.queries.borrow_mut() += 1;
        let availability = match &self.device {
            MockDevice::Nothing => Availability::Unavailable,
            MockDevice::Polled(state) => Availability::Polled(Box::new(MockVrDisplay {
                state: Rc::clone(state),
            })),
            MockDevice::Managed(state) => Availability::Managed(Box::new(MockXrSession {
                state: Rc::clone(state),
            })),
        };
        Box::pin(future::ready(availability))
    }
}
