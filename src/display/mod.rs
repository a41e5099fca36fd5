//! Drives rendering in flat mode and while presenting to a VR device.
//!
//! The [`DisplayLoop`] owns a [`Renderer`], the [`Host`] it renders into and a
//! [`DeviceProvider`]. It never owns the scene or the camera; the caller
//! passes them into every frame so the configurator can keep mutating them
//! between frames.
//!
//! Two frame chains exist. The host's chain (`flat_frame`) is live while the
//! loop is [`Mode::Flat`] and the device's chain (`device_frame`) is live while
//! it is [`Mode::Presenting`]. A frame for the inactive mode is ignored and
//! does not request another one, so exactly one chain keeps running.

use cgmath::SquareMatrix;
use futures::future::{self, FutureExt, LocalBoxFuture};

use crate::{
    camera::Camera,
    data_structures::{color::Color, scene_graph::Scene},
    error::DisplayError,
};

pub mod source;
#[cfg(target_arch = "wasm32")]
pub mod webvr;

pub use source::{
    Availability, DeviceProvider, Eye, EyeParameters, EyeView, FrameSource, ManagedFrameSource,
    NoDevices, PolledFrameSource, StereoFrame, VrDisplay, VrFrameData, XrSession, XrView,
    first_presentable,
};

/// A rectangle of the render target in logical pixels, origin top left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, width as f32, height as f32)
    }
}

/// What the display loop draws with.
pub trait Renderer {
    fn set_pixel_ratio(&mut self, ratio: f64);

    /// Resizes the render target to `width` x `height` logical pixels.
    fn set_size(&mut self, width: u32, height: u32);

    /// Clears colour and depth of the whole target.
    fn clear(&mut self, color: Color);

    fn clear_depth(&mut self);

    fn set_viewport(&mut self, viewport: Viewport);

    fn render(&mut self, scene: &Scene, camera: &Camera);

    fn present(&mut self);
}

/// The window or page element the loop renders into in flat mode.
pub trait Host {
    /// Displayed size in logical pixels.
    fn element_size(&self) -> (u32, u32);

    fn pixel_ratio(&self) -> f64;

    /// Schedules the next flat frame.
    fn request_animation_frame(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Flat,
    Presenting,
}

/// Pending presentation request created by [`DisplayLoop::begin_start`].
///
/// Await it and hand the result to [`DisplayLoop::finish_start`].
pub type PresentRequest = LocalBoxFuture<'static, PresentOutcome>;

pub type PresentOutcome = Result<Box<dyn FrameSource>, DisplayError>;

pub struct DisplayLoop<R: Renderer, H: Host, P: DeviceProvider> {
    renderer: R,
    host: H,
    provider: P,
    mode: Mode,
    starting: bool,
    source: Option<Box<dyn FrameSource>>,
    size: (u32, u32),
}

impl<R: Renderer, H: Host, P: DeviceProvider> DisplayLoop<R, H, P> {
    pub fn new(renderer: R, host: H, provider: P) -> Self {
        Self {
            renderer,
            host,
            provider,
            mode: Mode::Flat,
            starting: false,
            source: None,
            size: (0, 0),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether a presentation request is in flight.
    pub fn is_starting(&self) -> bool {
        self.starting
    }

    /// Current render target size in logical pixels.
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Sizes the target for flat mode and requests the first flat frame.
    pub fn init(&mut self, camera: &mut Camera) {
        self.resize(camera);
        self.host.request_animation_frame();
    }

    /// Resizes camera and renderer for the current mode.
    ///
    /// While presenting the target holds both eyes side by side at the
    /// device's recommended resolution and a pixel ratio of 1. In flat mode
    /// it follows the host element.
    pub fn resize(&mut self, camera: &mut Camera) {
        let (width, height, ratio) = match (self.mode, &self.source) {
            (Mode::Presenting, Some(source)) => {
                let (width, height) = source.render_size();
                (width, height, 1.0)
            }
            _ => {
                let (width, height) = self.host.element_size();
                (width, height, self.host.pixel_ratio())
            }
        };
        log::debug!("Resizing to {}x{} at pixel ratio {}", width, height, ratio);
        self.size = (width, height);
        camera.resize(width, height);
        self.renderer.set_pixel_ratio(ratio);
        self.renderer.set_size(width, height);
    }

    /// First half of [`start`](Self::start): checks the state and creates the device request.
    pub fn begin_start(&mut self) -> Result<PresentRequest, DisplayError> {
        if self.mode == Mode::Presenting || self.starting {
            return Err(DisplayError::AlreadyStarted);
        }
        self.starting = true;
        let query = self.provider.query();
        Ok(async move {
            let availability = query.await;
            let mut source = availability
                .into_frame_source()
                .ok_or(DisplayError::NoDeviceAvailable)?;
            source
                .begin_present()
                .await
                .map_err(DisplayError::PresentRejected)?;
            Ok(source)
        }
        .boxed_local())
    }

    /// Second half of [`start`](Self::start): switches to presenting or reports why not.
    ///
    /// On failure the loop stays flat and the flat chain keeps running.
    pub fn finish_start(
        &mut self,
        outcome: PresentOutcome,
        camera: &mut Camera,
    ) -> Result<(), DisplayError> {
        self.starting = false;
        match outcome {
            Ok(source) => {
                log::info!("Presenting to the VR device");
                self.source = Some(source);
                self.mode = Mode::Presenting;
                self.resize(camera);
                if let Some(source) = self.source.as_mut() {
                    source.request_animation_frame();
                }
                Ok(())
            }
            Err(e) => {
                log::warn!("Could not start presenting: {}", e);
                Err(e)
            }
        }
    }

    /// Looks for a VR device and starts presenting to it.
    pub async fn start(&mut self, camera: &mut Camera) -> Result<(), DisplayError> {
        let request = self.begin_start()?;
        let outcome = request.await;
        self.finish_start(outcome, camera)
    }

    /// Returns to flat mode. Stopping while flat does nothing.
    ///
    /// The returned future resolves once the device has left presentation.
    /// The loop is already flat when this returns.
    pub fn stop(
        &mut self,
        scene: &mut Scene,
        camera: &mut Camera,
    ) -> LocalBoxFuture<'static, Result<(), DisplayError>> {
        let Some(mut source) = self.leave_presenting(scene, camera) else {
            return future::ready(Ok(())).boxed_local();
        };
        if !source.is_presenting() {
            return future::ready(Ok(())).boxed_local();
        }
        source
            .end_present()
            .map(|result| result.map_err(DisplayError::ExitRejected))
            .boxed_local()
    }

    /// The device stopped presenting on its own, e.g. the user took the headset off.
    ///
    /// Devices report presentation changes in both directions, so the
    /// notification is ignored while the device still says it is presenting.
    pub fn presentation_ended(&mut self, scene: &mut Scene, camera: &mut Camera) {
        if self.source.as_ref().is_some_and(|s| s.is_presenting()) {
            log::debug!("Ignoring a presentation change while still presenting");
            return;
        }
        if self.leave_presenting(scene, camera).is_some() {
            log::info!("The VR device ended the presentation");
        }
    }

    fn leave_presenting(
        &mut self,
        scene: &mut Scene,
        camera: &mut Camera,
    ) -> Option<Box<dyn FrameSource>> {
        if self.mode != Mode::Presenting {
            return None;
        }
        let source = self.source.take();
        self.mode = Mode::Flat;
        scene.root = cgmath::Matrix4::identity();
        camera.update_projection_matrix();
        self.resize(camera);
        self.host.request_animation_frame();
        source
    }

    /// Renders one frame of the host's chain.
    pub fn flat_frame(&mut self, scene: &mut Scene, camera: &Camera) {
        if self.mode != Mode::Flat {
            log::trace!("Dropping a flat frame while presenting");
            return;
        }
        self.host.request_animation_frame();

        self.renderer.clear(scene.background);
        let (width, height) = self.size;
        self.renderer.set_viewport(Viewport::full(width, height));
        scene.update_world_transforms();
        self.renderer.render(scene, camera);
        self.renderer.present();
    }

    /// Renders one stereo frame of the device's chain.
    ///
    /// A frame arriving after the device stopped presenting ends the device
    /// chain and returns to flat mode, even if no presentation change was
    /// reported.
    pub fn device_frame(&mut self, scene: &mut Scene, camera: &mut Camera) {
        if self.mode != Mode::Presenting {
            log::trace!("Dropping a device frame while flat");
            return;
        }
        if !self.source.as_ref().is_some_and(|s| s.is_presenting()) {
            log::info!("The VR device is no longer presenting");
            self.leave_presenting(scene, camera);
            return;
        }
        let Some(source) = self.source.as_mut() else {
            return;
        };
        source.request_animation_frame();
        let Some(frame) = source.frame() else {
            log::debug!("The VR device has no pose for this frame");
            return;
        };

        self.renderer.clear(scene.background);
        for (i, eye) in frame.eyes().into_iter().enumerate() {
            if i > 0 {
                self.renderer.clear_depth();
            }
            camera.set_projection(eye.projection);
            scene.root = eye.view;
            scene.update_world_transforms();
            self.renderer.set_viewport(eye.viewport);
            self.renderer.render(scene, camera);
        }
        self.renderer.present();
        source.submit_frame();
    }
}
