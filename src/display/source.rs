//! VR devices and the frame sources built on them.
//!
//! Two generations of device API are supported. A [`VrDisplay`] is polled for
//! per-eye pose data every frame and the finished frame is submitted to it
//! explicitly. An [`XrSession`] hands out complete views, each with its own
//! viewport, and takes the frame back implicitly when the frame callback
//! returns. [`FrameSource`] hides the difference from the display loop.

use futures::future::{self, LocalBoxFuture};

use crate::display::Viewport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eye {
    Left,
    Right,
}

/// Recommended render target size for one eye, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EyeParameters {
    pub render_width: u32,
    pub render_height: u32,
}

/// Pose data polled from a [`VrDisplay`] for the current frame. Matrices are column-major.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VrFrameData {
    pub left_projection: cgmath::Matrix4<f32>,
    pub left_view: cgmath::Matrix4<f32>,
    pub right_projection: cgmath::Matrix4<f32>,
    pub right_view: cgmath::Matrix4<f32>,
}

/// A device with polled pose data and explicit frame submission.
pub trait VrDisplay {
    fn is_presenting(&self) -> bool;

    fn eye_parameters(&self, eye: Eye) -> EyeParameters;

    /// Asks the device to start presenting. Rejections carry the device's reason.
    fn request_present(&mut self) -> LocalBoxFuture<'static, Result<(), String>>;

    fn exit_present(&mut self) -> LocalBoxFuture<'static, Result<(), String>>;

    /// Schedules the next device frame at the device's refresh rate.
    fn request_animation_frame(&mut self);

    /// Pose data for the frame being rendered, `None` if the device has none yet.
    fn frame_data(&mut self) -> Option<VrFrameData>;

    fn submit_frame(&mut self);
}

/// One eye as described by an [`XrSession`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XrView {
    pub eye: Eye,
    pub projection: cgmath::Matrix4<f32>,
    pub view: cgmath::Matrix4<f32>,
    pub viewport: Viewport,
}

/// A session-based device which owns the viewports and submits frames on its own.
pub trait XrSession {
    fn is_active(&self) -> bool;

    /// Size of the device framebuffer holding both eyes.
    fn framebuffer_size(&self) -> (u32, u32);

    fn begin(&mut self) -> LocalBoxFuture<'static, Result<(), String>>;

    fn end(&mut self) -> LocalBoxFuture<'static, Result<(), String>>;

    fn request_animation_frame(&mut self);

    /// Views for the current frame, `None` while the pose is unknown.
    fn views(&mut self) -> Option<Vec<XrView>>;
}

/// Camera data and output region for one eye of a stereo frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeView {
    pub eye: Eye,
    pub projection: cgmath::Matrix4<f32>,
    pub view: cgmath::Matrix4<f32>,
    pub viewport: Viewport,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StereoFrame {
    pub left: EyeView,
    pub right: EyeView,
}

impl StereoFrame {
    /// Eyes in render order.
    pub fn eyes(&self) -> [EyeView; 2] {
        [self.left, self.right]
    }
}

/// Where device frames come from while presenting.
pub trait FrameSource {
    fn is_presenting(&self) -> bool;

    /// Render target size for both eyes side by side.
    fn render_size(&self) -> (u32, u32);

    fn begin_present(&mut self) -> LocalBoxFuture<'static, Result<(), String>>;

    fn end_present(&mut self) -> LocalBoxFuture<'static, Result<(), String>>;

    fn request_animation_frame(&mut self);

    fn frame(&mut self) -> Option<StereoFrame>;

    /// Hands the rendered frame back to the device.
    fn submit_frame(&mut self);
}

/// Frame source over a [`VrDisplay`]. The left eye renders into the left half of the target.
pub struct PolledFrameSource {
    display: Box<dyn VrDisplay>,
}

impl PolledFrameSource {
    pub fn new(display: Box<dyn VrDisplay>) -> Self {
        Self { display }
    }
}

impl FrameSource for PolledFrameSource {
    fn is_presenting(&self) -> bool {
        self.display.is_presenting()
    }

    fn render_size(&self) -> (u32, u32) {
        let eye = self.display.eye_parameters(Eye::Left);
        (eye.render_width * 2, eye.render_height)
    }

    fn begin_present(&mut self) -> LocalBoxFuture<'static, Result<(), String>> {
        self.display.request_present()
    }

    fn end_present(&mut self) -> LocalBoxFuture<'static, Result<(), String>> {
        self.display.exit_present()
    }

    fn request_animation_frame(&mut self) {
        self.display.request_animation_frame()
    }

    fn frame(&mut self) -> Option<StereoFrame> {
        let data = self.display.frame_data()?;
        let (width, height) = self.render_size();
        let half = width as f32 / 2.0;
        let height = height as f32;
        Some(StereoFrame {
            left: EyeView {
                eye: Eye::Left,
                projection: data.left_projection,
                view: data.left_view,
                viewport: Viewport::new(0.0, 0.0, half, height),
            },
            right: EyeView {
                eye: Eye::Right,
                projection: data.right_projection,
                view: data.right_view,
                viewport: Viewport::new(half, 0.0, half, height),
            },
        })
    }

    fn submit_frame(&mut self) {
        self.display.submit_frame()
    }
}

/// Frame source over an [`XrSession`]. Submission happens when the session's frame callback returns.
///
/// The browser provider only speaks WebVR and never yields a session; this is
/// the seam a WebXR provider plugs into through [`Availability::Managed`].
pub struct ManagedFrameSource {
    session: Box<dyn XrSession>,
}

impl ManagedFrameSource {
    pub fn new(session: Box<dyn XrSession>) -> Self {
        Self { session }
    }
}

impl FrameSource for ManagedFrameSource {
    fn is_presenting(&self) -> bool {
        self.session.is_active()
    }

    fn render_size(&self) -> (u32, u32) {
        self.session.framebuffer_size()
    }

    fn begin_present(&mut self) -> LocalBoxFuture<'static, Result<(), String>> {
        self.session.begin()
    }

    fn end_present(&mut self) -> LocalBoxFuture<'static, Result<(), String>> {
        self.session.end()
    }

    fn request_animation_frame(&mut self) {
        self.session.request_animation_frame()
    }

    fn frame(&mut self) -> Option<StereoFrame> {
        let views = self.session.views()?;
        let find = |eye: Eye| {
            views.iter().find(|v| v.eye == eye).map(|v| EyeView {
                eye,
                projection: v.projection,
                view: v.view,
                viewport: v.viewport,
            })
        };
        Some(StereoFrame {
            left: find(Eye::Left)?,
            right: find(Eye::Right)?,
        })
    }

    fn submit_frame(&mut self) {}
}

/// Result of asking the platform for a VR device.
pub enum Availability {
    Managed(Box<dyn XrSession>),
    Polled(Box<dyn VrDisplay>),
    Unavailable,
}

impl Availability {
    pub fn is_available(&self) -> bool {
        !matches!(self, Availability::Unavailable)
    }

    pub fn into_frame_source(self) -> Option<Box<dyn FrameSource>> {
        match self {
            Availability::Managed(session) => Some(Box::new(ManagedFrameSource::new(session))),
            Availability::Polled(display) => Some(Box::new(PolledFrameSource::new(display))),
            Availability::Unavailable => None,
        }
    }
}

impl std::fmt::Debug for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Availability::Managed(_) => "Managed(XrSession)",
            Availability::Polled(_) => "Polled(VrDisplay)",
            Availability::Unavailable => "Unavailable",
        })
    }
}

/// Picks the first device that can present, in the order the platform lists them.
///
/// Devices that cannot present are skipped so they never hide a capable one.
pub fn first_presentable<D>(
    devices: impl IntoIterator<Item = D>,
    can_present: impl Fn(&D) -> bool,
) -> Option<D> {
    devices.into_iter().find(|d| can_present(d))
}

/// Detects VR devices. Queried every time presentation is requested.
pub trait DeviceProvider {
    fn query(&self) -> LocalBoxFuture<'static, Availability>;
}

/// Provider for platforms without VR support.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDevices;

impl DeviceProvider for NoDevices {
    fn query(&self) -> LocalBoxFuture<'static, Availability> {
        Box::pin(future::ready(Availability::Unavailable))
    }
}
