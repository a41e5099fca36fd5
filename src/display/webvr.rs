//! WebVR devices in the browser.
//!
//! Device frames and `vrdisplaypresentchange` arrive as JS callbacks. They are
//! forwarded through the `notify` callback, which the host turns into event
//! loop events.

use std::{cell::RefCell, rc::Rc};

use futures::future::{FutureExt, LocalBoxFuture};
use wasm_bindgen::{JsCast, JsValue, closure::Closure};
use wasm_bindgen_futures::JsFuture;

use crate::display::source::{
    Availability, DeviceProvider, Eye, EyeParameters, VrDisplay, VrFrameData, first_presentable,
};

/// What the browser told us about the VR device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebVrEvent {
    Frame,
    PresentChange,
}

pub type Notify = Rc<dyn Fn(WebVrEvent)>;

fn js_reason(e: JsValue) -> String {
    e.as_string().unwrap_or_else(|| format!("{:?}", e))
}

fn to_matrix(values: Result<Vec<f32>, JsValue>) -> Option<cgmath::Matrix4<f32>> {
    let values = values.ok()?;
    let m: &[f32; 16] = values.as_slice().try_into().ok()?;
    Some(cgmath::Matrix4::new(
        m[0], m[1], m[2], m[3], m[4], m[5], m[6], m[7], m[8], m[9], m[10], m[11], m[12], m[13],
        m[14], m[15],
    ))
}

/// Finds WebVR displays through `navigator.getVRDisplays()`.
pub struct WebVrProvider {
    canvas: web_sys::HtmlCanvasElement,
    notify: Notify,
    _present_change: Option<Closure<dyn FnMut()>>,
}

impl WebVrProvider {
    pub fn new(canvas: web_sys::HtmlCanvasElement, notify: Notify) -> Self {
        let present_change = web_sys::window().and_then(|window| {
            let notify = Rc::clone(&notify);
            let closure = Closure::<dyn FnMut()>::new(move || notify(WebVrEvent::PresentChange));
            window
                .add_event_listener_with_callback(
                    "vrdisplaypresentchange",
                    closure.as_ref().unchecked_ref(),
                )
                .map_err(|e| log::warn!("Cannot listen for presentation changes: {:?}", e))
                .ok()?;
            Some(closure)
        });
        Self {
            canvas,
            notify,
            _present_change: present_change,
        }
    }
}

impl DeviceProvider for WebVrProvider {
    fn query(&self) -> LocalBoxFuture<'static, Availability> {
        let canvas = self.canvas.clone();
        let notify = Rc::clone(&self.notify);
        async move {
            let Some(window) = web_sys::window() else {
                return Availability::Unavailable;
            };
            let promise = match window.navigator().get_vr_displays() {
                Ok(promise) => promise,
                Err(_) => {
                    log::info!("This browser does not support WebVR");
                    return Availability::Unavailable;
                }
            };
            let displays = match JsFuture::from(promise).await {
                Ok(displays) => js_sys::Array::from(&displays),
                Err(e) => {
                    log::warn!("Could not list VR displays: {:?}", e);
                    return Availability::Unavailable;
                }
            };
            let display = first_presentable(
                displays
                    .iter()
                    .filter_map(|d| d.dyn_into::<web_sys::VrDisplay>().ok()),
                |d| d.capabilities().can_present(),
            );
            match display {
                Some(display) => {
                    log::info!("Found VR display {}", display.display_name());
                    Availability::Polled(Box::new(WebVrDisplay::new(display, canvas, notify)))
                }
                None => {
                    log::info!("No VR display can present");
                    Availability::Unavailable
                }
            }
        }
        .boxed_local()
    }
}

pub struct WebVrDisplay {
    display: web_sys::VrDisplay,
    canvas: web_sys::HtmlCanvasElement,
    frame_data: Option<web_sys::VrFrameData>,
    on_frame: Closure<dyn FnMut()>,
    pending_frame: Rc<RefCell<Option<i32>>>,
}

impl WebVrDisplay {
    fn new(display: web_sys::VrDisplay, canvas: web_sys::HtmlCanvasElement, notify: Notify) -> Self {
        let pending_frame = Rc::new(RefCell::new(None));
        let pending = Rc::clone(&pending_frame);
        let on_frame = Closure::<dyn FnMut()>::new(move || {
            pending.borrow_mut().take();
            notify(WebVrEvent::Frame);
        });
        Self {
            display,
            canvas,
            frame_data: web_sys::VrFrameData::new().ok(),
            on_frame,
            pending_frame,
        }
    }
}

impl VrDisplay for WebVrDisplay {
    fn is_presenting(&self) -> bool {
        self.display.is_presenting()
    }

    fn eye_parameters(&self, eye: Eye) -> EyeParameters {
        let params = self.display.get_eye_parameters(match eye {
            Eye::Left => web_sys::VrEye::Left,
            Eye::Right => web_sys::VrEye::Right,
        });
        EyeParameters {
            render_width: params.render_width(),
            render_height: params.render_height(),
        }
    }

    fn request_present(&mut self) -> LocalBoxFuture<'static, Result<(), String>> {
        let layer = web_sys::VrLayer::new();
        layer.set_source(Some(&self.canvas));
        let layers = js_sys::Array::of1(&layer);
        let promise = self.display.request_present(&layers);
        async move {
            let promise = promise.map_err(js_reason)?;
            JsFuture::from(promise).await.map_err(js_reason)?;
            Ok(())
        }
        .boxed_local()
    }

    fn exit_present(&mut self) -> LocalBoxFuture<'static, Result<(), String>> {
        if let Some(handle) = self.pending_frame.borrow_mut().take() {
            let _ = self.display.cancel_animation_frame(handle);
        }
        let promise = self.display.exit_present();
        async move {
            let promise = promise.map_err(js_reason)?;
            JsFuture::from(promise).await.map_err(js_reason)?;
            Ok(())
        }
        .boxed_local()
    }

    fn request_animation_frame(&mut self) {
        match self
            .display
            .request_animation_frame(self.on_frame.as_ref().unchecked_ref())
        {
            Ok(handle) => *self.pending_frame.borrow_mut() = Some(handle),
            Err(e) => log::error!("VR display refused an animation frame: {:?}", e),
        }
    }

    fn frame_data(&mut self) -> Option<VrFrameData> {
        let data = self.frame_data.as_ref()?;
        if !self.display.get_frame_data(data) {
            return None;
        }
        Some(VrFrameData {
            left_projection: to_matrix(data.left_projection_matrix())?,
            left_view: to_matrix(data.left_view_matrix())?,
            right_projection: to_matrix(data.right_projection_matrix())?,
            right_view: to_matrix(data.right_view_matrix())?,
        })
    }

    fn submit_frame(&mut self) {
        self.display.submit_frame();
    }
}
