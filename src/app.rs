//! The winit application: window, event loop and the glue between the
//! configurator, the display loop and the async executor of the platform.
//!
//! # Lifecycle
//!
//! 1. `resumed` creates the window and starts initialisation: the GPU
//!    renderer is created and the settings file is fetched and applied.
//! 2. Model loads queued by the settings file are spawned on the platform
//!    executor. Finished models are moved into the scene before every frame.
//! 3. Window redraws drive the flat frame chain, device callbacks drive the
//!    stereo chain. `V` toggles VR presentation, `Escape` leaves it.

use std::sync::Arc;

use futures::future::{FutureExt, LocalBoxFuture};
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

use crate::{
    config::RuntimeConfig,
    display::{DisplayLoop, Host, Mode, PresentOutcome},
    error::DisplayError,
    render::GpuRenderer,
    resources::FileLoader,
    settings::SceneConfigurator,
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(not(target_arch = "wasm32"))]
type Provider = crate::display::NoDevices;
#[cfg(target_arch = "wasm32")]
type Provider = crate::display::webvr::WebVrProvider;

/// The flat mode [`Host`]: a winit window, which is a canvas on the web.
#[derive(Debug, Clone)]
pub struct WindowHost {
    window: Arc<Window>,
}

impl WindowHost {
    pub fn new(window: Arc<Window>) -> Self {
        Self { window }
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }
}

impl Host for WindowHost {
    fn element_size(&self) -> (u32, u32) {
        let size: winit::dpi::LogicalSize<u32> =
            self.window.inner_size().to_logical(self.window.scale_factor());
        (size.width, size.height)
    }

    fn pixel_ratio(&self) -> f64 {
        self.window.scale_factor()
    }

    fn request_animation_frame(&mut self) {
        self.window.request_redraw();
    }
}

/// Everything that exists once initialisation finished.
pub(crate) struct Viewer {
    display: DisplayLoop<GpuRenderer, WindowHost, Provider>,
    configurator: SceneConfigurator<FileLoader>,
}

impl Viewer {
    async fn new(
        window: Arc<Window>,
        config: RuntimeConfig,
        provider: Provider,
    ) -> anyhow::Result<Self> {
        let renderer = GpuRenderer::new(window.clone()).await?;

        let mut configurator = SceneConfigurator::new(FileLoader::new(config.asset_root));
        match configurator.fetch_and_load(&config.settings_path).await {
            Ok(report) => log::info!(
                "Settings {} applied: {} directives, {} issues",
                config.settings_path,
                report.applied,
                report.issues.len()
            ),
            // The scene stays at its defaults
            Err(e) => log::error!("{}", e),
        }

        let mut display = DisplayLoop::new(renderer, WindowHost::new(window), provider);
        let (_, camera) = configurator.scene_and_camera_mut();
        display.init(camera);

        Ok(Self {
            display,
            configurator,
        })
    }

    fn apply_completed_loads(&mut self) {
        if !self.configurator.apply_completed_loads().is_empty() {
            self.display.host().window().request_redraw();
        }
    }
}

pub(crate) enum AppEvent {
    #[allow(dead_code)]
    Initialized(Box<Viewer>),
    PresentResult(PresentOutcome),
    StopResult(Result<(), DisplayError>),
    #[allow(dead_code)]
    DeviceFrame,
    #[allow(dead_code)]
    PresentChange,
}

impl std::fmt::Debug for AppEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialized(_) => f.write_str("Initialized"),
            Self::PresentResult(outcome) => f
                .debug_tuple("PresentResult")
                .field(&outcome.as_ref().map(|_| "FrameSource"))
                .finish(),
            Self::StopResult(result) => f.debug_tuple("StopResult").field(result).finish(),
            Self::DeviceFrame => f.write_str("DeviceFrame"),
            Self::PresentChange => f.write_str("PresentChange"),
        }
    }
}

pub struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    #[cfg(not(target_arch = "wasm32"))]
    local: tokio::task::LocalSet,
    proxy: EventLoopProxy<AppEvent>,
    config: RuntimeConfig,
    viewer: Option<Viewer>,
}

impl App {
    fn new(
        event_loop: &EventLoop<AppEvent>,
        config: RuntimeConfig,
        #[cfg(not(target_arch = "wasm32"))] async_runtime: tokio::runtime::Runtime,
    ) -> Self {
        Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime,
            #[cfg(not(target_arch = "wasm32"))]
            local: tokio::task::LocalSet::new(),
            proxy: event_loop.create_proxy(),
            config,
            viewer: None,
        }
    }

    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        #[cfg(not(target_arch = "wasm32"))]
        {
            self.local.spawn_local(task);
        }
        #[cfg(target_arch = "wasm32")]
        {
            wasm_bindgen_futures::spawn_local(task);
        }
    }

    /// Lets spawned tasks make progress. On the web the browser does this on its own.
    fn tick(&self) {
        #[cfg(not(target_arch = "wasm32"))]
        self.async_runtime
            .block_on(self.local.run_until(tokio::task::yield_now()));
    }

    fn spawn_asset_loads(&mut self) {
        let Some(viewer) = self.viewer.as_mut() else {
            return;
        };
        let tasks = viewer.configurator.take_asset_tasks();
        for task in tasks {
            self.spawn(task);
        }
    }

    fn toggle_presentation(&mut self) {
        let Some(viewer) = self.viewer.as_mut() else {
            return;
        };
        match viewer.display.mode() {
            Mode::Flat => match viewer.display.begin_start() {
                Ok(request) => {
                    let proxy = self.proxy.clone();
                    self.spawn(
                        async move {
                            let outcome = request.await;
                            if proxy.send_event(AppEvent::PresentResult(outcome)).is_err() {
                                log::warn!("Event loop closed before presentation started");
                            }
                        }
                        .boxed_local(),
                    );
                }
                Err(e) => log::warn!("{}", e),
            },
            Mode::Presenting => self.stop_presentation(),
        }
    }

    fn stop_presentation(&mut self) {
        let Some(viewer) = self.viewer.as_mut() else {
            return;
        };
        let (scene, camera) = viewer.configurator.scene_and_camera_mut();
        let exit = viewer.display.stop(scene, camera);
        let proxy = self.proxy.clone();
        self.spawn(
            async move {
                let result = exit.await;
                let _ = proxy.send_event(AppEvent::StopResult(result));
            }
            .boxed_local(),
        );
    }
}

impl ApplicationHandler<AppEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.viewer.is_some() {
            return;
        }
        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(winit::dpi::LogicalSize::new(
                self.config.window_size.0,
                self.config.window_size.1,
            ));

        #[cfg(target_arch = "wasm32")]
        let canvas: web_sys::HtmlCanvasElement = {
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "canvas";

            let window = web_sys::window().unwrap_throw();
            let document = window.document().unwrap_throw();
            let canvas = document.get_element_by_id(CANVAS_ID).unwrap_throw();
            let html_canvas_element: web_sys::HtmlCanvasElement = canvas.unchecked_into();
            window_attributes = window_attributes.with_canvas(Some(html_canvas_element.clone()));
            html_canvas_element
        };

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Could not create a window: {}", e);
                event_loop.exit();
                return;
            }
        };

        #[cfg(not(target_arch = "wasm32"))]
        let provider = crate::display::NoDevices;
        #[cfg(target_arch = "wasm32")]
        let provider = {
            use crate::display::webvr::{WebVrEvent, WebVrProvider};

            let proxy = self.proxy.clone();
            let notify = std::rc::Rc::new(move |event: WebVrEvent| {
                let event = match event {
                    WebVrEvent::Frame => AppEvent::DeviceFrame,
                    WebVrEvent::PresentChange => AppEvent::PresentChange,
                };
                let _ = proxy.send_event(event);
            });
            WebVrProvider::new(canvas, notify)
        };

        let init_future = Viewer::new(window, self.config.clone(), provider);

        #[cfg(not(target_arch = "wasm32"))]
        {
            match self.async_runtime.block_on(init_future) {
                Ok(viewer) => {
                    self.viewer = Some(viewer);
                    self.spawn_asset_loads();
                }
                Err(e) => {
                    log::error!("Initialization failed: {:#}", e);
                    event_loop.exit();
                }
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                match init_future.await {
                    Ok(viewer) => {
                        let _ = proxy.send_event(AppEvent::Initialized(Box::new(viewer)));
                    }
                    Err(e) => log::error!("Initialization failed: {:#}", e),
                }
            });
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: AppEvent) {
        if let AppEvent::Initialized(viewer) = event {
            // This is the message from our wasm `spawn_local`
            self.viewer = Some(*viewer);
            self.spawn_asset_loads();
            return;
        }
        let Some(viewer) = self.viewer.as_mut() else {
            log::warn!("Dropping {:?} before initialization", event);
            return;
        };
        match event {
            AppEvent::Initialized(_) => (),
            AppEvent::PresentResult(outcome) => {
                let (_, camera) = viewer.configurator.scene_and_camera_mut();
                if let Err(e) = viewer.display.finish_start(outcome, camera) {
                    log::warn!("Staying in flat mode: {}", e);
                }
            }
            AppEvent::StopResult(result) => {
                if let Err(e) = result {
                    log::warn!("{}", e);
                }
            }
            AppEvent::DeviceFrame => {
                viewer.apply_completed_loads();
                let (scene, camera) = viewer.configurator.scene_and_camera_mut();
                viewer.display.device_frame(scene, camera);
            }
            AppEvent::PresentChange => {
                let (scene, camera) = viewer.configurator.scene_and_camera_mut();
                viewer.display.presentation_ended(scene, camera);
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        if self.viewer.is_none() {
            return;
        }

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => match code {
                KeyCode::KeyV => self.toggle_presentation(),
                KeyCode::Escape => self.stop_presentation(),
                _ => (),
            },
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(viewer) = self.viewer.as_mut() {
                    let (_, camera) = viewer.configurator.scene_and_camera_mut();
                    viewer.display.resize(camera);
                }
            }
            WindowEvent::RedrawRequested => {
                self.tick();
                if let Some(viewer) = self.viewer.as_mut() {
                    viewer.apply_completed_loads();
                    let (scene, camera) = viewer.configurator.scene_and_camera_mut();
                    viewer.display.flat_frame(scene, camera);
                }
            }
            _ => {}
        }
    }
}

/// Opens the viewer and runs it until the window is closed.
pub fn run(config: RuntimeConfig) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        console_log::init_with_level(log::Level::Info)
            .map_err(|e| anyhow::anyhow!("Could not initialize logger: {}", e))?;
    }

    log::info!("Starting with {:?}", config);

    let event_loop: EventLoop<AppEvent> = EventLoop::with_user_event().build()?;

    #[cfg(not(target_arch = "wasm32"))]
    let mut app = App::new(&event_loop, config, tokio::runtime::Runtime::new()?);
    #[cfg(target_arch = "wasm32")]
    let mut app = App::new(&event_loop, config);

    event_loop.run_app(&mut app)?;

    Ok(())
}
