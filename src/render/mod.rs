//! The wgpu implementation of [`Renderer`].
//!
//! [`GpuRenderer`] draws into either a window surface or an off-screen
//! texture. Models are uploaded the first time they show up in the scene's
//! model group and kept for the lifetime of the renderer, since models are
//! never removed from a scene.
//!
//! Every call to [`Renderer::render`] writes the uniforms and submits its own
//! command buffer. A stereo frame renders twice with different cameras, and
//! queued buffer writes only take effect at the next submission.

use std::{iter, sync::Arc};

use anyhow::{Context as _, anyhow};
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::{
    camera::Camera,
    data_structures::{
        color::Color,
        model::{Material, Model},
        scene_graph::Scene,
    },
    display::{Renderer, Viewport},
};

pub mod pipeline;
pub mod texture;
pub mod uniforms;

use pipeline::SceneLayouts;
use texture::Texture;
use uniforms::{CameraUniform, LightsUniform, MaterialUniform, MeshUniform};

enum Target {
    Surface {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
        frame: Option<wgpu::SurfaceTexture>,
    },
    OffScreen {
        texture: wgpu::Texture,
    },
}

#[derive(Debug)]
struct GpuMaterial {
    bind_group: wgpu::BindGroup,
}

#[derive(Debug)]
struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    num_elements: u32,
    material: usize,
    transform: cgmath::Matrix4<f32>,
    uniform: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

#[derive(Debug)]
struct GpuModel {
    meshes: Vec<GpuMesh>,
    materials: Vec<GpuMaterial>,
}

pub struct GpuRenderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    target: Target,
    format: wgpu::TextureFormat,
    depth_texture: Texture,
    layouts: SceneLayouts,
    pipeline: wgpu::RenderPipeline,
    sampler: wgpu::Sampler,
    camera_uniform: CameraUniform,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    lights_buffer: wgpu::Buffer,
    lights_bind_group: wgpu::BindGroup,
    fallback_material: GpuMaterial,
    models: Vec<GpuModel>,
    pixel_ratio: f64,
    /// Physical size of the target.
    size: (u32, u32),
    viewport: Viewport,
}

async fn request_device(
    instance: &wgpu::Instance,
    surface: Option<&wgpu::Surface<'static>>,
) -> anyhow::Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue)> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: surface,
            force_fallback_adapter: false,
        })
        .await
        .context("No suitable graphics adapter")?;
    log::info!("Using adapter {:?}", adapter.get_info().name);

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: None,
            required_features: wgpu::Features::empty(),
            // WebGL doesn't support all of wgpu's features
            required_limits: if cfg!(target_arch = "wasm32") {
                wgpu::Limits::downlevel_webgl2_defaults()
            } else {
                wgpu::Limits::default()
            },
            memory_hints: Default::default(),
            trace: wgpu::Trace::Off,
        })
        .await
        .context("Could not open the graphics device")?;
    Ok((adapter, device, queue))
}

fn new_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        #[cfg(not(target_arch = "wasm32"))]
        backends: wgpu::Backends::PRIMARY,
        #[cfg(target_arch = "wasm32")]
        backends: wgpu::Backends::GL,
        ..Default::default()
    })
}

fn create_offscreen_texture(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    size: (u32, u32),
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Off-screen target"),
        size: wgpu::Extent3d {
            width: size.0,
            height: size.1,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    })
}

impl GpuRenderer {
    /// Renders into `window`. The surface starts at the window's current physical size.
    pub async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let size = window.inner_size();
        let pixel_ratio = window.scale_factor();

        let instance = new_instance();
        let surface = instance
            .create_surface(window)
            .context("Could not create a surface for the window")?;
        let (adapter, device, queue) = request_device(&instance, Some(&surface)).await?;

        let surface_caps = surface.get_capabilities(&adapter);
        // The shader writes linear colour, so prefer a surface that encodes to sRGB.
        let format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow!("The surface supports no formats"))?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        let size = (config.width, config.height);
        let target = Target::Surface {
            surface,
            config,
            frame: None,
        };

        Ok(Self::build(device, queue, target, format, size, pixel_ratio))
    }

    /// Renders into a texture that can be read back with [`read_pixels`](Self::read_pixels).
    pub async fn new_offscreen(width: u32, height: u32) -> anyhow::Result<Self> {
        let instance = new_instance();
        let (_adapter, device, queue) = request_device(&instance, None).await?;
        let format = wgpu::TextureFormat::Rgba8UnormSrgb;
        let size = (width.max(1), height.max(1));
        let texture = create_offscreen_texture(&device, format, size);
        Ok(Self::build(
            device,
            queue,
            Target::OffScreen { texture },
            format,
            size,
            1.0,
        ))
    }

    fn build(
        device: wgpu::Device,
        queue: wgpu::Queue,
        target: Target,
        format: wgpu::TextureFormat,
        size: (u32, u32),
        pixel_ratio: f64,
    ) -> Self {
        let layouts = SceneLayouts::new(&device);
        let pipeline = pipeline::mk_scene_pipeline(&device, format, &layouts);
        let sampler = texture::create_default_sampler(&device);

        let camera_uniform = CameraUniform::new();
        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[camera_uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &layouts.camera,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });

        let lights_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Lights Buffer"),
            contents: bytemuck::cast_slice(&[LightsUniform::from_scene(&Scene::new())]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let lights_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &layouts.lights,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: lights_buffer.as_entire_binding(),
            }],
            label: Some("lights_bind_group"),
        });

        let depth_texture = Texture::create_depth_texture(&device, [size.0, size.1], "depth_texture");
        let fallback_material =
            create_material(&device, &queue, &layouts.material, &sampler, &Material::default());

        Self {
            device,
            queue,
            target,
            format,
            depth_texture,
            layouts,
            pipeline,
            sampler,
            camera_uniform,
            camera_buffer,
            camera_bind_group,
            lights_buffer,
            lights_bind_group,
            fallback_material,
            models: Vec::new(),
            pixel_ratio,
            size,
            viewport: Viewport::full(size.0, size.1),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Physical size of the render target.
    pub fn physical_size(&self) -> (u32, u32) {
        self.size
    }

    pub fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    /// Number of models uploaded so far.
    pub fn uploaded_models(&self) -> usize {
        self.models.len()
    }

    /// Reconfigures the surface at its current size, e.g. after it was lost.
    pub fn reconfigure(&mut self) {
        if let Target::Surface {
            surface,
            config,
            frame,
        } = &mut self.target
        {
            frame.take();
            surface.configure(&self.device, config);
        }
    }

    /// View of the texture the current frame is drawn into, acquiring a surface texture if needed.
    fn target_view(&mut self) -> Option<wgpu::TextureView> {
        match &mut self.target {
            Target::OffScreen { texture } => {
                Some(texture.create_view(&wgpu::TextureViewDescriptor::default()))
            }
            Target::Surface {
                surface,
                config,
                frame,
            } => {
                if frame.is_none() {
                    match surface.get_current_texture() {
                        Ok(texture) => *frame = Some(texture),
                        // Reconfigure the surface if it's lost or outdated
                        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                            log::warn!("Surface lost, reconfiguring");
                            surface.configure(&self.device, config);
                            return None;
                        }
                        Err(e) => {
                            log::error!("Unable to acquire a frame: {}", e);
                            return None;
                        }
                    }
                }
                frame.as_ref().map(|f| {
                    f.texture
                        .create_view(&wgpu::TextureViewDescriptor::default())
                })
            }
        }
    }

    fn clear_pass(&mut self, color: Option<wgpu::Color>, label: &str) {
        let Some(view) = self.target_view() else {
            return;
        };
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        {
            encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: match color {
                            Some(color) => wgpu::LoadOp::Clear(color),
                            None => wgpu::LoadOp::Load,
                        },
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
        }
        self.queue.submit(iter::once(encoder.finish()));
    }

    /// Uploads models that were added to the model group since the last frame.
    fn sync_models(&mut self, models: &[Model]) {
        for model in models.iter().skip(self.models.len()) {
            log::debug!("Uploading model {} ({} meshes)", model.name, model.meshes.len());
            let materials = model
                .materials
                .iter()
                .map(|m| {
                    create_material(
                        &self.device,
                        &self.queue,
                        &self.layouts.material,
                        &self.sampler,
                        m,
                    )
                })
                .collect();
            let meshes = model
                .meshes
                .iter()
                .filter(|m| !m.indices.is_empty())
                .map(|m| {
                    let vertex_buffer =
                        self.device
                            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                                label: Some(format!("{:?} Vertex Buffer", m.name).as_str()),
                                contents: bytemuck::cast_slice(&m.vertices),
                                usage: wgpu::BufferUsages::VERTEX,
                            });
                    let index_buffer =
                        self.device
                            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                                label: Some(format!("{:?} Index Buffer", m.name).as_str()),
                                contents: bytemuck::cast_slice(&m.indices),
                                usage: wgpu::BufferUsages::INDEX,
                            });
                    let uniform = self
                        .device
                        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                            label: Some("Mesh Buffer"),
                            contents: bytemuck::cast_slice(&[MeshUniform::new(m.transform)]),
                            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                        });
                    let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                        layout: &self.layouts.mesh,
                        entries: &[wgpu::BindGroupEntry {
                            binding: 0,
                            resource: uniform.as_entire_binding(),
                        }],
                        label: Some("mesh_bind_group"),
                    });
                    GpuMesh {
                        vertex_buffer,
                        index_buffer,
                        num_elements: m.indices.len() as u32,
                        material: m.material,
                        transform: m.transform,
                        uniform,
                        bind_group,
                    }
                })
                .collect();
            self.models.push(GpuModel { meshes, materials });
        }
    }

    /// The current viewport in physical pixels, clamped to the target. `None` if it is empty.
    fn physical_viewport(&self) -> Option<(f32, f32, f32, f32)> {
        let ratio = self.pixel_ratio as f32;
        let (width, height) = (self.size.0 as f32, self.size.1 as f32);
        let x = (self.viewport.x * ratio).clamp(0.0, width);
        let y = (self.viewport.y * ratio).clamp(0.0, height);
        let w = (self.viewport.width * ratio).min(width - x);
        let h = (self.viewport.height * ratio).min(height - y);
        (w > 0.0 && h > 0.0).then_some((x, y, w, h))
    }

    /// Copies the off-screen target into an image. Fails for window surfaces.
    pub async fn read_pixels(&self) -> anyhow::Result<image::RgbaImage> {
        let Target::OffScreen { texture } = &self.target else {
            return Err(anyhow!("Only off-screen targets can be read back"));
        };
        let (width, height) = self.size;
        let unpadded_bytes_per_row = 4 * width;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;

        let output_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            size: (padded_bytes_per_row * height) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            label: Some("Readback Buffer"),
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &output_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(iter::once(encoder.finish()));

        let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
        let buffer_slice = output_buffer.slice(..);
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device
            .poll(wgpu::PollType::Wait)
            .context("Waiting for the readback failed")?;
        rx.receive()
            .await
            .ok_or_else(|| anyhow!("The readback was cancelled"))??;

        let data = buffer_slice.get_mapped_range();
        let pixels: Vec<u8> = data
            .chunks(padded_bytes_per_row as usize)
            .flat_map(|row| &row[..unpadded_bytes_per_row as usize])
            .copied()
            .collect();
        drop(data);
        output_buffer.unmap();

        image::RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("Readback size does not match {}x{}", width, height))
    }
}

fn create_material(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    material: &Material,
) -> GpuMaterial {
    let texture = match &material.diffuse_texture {
        Some(image) => Texture::from_image(device, queue, image, Some(material.name.as_str())),
        None => Texture::create_white(device, queue),
    };
    let uniform = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Material Buffer"),
        contents: bytemuck::cast_slice(&[MaterialUniform::new(material.diffuse)]),
        usage: wgpu::BufferUsages::UNIFORM,
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(
                    texture.sampler.as_ref().unwrap_or(sampler),
                ),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: uniform.as_entire_binding(),
            },
        ],
        label: Some(material.name.as_str()),
    });
    GpuMaterial { bind_group }
}

impl Renderer for GpuRenderer {
    fn set_pixel_ratio(&mut self, ratio: f64) {
        self.pixel_ratio = ratio;
    }

    fn set_size(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            log::debug!("Ignoring resize to {}x{}", width, height);
            return;
        }
        let physical = |v: u32| ((v as f64 * self.pixel_ratio).round() as u32).max(1);
        self.size = (physical(width), physical(height));
        match &mut self.target {
            Target::Surface {
                surface,
                config,
                frame,
            } => {
                frame.take();
                config.width = self.size.0;
                config.height = self.size.1;
                surface.configure(&self.device, config);
            }
            Target::OffScreen { texture } => {
                *texture = create_offscreen_texture(&self.device, self.format, self.size);
            }
        }
        self.depth_texture =
            Texture::create_depth_texture(&self.device, [self.size.0, self.size.1], "depth_texture");
        self.viewport = Viewport::full(width, height);
    }

    fn clear(&mut self, color: Color) {
        let color = if self.format.is_srgb() {
            color.to_linear()
        } else {
            color
        };
        self.clear_pass(Some(color.into()), "Clear Pass");
    }

    fn clear_depth(&mut self) {
        self.clear_pass(None, "Clear Depth Pass");
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    fn render(&mut self, scene: &Scene, camera: &Camera) {
        let group = scene.model_group();
        self.sync_models(group.models());

        let Some((x, y, w, h)) = self.physical_viewport() else {
            log::debug!("Skipping render into an empty viewport");
            return;
        };
        let Some(view) = self.target_view() else {
            return;
        };

        self.camera_uniform.update_view_proj(camera);
        self.queue.write_buffer(
            &self.camera_buffer,
            0,
            bytemuck::cast_slice(&[self.camera_uniform]),
        );
        self.queue.write_buffer(
            &self.lights_buffer,
            0,
            bytemuck::cast_slice(&[LightsUniform::from_scene(scene)]),
        );
        let world = group.world_matrix();
        for mesh in self.models.iter().flat_map(|m| m.meshes.iter()) {
            self.queue.write_buffer(
                &mesh.uniform,
                0,
                bytemuck::cast_slice(&[MeshUniform::new(world * mesh.transform)]),
            );
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_viewport(x, y, w, h, 0.0, 1.0);
            render_pass.set_scissor_rect(x as u32, y as u32, w as u32, h as u32);
            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(0, &self.camera_bind_group, &[]);
            render_pass.set_bind_group(1, &self.lights_bind_group, &[]);
            for model in &self.models {
                for mesh in &model.meshes {
                    let material = model
                        .materials
                        .get(mesh.material)
                        .unwrap_or(&self.fallback_material);
                    render_pass.set_bind_group(2, &mesh.bind_group, &[]);
                    render_pass.set_bind_group(3, &material.bind_group, &[]);
                    render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                    render_pass
                        .set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                    render_pass.draw_indexed(0..mesh.num_elements, 0, 0..1);
                }
            }
        }
        self.queue.submit(iter::once(encoder.finish()));
    }

    fn present(&mut self) {
        if let Target::Surface { frame, .. } = &mut self.target {
            if let Some(frame) = frame.take() {
                frame.present();
            }
        }
    }
}
