pub mod cage_renderer;
pub mod mesh;
pub mod particle_renderer;
pub mod pipeline;
pub mod portal_renderer;

use std::fmt;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use tracing::debug;
use vitrine_shared::camera::Camera;
use vitrine_shared::geometry::Mesh;
use vitrine_shared::settings::{DisplaySettings, VitrineSettings};
use vitrine_shared::stroke::StrokeUniform;
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::renderer::cage_renderer::CageRenderer;
use crate::renderer::particle_renderer::ParticleRenderer;
use crate::renderer::pipeline::StrokePipeline;
use crate::renderer::portal_renderer::PortalRenderer;
use crate::ui::text_overlay::TextOverlayRenderer;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const NESTED_BACKGROUND: wgpu::Color = wgpu::Color::BLACK;
const NESTED_FOG_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct CameraUniform {
    view_proj: [[f32; 4]; 4],
    camera_pos: [f32; 4],
    fog_color: [f32; 4],
    fog_start: f32,
    fog_end: f32,
    fog_enabled: f32,
    ambient: f32,
}

impl CameraUniform {
    fn from_view_projection(
        view_proj: Mat4,
        camera_pos: Vec3,
        fog: Option<(f32, f32)>,
        ambient: f32,
    ) -> Self {
        let (fog_start, fog_end) = fog.unwrap_or((0.0, 1.0));
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            camera_pos: [camera_pos.x, camera_pos.y, camera_pos.z, 1.0],
            fog_color: NESTED_FOG_COLOR,
            fog_start,
            fog_end,
            fog_enabled: if fog.is_some() { 1.0 } else { 0.0 },
            ambient,
        }
    }
}

/// Everything the renderer needs from an active portal for one frame.
pub struct PortalFrame<'a> {
    pub view_proj: Mat4,
    pub camera_position: Vec3,
    pub plane_model: Mat4,
    /// Side of the square offscreen target the nested scene renders into.
    pub target_size: u32,
    pub mesh: &'a Mesh,
    pub particles: &'a [StrokeUniform],
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderFrameStats {
    pub portal_view_passes: u32,
    pub portal_surface_draw_calls: u32,
    pub particle_draw_calls: u32,
    pub cage_draw_calls: u32,
}

impl RenderFrameStats {
    pub fn draw_calls(&self) -> u32 {
        self.portal_surface_draw_calls + self.particle_draw_calls + self.cage_draw_calls
    }
}

#[derive(Debug)]
struct DepthTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthTexture {
    fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Vitrine Depth Texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

#[derive(Debug)]
pub enum RendererInitError {
    CreateSurface(wgpu::CreateSurfaceError),
    RequestAdapter(wgpu::RequestAdapterError),
    RequestDevice(wgpu::RequestDeviceError),
    UnsupportedSurface,
}

impl fmt::Display for RendererInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateSurface(err) => write!(f, "failed to create surface: {err}"),
            Self::RequestAdapter(err) => write!(f, "failed to request adapter: {err}"),
            Self::RequestDevice(err) => write!(f, "failed to request device: {err}"),
            Self::UnsupportedSurface => write!(f, "adapter does not support this surface"),
        }
    }
}

impl std::error::Error for RendererInitError {}

pub struct Renderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    depth_texture: DepthTexture,
    stroke_pipeline: StrokePipeline,
    camera_uniform_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    portal_camera_uniform_buffer: wgpu::Buffer,
    portal_camera_bind_group: wgpu::BindGroup,
    portal_renderer: PortalRenderer,
    particle_renderer: ParticleRenderer,
    cage_renderer: CageRenderer,
    text_overlay_renderer: TextOverlayRenderer,
    display: DisplaySettings,
    portal_plane_model: Option<Mat4>,
    last_frame_stats: RenderFrameStats,
}

impl Renderer {
    /// `width`/`height` are the surface size in pixels after the pixel-ratio
    /// policy has been applied.
    pub fn new(
        window: Arc<Window>,
        settings: &VitrineSettings,
        width: u32,
        height: u32,
    ) -> Result<Self, RendererInitError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .map_err(RendererInitError::CreateSurface)?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .map_err(RendererInitError::RequestAdapter)?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Vitrine Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .map_err(RendererInitError::RequestDevice)?;

        let surface_config = surface
            .get_default_config(&adapter, width.max(1), height.max(1))
            .ok_or(RendererInitError::UnsupportedSurface)?;
        surface.configure(&device, &surface_config);

        let stroke_pipeline = StrokePipeline::new(
            &device,
            surface_config.format,
            DEPTH_FORMAT,
            settings.stroke.see_through,
        );

        let initial_camera_uniform = CameraUniform::from_view_projection(
            Mat4::IDENTITY,
            Vec3::ZERO,
            None,
            settings.display.ambient_intensity,
        );
        let camera_uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Uniform Buffer"),
            contents: bytemuck::bytes_of(&initial_camera_uniform),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Camera Bind Group"),
            layout: &stroke_pipeline.camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_uniform_buffer.as_entire_binding(),
            }],
        });
        let portal_camera_uniform_buffer =
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Portal Camera Uniform Buffer"),
                contents: bytemuck::bytes_of(&initial_camera_uniform),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        let portal_camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Portal Camera Bind Group"),
            layout: &stroke_pipeline.camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: portal_camera_uniform_buffer.as_entire_binding(),
            }],
        });

        let portal_renderer = PortalRenderer::new(
            &device,
            surface_config.format,
            DEPTH_FORMAT,
            &stroke_pipeline.camera_bind_group_layout,
        );
        let cage_renderer = CageRenderer::new(
            &device,
            surface_config.format,
            DEPTH_FORMAT,
            &stroke_pipeline.camera_bind_group_layout,
            Vec3::from_array(settings.enclosure.offset),
        );
        let text_overlay_renderer = TextOverlayRenderer::new(&device, surface_config.format);
        let depth_texture = DepthTexture::new(&device, surface_config.width, surface_config.height);

        debug!(
            format = ?surface_config.format,
            width = surface_config.width,
            height = surface_config.height,
            "renderer resources created"
        );

        Ok(Self {
            device,
            queue,
            surface,
            surface_config,
            depth_texture,
            stroke_pipeline,
            camera_uniform_buffer,
            camera_bind_group,
            portal_camera_uniform_buffer,
            portal_camera_bind_group,
            portal_renderer,
            particle_renderer: ParticleRenderer::default(),
            cage_renderer,
            text_overlay_renderer,
            display: settings.display.clone(),
            portal_plane_model: None,
            last_frame_stats: RenderFrameStats::default(),
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }

        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.device, &self.surface_config);
        self.depth_texture = DepthTexture::new(&self.device, width, height);
    }

    pub fn surface_size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    pub fn last_frame_stats(&self) -> RenderFrameStats {
        self.last_frame_stats
    }

    pub fn update_camera_uniform(&self, camera: &Camera) {
        let uniform = CameraUniform::from_view_projection(
            camera.view_projection_matrix(),
            camera.position,
            None,
            self.display.ambient_intensity,
        );
        self.queue
            .write_buffer(&self.camera_uniform_buffer, 0, bytemuck::bytes_of(&uniform));
    }

    /// Feeds the nested scene for this frame, or clears it while inactive.
    pub fn update_portal(&mut self, frame: Option<PortalFrame<'_>>) {
        let Some(frame) = frame else {
            self.portal_plane_model = None;
            self.particle_renderer.clear();
            self.portal_renderer.release_target();
            return;
        };

        let target_size = frame
            .target_size
            .min(self.device.limits().max_texture_dimension_2d);
        if self.portal_renderer.ensure_target(&self.device, target_size) {
            debug!(size = target_size, "portal render target allocated");
        }

        let uniform = CameraUniform::from_view_projection(
            frame.view_proj,
            frame.camera_position,
            Some((self.display.fog_start, self.display.fog_end)),
            self.display.ambient_intensity,
        );
        self.queue.write_buffer(
            &self.portal_camera_uniform_buffer,
            0,
            bytemuck::bytes_of(&uniform),
        );

        if !self.particle_renderer.has_mesh() {
            self.particle_renderer.upload_mesh(&self.device, frame.mesh);
        }
        self.particle_renderer.update(
            &self.device,
            &self.queue,
            &self.stroke_pipeline,
            frame.particles,
        );
        self.portal_plane_model = Some(frame.plane_model);
    }

    pub fn update_overlay(&mut self, label: Option<&str>, stats_lines: &[String]) {
        self.text_overlay_renderer.update(
            &self.queue,
            self.surface_config.width,
            self.surface_config.height,
            label,
            stats_lines,
        );
    }

    fn render_portal_view(&self, encoder: &mut wgpu::CommandEncoder, stats: &mut RenderFrameStats) {
        let particle_renderer = &self.particle_renderer;
        let cage_renderer = &self.cage_renderer;
        let stroke_pipeline = &self.stroke_pipeline;
        let camera_bind_group = &self.portal_camera_bind_group;

        let rendered = self.portal_renderer.render_portal_view(|color_view, depth_view| {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Portal RTT Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(NESTED_BACKGROUND),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            stats.cage_draw_calls += cage_renderer.render(&mut render_pass, camera_bind_group);
            stats.particle_draw_calls +=
                particle_renderer.render(&mut render_pass, stroke_pipeline, camera_bind_group);
        });
        if rendered {
            stats.portal_view_passes += 1;
        }
    }

    /// Records the nested scene into the offscreen target first, then the
    /// primary scene, in one submission.
    pub fn render_frame(&mut self) -> Result<(), wgpu::SurfaceError> {
        let frame = self.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut frame_stats = RenderFrameStats::default();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Vitrine Command Encoder"),
            });

        if self.portal_plane_model.is_some() {
            self.render_portal_view(&mut encoder, &mut frame_stats);
        }

        {
            let [r, g, b] = self.display.clear_color.map(f64::from);
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Vitrine Main Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a: 1.0 }),
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
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some(model) = self.portal_plane_model {
                frame_stats.portal_surface_draw_calls += self.portal_renderer.render_portal_surface(
                    &self.queue,
                    &mut render_pass,
                    &self.camera_bind_group,
                    model,
                );
            }
        }

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Vitrine Overlay Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.text_overlay_renderer.render(&mut render_pass);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        self.last_frame_stats = frame_stats;
        Ok(())
    }
}
