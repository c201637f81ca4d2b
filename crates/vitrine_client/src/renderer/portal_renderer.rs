use std::mem;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use wgpu::util::DeviceExt;

const PORTAL_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct PortalVertex {
    position: [f32; 3],
    uv: [f32; 2],
}

impl PortalVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<PortalVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct PortalParamsUniform {
    model: [[f32; 4]; 4],
}

struct PortalRenderTarget {
    size: u32,
    _color_texture: wgpu::Texture,
    color_view: wgpu::TextureView,
    _depth_texture: wgpu::Texture,
    depth_view: wgpu::TextureView,
    sample_bind_group: wgpu::BindGroup,
}

/// Owns the square offscreen target the nested scene is drawn into and the
/// quad that shows it in the primary scene.
pub struct PortalRenderer {
    surface_pipeline: wgpu::RenderPipeline,
    portal_texture_bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    color_format: wgpu::TextureFormat,
    portal_params_buffer: wgpu::Buffer,
    portal_params_bind_group: wgpu::BindGroup,
    surface_vertex_buffer: wgpu::Buffer,
    surface_index_buffer: wgpu::Buffer,
    surface_index_count: u32,
    target: Option<PortalRenderTarget>,
}

impl PortalRenderer {
    pub fn new(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
        camera_bind_group_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let surface_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Portal Surface Shader"),
            source: wgpu::ShaderSource::Wgsl(
                include_str!(concat!(
                    env!("CARGO_MANIFEST_DIR"),
                    "/../../assets/shaders/portal_surface.wgsl"
                ))
                .into(),
            ),
        });

        let portal_texture_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Portal Texture Bind Group Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            multisampled: false,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });

        let portal_params_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Portal Params Bind Group Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Portal RTT Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let portal_params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Portal Params Buffer"),
            contents: bytemuck::bytes_of(&PortalParamsUniform {
                model: Mat4::IDENTITY.to_cols_array_2d(),
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let portal_params_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Portal Params Bind Group"),
            layout: &portal_params_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: portal_params_buffer.as_entire_binding(),
            }],
        });

        let surface_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Portal Surface Pipeline Layout"),
                bind_group_layouts: &[
                    camera_bind_group_layout,
                    &portal_texture_bind_group_layout,
                    &portal_params_bind_group_layout,
                ],
                push_constant_ranges: &[],
            });

        let surface_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Portal Surface Pipeline"),
            layout: Some(&surface_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &surface_shader,
                entry_point: Some("vs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[PortalVertex::desc()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &surface_shader,
                entry_point: Some("fs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: depth_format,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let surface_vertices = [
            PortalVertex {
                position: [-1.0, -1.0, 0.0],
                uv: [0.0, 1.0],
            },
            PortalVertex {
                position: [1.0, -1.0, 0.0],
                uv: [1.0, 1.0],
            },
            PortalVertex {
                position: [1.0, 1.0, 0.0],
                uv: [1.0, 0.0],
            },
            PortalVertex {
                position: [-1.0, 1.0, 0.0],
                uv: [0.0, 0.0],
            },
        ];
        let surface_indices: [u16; 6] = [0, 1, 2, 0, 2, 3];
        let surface_vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Portal Surface Vertex Buffer"),
            contents: bytemuck::cast_slice(&surface_vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let surface_index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Portal Surface Index Buffer"),
            contents: bytemuck::cast_slice(&surface_indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            surface_pipeline,
            portal_texture_bind_group_layout,
            sampler,
            color_format,
            portal_params_buffer,
            portal_params_bind_group,
            surface_vertex_buffer,
            surface_index_buffer,
            surface_index_count: surface_indices.len() as u32,
            target: None,
        }
    }

    /// Side of the square offscreen target, if one is allocated.
    pub fn target_size(&self) -> Option<u32> {
        self.target.as_ref().map(|target| target.size)
    }

    /// Allocates the offscreen target on first use, or reallocates it when
    /// `size` changes. Returns whether a new target was created.
    pub fn ensure_target(&mut self, device: &wgpu::Device, size: u32) -> bool {
        let size = size.max(1);
        if !needs_new_target(self.target_size(), size) {
            return false;
        }

        self.target = Some(create_target(
            device,
            size,
            self.color_format,
            &self.portal_texture_bind_group_layout,
            &self.sampler,
        ));
        true
    }

    pub fn release_target(&mut self) {
        self.target = None;
    }

    /// Hands the target's colour and depth views to `render_view`, which
    /// records the nested scene into them. Returns false when no target is
    /// allocated.
    pub fn render_portal_view<F>(&self, render_view: F) -> bool
    where
        F: FnOnce(&wgpu::TextureView, &wgpu::TextureView),
    {
        let Some(target) = self.target.as_ref() else {
            return false;
        };
        render_view(&target.color_view, &target.depth_view);
        true
    }

    pub fn render_portal_surface<'a>(
        &'a self,
        queue: &wgpu::Queue,
        render_pass: &mut wgpu::RenderPass<'a>,
        camera_bind_group: &'a wgpu::BindGroup,
        model: Mat4,
    ) -> u32 {
        let Some(target) = self.target.as_ref() else {
            return 0;
        };
        let params = PortalParamsUniform {
            model: model.to_cols_array_2d(),
        };
        queue.write_buffer(&self.portal_params_buffer, 0, bytemuck::bytes_of(&params));

        render_pass.set_pipeline(&self.surface_pipeline);
        render_pass.set_bind_group(0, camera_bind_group, &[]);
        render_pass.set_bind_group(1, &target.sample_bind_group, &[]);
        render_pass.set_bind_group(2, &self.portal_params_bind_group, &[]);
        render_pass.set_vertex_buffer(0, self.surface_vertex_buffer.slice(..));
        render_pass.set_index_buffer(
            self.surface_index_buffer.slice(..),
            wgpu::IndexFormat::Uint16,
        );
        render_pass.draw_indexed(0..self.surface_index_count, 0, 0..1);
        1
    }
}

fn needs_new_target(current: Option<u32>, requested: u32) -> bool {
    current != Some(requested)
}

fn create_target(
    device: &wgpu::Device,
    size: u32,
    color_format: wgpu::TextureFormat,
    portal_texture_bind_group_layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
) -> PortalRenderTarget {
    let extent = wgpu::Extent3d {
        width: size,
        height: size,
        depth_or_array_layers: 1,
    };

    let color_texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Portal RTT Color Texture"),
        size: extent,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: color_format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let color_view = color_texture.create_view(&wgpu::TextureViewDescriptor::default());

    let depth_texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Portal RTT Depth Texture"),
        size: extent,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: PORTAL_DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let depth_view = depth_texture.create_view(&wgpu::TextureViewDescriptor::default());

    let sample_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Portal RTT Sample Bind Group"),
        layout: portal_texture_bind_group_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&color_view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    });

    PortalRenderTarget {
        size,
        _color_texture: color_texture,
        color_view,
        _depth_texture: depth_texture,
        depth_view,
        sample_bind_group,
    }
}

#[cfg(test)]
mod tests {
    use super::needs_new_target;

    #[test]
    fn target_is_allocated_lazily_and_only_on_size_change() {
        assert!(needs_new_target(None, 1024));
        assert!(!needs_new_target(Some(1024), 1024));
        assert!(needs_new_target(Some(1024), 512));
    }
}
