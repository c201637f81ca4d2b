use std::mem;

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use wgpu::util::DeviceExt;

/// Box segments along x, y and z.
pub const CAGE_SEGMENTS: [u32; 3] = [8, 8, 32];
/// Centre of the unit cage relative to the enclosure origin.
pub const CAGE_CENTER: Vec3 = Vec3::new(0.0, 0.0, 0.5);

const CAGE_SHADER: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../assets/shaders/cage_lines.wgsl"
));

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct CageVertex {
    position: [f32; 3],
}

/// Triangulated wireframe of a unit box, minus the face towards the viewer.
/// Each grid cell contributes its diagonal as well.
pub fn cage_lines(center: Vec3, segments: [u32; 3]) -> Vec<[Vec3; 2]> {
    let [sx, sy, sz] = segments.map(|s| s.max(1));
    let min = center - Vec3::splat(0.5);
    let mut lines = Vec::new();

    // -x and +x walls span z by y.
    for x in [0.0, 1.0] {
        grid_face(&mut lines, min + Vec3::new(x, 0.0, 0.0), Vec3::Z, Vec3::Y, sz, sy);
    }
    // -y and +y walls span x by z.
    for y in [0.0, 1.0] {
        grid_face(&mut lines, min + Vec3::new(0.0, y, 0.0), Vec3::X, Vec3::Z, sx, sz);
    }
    // Back wall only.
    grid_face(&mut lines, min, Vec3::X, Vec3::Y, sx, sy);

    lines
}

fn grid_face(lines: &mut Vec<[Vec3; 2]>, origin: Vec3, u: Vec3, v: Vec3, nu: u32, nv: u32) {
    let point = |i: u32, j: u32| origin + u * (i as f32 / nu as f32) + v * (j as f32 / nv as f32);

    for i in 0..=nu {
        lines.push([point(i, 0), point(i, nv)]);
    }
    for j in 0..=nv {
        lines.push([point(0, j), point(nu, j)]);
    }
    for i in 0..nu {
        for j in 0..nv {
            lines.push([point(i + 1, j), point(i, j + 1)]);
        }
    }
}

pub struct CageRenderer {
    pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    vertex_count: u32,
}

impl CageRenderer {
    pub fn new(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
        camera_bind_group_layout: &wgpu::BindGroupLayout,
        enclosure_offset: Vec3,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Cage Line Shader"),
            source: wgpu::ShaderSource::Wgsl(CAGE_SHADER.into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Cage Pipeline Layout"),
            bind_group_layouts: &[camera_bind_group_layout],
            push_constant_ranges: &[],
        });

        let attributes = &[wgpu::VertexAttribute {
            offset: 0,
            shader_location: 0,
            format: wgpu::VertexFormat::Float32x3,
        }];

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Cage Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: mem::size_of::<CageVertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes,
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::LineList,
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
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let vertices: Vec<CageVertex> = cage_lines(enclosure_offset + CAGE_CENTER, CAGE_SEGMENTS)
            .into_iter()
            .flatten()
            .map(|point| CageVertex {
                position: point.to_array(),
            })
            .collect();
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Cage Vertex Buffer"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        Self {
            pipeline,
            vertex_buffer,
            vertex_count: vertices.len() as u32,
        }
    }

    pub fn render(
        &self,
        render_pass: &mut wgpu::RenderPass<'_>,
        camera_bind_group: &wgpu::BindGroup,
    ) -> u32 {
        if self.vertex_count == 0 {
            return 0;
        }

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, camera_bind_group, &[]);
        render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        render_pass.draw(0..self.vertex_count, 0..1);
        1
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::{cage_lines, CAGE_CENTER, CAGE_SEGMENTS, CAGE_SHADER};

    #[test]
    fn five_faces_with_diagonals() {
        let lines = cage_lines(CAGE_CENTER, CAGE_SEGMENTS);
        let side = (32 + 1) + (8 + 1) + 32 * 8;
        let back = (8 + 1) + (8 + 1) + 8 * 8;
        assert_eq!(lines.len(), 4 * side + back);
    }

    #[test]
    fn front_face_is_open() {
        let lines = cage_lines(Vec3::new(0.0, 0.0, 0.5), CAGE_SEGMENTS);
        let front_interior = lines.iter().any(|[a, b]| {
            let on_front = (a.z - 1.0).abs() < 1e-6 && (b.z - 1.0).abs() < 1e-6;
            let crosses = (a.x - b.x).abs() > 1e-6 && (a.y - b.y).abs() > 1e-6;
            let interior = [a, b].iter().any(|p| p.x.abs() < 0.49 && p.y.abs() < 0.49);
            on_front && (crosses || interior)
        });
        assert!(!front_interior);

        let back_lines = lines
            .iter()
            .filter(|[a, b]| a.z.abs() < 1e-6 && b.z.abs() < 1e-6)
            .count();
        assert!(back_lines >= 82);
    }

    #[test]
    fn fog_ramps_linearly_with_distance() {
        assert!(!CAGE_SHADER.contains("smoothstep"));
        assert!(CAGE_SHADER
            .contains("(depth - camera.fog_start) / (camera.fog_end - camera.fog_start)"));
    }
}
