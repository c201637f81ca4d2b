use vitrine_shared::geometry::Mesh;
use vitrine_shared::stroke::StrokeUniform;
use wgpu::util::DeviceExt;

use crate::renderer::mesh::stroke_vertices;
use crate::renderer::pipeline::StrokePipeline;

struct ParticleInstance {
    params_buffer: wgpu::Buffer,
    params_bind_group: wgpu::BindGroup,
}

/// Draws every enclosure body with the stroke shader. One uniform block per
/// body; the shared mesh is uploaded once.
#[derive(Default)]
pub struct ParticleRenderer {
    vertex_buffer: Option<wgpu::Buffer>,
    vertex_count: u32,
    instances: Vec<ParticleInstance>,
    visible_instances: usize,
}

impl ParticleRenderer {
    pub fn has_mesh(&self) -> bool {
        self.vertex_buffer.is_some()
    }

    pub fn upload_mesh(&mut self, device: &wgpu::Device, mesh: &Mesh) {
        let vertices = stroke_vertices(mesh);
        if vertices.is_empty() {
            self.vertex_buffer = None;
            self.vertex_count = 0;
            return;
        }

        self.vertex_buffer = Some(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Vertex Buffer"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        }));
        self.vertex_count = vertices.len() as u32;
    }

    pub fn update(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pipeline: &StrokePipeline,
        uniforms: &[StrokeUniform],
    ) {
        while self.instances.len() < uniforms.len() {
            let index = self.instances.len();
            let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("Particle Params Buffer {index}")),
                size: std::mem::size_of::<StrokeUniform>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let params_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("Particle Params Bind Group {index}")),
                layout: &pipeline.stroke_params_bind_group_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                }],
            });
            self.instances.push(ParticleInstance {
                params_buffer,
                params_bind_group,
            });
        }

        for (instance, uniform) in self.instances.iter().zip(uniforms) {
            queue.write_buffer(&instance.params_buffer, 0, bytemuck::bytes_of(uniform));
        }
        self.visible_instances = uniforms.len();
    }

    pub fn clear(&mut self) {
        self.visible_instances = 0;
    }

    /// Returns the number of draw calls issued.
    pub fn render(
        &self,
        render_pass: &mut wgpu::RenderPass<'_>,
        pipeline: &StrokePipeline,
        camera_bind_group: &wgpu::BindGroup,
    ) -> u32 {
        let Some(vertex_buffer) = self.vertex_buffer.as_ref() else {
            return 0;
        };
        if self.visible_instances == 0 {
            return 0;
        }

        render_pass.set_pipeline(pipeline.pipeline());
        render_pass.set_bind_group(0, camera_bind_group, &[]);
        render_pass.set_vertex_buffer(0, vertex_buffer.slice(..));

        let mut draw_calls = 0;
        for instance in &self.instances[..self.visible_instances] {
            render_pass.set_bind_group(1, &instance.params_bind_group, &[]);
            render_pass.draw(0..self.vertex_count, 0..1);
            draw_calls += 1;
        }
        draw_calls
    }
}
