use std::mem;

use bytemuck::{Pod, Zeroable};
use vitrine_shared::geometry::{EdgeRemoval, Mesh};

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct StrokeVertex {
    pub position: [f32; 3],
    pub barycentric: [f32; 3],
}

impl StrokeVertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<StrokeVertex>() as wgpu::BufferAddress,
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
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Interleaves a mesh for the stroke pipeline. Meshes that are still indexed
/// or untagged go through the preprocessor first.
pub fn stroke_vertices(mesh: &Mesh) -> Vec<StrokeVertex> {
    let prepared;
    let mesh = if mesh.is_indexed() || mesh.barycentric.is_none() {
        let mut copy = mesh.clone();
        copy.tag_barycentric(EdgeRemoval::Off);
        prepared = copy;
        &prepared
    } else {
        mesh
    };

    let barycentric = mesh.barycentric.as_deref().unwrap_or_default();
    mesh.positions
        .iter()
        .zip(barycentric)
        .map(|(position, barycentric)| StrokeVertex {
            position: position.to_array(),
            barycentric: *barycentric,
        })
        .collect()
}
