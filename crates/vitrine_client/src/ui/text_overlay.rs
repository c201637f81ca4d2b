use std::mem;

use bytemuck::{Pod, Zeroable};

const MAX_QUADS: usize = 8_000;
const MAX_VERTICES: usize = MAX_QUADS * 4;
const MAX_INDICES: usize = MAX_QUADS * 6;

const PANEL_MARGIN_PX: f32 = 10.0;
const PANEL_PADDING_PX: f32 = 8.0;
const STATS_PIXEL_SCALE: f32 = 2.0;
const LABEL_PIXEL_SCALE: f32 = 5.0;
const LINE_GAP_PX: f32 = 4.0;
const GLYPH_COLUMNS: f32 = 5.0;
const GLYPH_ROWS: f32 = 7.0;
const GLYPH_ADVANCE: f32 = 6.0;

const PANEL_BG_COLOR: [f32; 4] = [0.03, 0.03, 0.04, 0.7];
const STATS_TEXT_COLOR: [f32; 4] = [0.95, 0.95, 0.95, 1.0];
const LABEL_COLOR: [f32; 4] = [0.08, 0.08, 0.08, 1.0];

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct UiVertex {
    position: [f32; 2],
    color: [f32; 4],
}

/// Screen-space bitmap text: an optional centred label and an optional
/// stats panel in the top-left corner.
pub struct TextOverlayRenderer {
    pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

impl TextOverlayRenderer {
    pub fn new(device: &wgpu::Device, color_format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("UI Shader"),
            source: wgpu::ShaderSource::Wgsl(
                include_str!(concat!(
                    env!("CARGO_MANIFEST_DIR"),
                    "/../../assets/shaders/ui_simple.wgsl"
                ))
                .into(),
            ),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Text Overlay Pipeline Layout"),
            bind_group_layouts: &[],
            push_constant_ranges: &[],
        });

        let attributes = &[
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x2,
            },
            wgpu::VertexAttribute {
                offset: mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x4,
            },
        ];

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Text Overlay Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: mem::size_of::<UiVertex>() as wgpu::BufferAddress,
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
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
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
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Text Overlay Vertex Buffer"),
            size: (MAX_VERTICES * mem::size_of::<UiVertex>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let index_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Text Overlay Index Buffer"),
            size: (MAX_INDICES * mem::size_of::<u16>()) as u64,
            usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            pipeline,
            vertex_buffer,
            index_buffer,
            index_count: 0,
        }
    }

    pub fn update(
        &mut self,
        queue: &wgpu::Queue,
        width: u32,
        height: u32,
        label: Option<&str>,
        stats_lines: &[String],
    ) {
        let screen = Screen {
            width: width.max(1) as f32,
            height: height.max(1) as f32,
        };
        let mut vertices = Vec::with_capacity(4096);

        if let Some(label) = label {
            let (text_w, text_h) = text_size_px(&[label], LABEL_PIXEL_SCALE);
            let x = ((screen.width - text_w) * 0.5).max(0.0);
            let y = ((screen.height - text_h) * 0.5).max(0.0);
            push_text(&mut vertices, &screen, label, x, y, LABEL_PIXEL_SCALE, LABEL_COLOR);
        }

        if !stats_lines.is_empty() {
            let lines: Vec<&str> = stats_lines.iter().map(String::as_str).collect();
            let (text_w, text_h) = text_size_px(&lines, STATS_PIXEL_SCALE);
            push_quad(
                &mut vertices,
                &screen,
                PANEL_MARGIN_PX,
                PANEL_MARGIN_PX,
                text_w + PANEL_PADDING_PX * 2.0,
                text_h + PANEL_PADDING_PX * 2.0,
                PANEL_BG_COLOR,
            );

            let line_height = GLYPH_ROWS * STATS_PIXEL_SCALE + LINE_GAP_PX;
            let x = PANEL_MARGIN_PX + PANEL_PADDING_PX;
            let mut y = PANEL_MARGIN_PX + PANEL_PADDING_PX;
            for line in lines {
                push_text(&mut vertices, &screen, line, x, y, STATS_PIXEL_SCALE, STATS_TEXT_COLOR);
                y += line_height;
            }
        }

        vertices.truncate(MAX_VERTICES);
        let indices = quad_indices(vertices.len() / 4);
        self.index_count = indices.len() as u32;

        if !vertices.is_empty() {
            queue.write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(&vertices));
            queue.write_buffer(&self.index_buffer, 0, bytemuck::cast_slice(&indices));
        }
    }

    pub fn render(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        if self.index_count == 0 {
            return;
        }

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
        render_pass.draw_indexed(0..self.index_count, 0, 0..1);
    }
}

struct Screen {
    width: f32,
    height: f32,
}

impl Screen {
    fn to_ndc(&self, x_px: f32, y_px: f32) -> [f32; 2] {
        [(x_px / self.width) * 2.0 - 1.0, 1.0 - (y_px / self.height) * 2.0]
    }
}

fn quad_indices(quad_count: usize) -> Vec<u16> {
    (0..quad_count)
        .flat_map(|quad| {
            let base = (quad * 4) as u16;
            [base, base + 1, base + 2, base, base + 2, base + 3]
        })
        .collect()
}

/// Width and height in pixels of a block of lines at `scale`.
fn text_size_px(lines: &[&str], scale: f32) -> (f32, f32) {
    let longest = lines.iter().map(|line| line.chars().count()).max().unwrap_or(0);
    if longest == 0 {
        return (0.0, 0.0);
    }
    let width = longest as f32 * GLYPH_ADVANCE * scale - scale;
    let height = lines.len() as f32 * (GLYPH_ROWS * scale + LINE_GAP_PX) - LINE_GAP_PX;
    (width, height)
}

fn push_quad(
    vertices: &mut Vec<UiVertex>,
    screen: &Screen,
    x_px: f32,
    y_px: f32,
    w_px: f32,
    h_px: f32,
    color: [f32; 4],
) {
    let [x0, y0] = screen.to_ndc(x_px, y_px);
    let [x1, y1] = screen.to_ndc(x_px + w_px, y_px + h_px);

    vertices.extend_from_slice(&[
        UiVertex {
            position: [x0, y1],
            color,
        },
        UiVertex {
            position: [x1, y1],
            color,
        },
        UiVertex {
            position: [x1, y0],
            color,
        },
        UiVertex {
            position: [x0, y0],
            color,
        },
    ]);
}

fn push_text(
    vertices: &mut Vec<UiVertex>,
    screen: &Screen,
    text: &str,
    origin_x_px: f32,
    origin_y_px: f32,
    scale: f32,
    color: [f32; 4],
) {
    for (index, ch) in text.chars().enumerate() {
        let Some(rows) = glyph(ch.to_ascii_uppercase()) else {
            continue;
        };
        let x_px = origin_x_px + index as f32 * GLYPH_ADVANCE * scale;

        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_COLUMNS as usize {
                if bits & (0x10 >> col) == 0 {
                    continue;
                }
                push_quad(
                    vertices,
                    screen,
                    x_px + col as f32 * scale,
                    origin_y_px + row as f32 * scale,
                    scale,
                    scale,
                    color,
                );
            }
        }
    }
}

/// 5x7 glyph rows, most significant of the low five bits on the left.
const GLYPHS: &[(char, [u8; 7])] = &[
    ('A', [0x04, 0x0A, 0x11, 0x1F, 0x11, 0x11, 0x11]),
    ('B', [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E]),
    ('C', [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E]),
    ('D', [0x1C, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1C]),
    ('E', [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F]),
    ('F', [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10]),
    ('G', [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F]),
    ('H', [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11]),
    ('I', [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E]),
    ('J', [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C]),
    ('K', [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11]),
    ('L', [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F]),
    ('M', [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11]),
    ('N', [0x11, 0x19, 0x15, 0x13, 0x11, 0x11, 0x11]),
    ('O', [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E]),
    ('P', [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10]),
    ('Q', [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D]),
    ('R', [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11]),
    ('S', [0x0E, 0x11, 0x10, 0x0E, 0x01, 0x11, 0x0E]),
    ('T', [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04]),
    ('U', [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E]),
    ('V', [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04]),
    ('W', [0x11, 0x11, 0x11, 0x15, 0x15, 0x1B, 0x11]),
    ('X', [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11]),
    ('Y', [0x11, 0x11, 0x0A, 0x04, 0x04, 0x04, 0x04]),
    ('Z', [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F]),
    ('0', [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E]),
    ('1', [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E]),
    ('2', [0x0E, 0x11, 0x01, 0x06, 0x08, 0x10, 0x1F]),
    ('3', [0x0E, 0x11, 0x01, 0x06, 0x01, 0x11, 0x0E]),
    ('4', [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02]),
    ('5', [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E]),
    ('6', [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E]),
    ('7', [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08]),
    ('8', [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E]),
    ('9', [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C]),
    ('.', [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C]),
    (':', [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00]),
    ('-', [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00]),
    ('/', [0x01, 0x01, 0x02, 0x04, 0x08, 0x10, 0x10]),
    ('=', [0x00, 0x00, 0x1F, 0x00, 0x1F, 0x00, 0x00]),
    ('|', [0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04]),
];

fn glyph(ch: char) -> Option<&'static [u8; 7]> {
    GLYPHS
        .iter()
        .find(|(glyph_char, _)| *glyph_char == ch)
        .map(|(_, rows)| rows)
}

#[cfg(test)]
mod tests {
    use super::{glyph, quad_indices, text_size_px, GLYPH_ADVANCE};

    #[test]
    fn label_characters_have_glyphs() {
        for ch in "CLICK HERE".chars().filter(|ch| *ch != ' ') {
            assert!(glyph(ch).is_some(), "missing glyph for {ch:?}");
        }
        assert!(glyph(' ').is_none());
    }

    #[test]
    fn text_size_accounts_for_trailing_column() {
        let (width, height) = text_size_px(&["AB"], 2.0);
        assert_eq!(width, 2.0 * GLYPH_ADVANCE * 2.0 - 2.0);
        assert_eq!(height, 14.0);
        assert_eq!(text_size_px(&[], 2.0), (0.0, 0.0));
    }

    #[test]
    fn quads_index_two_triangles_each() {
        assert_eq!(quad_indices(2), vec![0, 1, 2, 0, 2, 3, 4, 5, 6, 4, 6, 7]);
    }
}
