//! Parameters of the stroke/fill/dash line-art surface shader and a CPU
//! evaluation of the same colour function.
//!
//! The GPU version lives in `assets/shaders/stroke.wgsl`; the two must stay in
//! step. The uniform layout below is shared with that file.

use std::f32::consts::PI;

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};
use serde::{Deserialize, Serialize};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct StrokeFlags: u32 {
        const NOISE_A = 1 << 0;
        const NOISE_B = 1 << 1;
        const DUAL_STROKE = 1 << 2;
        const SEE_THROUGH = 1 << 3;
        const INSIDE_ALT_COLOR = 1 << 4;
        const DASH_ENABLED = 1 << 5;
        const DASH_OVERLAP = 1 << 6;
        const DASH_ANIMATE = 1 << 7;
        const SQUEEZE = 1 << 8;
    }
}

const DASH_ANIMATE_SPEED: f32 = 0.22;
const NOISE_A_SCALE: f32 = 1.0;
const NOISE_A_SPEED: f32 = 0.35;
const NOISE_A_AMOUNT: f32 = 0.15;
const NOISE_B_SCALE: f32 = 80.0;
const NOISE_B_SPEED: f32 = 0.5;
const NOISE_B_AMOUNT: f32 = 0.12;

/// Flat configuration map of the shader. Field names match the `[stroke]`
/// table of the settings file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrokeStyle {
    pub fill: [f32; 3],
    pub stroke: [f32; 3],
    pub noise_a: bool,
    pub noise_b: bool,
    pub dual_stroke: bool,
    pub see_through: bool,
    pub inside_alt_color: bool,
    pub thickness: f32,
    pub second_thickness: f32,
    pub dash_enabled: bool,
    pub dash_repeats: f32,
    pub dash_length: f32,
    pub dash_overlap: bool,
    pub dash_animate: bool,
    pub squeeze: bool,
    pub squeeze_min: f32,
    pub squeeze_max: f32,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            fill: hex_rgb(0xa7f000),
            stroke: hex_rgb(0xf2003c),
            noise_a: false,
            noise_b: false,
            dual_stroke: false,
            see_through: true,
            inside_alt_color: true,
            thickness: 0.2,
            second_thickness: 0.5,
            dash_enabled: true,
            dash_repeats: 10.0,
            dash_length: 0.5,
            dash_overlap: false,
            dash_animate: false,
            squeeze: true,
            squeeze_min: 0.3,
            squeeze_max: 1.0,
        }
    }
}

impl StrokeStyle {
    pub fn sanitize(mut self) -> Self {
        self.fill = self.fill.map(|c| c.clamp(0.0, 1.0));
        self.stroke = self.stroke.map(|c| c.clamp(0.0, 1.0));
        self.thickness = self.thickness.clamp(0.0, 1.0);
        self.second_thickness = self.second_thickness.clamp(0.0, 1.0);
        self.dash_repeats = self.dash_repeats.clamp(1.0, 256.0);
        self.dash_length = self.dash_length.clamp(0.0, 1.0);
        self.squeeze_min = self.squeeze_min.clamp(0.0, 4.0);
        self.squeeze_max = self.squeeze_max.clamp(0.0, 4.0);
        self
    }

    pub fn flags(&self) -> StrokeFlags {
        let mut flags = StrokeFlags::empty();
        flags.set(StrokeFlags::NOISE_A, self.noise_a);
        flags.set(StrokeFlags::NOISE_B, self.noise_b);
        flags.set(StrokeFlags::DUAL_STROKE, self.dual_stroke);
        flags.set(StrokeFlags::SEE_THROUGH, self.see_through);
        flags.set(StrokeFlags::INSIDE_ALT_COLOR, self.inside_alt_color);
        flags.set(StrokeFlags::DASH_ENABLED, self.dash_enabled);
        flags.set(StrokeFlags::DASH_OVERLAP, self.dash_overlap);
        flags.set(StrokeFlags::DASH_ANIMATE, self.dash_animate);
        flags.set(StrokeFlags::SQUEEZE, self.squeeze);
        flags
    }

    pub fn uniform(&self, model: Mat4, time: f32) -> StrokeUniform {
        StrokeUniform {
            model: model.to_cols_array_2d(),
            fill: [self.fill[0], self.fill[1], self.fill[2], 1.0],
            stroke: [self.stroke[0], self.stroke[1], self.stroke[2], 1.0],
            time,
            thickness: self.thickness,
            second_thickness: self.second_thickness,
            dash_repeats: self.dash_repeats,
            dash_length: self.dash_length,
            squeeze_min: self.squeeze_min,
            squeeze_max: self.squeeze_max,
            flags: self.flags().bits(),
        }
    }
}

/// Per-instance uniform block, laid out as `StrokeParams` in `stroke.wgsl`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct StrokeUniform {
    pub model: [[f32; 4]; 4],
    pub fill: [f32; 4],
    pub stroke: [f32; 4],
    pub time: f32,
    pub thickness: f32,
    pub second_thickness: f32,
    pub dash_repeats: f32,
    pub dash_length: f32,
    pub squeeze_min: f32,
    pub squeeze_max: f32,
    pub flags: u32,
}

pub fn hex_rgb(hex: u32) -> [f32; 3] {
    [
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    ]
}

/// One fragment's inputs. `edge_width` is the screen-space derivative width
/// of the edge distance (`fwidth` on the GPU).
#[derive(Debug, Clone, Copy)]
pub struct StrokeFragment {
    pub barycentric: Vec3,
    pub position: Vec3,
    pub front_facing: bool,
    pub edge_width: f32,
}

pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Anti-aliased step: a smoothstep across one derivative width centred on
/// `threshold`. Falls back to a hard step when the width is zero.
pub fn aastep(threshold: f32, value: f32, width: f32) -> f32 {
    let half = width * 0.5;
    if half <= 0.0 {
        return if value < threshold { 0.0 } else { 1.0 };
    }
    smoothstep(threshold - half, threshold + half, value)
}

/// Lattice value noise in [-1, 1]. Mirrors `value_noise` in the shader.
pub fn value_noise(p: Vec3) -> f32 {
    let cell = p.floor();
    let f = p - cell;
    let u = f * f * (Vec3::splat(3.0) - 2.0 * f);

    let corner = |offset: Vec3| hash31(cell + offset);
    let x00 = lerp(corner(Vec3::new(0.0, 0.0, 0.0)), corner(Vec3::new(1.0, 0.0, 0.0)), u.x);
    let x10 = lerp(corner(Vec3::new(0.0, 1.0, 0.0)), corner(Vec3::new(1.0, 1.0, 0.0)), u.x);
    let x01 = lerp(corner(Vec3::new(0.0, 0.0, 1.0)), corner(Vec3::new(1.0, 0.0, 1.0)), u.x);
    let x11 = lerp(corner(Vec3::new(0.0, 1.0, 1.0)), corner(Vec3::new(1.0, 1.0, 1.0)), u.x);
    let y0 = lerp(x00, x10, u.y);
    let y1 = lerp(x01, x11, u.y);
    lerp(y0, y1, u.z) * 2.0 - 1.0
}

fn hash31(p: Vec3) -> f32 {
    let h = p.dot(Vec3::new(127.1, 311.7, 74.7)).sin() * 43_758.547;
    h - h.floor()
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Evaluates the stroke shader for one fragment. Returns straight RGBA.
pub fn shade(style: &StrokeStyle, fragment: &StrokeFragment, time: f32) -> Vec4 {
    let bary = fragment.barycentric;
    let mut distance = bary.x.min(bary.y).min(bary.z);

    if style.noise_a {
        let p = fragment.position * NOISE_A_SCALE + Vec3::splat(time * NOISE_A_SPEED);
        distance += value_noise(p) * NOISE_A_AMOUNT;
    }
    if style.noise_b {
        let p = fragment.position * NOISE_B_SCALE + Vec3::splat(time * NOISE_B_SPEED);
        distance += value_noise(p) * NOISE_B_AMOUNT;
    }

    let mut along = bary.x.max(bary.y);
    if bary.y < bary.x && bary.y < bary.z {
        along = 1.0 - along;
    }

    let mut thickness = style.thickness;
    if style.squeeze {
        let falloff = 1.0 - (along * PI).sin();
        thickness *= lerp(style.squeeze_min, style.squeeze_max, falloff);
    }

    if style.dash_enabled {
        let repeats = style.dash_repeats.max(1.0);
        let mut offset = 1.0 / repeats * style.dash_length / 2.0;
        if !style.dash_overlap {
            offset += 1.0 / repeats / 2.0;
        }
        if style.dash_animate {
            offset += time * DASH_ANIMATE_SPEED;
        }
        let pattern = ((along + offset) * repeats).rem_euclid(1.0);
        thickness *= 1.0 - aastep(style.dash_length, pattern, fragment.edge_width);
    }

    let edge = 1.0 - aastep(thickness, distance, fragment.edge_width);
    let fill = Vec3::from_array(style.fill);
    let stroke = Vec3::from_array(style.stroke);

    if style.see_through {
        let rgb = if style.inside_alt_color && !fragment.front_facing {
            fill
        } else {
            stroke
        };
        return rgb.extend(edge);
    }

    let rgb = if style.dual_stroke {
        let inner = 1.0 - aastep(style.second_thickness, distance, fragment.edge_width);
        fill.lerp(stroke, (inner - edge).abs())
    } else {
        fill.lerp(stroke, edge)
    };
    rgb.extend(1.0)
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::{aastep, hex_rgb, shade, value_noise, StrokeFlags, StrokeFragment, StrokeStyle};

    fn fragment(barycentric: Vec3, edge_width: f32) -> StrokeFragment {
        StrokeFragment {
            barycentric,
            position: Vec3::new(0.01, 0.02, 0.03),
            front_facing: true,
            edge_width,
        }
    }

    fn solid_style() -> StrokeStyle {
        StrokeStyle {
            see_through: false,
            dash_enabled: false,
            squeeze: false,
            ..StrokeStyle::default()
        }
    }

    #[test]
    fn default_style_matches_reference_uniforms() {
        let style = StrokeStyle::default();
        assert_eq!(style.fill, hex_rgb(0xa7f000));
        assert_eq!(style.stroke, hex_rgb(0xf2003c));
        assert!(style.see_through && style.inside_alt_color && style.dash_enabled);
        assert!(!style.noise_a && !style.noise_b && !style.dual_stroke);
        assert_eq!(style.dash_repeats, 10.0);

        let flags = style.flags();
        assert!(flags.contains(StrokeFlags::SEE_THROUGH | StrokeFlags::SQUEEZE));
        assert!(!flags.contains(StrokeFlags::DASH_ANIMATE));
    }

    #[test]
    fn aastep_softens_across_derivative_width() {
        assert_eq!(aastep(0.2, 0.0, 0.1), 0.0);
        assert_eq!(aastep(0.2, 0.4, 0.1), 1.0);
        let mid = aastep(0.2, 0.2, 0.1);
        assert!((mid - 0.5).abs() < 1e-6);
        let inside_band = aastep(0.2, 0.22, 0.1);
        assert!(inside_band > 0.5 && inside_band < 1.0);
    }

    #[test]
    fn transition_band_scales_with_edge_width() {
        let style = solid_style();
        let narrow = shade(&style, &fragment(Vec3::new(0.21, 0.39, 0.4), 0.01), 0.0);
        let wide = shade(&style, &fragment(Vec3::new(0.21, 0.39, 0.4), 0.2), 0.0);
        let stroke = Vec3::from_array(style.stroke);
        // Just outside the stroke: fully fill when sharp, partly stroke when wide.
        assert!((narrow.truncate() - Vec3::from_array(style.fill)).length() < 1e-4);
        assert!((wide.truncate() - stroke).length() < (narrow.truncate() - stroke).length());
    }

    #[test]
    fn edge_pixels_take_stroke_and_centre_takes_fill() {
        let style = solid_style();
        let edge = shade(&style, &fragment(Vec3::new(0.0, 0.5, 0.5), 0.01), 0.0);
        let centre = shade(&style, &fragment(Vec3::splat(1.0 / 3.0), 0.01), 0.0);
        assert!((edge.truncate() - Vec3::from_array(style.stroke)).length() < 1e-4);
        assert!((centre.truncate() - Vec3::from_array(style.fill)).length() < 1e-4);
        assert_eq!(edge.w, 1.0);
    }

    #[test]
    fn see_through_uses_alpha_and_inside_colour() {
        let style = StrokeStyle {
            dash_enabled: false,
            squeeze: false,
            ..StrokeStyle::default()
        };
        let mut back = fragment(Vec3::new(0.0, 0.5, 0.5), 0.01);
        back.front_facing = false;
        let colour = shade(&style, &back, 0.0);
        assert!((colour.truncate() - Vec3::from_array(style.fill)).length() < 1e-4);
        assert!((colour.w - 1.0).abs() < 1e-4);

        let centre = shade(&style, &fragment(Vec3::splat(1.0 / 3.0), 0.01), 0.0);
        assert!(centre.w < 1e-4);
    }

    #[test]
    fn shading_is_deterministic_and_dash_animation_depends_on_time() {
        let style = StrokeStyle {
            see_through: false,
            dash_animate: true,
            ..StrokeStyle::default()
        };
        let frag = fragment(Vec3::new(0.0, 0.3, 0.7), 0.02);
        assert_eq!(shade(&style, &frag, 1.25), shade(&style, &frag, 1.25));

        let samples: Vec<f32> = (0..8)
            .map(|i| shade(&style, &frag, i as f32 * 0.3).x)
            .collect();
        assert!(samples.iter().any(|v| (v - samples[0]).abs() > 1e-3));
    }

    #[test]
    fn value_noise_stays_in_range() {
        for i in 0..64 {
            let p = Vec3::new(i as f32 * 0.37, i as f32 * 0.11, -(i as f32) * 0.53);
            let n = value_noise(p);
            assert!((-1.0..=1.0).contains(&n));
        }
    }
}
