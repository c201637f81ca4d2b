use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::enclosure::EnclosureLayout;
use crate::stroke::StrokeStyle;

pub const SETTINGS_PATH: &str = "vitrine.toml";

const MIN_TARGET_RESOLUTION: u32 = 64;
const MAX_TARGET_RESOLUTION: u32 = 4096;
const MAX_PARTICLES: usize = 64;
const MIN_FOV: f32 = 20.0;
const MAX_FOV: f32 = 120.0;
const MIN_NEAR: f32 = 0.001;
const MAX_PIXEL_RATIO: f32 = 4.0;

#[derive(Debug)]
pub enum SettingsError {
    Io(io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to access settings file: {err}"),
            Self::Parse(err) => write!(f, "failed to deserialize settings: {err}"),
            Self::Serialize(err) => write!(f, "failed to serialize settings: {err}"),
        }
    }
}

impl std::error::Error for SettingsError {}

impl From<io::Error> for SettingsError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerSettings {
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub start_position: [f32; 3],
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            fov_degrees: 75.0,
            near: 0.1,
            far: 100.0,
            start_position: [0.0, 0.0, 1.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalSettings {
    pub near: f32,
    pub far: f32,
    pub target_resolution: u32,
}

impl Default for PortalSettings {
    fn default() -> Self {
        Self {
            near: 0.1,
            far: 100.0,
            target_resolution: 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnclosureSettings {
    pub gravity: [f32; 3],
    /// Offset of the whole enclosure behind the portal plane.
    pub offset: [f32; 3],
    pub step: f32,
    pub particle_count: usize,
    pub particle_mass: f32,
    pub particle_radius: f32,
    pub particle_start: [f32; 3],
    pub mesh_detail: u32,
    pub edge_removal: bool,
}

impl Default for EnclosureSettings {
    fn default() -> Self {
        Self {
            gravity: [0.0, 0.0, -30.0],
            offset: [0.0, 0.0, -0.15],
            step: 1.0 / 60.0,
            particle_count: 1,
            particle_mass: 1.0,
            particle_radius: 0.07,
            particle_start: [0.0, 0.0, 1.0],
            mesh_detail: 1,
            edge_removal: false,
        }
    }
}

impl EnclosureSettings {
    pub fn layout(&self) -> EnclosureLayout {
        EnclosureLayout {
            gravity: Vec3::from_array(self.gravity),
            step: self.step,
            particle_count: self.particle_count,
            particle_mass: self.particle_mass,
            particle_radius: self.particle_radius,
            particle_start: Vec3::from_array(self.particle_start),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub max_pixel_ratio: f32,
    pub show_stats: bool,
    pub fog_start: f32,
    pub fog_end: f32,
    pub clear_color: [f32; 3],
    pub ambient_intensity: f32,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            max_pixel_ratio: 2.0,
            show_stats: false,
            fog_start: 0.0,
            fog_end: 1.5,
            clear_color: [1.0, 1.0, 1.0],
            ambient_intensity: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VitrineSettings {
    pub viewer: ViewerSettings,
    pub portal: PortalSettings,
    pub enclosure: EnclosureSettings,
    pub stroke: StrokeStyle,
    pub display: DisplaySettings,
}

impl VitrineSettings {
    pub fn sanitize(mut self) -> Self {
        let viewer = &mut self.viewer;
        viewer.fov_degrees = finite_or(viewer.fov_degrees, 75.0).clamp(MIN_FOV, MAX_FOV);
        viewer.near = finite_or(viewer.near, 0.1).max(MIN_NEAR);
        viewer.far = finite_or(viewer.far, 100.0).max(viewer.near + 0.01);
        viewer.start_position = viewer.start_position.map(|v| finite_or(v, 0.0));

        let portal = &mut self.portal;
        portal.near = finite_or(portal.near, 0.1).max(MIN_NEAR);
        portal.far = finite_or(portal.far, 100.0).max(portal.near + 0.01);
        portal.target_resolution = portal
            .target_resolution
            .clamp(MIN_TARGET_RESOLUTION, MAX_TARGET_RESOLUTION);

        let enclosure = &mut self.enclosure;
        enclosure.gravity = enclosure.gravity.map(|v| finite_or(v, 0.0));
        enclosure.offset = enclosure.offset.map(|v| finite_or(v, 0.0));
        enclosure.step = finite_or(enclosure.step, 1.0 / 60.0).clamp(1.0 / 480.0, 1.0 / 15.0);
        enclosure.particle_count = enclosure.particle_count.clamp(1, MAX_PARTICLES);
        enclosure.particle_mass = finite_or(enclosure.particle_mass, 1.0).max(0.001);
        enclosure.particle_radius = finite_or(enclosure.particle_radius, 0.07).clamp(0.005, 0.25);
        enclosure.particle_start = enclosure.particle_start.map(|v| finite_or(v, 0.0));
        enclosure.mesh_detail = enclosure.mesh_detail.min(4);

        let display = &mut self.display;
        display.max_pixel_ratio = finite_or(display.max_pixel_ratio, 2.0).clamp(1.0, MAX_PIXEL_RATIO);
        display.fog_start = finite_or(display.fog_start, 0.0).max(0.0);
        display.fog_end = finite_or(display.fog_end, 1.5).max(display.fog_start + 0.01);
        display.clear_color = display.clear_color.map(|c| finite_or(c, 1.0).clamp(0.0, 1.0));
        display.ambient_intensity = finite_or(display.ambient_intensity, 1.0).clamp(0.0, 4.0);

        self.stroke = self.stroke.sanitize();
        self
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, SettingsError> {
        let parsed = toml::from_str::<Self>(contents).map_err(SettingsError::Parse)?;
        Ok(parsed.sanitize())
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let settings = self.clone().sanitize();
        let serialized = toml::to_string_pretty(&settings).map_err(SettingsError::Serialize)?;
        fs::write(path, serialized)?;
        Ok(())
    }
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::{SettingsError, VitrineSettings};

    #[test]
    fn empty_document_yields_defaults() {
        let settings = VitrineSettings::from_toml_str("").unwrap();
        assert_eq!(settings, VitrineSettings::default().sanitize());
        assert_eq!(settings.portal.target_resolution, 1024);
        assert_eq!(settings.enclosure.gravity, [0.0, 0.0, -30.0]);
        assert_eq!(settings.viewer.far, 100.0);
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let settings = VitrineSettings::from_toml_str(
            r#"
            [stroke]
            dash_enabled = false
            thickness = 0.35

            [enclosure]
            particle_count = 4
            "#,
        )
        .unwrap();

        assert!(!settings.stroke.dash_enabled);
        assert_eq!(settings.stroke.thickness, 0.35);
        assert!(settings.stroke.see_through);
        assert_eq!(settings.enclosure.particle_count, 4);
        assert_eq!(settings.enclosure.particle_radius, 0.07);
    }

    #[test]
    fn sanitize_clamps_out_of_range_values() {
        let settings = VitrineSettings::from_toml_str(
            r#"
            [portal]
            target_resolution = 100000
            near = -1.0
            far = 0.0

            [enclosure]
            particle_count = 0
            "#,
        )
        .unwrap();

        assert_eq!(settings.portal.target_resolution, 4096);
        assert!(settings.portal.near > 0.0);
        assert!(settings.portal.far > settings.portal.near);
        assert_eq!(settings.enclosure.particle_count, 1);
    }

    #[test]
    fn malformed_document_is_a_parse_error() {
        let err = VitrineSettings::from_toml_str("[portal\nnear = 1").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn saved_settings_load_back() {
        let path = std::env::temp_dir().join(format!("vitrine-settings-{}.toml", std::process::id()));
        let mut settings = VitrineSettings::default();
        settings.display.show_stats = true;
        settings.enclosure.particle_count = 3;
        settings.save(&path).unwrap();

        let loaded = VitrineSettings::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, settings.sanitize());
    }
}
