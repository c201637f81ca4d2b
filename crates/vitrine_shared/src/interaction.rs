//! Turns device tilt or pointer position into the two bounded input signals,
//! and tracks the one-shot click-to-enter activation.

use glam::{Vec2, Vec3};

/// Range the shared signals are clamped to on write, in degrees.
pub const LOOK_RANGE_DEGREES: f32 = 45.0;
/// Camera offset per degree of signal.
pub const LOOK_DEGREES_PER_UNIT: f32 = 90.0;
/// The confinement plane sees a much narrower slice of the same signal.
pub const PLANE_RANGE_DEGREES: f32 = 10.0;
pub const PLANE_DIVISOR: f32 = 120.0;
/// Degrees of tilt reported at the window edge when the pointer stands in
/// for the orientation sensor.
pub const POINTER_RANGE_DEGREES: f32 = 45.0;

/// One raw orientation reading: front-back tilt (`beta`) and left-right
/// tilt (`gamma`), in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationSample {
    pub beta: f32,
    pub gamma: f32,
}

impl OrientationSample {
    /// Treats a pointer position in normalised window coordinates
    /// (x right, y down, both in [-1, 1]) as a tilt reading.
    pub fn from_pointer(normalized: Vec2) -> Self {
        let normalized = normalized.clamp(Vec2::splat(-1.0), Vec2::splat(1.0));
        Self {
            beta: -normalized.y * POINTER_RANGE_DEGREES,
            gamma: -normalized.x * POINTER_RANGE_DEGREES,
        }
    }

    /// A zero or non-finite axis means the source has nothing yet.
    pub fn is_ready(&self) -> bool {
        self.beta.is_finite() && self.gamma.is_finite() && self.beta != 0.0 && self.gamma != 0.0
    }
}

/// The two shared scalars. Last writer wins; readers in the same frame see
/// the value written during that frame's input phase.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputSignals {
    pitch: f32,
    yaw: f32,
}

impl InputSignals {
    pub fn new(pitch: f32, yaw: f32) -> Self {
        Self {
            pitch: clamp_look(pitch),
            yaw: clamp_look(yaw),
        }
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    /// Applies a sample if it carries data. Returns whether anything changed
    /// hands; without data the previous values are held.
    pub fn apply(&mut self, sample: Option<OrientationSample>) -> bool {
        let Some(sample) = sample.filter(OrientationSample::is_ready) else {
            return false;
        };
        *self = Self::new(sample.beta, sample.gamma);
        true
    }

    /// Local XYZ Euler rotation of the rotatable confinement plane. Clamp
    /// first, then scale, so each component stays within ±10/120.
    pub fn plane_rotation(&self) -> Vec3 {
        Vec3::new(
            self.pitch.clamp(-PLANE_RANGE_DEGREES, PLANE_RANGE_DEGREES) / PLANE_DIVISOR,
            self.yaw.clamp(-PLANE_RANGE_DEGREES, PLANE_RANGE_DEGREES) / PLANE_DIVISOR,
            0.0,
        )
    }

    /// Viewer position for the look-around: slides across the portal and
    /// pulls closer the further it leans.
    pub fn look_position(&self) -> Vec3 {
        let x = -self.yaw / LOOK_DEGREES_PER_UNIT;
        let y = self.pitch / LOOK_DEGREES_PER_UNIT;
        let z = 1.0 - 0.5 * (x.abs() + y.abs()).min(1.0);
        Vec3::new(x, y, z)
    }
}

fn clamp_look(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(-LOOK_RANGE_DEGREES, LOOK_RANGE_DEGREES)
    } else {
        0.0
    }
}

/// Click-to-enter state. The only transition is Inactive to Active, once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Activation {
    #[default]
    Inactive,
    Active,
}

impl Activation {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Returns `true` only for the call that performs the transition.
    pub fn activate(&mut self) -> bool {
        match self {
            Self::Inactive => {
                *self = Self::Active;
                true
            }
            Self::Active => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::{Vec2, Vec3};

    use super::{
        Activation, InputSignals, OrientationSample, PLANE_DIVISOR, PLANE_RANGE_DEGREES,
    };

    #[test]
    fn activation_fires_once_and_never_reverts() {
        let mut state = Activation::default();
        assert!(!state.is_active());
        assert!(state.activate());
        assert!(state.is_active());
        assert!(!state.activate());
        assert!(state.is_active());
    }

    #[test]
    fn signals_clamp_to_look_range() {
        let signals = InputSignals::new(80.0, -200.0);
        assert_eq!(signals.pitch(), 45.0);
        assert_eq!(signals.yaw(), -45.0);
    }

    #[test]
    fn plane_rotation_is_bounded_for_any_input() {
        let bound = PLANE_RANGE_DEGREES / PLANE_DIVISOR;
        for raw in [-1.0e9, -720.0, -45.0, -10.0, -3.0, 0.5, 9.9, 10.0, 44.0, 1.0e9] {
            let rotation = InputSignals::new(raw, -raw).plane_rotation();
            assert!(rotation.x.abs() <= bound + f32::EPSILON);
            assert!(rotation.y.abs() <= bound + f32::EPSILON);
            assert_eq!(rotation.z, 0.0);
        }

        let small = InputSignals::new(6.0, -3.0).plane_rotation();
        assert!((small.x - 6.0 / 120.0).abs() < 1e-6);
        assert!((small.y + 3.0 / 120.0).abs() < 1e-6);
    }

    #[test]
    fn missing_sample_holds_previous_signals() {
        let mut signals = InputSignals::new(12.0, -8.0);
        assert!(!signals.apply(None));
        assert!(!signals.apply(Some(OrientationSample {
            beta: 0.0,
            gamma: 5.0
        })));
        assert_eq!(signals, InputSignals::new(12.0, -8.0));

        assert!(signals.apply(Some(OrientationSample {
            beta: 30.0,
            gamma: 60.0
        })));
        assert_eq!(signals.pitch(), 30.0);
        assert_eq!(signals.yaw(), 45.0);
    }

    #[test]
    fn look_position_pulls_viewer_in_when_leaning() {
        assert_eq!(
            InputSignals::new(0.0, 0.0).look_position(),
            Vec3::new(0.0, 0.0, 1.0)
        );

        let leaning = InputSignals::new(45.0, -45.0).look_position();
        assert!((leaning - Vec3::new(0.5, 0.5, 0.5)).length() < 1e-6);
    }

    #[test]
    fn pointer_maps_to_tilt_degrees() {
        let sample = OrientationSample::from_pointer(Vec2::new(1.0, -0.5));
        assert_eq!(sample.gamma, -45.0);
        assert_eq!(sample.beta, 22.5);

        let clamped = OrientationSample::from_pointer(Vec2::new(-3.0, 3.0));
        assert_eq!(clamped.gamma, 45.0);
        assert_eq!(clamped.beta, -45.0);
    }
}
