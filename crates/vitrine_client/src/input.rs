use glam::Vec2;
use vitrine_shared::interaction::OrientationSample;

/// Pointer state gathered between frames.
#[derive(Debug, Default)]
pub struct InputState {
    /// Cursor position in normalised window coordinates: x right, y down,
    /// both in [-1, 1]. `None` until the cursor first enters the window.
    cursor: Option<Vec2>,
    pending_click: Option<Vec2>,
}

impl InputState {
    pub fn set_cursor_position(&mut self, x: f64, y: f64, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }

        let normalized = Vec2::new(
            (x / width as f64 * 2.0 - 1.0) as f32,
            (y / height as f64 * 2.0 - 1.0) as f32,
        );
        self.cursor = Some(normalized.clamp(Vec2::splat(-1.0), Vec2::splat(1.0)));
    }

    pub fn clear_cursor(&mut self) {
        self.cursor = None;
    }

    /// Records a primary click at the current cursor position.
    pub fn press_primary(&mut self) {
        if let Some(cursor) = self.cursor {
            self.pending_click = Some(Vec2::new(cursor.x, -cursor.y));
        }
    }

    /// The click since the last call, in normalised device coordinates
    /// (y up).
    pub fn consume_click(&mut self) -> Option<Vec2> {
        self.pending_click.take()
    }

    /// The pointer stands in for the tilt sensor on desktop.
    pub fn orientation_sample(&self) -> Option<OrientationSample> {
        self.cursor.map(OrientationSample::from_pointer)
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::InputState;

    #[test]
    fn no_sample_before_cursor_moves() {
        let mut input = InputState::default();
        assert!(input.orientation_sample().is_none());
        input.press_primary();
        assert!(input.consume_click().is_none());
    }

    #[test]
    fn cursor_normalises_to_window() {
        let mut input = InputState::default();
        input.set_cursor_position(0.0, 600.0, 800, 600);
        let sample = input.orientation_sample().unwrap();
        assert_eq!(sample.gamma, 45.0);
        assert_eq!(sample.beta, -45.0);
    }

    #[test]
    fn click_is_consumed_once_with_y_up() {
        let mut input = InputState::default();
        input.set_cursor_position(600.0, 150.0, 800, 600);
        input.press_primary();

        assert_eq!(input.consume_click(), Some(Vec2::new(0.5, 0.5)));
        assert_eq!(input.consume_click(), None);
    }

    #[test]
    fn zero_sized_window_is_ignored() {
        let mut input = InputState::default();
        input.set_cursor_position(10.0, 10.0, 0, 600);
        assert!(input.orientation_sample().is_none());
    }
}
