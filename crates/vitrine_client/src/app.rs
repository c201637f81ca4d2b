use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};
use vitrine_shared::rapier_solver::RapierSolver;
use vitrine_shared::scene::{pixel_ratio, FrameInput, Scene, AFFORDANCE_LABEL};
use vitrine_shared::settings::{SettingsError, VitrineSettings, SETTINGS_PATH};
use vitrine_shared::stroke::StrokeUniform;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::window::{Window, WindowId};

use crate::input::InputState;
use crate::renderer::{PortalFrame, Renderer};

const MAX_FRAME_DT: f32 = 0.1;
const FPS_SAMPLE_SECONDS: f32 = 0.5;
const IS_TOUCH_DEVICE: bool = cfg!(any(target_os = "android", target_os = "ios"));

fn load_or_create_settings(path: &Path) -> VitrineSettings {
    match VitrineSettings::load(path) {
        Ok(settings) => settings,
        Err(SettingsError::Io(err)) if err.kind() == io::ErrorKind::NotFound => {
            let settings = VitrineSettings::default();
            if let Err(save_err) = settings.save(path) {
                warn!(
                    "Failed to create default settings at {}: {save_err}",
                    path.display()
                );
            }
            settings
        }
        Err(err) => {
            warn!(
                "Failed to load settings from {}, using defaults: {err}",
                path.display()
            );
            VitrineSettings::default()
        }
    }
}

/// Surface size in pixels for a window, after the pixel-ratio policy.
fn surface_size(window: &Window, max_pixel_ratio: f32) -> PhysicalSize<u32> {
    let scale_factor = window.scale_factor();
    let logical = window.inner_size().to_logical::<f64>(scale_factor);
    let ratio = pixel_ratio(IS_TOUCH_DEVICE, scale_factor, max_pixel_ratio);
    PhysicalSize::new(
        (logical.width * ratio).round() as u32,
        (logical.height * ratio).round() as u32,
    )
}

fn aspect_of(size: PhysicalSize<u32>) -> Option<f32> {
    (size.width > 0 && size.height > 0).then(|| size.width as f32 / size.height as f32)
}

struct VitrineApp {
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    scene: Scene<RapierSolver>,
    input: InputState,
    surface_size: PhysicalSize<u32>,
    particle_uniforms: Vec<StrokeUniform>,
    last_frame: Option<Instant>,
    fps_sample_start: Option<Instant>,
    fps_frame_count: u32,
    fps: f32,
}

impl VitrineApp {
    fn new(settings: VitrineSettings) -> Self {
        Self {
            window: None,
            renderer: None,
            scene: Scene::new(settings, 16.0 / 9.0, Box::new(RapierSolver::default)),
            input: InputState::default(),
            surface_size: PhysicalSize::new(0, 0),
            particle_uniforms: Vec::new(),
            last_frame: None,
            fps_sample_start: None,
            fps_frame_count: 0,
            fps: 0.0,
        }
    }

    fn resize(&mut self) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        let size = surface_size(window, self.scene.settings().display.max_pixel_ratio);
        self.surface_size = size;
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.resize(size.width, size.height);
        }
        if let Some(aspect) = aspect_of(size) {
            self.scene.set_aspect(aspect);
        }
        debug!(width = size.width, height = size.height, "surface resized");
    }

    fn tick_fps(&mut self, now: Instant) {
        self.fps_frame_count += 1;
        let start = *self.fps_sample_start.get_or_insert(now);
        let elapsed = now.duration_since(start).as_secs_f32();
        if elapsed >= FPS_SAMPLE_SECONDS {
            self.fps = self.fps_frame_count as f32 / elapsed;
            self.fps_frame_count = 0;
            self.fps_sample_start = Some(now);
        }
    }

    fn stats_lines(&self) -> Vec<String> {
        let Some(renderer) = self.renderer.as_ref() else {
            return Vec::new();
        };
        let stats = renderer.last_frame_stats();
        let (width, height) = renderer.surface_size();
        let mut lines = vec![
            format!("FPS {:.0}", self.fps),
            format!("SURFACE {width}X{height}"),
            format!("DRAWS {}", stats.draw_calls()),
            format!("PORTAL PASSES {}", stats.portal_view_passes),
        ];
        if let Some(portal) = self.scene.active() {
            lines.push(format!("BODIES {}", portal.enclosure.bodies().len()));
            let signals = self.scene.signals();
            lines.push(format!(
                "PITCH {:.1} YAW {:.1}",
                signals.pitch(),
                signals.yaw()
            ));
        }
        lines
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        let dt = self
            .last_frame
            .map(|last| now.duration_since(last).as_secs_f32())
            .unwrap_or(0.0)
            .min(MAX_FRAME_DT);
        self.last_frame = Some(now);
        self.tick_fps(now);

        let frame_input = FrameInput {
            dt,
            aspect: aspect_of(self.surface_size).unwrap_or(self.scene.viewer().aspect),
            click: self.input.consume_click(),
            orientation: self.input.orientation_sample(),
        };
        self.scene.update(&frame_input);

        let stats_lines = if self.scene.settings().display.show_stats {
            self.stats_lines()
        } else {
            Vec::new()
        };
        let label = (!self.scene.is_active()).then_some(AFFORDANCE_LABEL);

        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };

        renderer.update_camera_uniform(self.scene.viewer());
        match self.scene.active() {
            Some(portal) => {
                self.particle_uniforms.clear();
                self.particle_uniforms
                    .extend(portal.particle_uniforms(&self.scene.settings().stroke));
                let secondary = portal.secondary_camera();
                renderer.update_portal(Some(PortalFrame {
                    view_proj: secondary.view_projection_matrix(),
                    camera_position: secondary.position,
                    plane_model: portal.plane.model_matrix(),
                    target_size: portal.projector.target_size(),
                    mesh: &portal.mesh,
                    particles: &self.particle_uniforms,
                }));
            }
            None => renderer.update_portal(None),
        }
        renderer.update_overlay(label, &stats_lines);

        match renderer.render_frame() {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => {
                renderer.resize(self.surface_size.width, self.surface_size.height);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                error!("Out of GPU memory; shutting down event loop");
                event_loop.exit();
            }
            Err(wgpu::SurfaceError::Timeout | wgpu::SurfaceError::Other) => {}
        }
    }
}

impl ApplicationHandler for VitrineApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes().with_title("Vitrine");
        match event_loop.create_window(attrs) {
            Ok(window) => {
                let window = Arc::new(window);
                let size = surface_size(&window, self.scene.settings().display.max_pixel_ratio);
                match Renderer::new(window.clone(), self.scene.settings(), size.width, size.height)
                {
                    Ok(renderer) => {
                        self.surface_size = size;
                        if let Some(aspect) = aspect_of(size) {
                            self.scene.set_aspect(aspect);
                        }
                        renderer.update_camera_uniform(self.scene.viewer());

                        info!("Window and renderer initialized");
                        self.window = Some(window);
                        self.renderer = Some(renderer);
                        let now = Instant::now();
                        self.last_frame = Some(now);
                        self.fps_sample_start = Some(now);
                    }
                    Err(err) => {
                        error!("failed to initialize renderer: {err}");
                        event_loop.exit();
                    }
                }
            }
            Err(err) => {
                error!("failed to create window: {err}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        if window.id() != window_id {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                event_loop.exit();
            }
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                self.resize();
            }
            WindowEvent::CursorMoved { position, .. } => {
                let size = window.inner_size();
                self.input
                    .set_cursor_position(position.x, position.y, size.width, size.height);
            }
            WindowEvent::CursorLeft { .. } => {
                self.input.clear_cursor();
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => {
                self.input.press_primary();
            }
            WindowEvent::RedrawRequested => {
                self.redraw(event_loop);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}

pub fn run() {
    let _ = tracing_subscriber::fmt().with_target(false).try_init();
    println!("Vitrine starting...");

    let settings = load_or_create_settings(Path::new(SETTINGS_PATH));

    let event_loop = match EventLoop::new() {
        Ok(loop_handle) => loop_handle,
        Err(err) => {
            eprintln!("Failed to create event loop: {err}");
            return;
        }
    };

    let mut app = VitrineApp::new(settings);
    if let Err(err) = event_loop.run_app(&mut app) {
        eprintln!("Event loop exited with error: {err}");
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use winit::dpi::PhysicalSize;

    use super::{aspect_of, load_or_create_settings};
    use vitrine_shared::settings::VitrineSettings;

    #[test]
    fn zero_sized_surface_has_no_aspect() {
        assert_eq!(aspect_of(PhysicalSize::new(0, 600)), None);
        assert_eq!(aspect_of(PhysicalSize::new(800, 400)), Some(2.0));
    }

    #[test]
    fn missing_settings_file_is_created_with_defaults() {
        let dir = std::env::temp_dir().join(format!("vitrine-settings-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("vitrine.toml");
        let _ = fs::remove_file(&path);

        let settings = load_or_create_settings(&path);
        assert_eq!(settings, VitrineSettings::default());
        assert!(path.exists());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn malformed_settings_fall_back_to_defaults() {
        let dir = std::env::temp_dir().join(format!("vitrine-bad-settings-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("vitrine.toml");
        fs::write(&path, "viewer = 3").unwrap();

        let settings = load_or_create_settings(&path);
        assert_eq!(settings, VitrineSettings::default());

        fs::remove_dir_all(&dir).unwrap();
    }
}
