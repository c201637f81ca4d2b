//! Scene composition root: the viewer camera, the click-to-enter affordance
//! and, once entered, the portal with its nested enclosure.
//!
//! [`Scene::update`] runs the whole per-frame order imperatively:
//! activation, input snapshot, camera look-around, physics, projector.

use glam::{Mat4, Vec2, Vec3};
use tracing::info;

use crate::camera::{Camera, Pose};
use crate::enclosure::{Enclosure, PhysicsSolver};
use crate::geometry::{particle_mesh, EdgeRemoval, Mesh};
use crate::interaction::{Activation, InputSignals, OrientationSample};
use crate::projection::{PortalExtents, PortalPlane, PortalProjector, SecondaryCamera};
use crate::settings::VitrineSettings;
use crate::stroke::{StrokeStyle, StrokeUniform};

/// Half-size of the invisible click target in front of the viewer.
pub const AFFORDANCE_HALF_SIZE: f32 = 0.5;
pub const AFFORDANCE_LABEL: &str = "Click Here";

/// Device pixel ratio to render at: the device's own ratio, capped, on touch
/// form factors; 1 elsewhere.
pub fn pixel_ratio(is_touch: bool, device_ratio: f64, max_ratio: f32) -> f64 {
    if !is_touch || !device_ratio.is_finite() || device_ratio <= 0.0 {
        return 1.0;
    }
    device_ratio.min(max_ratio as f64)
}

/// Whether a click at `ndc` lands on the unit affordance plane at the origin.
pub fn affordance_hit(camera: &Camera, ndc: Vec2) -> bool {
    let (origin, direction) = camera.pick_ray(ndc);
    if direction.z.abs() < 1e-6 {
        return false;
    }

    let t = -origin.z / direction.z;
    if t < 0.0 {
        return false;
    }

    let hit = origin + direction * t;
    hit.x.abs() <= AFFORDANCE_HALF_SIZE && hit.y.abs() <= AFFORDANCE_HALF_SIZE
}

/// Everything gathered for one frame before the scene advances.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameInput {
    pub dt: f32,
    pub aspect: f32,
    /// Primary click position in normalised device coordinates, if any.
    pub click: Option<Vec2>,
    pub orientation: Option<OrientationSample>,
}

/// State that exists only after activation.
pub struct ActivePortal<S> {
    pub plane: PortalPlane,
    pub projector: PortalProjector,
    pub enclosure: Enclosure<S>,
    pub mesh: Mesh,
    pub enclosure_offset: Vec3,
    pub time: f32,
}

impl<S: PhysicsSolver> ActivePortal<S> {
    fn new(settings: &VitrineSettings, extents: PortalExtents, solver: S) -> Self {
        let enclosure_settings = &settings.enclosure;
        let edge_removal = if enclosure_settings.edge_removal {
            EdgeRemoval::OppositeFirstCorner
        } else {
            EdgeRemoval::Off
        };

        Self {
            plane: PortalPlane::new(Pose::IDENTITY, extents),
            projector: PortalProjector::new(
                settings.portal.near,
                settings.portal.far,
                settings.portal.target_resolution,
            ),
            enclosure: Enclosure::build(solver, extents, enclosure_settings.layout()),
            mesh: particle_mesh(
                enclosure_settings.particle_radius,
                enclosure_settings.mesh_detail,
                edge_removal,
            ),
            enclosure_offset: Vec3::from_array(enclosure_settings.offset),
            time: 0.0,
        }
    }

    /// Fits the plane and a fresh enclosure to new extents. The mesh,
    /// projector and shader time carry over.
    fn resize(&mut self, settings: &VitrineSettings, extents: PortalExtents, solver: S) {
        self.plane = PortalPlane::new(self.plane.pose, extents);
        self.enclosure = Enclosure::build(solver, extents, settings.enclosure.layout());
    }

    pub fn secondary_camera(&self) -> &SecondaryCamera {
        self.projector.camera()
    }

    /// World transform of every particle in the nested scene.
    pub fn particle_models(&self) -> impl Iterator<Item = Mat4> + '_ {
        let offset = Mat4::from_translation(self.enclosure_offset);
        self.enclosure
            .bodies()
            .iter()
            .map(move |body| offset * body.pose.matrix())
    }

    pub fn particle_uniforms<'a>(
        &'a self,
        style: &'a StrokeStyle,
    ) -> impl Iterator<Item = StrokeUniform> + 'a {
        let time = self.time;
        self.particle_models()
            .map(move |model| style.uniform(model, time))
    }
}

pub enum PortalState<S> {
    Inactive,
    Active(Box<ActivePortal<S>>),
}

pub struct Scene<S> {
    settings: VitrineSettings,
    viewer: Camera,
    signals: InputSignals,
    activation: Activation,
    state: PortalState<S>,
    extents: PortalExtents,
    new_solver: Box<dyn FnMut() -> S>,
}

impl<S: PhysicsSolver> Scene<S> {
    /// `new_solver` is called on activation and on every enclosure rebuild.
    pub fn new(settings: VitrineSettings, aspect: f32, new_solver: Box<dyn FnMut() -> S>) -> Self {
        let settings = settings.sanitize();
        let mut viewer = Camera {
            position: Vec3::from_array(settings.viewer.start_position),
            fov: settings.viewer.fov_degrees.to_radians(),
            aspect: aspect.max(0.0001),
            near: settings.viewer.near,
            far: settings.viewer.far,
            ..Camera::default()
        };
        viewer.look_at(Vec3::ZERO);

        Self {
            settings,
            viewer,
            signals: InputSignals::default(),
            activation: Activation::Inactive,
            state: PortalState::Inactive,
            extents: PortalExtents::from_aspect(aspect),
            new_solver,
        }
    }

    pub fn settings(&self) -> &VitrineSettings {
        &self.settings
    }

    pub fn viewer(&self) -> &Camera {
        &self.viewer
    }

    pub fn signals(&self) -> InputSignals {
        self.signals
    }

    pub fn extents(&self) -> PortalExtents {
        self.extents
    }

    pub fn is_active(&self) -> bool {
        self.activation.is_active()
    }

    pub fn active(&self) -> Option<&ActivePortal<S>> {
        match &self.state {
            PortalState::Active(portal) => Some(portal),
            PortalState::Inactive => None,
        }
    }

    /// Moves to the active state. Does nothing after the first call.
    pub fn activate(&mut self) -> bool {
        if !self.activation.activate() {
            return false;
        }

        let solver = (self.new_solver)();
        self.state = PortalState::Active(Box::new(ActivePortal::new(
            &self.settings,
            self.extents,
            solver,
        )));
        info!(
            half_width = self.extents.half_width,
            half_height = self.extents.half_height,
            "portal activated"
        );
        true
    }

    /// New viewport aspect. A changed extent rebuilds the enclosure from a
    /// fresh solver.
    pub fn set_aspect(&mut self, aspect: f32) {
        if !(aspect.is_finite() && aspect > 0.0) {
            return;
        }
        self.viewer.aspect = aspect;

        let extents = PortalExtents::from_aspect(aspect);
        if extents == self.extents {
            return;
        }
        self.extents = extents;

        if let PortalState::Active(portal) = &mut self.state {
            let solver = (self.new_solver)();
            portal.resize(&self.settings, extents, solver);
            info!(
                half_width = extents.half_width,
                half_height = extents.half_height,
                "enclosure rebuilt for new aspect"
            );
        }
    }

    /// Advances one frame.
    pub fn update(&mut self, input: &FrameInput) {
        self.set_aspect(input.aspect);

        if !self.is_active() {
            if let Some(click) = input.click {
                if affordance_hit(&self.viewer, click) {
                    self.activate();
                }
            }
        }

        let PortalState::Active(portal) = &mut self.state else {
            return;
        };

        if self.signals.apply(input.orientation) {
            self.viewer.position = self.signals.look_position();
            self.viewer.look_at(Vec3::ZERO);
        }

        portal.enclosure.update(&self.signals);
        portal.projector.update(&self.viewer, &portal.plane);
        portal.time += input.dt.max(0.0);
    }
}

#[cfg(test)]
mod tests {
    use glam::{Vec2, Vec3};

    use super::{affordance_hit, pixel_ratio, FrameInput, Scene};
    use crate::camera::Camera;
    use crate::enclosure::tests::RecordingSolver;
    use crate::interaction::OrientationSample;
    use crate::projection::PortalExtents;
    use crate::settings::VitrineSettings;

    fn scene(aspect: f32) -> Scene<RecordingSolver> {
        Scene::new(
            VitrineSettings::default(),
            aspect,
            Box::new(RecordingSolver::default),
        )
    }

    fn frame(click: Option<Vec2>, orientation: Option<OrientationSample>) -> FrameInput {
        FrameInput {
            dt: 1.0 / 60.0,
            aspect: 1.0,
            click,
            orientation,
        }
    }

    #[test]
    fn pixel_ratio_caps_touch_devices_only() {
        assert_eq!(pixel_ratio(false, 3.0, 2.0), 1.0);
        assert_eq!(pixel_ratio(true, 3.0, 2.0), 2.0);
        assert_eq!(pixel_ratio(true, 1.5, 2.0), 1.5);
        assert_eq!(pixel_ratio(true, f64::NAN, 2.0), 1.0);
    }

    #[test]
    fn affordance_is_hit_through_the_middle_only() {
        let mut camera = Camera::default();
        camera.aspect = 1.0;
        camera.look_at(Vec3::ZERO);
        assert!(affordance_hit(&camera, Vec2::ZERO));
        assert!(!affordance_hit(&camera, Vec2::new(0.95, 0.95)));
    }

    #[test]
    fn nothing_is_simulated_before_activation() {
        let mut scene = scene(1.0);
        scene.update(&frame(None, Some(OrientationSample { beta: 20.0, gamma: 10.0 })));
        scene.update(&frame(Some(Vec2::new(0.99, 0.99)), None));

        assert!(!scene.is_active());
        assert!(scene.active().is_none());
        assert_eq!(scene.viewer().position, Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn click_activates_with_five_planes_and_a_body() {
        let mut scene = scene(1.0);
        scene.update(&frame(Some(Vec2::ZERO), None));

        let portal = scene.active().expect("portal should be active");
        let solver = portal.enclosure.solver();
        assert_eq!(solver.planes.len(), 5);
        assert!(!solver.bodies.is_empty());
        assert_eq!(solver.steps, 1);
        assert_eq!(portal.mesh.vertex_count(), 240);
        assert_eq!(portal.projector.target_size(), 1024);

        assert!(!scene.activate());
    }

    #[test]
    fn orientation_moves_viewer_and_projector_follows() {
        let mut scene = scene(1.0);
        scene.activate();
        scene.update(&frame(None, Some(OrientationSample { beta: 45.0, gamma: -45.0 })));

        let viewer = *scene.viewer();
        assert!((viewer.position - Vec3::new(0.5, 0.5, 0.5)).length() < 1e-6);

        let secondary = scene.active().unwrap().secondary_camera();
        assert_eq!(secondary.position, viewer.position);

        // No data: camera holds.
        scene.update(&frame(None, None));
        assert_eq!(scene.viewer().position, viewer.position);
    }

    #[test]
    fn aspect_change_rebuilds_enclosure() {
        let mut scene = scene(1.0);
        scene.activate();
        for _ in 0..3 {
            scene.update(&frame(None, None));
        }
        assert_eq!(scene.active().unwrap().enclosure.solver().steps, 3);

        scene.set_aspect(2.0);
        let portal = scene.active().unwrap();
        assert_eq!(portal.enclosure.extents(), PortalExtents::from_aspect(2.0));
        assert_eq!(portal.plane.extents, PortalExtents::from_aspect(2.0));
        assert_eq!(portal.enclosure.solver().steps, 0);
        assert_eq!(portal.enclosure.solver().planes[1].0.position.x, -0.5);
        assert_eq!(portal.enclosure.solver().planes[3].0.position.y, 0.25);
    }

    #[test]
    fn shader_time_survives_aspect_change() {
        let mut scene = scene(1.0);
        scene.activate();
        let mut input = frame(None, None);
        input.dt = 0.5;
        for _ in 0..4 {
            scene.update(&input);
        }
        assert_eq!(scene.active().unwrap().time, 2.0);

        input.aspect = 2.0;
        scene.update(&input);
        let portal = scene.active().unwrap();
        assert_eq!(portal.enclosure.extents(), PortalExtents::from_aspect(2.0));
        assert_eq!(portal.time, 2.5);
        assert_eq!(portal.mesh.vertex_count(), 240);
    }
}
