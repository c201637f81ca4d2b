//! Open box of confinement planes holding the particle bodies.
//!
//! Collision and integration belong to a [`PhysicsSolver`]; the enclosure
//! only registers colliders, drives the rotatable floor kinematically and
//! reads poses back once per frame.

use glam::{Quat, Vec3};
use tracing::debug;

use crate::camera::{euler_xyz, Pose};
use crate::interaction::InputSignals;
use crate::projection::PortalExtents;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaneHandle(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle(pub usize);

/// A dynamic sphere to register with the solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereBody {
    pub mass: f32,
    pub position: Vec3,
    pub radius: f32,
}

/// Rigid-body solver boundary. Planes are infinite, zero-mass, with their
/// normal along local +Z.
pub trait PhysicsSolver {
    fn register_plane(&mut self, pose: Pose, kinematic: bool) -> PlaneHandle;

    fn register_body(&mut self, body: SphereBody) -> BodyHandle;

    /// Kinematic override: the plane takes this orientation on the next step
    /// without the solver integrating it.
    fn set_plane_orientation(&mut self, plane: PlaneHandle, orientation: Quat);

    fn step(&mut self, gravity: Vec3, dt: f32);

    fn body_pose(&self, body: BodyHandle) -> Option<Pose>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfinementPlane {
    pub handle: PlaneHandle,
    pub pose: Pose,
    pub rotatable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleBody {
    pub handle: BodyHandle,
    pub radius: f32,
    pub pose: Pose,
}

/// Placement and population of the enclosure.
#[derive(Debug, Clone, PartialEq)]
pub struct EnclosureLayout {
    pub gravity: Vec3,
    pub step: f32,
    pub particle_count: usize,
    pub particle_mass: f32,
    pub particle_radius: f32,
    pub particle_start: Vec3,
}

impl Default for EnclosureLayout {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, 0.0, -30.0),
            step: 1.0 / 60.0,
            particle_count: 1,
            particle_mass: 1.0,
            particle_radius: 0.07,
            particle_start: Vec3::new(0.0, 0.0, 1.0),
        }
    }
}

impl EnclosureLayout {
    /// Start position of the `index`th particle. Extra particles sit on a
    /// small ring around the first so they do not spawn overlapping.
    pub fn particle_position(&self, index: usize) -> Vec3 {
        if index == 0 {
            return self.particle_start;
        }

        let ring = self.particle_radius * 2.5;
        let angle = index as f32 * 2.399_963;
        let lift = (index / 6) as f32 * self.particle_radius * 2.5;
        self.particle_start + Vec3::new(angle.cos() * ring, angle.sin() * ring, lift)
    }
}

/// Wall poses for the given extents: left, right, top, bottom. Each faces
/// into the box.
pub fn wall_poses(extents: PortalExtents) -> [Pose; 4] {
    use std::f32::consts::FRAC_PI_2;

    [
        Pose::from_euler(
            Vec3::new(-extents.half_width, 0.0, 0.0),
            Vec3::new(0.0, FRAC_PI_2, 0.0),
        ),
        Pose::from_euler(
            Vec3::new(extents.half_width, 0.0, 0.0),
            Vec3::new(0.0, -FRAC_PI_2, 0.0),
        ),
        Pose::from_euler(
            Vec3::new(0.0, extents.half_height, 0.0),
            Vec3::new(FRAC_PI_2, 0.0, 0.0),
        ),
        Pose::from_euler(
            Vec3::new(0.0, -extents.half_height, 0.0),
            Vec3::new(-FRAC_PI_2, 0.0, 0.0),
        ),
    ]
}

pub struct Enclosure<S> {
    solver: S,
    extents: PortalExtents,
    layout: EnclosureLayout,
    planes: Vec<ConfinementPlane>,
    bodies: Vec<ParticleBody>,
}

impl<S: PhysicsSolver> Enclosure<S> {
    /// Empty enclosure; nothing is registered yet.
    pub fn new(solver: S, extents: PortalExtents, layout: EnclosureLayout) -> Self {
        Self {
            solver,
            extents,
            layout,
            planes: Vec::with_capacity(5),
            bodies: Vec::new(),
        }
    }

    /// The standard box: rotatable floor, four walls sized to `extents`,
    /// and the layout's particles.
    pub fn build(solver: S, extents: PortalExtents, layout: EnclosureLayout) -> Self {
        let mut enclosure = Self::new(solver, extents, layout);

        enclosure.add_confinement_plane(Pose::IDENTITY, true);
        for pose in wall_poses(extents) {
            enclosure.add_confinement_plane(pose, false);
        }

        for index in 0..enclosure.layout.particle_count {
            let position = enclosure.layout.particle_position(index);
            let mass = enclosure.layout.particle_mass;
            let radius = enclosure.layout.particle_radius;
            enclosure.add_body(mass, position, radius);
        }

        debug!(
            planes = enclosure.planes.len(),
            bodies = enclosure.bodies.len(),
            half_width = extents.half_width,
            half_height = extents.half_height,
            "enclosure built"
        );
        enclosure
    }

    pub fn add_confinement_plane(&mut self, pose: Pose, rotatable: bool) -> PlaneHandle {
        let handle = self.solver.register_plane(pose, rotatable);
        self.planes.push(ConfinementPlane {
            handle,
            pose,
            rotatable,
        });
        handle
    }

    pub fn add_body(&mut self, mass: f32, position: Vec3, radius: f32) -> BodyHandle {
        let handle = self.solver.register_body(SphereBody {
            mass,
            position,
            radius,
        });
        self.bodies.push(ParticleBody {
            handle,
            radius,
            pose: Pose::new(position, Quat::IDENTITY),
        });
        handle
    }

    /// One tick: kinematic override of rotatable planes from the signals,
    /// one solver step, pose read-back.
    pub fn update(&mut self, signals: &InputSignals) {
        let orientation = euler_xyz(signals.plane_rotation());
        for plane in self.planes.iter_mut().filter(|plane| plane.rotatable) {
            plane.pose.orientation = orientation;
            self.solver.set_plane_orientation(plane.handle, orientation);
        }

        self.solver.step(self.layout.gravity, self.layout.step);

        for body in &mut self.bodies {
            if let Some(pose) = self.solver.body_pose(body.handle) {
                body.pose = pose;
            }
        }
    }

    pub fn extents(&self) -> PortalExtents {
        self.extents
    }

    pub fn layout(&self) -> &EnclosureLayout {
        &self.layout
    }

    pub fn planes(&self) -> &[ConfinementPlane] {
        &self.planes
    }

    pub fn bodies(&self) -> &[ParticleBody] {
        &self.bodies
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;

    use glam::{Quat, Vec3};

    use super::{
        wall_poses, BodyHandle, Enclosure, EnclosureLayout, PhysicsSolver, PlaneHandle,
        SphereBody,
    };
    use crate::camera::Pose;
    use crate::interaction::InputSignals;
    use crate::projection::PortalExtents;

    /// Records registrations; bodies drift by gravity without collisions.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingSolver {
        pub planes: Vec<(Pose, bool)>,
        pub bodies: Vec<SphereBody>,
        pub orientations: HashMap<usize, Quat>,
        pub steps: usize,
    }

    impl PhysicsSolver for RecordingSolver {
        fn register_plane(&mut self, pose: Pose, kinematic: bool) -> PlaneHandle {
            self.planes.push((pose, kinematic));
            PlaneHandle(self.planes.len() - 1)
        }

        fn register_body(&mut self, body: SphereBody) -> BodyHandle {
            self.bodies.push(body);
            BodyHandle(self.bodies.len() - 1)
        }

        fn set_plane_orientation(&mut self, plane: PlaneHandle, orientation: Quat) {
            self.orientations.insert(plane.0, orientation);
        }

        fn step(&mut self, gravity: Vec3, dt: f32) {
            self.steps += 1;
            for body in &mut self.bodies {
                body.position += gravity * dt * dt;
            }
        }

        fn body_pose(&self, body: BodyHandle) -> Option<Pose> {
            self.bodies
                .get(body.0)
                .map(|body| Pose::new(body.position, Quat::IDENTITY))
        }
    }

    #[test]
    fn build_registers_five_planes_and_bodies() {
        let layout = EnclosureLayout {
            particle_count: 3,
            ..EnclosureLayout::default()
        };
        let enclosure =
            Enclosure::build(RecordingSolver::default(), PortalExtents::from_aspect(1.0), layout);

        let solver = enclosure.solver();
        assert_eq!(solver.planes.len(), 5);
        assert_eq!(solver.planes.iter().filter(|(_, kinematic)| *kinematic).count(), 1);
        assert_eq!(solver.bodies.len(), 3);
        assert_eq!(solver.bodies[0].position, Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(solver.bodies[0].radius, 0.07);
    }

    #[test]
    fn walls_match_extents_and_face_inward() {
        let extents = PortalExtents::from_aspect(2.0);
        let walls = wall_poses(extents);
        assert_eq!(walls[0].position.x, -0.5);
        assert_eq!(walls[1].position.x, 0.5);
        assert_eq!(walls[2].position.y, 0.25);
        assert_eq!(walls[3].position.y, -0.25);

        for wall in walls {
            let normal = wall.orientation * Vec3::Z;
            assert!(normal.dot(-wall.position) > 0.0, "{wall:?} faces outward");
        }
    }

    #[test]
    fn update_overrides_floor_and_reads_back_poses() {
        let mut enclosure = Enclosure::build(
            RecordingSolver::default(),
            PortalExtents::from_aspect(1.0),
            EnclosureLayout::default(),
        );
        let start = enclosure.bodies()[0].pose.position;

        enclosure.update(&InputSignals::new(40.0, -40.0));

        let floor = enclosure.planes()[0];
        assert!(floor.rotatable);
        let expected = crate::camera::euler_xyz(Vec3::new(10.0 / 120.0, -10.0 / 120.0, 0.0));
        assert!(floor.pose.orientation.abs_diff_eq(expected, 1e-6));
        assert_eq!(
            enclosure.solver().orientations.get(&floor.handle.0).copied(),
            Some(floor.pose.orientation)
        );
        assert!(enclosure.planes()[1..]
            .iter()
            .all(|plane| !enclosure.solver().orientations.contains_key(&plane.handle.0)));

        assert_eq!(enclosure.solver().steps, 1);
        assert!(enclosure.bodies()[0].pose.position.z < start.z);
    }
}
