use glam::{Quat, Vec3};
use rapier3d::na::{Quaternion, Translation3, UnitQuaternion};
use rapier3d::prelude::*;
use tracing::warn;

use crate::camera::Pose;
use crate::enclosure::{BodyHandle, PhysicsSolver, PlaneHandle, SphereBody};

const BODY_RESTITUTION: f32 = 0.4;
const BODY_FRICTION: f32 = 0.3;

/// [`PhysicsSolver`] backed by rapier. Rotatable planes become
/// position-based kinematic bodies; fixed planes are fixed bodies.
pub struct RapierSolver {
    pipeline: PhysicsPipeline,
    integration_parameters: IntegrationParameters,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
    plane_handles: Vec<RigidBodyHandle>,
    body_handles: Vec<RigidBodyHandle>,
}

impl Default for RapierSolver {
    fn default() -> Self {
        Self {
            pipeline: PhysicsPipeline::new(),
            integration_parameters: IntegrationParameters::default(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            plane_handles: Vec::new(),
            body_handles: Vec::new(),
        }
    }
}

impl PhysicsSolver for RapierSolver {
    fn register_plane(&mut self, pose: Pose, kinematic: bool) -> PlaneHandle {
        let builder = if kinematic {
            RigidBodyBuilder::kinematic_position_based()
        } else {
            RigidBodyBuilder::fixed()
        };
        let handle = self.bodies.insert(builder.position(to_isometry(pose)).build());
        let collider = ColliderBuilder::halfspace(Vector::z_axis())
            .friction(BODY_FRICTION)
            .build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);

        self.plane_handles.push(handle);
        PlaneHandle(self.plane_handles.len() - 1)
    }

    fn register_body(&mut self, body: SphereBody) -> BodyHandle {
        let rigid_body = RigidBodyBuilder::dynamic()
            .translation(vector![body.position.x, body.position.y, body.position.z])
            .ccd_enabled(true)
            .build();
        let handle = self.bodies.insert(rigid_body);
        let collider = ColliderBuilder::ball(body.radius.max(0.001))
            .mass(body.mass.max(0.001))
            .restitution(BODY_RESTITUTION)
            .friction(BODY_FRICTION)
            .build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);

        self.body_handles.push(handle);
        BodyHandle(self.body_handles.len() - 1)
    }

    fn set_plane_orientation(&mut self, plane: PlaneHandle, orientation: Quat) {
        let Some(handle) = self.plane_handles.get(plane.0).copied() else {
            warn!(plane = plane.0, "orientation set on unknown plane");
            return;
        };
        let Some(body) = self.bodies.get_mut(handle) else {
            return;
        };
        if body.is_kinematic() {
            body.set_next_kinematic_rotation(to_rotation(orientation));
        } else {
            body.set_rotation(to_rotation(orientation), true);
        }
    }

    fn step(&mut self, gravity: Vec3, dt: f32) {
        self.integration_parameters.dt = dt.max(1.0e-4);
        let gravity = vector![gravity.x, gravity.y, gravity.z];

        self.pipeline.step(
            &gravity,
            &self.integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
    }

    fn body_pose(&self, body: BodyHandle) -> Option<Pose> {
        let handle = self.body_handles.get(body.0)?;
        let rigid_body = self.bodies.get(*handle)?;
        let translation = rigid_body.translation();
        Some(Pose::new(
            Vec3::new(translation.x, translation.y, translation.z),
            from_rotation(rigid_body.rotation()),
        ))
    }
}

fn to_rotation(orientation: Quat) -> UnitQuaternion<f32> {
    UnitQuaternion::from_quaternion(Quaternion::new(
        orientation.w,
        orientation.x,
        orientation.y,
        orientation.z,
    ))
}

fn from_rotation(rotation: &UnitQuaternion<f32>) -> Quat {
    let q = rotation.quaternion();
    Quat::from_xyzw(q.i, q.j, q.k, q.w)
}

fn to_isometry(pose: Pose) -> Isometry<f32> {
    Isometry::from_parts(
        Translation3::new(pose.position.x, pose.position.y, pose.position.z),
        to_rotation(pose.orientation),
    )
}

#[cfg(test)]
mod tests {
    use glam::{Quat, Vec3};

    use std::f32::consts::FRAC_PI_2;

    use super::{from_rotation, to_rotation, RapierSolver};
    use crate::camera::Pose;
    use crate::enclosure::{Enclosure, EnclosureLayout, PhysicsSolver, PlaneHandle, SphereBody};
    use crate::interaction::InputSignals;
    use crate::projection::PortalExtents;

    #[test]
    fn rotation_conversion_round_trips() {
        let q = Quat::from_euler(glam::EulerRot::XYZ, 0.05, -0.08, 0.0);
        assert!(from_rotation(&to_rotation(q)).abs_diff_eq(q, 1e-6));
    }

    fn plane_rotation(solver: &RapierSolver, plane: PlaneHandle) -> Quat {
        let handle = solver.plane_handles[plane.0];
        from_rotation(solver.bodies[handle].rotation())
    }

    #[test]
    fn kinematic_floor_holds_commanded_rotation() {
        let mut solver = RapierSolver::default();
        let wall_rotation = Quat::from_rotation_y(FRAC_PI_2);
        let wall_pose = Pose::new(Vec3::new(-0.5, 0.0, 0.0), wall_rotation);
        let wall = solver.register_plane(wall_pose, false);
        let floor = solver.register_plane(Pose::IDENTITY, true);
        solver.register_body(SphereBody {
            mass: 1.0,
            position: Vec3::new(0.0, 0.0, 0.2),
            radius: 0.07,
        });

        let tilt = 10.0 / 120.0;
        let commanded = Quat::from_euler(glam::EulerRot::XYZ, tilt, -tilt, 0.0);
        for _ in 0..30 {
            solver.set_plane_orientation(floor, commanded);
            solver.step(Vec3::new(0.0, 0.0, -30.0), 1.0 / 60.0);
        }

        assert!(plane_rotation(&solver, floor).angle_between(commanded) < 1e-4);
        assert!(plane_rotation(&solver, wall).angle_between(wall_rotation) < 1e-5);
    }

    #[test]
    fn particle_falls_and_stays_inside_the_box() {
        let extents = PortalExtents::from_aspect(1.0);
        let mut enclosure =
            Enclosure::build(RapierSolver::default(), extents, EnclosureLayout::default());

        for frame in 0..240 {
            let tilt = if frame % 120 < 60 { 40.0 } else { -40.0 };
            enclosure.update(&InputSignals::new(tilt, tilt));
        }

        let body = enclosure.bodies()[0];
        let position = body.pose.position;
        assert!(position.z < 1.0, "particle never fell: {position:?}");
        assert!(position.z > -0.1, "particle went through the floor: {position:?}");
        assert!(position.x.abs() < extents.half_width + 0.01);
        assert!(position.y.abs() < extents.half_height + 0.01);
    }

    #[test]
    fn gravity_without_planes_accelerates_body() {
        let mut solver = RapierSolver::default();
        let handle = solver.register_body(SphereBody {
            mass: 1.0,
            position: Vec3::new(0.0, 0.0, 1.0),
            radius: 0.07,
        });
        for _ in 0..10 {
            solver.step(Vec3::new(0.0, 0.0, -30.0), 1.0 / 60.0);
        }
        let pose = solver.body_pose(handle).unwrap();
        assert!(pose.position.z < 0.9);
    }
}
