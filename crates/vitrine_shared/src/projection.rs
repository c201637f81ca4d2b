//! Off-axis portal projection.
//!
//! A secondary camera copies the viewer's position and the portal plane's
//! orientation, so the plane is always perpendicular to its view axis. The
//! asymmetric frustum through the plane's rectangle then maps that rectangle
//! onto the whole offscreen target, which keeps the nested scene's parallax
//! continuous with the viewer's from any oblique position.

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

use crate::camera::{Camera, Pose};

/// Smallest depth separation between the secondary camera and the portal.
/// Below this the near-plane scale would blow up.
pub const MIN_PORTAL_DISTANCE: f32 = 1.0e-4;

/// Half-width and half-height of the portal rectangle in its local space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortalExtents {
    pub half_width: f32,
    pub half_height: f32,
}

impl PortalExtents {
    /// Fits the unit square to the viewport aspect ratio: the long side
    /// spans one unit.
    pub fn from_aspect(aspect: f32) -> Self {
        let aspect = if aspect.is_finite() && aspect > 0.0 {
            aspect
        } else {
            1.0
        };

        if aspect > 1.0 {
            Self {
                half_width: 0.5,
                half_height: 0.5 / aspect,
            }
        } else {
            Self {
                half_width: aspect * 0.5,
                half_height: 0.5,
            }
        }
    }

    pub fn width(&self) -> f32 {
        self.half_width * 2.0
    }

    pub fn height(&self) -> f32 {
        self.half_height * 2.0
    }

    pub fn as_vec2(&self) -> Vec2 {
        Vec2::new(self.half_width, self.half_height)
    }
}

/// The rectangular window into the nested scene.
#[derive(Debug, Clone, Copy)]
pub struct PortalPlane {
    pub pose: Pose,
    pub extents: PortalExtents,
}

impl PortalPlane {
    pub fn new(pose: Pose, extents: PortalExtents) -> Self {
        Self { pose, extents }
    }

    /// Maps the [-1, 1]² quad onto the plane's rectangle in world space.
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::new(self.extents.half_width, self.extents.half_height, 1.0),
            self.pose.orientation,
            self.pose.position,
        )
    }

    /// Corners in world space: bottom-left, bottom-right, top-right, top-left.
    pub fn world_corners(&self) -> [Vec3; 4] {
        let model = self.model_matrix();
        [
            model.transform_point3(Vec3::new(-1.0, -1.0, 0.0)),
            model.transform_point3(Vec3::new(1.0, -1.0, 0.0)),
            model.transform_point3(Vec3::new(1.0, 1.0, 0.0)),
            model.transform_point3(Vec3::new(-1.0, 1.0, 0.0)),
        ]
    }
}

/// Asymmetric frustum bounds at the near plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffAxisFrustum {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
    pub near: f32,
    pub far: f32,
}

impl OffAxisFrustum {
    /// Frustum that passes exactly through the portal rectangle.
    ///
    /// `portal_local` is the portal centre in the secondary camera's local
    /// space. Its depth is clamped to [`MIN_PORTAL_DISTANCE`] so the result is
    /// always finite.
    pub fn through_portal(
        portal_local: Vec3,
        extents: PortalExtents,
        near: f32,
        far: f32,
    ) -> Self {
        let (left, right, top, bottom) = portal_edges(portal_local, extents);
        let scale = near_plane_scale(portal_local.z, near);

        Self {
            left: left * scale,
            right: right * scale,
            top: top * scale,
            bottom: bottom * scale,
            near,
            far,
        }
    }

    /// Right-handed perspective matrix for this frustum with a [0, 1] depth
    /// range.
    pub fn projection_matrix(&self) -> Mat4 {
        let n = self.near;
        let f = self.far;
        let width = nonzero(self.right - self.left);
        let height = nonzero(self.top - self.bottom);
        let depth = nonzero(n - f);

        Mat4::from_cols(
            Vec4::new(2.0 * n / width, 0.0, 0.0, 0.0),
            Vec4::new(0.0, 2.0 * n / height, 0.0, 0.0),
            Vec4::new(
                (self.right + self.left) / width,
                (self.top + self.bottom) / height,
                f / depth,
                -1.0,
            ),
            Vec4::new(0.0, 0.0, n * f / depth, 0.0),
        )
    }
}

/// Frustum edges at the portal's own depth, before near-plane scaling.
pub fn portal_edges(portal_local: Vec3, extents: PortalExtents) -> (f32, f32, f32, f32) {
    (
        portal_local.x - extents.half_width,
        portal_local.x + extents.half_width,
        portal_local.y + extents.half_height,
        portal_local.y - extents.half_height,
    )
}

/// Ratio that slides the portal's edges back to the near plane.
pub fn near_plane_scale(portal_depth: f32, near: f32) -> f32 {
    near / clamped_distance(portal_depth)
}

pub fn clamped_distance(portal_depth: f32) -> f32 {
    let distance = portal_depth.abs();
    if distance.is_finite() {
        distance.max(MIN_PORTAL_DISTANCE)
    } else {
        MIN_PORTAL_DISTANCE
    }
}

fn nonzero(value: f32) -> f32 {
    if value.abs() < f32::EPSILON {
        f32::EPSILON.copysign(value)
    } else {
        value
    }
}

/// The portal's own camera: positioned at the viewer, oriented like the
/// portal plane, with an off-axis projection rebuilt every frame.
#[derive(Debug, Clone, Copy)]
pub struct SecondaryCamera {
    pub position: Vec3,
    pub orientation: Quat,
    pub frustum: OffAxisFrustum,
}

impl SecondaryCamera {
    pub fn world_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.orientation, self.position)
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.world_matrix().inverse()
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.frustum.projection_matrix()
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

/// Owns the secondary camera and the offscreen target's size. Created on
/// portal activation.
#[derive(Debug, Clone)]
pub struct PortalProjector {
    camera: SecondaryCamera,
    near: f32,
    far: f32,
    target_size: u32,
}

impl PortalProjector {
    pub fn new(near: f32, far: f32, target_size: u32) -> Self {
        let near = near.max(MIN_PORTAL_DISTANCE);
        let far = far.max(near + 0.0001);
        Self {
            camera: SecondaryCamera {
                position: Vec3::ZERO,
                orientation: Quat::IDENTITY,
                frustum: OffAxisFrustum::through_portal(
                    Vec3::NEG_Z,
                    PortalExtents::from_aspect(1.0),
                    near,
                    far,
                ),
            },
            near,
            far,
            target_size: target_size.max(1),
        }
    }

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    pub fn target_size(&self) -> u32 {
        self.target_size
    }

    pub fn camera(&self) -> &SecondaryCamera {
        &self.camera
    }

    /// Re-aims the secondary camera for this frame. Must run after the
    /// viewer's pose for the frame is final.
    pub fn update(&mut self, viewer: &Camera, plane: &PortalPlane) -> &SecondaryCamera {
        self.camera.position = viewer.position;
        self.camera.orientation = plane.pose.orientation;

        let portal_local = self
            .camera
            .view_matrix()
            .transform_point3(plane.pose.position);
        self.camera.frustum =
            OffAxisFrustum::through_portal(portal_local, plane.extents, self.near, self.far);
        &self.camera
    }
}
