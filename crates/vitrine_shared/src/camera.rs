use glam::{Mat3, Mat4, Quat, Vec2, Vec3, Vec4Swizzles};

/// Position and orientation in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Quat,
}

impl Pose {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        orientation: Quat::IDENTITY,
    };

    pub fn new(position: Vec3, orientation: Quat) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Pose from an XYZ Euler rotation in radians.
    pub fn from_euler(position: Vec3, rotation: Vec3) -> Self {
        Self::new(position, euler_xyz(rotation))
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.orientation, self.position)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Intrinsic X-then-Y-then-Z rotation.
pub fn euler_xyz(rotation: Vec3) -> Quat {
    Quat::from_euler(glam::EulerRot::XYZ, rotation.x, rotation.y, rotation.z)
}

/// The viewer's camera. Looks down its local -Z axis.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub position: Vec3,
    pub orientation: Quat,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 1.0),
            orientation: Quat::IDENTITY,
            fov: 75.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

impl Camera {
    pub fn world_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.orientation, self.position)
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.world_matrix().inverse()
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov,
            self.aspect.max(0.0001),
            self.near.max(0.0001),
            self.far.max(self.near + 0.0001),
        )
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    pub fn forward_direction(&self) -> Vec3 {
        self.orientation * Vec3::NEG_Z
    }

    /// Turns the camera towards `target`, keeping world +Y as up.
    pub fn look_at(&mut self, target: Vec3) {
        let forward = (target - self.position).normalize_or_zero();
        if forward.length_squared() == 0.0 {
            return;
        }

        let mut right = forward.cross(Vec3::Y).normalize_or_zero();
        if right.length_squared() < 1e-6 {
            right = Vec3::X;
        }
        let up = right.cross(forward).normalize_or_zero();
        self.orientation = Quat::from_mat3(&Mat3::from_cols(right, up, -forward)).normalize();
    }

    /// World-space ray through a point in normalised device coordinates
    /// (x right, y up, both in [-1, 1]).
    pub fn pick_ray(&self, ndc: Vec2) -> (Vec3, Vec3) {
        let inverse = self.view_projection_matrix().inverse();
        let near = inverse * ndc.extend(0.0).extend(1.0);
        let far = inverse * ndc.extend(1.0).extend(1.0);
        let near = near.xyz() / near.w;
        let far = far.xyz() / far.w;
        (near, (far - near).normalize_or_zero())
    }
}

#[cfg(test)]
mod tests {
    use glam::{Vec2, Vec3};

    use super::{Camera, Pose};

    #[test]
    fn look_at_points_forward_axis_at_target() {
        let mut camera = Camera {
            position: Vec3::new(0.3, -0.2, 1.0),
            ..Camera::default()
        };
        camera.look_at(Vec3::ZERO);
        let expected = (Vec3::ZERO - camera.position).normalize();
        assert!((camera.forward_direction() - expected).length() < 1e-5);

        let up = camera.orientation * Vec3::Y;
        assert!(up.y > 0.0);
    }

    #[test]
    fn pick_ray_through_centre_follows_view_axis() {
        let camera = Camera::default();
        let (origin, direction) = camera.pick_ray(Vec2::ZERO);
        assert!((direction - Vec3::NEG_Z).length() < 1e-4);
        assert!((origin.x).abs() < 1e-4 && (origin.y).abs() < 1e-4);
    }

    #[test]
    fn euler_pose_rotates_plane_normal_into_enclosure() {
        let left_wall = Pose::from_euler(
            Vec3::new(-0.5, 0.0, 0.0),
            Vec3::new(0.0, std::f32::consts::FRAC_PI_2, 0.0),
        );
        let normal = left_wall.orientation * Vec3::Z;
        assert!((normal - Vec3::X).length() < 1e-5);
    }
}
