use glam::{Quat, Vec3};
use serde::Serialize;

use super::SpatialTransform;

pub const DEFAULT_FOV_DEG: f32 = 50.0;
/// The base image spans [-1, 1] vertically.
pub const IMAGE_PLANE_HEIGHT: f32 = 2.0;

/// Perspective camera on +Z looking at the origin, backed off just far enough
/// for the image plane to fill the view height.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualCamera {
    pub fov_deg: f32,
    pub aspect: f32,
    pub position: Vec3,
}

impl VirtualCamera {
    pub fn new(fov_deg: f32, aspect: f32) -> Self {
        let half_fov = (fov_deg / 2.0).to_radians();
        let distance = IMAGE_PLANE_HEIGHT / (2.0 * half_fov.tan());
        Self {
            fov_deg,
            aspect,
            position: Vec3::new(0.0, 0.0, distance),
        }
    }

    pub fn for_viewport(width: u32, height: u32) -> Self {
        let aspect = if height == 0 {
            1.0
        } else {
            width as f32 / height as f32
        };
        Self::new(DEFAULT_FOV_DEG, aspect)
    }

    pub fn distance(&self) -> f32 {
        self.position.z
    }
}

impl Default for VirtualCamera {
    fn default() -> Self {
        Self::new(DEFAULT_FOV_DEG, 1.0)
    }
}

/// Length of the debug ray drawn from the projection origin.
pub const PROJECTION_RAY_LENGTH: f32 = 5.0;
pub const PROJECTION_MARKER_RADIUS: f32 = 0.1;

/// Debug visual showing how the carved texture projects onto the model: a ray
/// from the projection origin and a textured plane swept along it.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionPlane {
    pub ray_origin: Vec3,
    pub ray_direction: Vec3,
    pub ray_length: f32,
    pub marker_radius: f32,
    pub plane_position: Vec3,
    pub plane_rotation: Quat,
    pub plane_scale: Vec3,
}

impl ProjectionPlane {
    pub fn from_transform(transform: &SpatialTransform, length: f32) -> Self {
        let direction = transform
            .projection_direction
            .try_normalize()
            .unwrap_or(Vec3::Z);

        Self {
            ray_origin: transform.projection_origin,
            ray_direction: direction,
            ray_length: length,
            marker_radius: PROJECTION_MARKER_RADIUS,
            plane_position: transform.projection_origin + direction * (length / 2.0),
            // The unit plane lies in XZ; stand its Y axis along the ray.
            plane_rotation: Quat::from_rotation_arc(Vec3::Y, direction),
            plane_scale: Vec3::new(
                transform.projection_scale.x,
                length,
                transform.projection_scale.z,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_frames_image_plane() {
        let camera = VirtualCamera::default();
        let half_height = camera.distance() * (camera.fov_deg / 2.0).to_radians().tan();
        assert!((half_height - 1.0).abs() < 1e-5);
        assert!((camera.distance() - 2.1445).abs() < 1e-3);
    }

    #[test]
    fn test_viewport_aspect() {
        assert_eq!(VirtualCamera::for_viewport(800, 400).aspect, 2.0);
        assert_eq!(VirtualCamera::for_viewport(800, 0).aspect, 1.0);
    }

    #[test]
    fn test_projection_plane_sits_half_a_ray_ahead() {
        let transform = SpatialTransform {
            scale: Vec3::ONE,
            model_position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            projection_origin: Vec3::new(0.2, 0.3, -1.0),
            projection_direction: Vec3::Z,
            projection_scale: Vec3::new(0.4, 1.0, 0.6),
        };
        let plane = ProjectionPlane::from_transform(&transform, PROJECTION_RAY_LENGTH);

        assert_eq!(plane.plane_position, Vec3::new(0.2, 0.3, 1.5));
        assert_eq!(plane.plane_scale, Vec3::new(0.4, 5.0, 0.6));
        let rotated = plane.plane_rotation * Vec3::Y;
        assert!((rotated - Vec3::Z).length() < 1e-6);
    }
}
