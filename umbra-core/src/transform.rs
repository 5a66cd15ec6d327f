/// View, projection and rotation matrices
use nalgebra::{Matrix3, Matrix4, Point3, Rotation3, Unit, Vector3};

/// Transform builder for 3D transformations
pub struct Transform;

impl Transform {
    /// Camera matrix for an eye looking along `gaze` with `up` as the approximate up vector.
    ///
    /// Falls back to another up vector when `gaze` and `up` are parallel, so a
    /// light placed straight above the origin still gets a valid view.
    pub fn look_along(eye: &Point3<f32>, gaze: &Vector3<f32>, up: &Vector3<f32>) -> Matrix4<f32> {
        let target = eye + gaze;
        let up = if gaze.cross(up).norm_squared() < 1e-10 {
            if gaze.cross(&Vector3::z()).norm_squared() < 1e-10 {
                Vector3::x()
            } else {
                Vector3::z()
            }
        } else {
            *up
        };
        Matrix4::look_at_rh(eye, &target, &up)
    }

    /// Camera matrix looking from `eye` at `target`
    pub fn look_at(eye: &Point3<f32>, target: &Point3<f32>, up: &Vector3<f32>) -> Matrix4<f32> {
        Self::look_along(eye, &(target - eye), up)
    }

    /// Perspective projection; `fov_y_degrees` is the full vertical field of view
    pub fn perspective(fov_y_degrees: f32, aspect: f32, near: f32, far: f32) -> Matrix4<f32> {
        Matrix4::new_perspective(aspect, fov_y_degrees.to_radians(), near, far)
    }

    /// Rotation of `radians` about `axis`; identity for a zero axis
    pub fn rotation_about(radians: f32, axis: &Vector3<f32>) -> Matrix3<f32> {
        match Unit::try_new(*axis, 1e-6) {
            Some(axis) => Rotation3::from_axis_angle(&axis, radians).into_inner(),
            None => Matrix3::identity(),
        }
    }

    /// Create a model-view-projection matrix
    pub fn mvp_matrix(
        model: &Matrix4<f32>,
        view: &Matrix4<f32>,
        projection: &Matrix4<f32>,
    ) -> Matrix4<f32> {
        projection * view * model
    }
}
