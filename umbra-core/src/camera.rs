/// Orbiting camera around the scene origin
use nalgebra::{Matrix4, Point3, Vector2, Vector3};

use crate::transform::Transform;

/// Largest rotation applied for one cursor step, in radians
const MAX_ORBIT_STEP: f32 = 0.5;
/// Cursor pixels per degree of rotation
const PIXELS_PER_DEGREE: f32 = 20.0;
/// Eye travel per scroll notch, as a fraction of the unit gaze
const ZOOM_STEP: f32 = 0.5;

/// Camera that always looks at the origin
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitCamera {
    pub eye: Point3<f32>,
    /// Normalized direction from the eye to the origin
    pub gaze: Vector3<f32>,
    pub up: Vector3<f32>,
    /// Full vertical field of view in degrees
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl OrbitCamera {
    pub fn new(eye: Point3<f32>, aspect: f32) -> Self {
        Self {
            eye,
            gaze: gaze_at_origin(&eye),
            up: Vector3::y(),
            fov_y: 30.0,
            aspect,
            near: 0.1,
            far: 100.0,
        }
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        Transform::look_along(&self.eye, &self.gaze, &self.up)
    }

    pub fn projection_matrix(&self) -> Matrix4<f32> {
        Transform::perspective(self.fov_y, self.aspect, self.near, self.far)
    }

    /// Move the eye along the gaze; positive scroll moves closer
    pub fn zoom(&mut self, scroll: f32) {
        let step = self.gaze.normalize() * ZOOM_STEP;
        if scroll > 0.0 {
            self.eye += step;
        } else if scroll < 0.0 {
            self.eye -= step;
        }
    }

    /// Rotate the eye around the origin for a cursor movement of `delta` pixels.
    ///
    /// The dominant axis of the movement picks the rotation: horizontal drags
    /// turn about world +Y, vertical drags about the camera's right vector.
    pub fn orbit(&mut self, delta: Vector2<f32>) {
        let (pixels, axis) = if delta.x.abs() > delta.y.abs() {
            (delta.x, Vector3::y())
        } else {
            (delta.y, self.gaze.cross(&self.up))
        };

        if axis.norm_squared() < 1e-10 {
            return;
        }
        let radians =
            ((-pixels).to_radians() / PIXELS_PER_DEGREE).clamp(-MAX_ORBIT_STEP, MAX_ORBIT_STEP);
        let rotation = Transform::rotation_about(radians, &axis);

        self.eye = Point3::from(rotation * self.eye.coords);
        self.gaze = gaze_at_origin(&self.eye);
    }
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::new(Point3::new(10.0, 10.0, 14.0), 1400.0 / 900.0)
    }
}

fn gaze_at_origin(eye: &Point3<f32>) -> Vector3<f32> {
    (-eye.coords).try_normalize(1e-6).unwrap_or_else(|| -Vector3::z())
}
