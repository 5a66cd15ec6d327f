/// Mouse input state driving the orbit camera
use nalgebra::Vector2;
use umbra_core::OrbitCamera;

/// Camera plus the pointer state needed to turn drags into rotations
#[derive(Debug, Clone)]
pub struct InputContext {
    pub camera: OrbitCamera,
    pub left_pressed: bool,
    /// Cursor position of the previous drag step, in pixels
    pub last_cursor: Option<Vector2<f32>>,
}

impl InputContext {
    pub fn new(camera: OrbitCamera) -> Self {
        Self {
            camera,
            left_pressed: false,
            last_cursor: None,
        }
    }

    /// Left button press or release. Release forgets the drag origin.
    pub fn on_button(&mut self, pressed: bool) {
        self.left_pressed = pressed;
        if !pressed {
            self.last_cursor = None;
        }
    }

    /// Cursor moved to `position`; orbits only while the button is held
    pub fn on_cursor(&mut self, position: Vector2<f32>) {
        if !self.left_pressed {
            return;
        }
        if let Some(last) = self.last_cursor {
            self.camera.orbit(position - last);
        }
        self.last_cursor = Some(position);
    }

    pub fn on_scroll(&mut self, amount: f32) {
        self.camera.zoom(amount);
    }
}
