/// Scene, lighting and shadow configuration
use nalgebra::{Point3, Vector3, Vector4};

use crate::device::TextureFormat;
use crate::error::ConfigError;
use crate::triangulate::TriangulationMode;

/// Upper bound on point lights the shading program accepts
pub const MAX_LIGHTS: usize = 8;

/// A point light with a per-channel intensity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Point3<f32>,
    pub intensity: Vector3<f32>,
}

impl PointLight {
    pub fn new(position: Point3<f32>, intensity: f32) -> Self {
        Self {
            position,
            intensity: Vector3::repeat(intensity),
        }
    }
}

/// Perspective frustum used to render the shadow map
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightProjection {
    /// Full vertical field of view in degrees
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for LightProjection {
    fn default() -> Self {
        Self {
            fov_y: 30.0,
            near: 1.0,
            far: 250.0,
        }
    }
}

/// Shadow map allocation parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowConfig {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub projection: LightProjection,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 1024,
            format: TextureFormat::Depth32Float,
            projection: LightProjection::default(),
        }
    }
}

/// Material coefficients for the Blinn-Phong pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub ambient: Vector3<f32>,
    pub diffuse: Vector3<f32>,
    pub specular: Vector3<f32>,
    pub shininess: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            ambient: Vector3::repeat(0.3),
            diffuse: Vector3::repeat(0.6),
            specular: Vector3::repeat(0.6),
            shininess: 100.0,
        }
    }
}

/// Everything the renderer needs besides the mesh and the camera
#[derive(Debug, Clone, PartialEq)]
pub struct SceneConfig {
    pub lights: Vec<PointLight>,
    /// Index of the light that casts the shadow
    pub shadow_light: usize,
    pub ambient_intensity: Vector3<f32>,
    pub material: Material,
    pub clear_color: Vector4<f32>,
    pub shadow: ShadowConfig,
    pub target_fps: u32,
    pub triangulation: TriangulationMode,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            lights: vec![
                PointLight::new(Point3::new(100.0, 40.0, 50.0), 0.9),
                PointLight::new(Point3::new(-100.0, 40.0, 50.0), 0.2),
                PointLight::new(Point3::new(100.0, 40.0, -50.0), 0.2),
            ],
            shadow_light: 0,
            ambient_intensity: Vector3::repeat(0.3),
            material: Material::default(),
            clear_color: Vector4::new(46.0 / 255.0, 56.0 / 255.0, 71.0 / 255.0, 1.0),
            shadow: ShadowConfig::default(),
            target_fps: 60,
            triangulation: TriangulationMode::SlidingWindow,
        }
    }
}

impl SceneConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lights.is_empty() {
            return Err(ConfigError::NoLights);
        }
        if self.lights.len() > MAX_LIGHTS {
            return Err(ConfigError::TooManyLights {
                count: self.lights.len(),
                max: MAX_LIGHTS,
            });
        }
        if self.shadow_light >= self.lights.len() {
            return Err(ConfigError::ShadowLightOutOfRange {
                index: self.shadow_light,
                count: self.lights.len(),
            });
        }
        if self.target_fps == 0 {
            return Err(ConfigError::ZeroFrameRate);
        }
        Ok(())
    }

    /// Wall-clock budget of one frame
    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(1000 / u64::from(self.target_fps.max(1)))
    }

    pub fn shadow_casting_light(&self) -> &PointLight {
        &self.lights[self.shadow_light.min(self.lights.len().saturating_sub(1))]
    }
}
