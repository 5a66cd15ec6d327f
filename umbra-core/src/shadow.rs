/// Depth-only render destination sampled by the color pass

use nalgebra::{Matrix4, Point3, Vector2, Vector3, Vector4};

use crate::config::LightProjection;
use crate::device::{
    CompareFunc, Device, Filter, FramebufferId, FramebufferStatus, SamplerParams, TextureFormat,
    TextureId, Wrap,
};
use crate::error::RenderTargetError;
use crate::transform::Transform;

/// Texture unit the color pass reads the shadow map from
pub const SHADOW_UNIT: usize = 0;

/// A depth texture plus the framebuffer that renders into it.
///
/// The texture samples in compare mode, so reads return 1.0 where the
/// reference depth is at or in front of the stored depth and 0.0 otherwise.
#[derive(Debug)]
pub struct ShadowTarget {
    texture: TextureId,
    framebuffer: FramebufferId,
    width: u32,
    height: u32,
    view: Matrix4<f32>,
    projection: Matrix4<f32>,
}

impl ShadowTarget {
    pub fn new(
        device: &mut Device,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Result<Self, RenderTargetError> {
        if width == 0 || height == 0 {
            return Err(RenderTargetError::ZeroSize { width, height });
        }
        if format.depth_bits().unwrap_or(0) < 24 {
            return Err(RenderTargetError::InsufficientPrecision(format));
        }

        let texture = device.create_texture(width, height, format);
        device.set_sampler(
            texture,
            SamplerParams {
                filter: Filter::Nearest,
                wrap: Wrap::ClampToEdge,
                compare: Some(CompareFunc::LessEqual),
            },
        );
        let framebuffer = device.create_framebuffer();
        device.attach_depth(framebuffer, Some(texture));

        log::debug!("Created {width}x{height} {format:?} shadow target");

        Ok(Self {
            texture,
            framebuffer,
            width,
            height,
            view: Matrix4::identity(),
            projection: Matrix4::identity(),
        })
    }

    pub fn texture(&self) -> TextureId {
        self.texture
    }

    pub fn framebuffer(&self) -> FramebufferId {
        self.framebuffer
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Light view matrix of the last update
    pub fn view(&self) -> &Matrix4<f32> {
        &self.view
    }

    /// Light projection matrix of the last update
    pub fn projection(&self) -> &Matrix4<f32> {
        &self.projection
    }

    /// Maps world space to the light's clip space
    pub fn light_space(&self) -> Matrix4<f32> {
        self.projection * self.view
    }

    /// Aim the light at the origin from `position`
    pub fn update_light(&mut self, position: &Point3<f32>, projection: &LightProjection) {
        self.view = Transform::look_at(position, &Point3::origin(), &Vector3::y());
        self.projection = Transform::perspective(
            projection.fov_y,
            self.width as f32 / self.height as f32,
            projection.near,
            projection.far,
        );
    }

    pub fn status(&self, device: &Device) -> FramebufferStatus {
        device.framebuffer_status(self.framebuffer)
    }

    /// Comparison fetch for a world-space point: 1.0 lit, 0.0 shadowed
    pub fn visibility(&self, device: &Device, world_point: &Point3<f32>) -> f32 {
        let light_clip = self.light_space() * world_point.to_homogeneous();
        match shadow_lookup(&light_clip) {
            Some((uv, reference)) => device
                .texture(self.texture)
                .map_or(1.0, |texture| texture.sample(uv, reference).x),
            None => 1.0,
        }
    }

    /// Delete the texture and framebuffer together
    pub fn destroy(self, device: &mut Device) {
        device.delete_framebuffer(self.framebuffer);
        device.delete_texture(self.texture);
    }
}

/// Shadow map coordinates and reference depth for a light clip-space
/// position. `None` when the point is behind the light.
pub fn shadow_lookup(light_clip: &Vector4<f32>) -> Option<(Vector2<f32>, f32)> {
    if light_clip.w <= 1e-6 {
        return None;
    }
    let ndc = light_clip.xyz() / light_clip.w;
    Some((
        Vector2::new(ndc.x * 0.5 + 0.5, ndc.y * 0.5 + 0.5),
        ndc.z * 0.5 + 0.5,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_new_configures_compare_sampling() {
        let mut device = Device::new(4, 4);
        let target = ShadowTarget::new(&mut device, 64, 32, TextureFormat::Depth24).unwrap();

        assert_eq!(target.status(&device), FramebufferStatus::Complete);
        let texture = device.texture(target.texture()).unwrap();
        assert_eq!((texture.width(), texture.height()), (64, 32));
        assert_eq!(
            texture.sampler(),
            SamplerParams {
                filter: Filter::Nearest,
                wrap: Wrap::ClampToEdge,
                compare: Some(CompareFunc::LessEqual),
            }
        );
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let mut device = Device::new(4, 4);
        assert_eq!(
            ShadowTarget::new(&mut device, 0, 16, TextureFormat::Depth32Float).unwrap_err(),
            RenderTargetError::ZeroSize { width: 0, height: 16 }
        );
        assert_eq!(
            ShadowTarget::new(&mut device, 16, 16, TextureFormat::Depth16).unwrap_err(),
            RenderTargetError::InsufficientPrecision(TextureFormat::Depth16)
        );
        assert!(ShadowTarget::new(&mut device, 16, 16, TextureFormat::Rgba8).is_err());
    }

    #[test]
    fn test_light_space_is_projection_times_view() {
        let mut device = Device::new(4, 4);
        let mut target =
            ShadowTarget::new(&mut device, 16, 16, TextureFormat::Depth32Float).unwrap();
        target.update_light(&Point3::new(100.0, 40.0, 50.0), &LightProjection::default());

        // The origin lands in the middle of the shadow map
        let clip = target.light_space() * Vector4::new(0.0, 0.0, 0.0, 1.0);
        let (uv, reference) = shadow_lookup(&clip).unwrap();
        assert_relative_eq!(uv, Vector2::new(0.5, 0.5), epsilon = 1e-4);
        assert!(reference > 0.0 && reference < 1.0);
        assert_relative_eq!(
            target.light_space(),
            target.projection() * target.view(),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_cleared_target_is_fully_lit() {
        let mut device = Device::new(4, 4);
        let mut target =
            ShadowTarget::new(&mut device, 16, 16, TextureFormat::Depth32Float).unwrap();
        target.update_light(&Point3::new(0.0, 20.0, 5.0), &LightProjection::default());
        assert_eq!(target.visibility(&device, &Point3::new(0.0, 0.0, 0.0)), 1.0);
        // Behind the light
        assert_eq!(target.visibility(&device, &Point3::new(0.0, 40.0, 10.0)), 1.0);
    }

    #[test]
    fn test_destroy_releases_both_objects() {
        let mut device = Device::new(4, 4);
        let target = ShadowTarget::new(&mut device, 8, 8, TextureFormat::Depth32Float).unwrap();
        let (texture, framebuffer) = (target.texture(), target.framebuffer());
        target.destroy(&mut device);

        assert!(device.texture(texture).is_none());
        assert_eq!(device.framebuffer_status(framebuffer), FramebufferStatus::IncompleteAttachment);
    }
}
