/// Two-pass shadow-mapped renderer
///
/// Pass 1 renders the mesh's depth from the shadow-casting light into the
/// `ShadowTarget`; it only reruns when the light or geometry changes.
/// Pass 2 runs every frame and shades the mesh into the default framebuffer,
/// comparing each fragment against the shadow map.

use nalgebra::{Matrix4, Vector3};

use crate::camera::OrbitCamera;
use crate::config::SceneConfig;
use crate::device::{
    BufferId, ClearFlags, CullFace, Device, FragmentStage, FramebufferStatus, ProgramId, TextureId,
    UniformValue, VertexStage,
};
use crate::error::{ConfigError, RenderError, RenderTargetError};
use crate::geometry::TriangleBuffer;
use crate::shading::{uniforms, DepthFragment, DepthVertex, PhongFragment, PhongVertex};
use crate::shadow::{ShadowTarget, SHADOW_UNIT};
use crate::texture::TextureImage;

/// Texture unit the color pass reads the albedo from
pub const DIFFUSE_UNIT: usize = 1;

/// Owns every device object the two passes use
#[derive(Debug)]
pub struct TwoPassRenderer {
    config: SceneConfig,
    shadow: ShadowTarget,
    vertex_buffer: BufferId,
    vertex_count: usize,
    depth_program: ProgramId,
    color_program: ProgramId,
    diffuse: TextureId,
    model: Matrix4<f32>,
    shadow_dirty: bool,
}

impl TwoPassRenderer {
    /// Upload the scene and render the initial shadow map
    pub fn new(
        device: &mut Device,
        buffer: &TriangleBuffer,
        diffuse: &TextureImage,
        config: SceneConfig,
    ) -> Result<Self, RenderError> {
        config.validate()?;

        let size = &config.shadow;
        let shadow = ShadowTarget::new(device, size.width, size.height, size.format)?;
        let vertex_buffer = device.create_vertex_buffer(buffer.vertices());
        let depth_program = build_program(device, Box::new(DepthVertex), Box::new(DepthFragment));
        let color_program = build_program(device, Box::new(PhongVertex), Box::new(PhongFragment));
        let diffuse = diffuse.upload(device);
        if depth_program.is_invalid() || color_program.is_invalid() {
            log::warn!("A pass program failed to build; its draws will be skipped");
        }

        log::info!(
            "Uploaded {} triangles, {} light(s), shadow map {}x{}",
            buffer.triangle_count(),
            config.lights.len(),
            config.shadow.width,
            config.shadow.height
        );

        let mut renderer = Self {
            config,
            shadow,
            vertex_buffer,
            vertex_count: buffer.len(),
            depth_program,
            color_program,
            diffuse,
            model: Matrix4::identity(),
            shadow_dirty: true,
        };
        renderer.render_shadow_pass(device)?;
        Ok(renderer)
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn shadow_target(&self) -> &ShadowTarget {
        &self.shadow
    }

    /// Whether the next [`render_frame`](Self::render_frame) reruns pass 1
    pub fn needs_shadow_pass(&self) -> bool {
        self.shadow_dirty
    }

    /// Choose the light whose terms are shadowed
    pub fn set_shadow_light(&mut self, index: usize) -> Result<(), ConfigError> {
        if index >= self.config.lights.len() {
            return Err(ConfigError::ShadowLightOutOfRange {
                index,
                count: self.config.lights.len(),
            });
        }
        if index != self.config.shadow_light {
            log::info!("Shadow-casting light is now #{index}");
            self.config.shadow_light = index;
            self.shadow_dirty = true;
        }
        Ok(())
    }

    /// Advance to the next light, wrapping around
    pub fn cycle_shadow_light(&mut self) -> usize {
        let next = (self.config.shadow_light + 1) % self.config.lights.len().max(1);
        if next != self.config.shadow_light {
            log::info!("Shadow-casting light is now #{next}");
            self.config.shadow_light = next;
            self.shadow_dirty = true;
        }
        next
    }

    pub fn set_model_matrix(&mut self, model: Matrix4<f32>) {
        self.model = model;
        self.mark_geometry_changed();
    }

    pub fn mark_geometry_changed(&mut self) {
        self.shadow_dirty = true;
    }

    /// Pass 1: depth from the shadow-casting light into the shadow target
    pub fn render_shadow_pass(&mut self, device: &mut Device) -> Result<(), RenderTargetError> {
        let light = *self.config.shadow_casting_light();
        self.shadow.update_light(&light.position, &self.config.shadow.projection);

        let mut scope = device.scope();
        scope.bind_framebuffer(Some(self.shadow.framebuffer()));
        let status = scope.check_framebuffer_status();
        if status != FramebufferStatus::Complete {
            return Err(RenderTargetError::Incomplete(status));
        }

        scope.clear(ClearFlags::DEPTH);
        scope.set_depth_test(true);
        scope.set_cull_face(Some(CullFace::Front));

        scope.use_program(Some(self.depth_program));
        scope.set_uniform(uniforms::PROJECTION, UniformValue::Mat4(*self.shadow.projection()));
        scope.set_uniform(uniforms::VIEW, UniformValue::Mat4(*self.shadow.view()));
        scope.set_uniform(uniforms::MODEL, UniformValue::Mat4(self.model));

        scope.bind_vertex_buffer(Some(self.vertex_buffer));
        scope.draw_arrays(0, self.vertex_count);

        log::debug!("Shadow pass: {:?}", scope.last_draw());
        self.shadow_dirty = false;
        Ok(())
    }

    /// Pass 2: shade the mesh into the default framebuffer
    pub fn render_color_pass(&self, device: &mut Device, camera: &OrbitCamera) {
        let config = &self.config;
        let mut scope = device.scope();

        scope.bind_framebuffer(None);
        scope.set_clear_color(config.clear_color);
        scope.clear(ClearFlags::COLOR | ClearFlags::DEPTH);
        scope.set_depth_test(true);

        scope.use_program(Some(self.color_program));
        scope.set_uniform(uniforms::PROJECTION, UniformValue::Mat4(camera.projection_matrix()));
        scope.set_uniform(uniforms::VIEW, UniformValue::Mat4(camera.view_matrix()));
        scope.set_uniform(uniforms::MODEL, UniformValue::Mat4(self.model));
        scope.set_uniform(uniforms::LIGHT_SPACE, UniformValue::Mat4(self.shadow.light_space()));

        scope.set_uniform(uniforms::KA, UniformValue::Vec3(config.material.ambient));
        scope.set_uniform(uniforms::KD, UniformValue::Vec3(config.material.diffuse));
        scope.set_uniform(uniforms::KS, UniformValue::Vec3(config.material.specular));
        let ambient = UniformValue::Vec3(config.ambient_intensity);
        scope.set_uniform(uniforms::AMBIENT_INTENSITY, ambient);
        scope.set_uniform(uniforms::SHININESS, UniformValue::Float(config.material.shininess));

        let positions: Vec<Vector3<f32>> =
            config.lights.iter().map(|light| light.position.coords).collect();
        let intensities: Vec<Vector3<f32>> =
            config.lights.iter().map(|light| light.intensity).collect();
        scope.set_uniform(uniforms::LIGHTS, UniformValue::Vec3Array(positions));
        scope.set_uniform(uniforms::INTENSITIES, UniformValue::Vec3Array(intensities));
        scope.set_uniform(uniforms::NUM_LIGHTS, UniformValue::Int(config.lights.len() as i32));
        scope.set_uniform(uniforms::SHADOW_LIGHT, UniformValue::Int(config.shadow_light as i32));

        scope.set_uniform(uniforms::SHADOW_TEX, UniformValue::Int(SHADOW_UNIT as i32));
        scope.set_uniform(uniforms::DIFFUSE_TEX, UniformValue::Int(DIFFUSE_UNIT as i32));
        scope.bind_texture(SHADOW_UNIT, Some(self.shadow.texture()));
        scope.bind_texture(DIFFUSE_UNIT, Some(self.diffuse));

        scope.bind_vertex_buffer(Some(self.vertex_buffer));
        scope.draw_arrays(0, self.vertex_count);

        log::trace!("Color pass: {:?}", scope.last_draw());
    }

    /// Rerun pass 1 if needed, then pass 2
    pub fn render_frame(
        &mut self,
        device: &mut Device,
        camera: &OrbitCamera,
    ) -> Result<(), RenderTargetError> {
        if self.shadow_dirty {
            self.render_shadow_pass(device)?;
        }
        self.render_color_pass(device, camera);
        Ok(())
    }

    /// Release every device object
    pub fn destroy(self, device: &mut Device) {
        self.shadow.destroy(device);
        device.delete_buffer(self.vertex_buffer);
        device.delete_program(self.depth_program);
        device.delete_program(self.color_program);
        device.delete_texture(self.diffuse);
    }
}

/// Link a program, logging failures and leaving an invalid handle behind
pub(crate) fn build_program(
    device: &mut Device,
    vertex: Box<dyn VertexStage>,
    fragment: Box<dyn FragmentStage>,
) -> ProgramId {
    match device.create_program(vertex, fragment) {
        Ok(id) => id,
        Err(err) => {
            log::error!("{err}");
            ProgramId::INVALID
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PointLight, ShadowConfig};
    use crate::device::{DeviceError, Fragment, Uniforms, Varyings};
    use crate::geometry::{AssembledVertex, DEMO_SCENE_OBJ};
    use crate::obj::parse_obj;
    use crate::triangulate::{assemble, TriangulationMode};
    use nalgebra::{Point3, Vector4};

    fn demo_buffer() -> TriangleBuffer {
        let tables = parse_obj(DEMO_SCENE_OBJ).unwrap();
        assemble(&tables, TriangulationMode::SlidingWindow).unwrap()
    }

    /// Single light nearly straight above the cube
    fn overhead_config() -> SceneConfig {
        SceneConfig {
            lights: vec![PointLight::new(Point3::new(2.0, 20.0, 1.0), 1.0)],
            shadow: ShadowConfig {
                width: 256,
                height: 256,
                ..ShadowConfig::default()
            },
            ..SceneConfig::default()
        }
    }

    fn demo_renderer(
        device: &mut Device,
        config: SceneConfig,
    ) -> Result<TwoPassRenderer, RenderError> {
        TwoPassRenderer::new(device, &demo_buffer(), &TextureImage::white(), config)
    }

    fn camera() -> OrbitCamera {
        OrbitCamera::new(Point3::new(10.0, 10.0, 14.0), 1.0)
    }

    #[test]
    fn test_shadow_round_trip() {
        let mut device = Device::new(32, 32);
        let renderer = demo_renderer(&mut device, overhead_config()).unwrap();
        let shadow = renderer.shadow_target();

        // Ground straight below the cube is occluded by its bottom face
        assert_eq!(shadow.visibility(&device, &Point3::new(0.0, 0.0, 0.0)), 0.0);
        // Ground well clear of the cube
        assert_eq!(shadow.visibility(&device, &Point3::new(4.0, 0.0, -3.0)), 1.0);
        // The cube's own top face is not shadowed by its bottom
        assert_eq!(shadow.visibility(&device, &Point3::new(0.0, 2.5, 0.0)), 1.0);
    }

    #[test]
    fn test_shadow_pass_culls_front_faces() {
        let mut device = Device::new(8, 8);
        let mut renderer = demo_renderer(&mut device, overhead_config()).unwrap();
        renderer.render_shadow_pass(&mut device).unwrap();

        let stats = device.last_draw();
        assert_eq!(stats.triangles_submitted, 14);
        // Ground, cube top and the lit sides never reach the depth map
        assert!(stats.triangles_rasterized < 14);
        assert!(stats.fragments_written > 0);
        assert_eq!(device.take_error(), None);
    }

    #[test]
    fn test_passes_restore_binding_state() {
        let mut device = Device::new(16, 16);
        let before = *device.state();

        let mut renderer = demo_renderer(&mut device, overhead_config()).unwrap();
        assert_eq!(device.state(), &before);

        renderer.render_color_pass(&mut device, &camera());
        assert_eq!(device.state(), &before);

        renderer.mark_geometry_changed();
        renderer.render_frame(&mut device, &camera()).unwrap();
        assert_eq!(device.state(), &before);
        assert!(!renderer.needs_shadow_pass());
    }

    #[test]
    fn test_color_pass_covers_scene() {
        let mut device = Device::new(32, 32);
        let config = overhead_config();
        let clear = config.clear_color;
        let renderer = demo_renderer(&mut device, config).unwrap();
        renderer.render_color_pass(&mut device, &camera());

        assert_eq!(device.take_error(), None);
        assert!(device.last_draw().fragments_written > 0);
        // The camera looks at the origin, which is behind the cube
        let center = device.color_buffer()[16 * 32 + 16];
        assert_ne!(center, clear);
        assert_eq!(center.w, 1.0);
        // The top row looks past the ground plane
        assert_eq!(device.color_buffer()[31 * 32], clear);
    }

    #[test]
    fn test_zoomed_camera_keeps_ground_in_front() {
        let mut device = Device::new(40, 40);
        let config = overhead_config();
        let clear = config.clear_color;
        let renderer = demo_renderer(&mut device, config).unwrap();

        // Near half of the ground quad now reaches behind the camera's near plane
        let mut camera = camera();
        for _ in 0..20 {
            camera.zoom(1.0);
        }
        renderer.render_color_pass(&mut device, &camera);

        assert_eq!(device.take_error(), None);
        assert_eq!(device.last_draw().triangles_rasterized, 14);
        assert_ne!(device.color_buffer()[20], clear);
    }

    #[test]
    fn test_incomplete_target_is_fatal() {
        let mut device = Device::new(8, 8);
        let mut renderer = demo_renderer(&mut device, overhead_config()).unwrap();
        let before = *device.state();

        device.delete_texture(renderer.shadow_target().texture());
        let err = renderer.render_shadow_pass(&mut device).unwrap_err();
        assert_eq!(err, RenderTargetError::Incomplete(FramebufferStatus::IncompleteAttachment));
        assert_eq!(device.state(), &before);
    }

    #[test]
    fn test_invalid_config_rejected_before_upload() {
        let mut device = Device::new(8, 8);
        let mut config = overhead_config();
        config.shadow.width = 0;
        let err = demo_renderer(&mut device, config).unwrap_err();
        assert!(matches!(err, RenderError::Target(RenderTargetError::ZeroSize { .. })));

        let mut config = overhead_config();
        config.shadow_light = 3;
        let err = demo_renderer(&mut device, config).unwrap_err();
        assert!(matches!(err, RenderError::Config(ConfigError::ShadowLightOutOfRange { .. })));
    }

    #[test]
    fn test_shadow_light_selection() {
        let mut device = Device::new(8, 8);
        let config = SceneConfig {
            shadow: ShadowConfig {
                width: 64,
                height: 64,
                ..ShadowConfig::default()
            },
            ..SceneConfig::default()
        };
        let mut renderer = demo_renderer(&mut device, config).unwrap();
        assert!(!renderer.needs_shadow_pass());

        assert!(renderer.set_shadow_light(3).is_err());
        assert!(!renderer.needs_shadow_pass());

        assert_eq!(renderer.cycle_shadow_light(), 1);
        assert!(renderer.needs_shadow_pass());
        renderer.render_frame(&mut device, &camera()).unwrap();
        assert!(!renderer.needs_shadow_pass());
        assert_eq!(renderer.cycle_shadow_light(), 2);
        assert_eq!(renderer.cycle_shadow_light(), 0);
    }

    #[test]
    fn test_cycling_single_light_keeps_shadow_map() {
        let mut device = Device::new(8, 8);
        let mut renderer = demo_renderer(&mut device, overhead_config()).unwrap();

        assert_eq!(renderer.cycle_shadow_light(), 0);
        assert_eq!(renderer.config().shadow_light, 0);
        assert!(!renderer.needs_shadow_pass());
    }

    struct BrokenFragment;

    impl FragmentStage for BrokenFragment {
        fn name(&self) -> &str {
            "broken.fs"
        }

        fn inputs(&self) -> usize {
            0
        }

        fn compile(&self) -> Result<(), String> {
            Err("undeclared identifier `albedo`".to_string())
        }

        fn shade(&self, _: &Fragment<'_>) -> Option<Vector4<f32>> {
            None
        }
    }

    struct Origin;

    impl VertexStage for Origin {
        fn name(&self) -> &str {
            "origin.vs"
        }

        fn outputs(&self) -> usize {
            0
        }

        fn shade(&self, _: &Uniforms, vertex: &AssembledVertex, _: &mut Varyings) -> Vector4<f32> {
            vertex.position
        }
    }

    #[test]
    fn test_link_failure_leaves_invalid_program() {
        let mut device = Device::new(4, 4);
        let program = build_program(&mut device, Box::new(Origin), Box::new(BrokenFragment));
        assert!(program.is_invalid());

        let buffer = device.create_vertex_buffer(demo_buffer().vertices());
        device.use_program(Some(program));
        device.bind_vertex_buffer(Some(buffer));
        device.draw_arrays(0, 3);
        assert!(matches!(device.take_error(), Some(DeviceError::InvalidOperation(_))));
        assert_eq!(device.last_draw().fragments_written, 0);
    }

    #[test]
    fn test_destroy_releases_objects() {
        let mut device = Device::new(4, 4);
        let renderer = demo_renderer(&mut device, overhead_config()).unwrap();
        let shadow_texture = renderer.shadow_target().texture();
        renderer.destroy(&mut device);
        assert!(device.texture(shadow_texture).is_none());
    }
}
