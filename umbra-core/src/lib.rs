/// Umbra Core Library - Mesh ingestion and shadow-mapped rendering
///
/// This library turns OBJ mesh files into draw-ordered triangle buffers and
/// renders them in two passes on a software device: a depth pass from the
/// shadow-casting light, then a Blinn-Phong color pass that samples it.
pub mod camera;
pub mod config;
pub mod device;
pub mod error;
pub mod geometry;
pub mod obj;
pub mod renderer;
pub mod shading;
pub mod shadow;
pub mod texture;
pub mod transform;
pub mod triangulate;

// Re-export commonly used types
pub use camera::OrbitCamera;
pub use config::{Material, PointLight, SceneConfig, ShadowConfig, MAX_LIGHTS};
pub use device::Device;
pub use error::{
    ConfigError, IngestionError, RenderError, RenderTargetError, ShaderBuildError, TextureError,
};
pub use geometry::{AssembledVertex, MeshTables, TriangleBuffer, DEMO_SCENE_OBJ};
pub use obj::{load_obj, parse_obj};
pub use renderer::TwoPassRenderer;
pub use shadow::ShadowTarget;
pub use texture::TextureImage;
pub use transform::Transform;
pub use triangulate::{assemble, load_triangle_buffer, TriangulationMode};
