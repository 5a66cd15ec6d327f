/// Error types for ingestion, shader linking and render targets

use std::path::PathBuf;
use thiserror::Error;

use crate::device::FramebufferStatus;

/// Attribute table a face index points into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Position,
    TexCoord,
    Normal,
}

impl std::fmt::Display for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Attribute::Position => "position",
            Attribute::TexCoord => "texture coordinate",
            Attribute::Normal => "normal",
        };
        f.write_str(name)
    }
}

/// Failure while reading a mesh file or resolving its faces
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Failed to open mesh file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Line {line}: invalid number {token:?}")]
    InvalidNumber { line: usize, token: String },
    #[error("Line {line}: `{directive}` needs at least {expected} values")]
    MissingComponent {
        line: usize,
        directive: &'static str,
        expected: usize,
    },
    #[error("Line {line}: invalid face vertex {token:?}")]
    InvalidFaceVertex { line: usize, token: String },
    #[error("Line {line}: face has {count} vertices, at least 3 are required")]
    DegenerateFace { line: usize, count: usize },
    #[error("Line {line}: {attribute} index {index} is out of range (table holds {len})")]
    IndexOutOfRange {
        line: usize,
        attribute: Attribute,
        index: usize,
        len: usize,
    },
}

/// Failure while compiling or linking a device program
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShaderBuildError {
    #[error("Shader failed to compile: {0}")]
    Compile(String),
    #[error("Error linking program: {0}")]
    Link(String),
}

/// The shadow render destination cannot be used
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderTargetError {
    #[error("Shadow target size must be non-zero, got {width}x{height}")]
    ZeroSize { width: u32, height: u32 },
    #[error("Depth format {0:?} has fewer than 24 bits of precision")]
    InsufficientPrecision(crate::device::TextureFormat),
    #[error("Shadow framebuffer is incomplete: {0:?}")]
    Incomplete(FramebufferStatus),
}

/// Scene configuration rejected before startup
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("At least one light is required")]
    NoLights,
    #[error("{count} lights configured, at most {max} are supported")]
    TooManyLights { count: usize, max: usize },
    #[error("Shadow light index {index} out of range for {count} lights")]
    ShadowLightOutOfRange { index: usize, count: usize },
    #[error("Target frame rate must be non-zero")]
    ZeroFrameRate,
}

/// Texture file could not be decoded
#[derive(Error, Debug)]
pub enum TextureError {
    #[error("Failed to decode texture {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Any error that aborts startup
#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Ingestion(#[from] IngestionError),
    #[error(transparent)]
    Shader(#[from] ShaderBuildError),
    #[error(transparent)]
    Target(#[from] RenderTargetError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Texture(#[from] TextureError),
}
