/// Albedo texture loading

use std::path::Path;

use image::{imageops, DynamicImage};

use crate::device::{Device, Filter, SamplerParams, TextureId, Wrap};
use crate::error::TextureError;

/// Decoded RGBA8 image, rows stored bottom row first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub name: String,
}

impl TextureImage {
    /// Load texture from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TextureError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        let img = image::open(path).map_err(|source| TextureError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        let texture = Self::from_image(img, &name);
        log::info!("Loaded texture {name} ({}x{})", texture.width, texture.height);
        Ok(texture)
    }

    /// Image files store the top row first; texture row 0 is the bottom
    fn from_image(img: DynamicImage, name: &str) -> Self {
        let rgba = imageops::flip_vertical(&img.to_rgba8());
        let (width, height) = rgba.dimensions();

        Self {
            width,
            height,
            data: rgba.into_raw(),
            name: name.to_string(),
        }
    }

    /// Create a solid color texture
    pub fn solid_color(color: [u8; 4], name: &str) -> Self {
        Self {
            width: 1,
            height: 1,
            data: color.to_vec(),
            name: name.to_string(),
        }
    }

    /// Stand-in albedo for meshes drawn without a texture
    pub fn white() -> Self {
        Self::solid_color([255, 255, 255, 255], "white")
    }

    /// Upload into a new device texture with linear filtering and repeat wrap
    pub fn upload(&self, device: &mut Device) -> TextureId {
        let id = device.create_texture_rgba8(self.width, self.height, &self.data);
        device.set_sampler(
            id,
            SamplerParams {
                filter: Filter::Linear,
                wrap: Wrap::Repeat,
                compare: None,
            },
        );
        id
    }
}
