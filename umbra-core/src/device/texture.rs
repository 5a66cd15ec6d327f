/// Texture storage and sampling

use nalgebra::{Vector2, Vector4};

/// Texel storage format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8,
    Depth16,
    Depth24,
    Depth32Float,
}

impl TextureFormat {
    pub fn is_depth(&self) -> bool {
        !matches!(self, TextureFormat::Rgba8)
    }

    pub fn depth_bits(&self) -> Option<u32> {
        match self {
            TextureFormat::Rgba8 => None,
            TextureFormat::Depth16 => Some(16),
            TextureFormat::Depth24 => Some(24),
            TextureFormat::Depth32Float => Some(32),
        }
    }

    /// Round a window-space depth to what this format can store
    pub(crate) fn quantize(&self, depth: f32) -> f32 {
        let levels = match self {
            TextureFormat::Depth16 => 65_535.0,
            TextureFormat::Depth24 => 16_777_215.0,
            TextureFormat::Rgba8 | TextureFormat::Depth32Float => return depth,
        };
        (depth.clamp(0.0, 1.0) * levels).round() / levels
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wrap {
    ClampToEdge,
    Repeat,
}

/// Depth comparison applied as `reference <op> stored`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareFunc {
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Always,
    Never,
}

impl CompareFunc {
    pub fn passes(&self, reference: f32, stored: f32) -> bool {
        match self {
            CompareFunc::Less => reference < stored,
            CompareFunc::LessEqual => reference <= stored,
            CompareFunc::Greater => reference > stored,
            CompareFunc::GreaterEqual => reference >= stored,
            CompareFunc::Always => true,
            CompareFunc::Never => false,
        }
    }
}

/// How a texture is read from a fragment stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerParams {
    pub filter: Filter,
    pub wrap: Wrap,
    /// When set, depth reads return a 0.0/1.0 comparison result instead of depth
    pub compare: Option<CompareFunc>,
}

impl Default for SamplerParams {
    fn default() -> Self {
        Self {
            filter: Filter::Linear,
            wrap: Wrap::ClampToEdge,
            compare: None,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Texels {
    Color(Vec<Vector4<f32>>),
    Depth(Vec<f32>),
}

/// A 2D texture. Row 0 is the bottom row.
#[derive(Debug, Clone)]
pub struct TextureObject {
    width: usize,
    height: usize,
    format: TextureFormat,
    pub(crate) sampler: SamplerParams,
    pub(crate) texels: Texels,
}

impl TextureObject {
    pub(crate) fn new(width: u32, height: u32, format: TextureFormat) -> Self {
        let (width, height) = (width as usize, height as usize);
        let texels = if format.is_depth() {
            Texels::Depth(vec![1.0; width * height])
        } else {
            Texels::Color(vec![Vector4::zeros(); width * height])
        };

        Self {
            width,
            height,
            format,
            sampler: SamplerParams::default(),
            texels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width as u32
    }

    pub fn height(&self) -> u32 {
        self.height as u32
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub fn sampler(&self) -> SamplerParams {
        self.sampler
    }

    /// Stored depth at a texel, `None` for color textures or out of bounds
    pub fn depth_at(&self, x: usize, y: usize) -> Option<f32> {
        match &self.texels {
            Texels::Depth(depth) if x < self.width && y < self.height => {
                depth.get(y * self.width + x).copied()
            }
            _ => None,
        }
    }

    /// Filtered read. Depth textures return `(d, d, d, 1)` or, in compare
    /// mode, the comparison result against `reference` in every channel.
    pub fn sample(&self, uv: Vector2<f32>, reference: f32) -> Vector4<f32> {
        let fetch = |x: usize, y: usize| -> Vector4<f32> {
            let index = y * self.width + x;
            match &self.texels {
                Texels::Color(color) => color.get(index).copied().unwrap_or_else(opaque_black),
                Texels::Depth(depth) => {
                    let stored = depth.get(index).copied().unwrap_or(1.0);
                    let value = match self.sampler.compare {
                        Some(compare) => f32::from(u8::from(compare.passes(reference, stored))),
                        None => stored,
                    };
                    Vector4::new(value, value, value, 1.0)
                }
            }
        };

        if self.width == 0 || self.height == 0 {
            return opaque_black();
        }

        match self.sampler.filter {
            Filter::Nearest => {
                let x = self.wrap_coord((uv.x * self.width as f32).floor() as i64, self.width);
                let y = self.wrap_coord((uv.y * self.height as f32).floor() as i64, self.height);
                fetch(x, y)
            }
            Filter::Linear => {
                let sx = uv.x * self.width as f32 - 0.5;
                let sy = uv.y * self.height as f32 - 0.5;
                let (x0, y0) = (sx.floor(), sy.floor());
                let (fx, fy) = (sx - x0, sy - y0);

                let xa = self.wrap_coord(x0 as i64, self.width);
                let xb = self.wrap_coord(x0 as i64 + 1, self.width);
                let ya = self.wrap_coord(y0 as i64, self.height);
                let yb = self.wrap_coord(y0 as i64 + 1, self.height);

                let bottom = fetch(xa, ya) * (1.0 - fx) + fetch(xb, ya) * fx;
                let top = fetch(xa, yb) * (1.0 - fx) + fetch(xb, yb) * fx;
                bottom * (1.0 - fy) + top * fy
            }
        }
    }

    fn wrap_coord(&self, coord: i64, size: usize) -> usize {
        let size = size as i64;
        match self.sampler.wrap {
            Wrap::ClampToEdge => coord.clamp(0, size - 1) as usize,
            Wrap::Repeat => coord.rem_euclid(size) as usize,
        }
    }

    pub(crate) fn fill_depth(&mut self, value: f32) {
        if let Texels::Depth(depth) = &mut self.texels {
            depth.fill(value);
        }
    }

    pub(crate) fn fill_color(&mut self, value: Vector4<f32>) {
        if let Texels::Color(color) = &mut self.texels {
            color.fill(value);
        }
    }

    /// Replace color texels from tightly packed RGBA8 rows, bottom row first
    pub(crate) fn upload_rgba8(&mut self, pixels: &[u8]) {
        if let Texels::Color(color) = &mut self.texels {
            for (texel, rgba) in color.iter_mut().zip(pixels.chunks_exact(4)) {
                *texel = Vector4::new(
                    f32::from(rgba[0]) / 255.0,
                    f32::from(rgba[1]) / 255.0,
                    f32::from(rgba[2]) / 255.0,
                    f32::from(rgba[3]) / 255.0,
                );
            }
        }
    }
}

fn opaque_black() -> Vector4<f32> {
    Vector4::new(0.0, 0.0, 0.0, 1.0)
}
