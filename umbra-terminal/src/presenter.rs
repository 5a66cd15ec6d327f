/// Presents the device's default framebuffer as colored terminal characters
use crossterm::{
    style::{Color, Print, ResetColor, SetForegroundColor},
    QueueableCommand,
};
use nalgebra::Vector4;
use std::io::Write;

/// Character luminosity ramp for shading (darkest to lightest)
const LUMINOSITY_RAMP: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// Relative luminance of a linear color
fn luminance(color: &Vector4<f32>) -> f32 {
    (0.2126 * color.x + 0.7152 * color.y + 0.0722 * color.z).clamp(0.0, 1.0)
}

fn glyph(color: &Vector4<f32>) -> char {
    let index = (luminance(color) * (LUMINOSITY_RAMP.len() - 1) as f32).round() as usize;
    LUMINOSITY_RAMP[index.min(LUMINOSITY_RAMP.len() - 1)]
}

fn to_rgb(color: &Vector4<f32>) -> Color {
    let channel = |value: f32| (value.clamp(0.0, 1.0) * 255.0).round() as u8;
    Color::Rgb {
        r: channel(color.x),
        g: channel(color.y),
        b: channel(color.z),
    }
}

/// Write `pixels` (row 0 at the bottom) top row first, one cell per pixel.
///
/// Empty cells of the ramp are drawn as a full block in the pixel color so
/// the clear color still shows.
pub fn draw<W: Write>(
    writer: &mut W,
    pixels: &[Vector4<f32>],
    width: usize,
    height: usize,
) -> std::io::Result<()> {
    for y in (0..height).rev() {
        let row = &pixels[y * width..(y + 1) * width];
        for color in row {
            let c = match glyph(color) {
                ' ' => '█',
                c => c,
            };
            writer.queue(SetForegroundColor(to_rgb(color)))?;
            writer.queue(Print(c))?;
        }
        if y > 0 {
            writer.queue(Print("\r\n"))?;
        }
    }
    writer.queue(ResetColor)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glyph_follows_luminance() {
        assert_eq!(glyph(&Vector4::new(1.0, 1.0, 1.0, 1.0)), '@');
        assert_eq!(glyph(&Vector4::new(0.0, 0.0, 0.0, 1.0)), ' ');
        // Out-of-range input is clamped
        assert_eq!(glyph(&Vector4::new(5.0, 5.0, 5.0, 1.0)), '@');
    }

    #[test]
    fn test_rows_drawn_top_first() {
        let white = Vector4::new(1.0, 1.0, 1.0, 1.0);
        let grey = Vector4::new(0.3, 0.3, 0.3, 1.0);
        // Bottom row grey, top row white
        let pixels = vec![grey, grey, white, white];

        let mut out = Vec::new();
        draw(&mut out, &pixels, 2, 2).unwrap();
        let text = String::from_utf8(out).unwrap();

        let top = text.find('@').unwrap();
        let bottom = text.find('-').unwrap();
        assert!(top < bottom);
        assert_eq!(text.matches("\r\n").count(), 1);
        assert!(text.contains("38;2;255;255;255"));
    }
}
