/// Triangle setup and scan conversion

use nalgebra::{Vector3, Vector4};

use super::program::{Varyings, MAX_VARYINGS};
use super::texture::TextureFormat;
use super::CullFace;

/// Vertices with `w` at or below this cannot be projected
const MIN_CLIP_W: f32 = 1e-6;

/// Output of the vertex stage for one vertex
#[derive(Debug, Clone, Copy)]
pub(crate) struct ClipVertex {
    pub clip: Vector4<f32>,
    pub varyings: Varyings,
}

/// Attachments a draw writes into; the viewport covers them entirely
pub(crate) struct RasterTarget<'a> {
    pub width: usize,
    pub height: usize,
    pub color: Option<&'a mut [Vector4<f32>]>,
    pub depth: Option<&'a mut [f32]>,
    pub depth_format: TextureFormat,
}

/// Fixed-function state for one draw
#[derive(Debug, Clone, Copy)]
pub(crate) struct RasterState {
    pub depth_test: bool,
    pub cull_face: Option<CullFace>,
    pub varying_count: usize,
}

/// Window-space vertex: x/y in pixels (y up), z in [0, 1]
#[derive(Debug, Clone, Copy)]
struct WindowVertex {
    x: f32,
    y: f32,
    z: f32,
    inv_w: f32,
}

/// Clip one triangle against the near plane and scan-convert what is left.
/// Returns the number of fragments written, or `None` when nothing reached
/// rasterization.
pub(crate) fn rasterize_triangle<F>(
    target: &mut RasterTarget<'_>,
    state: &RasterState,
    vertices: &[ClipVertex; 3],
    mut shade: F,
) -> Option<usize>
where
    F: FnMut(Vector3<f32>, &Varyings) -> Option<Vector4<f32>>,
{
    let polygon = clip_near(vertices, state.varying_count.min(MAX_VARYINGS));
    if polygon.len() < 3 {
        return None;
    }

    let mut written = None;
    for corner in 1..polygon.len() - 1 {
        let triangle = [polygon[0], polygon[corner], polygon[corner + 1]];
        if let Some(count) = scan_triangle(target, state, &triangle, &mut shade) {
            written = Some(written.unwrap_or(0) + count);
        }
    }
    written
}

/// Sutherland-Hodgman against `z >= -w`; winding order is preserved and the
/// result has zero, three or four vertices
fn clip_near(vertices: &[ClipVertex; 3], varying_count: usize) -> Vec<ClipVertex> {
    let distance = |v: &ClipVertex| v.clip.z + v.clip.w;
    let mut polygon = Vec::with_capacity(4);

    for (index, current) in vertices.iter().enumerate() {
        let next = &vertices[(index + 1) % 3];
        let (d_current, d_next) = (distance(current), distance(next));

        if d_current >= 0.0 {
            polygon.push(*current);
        }
        if (d_current >= 0.0) != (d_next >= 0.0) {
            let t = d_current / (d_current - d_next);
            let mut varyings = [0.0; MAX_VARYINGS];
            for (slot, value) in varyings.iter_mut().enumerate().take(varying_count) {
                let (from, to) = (current.varyings[slot], next.varyings[slot]);
                *value = from + t * (to - from);
            }
            polygon.push(ClipVertex {
                clip: current.clip.lerp(&next.clip, t),
                varyings,
            });
        }
    }

    polygon
}

fn scan_triangle<F>(
    target: &mut RasterTarget<'_>,
    state: &RasterState,
    vertices: &[ClipVertex; 3],
    shade: &mut F,
) -> Option<usize>
where
    F: FnMut(Vector3<f32>, &Varyings) -> Option<Vector4<f32>>,
{
    // Degenerate projections (e.g. an unset matrix) still leave w at zero
    if vertices.iter().any(|v| v.clip.w <= MIN_CLIP_W) {
        return None;
    }

    let window = (*vertices).map(|v| to_window(&v.clip, target.width, target.height));
    let area = (window[1].x - window[0].x) * (window[2].y - window[0].y)
        - (window[2].x - window[0].x) * (window[1].y - window[0].y);
    if area.abs() < 1e-9 {
        return None;
    }

    let front_facing = area > 0.0;
    match state.cull_face {
        Some(CullFace::Front) if front_facing => return None,
        Some(CullFace::Back) if !front_facing => return None,
        Some(CullFace::FrontAndBack) => return None,
        _ => {}
    }

    // Bounding box clipped to the viewport
    let min_x = window.iter().map(|v| v.x).fold(f32::INFINITY, f32::min).floor().max(0.0) as i64;
    let max_x = window.iter().map(|v| v.x).fold(f32::NEG_INFINITY, f32::max).ceil() as i64;
    let min_y = window.iter().map(|v| v.y).fold(f32::INFINITY, f32::min).floor().max(0.0) as i64;
    let max_y = window.iter().map(|v| v.y).fold(f32::NEG_INFINITY, f32::max).ceil() as i64;
    let max_x = max_x.min(target.width as i64 - 1);
    let max_y = max_y.min(target.height as i64 - 1);

    let count = state.varying_count.min(MAX_VARYINGS);
    let mut written = 0;

    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let px = x as f32 + 0.5;
            let py = y as f32 + 0.5;

            let Some((w0, w1, w2)) = barycentric(
                (window[0].x, window[0].y),
                (window[1].x, window[1].y),
                (window[2].x, window[2].y),
                (px, py),
            ) else {
                continue;
            };
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }

            let depth = w0 * window[0].z + w1 * window[1].z + w2 * window[2].z;
            if !(0.0..=1.0).contains(&depth) {
                continue;
            }

            let index = y as usize * target.width + x as usize;
            if state.depth_test {
                if let Some(stored) = target.depth.as_ref().and_then(|d| d.get(index)) {
                    if depth >= *stored {
                        continue;
                    }
                }
            }

            // Perspective-correct interpolation
            let weights = [
                w0 * window[0].inv_w,
                w1 * window[1].inv_w,
                w2 * window[2].inv_w,
            ];
            let total = weights[0] + weights[1] + weights[2];
            let mut varyings = [0.0; MAX_VARYINGS];
            for (slot, value) in varyings.iter_mut().enumerate().take(count) {
                *value = (weights[0] * vertices[0].varyings[slot]
                    + weights[1] * vertices[1].varyings[slot]
                    + weights[2] * vertices[2].varyings[slot])
                    / total;
            }

            let Some(color) = shade(Vector3::new(px, py, depth), &varyings) else {
                continue;
            };

            if let Some(buffer) = target.color.as_deref_mut() {
                buffer[index] = color;
            }
            if state.depth_test {
                if let Some(buffer) = target.depth.as_deref_mut() {
                    buffer[index] = target.depth_format.quantize(depth);
                }
            }
            written += 1;
        }
    }

    Some(written)
}

fn to_window(clip: &Vector4<f32>, width: usize, height: usize) -> WindowVertex {
    let inv_w = 1.0 / clip.w;
    let ndc = clip.xyz() * inv_w;
    WindowVertex {
        x: (ndc.x + 1.0) * 0.5 * width as f32,
        y: (ndc.y + 1.0) * 0.5 * height as f32,
        z: ndc.z * 0.5 + 0.5,
        inv_w,
    }
}

/// Calculate barycentric coordinates for a point in a triangle
fn barycentric(
    v0: (f32, f32),
    v1: (f32, f32),
    v2: (f32, f32),
    p: (f32, f32),
) -> Option<(f32, f32, f32)> {
    let denom = (v1.1 - v2.1) * (v0.0 - v2.0) + (v2.0 - v1.0) * (v0.1 - v2.1);

    if denom.abs() < 1e-6 {
        return None;
    }

    let w0 = ((v1.1 - v2.1) * (p.0 - v2.0) + (v2.0 - v1.0) * (p.1 - v2.1)) / denom;
    let w1 = ((v2.1 - v0.1) * (p.0 - v2.0) + (v0.0 - v2.0) * (p.1 - v2.1)) / denom;
    let w2 = 1.0 - w0 - w1;

    Some((w0, w1, w2))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(x: f32, y: f32, z: f32) -> ClipVertex {
        ClipVertex {
            clip: Vector4::new(x, y, z, 1.0),
            varyings: [0.0; MAX_VARYINGS],
        }
    }

    fn state(cull_face: Option<CullFace>) -> RasterState {
        RasterState {
            depth_test: true,
            cull_face,
            varying_count: 0,
        }
    }

    #[test]
    fn test_barycentric_at_vertex() {
        let (w0, w1, w2) = barycentric((0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (0.0, 0.0)).unwrap();
        assert!((w0 - 1.0).abs() < 1e-6);
        assert!(w1.abs() < 1e-6);
        assert!(w2.abs() < 1e-6);
        assert!(barycentric((0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (0.5, 0.5)).is_none());
    }

    #[test]
    fn test_full_screen_triangle_covers_target() {
        let mut color = vec![Vector4::zeros(); 16];
        let mut depth = vec![1.0; 16];
        let mut target = RasterTarget {
            width: 4,
            height: 4,
            color: Some(color.as_mut_slice()),
            depth: Some(depth.as_mut_slice()),
            depth_format: TextureFormat::Depth32Float,
        };
        let triangle = [clip(-1.0, -1.0, 0.0), clip(3.0, -1.0, 0.0), clip(-1.0, 3.0, 0.0)];
        let white = Vector4::new(1.0, 1.0, 1.0, 1.0);

        let written = rasterize_triangle(&mut target, &state(None), &triangle, |_, _| Some(white));
        assert_eq!(written, Some(16));
        assert!(color.iter().all(|c| *c == white));
        assert!(depth.iter().all(|d| (*d - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_cull_by_winding() {
        let mut depth = vec![1.0; 16];
        let mut target = RasterTarget {
            width: 4,
            height: 4,
            color: None,
            depth: Some(depth.as_mut_slice()),
            depth_format: TextureFormat::Depth32Float,
        };
        let ccw = [clip(-1.0, -1.0, 0.0), clip(1.0, -1.0, 0.0), clip(-1.0, 1.0, 0.0)];
        let cw = [ccw[0], ccw[2], ccw[1]];
        let shade = |_: Vector3<f32>, _: &Varyings| Some(Vector4::zeros());

        let (front, back) = (state(Some(CullFace::Front)), state(Some(CullFace::Back)));

        assert!(rasterize_triangle(&mut target, &front, &ccw, shade).is_none());
        assert!(rasterize_triangle(&mut target, &back, &cw, shade).is_none());
        assert!(rasterize_triangle(&mut target, &front, &cw, shade).is_some());
    }

    #[test]
    fn test_depth_test_keeps_nearest() {
        let mut depth = vec![1.0; 4];
        let mut color = vec![Vector4::zeros(); 4];
        let mut target = RasterTarget {
            width: 2,
            height: 2,
            color: Some(color.as_mut_slice()),
            depth: Some(depth.as_mut_slice()),
            depth_format: TextureFormat::Depth32Float,
        };
        let near = [clip(-1.0, -1.0, -0.5), clip(3.0, -1.0, -0.5), clip(-1.0, 3.0, -0.5)];
        let far = [clip(-1.0, -1.0, 0.5), clip(3.0, -1.0, 0.5), clip(-1.0, 3.0, 0.5)];
        let red = Vector4::new(1.0, 0.0, 0.0, 1.0);
        let blue = Vector4::new(0.0, 0.0, 1.0, 1.0);

        rasterize_triangle(&mut target, &state(None), &near, |_, _| Some(red));
        let written = rasterize_triangle(&mut target, &state(None), &far, |_, _| Some(blue));
        assert_eq!(written, Some(0));
        assert!(color.iter().all(|c| *c == red));
        assert!(depth.iter().all(|d| (*d - 0.25).abs() < 1e-6));
    }

    #[test]
    fn test_behind_eye_is_rejected() {
        let mut depth = vec![1.0; 4];
        let mut target = RasterTarget {
            width: 2,
            height: 2,
            color: None,
            depth: Some(depth.as_mut_slice()),
            depth_format: TextureFormat::Depth32Float,
        };
        let mut triangle = [clip(-1.0, -1.0, 0.0), clip(1.0, -1.0, 0.0), clip(-1.0, 1.0, 0.0)];
        triangle[2].clip.w = -1.0;
        let written = rasterize_triangle(&mut target, &state(None), &triangle, |_, _| {
            Some(Vector4::zeros())
        });
        assert!(written.is_none());
    }

    #[test]
    fn test_triangle_crossing_near_plane_is_clipped() {
        let mut color = vec![Vector4::zeros(); 16];
        let mut depth = vec![1.0; 16];
        let mut target = RasterTarget {
            width: 4,
            height: 4,
            color: Some(color.as_mut_slice()),
            depth: Some(depth.as_mut_slice()),
            depth_format: TextureFormat::Depth32Float,
        };
        // The top vertex lies in front of the near plane (z < -w)
        let triangle = [clip(-1.0, -1.0, 0.0), clip(3.0, -1.0, 0.0), clip(-1.0, 3.0, -3.0)];
        let white = Vector4::new(1.0, 1.0, 1.0, 1.0);

        // Clipping leaves a quad up to y = 1/3 in NDC: the bottom three rows
        let written = rasterize_triangle(&mut target, &state(None), &triangle, |_, _| Some(white));
        assert_eq!(written, Some(12));
        assert!(color[..12].iter().all(|c| *c == white));
        assert!(color[12..].iter().all(|c| *c == Vector4::zeros()));
        assert!(depth[..12].iter().all(|d| (0.0..=0.5).contains(d)));
    }

    #[test]
    fn test_clipped_vertices_carry_varyings() {
        let mut color = vec![Vector4::zeros(); 16];
        let mut target = RasterTarget {
            width: 4,
            height: 4,
            color: Some(color.as_mut_slice()),
            depth: None,
            depth_format: TextureFormat::Depth32Float,
        };
        let mut triangle = [clip(-1.0, -1.0, 0.0), clip(3.0, -1.0, 0.0), clip(-1.0, 3.0, -3.0)];
        for vertex in &mut triangle {
            vertex.varyings[0] = 0.25;
        }
        let raster = RasterState {
            depth_test: false,
            cull_face: None,
            varying_count: 1,
        };

        let written = rasterize_triangle(&mut target, &raster, &triangle, |_, varyings| {
            Some(Vector4::new(varyings[0], 0.0, 0.0, 1.0))
        });
        assert_eq!(written, Some(12));
        assert!(color[..12].iter().all(|c| (c.x - 0.25).abs() < 1e-5));
    }

    #[test]
    fn test_triangle_before_near_plane_is_rejected() {
        let mut depth = vec![1.0; 4];
        let mut target = RasterTarget {
            width: 2,
            height: 2,
            color: None,
            depth: Some(depth.as_mut_slice()),
            depth_format: TextureFormat::Depth32Float,
        };
        let triangle = [clip(-1.0, -1.0, -2.0), clip(1.0, -1.0, -2.0), clip(-1.0, 1.0, -2.0)];
        let written = rasterize_triangle(&mut target, &state(None), &triangle, |_, _| {
            Some(Vector4::zeros())
        });
        assert!(written.is_none());
        assert!(depth.iter().all(|d| *d == 1.0));
    }

    #[test]
    fn test_varyings_interpolate() {
        let mut color = vec![Vector4::zeros(); 1];
        let mut target = RasterTarget {
            width: 1,
            height: 1,
            color: Some(color.as_mut_slice()),
            depth: None,
            depth_format: TextureFormat::Depth32Float,
        };
        let mut triangle = [clip(-1.0, -1.0, 0.0), clip(3.0, -1.0, 0.0), clip(-1.0, 3.0, 0.0)];
        for vertex in &mut triangle {
            vertex.varyings[0] = 2.0;
        }
        let raster = RasterState {
            depth_test: false,
            cull_face: None,
            varying_count: 1,
        };

        rasterize_triangle(&mut target, &raster, &triangle, |_, varyings| {
            Some(Vector4::new(varyings[0], 0.0, 0.0, 1.0))
        });
        assert!((color[0].x - 2.0).abs() < 1e-5);
    }
}
