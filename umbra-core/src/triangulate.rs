/// Polygon triangulation and vertex assembly
///
/// Faces are split with a step-2 sliding window: triangles `(i, i+1, i+2)`
/// modulo `n` for `i = 0, 2, 4, ...`, ending with the window that crosses the
/// polygon boundary. When one sweep leaves fewer than `n - 2` triangles
/// (`n >= 6`), the sweep is repeated over the ring of window start vertices
/// until the face has contributed exactly `n - 2`.
use std::path::Path;

use nalgebra::{Vector3, Vector4};

use crate::error::{Attribute, IngestionError};
use crate::geometry::{AssembledVertex, Face, FaceVertexRef, MeshTables, Triangle, TriangleBuffer};
use crate::obj;

/// How a face is split into triangles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriangulationMode {
    /// Step-2 sliding window
    #[default]
    SlidingWindow,
    /// Fan around the first vertex: `(0, i, i+1)`
    Fan,
}

/// Corner indices (0-based, into the face) of each triangle for an `n`-gon
pub fn window_indices(n: usize, mode: TriangulationMode) -> Vec<[usize; 3]> {
    if n < 3 {
        return Vec::new();
    }
    let budget = n - 2;

    match mode {
        TriangulationMode::Fan => (1..n - 1).map(|i| [0, i, i + 1]).collect(),
        TriangulationMode::SlidingWindow => {
            let mut triangles = Vec::with_capacity(budget);
            let mut ring: Vec<usize> = (0..n).collect();

            while triangles.len() < budget {
                let m = ring.len();
                let mut start = 0;
                loop {
                    let window = [start, start + 1, start + 2];
                    triangles.push(window.map(|j| ring[j % m]));

                    let wrapped = window.iter().any(|&j| j >= m);
                    if wrapped || triangles.len() == budget {
                        break;
                    }
                    start += 2;
                }
                ring = ring.into_iter().step_by(2).collect();
            }

            triangles
        }
    }
}

/// Split one face into `n - 2` assembled triangles, preserving winding
pub fn triangulate_face(
    face: &Face,
    tables: &MeshTables,
    mode: TriangulationMode,
) -> Result<Vec<Triangle>, IngestionError> {
    let corners = face
        .vertices
        .iter()
        .map(|corner| resolve(face.line, corner, tables))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(window_indices(corners.len(), mode)
        .into_iter()
        .map(|[a, b, c]| [corners[a], corners[b], corners[c]])
        .collect())
}

/// Triangulate every face in source order into a single draw buffer
pub fn assemble(
    tables: &MeshTables,
    mode: TriangulationMode,
) -> Result<TriangleBuffer, IngestionError> {
    let triangle_count = tables
        .faces
        .iter()
        .map(|face| face.vertices.len().saturating_sub(2))
        .sum();
    let mut buffer = TriangleBuffer::with_capacity(triangle_count);

    for face in &tables.faces {
        for triangle in triangulate_face(face, tables, mode)? {
            buffer.push_triangle(triangle);
        }
    }

    log::debug!(
        "Assembled {} triangles from {} faces",
        buffer.triangle_count(),
        tables.faces.len()
    );
    Ok(buffer)
}

/// Load, parse and assemble a mesh file. The attribute tables are dropped here.
pub fn load_triangle_buffer<P: AsRef<Path>>(
    path: P,
    mode: TriangulationMode,
) -> Result<TriangleBuffer, IngestionError> {
    let tables = obj::load_obj(path)?;
    assemble(&tables, mode)
}

fn resolve(
    line: usize,
    corner: &FaceVertexRef,
    tables: &MeshTables,
) -> Result<AssembledVertex, IngestionError> {
    let position: Vector4<f32> =
        *lookup(line, Attribute::Position, corner.position, &tables.positions)?;
    let texcoord = match corner.texcoord {
        Some(index) => *lookup(line, Attribute::TexCoord, index, &tables.texcoords)?,
        None => Vector3::zeros(),
    };
    let normal = match corner.normal {
        Some(index) => *lookup(line, Attribute::Normal, index, &tables.normals)?,
        None => Vector3::zeros(),
    };

    Ok(AssembledVertex::new(position, normal, texcoord))
}

/// 1-based lookup; 0 and anything past the end are errors
fn lookup<'a, T>(
    line: usize,
    attribute: Attribute,
    index: usize,
    table: &'a [T],
) -> Result<&'a T, IngestionError> {
    index
        .checked_sub(1)
        .and_then(|i| table.get(i))
        .ok_or(IngestionError::IndexOutOfRange {
            line,
            attribute,
            index,
            len: table.len(),
        })
}
