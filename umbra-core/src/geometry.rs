/// Vertex and face records shared by the parser, triangulator and device
use nalgebra::{Vector3, Vector4};

/// One corner of a face: 1-based indices into the attribute tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceVertexRef {
    pub position: usize,
    pub texcoord: Option<usize>,
    pub normal: Option<usize>,
}

impl FaceVertexRef {
    pub fn new(position: usize, texcoord: Option<usize>, normal: Option<usize>) -> Self {
        Self {
            position,
            texcoord,
            normal,
        }
    }
}

/// A convex polygon; vertex order defines winding
#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    /// 1-based source line, kept for diagnostics
    pub line: usize,
    pub vertices: Vec<FaceVertexRef>,
}

/// Flat attribute tables and faces produced by the parser
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshTables {
    pub positions: Vec<Vector4<f32>>,
    pub texcoords: Vec<Vector3<f32>>,
    pub normals: Vec<Vector3<f32>>,
    /// Free-form parameter vertices (`vp`), parsed but never drawn
    pub params: Vec<Vector3<f32>>,
    pub faces: Vec<Face>,
}

/// A fully resolved vertex, ready for upload
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssembledVertex {
    pub position: Vector4<f32>,
    pub normal: Vector3<f32>,
    pub texcoord: Vector3<f32>,
}

impl AssembledVertex {
    pub fn new(position: Vector4<f32>, normal: Vector3<f32>, texcoord: Vector3<f32>) -> Self {
        Self {
            position,
            normal,
            texcoord,
        }
    }

    /// Vertex with only a position; normal and texcoord are zero
    pub fn at(x: f32, y: f32, z: f32) -> Self {
        Self::new(Vector4::new(x, y, z, 1.0), Vector3::zeros(), Vector3::zeros())
    }
}

/// Three assembled vertices in winding order
pub type Triangle = [AssembledVertex; 3];

/// Draw-ordered triangle list. Immutable once assembled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleBuffer {
    vertices: Vec<AssembledVertex>,
}

impl TriangleBuffer {
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
        }
    }

    pub fn with_capacity(triangles: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(triangles * 3),
        }
    }

    pub(crate) fn push_triangle(&mut self, triangle: Triangle) {
        self.vertices.extend_from_slice(&triangle);
    }

    pub fn vertices(&self) -> &[AssembledVertex] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.vertices.len() / 3
    }

    pub fn triangles(&self) -> impl Iterator<Item = &[AssembledVertex]> {
        self.vertices.chunks_exact(3)
    }
}

impl FromIterator<Triangle> for TriangleBuffer {
    fn from_iter<I: IntoIterator<Item = Triangle>>(iter: I) -> Self {
        let mut buffer = Self::new();
        for triangle in iter {
            buffer.push_triangle(triangle);
        }
        buffer
    }
}

/// A 2x2x2 cube floating above a 20x20 ground plane, with outward CCW faces
pub const DEMO_SCENE_OBJ: &str = "\
# cube
v -1.0 0.5 -1.0
v 1.0 0.5 -1.0
v 1.0 2.5 -1.0
v -1.0 2.5 -1.0
v -1.0 0.5 1.0
v 1.0 0.5 1.0
v 1.0 2.5 1.0
v -1.0 2.5 1.0
# ground
v -10.0 0.0 -10.0
v 10.0 0.0 -10.0
v 10.0 0.0 10.0
v -10.0 0.0 10.0
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vt 0.0 1.0
vn 0.0 0.0 1.0
vn 0.0 0.0 -1.0
vn 1.0 0.0 0.0
vn -1.0 0.0 0.0
vn 0.0 1.0 0.0
vn 0.0 -1.0 0.0
f 5/1/1 6/2/1 7/3/1 8/4/1
f 2/1/2 1/2/2 4/3/2 3/4/2
f 6/1/3 2/2/3 3/3/3 7/4/3
f 1/1/4 5/2/4 8/3/4 4/4/4
f 8/1/5 7/2/5 3/3/5 4/4/5
f 1/1/6 2/2/6 6/3/6 5/4/6
f 12/1/5 11/2/5 10/3/5 9/4/5
";
