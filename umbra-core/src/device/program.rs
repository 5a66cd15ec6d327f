/// Programmable stages, uniforms and program linking

use std::collections::HashMap;

use nalgebra::{Matrix4, Vector2, Vector3, Vector4};

use super::texture::TextureObject;
use super::MAX_TEXTURE_UNITS;
use crate::error::ShaderBuildError;
use crate::geometry::AssembledVertex;

/// Interpolated values passed from the vertex to the fragment stage
pub const MAX_VARYINGS: usize = 16;

pub type Varyings = [f32; MAX_VARYINGS];

/// A value stored in a program's uniform table
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec3(Vector3<f32>),
    Vec3Array(Vec<Vector3<f32>>),
    Mat4(Matrix4<f32>),
}

/// Named uniforms of one program. Unset values read as zero.
#[derive(Debug, Clone, Default)]
pub struct Uniforms {
    values: HashMap<String, UniformValue>,
}

impl Uniforms {
    pub fn set(&mut self, name: &str, value: UniformValue) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&UniformValue> {
        self.values.get(name)
    }

    pub fn int(&self, name: &str) -> i32 {
        match self.get(name) {
            Some(UniformValue::Int(value)) => *value,
            _ => 0,
        }
    }

    pub fn float(&self, name: &str) -> f32 {
        match self.get(name) {
            Some(UniformValue::Float(value)) => *value,
            _ => 0.0,
        }
    }

    pub fn vec3(&self, name: &str) -> Vector3<f32> {
        match self.get(name) {
            Some(UniformValue::Vec3(value)) => *value,
            _ => Vector3::zeros(),
        }
    }

    pub fn vec3_array(&self, name: &str) -> &[Vector3<f32>] {
        match self.get(name) {
            Some(UniformValue::Vec3Array(values)) => values,
            _ => &[],
        }
    }

    pub fn mat4(&self, name: &str) -> Matrix4<f32> {
        match self.get(name) {
            Some(UniformValue::Mat4(value)) => *value,
            _ => Matrix4::zeros(),
        }
    }
}

/// Per-vertex stage: writes varyings and returns the clip-space position
pub trait VertexStage {
    fn name(&self) -> &str;

    /// Number of leading varyings this stage writes
    fn outputs(&self) -> usize;

    fn compile(&self) -> Result<(), String> {
        Ok(())
    }

    fn shade(
        &self,
        uniforms: &Uniforms,
        vertex: &AssembledVertex,
        varyings: &mut Varyings,
    ) -> Vector4<f32>;
}

/// Per-fragment stage: returns a color, or `None` to discard
pub trait FragmentStage {
    fn name(&self) -> &str;

    /// Number of leading varyings this stage reads
    fn inputs(&self) -> usize;

    fn compile(&self) -> Result<(), String> {
        Ok(())
    }

    fn shade(&self, fragment: &Fragment<'_>) -> Option<Vector4<f32>>;
}

/// Texture units visible to a fragment stage during one draw
pub struct Samplers<'a> {
    units: [Option<&'a TextureObject>; MAX_TEXTURE_UNITS],
}

impl<'a> Samplers<'a> {
    pub(crate) fn new(units: [Option<&'a TextureObject>; MAX_TEXTURE_UNITS]) -> Self {
        Self { units }
    }

    fn unit(&self, unit: i32) -> Option<&'a TextureObject> {
        usize::try_from(unit)
            .ok()
            .and_then(|unit| self.units.get(unit).copied().flatten())
    }

    /// Filtered color read; unbound units read opaque black
    pub fn sample(&self, unit: i32, uv: Vector2<f32>) -> Vector4<f32> {
        match self.unit(unit) {
            Some(texture) => texture.sample(uv, 0.0),
            None => Vector4::new(0.0, 0.0, 0.0, 1.0),
        }
    }

    /// Depth comparison read against `reference`; unbound units read 0.0
    pub fn sample_compare(&self, unit: i32, uv: Vector2<f32>, reference: f32) -> f32 {
        match self.unit(unit) {
            Some(texture) => texture.sample(uv, reference).x,
            None => 0.0,
        }
    }
}

/// Inputs of one fragment invocation
pub struct Fragment<'a> {
    /// Window position (pixel center) and depth
    pub coord: Vector3<f32>,
    pub varyings: &'a Varyings,
    pub uniforms: &'a Uniforms,
    pub samplers: &'a Samplers<'a>,
}

/// A linked vertex + fragment pair and its uniform table
pub struct Program {
    pub(crate) vertex: Box<dyn VertexStage>,
    pub(crate) fragment: Box<dyn FragmentStage>,
    pub(crate) uniforms: Uniforms,
}

impl Program {
    pub fn uniforms(&self) -> &Uniforms {
        &self.uniforms
    }

    /// Varyings interpolated per fragment
    pub(crate) fn varying_count(&self) -> usize {
        self.fragment.inputs()
    }
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("vertex", &self.vertex.name())
            .field("fragment", &self.fragment.name())
            .finish()
    }
}

pub(crate) fn link(
    vertex: Box<dyn VertexStage>,
    fragment: Box<dyn FragmentStage>,
) -> Result<Program, ShaderBuildError> {
    for (name, result) in [
        (vertex.name(), vertex.compile()),
        (fragment.name(), fragment.compile()),
    ] {
        if name.is_empty() {
            return Err(ShaderBuildError::Compile("stage has no name".to_string()));
        }
        result.map_err(|log| ShaderBuildError::Compile(format!("{name}: {log}")))?;
        log::debug!("shader compiled successfully: {name}");
    }

    if vertex.outputs() > MAX_VARYINGS {
        return Err(ShaderBuildError::Link(format!(
            "vertex stage `{}` writes {} varyings, the limit is {MAX_VARYINGS}",
            vertex.name(),
            vertex.outputs()
        )));
    }
    if fragment.inputs() > vertex.outputs() {
        return Err(ShaderBuildError::Link(format!(
            "fragment stage `{}` reads {} varyings but vertex stage `{}` writes {}",
            fragment.name(),
            fragment.inputs(),
            vertex.name(),
            vertex.outputs()
        )));
    }

    Ok(Program {
        vertex,
        fragment,
        uniforms: Uniforms::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Passthrough {
        outputs: usize,
    }

    impl VertexStage for Passthrough {
        fn name(&self) -> &str {
            "passthrough.vs"
        }

        fn outputs(&self) -> usize {
            self.outputs
        }

        fn shade(&self, _: &Uniforms, vertex: &AssembledVertex, _: &mut Varyings) -> Vector4<f32> {
            vertex.position
        }
    }

    struct Flat {
        inputs: usize,
        broken: bool,
    }

    impl FragmentStage for Flat {
        fn name(&self) -> &str {
            "flat.fs"
        }

        fn inputs(&self) -> usize {
            self.inputs
        }

        fn compile(&self) -> Result<(), String> {
            if self.broken {
                Err("0:12: syntax error".to_string())
            } else {
                Ok(())
            }
        }

        fn shade(&self, _: &Fragment<'_>) -> Option<Vector4<f32>> {
            Some(Vector4::new(1.0, 1.0, 1.0, 1.0))
        }
    }

    #[test]
    fn test_link_success() {
        let program = link(
            Box::new(Passthrough { outputs: 4 }),
            Box::new(Flat {
                inputs: 3,
                broken: false,
            }),
        )
        .unwrap();
        assert_eq!(program.varying_count(), 3);
    }

    #[test]
    fn test_link_rejects_varying_mismatch() {
        let err = link(
            Box::new(Passthrough { outputs: 2 }),
            Box::new(Flat {
                inputs: 3,
                broken: false,
            }),
        )
        .unwrap_err();
        assert!(matches!(err, ShaderBuildError::Link(_)));

        let err = link(
            Box::new(Passthrough {
                outputs: MAX_VARYINGS + 1,
            }),
            Box::new(Flat {
                inputs: 0,
                broken: false,
            }),
        )
        .unwrap_err();
        assert!(matches!(err, ShaderBuildError::Link(_)));
    }

    #[test]
    fn test_compile_failure_names_stage() {
        let err = link(
            Box::new(Passthrough { outputs: 0 }),
            Box::new(Flat {
                inputs: 0,
                broken: true,
            }),
        )
        .unwrap_err();
        assert_eq!(err, ShaderBuildError::Compile("flat.fs: 0:12: syntax error".to_string()));
    }

    #[test]
    fn test_unset_uniforms_read_zero() {
        let mut uniforms = Uniforms::default();
        assert_eq!(uniforms.mat4("M_model"), Matrix4::zeros());
        assert!(uniforms.vec3_array("lights").is_empty());

        uniforms.set("p", UniformValue::Float(100.0));
        uniforms.set("num_lights", UniformValue::Int(3));
        assert_eq!(uniforms.float("p"), 100.0);
        assert_eq!(uniforms.int("num_lights"), 3);
        // Wrong type reads as unset
        assert_eq!(uniforms.int("p"), 0);
    }
}
