/// Device programs for the depth and color passes

use nalgebra::{Matrix3, Point3, Vector2, Vector3, Vector4};

use crate::config::MAX_LIGHTS;
use crate::device::{Fragment, FragmentStage, Uniforms, Varyings, VertexStage};
use crate::geometry::AssembledVertex;
use crate::shadow::shadow_lookup;
use crate::transform::Transform;

/// Uniform names shared by the renderer and the stages
pub mod uniforms {
    /// Camera (or light) projection
    pub const PROJECTION: &str = "M_per";
    /// Camera (or light) view
    pub const VIEW: &str = "M_cam";
    pub const MODEL: &str = "M_model";
    /// World to light clip space
    pub const LIGHT_SPACE: &str = "M_light";
    pub const KA: &str = "ka";
    pub const KD: &str = "kd";
    pub const KS: &str = "ks";
    pub const AMBIENT_INTENSITY: &str = "Ia";
    /// World-space light positions
    pub const LIGHTS: &str = "lights";
    pub const INTENSITIES: &str = "intensity";
    pub const NUM_LIGHTS: &str = "num_lights";
    /// Index of the light whose terms are modulated by the shadow map
    pub const SHADOW_LIGHT: &str = "shadow_light";
    pub const SHININESS: &str = "p";
    pub const SHADOW_TEX: &str = "shadow_tex";
    pub const DIFFUSE_TEX: &str = "tex";
}

/// Transforms positions only; nothing is interpolated
pub struct DepthVertex;

impl VertexStage for DepthVertex {
    fn name(&self) -> &str {
        "shadow-map.vs"
    }

    fn outputs(&self) -> usize {
        0
    }

    fn shade(
        &self,
        uniforms: &Uniforms,
        vertex: &AssembledVertex,
        _: &mut Varyings,
    ) -> Vector4<f32> {
        let mvp = Transform::mvp_matrix(
            &uniforms.mat4(uniforms::MODEL),
            &uniforms.mat4(uniforms::VIEW),
            &uniforms.mat4(uniforms::PROJECTION),
        );
        mvp * vertex.position
    }
}

/// Depth is written by the rasterizer; the color is never stored
pub struct DepthFragment;

impl FragmentStage for DepthFragment {
    fn name(&self) -> &str {
        "shadow-map.fs"
    }

    fn inputs(&self) -> usize {
        0
    }

    fn shade(&self, _: &Fragment<'_>) -> Option<Vector4<f32>> {
        Some(Vector4::zeros())
    }
}

const VIEW_POSITION: usize = 0;
const VIEW_NORMAL: usize = 3;
const TEXCOORD: usize = 6;
const LIGHT_CLIP: usize = 8;
const PHONG_VARYINGS: usize = 12;

/// View-space position and normal, texture coordinate and light clip position
pub struct PhongVertex;

impl VertexStage for PhongVertex {
    fn name(&self) -> &str {
        "blinn-phong.vs"
    }

    fn outputs(&self) -> usize {
        PHONG_VARYINGS
    }

    fn shade(
        &self,
        uniforms: &Uniforms,
        vertex: &AssembledVertex,
        varyings: &mut Varyings,
    ) -> Vector4<f32> {
        let model = uniforms.mat4(uniforms::MODEL);
        let model_view = uniforms.mat4(uniforms::VIEW) * model;

        let world = model * vertex.position;
        let view_position = model_view * vertex.position;

        let linear: Matrix3<f32> = model_view.fixed_view::<3, 3>(0, 0).into_owned();
        let normal_matrix = linear.try_inverse().map_or(linear, |inverse| inverse.transpose());
        let normal = normal_matrix * vertex.normal;

        let light_clip = uniforms.mat4(uniforms::LIGHT_SPACE) * world;

        varyings[VIEW_POSITION..VIEW_POSITION + 3].copy_from_slice(view_position.xyz().as_slice());
        varyings[VIEW_NORMAL..VIEW_NORMAL + 3].copy_from_slice(normal.as_slice());
        varyings[TEXCOORD] = vertex.texcoord.x;
        varyings[TEXCOORD + 1] = vertex.texcoord.y;
        varyings[LIGHT_CLIP..LIGHT_CLIP + 4].copy_from_slice(light_clip.as_slice());

        uniforms.mat4(uniforms::PROJECTION) * view_position
    }
}

/// Blinn-Phong with ambient, per-light diffuse and specular terms. The shadow
/// light's diffuse and specular terms are scaled by the shadow comparison.
pub struct PhongFragment;

impl FragmentStage for PhongFragment {
    fn name(&self) -> &str {
        "blinn-phong.fs"
    }

    fn inputs(&self) -> usize {
        PHONG_VARYINGS
    }

    fn shade(&self, fragment: &Fragment<'_>) -> Option<Vector4<f32>> {
        let v = fragment.varyings;
        let uniforms = fragment.uniforms;

        let position = Vector3::new(v[VIEW_POSITION], v[VIEW_POSITION + 1], v[VIEW_POSITION + 2]);
        let normal = Vector3::new(v[VIEW_NORMAL], v[VIEW_NORMAL + 1], v[VIEW_NORMAL + 2])
            .try_normalize(1e-12)
            .unwrap_or_else(Vector3::zeros);
        let uv = Vector2::new(v[TEXCOORD], v[TEXCOORD + 1]);
        let light_clip = Vector4::new(
            v[LIGHT_CLIP],
            v[LIGHT_CLIP + 1],
            v[LIGHT_CLIP + 2],
            v[LIGHT_CLIP + 3],
        );

        let shadow = match shadow_lookup(&light_clip) {
            Some((coords, reference)) => {
                fragment
                    .samplers
                    .sample_compare(uniforms.int(uniforms::SHADOW_TEX), coords, reference)
            }
            None => 1.0,
        };

        let ka = uniforms.vec3(uniforms::KA);
        let kd = uniforms.vec3(uniforms::KD);
        let ks = uniforms.vec3(uniforms::KS);
        let shininess = uniforms.float(uniforms::SHININESS);
        let view = uniforms.mat4(uniforms::VIEW);
        let shadow_light = uniforms.int(uniforms::SHADOW_LIGHT);

        let lights = uniforms.vec3_array(uniforms::LIGHTS);
        let intensities = uniforms.vec3_array(uniforms::INTENSITIES);
        let count = usize::try_from(uniforms.int(uniforms::NUM_LIGHTS))
            .unwrap_or(0)
            .min(MAX_LIGHTS);

        let to_eye = (-position).try_normalize(1e-12).unwrap_or_else(Vector3::z);
        let mut diffuse = Vector3::zeros();
        let mut specular = Vector3::zeros();

        for (index, (light, intensity)) in lights.iter().zip(intensities).take(count).enumerate() {
            let light_view = view.transform_point(&Point3::from(*light));
            let Some(to_light) = (light_view - Point3::from(position)).try_normalize(1e-12) else {
                continue;
            };
            let scale = if index as i32 == shadow_light { shadow } else { 1.0 };

            let n_dot_l = normal.dot(&to_light).max(0.0);
            diffuse += kd.component_mul(intensity) * n_dot_l * scale;

            if n_dot_l > 0.0 {
                let half = (to_light + to_eye).try_normalize(1e-12).unwrap_or(to_light);
                let n_dot_h = normal.dot(&half).max(0.0);
                specular += ks.component_mul(intensity) * n_dot_h.powf(shininess) * scale;
            }
        }

        let albedo = fragment.samplers.sample(uniforms.int(uniforms::DIFFUSE_TEX), uv).xyz();
        let ambient = ka.component_mul(&uniforms.vec3(uniforms::AMBIENT_INTENSITY));
        let color = albedo.component_mul(&(ambient + diffuse)) + specular;

        Some(Vector4::new(
            color.x.clamp(0.0, 1.0),
            color.y.clamp(0.0, 1.0),
            color.z.clamp(0.0, 1.0),
            1.0,
        ))
    }
}
