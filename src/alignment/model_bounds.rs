use glam::{Mat4, Vec3};
use gltf::{json::Value, Gltf, Node, Semantic};
use serde::Serialize;

use crate::error::{PipelineError, PipelineResult};

/// World-space axis-aligned box around a reconstructed model.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct ModelBounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl ModelBounds {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: max.max(min),
        }
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn union(&self, other: &ModelBounds) -> ModelBounds {
        ModelBounds {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Box around the eight transformed corners.
    pub fn transformed(&self, matrix: &Mat4) -> ModelBounds {
        let (lo, hi) = (self.min, self.max);
        let corners = [
            Vec3::new(lo.x, lo.y, lo.z),
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(lo.x, hi.y, hi.z),
            Vec3::new(hi.x, hi.y, hi.z),
        ];

        let first = matrix.transform_point3(corners[0]);
        corners[1..].iter().fold(
            ModelBounds {
                min: first,
                max: first,
            },
            |acc, &corner| {
                let p = matrix.transform_point3(corner);
                ModelBounds {
                    min: acc.min.min(p),
                    max: acc.max.max(p),
                }
            },
        )
    }

    /// Reads the bounds of a glTF (binary or JSON) payload from the POSITION
    /// accessor min/max of every mesh reachable from the default scene.
    ///
    /// Vertex data is never touched; only the document is parsed.
    pub fn from_gltf_bytes(bytes: &[u8]) -> PipelineResult<Self> {
        let gltf = Gltf::from_slice(bytes).map_err(|err| PipelineError::decode("model", err))?;

        let mut bounds: Option<ModelBounds> = None;
        match gltf.default_scene().or_else(|| gltf.scenes().next()) {
            Some(scene) => {
                for node in scene.nodes() {
                    visit_node(&node, Mat4::IDENTITY, &mut bounds)?;
                }
            }
            None => {
                for mesh in gltf.meshes() {
                    for primitive in mesh.primitives() {
                        accumulate_primitive(&primitive, &Mat4::IDENTITY, &mut bounds)?;
                    }
                }
            }
        }

        let bounds = bounds.ok_or_else(|| PipelineError::decode("model", "no mesh geometry"))?;
        let size = bounds.size();
        if !(size.x > 0.0 && size.y > 0.0) || !size.is_finite() {
            return Err(PipelineError::decode(
                "model",
                format!("degenerate bounds {size}"),
            ));
        }
        Ok(bounds)
    }
}

fn visit_node(node: &Node, parent: Mat4, bounds: &mut Option<ModelBounds>) -> PipelineResult<()> {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            accumulate_primitive(&primitive, &world, bounds)?;
        }
    }

    for child in node.children() {
        visit_node(&child, world, bounds)?;
    }
    Ok(())
}

fn accumulate_primitive(
    primitive: &gltf::Primitive,
    world: &Mat4,
    bounds: &mut Option<ModelBounds>,
) -> PipelineResult<()> {
    let Some(accessor) = primitive.get(&Semantic::Positions) else {
        return Ok(());
    };

    let min = read_vec3(accessor.min(), "POSITION min")?;
    let max = read_vec3(accessor.max(), "POSITION max")?;
    let local = ModelBounds::new(min, max).transformed(world);

    *bounds = Some(match bounds.take() {
        Some(existing) => existing.union(&local),
        None => local,
    });
    Ok(())
}

fn read_vec3(value: Option<Value>, field: &'static str) -> PipelineResult<Vec3> {
    let value = value.ok_or_else(|| PipelineError::decode("model", format!("missing {field}")))?;
    let components: Vec<f32> = value
        .as_array()
        .map(|items| items.iter().filter_map(Value::as_f64).map(|v| v as f32).collect())
        .unwrap_or_default();

    match components.as_slice() {
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => Err(PipelineError::decode(
            "model",
            format!("{field} is not a 3-component array"),
        )),
    }
}
