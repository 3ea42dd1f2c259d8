use afterglow_common::{ObjectId, Plane};
use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::backend::TargetId;

/// Which faces a normals pass draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FaceSide {
    #[default]
    Front,
    /// Back faces only, normals flipped to face the viewer.
    Back,
    Double,
}

/// Programs that rasterize scene geometry through a camera.
#[derive(Debug, Clone, PartialEq)]
pub enum ScenePass {
    /// Each visible mesh drawn with its own material.
    Shaded,
    /// Lighting of `object` unwrapped into its UV space, blended as
    /// `mix(previous, lit, 1 / window)`.
    Lightmap {
        object: ObjectId,
        previous: TargetId,
        window: f32,
    },
    /// World-space normals encoded as `n * 0.5 + 0.5`, with depth.
    Normals { side: FaceSide },
}

impl ScenePass {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Shaded => "shaded",
            Self::Lightmap { .. } => "lightmap",
            Self::Normals { .. } => "normals",
        }
    }

    /// Targets this pass reads.
    pub fn sources(&self) -> Vec<TargetId> {
        match self {
            Self::Lightmap { previous, .. } => vec![*previous],
            Self::Shaded | Self::Normals { .. } => Vec::new(),
        }
    }
}

/// Parameters of the refraction caustics kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CausticsUniforms {
    /// Normals-and-depth capture from the light camera.
    pub normals: TargetId,
    /// Light camera's camera-to-world transform.
    pub camera_world: Mat4,
    pub projection_inverse: Mat4,
    /// Direction the light travels.
    pub light_dir: Vec3,
    /// Receiving plane the refracted rays land on.
    pub receiver: Plane,
    pub resolution: f32,
    /// Half extent of the light camera's frustum.
    pub size: f32,
    pub world_radius: f32,
    pub intensity: f32,
    pub ior: f32,
}

/// Programs that run once per texel of the target.
#[derive(Debug, Clone, PartialEq)]
pub enum FullscreenPass {
    Caustics(CausticsUniforms),
    /// Encode texels of `mask` as jump-flood seeds. With `covered`, texels inside
    /// the mask are seeds; otherwise empty ones are.
    JumpFloodSeed { mask: TargetId, covered: bool },
    JumpFloodStep { source: TargetId, offset: u32 },
    /// Distance in texels to the nearest seed.
    DistanceField { source: TargetId },
    /// Signed field: positive outside the mask, negative inside.
    SdfComposite {
        mask: TargetId,
        inside: TargetId,
        outside: TargetId,
    },
}

impl FullscreenPass {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Caustics(_) => "caustics",
            Self::JumpFloodSeed { .. } => "jump_flood_seed",
            Self::JumpFloodStep { .. } => "jump_flood_step",
            Self::DistanceField { .. } => "distance_field",
            Self::SdfComposite { .. } => "sdf_composite",
        }
    }

    /// Targets this pass reads.
    pub fn sources(&self) -> Vec<TargetId> {
        match self {
            Self::Caustics(u) => vec![u.normals],
            Self::JumpFloodSeed { mask, .. } => vec![*mask],
            Self::JumpFloodStep { source, .. } | Self::DistanceField { source } => vec![*source],
            Self::SdfComposite {
                mask,
                inside,
                outside,
            } => vec![*mask, *inside, *outside],
        }
    }
}
