//! CPU reference implementation of [`RenderBackend`].

mod fullscreen;
mod raster;
mod shading;

use std::collections::BTreeMap;

use afterglow_common::Color;
use afterglow_scene::{Material, Scene, SceneObject};
use glam::{Mat4, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::backend::{RenderBackend, TargetId};
use crate::camera::Camera;
use crate::error::RenderError;
use crate::image::{ImageBuffer, TargetDesc};
use crate::pass::{FaceSide, FullscreenPass, ScenePass};
use raster::{Cull, Fragment, RasterVertex, rasterize};
use shading::Lighting;

/// Configuration for the CPU backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SoftwareConfig {
    /// Total bytes of render-target storage the backend may hold.
    pub memory_budget: u64,
    /// Largest width or height a target may have.
    pub max_dimension: u32,
    /// Offset along the surface normal for shadow rays.
    pub shadow_bias: f32,
}

impl Default for SoftwareConfig {
    fn default() -> Self {
        Self {
            memory_budget: 1 << 30,
            max_dimension: 8192,
            shadow_bias: 1e-3,
        }
    }
}

#[derive(Debug)]
struct Slot {
    desc: TargetDesc,
    image: ImageBuffer,
}

/// Rasterizes on the CPU into in-memory targets.
#[derive(Debug, Default)]
pub struct SoftwareRenderer {
    config: SoftwareConfig,
    targets: BTreeMap<TargetId, Slot>,
    next_id: u32,
    allocated: u64,
}

impl SoftwareRenderer {
    pub fn new(config: SoftwareConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &SoftwareConfig {
        &self.config
    }

    pub fn allocated_bytes(&self) -> u64 {
        self.allocated
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }
}

/// Take `target` out of the map, run `f` against it and the remaining
/// targets, then put it back whatever `f` returned.
fn with_target<F>(
    targets: &mut BTreeMap<TargetId, Slot>,
    target: TargetId,
    f: F,
) -> Result<(), RenderError>
where
    F: FnOnce(&mut Slot, &BTreeMap<TargetId, Slot>) -> Result<(), RenderError>,
{
    let mut slot = targets
        .remove(&target)
        .ok_or(RenderError::UnknownTarget(target))?;
    let result = f(&mut slot, targets);
    targets.insert(target, slot);
    result
}

/// Resolve a pass source, rejecting reads of the target being written and
/// sources whose size differs from it.
fn source<'a>(
    others: &'a BTreeMap<TargetId, Slot>,
    target: TargetId,
    dest: &Slot,
    id: TargetId,
    pass: &'static str,
) -> Result<&'a ImageBuffer, RenderError> {
    if id == target {
        return Err(RenderError::FeedbackLoop { pass, target });
    }
    let slot = others.get(&id).ok_or(RenderError::UnknownTarget(id))?;
    if slot.image.size() != dest.image.size() {
        return Err(RenderError::SizeMismatch {
            expected: dest.image.size(),
            actual: slot.image.size(),
        });
    }
    Ok(&slot.image)
}

/// Write a color fragment with an optional depth test.
fn write_fragment(slot: &mut Slot, frag: &Fragment, color: Color, depth_test: bool) {
    if depth_test {
        match slot.image.depth(frag.x, frag.y) {
            Some(z) if frag.depth >= z => return,
            Some(_) => slot.image.set_depth(frag.x, frag.y, frag.depth),
            None => {}
        }
    }
    slot.image
        .set_texel(frag.x, frag.y, slot.desc.format.quantize(color));
}

/// Every triangle of a mesh object as clip-space raster vertices.
fn mesh_triangles(
    obj: &SceneObject,
    geometry: &afterglow_scene::Geometry,
    clip_of: impl Fn(Vec3, Vec2) -> Vec4,
) -> Vec<[RasterVertex; 3]> {
    let model = obj.transform.matrix();
    let normal_matrix = model.inverse().transpose();
    let vertex = |i: usize| {
        let world = model.transform_point3(*geometry.positions.get(i)?);
        let normal = geometry
            .normals
            .get(i)
            .map(|n| normal_matrix.transform_vector3(*n).normalize_or_zero())
            .unwrap_or_default();
        let uv = geometry.uvs.get(i).copied().unwrap_or_default();
        Some(RasterVertex {
            clip: clip_of(world, uv),
            world,
            normal,
        })
    };
    // Triangles referencing missing vertices are skipped.
    geometry
        .triangles()
        .filter_map(|[a, b, c]| Some([vertex(a)?, vertex(b)?, vertex(c)?]))
        .collect()
}

fn draw_shaded(slot: &mut Slot, scene: &Scene, view_proj: Mat4, bias: f32) {
    let lighting = Lighting::gather(scene, bias);
    if let Some(bg) = scene.background() {
        slot.image.fill(slot.desc.format.quantize(bg));
    }
    let (w, h) = slot.image.size();
    let mut drawn = 0usize;
    for (_, obj, mesh) in scene.meshes().filter(|(_, o, _)| o.visible) {
        let material = scene.material(mesh.material).copied().unwrap_or_default();
        if material == Material::Discard {
            continue;
        }
        for tri in mesh_triangles(obj, &mesh.geometry, |p, _| view_proj * p.extend(1.0)) {
            rasterize(w, h, &tri, Cull::Back, |frag| {
                let color = match material {
                    Material::Lambert { color } => {
                        let n = frag.normal.normalize_or_zero();
                        let e = lighting.irradiance(frag.world, n, mesh.receive_shadow);
                        Color::from_rgb_vec3(color.rgb_vec3() * e, color.a)
                    }
                    Material::Unlit { color } => color,
                    Material::Discard => return,
                };
                write_fragment(slot, frag, color, true);
            });
        }
        drawn += 1;
    }
    tracing::debug!(drawn, "shaded pass");
}

/// Lighting of `obj` unwrapped into its UV space and blended over `previous`.
fn draw_lightmap(
    slot: &mut Slot,
    previous: &ImageBuffer,
    scene: &Scene,
    obj: &SceneObject,
    window: f32,
    bias: f32,
) {
    let Some(mesh) = obj.as_mesh() else {
        return;
    };
    let lighting = Lighting::gather(scene, bias);
    let blend = 1.0 / window;
    let (w, h) = slot.image.size();
    let to_uv_clip = |_: Vec3, uv: Vec2| Vec4::new(uv.x * 2.0 - 1.0, uv.y * 2.0 - 1.0, 0.0, 1.0);
    for tri in mesh_triangles(obj, &mesh.geometry, to_uv_clip) {
        rasterize(w, h, &tri, Cull::None, |frag| {
            let n = frag.normal.normalize_or_zero();
            let lit = lighting.irradiance(frag.world, n, mesh.receive_shadow);
            let old = previous.texel(frag.x, frag.y);
            let mut out = old.lerp(Color::from_rgb_vec3(lit, 1.0), blend);
            out.a = 1.0;
            write_fragment(slot, frag, out, false);
        });
    }
}

fn draw_normals(slot: &mut Slot, scene: &Scene, view_proj: Mat4, side: FaceSide) {
    let cull = match side {
        FaceSide::Front => Cull::Back,
        FaceSide::Back => Cull::Front,
        FaceSide::Double => Cull::None,
    };
    let (w, h) = slot.image.size();
    for (_, obj, mesh) in scene.meshes().filter(|(_, o, _)| o.visible) {
        for tri in mesh_triangles(obj, &mesh.geometry, |p, _| view_proj * p.extend(1.0)) {
            rasterize(w, h, &tri, cull, |frag| {
                let n = frag.normal.normalize_or_zero();
                let n = if frag.front_facing { n } else { -n };
                write_fragment(slot, frag, Color::from_rgb_vec3(n * 0.5 + 0.5, 1.0), true);
            });
        }
    }
}

impl RenderBackend for SoftwareRenderer {
    fn create_target(&mut self, desc: TargetDesc) -> Result<TargetId, RenderError> {
        if desc.width == 0 || desc.height == 0 {
            return Err(RenderError::InvalidTargetSize {
                width: desc.width,
                height: desc.height,
            });
        }
        let requested = desc.byte_size();
        let available = self.config.memory_budget.saturating_sub(self.allocated);
        if desc.width.max(desc.height) > self.config.max_dimension || requested > available {
            tracing::warn!(
                width = desc.width,
                height = desc.height,
                requested,
                available,
                "render target allocation refused"
            );
            return Err(RenderError::ResourceExhaustion {
                requested,
                available,
            });
        }
        let mut image = ImageBuffer::new(desc.width, desc.height, Color::TRANSPARENT);
        if desc.depth {
            image = image.with_depth();
        }
        let id = TargetId(self.next_id);
        self.next_id += 1;
        self.allocated += requested;
        self.targets.insert(id, Slot { desc, image });
        tracing::trace!(?id, ?desc, "render target created");
        Ok(id)
    }

    fn destroy_target(&mut self, id: TargetId) -> bool {
        match self.targets.remove(&id) {
            Some(slot) => {
                self.allocated -= slot.desc.byte_size();
                true
            }
            None => false,
        }
    }

    fn target_desc(&self, id: TargetId) -> Option<TargetDesc> {
        self.targets.get(&id).map(|s| s.desc)
    }

    fn clear(&mut self, target: TargetId, color: Color) -> Result<(), RenderError> {
        let slot = self
            .targets
            .get_mut(&target)
            .ok_or(RenderError::UnknownTarget(target))?;
        slot.image.fill(slot.desc.format.quantize(color));
        Ok(())
    }

    fn render_scene(
        &mut self,
        scene: &Scene,
        camera: &Camera,
        target: TargetId,
        pass: &ScenePass,
    ) -> Result<(), RenderError> {
        let view_proj = camera.view_projection();
        let bias = self.config.shadow_bias;
        let label = pass.label();
        with_target(&mut self.targets, target, |slot, others| {
            match pass {
                ScenePass::Shaded => draw_shaded(slot, scene, view_proj, bias),
                ScenePass::Lightmap {
                    object,
                    previous,
                    window,
                } => {
                    let previous = source(others, target, slot, *previous, label)?;
                    let obj = scene
                        .get(*object)
                        .filter(|o| o.as_mesh().is_some())
                        .ok_or(RenderError::UnknownObject(*object))?;
                    draw_lightmap(slot, previous, scene, obj, *window, bias);
                }
                ScenePass::Normals { side } => draw_normals(slot, scene, view_proj, *side),
            }
            Ok(())
        })?;
        tracing::debug!(pass = label, ?target, "scene pass");
        Ok(())
    }

    fn render_fullscreen(
        &mut self,
        target: TargetId,
        pass: &FullscreenPass,
    ) -> Result<(), RenderError> {
        let label = pass.label();
        with_target(&mut self.targets, target, |slot, others| {
            let src = |id| source(others, target, &*slot, id, label);
            match pass {
                FullscreenPass::Caustics(u) => {
                    let normals = src(u.normals)?;
                    fullscreen::caustics(&mut slot.image, normals, u);
                }
                FullscreenPass::JumpFloodSeed { mask, covered } => {
                    let mask = src(*mask)?;
                    fullscreen::jump_flood_seed(&mut slot.image, mask, *covered);
                }
                FullscreenPass::JumpFloodStep { source, offset } => {
                    let source = src(*source)?;
                    fullscreen::jump_flood_step(&mut slot.image, source, *offset);
                }
                FullscreenPass::DistanceField { source } => {
                    let source = src(*source)?;
                    fullscreen::distance_field(&mut slot.image, source);
                }
                FullscreenPass::SdfComposite {
                    mask,
                    inside,
                    outside,
                } => {
                    let (mask, inside, outside) = (src(*mask)?, src(*inside)?, src(*outside)?);
                    fullscreen::sdf_composite(&mut slot.image, mask, inside, outside);
                }
            }
            Ok(())
        })?;
        tracing::debug!(pass = label, ?target, "fullscreen pass");
        Ok(())
    }

    fn read_pixels(&self, id: TargetId) -> Result<ImageBuffer, RenderError> {
        self.targets
            .get(&id)
            .map(|s| s.image.clone())
            .ok_or(RenderError::UnknownTarget(id))
    }
}
