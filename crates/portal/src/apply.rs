use std::sync::Arc;

use afterglow_common::{Color, Transform};
use afterglow_render::{
    Camera, DisposalRegistry, ImageBuffer, RenderBackend, ScenePass, TargetDesc, TargetFormat,
};
use afterglow_scene::{Geometry, Material, Scene};
use glam::Vec3;

use crate::error::PortalError;
use crate::material::MeshPortalMaterial;
use crate::sdf::SdfGenerator;

/// Render the silhouette of `geometry` (seen from +Z) into a square mask,
/// build its signed distance field and hand both to `material`.
///
/// The frustum is the geometry's XY bounds widened by two texels so the
/// silhouette never touches the border. Returns the field read back.
pub fn apply_sdf<B: RenderBackend + ?Sized>(
    backend: &mut B,
    registry: &mut DisposalRegistry,
    geometry: Arc<Geometry>,
    resolution: u32,
    material: &mut MeshPortalMaterial,
) -> Result<ImageBuffer, PortalError> {
    let bounds = geometry.bounding_box();
    if bounds.is_empty() {
        return Err(PortalError::EmptyGeometry);
    }
    let _span = tracing::info_span!("portal_sdf", resolution).entered();

    let k = 1.0 + 2.0 / resolution as f32;
    let camera = Camera::orthographic(
        bounds.min.x * k,
        bounds.max.x * k,
        bounds.max.y * k,
        bounds.min.y * k,
        0.1,
        1000.0,
    )
    .at(Vec3::Z)
    .looking_at(Vec3::ZERO);

    let mut silhouette = Scene::new();
    let white = silhouette.add_material(Material::Unlit {
        color: Color::WHITE,
    });
    silhouette.add_mesh("portal_mask", geometry, white, Transform::default());

    let mask = registry.create(
        backend,
        TargetDesc::color(resolution, resolution, TargetFormat::Rgba8Unorm),
    )?;
    backend.clear(mask, Color::TRANSPARENT)?;
    backend.render_scene(&silhouette, &camera, mask, &ScenePass::Shaded)?;
    let covered = backend
        .read_pixels(mask)?
        .pixels()
        .iter()
        .filter(|c| c.r >= 0.5)
        .count();
    if covered == 0 {
        return Err(PortalError::EmptyMask(resolution));
    }

    let generator = SdfGenerator::new(backend, registry, resolution, resolution)?;
    let sdf = generator.generate(backend, mask)?;
    let field = backend.read_pixels(sdf)?;
    let min = field.pixels().iter().map(|c| c.r).fold(f32::INFINITY, f32::min);
    material.size = -min;
    material.sdf = Some(sdf);
    tracing::debug!(covered, size = material.size, "portal sdf applied");
    Ok(field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use afterglow_render::SoftwareRenderer;
    use glam::Vec2;

    fn run(geometry: Geometry, resolution: u32) -> (Result<ImageBuffer, PortalError>, MeshPortalMaterial) {
        let mut backend = SoftwareRenderer::default();
        let mut registry = DisposalRegistry::new();
        let mut material = MeshPortalMaterial::new(0.5);
        let out = apply_sdf(
            &mut backend,
            &mut registry,
            Arc::new(geometry),
            resolution,
            &mut material,
        );
        (out, material)
    }

    #[test]
    fn square_portal_depth_is_half_width() {
        // 2x2 quad in a 2.25 wide frustum covers texels 1..=14 of 16.
        let (field, material) = run(Geometry::quad(2.0, 2.0), 16);
        let field = field.unwrap();
        assert!((material.size - 7.0).abs() < 1e-4);
        assert!(material.sdf.is_some());
        assert!(field.texel(7, 7).r < 0.0);
        assert!((field.texel(0, 0).r - 2.0_f32.sqrt()).abs() < 1e-4);
        assert!((field.texel(0, 7).r - 1.0).abs() < 1e-4);
        // Opaque in the middle, fading at the rim, gone outside.
        assert_eq!(material.alpha(field.texel(7, 7).r), 1.0);
        let rim = material.alpha(field.texel(1, 1).r);
        assert!(rim > 0.0 && rim < 0.5, "{rim}");
        assert_eq!(material.alpha(field.texel(0, 0).r), 0.0);
    }

    #[test]
    fn disc_portal_is_deepest_in_the_middle() {
        let (field, material) = run(Geometry::circle(1.0, 64), 32);
        let field = field.unwrap();
        assert!(material.size > 12.0 && material.size < 16.5, "{}", material.size);
        let middle = field.texel(16, 16).r;
        assert!(middle < -12.0);
        assert!(field.texel(0, 31).r > 0.0);
    }

    #[test]
    fn empty_geometry_is_rejected() {
        let empty = Geometry {
            positions: Vec::new(),
            normals: Vec::new(),
            uvs: Vec::new(),
            indices: Vec::new(),
        };
        assert!(matches!(run(empty, 8).0, Err(PortalError::EmptyGeometry)));
    }

    #[test]
    fn silhouette_facing_away_gives_empty_mask() {
        let clockwise = Geometry {
            positions: vec![
                Vec3::new(-1.0, -1.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(1.0, -1.0, 0.0),
            ],
            normals: vec![Vec3::Z; 3],
            uvs: vec![Vec2::ZERO; 3],
            indices: vec![0, 1, 2],
        };
        assert!(matches!(run(clockwise, 8).0, Err(PortalError::EmptyMask(8))));
    }
}
