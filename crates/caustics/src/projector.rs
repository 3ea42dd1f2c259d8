use afterglow_common::Color;
use afterglow_render::{
    CausticsUniforms, DisposalRegistry, FaceSide, FullscreenPass, RenderBackend, ScenePass,
    TargetDesc, TargetFormat, TargetId,
};
use afterglow_scene::Scene;
use glam::Mat4;

use crate::config::CausticsConfig;
use crate::error::CausticsError;
use crate::fit::{FitOutcome, ProjectionFit, ProjectionFitter, ReceiverPlane, receiver_plane};
use crate::material::CausticsProjectionMaterial;

/// Where a refresh is, or stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshStage {
    #[default]
    Idle,
    ComputeBounds,
    FitProjectionCamera,
    RenderAuxiliaryPasses,
    RenderAccumulationPass,
}

/// What [`CausticsProjector::update`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Rendered,
    /// The fit was rejected; the previous caustics are still in the targets.
    Retained,
    /// The frame budget is spent; nothing ran.
    BudgetExhausted,
}

/// Front/back pair of targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TargetPair {
    front: TargetId,
    back: TargetId,
}

/// Caustics projector for the visible meshes of a caster scene.
#[derive(Debug)]
pub struct CausticsProjector {
    config: CausticsConfig,
    fitter: ProjectionFitter,
    normals: TargetPair,
    caustics: TargetPair,
    fit: Option<ProjectionFit>,
    receiver: Option<ReceiverPlane>,
    stage: RefreshStage,
    count: u32,
    rendered: u32,
    casters_visible: bool,
}

impl CausticsProjector {
    pub fn new<B: RenderBackend + ?Sized>(
        backend: &mut B,
        registry: &mut DisposalRegistry,
        config: CausticsConfig,
    ) -> Result<Self, CausticsError> {
        let res = config.resolution;
        let normals_desc = TargetDesc::color(res, res, TargetFormat::Rgba16Float).with_depth();
        let caustics_desc = TargetDesc::color(res, res, TargetFormat::Rgba32Float);
        let normals = TargetPair {
            front: registry.create(backend, normals_desc)?,
            back: registry.create(backend, normals_desc)?,
        };
        let caustics = TargetPair {
            front: registry.create(backend, caustics_desc)?,
            back: registry.create(backend, caustics_desc)?,
        };
        backend.clear(caustics.front, Color::BLACK)?;
        backend.clear(caustics.back, Color::BLACK)?;
        tracing::debug!(resolution = res, "caustics targets allocated");
        Ok(Self {
            config,
            fitter: ProjectionFitter::new(),
            normals,
            caustics,
            fit: None,
            receiver: None,
            stage: RefreshStage::Idle,
            count: 0,
            rendered: 0,
            casters_visible: true,
        })
    }

    pub fn config(&self) -> &CausticsConfig {
        &self.config
    }

    pub fn stage(&self) -> RefreshStage {
        self.stage
    }

    /// Refresh attempts counted against the frame budget.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Refreshes that produced new caustics.
    pub fn rendered(&self) -> u32 {
        self.rendered
    }

    /// Fit used by the caustics currently in the targets.
    pub fn fit(&self) -> Option<&ProjectionFit> {
        self.fit.as_ref()
    }

    pub fn fitter(&self) -> &ProjectionFitter {
        &self.fitter
    }

    pub fn receiver(&self) -> Option<&ReceiverPlane> {
        self.receiver.as_ref()
    }

    /// Whether the host should draw the casters themselves.
    pub fn casters_visible(&self) -> bool {
        self.casters_visible
    }

    /// Front and back normal captures.
    pub fn normals_targets(&self) -> (TargetId, TargetId) {
        (self.normals.front, self.normals.back)
    }

    /// Front and back caustics.
    pub fn caustics_targets(&self) -> (TargetId, TargetId) {
        (self.caustics.front, self.caustics.back)
    }

    pub fn light_view(&self) -> Option<Mat4> {
        self.fit.map(|f| f.camera().view_matrix())
    }

    pub fn light_projection(&self) -> Option<Mat4> {
        self.fit.map(|f| f.camera().projection_matrix())
    }

    /// Material that projects the current caustics, once anything rendered.
    pub fn projection_material(&self) -> Option<CausticsProjectionMaterial> {
        let camera = self.fit?.camera();
        Some(CausticsProjectionMaterial {
            color: self.config.color,
            light_view: camera.view_matrix(),
            light_projection: camera.projection_matrix(),
        })
    }

    /// Reset the frame budget.
    pub fn restart(&mut self) {
        self.count = 0;
    }

    /// Run one refresh if the frame budget allows it.
    pub fn update<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        scene: &Scene,
    ) -> Result<RefreshOutcome, CausticsError> {
        if self.config.frames.is_some_and(|frames| self.count >= frames) {
            return Ok(RefreshOutcome::BudgetExhausted);
        }
        self.count += 1;
        let _span = tracing::info_span!("caustics_refresh", refresh = self.count).entered();
        let result = self.refresh(backend, scene);
        if let Err(e) = &result {
            tracing::warn!(error = %e, stage = ?self.stage, "caustics refresh failed");
        }
        self.stage = RefreshStage::Idle;
        result
    }

    fn refresh<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        scene: &Scene,
    ) -> Result<RefreshOutcome, CausticsError> {
        let dir = self.config.light_source.direction(scene)?;

        self.stage = RefreshStage::ComputeBounds;
        let bounds = scene.bounding_box();

        self.stage = RefreshStage::FitProjectionCamera;
        let FitOutcome::Fresh(fit) = self.fitter.fit(&bounds, dir, self.config.near, self.config.far)?
        else {
            tracing::debug!("caustics retained from the previous refresh");
            return Ok(RefreshOutcome::Retained);
        };
        match receiver_plane(&bounds, dir) {
            Ok(receiver) => self.receiver = Some(receiver),
            Err(e) => tracing::warn!(error = %e, "receiver plane not updated"),
        }
        let camera = fit.camera();
        self.casters_visible = true;

        self.stage = RefreshStage::RenderAuxiliaryPasses;
        backend.clear(self.normals.front, Color::TRANSPARENT)?;
        backend.render_scene(
            scene,
            &camera,
            self.normals.front,
            &ScenePass::Normals {
                side: FaceSide::Front,
            },
        )?;
        backend.clear(self.normals.back, Color::TRANSPARENT)?;
        if self.config.backside {
            backend.render_scene(
                scene,
                &camera,
                self.normals.back,
                &ScenePass::Normals {
                    side: FaceSide::Back,
                },
            )?;
        }

        self.stage = RefreshStage::RenderAccumulationPass;
        let uniforms = |normals: TargetId, ior: f32| CausticsUniforms {
            normals,
            camera_world: camera.world_matrix(),
            projection_inverse: camera.projection_inverse(),
            light_dir: -fit.direction,
            receiver: camera.far_plane(),
            resolution: self.config.resolution as f32,
            size: fit.radius,
            world_radius: self.config.world_radius,
            intensity: self.config.intensity,
            ior,
        };
        backend.render_fullscreen(
            self.caustics.front,
            &FullscreenPass::Caustics(uniforms(self.normals.front, self.config.ior)),
        )?;
        backend.clear(self.caustics.back, Color::BLACK)?;
        if self.config.backside {
            backend.render_fullscreen(
                self.caustics.back,
                &FullscreenPass::Caustics(uniforms(self.normals.back, self.config.backside_ior)),
            )?;
        }

        self.fit = Some(fit);
        self.rendered += 1;
        if self.config.caustics_only {
            self.casters_visible = false;
        }
        tracing::debug!(radius = fit.radius, far = fit.far, "caustics rendered");
        Ok(RefreshOutcome::Rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use afterglow_common::{ObjectId, Transform};
    use afterglow_render::SoftwareRenderer;
    use afterglow_scene::{Geometry, Material};
    use glam::Vec3;
    use std::sync::Arc;

    use crate::config::LightSource;

    fn overhead(config: CausticsConfig) -> CausticsConfig {
        CausticsConfig {
            resolution: 32,
            near: -0.5,
            light_source: LightSource::Direction(Vec3::Y),
            ..config
        }
    }

    fn slab_scene() -> (Scene, ObjectId) {
        let mut scene = Scene::new();
        let glass = scene.add_material(Material::default());
        let slab = scene.add_mesh(
            "slab",
            Arc::new(Geometry::cuboid(Vec3::new(2.0, 0.2, 2.0))),
            glass,
            Transform::from_position(Vec3::new(0.0, 1.0, 0.0)),
        );
        (scene, slab)
    }

    fn setup(config: CausticsConfig) -> (SoftwareRenderer, CausticsProjector) {
        let mut backend = SoftwareRenderer::default();
        let mut registry = DisposalRegistry::new();
        let projector = CausticsProjector::new(&mut backend, &mut registry, overhead(config)).unwrap();
        (backend, projector)
    }

    fn front(backend: &SoftwareRenderer, p: &CausticsProjector) -> afterglow_render::ImageBuffer {
        backend.read_pixels(p.caustics_targets().0).unwrap()
    }

    #[test]
    fn flat_slab_passes_light_unchanged() {
        let (mut backend, mut p) = setup(CausticsConfig::default());
        let (scene, _) = slab_scene();
        assert_eq!(p.update(&mut backend, &scene).unwrap(), RefreshOutcome::Rendered);
        assert_eq!(p.stage(), RefreshStage::Idle);

        let img = front(&backend, &p);
        assert!((img.texel(16, 16).r - 0.05).abs() < 1e-3);
        assert_eq!(img.texel(16, 16).a, 1.0);
        // Outside the slab's silhouette.
        assert_eq!(img.texel(0, 0).r, 0.0);

        let fit = p.fit().unwrap();
        assert!((fit.radius - 2.0_f32.sqrt()).abs() < 1e-5);
        assert!((fit.far - 1.1).abs() < 1e-5);
        let receiver = p.receiver().unwrap();
        assert!((receiver.size - 2.0 * 2.0_f32.sqrt()).abs() < 1e-5);
    }

    #[test]
    fn backside_adds_second_refraction() {
        let (mut backend, mut p) = setup(CausticsConfig {
            backside: true,
            ..CausticsConfig::default()
        });
        let (scene, _) = slab_scene();
        p.update(&mut backend, &scene).unwrap();
        let (f, b) = p.caustics_targets();
        let front = backend.read_pixels(f).unwrap();
        let back = backend.read_pixels(b).unwrap();
        assert!((back.texel(16, 16).r - 0.05).abs() < 1e-3);

        let material = p.projection_material().unwrap();
        let c = material.shade(Vec3::ZERO, &front, &back);
        assert!((c.r - 0.1).abs() < 2e-3);
    }

    #[test]
    fn frame_budget_counts_refreshes() {
        let (mut backend, mut p) = setup(CausticsConfig::default());
        let (scene, _) = slab_scene();
        assert_eq!(p.update(&mut backend, &scene).unwrap(), RefreshOutcome::Rendered);
        assert_eq!(
            p.update(&mut backend, &scene).unwrap(),
            RefreshOutcome::BudgetExhausted
        );
        p.restart();
        assert_eq!(p.update(&mut backend, &scene).unwrap(), RefreshOutcome::Rendered);
        assert_eq!(p.rendered(), 2);
    }

    #[test]
    fn degenerate_scene_retains_previous_caustics() {
        let (mut backend, mut p) = setup(CausticsConfig {
            frames: None,
            ..CausticsConfig::default()
        });
        let (mut scene, slab) = slab_scene();
        p.update(&mut backend, &scene).unwrap();
        let before = front(&backend, &p);
        let fit = *p.fit().unwrap();

        scene.set_visible(slab, false);
        assert_eq!(p.update(&mut backend, &scene).unwrap(), RefreshOutcome::Retained);
        assert_eq!(front(&backend, &p).max_abs_diff(&before), 0.0);
        assert_eq!(p.fit(), Some(&fit));
        assert_eq!(p.fitter().rejected(), 1);
        assert_eq!(p.rendered(), 1);
    }

    #[test]
    fn empty_scene_before_any_render_is_retained() {
        let (mut backend, mut p) = setup(CausticsConfig::default());
        assert_eq!(
            p.update(&mut backend, &Scene::new()).unwrap(),
            RefreshOutcome::Retained
        );
        assert!(p.projection_material().is_none());
        assert_eq!(front(&backend, &p).mean().r, 0.0);
    }

    #[test]
    fn caustics_only_hides_casters_after_render() {
        let (mut backend, mut p) = setup(CausticsConfig {
            caustics_only: true,
            ..CausticsConfig::default()
        });
        assert!(p.casters_visible());
        let (scene, _) = slab_scene();
        p.update(&mut backend, &scene).unwrap();
        assert!(!p.casters_visible());
    }

    #[test]
    fn convex_lens_concentrates_light() {
        let (mut backend, mut p) = setup(CausticsConfig::default());
        let mut scene = Scene::new();
        let glass = scene.add_material(Material::default());
        scene.add_mesh(
            "sphere",
            Arc::new(Geometry::uv_sphere(1.0, 32, 16)),
            glass,
            Transform::from_position(Vec3::new(0.0, 2.0, 0.0)),
        );
        p.update(&mut backend, &scene).unwrap();
        let img = front(&backend, &p);
        let peak = img.pixels().iter().map(|c| c.r).fold(0.0_f32, f32::max);
        assert!(peak > 0.05, "peak {peak}");
    }

    #[test]
    fn missing_light_object_is_an_error() {
        let (mut backend, mut p) = setup(CausticsConfig::default());
        let (scene, _) = slab_scene();
        p.config.light_source = LightSource::Object(ObjectId::new());
        assert!(matches!(
            p.update(&mut backend, &scene),
            Err(CausticsError::MissingLightObject(_))
        ));
        assert_eq!(p.stage(), RefreshStage::Idle);
    }
}
