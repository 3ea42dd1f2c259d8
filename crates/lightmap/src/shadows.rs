use std::sync::Arc;

use afterglow_common::{Color, ObjectId, Transform};
use afterglow_render::{Camera, DisposalRegistry, ImageBuffer, RenderBackend, TargetId};
use afterglow_scene::{Geometry, Scene};
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::accumulator::{LightMapConfig, ProgressiveLightMap};
use crate::error::LightMapError;
use crate::randomized::{RandomizedLight, RandomizedLightConfig};
use crate::soft_shadow::SoftShadowMaterial;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowsConfig {
    /// Frames to accumulate. `None` keeps accumulating every frame.
    pub frames: Option<u32>,
    /// Hard cap on frames for continuous accumulation.
    pub limit: Option<u32>,
    /// Blend window used when `frames` is `None`.
    pub blend: f32,
    /// Accumulate one frame per [`AccumulativeShadows::frame`] call instead
    /// of all at once.
    pub temporal: bool,
    pub opacity: f32,
    pub alpha_test: f32,
    pub color: Color,
    pub color_blend: f32,
    pub resolution: u32,
    /// Side length of the catcher plane.
    pub scale: f32,
    /// Catcher plane position.
    pub position: Vec3,
}

impl Default for ShadowsConfig {
    fn default() -> Self {
        Self {
            frames: Some(40),
            limit: None,
            blend: 20.0,
            temporal: false,
            opacity: 1.0,
            alpha_test: 0.75,
            color: Color::BLACK,
            color_blend: 2.0,
            resolution: 1024,
            scale: 10.0,
            position: Vec3::ZERO,
        }
    }
}

/// Soft shadows accumulated onto a horizontal catcher plane.
///
/// The catcher is a discard-material mesh that receives but never casts
/// shadows. Every update switches the randomized light rigs on, silences the
/// rest of the scene through a capture session, renders `frames` light map
/// passes and switches the rigs off again. The result is displayed through
/// [`SoftShadowMaterial`].
#[derive(Debug)]
pub struct AccumulativeShadows {
    config: ShadowsConfig,
    lightmap: ProgressiveLightMap,
    material: SoftShadowMaterial,
    catcher: ObjectId,
    camera: Camera,
    rigs: Vec<RandomizedLight>,
    count: u32,
}

impl AccumulativeShadows {
    pub fn new<B: RenderBackend + ?Sized>(
        backend: &mut B,
        registry: &mut DisposalRegistry,
        scene: &mut Scene,
        config: ShadowsConfig,
    ) -> Result<Self, LightMapError> {
        let discard = scene.discard_material();
        let catcher = scene.add_mesh(
            "shadow_catcher",
            Arc::new(Geometry::plane(config.scale, config.scale)),
            discard,
            Transform::from_position(config.position),
        );
        scene.set_shadows(catcher, false, true);

        let mut lightmap = ProgressiveLightMap::new(
            backend,
            registry,
            LightMapConfig {
                resolution: config.resolution,
                ..LightMapConfig::default()
            },
        )?;
        lightmap.configure(scene, catcher)?;

        let half = config.scale * 0.5;
        let camera = Camera::orthographic(-half, half, half, -half, 0.1, 1000.0)
            .at(config.position + Vec3::Y * config.scale)
            .looking_at(config.position);

        let material = SoftShadowMaterial {
            color: config.color,
            blend: config.color_blend,
            alpha_test: 0.0,
            opacity: 0.0,
        };
        let mut shadows = Self {
            config,
            lightmap,
            material,
            catcher,
            camera,
            rigs: Vec::new(),
            count: 0,
        };
        shadows.reset(backend, scene)?;
        Ok(shadows)
    }

    pub fn config(&self) -> &ShadowsConfig {
        &self.config
    }

    pub fn catcher(&self) -> ObjectId {
        self.catcher
    }

    pub fn material(&self) -> &SoftShadowMaterial {
        &self.material
    }

    pub fn lightmap(&self) -> &ProgressiveLightMap {
        &self.lightmap
    }

    pub fn rigs(&self) -> &[RandomizedLight] {
        &self.rigs
    }

    /// Frames accumulated by [`frame`](Self::frame) since the last reset.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Spawn a randomized light rig. Takes effect from the next reset.
    pub fn add_rig(&mut self, scene: &mut Scene, config: RandomizedLightConfig) -> &RandomizedLight {
        let index = self.rigs.len();
        self.rigs.push(RandomizedLight::spawn(scene, config));
        &self.rigs[index]
    }

    /// Blend window for every pass: at least 2, and the frame budget when
    /// there is one.
    pub fn blend_window(&self) -> f32 {
        match self.config.frames {
            Some(frames) => frames as f32,
            None => self.config.blend,
        }
        .max(2.0)
    }

    /// Clear the light map and hide the shadow until something accumulates.
    pub fn reset<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        scene: &Scene,
    ) -> Result<(), LightMapError> {
        self.lightmap.clear(backend, scene)?;
        self.material.opacity = 0.0;
        self.material.alpha_test = 0.0;
        self.count = 0;
        Ok(())
    }

    /// Accumulate `frames` passes, moving every rig before each one.
    pub fn update<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        scene: &mut Scene,
        frames: u32,
    ) -> Result<(), LightMapError> {
        let _span = tracing::info_span!("shadows_update", frames).entered();
        let (opacity, alpha_test) = (self.config.opacity, self.config.alpha_test);
        if self.config.temporal {
            let window = self.blend_window();
            self.material.opacity = opacity.min(self.material.opacity + opacity / window);
            self.material.alpha_test = alpha_test.min(self.material.alpha_test + alpha_test / window);
        } else {
            self.material.opacity = opacity;
            self.material.alpha_test = alpha_test;
        }

        for rig in &self.rigs {
            rig.set_visible(scene, true);
        }
        let result = self.run_passes(backend, scene, frames);
        for rig in &self.rigs {
            rig.set_visible(scene, false);
        }
        result
    }

    fn run_passes<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        scene: &mut Scene,
        frames: u32,
    ) -> Result<(), LightMapError> {
        let window = self.blend_window();
        let mut session = self.lightmap.prepare(scene)?;
        for _ in 0..frames {
            for rig in &mut self.rigs {
                rig.update(session.scene_mut());
            }
            self.lightmap
                .update(backend, session.scene(), &self.camera, window)?;
        }
        session.finish();
        Ok(())
    }

    /// Per-frame hook for temporal or continuous accumulation. Returns whether
    /// a pass ran.
    pub fn frame<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        scene: &mut Scene,
    ) -> Result<bool, LightMapError> {
        let continuous = self.config.frames.is_none();
        if !(self.config.temporal || continuous) {
            return Ok(false);
        }
        let under = |budget: Option<u32>| budget.is_none_or(|b| self.count < b);
        if !(under(self.config.frames) && under(self.config.limit)) {
            return Ok(false);
        }
        self.update(backend, scene, 1)?;
        self.count += 1;
        Ok(true)
    }

    /// Reset and, for a finite non-temporal budget, accumulate it all at once.
    pub fn bake<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        scene: &mut Scene,
    ) -> Result<(), LightMapError> {
        self.reset(backend, scene)?;
        if !self.config.temporal && self.config.frames.is_some() {
            let frames = self.blend_window() as u32;
            tracing::debug!(frames, "baking shadows");
            self.update(backend, scene, frames)?;
        }
        Ok(())
    }

    pub fn latest(&self) -> TargetId {
        self.lightmap.latest()
    }

    /// Read back the light map and shade it for display.
    pub fn shadow_image<B: RenderBackend + ?Sized>(&self, backend: &B) -> Result<ImageBuffer, LightMapError> {
        let lightmap = backend.read_pixels(self.latest())?;
        Ok(self.material.apply(&lightmap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use afterglow_render::SoftwareRenderer;
    use afterglow_scene::{Light, Material};

    fn overhead_rig() -> RandomizedLightConfig {
        RandomizedLightConfig {
            amount: 4,
            radius: 0.0,
            ambient: 0.0,
            position: Vec3::new(0.0, 10.0, 0.0),
            ..RandomizedLightConfig::default()
        }
    }

    fn setup(config: ShadowsConfig) -> (SoftwareRenderer, DisposalRegistry, Scene, AccumulativeShadows) {
        let mut backend = SoftwareRenderer::default();
        let mut registry = DisposalRegistry::new();
        let mut scene = Scene::new();
        let mut shadows = AccumulativeShadows::new(
            &mut backend,
            &mut registry,
            &mut scene,
            ShadowsConfig {
                resolution: 8,
                ..config
            },
        )
        .unwrap();
        shadows.add_rig(&mut scene, overhead_rig());
        (backend, registry, scene, shadows)
    }

    #[test]
    fn catcher_receives_but_never_casts() {
        let (_, _, scene, shadows) = setup(ShadowsConfig::default());
        let obj = scene.get(shadows.catcher()).unwrap();
        let mesh = obj.as_mesh().unwrap();
        assert_eq!(mesh.material, scene.discard_material());
        assert!(!mesh.cast_shadow);
        assert!(mesh.receive_shadow);
        assert_eq!(shadows.material().opacity, 0.0);
    }

    #[test]
    fn blend_window_follows_frame_budget() {
        let (_, _, _, shadows) = setup(ShadowsConfig::default());
        assert_eq!(shadows.blend_window(), 40.0);
        let (_, _, _, shadows) = setup(ShadowsConfig {
            frames: Some(1),
            ..ShadowsConfig::default()
        });
        assert_eq!(shadows.blend_window(), 2.0);
        let (_, _, _, shadows) = setup(ShadowsConfig {
            frames: None,
            ..ShadowsConfig::default()
        });
        assert_eq!(shadows.blend_window(), 20.0);
    }

    #[test]
    fn bake_accumulates_full_budget() {
        let (mut backend, _, mut scene, mut shadows) = setup(ShadowsConfig {
            frames: Some(4),
            ..ShadowsConfig::default()
        });
        shadows.bake(&mut backend, &mut scene).unwrap();
        assert_eq!(shadows.lightmap().passes(), 4);
        let lit = backend.read_pixels(shadows.latest()).unwrap().mean();
        // 1 - (1 - 1/4)^4
        assert!((lit.r - 0.683_593_75).abs() < 1e-4);
        assert_eq!(shadows.material().opacity, 1.0);
        assert_eq!(shadows.material().alpha_test, 0.75);
        for (_, obj, _) in scene.lights() {
            assert!(!obj.visible);
        }
    }

    #[test]
    fn blocker_leaves_opaque_shadow() {
        let (mut backend, _, mut scene, mut shadows) = setup(ShadowsConfig {
            frames: Some(4),
            ..ShadowsConfig::default()
        });
        let white = scene.add_material(Material::default());
        let cube = scene.add_mesh(
            "cube",
            Arc::new(Geometry::cuboid(Vec3::splat(2.0))),
            white,
            Transform::from_position(Vec3::new(0.0, 1.5, 0.0)),
        );
        shadows.bake(&mut backend, &mut scene).unwrap();

        let img = shadows.shadow_image(&backend).unwrap();
        assert_eq!(img.texel(3, 4).a, 1.0);
        assert_eq!(img.texel(4, 3).a, 1.0);
        assert_eq!(img.texel(0, 0).a, 0.0);
        assert_eq!(img.texel(7, 7).a, 0.0);
        // The capture swap put the cube's material back.
        assert_eq!(scene.get(cube).unwrap().as_mesh().unwrap().material, white);
    }

    #[test]
    fn temporal_frames_ramp_opacity_and_stop_at_budget() {
        let (mut backend, _, mut scene, mut shadows) = setup(ShadowsConfig {
            frames: Some(3),
            temporal: true,
            ..ShadowsConfig::default()
        });
        assert!(shadows.frame(&mut backend, &mut scene).unwrap());
        assert!((shadows.material().opacity - 1.0 / 3.0).abs() < 1e-6);
        assert!((shadows.material().alpha_test - 0.25).abs() < 1e-6);
        assert!(shadows.frame(&mut backend, &mut scene).unwrap());
        assert!(shadows.frame(&mut backend, &mut scene).unwrap());
        assert!(!shadows.frame(&mut backend, &mut scene).unwrap());
        assert_eq!(shadows.count(), 3);
        assert!((shadows.material().opacity - 1.0).abs() < 1e-6);

        shadows.reset(&mut backend, &scene).unwrap();
        assert_eq!(shadows.count(), 0);
        assert_eq!(shadows.material().opacity, 0.0);
    }

    #[test]
    fn continuous_accumulation_honors_limit() {
        let (mut backend, _, mut scene, mut shadows) = setup(ShadowsConfig {
            frames: None,
            limit: Some(2),
            ..ShadowsConfig::default()
        });
        let mut ran = 0;
        for _ in 0..5 {
            if shadows.frame(&mut backend, &mut scene).unwrap() {
                ran += 1;
            }
        }
        assert_eq!(ran, 2);
        assert_eq!(shadows.lightmap().passes(), 2);
    }

    #[test]
    fn unbounded_accumulation_leaves_scene_as_found() {
        let (mut backend, _, mut scene, mut shadows) = setup(ShadowsConfig {
            frames: None,
            limit: None,
            ..ShadowsConfig::default()
        });
        let white = scene.add_material(Material::default());
        let cube = scene.add_mesh(
            "cube",
            Arc::new(Geometry::cuboid(Vec3::ONE)),
            white,
            Transform::from_position(Vec3::new(0.0, 0.5, 0.0)),
        );
        let sun = scene.add_light(
            "sun",
            Light::directional(Vec3::ZERO, 0.8),
            Transform::from_position(Vec3::new(1.0, 4.0, 1.0)),
        );
        shadows.reset(&mut backend, &scene).unwrap();
        let before = scene.state_hash();
        let objects = scene.object_count();
        for _ in 0..200 {
            assert!(shadows.frame(&mut backend, &mut scene).unwrap());
            assert_eq!(scene.state_hash(), before);
        }
        assert_eq!(shadows.count(), 200);
        assert_eq!(scene.object_count(), objects);
        assert_eq!(scene.get(cube).unwrap().as_mesh().unwrap().material, white);
        assert_eq!(scene.get(sun).unwrap().as_light().unwrap().intensity, 0.8);
    }

    #[test]
    fn finite_non_temporal_ignores_frame_hook() {
        let (mut backend, _, mut scene, mut shadows) = setup(ShadowsConfig::default());
        assert!(!shadows.frame(&mut backend, &mut scene).unwrap());
        assert_eq!(shadows.lightmap().passes(), 0);
    }
}
