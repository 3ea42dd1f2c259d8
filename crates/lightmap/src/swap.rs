use std::collections::BTreeMap;

use afterglow_common::ObjectId;
use afterglow_scene::{LightRole, MaterialHandle, Scene};

/// Meshes and display lights recorded when a light map is cleared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureList {
    meshes: Vec<ObjectId>,
    lights: Vec<ObjectId>,
}

impl CaptureList {
    /// Record every mesh and every display-role light. Bake-role lights are
    /// the ones being accumulated and stay out of the swap.
    pub fn record(scene: &Scene) -> Self {
        Self {
            meshes: scene.meshes().map(|(id, _, _)| id).collect(),
            lights: scene
                .lights()
                .filter(|(_, _, light)| light.role == LightRole::Display)
                .map(|(id, _, _)| id)
                .collect(),
        }
    }

    pub fn meshes(&self) -> &[ObjectId] {
        &self.meshes
    }

    pub fn lights(&self) -> &[ObjectId] {
        &self.lights
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty() && self.lights.is_empty()
    }
}

/// Scoped material and light swap.
///
/// Creating a session replaces every captured mesh's material with the
/// scene's discard material and zeroes every captured light. The saved state
/// is written back by [`finish`](Self::finish) or, failing that, on drop.
#[derive(Debug)]
pub struct LightCaptureSession<'s> {
    scene: &'s mut Scene,
    saved_materials: BTreeMap<ObjectId, MaterialHandle>,
    saved_intensities: BTreeMap<ObjectId, f32>,
    restored: bool,
}

impl<'s> LightCaptureSession<'s> {
    /// Save and swap. Objects removed from the scene since the list was
    /// recorded are skipped.
    pub fn begin(scene: &'s mut Scene, capture: &CaptureList) -> Self {
        let discard = scene.discard_material();
        let mut saved_materials = BTreeMap::new();
        for &id in capture.meshes() {
            let Some(mesh) = scene.get(id).and_then(|o| o.as_mesh()) else {
                continue;
            };
            saved_materials.insert(id, mesh.material);
            scene.set_material(id, discard);
        }
        let mut saved_intensities = BTreeMap::new();
        for &id in capture.lights() {
            let Some(light) = scene.get(id).and_then(|o| o.as_light()) else {
                continue;
            };
            saved_intensities.insert(id, light.intensity);
            scene.set_intensity(id, 0.0);
        }
        tracing::debug!(
            meshes = saved_materials.len(),
            lights = saved_intensities.len(),
            "capture session started"
        );
        Self {
            scene,
            saved_materials,
            saved_intensities,
            restored: false,
        }
    }

    pub fn scene(&self) -> &Scene {
        &*self.scene
    }

    /// Mutable access for moving bake lights between passes.
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut *self.scene
    }

    pub fn saved_materials(&self) -> &BTreeMap<ObjectId, MaterialHandle> {
        &self.saved_materials
    }

    pub fn saved_intensities(&self) -> &BTreeMap<ObjectId, f32> {
        &self.saved_intensities
    }

    /// Restore everything that was swapped out.
    pub fn finish(mut self) {
        self.restore();
    }

    fn restore(&mut self) {
        if self.restored {
            return;
        }
        for (&id, &material) in &self.saved_materials {
            self.scene.set_material(id, material);
        }
        for (&id, &intensity) in &self.saved_intensities {
            self.scene.set_intensity(id, intensity);
        }
        self.restored = true;
        tracing::debug!("capture session restored");
    }
}

impl Drop for LightCaptureSession<'_> {
    fn drop(&mut self) {
        if !self.restored {
            tracing::warn!("capture session dropped without finish(), restoring scene");
            self.restore();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use afterglow_common::Transform;
    use afterglow_scene::{Geometry, Light, Material};
    use glam::Vec3;
    use std::sync::Arc;

    fn scene() -> (Scene, ObjectId, ObjectId, ObjectId) {
        let mut scene = Scene::new();
        let white = scene.add_material(Material::default());
        let cube = scene.add_mesh(
            "cube",
            Arc::new(Geometry::cuboid(Vec3::ONE)),
            white,
            Transform::default(),
        );
        let sun = scene.add_light(
            "sun",
            Light::directional(Vec3::ZERO, 0.8),
            Transform::from_position(Vec3::Y),
        );
        let rig = scene.add_light(
            "rig",
            Light::directional(Vec3::ZERO, 0.125).with_role(LightRole::Bake),
            Transform::from_position(Vec3::Y),
        );
        (scene, cube, sun, rig)
    }

    #[test]
    fn record_skips_bake_lights() {
        let (scene, cube, sun, _) = scene();
        let list = CaptureList::record(&scene);
        assert_eq!(list.meshes(), &[cube]);
        assert_eq!(list.lights(), &[sun]);
        assert!(CaptureList::record(&Scene::new()).is_empty());
    }

    #[test]
    fn begin_swaps_and_finish_restores() {
        let (mut scene, cube, sun, rig) = scene();
        let before = scene.state_hash();
        let list = CaptureList::record(&scene);

        let session = LightCaptureSession::begin(&mut scene, &list);
        let s = session.scene();
        let discard = s.discard_material();
        assert_eq!(s.get(cube).unwrap().as_mesh().unwrap().material, discard);
        assert_eq!(s.get(sun).unwrap().as_light().unwrap().intensity, 0.0);
        assert_eq!(s.get(rig).unwrap().as_light().unwrap().intensity, 0.125);
        session.finish();

        assert_eq!(scene.state_hash(), before);
    }

    #[test]
    fn drop_restores_on_early_return() {
        fn failing_capture(scene: &mut Scene, list: &CaptureList) -> Result<(), &'static str> {
            let _session = LightCaptureSession::begin(scene, list);
            Err("render failed")
        }
        let (mut scene, _, _, _) = scene();
        let before = scene.state_hash();
        let list = CaptureList::record(&scene);
        assert!(failing_capture(&mut scene, &list).is_err());
        assert_eq!(scene.state_hash(), before);
    }

    #[test]
    fn drop_restores_on_panic() {
        let (mut scene, _, _, _) = scene();
        let before = scene.state_hash();
        let list = CaptureList::record(&scene);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _session = LightCaptureSession::begin(&mut scene, &list);
            panic!("render panicked");
        }));
        assert!(result.is_err());
        assert_eq!(scene.state_hash(), before);
    }

    #[test]
    fn removed_objects_are_skipped() {
        let (mut scene, cube, _, _) = scene();
        let list = CaptureList::record(&scene);
        scene.remove(cube);
        let session = LightCaptureSession::begin(&mut scene, &list);
        assert!(session.saved_materials().is_empty());
        assert_eq!(session.saved_intensities().len(), 1);
    }
}
