use std::f32::consts::PI;

use afterglow_common::{ObjectId, Transform};
use afterglow_scene::{Light, LightRole, Scene};
use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomizedLightConfig {
    /// Number of directional lights in the rig.
    pub amount: u32,
    /// Jitter range around `position`.
    pub radius: f32,
    /// Probability of placing a light on a random upper-hemisphere direction
    /// instead of jittering it around `position`.
    pub ambient: f32,
    /// Total intensity, split evenly across the lights.
    pub intensity: f32,
    pub position: Vec3,
    /// Point every light aims at.
    pub target: Vec3,
    pub cast_shadow: bool,
    pub seed: u64,
}

impl Default for RandomizedLightConfig {
    fn default() -> Self {
        Self {
            amount: 8,
            radius: 1.0,
            ambient: 0.5,
            intensity: 1.0,
            position: Vec3::new(5.0, 5.0, -10.0),
            target: Vec3::ZERO,
            cast_shadow: true,
            seed: 0x5eed,
        }
    }
}

/// A rig of bake-role directional lights that move on every update, so that
/// accumulated shadows soften into penumbrae and ambient occlusion.
#[derive(Debug)]
pub struct RandomizedLight {
    config: RandomizedLightConfig,
    lights: Vec<ObjectId>,
    rng: StdRng,
}

impl RandomizedLight {
    /// Add the rig's lights to `scene`, hidden until [`set_visible`](Self::set_visible).
    pub fn spawn(scene: &mut Scene, config: RandomizedLightConfig) -> Self {
        let amount = config.amount.max(1);
        let mut light = Light::directional(config.target, config.intensity / amount as f32)
            .with_role(LightRole::Bake);
        light.cast_shadow = config.cast_shadow;
        let lights = (0..amount)
            .map(|i| {
                let id = scene.add_light(
                    format!("randomized_light_{i}"),
                    light,
                    Transform::from_position(config.position),
                );
                scene.set_visible(id, false);
                id
            })
            .collect();
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            lights,
        }
    }

    pub fn config(&self) -> &RandomizedLightConfig {
        &self.config
    }

    pub fn lights(&self) -> &[ObjectId] {
        &self.lights
    }

    pub fn set_visible(&self, scene: &mut Scene, visible: bool) {
        for &id in &self.lights {
            scene.set_visible(id, visible);
        }
    }

    /// Move every light to a fresh random position.
    pub fn update(&mut self, scene: &mut Scene) {
        let length = self.config.position.length();
        let half = self.config.radius.abs() / 2.0;
        for &id in &self.lights {
            let position = if self.rng.r#gen::<f32>() > self.config.ambient {
                let jitter = Vec3::new(
                    self.rng.gen_range(-half..=half),
                    self.rng.gen_range(-half..=half),
                    self.rng.gen_range(-half..=half),
                );
                self.config.position + jitter
            } else {
                let lambda = (2.0 * self.rng.r#gen::<f32>() - 1.0).acos() - PI / 2.0;
                let phi = 2.0 * PI * self.rng.r#gen::<f32>();
                Vec3::new(
                    lambda.cos() * phi.cos() * length,
                    (lambda.cos() * phi.sin() * length).abs(),
                    lambda.sin() * length,
                )
            };
            scene.set_transform(id, Transform::from_position(position));
        }
    }

    /// Take the rig's lights out of the scene.
    pub fn despawn(self, scene: &mut Scene) {
        for id in self.lights {
            scene.remove(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions(scene: &Scene, rig: &RandomizedLight) -> Vec<Vec3> {
        rig.lights()
            .iter()
            .map(|id| scene.get(*id).unwrap().transform.position)
            .collect()
    }

    #[test]
    fn spawn_splits_intensity_across_hidden_bake_lights() {
        let mut scene = Scene::new();
        let rig = RandomizedLight::spawn(&mut scene, RandomizedLightConfig::default());
        assert_eq!(rig.lights().len(), 8);
        for (_, obj, light) in scene.lights() {
            assert!(!obj.visible);
            assert_eq!(light.role, LightRole::Bake);
            assert_eq!(light.intensity, 0.125);
        }
        rig.despawn(&mut scene);
        assert_eq!(scene.object_count(), 0);
    }

    #[test]
    fn jitter_stays_within_radius() {
        let mut scene = Scene::new();
        let config = RandomizedLightConfig {
            ambient: 0.0,
            radius: 2.0,
            ..RandomizedLightConfig::default()
        };
        let center = config.position;
        let mut rig = RandomizedLight::spawn(&mut scene, config);
        for _ in 0..10 {
            rig.update(&mut scene);
            for p in positions(&scene, &rig) {
                assert!((p - center).abs().max_element() <= 1.0);
            }
        }
    }

    #[test]
    fn ambient_lights_stay_on_upper_hemisphere() {
        let mut scene = Scene::new();
        let config = RandomizedLightConfig {
            ambient: 1.0,
            ..RandomizedLightConfig::default()
        };
        let length = config.position.length();
        let mut rig = RandomizedLight::spawn(&mut scene, config);
        for _ in 0..10 {
            rig.update(&mut scene);
            for p in positions(&scene, &rig) {
                assert!(p.y >= 0.0);
                assert!((p.length() - length).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn same_seed_same_sequence() {
        let run = || {
            let mut scene = Scene::new();
            let mut rig = RandomizedLight::spawn(&mut scene, RandomizedLightConfig::default());
            rig.update(&mut scene);
            rig.update(&mut scene);
            positions(&scene, &rig)
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn different_seeds_move_lights_differently() {
        let run = |seed| {
            let mut scene = Scene::new();
            let config = RandomizedLightConfig {
                seed,
                ..RandomizedLightConfig::default()
            };
            let mut rig = RandomizedLight::spawn(&mut scene, config);
            rig.update(&mut scene);
            positions(&scene, &rig)
        };
        assert_ne!(run(1), run(2));
    }

    #[test]
    fn zero_radius_pins_lights_to_position() {
        let mut scene = Scene::new();
        let config = RandomizedLightConfig {
            ambient: 0.0,
            radius: 0.0,
            ..RandomizedLightConfig::default()
        };
        let center = config.position;
        let mut rig = RandomizedLight::spawn(&mut scene, config);
        rig.update(&mut scene);
        assert!(positions(&scene, &rig).iter().all(|p| *p == center));
    }
}
