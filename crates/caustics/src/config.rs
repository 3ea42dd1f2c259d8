use afterglow_common::{Color, ObjectId};
use afterglow_scene::Scene;
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::CausticsError;

/// Where the caustics light comes from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LightSource {
    /// Direction toward the light.
    Direction(Vec3),
    /// An object whose position, seen from the origin, gives the direction.
    Object(ObjectId),
}

impl LightSource {
    /// Unit vector pointing toward the light.
    pub fn direction(&self, scene: &Scene) -> Result<Vec3, CausticsError> {
        let v = match *self {
            Self::Direction(v) => v,
            Self::Object(id) => {
                scene
                    .get(id)
                    .ok_or(CausticsError::MissingLightObject(id))?
                    .transform
                    .position
            }
        };
        v.try_normalize().ok_or(CausticsError::InvalidLightDirection)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CausticsConfig {
    /// Refreshes to run. `None` refreshes every call.
    pub frames: Option<u32>,
    /// Hide the casters after rendering and show only their caustics.
    pub caustics_only: bool,
    /// Also trace refraction through back faces.
    pub backside: bool,
    pub ior: f32,
    pub backside_ior: f32,
    /// World-space size of the footprint each texel samples.
    pub world_radius: f32,
    pub intensity: f32,
    pub color: Color,
    /// Width and height of every target.
    pub resolution: u32,
    pub light_source: LightSource,
    pub near: f32,
    /// Far plane override. `None` reaches down to the ground plane.
    pub far: Option<f32>,
}

impl Default for CausticsConfig {
    fn default() -> Self {
        Self {
            frames: Some(1),
            caustics_only: false,
            backside: false,
            ior: 1.1,
            backside_ior: 1.1,
            world_radius: 0.3125,
            intensity: 0.05,
            color: Color::WHITE,
            resolution: 2048,
            light_source: LightSource::Direction(Vec3::ONE),
            near: 0.1,
            far: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use afterglow_common::Transform;
    use afterglow_scene::Light;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config: CausticsConfig = serde_yaml::from_str("ior: 1.5\nframes: ~\n").unwrap();
        assert_eq!(config.ior, 1.5);
        assert_eq!(config.frames, None);
        assert_eq!(config.resolution, 2048);
        assert_eq!(config.intensity, 0.05);
    }

    #[test]
    fn light_object_direction_is_normalized_position() {
        let mut scene = Scene::new();
        let sun = scene.add_light(
            "sun",
            Light::point(1.0),
            Transform::from_position(Vec3::new(0.0, 3.0, 4.0)),
        );
        let dir = LightSource::Object(sun).direction(&scene).unwrap();
        assert!((dir - Vec3::new(0.0, 0.6, 0.8)).length() < 1e-6);

        scene.remove(sun);
        assert!(matches!(
            LightSource::Object(sun).direction(&scene),
            Err(CausticsError::MissingLightObject(_))
        ));
        assert!(matches!(
            LightSource::Direction(Vec3::ZERO).direction(&scene),
            Err(CausticsError::InvalidLightDirection)
        ));
    }
}
