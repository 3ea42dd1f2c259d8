use std::path::Path;

use afterglow_caustics::CausticsConfig;
use afterglow_lightmap::{RandomizedLightConfig, ShadowsConfig};
use afterglow_portal::PortalConfig;
use afterglow_render::SoftwareConfig;
use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Everything the CLI can be told through a YAML file. Flags override it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub renderer: SoftwareConfig,
    pub shadows: ShadowsConfig,
    pub rig: RandomizedLightConfig,
    pub caustics: CausticsConfig,
    pub portal: PortalConfig,
}

impl AppConfig {
    /// Defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = serde_yaml::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }
}
