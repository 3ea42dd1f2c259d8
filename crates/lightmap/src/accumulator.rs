use std::time::Instant;

use afterglow_common::{Color, ObjectId};
use afterglow_render::{
    Camera, DisposalRegistry, RenderBackend, ScenePass, TargetDesc, TargetFormat, TargetId,
};
use afterglow_scene::Scene;
use serde::{Deserialize, Serialize};

use crate::error::LightMapError;
use crate::swap::{CaptureList, LightCaptureSession};
use crate::timing::PassTimer;

/// Light map configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightMapConfig {
    /// Width and height of both accumulation buffers.
    pub resolution: u32,
    pub format: TargetFormat,
    /// Blend window used by [`ProgressiveLightMap::accumulate`] callers that
    /// have no opinion.
    pub default_window: f32,
}

impl Default for LightMapConfig {
    fn default() -> Self {
        Self {
            resolution: 1024,
            format: TargetFormat::Rgba32Float,
            default_window: 100.0,
        }
    }
}

/// The ping-pong pair and which half the next update writes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccumulationState {
    pub buffer_a: TargetId,
    pub buffer_b: TargetId,
    pub active_is_a: bool,
    pub averaging_window: f32,
}

impl AccumulationState {
    /// Buffer the next update writes.
    pub fn active(&self) -> TargetId {
        if self.active_is_a {
            self.buffer_a
        } else {
            self.buffer_b
        }
    }

    /// Buffer holding the running average the next update reads.
    pub fn inactive(&self) -> TargetId {
        if self.active_is_a {
            self.buffer_b
        } else {
            self.buffer_a
        }
    }

    fn flip(&mut self) {
        self.active_is_a = !self.active_is_a;
    }
}

/// Accumulates a mesh's UV-space lighting over many passes.
///
/// Each [`update`](Self::update) renders the configured object's lighting into
/// the active buffer as `mix(previous, new, 1 / window)`, reading the other
/// buffer, then swaps roles.
#[derive(Debug)]
pub struct ProgressiveLightMap {
    config: LightMapConfig,
    state: AccumulationState,
    object: Option<ObjectId>,
    capture: Option<CaptureList>,
    passes: u64,
    timer: PassTimer,
}

impl ProgressiveLightMap {
    /// Allocate both buffers. The registry owns them from here on.
    pub fn new<B: RenderBackend + ?Sized>(
        backend: &mut B,
        registry: &mut DisposalRegistry,
        config: LightMapConfig,
    ) -> Result<Self, LightMapError> {
        let desc = TargetDesc::color(config.resolution, config.resolution, config.format);
        let buffer_a = registry.create(backend, desc)?;
        let buffer_b = registry.create(backend, desc)?;
        tracing::debug!(resolution = config.resolution, format = ?config.format, "light map allocated");
        Ok(Self {
            state: AccumulationState {
                buffer_a,
                buffer_b,
                active_is_a: false,
                averaging_window: config.default_window,
            },
            config,
            object: None,
            capture: None,
            passes: 0,
            timer: PassTimer::default(),
        })
    }

    pub fn config(&self) -> &LightMapConfig {
        &self.config
    }

    pub fn state(&self) -> &AccumulationState {
        &self.state
    }

    /// Choose the mesh whose surface receives the accumulated lighting.
    pub fn configure(&mut self, scene: &Scene, object: ObjectId) -> Result<(), LightMapError> {
        if scene.get(object).and_then(|o| o.as_mesh()).is_none() {
            return Err(LightMapError::UnknownObject(object));
        }
        self.object = Some(object);
        Ok(())
    }

    pub fn object(&self) -> Option<ObjectId> {
        self.object
    }

    /// Reset both buffers to opaque black and record the scene's meshes and
    /// display lights for later capture sessions.
    pub fn clear<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        scene: &Scene,
    ) -> Result<(), LightMapError> {
        backend.clear(self.state.buffer_a, Color::BLACK)?;
        backend.clear(self.state.buffer_b, Color::BLACK)?;
        let capture = CaptureList::record(scene);
        if capture.is_empty() {
            tracing::debug!("light map cleared on an empty scene");
        }
        self.capture = Some(capture);
        self.passes = 0;
        self.timer.reset();
        Ok(())
    }

    pub fn is_cleared(&self) -> bool {
        self.capture.is_some()
    }

    pub fn capture(&self) -> Option<&CaptureList> {
        self.capture.as_ref()
    }

    /// Start a capture session over the list recorded at [`clear`](Self::clear).
    pub fn prepare<'s>(&self, scene: &'s mut Scene) -> Result<LightCaptureSession<'s>, LightMapError> {
        let capture = self.capture.as_ref().ok_or(LightMapError::NotCleared)?;
        Ok(LightCaptureSession::begin(scene, capture))
    }

    /// Render one pass into the active buffer and flip. Returns the buffer
    /// that was written.
    pub fn update<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        scene: &Scene,
        camera: &Camera,
        window: f32,
    ) -> Result<TargetId, LightMapError> {
        if self.capture.is_none() {
            return Err(LightMapError::NotCleared);
        }
        let object = self.object.ok_or(LightMapError::NotConfigured)?;
        if window.is_nan() || window < 1.0 {
            return Err(LightMapError::InvalidBlendWindow(window));
        }
        if scene.get(object).and_then(|o| o.as_mesh()).is_none() {
            return Err(LightMapError::UnknownObject(object));
        }

        let start = Instant::now();
        let write = self.state.active();
        let pass = ScenePass::Lightmap {
            object,
            previous: self.state.inactive(),
            window,
        };
        backend.render_scene(scene, camera, write, &pass)?;
        self.state.averaging_window = window;
        self.state.flip();
        self.passes += 1;
        self.timer.record(start.elapsed());
        tracing::trace!(pass = self.passes, ?write, window, "light map pass");
        Ok(write)
    }

    /// The buffer written by the most recent update.
    pub fn latest(&self) -> TargetId {
        self.state.inactive()
    }

    /// Updates since the last clear.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    pub fn timer(&self) -> &PassTimer {
        &self.timer
    }

    /// Capture session plus `frames` updates, restoring the scene afterwards
    /// even if a pass fails.
    pub fn accumulate<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        scene: &mut Scene,
        camera: &Camera,
        frames: u32,
        window: f32,
    ) -> Result<TargetId, LightMapError> {
        let _span = tracing::info_span!("lightmap_accumulate", frames, window).entered();
        let session = self.prepare(scene)?;
        for _ in 0..frames {
            self.update(backend, session.scene(), camera, window)?;
        }
        session.finish();
        Ok(self.latest())
    }
}
