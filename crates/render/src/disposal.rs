use crate::backend::{RenderBackend, TargetId};
use crate::error::RenderError;
use crate::image::TargetDesc;

/// Explicit owner of the render targets a component allocates.
///
/// Callers pass a registry into each component and call [`dispose`] when the
/// component's lifetime ends. Nothing is pooled globally.
///
/// [`dispose`]: DisposalRegistry::dispose
#[derive(Debug, Default)]
pub struct DisposalRegistry {
    targets: Vec<TargetId>,
}

impl DisposalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a target on `backend` and take ownership of it.
    pub fn create<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        desc: TargetDesc,
    ) -> Result<TargetId, RenderError> {
        let id = backend.create_target(desc)?;
        self.targets.push(id);
        Ok(id)
    }

    pub fn track(&mut self, id: TargetId) -> TargetId {
        if !self.targets.contains(&id) {
            self.targets.push(id);
        }
        id
    }

    pub fn contains(&self, id: TargetId) -> bool {
        self.targets.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Destroy every tracked target. Returns how many the backend still held.
    pub fn dispose<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) -> usize {
        let freed = self
            .targets
            .drain(..)
            .filter(|id| backend.destroy_target(*id))
            .count();
        tracing::debug!(freed, "disposed render targets");
        freed
    }
}
