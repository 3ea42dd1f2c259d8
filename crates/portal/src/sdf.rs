use afterglow_render::{
    DisposalRegistry, FullscreenPass, RenderBackend, TargetDesc, TargetFormat, TargetId,
};

use crate::error::PortalError;

/// Jump-flood signed distance field generator for a fixed mask size.
///
/// Distances are in texels: positive outside the mask, negative inside.
#[derive(Debug)]
pub struct SdfGenerator {
    width: u32,
    height: u32,
    /// Ping-pong pair for the flood rounds.
    flood: [TargetId; 2],
    inside: TargetId,
    outside: TargetId,
    output: TargetId,
}

impl SdfGenerator {
    pub fn new<B: RenderBackend + ?Sized>(
        backend: &mut B,
        registry: &mut DisposalRegistry,
        width: u32,
        height: u32,
    ) -> Result<Self, PortalError> {
        let seeds = TargetDesc::color(width, height, TargetFormat::Rgba32Float);
        let field = TargetDesc::color(width, height, TargetFormat::R32Float);
        Ok(Self {
            width,
            height,
            flood: [
                registry.create(backend, seeds)?,
                registry.create(backend, seeds)?,
            ],
            inside: registry.create(backend, field)?,
            outside: registry.create(backend, field)?,
            output: registry.create(backend, field)?,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// `ceil(log2(max(width, height)))`.
    pub fn passes(&self) -> u32 {
        self.width.max(self.height).next_power_of_two().trailing_zeros()
    }

    /// Neighbour spacing of each flood round, halving down to 1.
    pub fn offsets(&self) -> impl Iterator<Item = u32> {
        let passes = self.passes();
        (0..passes).map(move |i| 1 << (passes - i - 1))
    }

    /// Target holding the last generated field.
    pub fn output(&self) -> TargetId {
        self.output
    }

    /// Build the signed field of `mask` (texels with `r >= 0.5` are covered)
    /// into [`output`](Self::output).
    pub fn generate<B: RenderBackend + ?Sized>(
        &self,
        backend: &mut B,
        mask: TargetId,
    ) -> Result<TargetId, PortalError> {
        let actual = backend
            .target_desc(mask)
            .map(|d| (d.width, d.height))
            .ok_or(afterglow_render::RenderError::UnknownTarget(mask))?;
        if actual != self.size() {
            return Err(PortalError::MaskSize {
                expected: self.size(),
                actual,
            });
        }
        let _span = tracing::info_span!("sdf_generate", width = self.width, height = self.height)
            .entered();
        // Outside texels measure to the nearest covered one, and vice versa.
        self.flood(backend, mask, true, self.outside)?;
        self.flood(backend, mask, false, self.inside)?;
        backend.render_fullscreen(
            self.output,
            &FullscreenPass::SdfComposite {
                mask,
                inside: self.inside,
                outside: self.outside,
            },
        )?;
        Ok(self.output)
    }

    fn flood<B: RenderBackend + ?Sized>(
        &self,
        backend: &mut B,
        mask: TargetId,
        covered: bool,
        field: TargetId,
    ) -> Result<(), PortalError> {
        let [mut read, mut write] = self.flood;
        backend.render_fullscreen(read, &FullscreenPass::JumpFloodSeed { mask, covered })?;
        for offset in self.offsets() {
            backend.render_fullscreen(
                write,
                &FullscreenPass::JumpFloodStep {
                    source: read,
                    offset,
                },
            )?;
            std::mem::swap(&mut read, &mut write);
        }
        backend.render_fullscreen(field, &FullscreenPass::DistanceField { source: read })?;
        tracing::debug!(covered, passes = self.passes(), "flood complete");
        Ok(())
    }
}
