use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use afterglow_caustics::{CausticsProjector, LightSource, RefreshOutcome};
use afterglow_lightmap::AccumulativeShadows;
use afterglow_portal::{MeshPortalMaterial, apply_sdf};
use afterglow_render::{DisposalRegistry, RenderBackend, SoftwareRenderer};
use anyhow::{Context, bail};
use glam::Vec3;

use crate::config::AppConfig;
use crate::demo::{self, PortalShape};
use crate::output::{self, Report};

pub struct ShadowArgs {
    pub out: PathBuf,
    pub frames: Option<u32>,
    pub resolution: Option<u32>,
    pub temporal: bool,
}

pub struct CausticsArgs {
    pub out: PathBuf,
    pub resolution: Option<u32>,
    pub light: Option<Vec3>,
    pub backside: bool,
}

pub struct PortalArgs {
    pub out: PathBuf,
    pub resolution: Option<u32>,
    pub blur: Option<f32>,
    pub shape: PortalShape,
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1e3
}

fn finish<B: RenderBackend + ?Sized>(registry: &mut DisposalRegistry, backend: &mut B) {
    let freed = registry.dispose(backend);
    tracing::debug!(freed, "render targets released");
}

/// Bake soft shadows under the demo objects and write the catcher texture.
pub fn shadows(config: &AppConfig, args: &ShadowArgs) -> anyhow::Result<Report> {
    let start = Instant::now();
    let mut shadow_config = config.shadows.clone();
    if let Some(frames) = args.frames {
        shadow_config.frames = Some(frames);
    }
    if let Some(resolution) = args.resolution {
        shadow_config.resolution = resolution;
    }
    shadow_config.temporal |= args.temporal;

    let mut backend = SoftwareRenderer::new(config.renderer.clone());
    let mut registry = DisposalRegistry::new();
    let mut scene = demo::shadow_scene();
    let mut shadows =
        AccumulativeShadows::new(&mut backend, &mut registry, &mut scene, shadow_config)
            .context("failed to set up shadow baking")?;
    shadows.add_rig(&mut scene, config.rig.clone());
    shadows.bake(&mut backend, &mut scene)?;

    // Temporal and continuous modes accumulate one pass per frame.
    let budget = {
        let c = shadows.config();
        c.frames.or(c.limit).unwrap_or(shadows.blend_window() as u32)
    };
    let mut frames = 0;
    while frames < budget && shadows.frame(&mut backend, &mut scene)? {
        frames += 1;
    }

    let img = shadows.shadow_image(&backend)?;
    let coverage = img.mean().a;
    output::write_png(&args.out, &output::flatten_on_white(&img))?;
    let stats = serde_json::json!({
        "blend_window": shadows.blend_window(),
        "frame_passes": frames,
        "lights": shadows.rigs().iter().map(|r| r.lights().len()).sum::<usize>(),
        "mean_coverage": coverage,
        "avg_pass_ms": shadows.lightmap().timer().average().as_secs_f64() * 1e3,
    });
    finish(&mut registry, &mut backend);
    Ok(Report {
        command: "shadows",
        output: args.out.clone(),
        width: img.width(),
        height: img.height(),
        elapsed_ms: elapsed_ms(start),
        stats,
    })
}

/// Project caustics of the demo lens onto the ground and write the lit patch.
pub fn caustics(config: &AppConfig, args: &CausticsArgs) -> anyhow::Result<Report> {
    let start = Instant::now();
    let mut caustics_config = config.caustics.clone();
    if let Some(resolution) = args.resolution {
        caustics_config.resolution = resolution;
    }
    if let Some(light) = args.light {
        caustics_config.light_source = LightSource::Direction(light);
    }
    caustics_config.backside |= args.backside;
    let resolution = caustics_config.resolution;

    let mut backend = SoftwareRenderer::new(config.renderer.clone());
    let mut registry = DisposalRegistry::new();
    let scene = demo::caustics_scene();
    let mut projector = CausticsProjector::new(&mut backend, &mut registry, caustics_config)
        .context("failed to set up caustics")?;
    let outcome = projector.update(&mut backend, &scene)?;
    if outcome != RefreshOutcome::Rendered {
        bail!("caustics were not rendered: {outcome:?}");
    }

    let (front, back) = projector.caustics_targets();
    let (front, back) = (backend.read_pixels(front)?, backend.read_pixels(back)?);
    let material = projector
        .projection_material()
        .context("no projection after a render")?;
    let receiver = *projector.receiver().context("no receiver plane")?;
    let img = material.render_receiver(&receiver, &front, &back, resolution);
    output::write_png(&args.out, &img)?;

    let peak = front.pixels().iter().map(|c| c.r).fold(0.0_f32, f32::max);
    let fit = projector.fit().context("no projection fit after a render")?;
    let stats = serde_json::json!({
        "fit": fit,
        "receiver": receiver,
        "peak": peak,
    });
    finish(&mut registry, &mut backend);
    Ok(Report {
        command: "caustics",
        output: args.out.clone(),
        width: resolution,
        height: resolution,
        elapsed_ms: elapsed_ms(start),
        stats,
    })
}

/// Generate the signed distance field of a portal outline and write a preview.
pub fn portal_sdf(config: &AppConfig, args: &PortalArgs) -> anyhow::Result<Report> {
    let start = Instant::now();
    let resolution = args.resolution.unwrap_or(config.portal.resolution);
    let mut material = MeshPortalMaterial::new(args.blur.unwrap_or(config.portal.blur));

    let mut backend = SoftwareRenderer::new(config.renderer.clone());
    let mut registry = DisposalRegistry::new();
    let field = apply_sdf(
        &mut backend,
        &mut registry,
        Arc::new(args.shape.geometry()),
        resolution,
        &mut material,
    )?;
    output::write_png(&args.out, &output::sdf_preview(&field, material.size))?;

    let stats = serde_json::json!({
        "shape": format!("{:?}", args.shape),
        "size": material.size,
        "blur": material.blur,
    });
    finish(&mut registry, &mut backend);
    Ok(Report {
        command: "portal-sdf",
        output: args.out.clone(),
        width: resolution,
        height: resolution,
        elapsed_ms: elapsed_ms(start),
        stats,
    })
}

/// Write `report` next to the run when a path was given.
pub fn write_report(report: &Report, path: Option<&Path>) -> anyhow::Result<()> {
    if let Some(path) = path {
        report.write(path)?;
        tracing::info!(path = %path.display(), "report written");
    }
    Ok(())
}
