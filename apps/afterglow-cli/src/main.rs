mod commands;
mod config;
mod demo;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use glam::Vec3;
use tracing_subscriber::EnvFilter;

use crate::commands::{CausticsArgs, PortalArgs, ShadowArgs};
use crate::config::AppConfig;
use crate::demo::PortalShape;

#[derive(Parser)]
#[command(name = "afterglow", about = "Bake light-transport helpers headlessly")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// YAML file with renderer, shadow, caustics and portal settings
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Write a JSON summary of the run here
    #[arg(long, global = true)]
    report: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate info
    Info {
        /// Also probe for a GPU adapter
        #[arg(long)]
        gpu: bool,
    },
    /// Bake accumulated soft shadows of the demo scene
    Shadows {
        #[arg(short, long, default_value = "shadows.png")]
        out: PathBuf,
        /// Frames to accumulate
        #[arg(short, long)]
        frames: Option<u32>,
        /// Light map resolution
        #[arg(short, long)]
        resolution: Option<u32>,
        /// Ramp opacity in over successive frames
        #[arg(long)]
        temporal: bool,
    },
    /// Project refraction caustics of the demo lens onto the ground
    Caustics {
        #[arg(short, long, default_value = "caustics.png")]
        out: PathBuf,
        #[arg(short, long)]
        resolution: Option<u32>,
        /// Direction toward the light, as x,y,z
        #[arg(long, value_parser = parse_vec3, allow_hyphen_values = true)]
        light: Option<Vec3>,
        /// Add the second refraction through back faces
        #[arg(long)]
        backside: bool,
    },
    /// Generate a portal edge SDF and write a preview
    PortalSdf {
        #[arg(short, long, default_value = "portal_sdf.png")]
        out: PathBuf,
        #[arg(short, long)]
        resolution: Option<u32>,
        #[arg(short, long)]
        blur: Option<f32>,
        #[arg(long, value_enum, default_value_t)]
        shape: PortalShape,
    },
}

/// Parse `x,y,z` into a vector.
fn parse_vec3(s: &str) -> Result<Vec3, String> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<f32>().map_err(|e| format!("`{p}`: {e}")))
        .collect::<Result<Vec<_>, _>>()?;
    match parts.as_slice() {
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => Err(format!("expected x,y,z but got {} values", parts.len())),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let config = AppConfig::load(cli.config.as_deref())?;

    let report = match cli.command {
        Commands::Info { gpu } => {
            println!("afterglow v{}", env!("CARGO_PKG_VERSION"));
            println!("scene: {} demo objects", demo::shadow_scene().object_count());
            println!("render: {}", afterglow_render::crate_info());
            println!("lightmap: {}", afterglow_lightmap::crate_info());
            println!("caustics: {}", afterglow_caustics::crate_info());
            println!("portal: {}", afterglow_portal::crate_info());
            println!("render-wgpu: {}", afterglow_render_wgpu::crate_info());
            if gpu {
                match afterglow_render_wgpu::GpuContext::headless() {
                    Ok(ctx) => println!("gpu: {}", ctx.adapter_name()),
                    Err(e) => println!("gpu: unavailable ({e})"),
                }
            }
            return Ok(());
        }
        Commands::Shadows {
            out,
            frames,
            resolution,
            temporal,
        } => commands::shadows(
            &config,
            &ShadowArgs {
                out,
                frames,
                resolution,
                temporal,
            },
        )?,
        Commands::Caustics {
            out,
            resolution,
            light,
            backside,
        } => commands::caustics(
            &config,
            &CausticsArgs {
                out,
                resolution,
                light,
                backside,
            },
        )?,
        Commands::PortalSdf {
            out,
            resolution,
            blur,
            shape,
        } => commands::portal_sdf(
            &config,
            &PortalArgs {
                out,
                resolution,
                blur,
                shape,
            },
        )?,
    };

    println!(
        "{}: wrote {} ({}x{}) in {:.1} ms",
        report.command,
        report.output.display(),
        report.width,
        report.height,
        report.elapsed_ms
    );
    commands::write_report(&report, cli.report.as_deref())?;
    Ok(())
}
