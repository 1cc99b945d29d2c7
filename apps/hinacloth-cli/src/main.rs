use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use hinacloth_common::{BackendVariant, ClothSettings};
use hinacloth_playback::{
    ClothContext, CommandReport, ContextInspector, ManualHost, SceneStatusInfo, TickOutcome,
};
use hinacloth_scene::{Scene, SceneObject};
use hinacloth_solver::{BackendProvider, ReferenceProvider};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

const DEFAULT_OBJECT: &str = "Cloth";

#[derive(Parser)]
#[command(name = "hinacloth-cli", about = "CLI tool for HinaCloth cloth sessions")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Cloth settings file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and the effective settings
    Info,
    /// Bake the cloth grid over a frame range
    Bake {
        /// First frame to bake
        #[arg(long)]
        start: Option<i32>,
        /// Last frame to bake
        #[arg(long)]
        end: Option<i32>,
        /// Step implementation: native, tbb or avx2
        #[arg(short, long)]
        backend: Option<BackendVariant>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the modal solver for a number of timer ticks
    Run {
        /// Number of timer ticks to drive
        #[arg(short, long, default_value = "60")]
        ticks: u32,
        /// Keep the existing solver state instead of resetting it
        #[arg(long)]
        no_reset: bool,
    },
}

#[derive(Serialize)]
struct BakeOutput<'a> {
    report: &'a CommandReport,
    scene: &'a SceneStatusInfo,
}

fn load_settings(path: Option<&PathBuf>) -> anyhow::Result<ClothSettings> {
    let mut settings = match path {
        Some(path) => ClothSettings::load(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => ClothSettings::default(),
    };
    if settings.target_object.is_none() {
        settings.target_object = Some(DEFAULT_OBJECT.into());
    }
    Ok(settings)
}

/// A scene holding one grid object shaped like the configured solver grid.
fn build_scene(settings: ClothSettings) -> anyhow::Result<Scene> {
    let object = settings
        .target_object
        .clone()
        .unwrap_or_else(|| DEFAULT_OBJECT.into());
    let mut scene = Scene::with_settings("cli", settings);
    scene.add_object(SceneObject::grid(object, scene.settings.topology()))?;
    Ok(scene)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let settings = load_settings(cli.config.as_ref())?;

    match cli.command {
        Commands::Info => {
            let signature = settings.signature();
            let range = settings.frame_range(1);
            println!("hinacloth-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("provider: {}", ReferenceProvider::new().name());
            println!(
                "grid: {}x{} spacing={} particles={}",
                signature.topology.grid_width,
                signature.topology.grid_height,
                signature.topology.spacing,
                signature.topology.particle_count()
            );
            println!(
                "frames: {}..={} ({} frames), tick interval {:?}",
                range.start,
                range.end,
                range.len(),
                settings.tick_interval()
            );
            print!("{}", settings.to_yaml()?);
        }
        Commands::Bake {
            start,
            end,
            backend,
            json,
        } => {
            let mut settings = settings;
            if let Some(start) = start {
                settings.start_frame = start;
            }
            if let Some(end) = end {
                settings.end_frame = end;
            }
            if let Some(backend) = backend {
                settings.backend = backend;
            }
            settings.validate()?;

            let mut scene = build_scene(settings)?;
            let mut ctx = ClothContext::init(Box::new(ReferenceProvider::new()));
            let mut host = ManualHost::new();

            let report = ctx.bake(&mut scene, &mut host, true);
            tracing::info!(
                status = ?report.status,
                frames = report.frame_count,
                backend = %scene.settings.backend,
                "bake command returned"
            );
            let info = ContextInspector::scene_status(&ctx, &scene);
            if json {
                let output = BakeOutput {
                    report: &report,
                    scene: &info,
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("{report}");
                println!("{info}");
                println!("{}", ContextInspector::summary(&ctx));
            }
            ctx.shutdown(&mut host);
            if !report.is_finished() {
                bail!("bake did not finish: {}", report.message);
            }
        }
        Commands::Run { ticks, no_reset } => {
            let mut scene = build_scene(settings)?;
            let mut ctx = ClothContext::init(Box::new(ReferenceProvider::new()));
            let mut host = ManualHost::new();

            let report = ctx.start_modal(&mut scene, &mut host, !no_reset);
            println!("{report}");
            if !report.is_finished() {
                bail!("modal run did not start: {}", report.message);
            }

            let mut stepped = 0;
            for _ in 0..ticks {
                match ctx.on_timer(&mut scene, &mut host) {
                    TickOutcome::Stepped { ticks } => stepped = ticks,
                    TickOutcome::Finished(transition) => {
                        println!("{}", transition.message);
                        break;
                    }
                    TickOutcome::Idle => break,
                }
            }

            tracing::info!(ticks = stepped, redraws = host.redraws(), "modal run stepped");
            println!("{}", ctx.stop_modal(scene.id()));
            if let TickOutcome::Finished(transition) = ctx.on_timer(&mut scene, &mut host) {
                println!("{}", transition.message);
            }

            if let Some(mesh) = scene.target_object().and_then(|o| o.mesh()) {
                let (min, max) = mesh.bounds();
                println!(
                    "ticks={stepped} redraws={} bounds=({:.3}, {:.3}, {:.3})..({:.3}, {:.3}, {:.3})",
                    host.redraws(),
                    min.x,
                    min.y,
                    min.z,
                    max.x,
                    max.y,
                    max.z
                );
            }
            println!("{}", ContextInspector::scene_status(&ctx, &scene));
            ctx.shutdown(&mut host);
        }
    }

    Ok(())
}
