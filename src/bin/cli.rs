//! CLI application replaying recorded landmark frames through the overlay
//! pipeline.
//!
//! Usage:
//!   face-tryon frames.jsonl --product glasses1             # Human-readable summary
//!   face-tryon frames.jsonl --product hat1 --json          # JSON summary
//!   face-tryon frames.jsonl --product hat1 -o overlay.png  # Save last rendered frame

use anyhow::{Context, Result};
use clap::Parser;
use face_tryon::{
    AdjustmentKind, AppConfig, AssetCache, Canvas, FrameEvent, FsAssetSource, Placement,
    SessionCommand, Surface, TryOnSession,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "face-tryon")]
#[command(author, version, about = "Overlay products on recorded facial landmarks", long_about = None)]
struct Args {
    /// Landmark recording, one JSON frame event per line
    #[arg(required = true)]
    frames: PathBuf,

    /// Product id to overlay
    #[arg(short, long)]
    product: Option<String>,

    /// Overlay scale multiplier
    #[arg(long)]
    scale: Option<f32>,

    /// Vertical offset in percent of the surface height
    #[arg(long, allow_hyphen_values = true)]
    y_offset: Option<f32>,

    /// Extra rotation in degrees
    #[arg(long, allow_hyphen_values = true)]
    rotation: Option<f32>,

    /// Configuration file
    #[arg(short, long, default_value = AppConfig::DEFAULT_PATH)]
    config: PathBuf,

    /// Product image directory (overrides the configuration)
    #[arg(long)]
    assets: Option<PathBuf>,

    /// Write the last rendered frame to this PNG file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Surface width in pixels (overrides the configuration)
    #[arg(long)]
    width: Option<u32>,

    /// Surface height in pixels (overrides the configuration)
    #[arg(long)]
    height: Option<u32>,

    /// Output as JSON
    #[arg(short, long)]
    json: bool,

    /// Show debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Output structure for JSON serialization
#[derive(Serialize)]
struct Output {
    frames_file: String,
    product: Option<String>,
    width: u32,
    height: u32,
    frames: usize,
    outcomes: BTreeMap<&'static str, usize>,
    last_placement: Option<Placement>,
    image_written: Option<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = run(&args).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(args: &Args, config: &AppConfig) {
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.filter))
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run(args: &Args) -> Result<()> {
    let mut config = AppConfig::load(&args.config)
        .with_context(|| format!("Failed to read configuration {:?}", args.config))?;
    init_logging(args, &config);

    if let Some(root) = &args.assets {
        config.assets.root = root.clone();
    }
    if let Some(width) = args.width {
        config.surface.width = width;
    }
    if let Some(height) = args.height {
        config.surface.height = height;
    }
    config.validate().context("Invalid configuration")?;

    let cache = AssetCache::new(Arc::new(FsAssetSource::new(&config.assets.root)));
    let report = cache.preload(&config.assets.preload).await;
    if !report.is_complete() {
        for failure in &report.failed {
            warn!(error = %failure, "preload failed");
        }
    }

    let mut session = TryOnSession::new(config.catalog.clone(), cache)
        .with_default_adjustments(config.defaults);

    let (command_tx, command_rx) = mpsc::channel(8);
    for command in initial_commands(args) {
        command_tx.send(command).await.context("Session stopped early")?;
    }
    drop(command_tx);

    let (frame_tx, frame_rx) = mpsc::channel(32);
    let reader = tokio::spawn(read_frames(args.frames.clone(), frame_tx));

    let mut canvas = Canvas::new(config.surface.width, config.surface.height);
    let mut last_frame: Option<Canvas> = None;
    let summary = session
        .run_with(frame_rx, command_rx, &mut canvas, |outcome, surface| {
            if outcome.is_rendered() {
                last_frame = Some(surface.clone());
            }
        })
        .await;
    reader.await.context("Frame reader panicked")??;

    let image_written = match (&args.output, &last_frame) {
        (Some(path), Some(frame)) => {
            frame
                .save_png(path)
                .with_context(|| format!("Failed to write {:?}", path))?;
            info!(path = %path.display(), "wrote last rendered frame");
            Some(path.display().to_string())
        }
        (Some(path), None) => {
            warn!(path = %path.display(), "no frame was rendered, nothing written");
            None
        }
        _ => None,
    };

    let output = Output {
        frames_file: args.frames.display().to_string(),
        product: args.product.clone(),
        width: canvas.width(),
        height: canvas.height(),
        frames: summary.frames,
        outcomes: summary.outcomes,
        last_placement: summary.last_placement,
        image_written,
    };

    let output_str = if args.json {
        serde_json::to_string_pretty(&output)?
    } else {
        format_human_readable(&output)
    };
    println!("{}", output_str);

    Ok(())
}

fn initial_commands(args: &Args) -> Vec<SessionCommand> {
    let mut commands = Vec::new();
    // Selecting a product resets adjustments, so it goes first.
    if let Some(id) = &args.product {
        commands.push(SessionCommand::SetProduct(id.clone()));
    }
    let adjustments = [
        (AdjustmentKind::Scale, args.scale),
        (AdjustmentKind::YOffset, args.y_offset),
        (AdjustmentKind::Rotation, args.rotation),
    ];
    for (kind, value) in adjustments {
        if let Some(value) = value {
            commands.push(SessionCommand::SetAdjustment(kind, value));
        }
    }
    commands
}

/// Parse a JSON Lines recording and feed it to the session. Malformed lines
/// are skipped.
async fn read_frames(path: PathBuf, tx: mpsc::Sender<FrameEvent>) -> Result<()> {
    let content = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read frames from {:?}", path))?;

    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event = match serde_json::from_str::<FrameEvent>(line) {
            Ok(event) => event,
            Err(e) => {
                warn!(file = %display_name(&path), line = line_no + 1, error = %e, "skipping malformed frame");
                continue;
            }
        };
        if tx.send(event).await.is_err() {
            debug!("session stopped, no longer reading frames");
            break;
        }
    }
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn format_human_readable(output: &Output) -> String {
    let mut s = String::new();

    s.push_str(&format!("Frames: {} ({} events)\n", output.frames_file, output.frames));
    s.push_str(&format!("Surface: {}x{}\n", output.width, output.height));
    s.push_str(&format!(
        "Product: {}\n",
        output.product.as_deref().unwrap_or("(none)")
    ));

    if output.frames == 0 {
        s.push_str("\nNo frames found.\n");
        return s;
    }

    s.push_str("\nOutcomes:\n");
    for (label, count) in &output.outcomes {
        s.push_str(&format!("  {:<22} {}\n", label, count));
    }

    if let Some(p) = &output.last_placement {
        s.push_str("\nLast placement:\n");
        s.push_str(&format!("  Center:   ({:.3}, {:.3})\n", p.center_x, p.center_y));
        s.push_str(&format!("  Angle:    {:.1} deg\n", p.angle.to_degrees()));
        s.push_str(&format!("  Size:     {:.3} x {:.3}\n", p.width, p.height));
        s.push_str(&format!("  Y offset: {:.1}%\n", p.y_offset_percent));
    }

    if let Some(path) = &output.image_written {
        s.push_str(&format!("\nWrote {}\n", path));
    }

    s
}
