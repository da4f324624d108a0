use anyhow::{Context, Result};
use clap::Parser;
use pixel_blueprint_wasm::{render_image, BlueprintOptions};
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Turn images into numbered pixel-art blueprints (native wrapper).
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// One or more input image paths
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Grid cells per side (20-200)
    #[arg(short, long, default_value_t = 48)]
    resolution: u32,

    /// Maximum palette size (2-256)
    #[arg(short = 'k', long, default_value_t = 16)]
    colors: usize,

    /// Stop merging colors after this many merges
    #[arg(long)]
    merge_limit: Option<usize>,

    /// Output directory
    #[arg(short = 'd', long)]
    out_dir: Option<PathBuf>,

    /// Output filename prefix (ignored when --out-dir supplied)
    #[arg(short = 'p', long, default_value = "blueprint_")]
    prefix: String,

    /// Also write `<name>.palette.json` next to each PNG
    #[arg(long)]
    palette_json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let options = BlueprintOptions::new(args.resolution, args.colors)
        .with_merge_limit(args.merge_limit)
        .clamped();

    for input in &args.inputs {
        let bytes = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
        let img = image::load_from_memory(&bytes)
            .with_context(|| format!("decoding {}", input.display()))?;
        let blueprint = render_image(&img, &options).context("blueprint rendering failed")?;
        let png = blueprint.encode_png()?;

        let stem = input
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned();
        let out_path = if let Some(dir) = &args.out_dir {
            dir.join(format!("{stem}.png"))
        } else {
            PathBuf::from(format!("{}{stem}.png", args.prefix))
        };

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&out_path, png)?;
        info!(
            colors = blueprint.palette.len(),
            resolution = blueprint.resolution,
            "wrote {}",
            out_path.display()
        );

        if args.palette_json {
            let json_path = out_path.with_extension("palette.json");
            let json = serde_json::to_string_pretty(&blueprint.palette)?;
            fs::write(&json_path, json)?;
            info!("wrote {}", json_path.display());
        }

        println!("Saved → {}", out_path.display());
    }

    Ok(())
}
