//! Headless tallcrop: slice local images into a directory

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tallcrop_config::SliceConfig;
use tallcrop_slicer::{Delivery, Slicer, SourceImage, deliver};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod output;

use output::{OutputDir, Summary};

#[derive(Parser)]
#[command(name = "tallcrop")]
#[command(about = "Rescale tall images to 800px wide and cut them into upload-sized PNG slices")]
struct Cli {
    /// Images to slice, in output order
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Directory the slices are written to
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// Print a JSON summary to stdout
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tallcrop=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let cli = Cli::parse();

    let mut slicer = Slicer::new(SliceConfig::default());
    for path in &cli.images {
        let bytes =
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        slicer
            .add_source(&SourceImage::new(name, bytes))
            .with_context(|| format!("Failed to slice {}", path.display()))?;
    }
    let batch = slicer.finish();

    let target = OutputDir::new(cli.out_dir);
    let delivery = deliver(&target, &batch)?;

    if cli.json {
        let summary = Summary::new(&target, &batch, delivery);
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else if delivery == Delivery::Nothing {
        eprintln!("No slices written");
    }

    Ok(())
}
