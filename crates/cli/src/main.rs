//! CLI for pyramid-tiles - Split a GeoJSON file into a vector tile pyramid
//!
//! This is a thin wrapper around the pyramid-tiles-core library.

use anyhow::{bail, Context, Result};
use clap::Parser;
use pyramid_tiles_core::{DirectoryTileStore, FeatureCollection, TileCoord, Tiler, TilerConfig};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "pyramid-tiles",
    about = "Split a GeoJSON file into a gzip-compressed vector tile pyramid",
    version
)]
struct Args {
    /// Input GeoJSON file (FeatureCollection, Feature, or bare Geometry)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output directory, written as <z>/<x>/<tms-row>.mvt.gz
    #[arg(value_name = "OUTPUT_DIR")]
    output_dir: PathBuf,

    /// Layer name for the MVT output
    #[arg(short, long, default_value = "features")]
    layer: String,

    /// Root tile zoom
    #[arg(short, long, default_value = "0")]
    zoom: u8,

    /// Root tile column
    #[arg(short, long, default_value = "0")]
    x: u32,

    /// Root tile row (XYZ, north at the top)
    #[arg(short, long, default_value = "0")]
    y: u32,

    /// Buffer around each tile, in pixels
    #[arg(long, default_value = "64")]
    buffer: u32,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .init();

    let root = TileCoord::new(args.x, args.y, args.zoom);
    if !root.is_valid() {
        bail!("Invalid root tile {}", root);
    }

    let text = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let features = FeatureCollection::from_geojson_str(&text)
        .with_context(|| format!("Failed to parse {}", args.input.display()))?;
    log::info!(
        "Loaded {} features ({} vertices) from {}",
        features.len(),
        features.vertex_count(),
        args.input.display()
    );

    let mut store = DirectoryTileStore::create(&args.output_dir).with_context(|| {
        format!(
            "Failed to create output directory {}",
            args.output_dir.display()
        )
    })?;

    let tiler = Tiler::new(TilerConfig::default().with_buffer(args.buffer));
    let report = tiler
        .run(&mut store, &features, &args.layer, root)
        .context("Failed to build tile pyramid")?;

    if report.store_conflicts > 0 || report.store_failures > 0 {
        log::warn!(
            "{} tiles already existed, {} could not be written",
            report.store_conflicts,
            report.store_failures
        );
    }

    println!(
        "✓ Wrote {} tiles (zoom {} to {}) to {}",
        report.tiles_written,
        root.z,
        report.max_zoom.max(root.z),
        args.output_dir.display()
    );

    Ok(())
}
