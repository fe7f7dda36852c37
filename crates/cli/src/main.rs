//! MineWatch CLI - mining footprint detection and lease legality checks

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use minewatch_algorithms::detection::DetectedPolygonSet;
use minewatch_algorithms::imagery::ReflectanceRaster;
use minewatch_algorithms::legality::{
    ClassificationRecordSet, LeaseBoundarySet, SummaryStatistics,
};
use minewatch_algorithms::pipeline::{MiningAnalysis, PipelineConfig};
use minewatch_core::io::{read_geotiff, read_geotiff_bands, write_geotiff};
use minewatch_core::{Raster, CRS};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "minewatch")]
#[command(author, version, about = "Mining footprint detection and lease legality analysis", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON pipeline configuration (missing fields take defaults)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Six-band input shared by `detect` and `analyze`
#[derive(clap::Args)]
struct BandArgs {
    /// One 6-sample GeoTIFF, or six single-band GeoTIFFs, in the order
    /// B2 B3 B4 B8 B11 B12 (blue, green, red, NIR, SWIR1, SWIR2)
    #[arg(required = true, num_args = 1..=6)]
    bands: Vec<PathBuf>,
    /// CRS of the bands when the files carry none (e.g. EPSG:32644)
    #[arg(long)]
    crs: Option<String>,
    /// Minimum polygon area in hectares
    #[arg(long)]
    min_area_ha: Option<f64>,
    /// Also write the cleaned mining mask as a GeoTIFF
    #[arg(long)]
    mask: Option<PathBuf>,
}

/// Lease input shared by `classify` and `analyze`
#[derive(clap::Args)]
struct LeaseArgs {
    /// Lease boundaries JSON (`{"crs": ..., "leases": [...]}`)
    #[arg(short, long)]
    leases: PathBuf,
    /// Lease buffer in metres
    #[arg(long)]
    buffer_meters: Option<f64>,
    /// Keep only leases in this state
    #[arg(long)]
    state: Option<String>,
    /// Keep only leases for this mineral
    #[arg(long)]
    mineral: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect mining footprints and write them as polygon JSON
    Detect {
        #[command(flatten)]
        input: BandArgs,
        /// Output polygons JSON
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Classify detected polygons against lease boundaries
    Classify {
        /// Polygons JSON written by `detect`
        polygons: PathBuf,
        #[command(flatten)]
        leases: LeaseArgs,
        /// Output records and summary JSON
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Run detection and classification in one go
    Analyze {
        #[command(flatten)]
        input: BandArgs,
        #[command(flatten)]
        leases: LeaseArgs,
        /// Output report JSON
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Serialize)]
struct ClassifyOutput<'a> {
    records: &'a ClassificationRecordSet,
    summary: &'a SummaryStatistics,
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to install logger")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let file =
        File::open(path).with_context(|| format!("Failed to open {what} {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {what} {}", path.display()))
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let pb = spinner("Writing output...");
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value).context("Failed to write output")?;
    pb.finish_and_clear();
    Ok(())
}

/// Load the config file (or defaults) and apply flag overrides
fn load_config(
    path: Option<&Path>,
    min_area_ha: Option<f64>,
    buffer_meters: Option<f64>,
) -> Result<PipelineConfig> {
    let mut config: PipelineConfig = match path {
        Some(path) => read_json(path, "config")?,
        None => PipelineConfig::default(),
    };
    if let Some(v) = min_area_ha {
        config.polygonize.min_area_ha = v;
    }
    if let Some(v) = buffer_meters {
        config.classifier.buffer_meters = v;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn read_bands(args: &BandArgs) -> Result<ReflectanceRaster> {
    let crs = args
        .crs
        .as_deref()
        .map(CRS::parse)
        .transpose()
        .context("Invalid --crs")?;

    let pb = spinner("Reading bands...");
    let rasters: Vec<Raster<f32>> = match args.bands.as_slice() {
        [single] => read_geotiff_bands(single)
            .with_context(|| format!("Failed to read {}", single.display()))?,
        paths if paths.len() == 6 => paths
            .iter()
            .map(|p| {
                read_geotiff::<f32, _>(p, None)
                    .with_context(|| format!("Failed to read {}", p.display()))
            })
            .collect::<Result<_>>()?,
        paths => bail!("expected 1 or 6 band files, got {}", paths.len()),
    };
    let raster = ReflectanceRaster::from_rasters(rasters, crs).context("Invalid band stack")?;
    pb.finish_and_clear();

    let (rows, cols) = raster.shape();
    info!("Input: {} x {} ({})", cols, rows, raster.crs());
    Ok(raster)
}

fn read_leases(args: &LeaseArgs, config: &PipelineConfig) -> Result<LeaseBoundarySet> {
    let mut leases: LeaseBoundarySet = read_json(&args.leases, "leases")?;
    leases.drop_invalid();
    let mut leases = leases
        .standardize(&config.classifier.area_crs)
        .context("Failed to standardize leases")?;
    if let Some(state) = &args.state {
        leases = leases.filter_by_state(state);
    }
    if let Some(mineral) = &args.mineral {
        leases = leases.filter_by_mineral(mineral);
    }

    let summary = leases.summary();
    info!(
        "Leases: {} ({:.1} ha, {} states)",
        summary.total_leases,
        summary.total_area_hectares,
        summary.states.len()
    );
    Ok(leases)
}

fn write_mask(mask: &Raster<u8>, path: &Path) -> Result<()> {
    write_geotiff(mask, path).with_context(|| format!("Failed to write mask {}", path.display()))
}

fn print_summary(summary: &SummaryStatistics) {
    println!("Polygons: {}", summary.total_polygons);
    println!(
        "  legal {} / mixed {} / illegal {} / error {}",
        summary.legal_count, summary.mixed_count, summary.illegal_count, summary.error_count
    );
    println!("  Total area: {:.2} ha", summary.total_area_ha);
    println!("  Illegal area: {:.2} ha", summary.illegal_area_ha);
    println!("  Compliance: {:.1}%", summary.compliance_rate_percent);
    println!("  Average confidence: {:.3}", summary.average_confidence);
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Detect { input, output } => {
            let config = load_config(config_path, input.min_area_ha, None)?;
            let analysis = MiningAnalysis::new(config)?;
            let raster = read_bands(&input)?;

            let start = Instant::now();
            let pb = spinner("Detecting mining areas...");
            let report = analysis.detect(&raster).context("Detection failed")?;
            pb.finish_and_clear();
            let elapsed = start.elapsed();

            let stats = &report.mask_statistics;
            println!(
                "Mining pixels: {} ({:.2} ha, {:.2}% of scene)",
                stats.mining_pixels, stats.area_ha, stats.percentage
            );
            println!(
                "Polygons: {} ({:.2} ha)",
                report.summary.total_polygons, report.summary.total_area_ha
            );
            if let Some(mask_path) = &input.mask {
                write_mask(report.mask.raster(), mask_path)?;
            }
            write_json(&report.polygons, &output)?;
            done("Polygons", &output, elapsed);
        }

        Commands::Classify {
            polygons,
            leases,
            output,
        } => {
            let config = load_config(config_path, None, leases.buffer_meters)?;
            let analysis = MiningAnalysis::new(config)?;
            let polygon_set: DetectedPolygonSet = read_json(&polygons, "polygons")?;
            let lease_set = read_leases(&leases, analysis.config())?;

            let start = Instant::now();
            let pb = spinner("Classifying polygons...");
            let (records, summary) = analysis
                .classify(&polygon_set, &lease_set)
                .context("Classification failed")?;
            pb.finish_and_clear();
            let elapsed = start.elapsed();

            print_summary(&summary);
            write_json(
                &ClassifyOutput {
                    records: &records,
                    summary: &summary,
                },
                &output,
            )?;
            done("Records", &output, elapsed);
        }

        Commands::Analyze {
            input,
            leases,
            output,
        } => {
            let config = load_config(config_path, input.min_area_ha, leases.buffer_meters)?;
            let analysis = MiningAnalysis::new(config)?;
            let raster = read_bands(&input)?;
            let lease_set = read_leases(&leases, analysis.config())?;

            let start = Instant::now();
            let pb = spinner("Running analysis...");
            let report = analysis.run(&raster, &lease_set).context("Analysis failed")?;
            pb.finish_and_clear();
            let elapsed = start.elapsed();

            print_summary(&report.summary);
            if let Some(mask_path) = &input.mask {
                write_mask(report.detection.mask.raster(), mask_path)?;
            }
            write_json(&report, &output)?;
            done("Report", &output, elapsed);
        }
    }

    Ok(())
}
