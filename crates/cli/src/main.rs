//! SarFlood CLI - flood mapping from radar time series

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use sarflood_algorithms::flood::{DirectoryExporter, FloodConfig, FloodPipeline, RunReport};
use sarflood_algorithms::imagery::binarize;
use sarflood_algorithms::statistics::{otsu_threshold, BatchPlan, OtsuParams};
use sarflood_core::io::{read_geotiff, write_geotiff, Catalog, CsvPointSource};
use sarflood_core::raster::{Image, Raster};
use sarflood_core::store::PointSource;
use sarflood_core::vector::Region;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "sarflood")]
#[command(author, version, about = "Flood mapping from SAR backscatter time series", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full flood mapping pipeline from a TOML config
    Run {
        /// Run configuration (TOML)
        config: PathBuf,
        /// Date stamped on sampled records (YYYY-MM-DD, default: today)
        #[arg(long)]
        analysis_date: Option<NaiveDate>,
        /// Map floods without sampling points or writing exports
        #[arg(long)]
        no_export: bool,
    },
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Otsu threshold of a single-band raster over its full extent
    Threshold {
        /// Input raster file
        input: PathBuf,
        /// Histogram buckets
        #[arg(short, long, default_value = "255")]
        buckets: usize,
        /// Write the binary mask (value > threshold) to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show how a point set is split into export batches
    Plan {
        /// Points CSV (id,x,y)
        #[arg(long, conflicts_with = "count", required_unless_present = "count")]
        points: Option<PathBuf>,
        /// Number of points
        #[arg(long)]
        count: Option<usize>,
        /// Points per batch
        #[arg(short, long, default_value = "1000")]
        batch_size: usize,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set default subscriber")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_raster(path: &Path) -> Result<Raster<f64>> {
    let pb = spinner("Reading raster...");
    let raster = read_geotiff(path).with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    info!("Input: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn print_report(report: &RunReport) {
    println!("\nBaselines:");
    for (direction, summary) in &report.baselines {
        println!("  {:<10} {} tiles {}", direction, summary.count, summary.span());
    }

    println!("\nFlood results:");
    for result in &report.results {
        println!(
            "  {} {:<10} tiles {:>2}  threshold {:.4}  flooded {:>9} px  polygons {}{}",
            result.date,
            result.direction,
            result.tiles.count,
            result.threshold,
            result.flooded_pixels(),
            result.polygons.features.len(),
            if result.polygons.degraded { " (coarsened)" } else { "" }
        );
    }

    if !report.exports.is_empty() {
        println!("\nExports:");
        for export in &report.exports {
            println!(
                "  {}: {} features, {} batches, {} records",
                export.name, export.features, export.batches, export.records
            );
        }
    }

    if !report.failures.is_empty() {
        println!("\nNot processed:");
        for failure in &report.failures {
            let kind = if failure.is_skip() { "skipped" } else { "failed" };
            println!("  {} {:<10} {}: {}", failure.unit(), failure.direction, kind, failure.error);
        }
    }
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        // ── Run ──────────────────────────────────────────────────────
        Commands::Run {
            config,
            analysis_date,
            no_export,
        } => {
            let config = FloodConfig::load(&config)
                .with_context(|| format!("Invalid flood config {}", config.display()))?;
            let catalog = Catalog::open(&config.io.catalog)
                .with_context(|| format!("Failed to open catalog {}", config.io.catalog.display()))?;
            info!(scenes = catalog.entries().len(), "catalog loaded");

            let pipeline = FloodPipeline::new(&config, &catalog)?;
            let start = Instant::now();
            let pb = spinner("Mapping floods...");
            let mut report = pipeline.run();
            pb.finish_and_clear();

            if !no_export {
                let points = CsvPointSource::new(&config.io.points)
                    .with_crs(config.points_crs())
                    .load_points()
                    .with_context(|| format!("Failed to load points {}", config.io.points.display()))?;
                info!(points = points.len(), "ground-truth points loaded");

                let analysis_date = analysis_date
                    .or(config.sampling.analysis_date)
                    .unwrap_or_else(|| Local::now().date_naive());
                let sink = DirectoryExporter::new(&config.io.output_dir);
                let pb = spinner("Exporting...");
                pipeline.export(&mut report, &points, &sink, analysis_date);
                pb.finish_and_clear();
            }
            let elapsed = start.elapsed();

            print_report(&report);
            if !no_export {
                done("Flood products", &config.io.output_dir, elapsed);
            }

            let failed = report.errors().count();
            if failed > 0 {
                anyhow::bail!("{} unit(s) failed", failed);
            }
        }

        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let raster = read_raster(&input)?;
            let (rows, cols) = raster.shape();
            let bounds = raster.bounds();
            let stats = raster.statistics();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            println!("Cell size: {}", raster.cell_size());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            if let Some(crs) = raster.crs() {
                println!("CRS: {}", crs);
            }
            if let Some(nodata) = raster.nodata() {
                println!("NoData: {}", nodata);
            }
            println!("\nStatistics:");
            if let Some(min) = stats.min {
                println!("  Min: {:.4}", min);
            }
            if let Some(max) = stats.max {
                println!("  Max: {:.4}", max);
            }
            if let Some(mean) = stats.mean {
                println!("  Mean: {:.4}", mean);
            }
            println!(
                "  Valid cells: {} ({:.1}%)",
                stats.valid_count,
                100.0 * stats.valid_count as f64 / raster.len() as f64
            );
        }

        // ── Threshold ────────────────────────────────────────────────
        Commands::Threshold {
            input,
            buckets,
            output,
        } => {
            let raster = read_raster(&input)?;
            let region = Region::from_bounds("extent", raster.bounds());
            let start = Instant::now();
            let image = Image::single("band", raster);
            let threshold = otsu_threshold(&image, &region, &OtsuParams { max_buckets: buckets })
                .context("Failed to compute threshold")?;
            println!("Otsu threshold: {}", threshold);

            if let Some(output) = output {
                let band = image.single_band()?;
                let mask = binarize(&band.raster, threshold);
                let elapsed = start.elapsed();
                let pb = spinner("Writing output...");
                write_geotiff(&mask, &output).context("Failed to write output")?;
                pb.finish_and_clear();
                done("Mask", &output, elapsed);
            }
        }

        // ── Plan ─────────────────────────────────────────────────────
        Commands::Plan {
            points,
            count,
            batch_size,
        } => {
            let total = match (points, count) {
                (Some(path), _) => CsvPointSource::new(&path)
                    .load_points()
                    .with_context(|| format!("Failed to load points {}", path.display()))?
                    .len(),
                (None, Some(n)) => n,
                (None, None) => anyhow::bail!("Give either --points or --count"),
            };
            let plan = BatchPlan::new(total, batch_size)?;
            println!("Total points: {}", total);
            println!("Number of batches needed: {}", plan.batch_count());
            for batch in plan.batches() {
                println!(
                    "  Batch {}: points {} to {}",
                    batch.number,
                    batch.range.start,
                    batch.range.end.saturating_sub(1)
                );
            }
        }
    }

    Ok(())
}
