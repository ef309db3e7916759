//! Plotmap CLI

use clap::{Parser, Subcommand};
use plotmap_cli::{load_boundary, load_config, load_units, rectangle_boundary, LayoutOutput};
use plotmap_core::{LayoutConfig, LayoutResult, Polygon};
use plotmap_layout::{
    find_overlaps, subdivide, write_back, BoundaryTool, InMemorySource, LayoutSession,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Overlaps smaller than this (km²) are treated as shared edges.
const OVERLAP_TOLERANCE_KM2: f64 = 1e-9;

#[derive(Parser)]
#[command(name = "plotmap")]
#[command(about = "Lay out field trial plots as non-overlapping polygons")]
#[command(version)]
struct Cli {
    /// Log filter (e.g. "info", "plotmap_layout=debug"); overrides RUST_LOG
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lay out observation units from a JSON file
    Layout {
        /// JSON file with observation unit records
        #[arg(short, long)]
        units: PathBuf,

        /// JSON geo-shape of the area containing the plots
        #[arg(short, long, conflicts_with = "rect")]
        boundary: Option<PathBuf>,

        /// Rectangular boundary as lon1,lat1,lon2,lat2
        #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
        rect: Option<Vec<f64>>,

        /// TOML layout configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Plot size in km as width,length
        #[arg(long, value_delimiter = ',')]
        plot_size: Option<Vec<f64>>,

        /// Final scale applied to every plot about its center
        #[arg(long)]
        plot_scale: Option<f64>,

        /// Study identifier recorded in the output
        #[arg(long, default_value = "study")]
        study: String,

        /// Output file (JSON)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Split a drawn area into rows x columns of plots
    Subdivide {
        /// JSON geo-shape of the area
        #[arg(short, long, conflicts_with = "rect")]
        boundary: Option<PathBuf>,

        /// Rectangular area as lon1,lat1,lon2,lat2
        #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
        rect: Option<Vec<f64>>,

        #[arg(short, long)]
        rows: usize,

        #[arg(short = 'n', long)]
        cols: usize,

        /// Scale applied to every plot about its center
        #[arg(long, default_value = "0.85")]
        plot_scale: f64,

        /// Output file (JSON)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// List the boundary drawing tools
    Tools,
}

fn init_logging(filter: Option<&str>) {
    let filter = filter
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

fn resolve_boundary(file: Option<&Path>, rect: Option<&[f64]>) -> anyhow::Result<Option<Polygon>> {
    match (file, rect) {
        (Some(path), _) => Ok(Some(load_boundary(path)?)),
        (None, Some(corners)) => Ok(Some(rectangle_boundary(corners)?)),
        (None, None) => Ok(None),
    }
}

fn save(output: &LayoutOutput, path: &Path) -> anyhow::Result<()> {
    output.save_json(path)?;
    println!("Layout saved to: {}", path.display());
    Ok(())
}

fn summarize(result: &LayoutResult) {
    println!("Plots:    {}", result.len());
    println!("Skipped:  {}", result.warnings.len());
    println!("Shaped:   {}", result.shaped);
    if result.level_angle_deg != 0.0 {
        println!("Leveled:  {:.2}°", result.level_angle_deg);
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log.as_deref());

    match cli.command {
        Commands::Layout {
            units,
            boundary,
            rect,
            config,
            plot_size,
            plot_scale,
            study,
            output,
        } => {
            let mut layout_config = match &config {
                Some(path) => load_config(path)?,
                None => LayoutConfig::default(),
            };
            if let Some(size) = plot_size {
                let [width, length] = size.as_slice() else {
                    anyhow::bail!("--plot-size takes width,length, got {} values", size.len());
                };
                layout_config = layout_config.with_plot_size(*width, *length);
            }
            if let Some(scale) = plot_scale {
                layout_config = layout_config.with_plot_scale(scale);
            }
            layout_config.validate()?;

            let boundary = resolve_boundary(boundary.as_deref(), rect.as_deref())?;
            let mut source = InMemorySource::new(load_units(&units)?);

            let session = LayoutSession::new(layout_config);
            let result = session.load_and_layout(&study, &mut source, boundary.as_ref())?;
            summarize(&result);

            let overlaps = find_overlaps(&result, OVERLAP_TOLERANCE_KM2);
            for o in &overlaps {
                println!("Overlap:  {} / {} ({:.3e} km²)", o.first, o.second, o.area_km2);
            }

            let mut out = LayoutOutput::for_result(Some(study), &result).with_overlaps(&overlaps);
            let report = write_back(&result, &mut out);
            out.record_failures(&report);
            save(&out, &output)?;
        }

        Commands::Subdivide {
            boundary,
            rect,
            rows,
            cols,
            plot_scale,
            output,
        } => {
            let Some(area) = resolve_boundary(boundary.as_deref(), rect.as_deref())? else {
                anyhow::bail!("subdivide needs --boundary or --rect");
            };
            let plots = subdivide(&area, rows, cols, plot_scale)?;

            let mut result = LayoutResult::new(false);
            for (i, plot) in plots.into_iter().enumerate() {
                let id = format!("r{}c{}", i / cols + 1, i % cols + 1);
                match plot {
                    Some(polygon) => {
                        result.insert(id.into(), polygon);
                    }
                    None => result.warn(id.into(), "cell does not intersect the area"),
                }
            }
            summarize(&result);

            let mut out = LayoutOutput::for_result(None, &result);
            let report = write_back(&result, &mut out);
            out.record_failures(&report);
            save(&out, &output)?;
        }

        Commands::Tools => {
            println!("Boundary drawing tools:");
            for tool in BoundaryTool::ALL {
                println!("  {}  {}", tool.label(), tool.kind());
            }
        }
    }

    Ok(())
}
