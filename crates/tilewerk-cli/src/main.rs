// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tilewerk command line.
//
// Entry point. Initialises logging, loads the configuration snapshot and
// dispatches to the calibration, layout, export and print commands.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tilewerk_core::config::TilerConfig;
use tilewerk_core::error::{Result, TilewerkError};
use tilewerk_core::human_errors::humanize_error;
use tilewerk_core::types::{OrientationPolicy, PaperSize, PointPx, Units};
use tilewerk_export::{
    DirectPrinter, DocumentContext, ExportJob, ExportOutcome, ExportSlot, ExportTarget, ExportTask,
    RasterSpoolDevice,
};
use tilewerk_layout::{ScaleCalibration, ScaleFactor, ScaleResolver};

#[derive(Debug, Parser)]
#[command(name = "tilewerk", version, about = "Print large drawings at true scale across tiled sheets")]
struct Cli {
    /// JSON configuration snapshot; defaults are used when absent.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve a scale factor from two points and a known distance.
    Scale {
        #[arg(long, value_parser = parse_point)]
        p1: PointPx,
        #[arg(long, value_parser = parse_point)]
        p2: PointPx,
        #[arg(long)]
        distance: f64,
        #[arg(long, value_parser = parse_units)]
        units: Option<Units>,
    },
    /// Lay out pages over a drawing and list them.
    Grid {
        #[command(flatten)]
        doc: DocumentArgs,
        /// Print the grid as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Export tiles to PDF or image files.
    Export {
        #[command(flatten)]
        doc: DocumentArgs,
        /// pdf, composite-pdf, png, jpeg, tiff or bmp.
        #[arg(long, default_value = "pdf")]
        format: String,
        /// Assemble every tile into one sheet or image.
        #[arg(long)]
        composite: bool,
        #[arg(long, short)]
        output: PathBuf,
        #[arg(long)]
        dpi: Option<u32>,
        /// Leave out the summary page.
        #[arg(long)]
        no_metadata: bool,
    },
    /// Print through the raster spool device, one PNG per sheet.
    Print {
        #[command(flatten)]
        doc: DocumentArgs,
        #[arg(long, value_name = "DIR")]
        spool: PathBuf,
        #[arg(long)]
        dpi: Option<u32>,
        /// Unprintable border of the simulated printer.
        #[arg(long, default_value_t = 0.0)]
        margin_mm: f64,
    },
}

/// Drawing input plus either a known scale or a calibration line.
#[derive(Debug, Args)]
struct DocumentArgs {
    #[arg(long, short)]
    input: PathBuf,
    /// Millimetres per pixel.
    #[arg(long, conflicts_with_all = ["p1", "p2", "distance"])]
    scale: Option<f64>,
    #[arg(long, value_parser = parse_point, requires_all = ["p2", "distance"])]
    p1: Option<PointPx>,
    #[arg(long, value_parser = parse_point)]
    p2: Option<PointPx>,
    #[arg(long)]
    distance: Option<f64>,
    #[arg(long, value_parser = parse_units)]
    units: Option<Units>,
    /// Paper name, e.g. A4, A3, Letter.
    #[arg(long, value_parser = parse_paper)]
    paper: Option<PaperSize>,
    #[arg(long, value_parser = parse_orientation)]
    orientation: Option<OrientationPolicy>,
    #[arg(long)]
    gutter_mm: Option<f64>,
    /// Project name shown on the summary page.
    #[arg(long)]
    project: Option<String>,
}

impl DocumentArgs {
    /// Layout overrides on top of the loaded configuration.
    fn apply(&self, config: &mut TilerConfig) {
        if let Some(units) = self.units {
            config.default_units = units;
        }
        if let Some(paper) = self.paper {
            config.default_page_size = paper;
        }
        if let Some(orientation) = self.orientation {
            config.page_orientation = orientation;
        }
        if let Some(gutter) = self.gutter_mm {
            config.gutter_size_mm = gutter;
        }
    }

    fn open(&self, config: &TilerConfig) -> Result<DocumentContext> {
        let mut ctx = DocumentContext::open(&self.input)?;
        if let Some(project) = &self.project {
            ctx = ctx.with_project_name(project.clone());
        }
        match (self.scale, self.p1, self.p2, self.distance) {
            (Some(mm_per_px), ..) => ctx.set_scale(ScaleFactor::new(mm_per_px)?, config),
            (None, Some(p1), Some(p2), Some(distance)) => {
                let calibration = ScaleCalibration::new(p1, p2, distance, config.default_units);
                ctx.apply_calibration(calibration, config)?;
            }
            _ => {
                return Err(TilewerkError::InvalidCalibration(
                    "pass --scale or --p1, --p2 and --distance".into(),
                ));
            }
        }
        Ok(ctx)
    }
}

fn parse_point(s: &str) -> std::result::Result<PointPx, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y but got `{s}`"))?;
    let x: f64 = x.trim().parse().map_err(|e| format!("bad x in `{s}`: {e}"))?;
    let y: f64 = y.trim().parse().map_err(|e| format!("bad y in `{s}`: {e}"))?;
    Ok(PointPx::new(x, y))
}

fn parse_units(s: &str) -> std::result::Result<Units, String> {
    Units::from_name(s).ok_or_else(|| format!("unknown units `{s}` (mm or inches)"))
}

fn parse_paper(s: &str) -> std::result::Result<PaperSize, String> {
    PaperSize::from_name(s).ok_or_else(|| format!("unknown paper size `{s}`"))
}

fn parse_orientation(s: &str) -> std::result::Result<OrientationPolicy, String> {
    OrientationPolicy::from_name(s).ok_or_else(|| format!("unknown orientation `{s}` (auto, landscape, portrait)"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Tilewerk starting");

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            let human = humanize_error(&e);
            tracing::error!(error = %e, "command failed");
            eprintln!("{}\n{}", human.message, human.suggestion);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Scale {
            p1,
            p2,
            distance,
            units,
        } => {
            let units = units.unwrap_or(config.default_units);
            let calibration = ScaleCalibration::new(p1, p2, distance, units);
            let scale = ScaleResolver::resolve(&calibration)?;
            println!("{:.6} mm/px", scale.mm_per_px());
            println!("{}", scale.describe(units));
            Ok(ExitCode::SUCCESS)
        }
        Command::Grid { doc, json } => {
            doc.apply(&mut config);
            let ctx = doc.open(&config)?;
            print_grid(&ctx, json)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Export {
            doc,
            format,
            composite,
            output,
            dpi,
            no_metadata,
        } => {
            doc.apply(&mut config);
            let ctx = doc.open(&config)?;
            let target = ExportTarget::from_format_name(&format, composite)?;
            let mut job = ExportJob::new(target, output, &config);
            if let Some(dpi) = dpi {
                job = job.with_dpi(dpi);
            }
            if no_metadata {
                job = job.with_metadata(false);
            }
            export(config, job, ctx)
        }
        Command::Print {
            doc,
            spool,
            dpi,
            margin_mm,
        } => {
            doc.apply(&mut config);
            let ctx = doc.open(&config)?;
            let dpi = dpi.unwrap_or(config.default_dpi);
            let mut device = RasterSpoolDevice::new(&spool, dpi).with_margin_mm(margin_mm);
            let pages = DirectPrinter::new(config).print(&ctx, &mut device)?;
            println!("printed {pages} page(s) to {}", spool.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<TilerConfig> {
    match path {
        Some(path) => TilerConfig::load(path),
        None => Ok(TilerConfig::default()),
    }
}

fn print_grid(ctx: &DocumentContext, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&ctx.grid)?);
        return Ok(());
    }
    if let Some(notice) = &ctx.grid.notice {
        println!("{}", notice.message());
        return Ok(());
    }
    let summary = ctx.grid.summary();
    println!(
        "{} x {} = {} page(s), gutter {} px",
        summary.tiles_x, summary.tiles_y, summary.total, ctx.grid.gutter_px
    );
    for (index, page) in ctx.grid.pages.iter().enumerate() {
        println!(
            "P{:<4} row {:>3} col {:>3}  at ({}, {})  {}x{}",
            index + 1,
            page.row,
            page.col,
            page.x,
            page.y,
            page.width,
            page.height
        );
    }
    Ok(())
}

/// Run the export on the blocking pool; Ctrl-C cancels between pages.
fn export(config: TilerConfig, job: ExportJob, ctx: DocumentContext) -> Result<ExitCode> {
    let runtime = tokio::runtime::Runtime::new()?;
    let _entered = runtime.enter();
    let slot = ExportSlot::new();
    let task = ExportTask::spawn(&slot, config, job, ctx)?;
    let token = task.token().clone();
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling export");
            token.cancel();
        }
    });

    match runtime.block_on(task.wait()) {
        ExportOutcome::Completed(report) => {
            for file in &report.files {
                println!("{}", file.display());
            }
            println!("{} page(s), {}", report.pages, report.orientation.label());
            Ok(ExitCode::SUCCESS)
        }
        ExportOutcome::Cancelled => Err(TilewerkError::Cancelled),
        ExportOutcome::Failed(human) => {
            eprintln!("{}\n{}", human.message, human.suggestion);
            Ok(ExitCode::FAILURE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn points_parse_with_spaces() {
        let p = parse_point(" 100, 200.5").expect("point");
        assert_eq!((p.x, p.y), (100.0, 200.5));
        assert!(parse_point("100").is_err());
        assert!(parse_point("a,b").is_err());
    }

    #[test]
    fn export_arguments_parse() {
        let cli = Cli::try_parse_from([
            "tilewerk", "-v", "export", "--input", "plan.png", "--scale", "0.1", "--format", "png",
            "--composite", "--output", "out.png", "--paper", "A3",
        ])
        .expect("parse");
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Command::Export { doc, composite, .. } => {
                assert!(composite);
                assert_eq!(doc.scale, Some(0.1));
                assert_eq!(doc.paper, Some(PaperSize::A3));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn scale_and_calibration_conflict() {
        let parsed = Cli::try_parse_from([
            "tilewerk", "grid", "--input", "plan.png", "--scale", "0.1", "--p1", "0,0",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn overrides_replace_config_values() {
        let cli = Cli::try_parse_from([
            "tilewerk", "grid", "--input", "plan.png", "--scale", "1", "--gutter-mm", "5",
            "--orientation", "landscape", "--units", "inches",
        ])
        .expect("parse");
        let Command::Grid { doc, .. } = cli.command else {
            panic!("expected grid");
        };
        let mut config = TilerConfig::default();
        doc.apply(&mut config);
        assert_eq!(config.gutter_size_mm, 5.0);
        assert_eq!(config.page_orientation, OrientationPolicy::Landscape);
        assert_eq!(config.default_units, Units::Inches);
    }
}
