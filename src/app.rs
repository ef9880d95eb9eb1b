//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - splits projection tokens out of argv and parses the rest with clap
//! - sets up logging
//! - runs the fit
//! - prints the result in the requested format
//! - writes optional exports

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, SplitArgs, split_args};
use crate::definition::{WktFlavor, to_wkt};
use crate::domain::{FitConfig, FitSolution, OutputFormat, Point, SolverOptions};
use crate::error::AppError;
use crate::fit::FitOutcome;
use crate::params::{parse_target, source_definition};

pub mod pipeline;

/// Entry point for the `projfit` binary.
pub fn run() -> Result<(), AppError> {
    let split = split_args(std::env::args().collect());
    let cli = Cli::parse_from(&split.clap_args);
    init_tracing(cli.verbose);

    let config = fit_config_from_args(&cli, &split)?;
    let run = pipeline::run_fit(&config)?;

    match &run.outcome {
        FitOutcome::Solved(solution) => {
            print_solution(solution, &run.points, &config)?;
            write_exports(solution, &run.points, &config)?;
            Ok(())
        }
        FitOutcome::NotConverged(report) => {
            if config.output == OutputFormat::Full {
                println!("{}", crate::report::format_no_solution(report));
            }
            Err(AppError::silent(1))
        }
    }
}

/// Log to stderr so stdout stays machine-readable.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn print_solution(solution: &FitSolution, points: &[Point], config: &FitConfig) -> Result<(), AppError> {
    match config.output {
        OutputFormat::Full => {
            let show_modifiers = !config.target.modifiers.is_empty();
            print!("{}", crate::report::format_fit_output(solution, points, show_modifiers));
        }
        OutputFormat::Proj => println!("{}", solution.projstring),
        OutputFormat::Wkt => println!("{}", to_wkt(&solution.projstring, WktFlavor::Ogc, config.pretty)?),
        OutputFormat::Esri => println!("{}", to_wkt(&solution.projstring, WktFlavor::Esri, config.pretty)?),
    }
    Ok(())
}

fn write_exports(solution: &FitSolution, points: &[Point], config: &FitConfig) -> Result<(), AppError> {
    if let Some(path) = &config.export_csv {
        crate::io::export_residuals_csv(path, points, &solution.residuals)?;
    }
    if let Some(path) = &config.export_json {
        crate::io::export_fit_json(path, solution, points)?;
    }
    Ok(())
}

pub fn fit_config_from_args(cli: &Cli, split: &SplitArgs) -> Result<FitConfig, AppError> {
    let target = parse_target(&split.target, &split.modifiers)?;
    if target.is_empty() {
        return Err(AppError::new(
            2,
            "No target parameters given; list them after `+to` (e.g. +to +proj=tmerc +x_0~0).",
        ));
    }

    for (name, value) in [("--ftol", cli.ftol), ("--xtol", cli.xtol)] {
        if !(value.is_finite() && value >= 0.0) {
            return Err(AppError::new(2, format!("{name} must be a non-negative number, got {value}")));
        }
    }

    let output = if cli.proj {
        OutputFormat::Proj
    } else if cli.wkt {
        OutputFormat::Wkt
    } else if cli.esri {
        OutputFormat::Esri
    } else {
        OutputFormat::Full
    };

    Ok(FitConfig {
        source: source_definition(&split.source),
        target,
        points_path: cli.points.clone(),
        encoding: cli.encoding.clone(),
        output,
        pretty: cli.pretty,
        solver: SolverOptions {
            ftol: cli.ftol,
            xtol: cli.xtol,
            max_evaluations: cli.max_evals,
            ..SolverOptions::default()
        },
        export_csv: cli.export_csv.clone(),
        export_json: cli.export_json.clone(),
    })
}
