//! Command-line parsing for the projection parameter fitter.
//!
//! Projection parameters use `+key=value` syntax, which clap cannot express,
//! so argv is split first (see [`split_args`]) and only the remaining flags and
//! the point file reach clap.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::params::is_modifier_token;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "projfit",
    version,
    about = "Estimate unknown projection parameters from correspondence points",
    override_usage = "projfit [OPTIONS] +src_params... +to +tgt_params[=[~]v,...]... [--k_0~g ...] <POINTS_FILE>",
    after_help = "Target parameters: `+name=v` is known, `+name~g` is solved for starting at g.\n\
                  Comma separated sub-values may mix both: +towgs84=~25,-141,~-80.\n\
                  Modifiers --k_0, --x_0, --y_0, --z_0 take `=v` or `~g` and scale/offset the result."
)]
pub struct Cli {
    /// Print only the projection string.
    #[arg(long, visible_alias = "proj4", conflicts_with_all = ["wkt", "esri"])]
    pub proj: bool,

    /// Print the result as OGC well-known text.
    #[arg(long, conflicts_with = "esri")]
    pub wkt: bool,

    /// Print the result as ESRI well-known text.
    #[arg(long)]
    pub esri: bool,

    /// Pretty-print WKT output.
    #[arg(long)]
    pub pretty: bool,

    /// Relative reduction of the sum of squares considered converged.
    #[arg(long, default_value_t = 1e-12)]
    pub ftol: f64,

    /// Relative step size considered converged.
    #[arg(long, default_value_t = 1.49012e-8)]
    pub xtol: f64,

    /// Maximum number of residual evaluations (default: 200 * (unknowns + 1)).
    #[arg(long = "max-evals")]
    pub max_evals: Option<usize>,

    /// Export per-point residuals to CSV.
    #[arg(long = "export-csv", value_name = "PATH")]
    pub export_csv: Option<PathBuf>,

    /// Export the solution (projection, parameters, residuals, solver report) to JSON.
    #[arg(long = "export-json", value_name = "PATH")]
    pub export_json: Option<PathBuf>,

    /// Point file encoding (e.g. cp1251, latin1). Defaults to UTF-8.
    #[arg(long, value_name = "LABEL")]
    pub encoding: Option<String>,

    /// Increase log verbosity (-v: info, -vv: debug, -vvv: trace). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Point file: `src_x src_y [src_z] tgt_x tgt_y [tgt_z] [label]` per line.
    #[arg(value_name = "POINTS_FILE")]
    pub points: PathBuf,
}

/// argv after separating projection tokens from clap flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitArgs {
    /// Program name plus everything clap should parse.
    pub clap_args: Vec<String>,
    pub source: Vec<String>,
    pub target: Vec<String>,
    pub modifiers: Vec<String>,
}

/// Split argv into clap flags, source/target projection tokens and modifiers.
///
/// Rules:
/// - `+to` switches from source to target tokens
/// - other `+...` tokens go to the current projection
/// - `--k_0=…`, `--x_0~…` etc. go to the modifier list
/// - everything else (including argv\[0\]) goes to clap
pub fn split_args(argv: Vec<String>) -> SplitArgs {
    let mut out = SplitArgs::default();
    let mut parsing_target = false;

    for (i, arg) in argv.into_iter().enumerate() {
        if i == 0 {
            out.clap_args.push(arg);
        } else if arg == "+to" {
            parsing_target = true;
        } else if arg.starts_with('+') {
            if parsing_target {
                out.target.push(arg);
            } else {
                out.source.push(arg);
            }
        } else if is_modifier_token(&arg) {
            out.modifiers.push(arg);
        } else {
            out.clap_args.push(arg);
        }
    }

    out
}
