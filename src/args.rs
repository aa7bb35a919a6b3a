use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "apiwatch", author, version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Trace client programs against a library and persist the API model.
    ModelGen(ModelGenArgs),
    /// Replay a model against a library version and report breaking paths.
    Check(CheckArgs),
    /// Print summary statistics for a persisted model.
    Stats(StatsArgs),
}

#[derive(Debug, Parser)]
pub struct ModelGenArgs {
    /// Name of the subject library (the specifier clients `require`).
    #[arg(long, value_name = "NAME")]
    pub library: String,

    /// Client file, or directory whose *.js files run in sorted order.
    #[arg(long, value_name = "PATH")]
    pub client: PathBuf,

    /// Skip structural-hash compression of the recorded tree.
    #[arg(long, default_value_t = false)]
    pub no_compress: bool,

    /// Only collapse sibling calls whose argument shapes also agree.
    /// Keeps distinguishing argument evidence at the cost of a larger model.
    #[arg(long, default_value_t = false)]
    pub strict_compress: bool,

    /// Provide synchronous `describe`/`it` shims to clients.
    #[arg(long, default_value_t = false)]
    pub test_mode: bool,

    /// Package directory of the subject library (skips the node_modules walk).
    #[arg(long, value_name = "DIR")]
    pub lib_path: Option<PathBuf>,

    /// Output path for the model. Defaults to `<library>.api.json`.
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Seed for deterministic call identifiers (useful for diffing runs).
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,
}

impl ModelGenArgs {
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}.api.json", self.library)))
    }
}

#[derive(Debug, Parser)]
pub struct CheckArgs {
    /// Model file produced by `model-gen`.
    #[arg(long, value_name = "PATH")]
    pub model: PathBuf,

    /// Override the library name recorded at the model root.
    #[arg(long, value_name = "NAME")]
    pub library: Option<String>,

    /// Package directory of the library version to check.
    #[arg(long, value_name = "DIR")]
    pub lib_path: Option<PathBuf>,

    /// Directory module resolution starts from (default: cwd).
    #[arg(long, value_name = "DIR")]
    pub resolve_root: Option<PathBuf>,

    /// Write the JSON report here in addition to stdout.
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Report format on stdout.
    #[arg(long, value_enum, default_value_t = ReportFormat::Human)]
    pub format: ReportFormat,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum ReportFormat {
    Human,
    Json,
}

#[derive(Debug, Parser)]
pub struct StatsArgs {
    /// Model file produced by `model-gen`.
    #[arg(long, value_name = "PATH")]
    pub model: PathBuf,

    /// Emit JSON instead of the human summary.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}
