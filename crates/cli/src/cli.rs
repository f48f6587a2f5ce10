use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Glass-box explanations for water-plant telemetry anomalies.
///
/// Generates or loads a telemetry series, lists the anomalous records and
/// asks a two-agent conversation for a context-agnostic and a
/// context-aware explanation side by side.
#[derive(Parser, Debug)]
#[command(name = "glassbox", about = "Context-aware XAI for CPS telemetry")]
pub struct CliArgs {
    /// Configuration profile (overrides GLASSBOX_PROFILE)
    #[arg(long, global = true)]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a synthetic telemetry series and write it as CSV
    Generate {
        /// Preset: dashboard or dataset
        #[arg(long, default_value = "dataset")]
        preset: String,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Output file
        #[arg(long, default_value = "smart_water_telemetry_1000.csv")]
        out: PathBuf,
    },

    /// List anomalous records and the incidents they form
    Anomalies {
        #[command(flatten)]
        source: SourceArgs,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Explain one anomaly window
    Analyze(AnalyzeArgs),

    /// Print the effective configuration (secrets redacted)
    Config,
}

/// Where telemetry comes from. Unset flags fall back to configuration.
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Load telemetry from this CSV file (falls back to TELEMETRY_CSV)
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Generator preset when no CSV is given
    #[arg(long)]
    pub preset: Option<String>,

    /// Generator seed when no CSV is given
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Exact timestamp of the record to explain (defaults to the first anomaly)
    #[arg(long, conflicts_with_all = ["start", "end"])]
    pub timestamp: Option<String>,

    /// First row of an index range
    #[arg(long, requires = "end")]
    pub start: Option<usize>,

    /// End of an index range (exclusive)
    #[arg(long, requires = "start")]
    pub end: Option<usize>,

    /// Rows before the timestamp to include as context
    #[arg(long, requires = "timestamp")]
    pub before: Option<usize>,

    /// Rows after the timestamp to include as context
    #[arg(long, requires = "timestamp")]
    pub after: Option<usize>,

    /// relay or active
    #[arg(long)]
    pub mode: Option<String>,

    #[arg(long)]
    pub max_turns: Option<u32>,

    /// Deadline for the whole analysis
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}
