mod cli;
mod terminal;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use tracing::{error, info};

use glassbox_agent::{AnalysisError, XaiAnalyzer};
use glassbox_core::config::load_dotenv;
use glassbox_core::{parse_timestamp, Config};
use glassbox_telemetry::csv::{load_store, write_records};
use glassbox_telemetry::{generate, Preset, Selection, TelemetryStore};

use crate::cli::{AnalyzeArgs, CliArgs, Command, SourceArgs};
use crate::terminal::Terminal;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    load_dotenv();
    let args = CliArgs::parse();
    let config = match &args.profile {
        Some(profile) => Config::for_profile(profile),
        None => Config::from_env(),
    };
    config.log_summary();

    let terminal = Terminal::new();
    match args.command {
        Command::Generate { preset, seed, out } => run_generate(&terminal, &preset, seed, &out),
        Command::Anomalies { source, json } => run_anomalies(&terminal, &config, &source, json),
        Command::Analyze(analyze) => run_analyze(&terminal, config, analyze).await,
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config.redacted_summary())?);
            Ok(())
        }
    }
}

fn run_generate(terminal: &Terminal, preset: &str, seed: u64, out: &std::path::Path) -> Result<()> {
    let preset: Preset = preset.parse().map_err(|e: String| anyhow!(e))?;
    let records = generate(preset, seed);
    write_records(out, &records)
        .with_context(|| format!("failed to write telemetry to {}", out.display()))?;
    info!(path = %out.display(), records = records.len(), ?preset, seed, "telemetry written");
    terminal.print_info(&format!(
        "Wrote {} records ({:?}, seed {}) to {}",
        records.len(),
        preset,
        seed,
        out.display()
    ))?;
    Ok(())
}

fn run_anomalies(terminal: &Terminal, config: &Config, source: &SourceArgs, json: bool) -> Result<()> {
    let store = load_telemetry(config, source)?;
    let events = store.anomaly_events();
    if json {
        let rows: Vec<_> = store
            .anomalies()
            .into_iter()
            .map(|(index, record)| serde_json::json!({ "index": index, "record": record }))
            .collect();
        let body = serde_json::json!({
            "records": store.len(),
            "rule": store.rule(),
            "anomalies": rows,
            "events": events,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }
    terminal.print_anomalies(&store, &events)
}

async fn run_analyze(terminal: &Terminal, mut config: Config, args: AnalyzeArgs) -> Result<()> {
    if let Some(mode) = args.mode.clone() {
        config.analysis.mode = mode;
    }
    if let Some(max_turns) = args.max_turns {
        config.analysis.max_turns = max_turns;
    }
    if let Some(timeout_secs) = args.timeout_secs {
        config.analysis.timeout_secs = timeout_secs;
    }

    let store = load_telemetry(&config, &args.source)?;
    let selection = resolve_selection(&store, &args)?;
    let analyzer = XaiAnalyzer::from_config(&config).context("failed to set up the analyzer")?;

    if !args.json {
        terminal.print_banner(&config.telemetry.source_label(), &config.llm.model)?;
    }
    let spinner = (!args.json).then(|| terminal.start_spinner("Multi-agent system analyzing data..."));
    let result = analyzer.analyze(&store, selection).await;
    if let Some(spinner) = spinner {
        spinner.stop();
    }

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "analysis failed");
            if e.is_model_unavailable() {
                terminal.print_error("the language model is unavailable; run the analysis again")?;
            }
            return Err(analysis_failure(e));
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        terminal.print_report(&report)?;
    }
    Ok(())
}

fn analysis_failure(e: AnalysisError) -> anyhow::Error {
    match e {
        AnalysisError::NotFound(_) => anyhow::Error::new(e).context("invalid anomaly selection"),
        _ => anyhow::Error::new(e).context("analysis failed"),
    }
}

/// Load from CSV when a path is given, otherwise generate from the preset.
fn load_telemetry(config: &Config, source: &SourceArgs) -> Result<TelemetryStore> {
    let csv_path = source.csv.clone().or_else(|| config.telemetry.csv_path.clone());
    if let Some(path) = csv_path {
        info!(path = %path.display(), "loading telemetry from CSV");
        return load_store(&path, config.detection)
            .with_context(|| format!("failed to load telemetry from {}", path.display()));
    }

    let preset: Preset = source
        .preset
        .as_deref()
        .unwrap_or(&config.telemetry.preset)
        .parse()
        .map_err(|e: String| anyhow!(e))?;
    let seed = source.seed.unwrap_or(config.telemetry.seed);
    info!(?preset, seed, "generating telemetry");
    TelemetryStore::new(generate(preset, seed), config.detection)
        .context("generated telemetry is not ordered by time")
}

fn resolve_selection(store: &TelemetryStore, args: &AnalyzeArgs) -> Result<Selection> {
    if let (Some(start), Some(end)) = (args.start, args.end) {
        return Ok(Selection::Range { start, end });
    }

    let timestamp = match &args.timestamp {
        Some(raw) => parse_timestamp(raw).with_context(|| format!("invalid --timestamp '{raw}'"))?,
        None => match store.anomaly_timestamps().first() {
            Some(ts) => *ts,
            None => bail!("no anomalies in the telemetry; nothing to analyze"),
        },
    };

    Ok(match (args.before, args.after) {
        (None, None) => Selection::Timestamp(timestamp),
        (before, after) => Selection::Around {
            timestamp,
            before: before.unwrap_or(0),
            after: after.unwrap_or(0),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use glassbox_core::DetectionRule;
    use glassbox_telemetry::generator::DEFAULT_SEED;

    fn dataset() -> TelemetryStore {
        TelemetryStore::new(generate(Preset::Dataset, DEFAULT_SEED), DetectionRule::default())
            .unwrap()
    }

    fn analyze_args(argv: &[&str]) -> AnalyzeArgs {
        let mut full = vec!["glassbox", "analyze"];
        full.extend_from_slice(argv);
        match CliArgs::parse_from(full).command {
            Command::Analyze(a) => a,
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn defaults_to_first_anomaly() {
        let store = dataset();
        let selection = resolve_selection(&store, &analyze_args(&[])).unwrap();
        assert_eq!(selection, Selection::Timestamp(store.records()[150].timestamp));
    }

    #[test]
    fn padding_turns_timestamp_into_around() {
        let store = dataset();
        let args = analyze_args(&["--timestamp", "2026-03-02 13:30:00", "--before", "2"]);
        match resolve_selection(&store, &args).unwrap() {
            Selection::Around { before, after, .. } => assert_eq!((before, after), (2, 0)),
            other => panic!("unexpected selection: {other:?}"),
        }
    }

    #[test]
    fn range_flags_select_rows() {
        let store = dataset();
        let args = analyze_args(&["--start", "38", "--end", "45"]);
        assert_eq!(
            resolve_selection(&store, &args).unwrap(),
            Selection::Range { start: 38, end: 45 }
        );
    }

    #[test]
    fn bad_timestamp_is_reported() {
        let store = dataset();
        let args = analyze_args(&["--timestamp", "yesterday"]);
        assert!(resolve_selection(&store, &args).is_err());
    }

    #[test]
    fn csv_source_wins_over_preset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry.csv");
        write_records(&path, &generate(Preset::Dashboard, 7)).unwrap();

        let config = Config::for_profile("");
        let source = SourceArgs {
            csv: Some(path),
            preset: Some("dataset".into()),
            seed: None,
        };
        assert_eq!(load_telemetry(&config, &source).unwrap().len(), 50);
    }
}
