use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};

use glassbox_agent::{AnalysisReport, ResponseFormat};
use glassbox_core::{format_timestamp, TelemetryRecord};
use glassbox_telemetry::{AnomalyEvent, TelemetryStore};

pub const AGNOSTIC_TITLE: &str = "Traditional XAI (Context-Agnostic)";
pub const CONTEXTUAL_TITLE: &str = "Proposed Framework (Context-Aware)";

/// Color scheme for terminal output.
struct Colors;

impl Colors {
    const AGNOSTIC: Color = Color::Red;
    const CONTEXTUAL: Color = Color::Green;
    const WARNING: Color = Color::Yellow;
    const ERROR: Color = Color::Red;
    const DIM: Color = Color::DarkGrey;
    const HEADER: Color = Color::Magenta;
}

/// Plain-text renderer for command output.
pub struct Terminal;

impl Terminal {
    pub fn new() -> Self {
        Self
    }

    /// Title line plus the data source and model in use.
    pub fn print_banner(&self, source: &str, model: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::HEADER),
            Print("Building the Glass Box"),
            ResetColor,
            Print(" - XAI-CPS Prototype\n"),
            SetForegroundColor(Colors::DIM),
            Print(format!("Telemetry: {} | Model: {}\n", source, model)),
            Print("---\n"),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Anomalous records followed by the incidents they form.
    pub fn print_anomalies(&self, store: &TelemetryStore, events: &[AnomalyEvent]) -> Result<()> {
        let mut stdout = io::stdout();
        let anomalies = store.anomalies();
        if anomalies.is_empty() {
            execute!(
                stdout,
                SetForegroundColor(Colors::DIM),
                Print(format!("No anomalies in {} records.\n", store.len())),
                ResetColor,
            )?;
            return Ok(());
        }

        execute!(
            stdout,
            SetForegroundColor(Colors::HEADER),
            Print(format!(
                "{} anomalous record(s) out of {}:\n",
                anomalies.len(),
                store.len()
            )),
            SetForegroundColor(Colors::DIM),
            Print(format!(
                "{:<6} {:<20} {:>9} {:>10} {:>11}  {}\n",
                "ROW", "TIMESTAMP", "PSI", "VIB mm/s", "LATENCY ms", "CONTEXT"
            )),
            Print(format!("{}\n", "-".repeat(80))),
            ResetColor,
        )?;
        for (index, record) in anomalies {
            execute!(stdout, Print(format_record_row(index, record)))?;
        }

        execute!(
            stdout,
            Print("\n"),
            SetForegroundColor(Colors::HEADER),
            Print(format!("{} incident(s):\n", events.len())),
            ResetColor,
        )?;
        for event in events {
            execute!(
                stdout,
                Print(format!(
                    "  rows {}..{} ({} record(s)) {} to {}\n",
                    event.start,
                    event.end,
                    event.len(),
                    format_timestamp(&event.first_timestamp),
                    format_timestamp(&event.last_timestamp),
                )),
            )?;
        }
        stdout.flush()?;
        Ok(())
    }

    /// The two explanations as stacked panels.
    pub fn print_report(&self, report: &AnalysisReport) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::DIM),
            Print(format!(
                "Window: {} | {} record(s), {} anomalous | {} turn(s) in {} ms\n\n",
                report.selection,
                report.rows,
                report.anomalous_rows,
                report.turns,
                report.elapsed_ms
            )),
            ResetColor,
        )?;

        self.print_panel(
            AGNOSTIC_TITLE,
            "(Simulating LIME/SHAP internal feature weighting)",
            &report.explanations.agnostic,
            Colors::AGNOSTIC,
        )?;
        self.print_panel(
            CONTEXTUAL_TITLE,
            "(Integrating physical sensor logic with external environment variables)",
            &report.explanations.contextual,
            Colors::CONTEXTUAL,
        )?;

        if report.format != ResponseFormat::Compliant {
            execute!(
                stdout,
                SetForegroundColor(Colors::WARNING),
                Print(format!(
                    "Note: the explainer's reply was not in the expected format ({:?}).\n",
                    report.format
                )),
                ResetColor,
            )?;
        }
        stdout.flush()?;
        Ok(())
    }

    fn print_panel(&self, title: &str, subtitle: &str, body: &str, color: Color) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(color),
            Print(format!("=== {} ===\n", title)),
            SetForegroundColor(Colors::DIM),
            Print(format!("{}\n\n", subtitle)),
            ResetColor,
            Print(format!("{}\n\n", body)),
        )?;
        Ok(())
    }

    pub fn print_error(&self, msg: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::ERROR),
            Print(format!("Error: {}\n", msg)),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    pub fn print_info(&self, msg: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::DIM),
            Print(format!("{}\n", msg)),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Show a waiting indicator on stderr while a model call is in flight.
    pub fn start_spinner(&self, message: &str) -> SpinnerHandle {
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();
        let message = message.to_string();

        let handle = std::thread::spawn(move || {
            let frames = ['|', '/', '-', '\\'];
            let mut i = 0;
            let mut stderr = io::stderr();
            while running_clone.load(Ordering::SeqCst) {
                execute!(
                    stderr,
                    SetForegroundColor(Colors::DIM),
                    Print(format!("\r{} {}", frames[i % frames.len()], message)),
                    ResetColor,
                )
                .ok();
                i += 1;
                std::thread::sleep(std::time::Duration::from_millis(100));
            }
            // Clear spinner
            execute!(stderr, Print(format!("\r{}\r", " ".repeat(message.len() + 2)))).ok();
        });

        SpinnerHandle {
            running,
            thread: Some(handle),
        }
    }
}

fn format_record_row(index: usize, record: &TelemetryRecord) -> String {
    let latency = record
        .latency_ms
        .map(|l| format!("{l:.2}"))
        .unwrap_or_else(|| "n/a".to_string());
    format!(
        "{:<6} {:<20} {:>9.2} {:>10.2} {:>11}  {}\n",
        index,
        format_timestamp(&record.timestamp),
        record.pressure_psi,
        record.vibration_mms,
        latency,
        record.context
    )
}

/// Handle to a running spinner. Drop or call stop() to terminate it.
pub struct SpinnerHandle {
    running: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl SpinnerHandle {
    /// Stop the animation and wait for the line to be cleared.
    pub fn stop(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            thread.join().ok();
        }
    }
}

impl Drop for SpinnerHandle {
    fn drop(&mut self) {
        self.halt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn record_row_formats_two_decimals() {
        let ts = NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(10, 15, 0)
            .unwrap();
        let record = TelemetryRecord::new(ts, 28.4, 6.7, "Heavy Storm", Some(210.5));
        let row = format_record_row(7, &record);
        assert!(row.starts_with("7      2026-03-01 10:15:00"));
        assert!(row.contains("28.40"));
        assert!(row.contains("6.70"));
        assert!(row.contains("210.50"));
        assert!(row.trim_end().ends_with("Heavy Storm"));
    }

    #[test]
    fn missing_latency_shows_na() {
        let ts = NaiveDate::from_ymd_opt(2026, 2, 19)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let record = TelemetryRecord::new(ts, 30.0, 6.0, "Clear", None);
        assert!(format_record_row(0, &record).contains("n/a"));
    }

    #[test]
    fn spinner_stops_cleanly() {
        let spinner = Terminal::new().start_spinner("waiting");
        spinner.stop();
    }
}
