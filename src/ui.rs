//! Terminal presentation — progress bar and styled status output.
//!
//! Uses `indicatif` for the export progress bar and `console` for colored
//! styling. [`ExportProgress`] tracks one running export visually; the free
//! functions render the stats block and the session recap.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::activity::{ActivityLog, Severity};
use crate::backend::ExportStats;
use crate::export::{JobPhase, JobSnapshot};

/// Visual indicator for a running export job.
pub struct ExportProgress {
    bar: ProgressBar,
    green: Style,
    red: Style,
}

impl ExportProgress {
    /// Starts a 0–100 progress bar for the export.
    pub fn start() -> Self {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{bar:40.cyan/blue} {pos:>3}% {msg}")
                .expect("invalid template"),
        );
        bar.set_message("starting");

        Self {
            bar,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
        }
    }

    /// Reflects the latest snapshot on the bar.
    pub fn update(&self, snapshot: &JobSnapshot) {
        self.bar.set_position(u64::from(snapshot.progress));
        self.bar.set_message(snapshot.message.clone());
    }

    /// Clears the bar and prints the job outcome.
    pub fn complete(&self, snapshot: &JobSnapshot) {
        self.bar.finish_and_clear();
        match snapshot.phase {
            JobPhase::Failed => {
                let detail = snapshot.error.as_deref().unwrap_or("unknown error");
                println!("  {} Export failed: {detail}", self.red.apply_to("✗"));
            }
            _ => {
                println!(
                    "  {} Export completed successfully",
                    self.green.apply_to("✓")
                );
            }
        }
    }
}

/// Prints the export summary counters.
pub fn print_stats(stats: &ExportStats) {
    let heading = Style::new().bold();
    println!();
    println!("{}", heading.apply_to("─── Export Summary ───"));
    println!("  Total messages:    {}", stats.total_messages);
    println!("  Exported messages: {}", stats.exported_messages);
    println!("  Export sessions:   {}", stats.export_sessions);
    if let Some(last) = &stats.last_export {
        println!("  Last export:       {last}");
    }
}

/// Prints the session activity recap, most recent entries last.
pub fn print_activity(log: &ActivityLog) {
    if log.is_empty() {
        return;
    }
    let dim = Style::new().dim();
    println!();
    println!("{}", Style::new().bold().apply_to("─── Activity ───"));
    for entry in log.entries() {
        let style = match entry.severity {
            Severity::Success => Style::new().green(),
            Severity::Warning => Style::new().yellow(),
            Severity::Error => Style::new().red(),
            Severity::Info => Style::new(),
        };
        println!(
            "  {} {}",
            dim.apply_to(entry.timestamp.format("%H:%M:%S")),
            style.apply_to(&entry.message)
        );
    }
}
