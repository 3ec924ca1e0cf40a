//! Progress reporting for catalog ingestion.
//!
//! Bars and spinners are drawn with indicatif. In log-only mode they are
//! hidden and progress is emitted as periodic log lines instead, which
//! keeps output readable when stderr is redirected to a file.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::info;

/// Global flag for log-only mode (set from args in main)
pub static LOG_ONLY: AtomicBool = AtomicBool::new(false);

/// Rows between progress log lines in log-only mode
const LOG_INTERVAL: u64 = 100_000;

pub fn set_log_only(value: bool) {
    LOG_ONLY.store(value, Ordering::Relaxed);
}

pub fn is_log_only() -> bool {
    LOG_ONLY.load(Ordering::Relaxed)
}

/// Format duration in human-readable format
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

/// Progress of one ingestion phase.
///
/// With a known total it renders a bar, otherwise a spinner. Either way the
/// phase name prefixes log-only lines.
pub struct PhaseProgress {
    phase: &'static str,
    total: Option<u64>,
    current: u64,
    bar: ProgressBar,
}

impl PhaseProgress {
    pub fn bar(phase: &'static str, total: u64) -> Self {
        let bar = ProgressBar::new(total);
        if is_log_only() {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        } else {
            let style = ProgressStyle::default_bar()
                .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}, ETA: {eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> ");
            bar.set_style(style);
        }
        bar.set_message(phase);
        Self {
            phase,
            total: Some(total),
            current: 0,
            bar,
        }
    }

    pub fn spinner(phase: &'static str) -> Self {
        let bar = ProgressBar::new_spinner();
        if is_log_only() {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        } else {
            let style = ProgressStyle::default_spinner()
                .template("{msg} {spinner} {pos} rows [{elapsed_precise}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            bar.set_style(style);
            bar.enable_steady_tick(Duration::from_millis(100));
        }
        bar.set_message(phase);
        Self {
            phase,
            total: None,
            current: 0,
            bar,
        }
    }

    pub fn inc(&mut self) {
        self.current += 1;
        self.bar.inc(1);
        if is_log_only() && self.current % LOG_INTERVAL == 0 {
            self.log_line();
        }
    }

    pub fn position(&self) -> u64 {
        self.current
    }

    pub fn finish(self, msg: String) {
        if is_log_only() {
            self.log_line();
            info!("[{}] {}", self.phase, msg);
        }
        self.bar.finish_with_message(msg);
    }

    fn log_line(&self) {
        match self.total {
            Some(total) if total > 0 => {
                let pct = 100.0 * self.current as f64 / total as f64;
                info!("[{}] {}/{} ({:.1}%)", self.phase, self.current, total, pct);
            }
            _ => info!("[{}] {} rows", self.phase, self.current),
        }
    }
}
