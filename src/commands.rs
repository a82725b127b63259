use anyhow::{Context, Result};
use indicatif::{HumanBytes, MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::task::JoinHandle;
use tracing::debug;

use adl::history::JsonHistoryStore;
use adl::{DownloadManager, DownloadOutcome, EngineConfig, EventSink, Localizer};

const MONITOR_REFRESH: Duration = Duration::from_millis(500);

/// Renders engine events as indicatif bars on stderr.
pub struct TerminalSink {
    multi_progress: MultiProgress,
    bar: ProgressBar,
    monitor_shown: AtomicBool,
}

impl TerminalSink {
    pub fn new() -> Self {
        let multi_progress = MultiProgress::new();
        multi_progress.set_draw_target(ProgressDrawTarget::stderr_with_hz(5));

        let bar = multi_progress.add(ProgressBar::new(100));
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );

        Self {
            multi_progress,
            bar,
            monitor_shown: AtomicBool::new(false),
        }
    }

    fn monitor_shown(&self) -> bool {
        self.monitor_shown.load(Ordering::Relaxed)
    }
}

impl Default for TerminalSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for TerminalSink {
    fn on_status_change(&self, text: &str) {
        if let Err(e) = self.multi_progress.println(text) {
            debug!(error = %e, "failed to print status line");
        }
    }

    fn on_progress(&self, percent: f64, speed_label: &str) {
        self.bar.set_position(percent.floor() as u64);
        self.bar.set_message(speed_label.to_string());
    }

    fn on_show_monitor(&self, show: bool) {
        self.monitor_shown.store(show, Ordering::Relaxed);
    }

    fn on_downloading_state_changed(&self, is_downloading: bool) {
        if is_downloading {
            self.bar.enable_steady_tick(Duration::from_millis(100));
        } else {
            self.bar.disable_steady_tick();
        }
    }

    fn on_complete(&self, final_path: &Path) {
        self.bar
            .finish_with_message(format!("Saved to {}", final_path.display()));
    }

    fn on_error(&self, title: &str, message: &str) {
        self.bar.abandon();
        eprintln!("{}: {}", title, message);
    }
}

pub async fn run_download(
    url: String,
    output: PathBuf,
    threads: usize,
    config: EngineConfig,
    strings: Localizer,
    monitor: bool,
) -> Result<DownloadOutcome> {
    if !output.exists() {
        fs::create_dir_all(&output)
            .await
            .context("Failed to create output directory")?;
    }

    let sink = Arc::new(TerminalSink::new());
    let manager = Arc::new(DownloadManager::new(
        config,
        sink.clone(),
        Arc::new(JsonHistoryStore::open_default()),
        Arc::new(strings),
    )?);

    let canceller = manager.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            canceller.cancel();
        }
    });
    let monitor_task = monitor.then(|| spawn_chunk_monitor(manager.clone(), sink.clone()));

    let download = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.start(&url, output, threads).await })
    };
    let outcome = download.await.context("Download task panicked")?;

    ctrl_c.abort();
    if let Some(task) = monitor_task {
        task.abort();
    }
    Ok(outcome)
}

/// One bar per chunk, refreshed from the manager's chunk stats.
fn spawn_chunk_monitor(manager: Arc<DownloadManager>, sink: Arc<TerminalSink>) -> JoinHandle<()> {
    let style = ProgressStyle::default_bar()
        .template("  #{prefix:<3} [{bar:30.yellow/blue}] {bytes:>10}/{total_bytes:<10} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-");

    tokio::spawn(async move {
        let mut bars: HashMap<usize, ProgressBar> = HashMap::new();
        loop {
            tokio::time::sleep(MONITOR_REFRESH).await;

            if !sink.monitor_shown() {
                for (_, bar) in bars.drain() {
                    bar.finish_and_clear();
                }
                continue;
            }

            for (id, chunk) in manager.chunk_stats().into_iter().enumerate() {
                let bar = bars.entry(id).or_insert_with(|| {
                    let bar = sink
                        .multi_progress
                        .add(ProgressBar::new(chunk.range_len()));
                    bar.set_style(style.clone());
                    bar.set_prefix(id.to_string());
                    bar
                });
                bar.set_position(chunk.downloaded);
                bar.set_message(chunk.speed_label);
            }
        }
    })
}

pub fn list_history() -> Result<()> {
    let store = JsonHistoryStore::open_default();
    let entries = store.entries()?;
    if entries.is_empty() {
        println!("No downloads recorded in {:?}.", store.path());
        return Ok(());
    }

    println!("{:<20} {:<40} {:<12} {}", "Date", "File", "Size", "Link");
    println!("{:-<20} {:-<40} {:-<12} {:-<30}", "", "", "", "");
    for entry in entries {
        let size = std::fs::metadata(entry.folder.join(&entry.filename))
            .map(|m| HumanBytes(m.len()).to_string())
            .unwrap_or_else(|_| "missing".to_string());
        println!(
            "{:<20} {:<40} {:<12} {}",
            entry.timestamp.format("%Y-%m-%d %H:%M"),
            entry.filename,
            size,
            entry.url
        );
    }
    Ok(())
}
