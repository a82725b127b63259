use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::utils::speed_label;

/// Minimum spacing between two per-chunk speed samples.
pub const CHUNK_SAMPLE_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    Idle,
    Probing,
    Downloading,
    Completed,
    Cancelled,
    Failed,
}

impl DownloadStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

/// Byte range owned by one worker, plus its own throughput sample.
#[derive(Debug, Clone)]
pub struct ChunkTask {
    pub start_byte: u64,
    /// Inclusive.
    pub end_byte: u64,
    pub downloaded: u64,
    pub speed_label: String,
    pub last_sample_time: Instant,
    pub last_sample_bytes: u64,
}

impl ChunkTask {
    pub fn new(start_byte: u64, end_byte: u64) -> Self {
        Self {
            start_byte,
            end_byte,
            downloaded: 0,
            speed_label: "0.00 KB/s".to_string(),
            last_sample_time: Instant::now(),
            last_sample_bytes: 0,
        }
    }

    pub fn range_len(&self) -> u64 {
        self.end_byte - self.start_byte + 1
    }

    fn record(&mut self, bytes: u64, now: Instant) {
        self.downloaded += bytes;

        let elapsed = now.saturating_duration_since(self.last_sample_time);
        if elapsed >= CHUNK_SAMPLE_INTERVAL {
            if let Some(label) = speed_label(self.downloaded - self.last_sample_bytes, elapsed) {
                self.speed_label = label;
            }
            self.last_sample_time = now;
            self.last_sample_bytes = self.downloaded;
        }
    }
}

/// Everything guarded by the session lock.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub url: String,
    pub final_url: String,
    pub save_path: PathBuf,
    pub filename: String,
    pub total_size: u64,
    pub supports_ranges: bool,
    pub thread_count: usize,
    pub status: DownloadStatus,
    pub active: bool,
    pub aggregate_downloaded: u64,
    pub chunk_stats: BTreeMap<usize, ChunkTask>,
}

/// Details learned from the probe.
#[derive(Debug, Clone)]
pub struct ProbeInfo {
    pub final_url: String,
    pub filename: String,
    pub total_size: u64,
    pub supports_ranges: bool,
}

/// Shared state of one `start()` invocation.
///
/// The lock covers in-memory counters only; no I/O happens while it is held.
#[derive(Debug)]
pub struct DownloadSession {
    inner: Mutex<SessionState>,
}

impl DownloadSession {
    pub fn new(url: &str, thread_count: usize) -> Self {
        Self {
            inner: Mutex::new(SessionState {
                url: url.to_string(),
                final_url: String::new(),
                save_path: PathBuf::new(),
                filename: String::new(),
                total_size: 0,
                supports_ranges: false,
                thread_count,
                status: DownloadStatus::Idle,
                active: true,
                aggregate_downloaded: 0,
                chunk_stats: BTreeMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_active(&self) -> bool {
        self.lock().active
    }

    pub fn status(&self) -> DownloadStatus {
        self.lock().status
    }

    pub fn snapshot(&self) -> SessionState {
        self.lock().clone()
    }

    /// Moves to a non-terminal status. Ignored once the session has ended.
    pub fn advance(&self, status: DownloadStatus) -> bool {
        let mut state = self.lock();
        if !state.active || state.status.is_terminal() {
            return false;
        }
        state.status = status;
        true
    }

    pub fn apply_probe(&self, probe: &ProbeInfo, save_path: PathBuf) {
        let mut state = self.lock();
        state.final_url = probe.final_url.clone();
        state.filename = probe.filename.clone();
        state.total_size = probe.total_size;
        state.supports_ranges = probe.supports_ranges;
        state.save_path = save_path;
    }

    pub fn set_chunks(&self, ranges: &[(u64, u64)]) {
        let mut state = self.lock();
        state.thread_count = ranges.len();
        state.chunk_stats = ranges
            .iter()
            .enumerate()
            .map(|(id, &(start, end))| (id, ChunkTask::new(start, end)))
            .collect();
    }

    /// Accounts bytes already written to disk, globally and for `worker` if any.
    pub fn record_written(&self, worker: Option<usize>, bytes: u64) {
        let now = Instant::now();
        let mut state = self.lock();
        state.aggregate_downloaded += bytes;
        if let Some(task) = worker.and_then(|id| state.chunk_stats.get_mut(&id)) {
            task.record(bytes, now);
        }
    }

    /// `(aggregate_downloaded, total_size)` while active, `None` once ended.
    pub fn progress_sample(&self) -> Option<(u64, u64)> {
        let state = self.lock();
        state
            .active
            .then_some((state.aggregate_downloaded, state.total_size))
    }

    pub fn chunk_stats(&self) -> Vec<ChunkTask> {
        self.lock().chunk_stats.values().cloned().collect()
    }

    /// Ends the session with `status`.
    ///
    /// Returns true only for the caller that actually flipped `active`; every
    /// later caller gets false and must not report anything.
    pub fn finish(&self, status: DownloadStatus) -> bool {
        debug_assert!(status.is_terminal());
        let mut state = self.lock();
        if !state.active {
            return false;
        }
        state.active = false;
        state.status = status;
        true
    }
}
