use futures::StreamExt;
use reqwest::{header, Client};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt, SeekFrom};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::DownloadError;
use crate::events::{EventSink, HistoryStore};
use crate::i18n::Localizer;
use crate::progress::{ProgressAggregator, PROGRESS_INTERVAL};
use crate::session::{ActiveSession, DownloadOutcome};
use crate::state::{ChunkTask, DownloadStatus, ProbeInfo, SessionState};
use crate::utils::{get_filename_from_url, normalize_url, partition_ranges, speed_label};
use crate::worker::ChunkWorker;

/// Network settings for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Total time allowed for the HEAD probe.
    pub probe_timeout: Duration,
    /// Connect and per-read timeout of data requests.
    pub data_timeout: Duration,
    pub user_agent: String,
    pub progress_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(10),
            data_timeout: Duration::from_secs(20),
            user_agent: concat!("adl/", env!("CARGO_PKG_VERSION")).to_string(),
            progress_interval: PROGRESS_INTERVAL,
        }
    }
}

/// Drives one download at a time and reports through an [`EventSink`].
pub struct DownloadManager {
    client: Client,
    config: EngineConfig,
    sink: Arc<dyn EventSink>,
    history: Arc<dyn HistoryStore>,
    strings: Arc<Localizer>,
    current: Mutex<Option<Arc<ActiveSession>>>,
}

impl DownloadManager {
    pub fn new(
        config: EngineConfig,
        sink: Arc<dyn EventSink>,
        history: Arc<dyn HistoryStore>,
        strings: Arc<Localizer>,
    ) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.data_timeout)
            .read_timeout(config.data_timeout)
            .build()?;

        Ok(Self {
            client,
            config,
            sink,
            history,
            strings,
            current: Mutex::new(None),
        })
    }

    /// Downloads `url` into `destination_dir` using up to `thread_count` connections.
    ///
    /// Runs on the caller's task until every worker has finished. All outcomes
    /// are also reported to the sink; an error is reported exactly once.
    pub async fn start(
        &self,
        url: &str,
        destination_dir: impl AsRef<Path>,
        thread_count: usize,
    ) -> DownloadOutcome {
        let ctx = Arc::new(ActiveSession::new(
            url,
            thread_count,
            self.sink.clone(),
            self.strings.clone(),
        ));
        if let Some(previous) = self.swap_current(ctx.clone()) {
            if previous.session.finish(DownloadStatus::Cancelled) {
                warn!("a new download replaced one that was still running");
            }
        }

        self.sink.on_downloading_state_changed(true);
        let aggregator = ProgressAggregator::spawn(ctx.clone(), self.config.progress_interval);

        let result = self.run(&ctx, url, destination_dir.as_ref(), thread_count).await;
        aggregator.stop().await;

        match result {
            Ok(path) => self.complete(&ctx, url, &path),
            Err(err) => ctx.fail(&err),
        }
        ctx.outcome()
    }

    /// Stops the running download. Idempotent.
    pub fn cancel(&self) {
        if let Some(ctx) = self.current() {
            ctx.cancel();
        }
    }

    pub fn status(&self) -> DownloadStatus {
        self.current()
            .map(|ctx| ctx.session.status())
            .unwrap_or(DownloadStatus::Idle)
    }

    pub fn snapshot(&self) -> Option<SessionState> {
        self.current().map(|ctx| ctx.session.snapshot())
    }

    /// Per-chunk counters of the current session, ordered by worker id.
    pub fn chunk_stats(&self) -> Vec<ChunkTask> {
        self.current()
            .map(|ctx| ctx.session.chunk_stats())
            .unwrap_or_default()
    }

    fn current(&self) -> Option<Arc<ActiveSession>> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn swap_current(&self, ctx: Arc<ActiveSession>) -> Option<Arc<ActiveSession>> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(ctx)
    }

    async fn run(
        &self,
        ctx: &Arc<ActiveSession>,
        raw_url: &str,
        destination_dir: &Path,
        thread_count: usize,
    ) -> Result<PathBuf, DownloadError> {
        ctx.session.advance(DownloadStatus::Probing);
        let url = normalize_url(raw_url)?;

        let probe = self.probe(&url).await?;
        let save_path = destination_dir.join(&probe.filename);
        ctx.session.apply_probe(&probe, save_path.clone());
        info!(
            url = %probe.final_url,
            size = probe.total_size,
            ranges = probe.supports_ranges,
            path = ?save_path,
            "probe finished"
        );

        if !ctx.session.advance(DownloadStatus::Downloading) {
            return Ok(save_path);
        }
        ctx.status("status_starting");

        let final_url = Url::parse(&probe.final_url).map_err(|e| DownloadError::Scheme {
            url: probe.final_url.clone(),
            reason: e.to_string(),
        })?;

        if probe.supports_ranges && probe.total_size > 0 && thread_count > 1 {
            self.download_multi(ctx, &final_url, &save_path, probe.total_size, thread_count)
                .await?;
        } else {
            ctx.sink.on_show_monitor(false);
            if thread_count > 1 {
                ctx.status("status_unsupported");
            } else {
                ctx.status("status_normal");
            }
            self.download_single(ctx, &final_url, &save_path, probe.total_size)
                .await?;
        }

        Ok(save_path)
    }

    async fn probe(&self, url: &Url) -> Result<ProbeInfo, DownloadError> {
        let response = self
            .client
            .head(url.clone())
            .timeout(self.config.probe_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        // Read the header itself; the body size hint of a HEAD response is always 0.
        let total_size = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(0);
        let supports_ranges = response
            .headers()
            .get(header::ACCEPT_RANGES)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("bytes"));
        let final_url = response.url().clone();

        Ok(ProbeInfo {
            filename: get_filename_from_url(&final_url),
            final_url: final_url.to_string(),
            total_size,
            supports_ranges,
        })
    }

    async fn download_multi(
        &self,
        ctx: &Arc<ActiveSession>,
        url: &Url,
        path: &Path,
        total_size: u64,
        thread_count: usize,
    ) -> Result<(), DownloadError> {
        let ranges = partition_ranges(total_size, thread_count);
        ctx.status_with("status_accelerated", &[("count", ranges.len().to_string().as_str())]);
        ctx.sink.on_show_monitor(true);

        // Must be done before any worker opens the file.
        preallocate(path, total_size).await?;
        ctx.session.set_chunks(&ranges);

        let handles: Vec<_> = ranges
            .iter()
            .enumerate()
            .map(|(id, &(start_byte, end_byte))| {
                ChunkWorker {
                    id,
                    start_byte,
                    end_byte,
                    client: self.client.clone(),
                    url: url.clone(),
                    path: path.to_path_buf(),
                    ctx: ctx.clone(),
                }
                .spawn()
            })
            .collect();
        debug!(workers = handles.len(), "chunk workers spawned");

        for handle in handles {
            handle.await?;
        }

        let received = ctx.session.snapshot().aggregate_downloaded;
        if ctx.session.is_active() && received != total_size {
            return Err(DownloadError::Incomplete {
                expected: total_size,
                received,
            });
        }
        Ok(())
    }

    async fn download_single(
        &self,
        ctx: &Arc<ActiveSession>,
        url: &Url,
        path: &Path,
        total_size: u64,
    ) -> Result<(), DownloadError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let mut file = File::create(path).await?;
        let mut received = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(item) = stream.next().await {
            let chunk = item?;
            if chunk.is_empty() {
                continue;
            }
            if !ctx.session.is_active() {
                break;
            }
            file.write_all(&chunk).await?;
            received += chunk.len() as u64;
            ctx.session.record_written(None, chunk.len() as u64);
        }
        file.flush().await?;

        if total_size > 0 && received < total_size && ctx.session.is_active() {
            return Err(DownloadError::Incomplete {
                expected: total_size,
                received,
            });
        }
        Ok(())
    }

    fn complete(&self, ctx: &ActiveSession, url: &str, path: &Path) {
        if !ctx.session.finish(DownloadStatus::Completed) {
            return;
        }

        let state = ctx.session.snapshot();
        let average = speed_label(state.aggregate_downloaded, ctx.started.elapsed())
            .unwrap_or_else(|| "0.00 KB/s".to_string());
        info!(path = ?path, bytes = state.aggregate_downloaded, speed = %average, "download complete");

        ctx.sink.on_progress(100.0, &average);
        ctx.status("status_completed");
        ctx.sink.on_show_monitor(false);
        ctx.sink.on_downloading_state_changed(false);
        ctx.sink.on_complete(path);

        if let Err(e) = self.history.record(url, path) {
            warn!(error = %e, "failed to record download history");
        }
    }
}

/// Sizes `path` to `total_size` by writing its last byte.
async fn preallocate(path: &Path, total_size: u64) -> Result<(), DownloadError> {
    let mut file = File::create(path).await?;
    file.seek(SeekFrom::Start(total_size - 1)).await?;
    file.write_all(&[0]).await?;
    file.flush().await?;
    Ok(())
}
