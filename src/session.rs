use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::error::DownloadError;
use crate::events::EventSink;
use crate::i18n::Localizer;
use crate::state::{DownloadSession, DownloadStatus};

/// How a `start()` call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Completed(PathBuf),
    Cancelled,
    Failed,
}

/// A session together with the surfaces it reports to.
///
/// Shared by the manager, every worker and the progress aggregator. The
/// terminal paths (`fail`, `cancel`, `complete`) all go through
/// [`DownloadSession::finish`], so only the first of them reaches the sink.
pub(crate) struct ActiveSession {
    pub session: DownloadSession,
    pub sink: Arc<dyn EventSink>,
    pub strings: Arc<Localizer>,
    pub started: Instant,
}

impl ActiveSession {
    pub fn new(
        url: &str,
        thread_count: usize,
        sink: Arc<dyn EventSink>,
        strings: Arc<Localizer>,
    ) -> Self {
        Self {
            session: DownloadSession::new(url, thread_count),
            sink,
            strings,
            started: Instant::now(),
        }
    }

    pub fn status(&self, key: &str) {
        self.sink.on_status_change(&self.strings.get(key));
    }

    pub fn status_with(&self, key: &str, args: &[(&str, &str)]) {
        self.sink.on_status_change(&self.strings.format(key, args));
    }

    /// Reports `err` unless the session already ended.
    pub fn fail(&self, err: &DownloadError) {
        if !self.session.finish(DownloadStatus::Failed) {
            debug!(error = %err, "session already ended, suppressing error report");
            return;
        }
        warn!(kind = ?err.kind(), error = %err, "download failed");

        self.sink.on_show_monitor(false);
        self.sink.on_downloading_state_changed(false);
        self.status(err.status_key());

        let (title, message) = err.localized(&self.strings);
        self.sink.on_error(&title, &message);
    }

    /// Stops the session without raising an error. No-op once ended.
    pub fn cancel(&self) {
        if !self.session.finish(DownloadStatus::Cancelled) {
            return;
        }
        info!("download cancelled");

        self.sink.on_show_monitor(false);
        self.sink.on_downloading_state_changed(false);
        self.status("status_cancelled");
    }

    pub fn outcome(&self) -> DownloadOutcome {
        let state = self.session.snapshot();
        match state.status {
            DownloadStatus::Completed => DownloadOutcome::Completed(state.save_path),
            DownloadStatus::Cancelled => DownloadOutcome::Cancelled,
            _ => DownloadOutcome::Failed,
        }
    }
}
