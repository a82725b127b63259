//! Callback surface between the engine and whatever front-end drives it.
//!
//! All callbacks run synchronously on engine tasks (manager, workers or the
//! progress aggregator). Adapters that own a UI thread must marshal there
//! themselves.

use std::path::Path;

pub trait EventSink: Send + Sync {
    fn on_status_change(&self, text: &str);

    fn on_progress(&self, percent: f64, speed_label: &str);

    /// True only while a multi-connection download runs.
    fn on_show_monitor(&self, show: bool);

    fn on_downloading_state_changed(&self, is_downloading: bool);

    fn on_complete(&self, final_path: &Path);

    fn on_error(&self, title: &str, message: &str);
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn on_status_change(&self, _text: &str) {}
    fn on_progress(&self, _percent: f64, _speed_label: &str) {}
    fn on_show_monitor(&self, _show: bool) {}
    fn on_downloading_state_changed(&self, _is_downloading: bool) {}
    fn on_complete(&self, _final_path: &Path) {}
    fn on_error(&self, _title: &str, _message: &str) {}
}

/// Receives one record per successful download.
pub trait HistoryStore: Send + Sync {
    fn record(&self, url: &str, final_path: &Path) -> anyhow::Result<()>;
}

/// History store that keeps nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHistory;

impl HistoryStore for NoHistory {
    fn record(&self, _url: &str, _final_path: &Path) -> anyhow::Result<()> {
        Ok(())
    }
}
