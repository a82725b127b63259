//! Segmented HTTP(S) downloader.
//!
//! A [`DownloadManager`] probes a URL, splits the file into byte ranges when
//! the server allows it, fetches the ranges concurrently into a preallocated
//! file and reports progress through an [`EventSink`].

pub mod cli;
pub mod downloader;
pub mod error;
pub mod events;
pub mod history;
pub mod i18n;
pub mod progress;
pub mod settings;
pub mod state;
pub mod utils;

mod session;
mod worker;

pub use downloader::{DownloadManager, EngineConfig};
pub use error::{DownloadError, ErrorKind};
pub use events::{EventSink, HistoryStore, NoHistory, NullSink};
pub use i18n::Localizer;
pub use session::DownloadOutcome;
pub use state::{ChunkTask, DownloadStatus, SessionState};
