use futures::StreamExt;
use reqwest::{header, Client, StatusCode};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncSeekExt, AsyncWriteExt, SeekFrom};
use tokio::task::JoinHandle;
use tracing::debug;
use url::Url;

use crate::error::DownloadError;
use crate::session::ActiveSession;

/// Fetches one inclusive byte range and writes it at the same offset of the
/// preallocated output file.
pub(crate) struct ChunkWorker {
    pub id: usize,
    pub start_byte: u64,
    pub end_byte: u64,
    pub client: Client,
    pub url: Url,
    pub path: PathBuf,
    pub ctx: Arc<ActiveSession>,
}

impl ChunkWorker {
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        debug!(worker = self.id, start = self.start_byte, end = self.end_byte, "chunk started");
        match self.fetch().await {
            Ok(written) => debug!(worker = self.id, written, "chunk finished"),
            Err(err) => self.ctx.fail(&err),
        }
    }

    async fn fetch(&self) -> Result<u64, DownloadError> {
        let range_header = format!("bytes={}-{}", self.start_byte, self.end_byte);
        let response = self
            .client
            .get(self.url.clone())
            .header(header::RANGE, range_header)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::HttpStatus {
                status: status.as_u16(),
                url: self.url.to_string(),
            });
        }
        if status != StatusCode::PARTIAL_CONTENT {
            return Err(DownloadError::RangeNotHonored {
                status: status.as_u16(),
                start: self.start_byte,
                end: self.end_byte,
            });
        }

        let mut file = OpenOptions::new().write(true).open(&self.path).await?;
        file.seek(SeekFrom::Start(self.start_byte)).await?;

        let range_len = self.end_byte - self.start_byte + 1;
        let mut written = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(item) = stream.next().await {
            let chunk = item?;
            if chunk.is_empty() {
                continue;
            }
            if !self.ctx.session.is_active() {
                debug!(worker = self.id, "session inactive, stopping chunk");
                break;
            }

            let take = (range_len - written).min(chunk.len() as u64);
            file.write_all(&chunk[..take as usize]).await?;
            written += take;
            self.ctx.session.record_written(Some(self.id), take);

            if written == range_len {
                break;
            }
        }

        file.flush().await?;
        Ok(written)
    }
}
