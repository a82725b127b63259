use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::trace;

use crate::session::ActiveSession;
use crate::utils::{percent, speed_label};

/// Period of the global progress report.
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

/// Turns successive byte counts into a throughput label.
#[derive(Debug, Clone)]
pub struct ThroughputSampler {
    last_bytes: u64,
    last_time: Instant,
    label: String,
}

impl ThroughputSampler {
    pub fn new(bytes: u64, now: Instant) -> Self {
        Self {
            last_bytes: bytes,
            last_time: now,
            label: "0.00 KB/s".to_string(),
        }
    }

    /// Rate since the previous sample. Keeps the last label when no time passed.
    pub fn sample(&mut self, bytes: u64, now: Instant) -> &str {
        let elapsed = now.saturating_duration_since(self.last_time);
        if let Some(label) = speed_label(bytes.saturating_sub(self.last_bytes), elapsed) {
            self.label = label;
            self.last_bytes = bytes;
            self.last_time = now;
        }
        &self.label
    }
}

/// Periodic task reporting global percentage and speed to the sink.
///
/// Ends on its own at the first tick that finds the session inactive.
pub(crate) struct ProgressAggregator {
    task: JoinHandle<()>,
}

impl ProgressAggregator {
    pub fn spawn(ctx: Arc<ActiveSession>, period: Duration) -> Self {
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            let mut sampler = ThroughputSampler::new(0, Instant::now());
            loop {
                ticker.tick().await;
                let Some((downloaded, total_size)) = ctx.session.progress_sample() else {
                    break;
                };
                let label = sampler.sample(downloaded, Instant::now());
                ctx.sink.on_progress(percent(downloaded, total_size), label);
            }
            trace!("progress aggregator stopped");
        });

        Self { task }
    }

    /// Stops the task and waits for it, so no report can follow this call.
    pub async fn stop(self) {
        self.task.abort();
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampler_reports_delta_rate() {
        let t0 = Instant::now();
        let mut sampler = ThroughputSampler::new(0, t0);
        assert_eq!(sampler.sample(2 * 1024 * 1024, t0 + Duration::from_secs(1)), "2.00 MB/s");
        assert_eq!(
            sampler.sample(2 * 1024 * 1024 + 500 * 1024, t0 + Duration::from_secs(2)),
            "500.00 KB/s"
        );
    }

    #[test]
    fn sampler_keeps_label_without_elapsed_time() {
        let t0 = Instant::now();
        let mut sampler = ThroughputSampler::new(0, t0);
        sampler.sample(1024 * 1024, t0 + Duration::from_secs(1));
        assert_eq!(sampler.sample(5 * 1024 * 1024, t0 + Duration::from_secs(1)), "1.00 MB/s");
    }
}
