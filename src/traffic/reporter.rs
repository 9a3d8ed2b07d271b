use crate::{
    logging,
    traffic::{period_start, writer::RotatingWriter, TrafficEntry, RECORD_TIME_FORMAT},
};
use chrono::{DateTime, Local};
use log::{error, warn};
use std::{collections::HashMap, path::PathBuf};
use tokio::{sync::mpsc, task::JoinHandle};

/// Bounded channel capacity the reporter drains from. Past this many
/// in-flight entries, new reports are dropped rather than applying
/// backpressure to the relay that produced them.
const CHANNEL_CAPACITY: usize = 1000;

/// Hook a relay half reports completed byte counts through. Best-effort:
/// a dropped or failed report never affects the proxied connection.
pub trait TrafficReporter: Send + Sync {
    fn report(&self, identity: &str, bytes: u64);
}

/// Cloneable front-end to a running [`TrafficReporterService`]. Multiple
/// relay halves may hold a handle; the service's loop is the sole consumer.
#[derive(Clone)]
pub struct TrafficReporterHandle {
    sender: mpsc::Sender<TrafficEntry>,
}

impl TrafficReporterHandle {
    pub fn report(&self, identity: &str, bytes: u64) {
        if bytes == 0 {
            return;
        }

        let entry = TrafficEntry {
            identity: identity.to_string(),
            bytes,
        };

        if let Err(mpsc::error::TrySendError::Full(entry)) = self.sender.try_send(entry) {
            logging::log_traffic_entry_dropped!(entry.identity, entry.bytes);
        }
    }
}

impl TrafficReporter for TrafficReporterHandle {
    fn report(&self, identity: &str, bytes: u64) {
        TrafficReporterHandle::report(self, identity, bytes)
    }
}

/// Owns the reporter's single-consumer aggregation loop: a bounded channel
/// feeds period-bucketed totals to a [`RotatingWriter`].
pub struct TrafficReporterService {
    handle: TrafficReporterHandle,
    task: JoinHandle<()>,
}

impl TrafficReporterService {
    /// Starts the aggregation loop. `interval_secs` is the reporter's
    /// period length; `path` is the rotating writer's base path.
    pub fn start(interval_secs: i64, path: PathBuf) -> TrafficReporterService {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let writer = RotatingWriter::new(path);
        let task = tokio::spawn(run(receiver, interval_secs, writer));

        TrafficReporterService {
            handle: TrafficReporterHandle { sender },
            task,
        }
    }

    pub fn handle(&self) -> TrafficReporterHandle {
        self.handle.clone()
    }

    /// Drops the sending handle so the loop observes channel closure,
    /// flushes whatever period is in flight, and returns. Entries still
    /// queued when `close` is called are still drained; only entries that
    /// never made it onto the channel are lost.
    pub async fn close(self) {
        drop(self.handle);
        if let Err(err) = self.task.await {
            error!("traffic reporter loop panicked: {}", err);
        }
    }
}

/// The reporter's single-consumer loop: accumulates `(identity, bytes)`
/// into the current period's totals, flushing the previous period's
/// totals to `writer` when wall-clock crosses a period boundary.
///
/// The entry that triggers a period transition is used only to detect the
/// transition; its own bytes are not folded into the new period. This
/// mirrors the reference reporter's behavior exactly rather than fixing
/// what looks like a latent accounting bug.
async fn run(mut receiver: mpsc::Receiver<TrafficEntry>, interval_secs: i64, mut writer: RotatingWriter) {
    let mut current_period: Option<DateTime<Local>> = None;
    let mut totals: HashMap<String, u64> = HashMap::new();

    while let Some(entry) = receiver.recv().await {
        let period = period_start(Local::now(), interval_secs);

        match current_period {
            Some(active) if active == period => {
                *totals.entry(entry.identity).or_insert(0) += entry.bytes;
            }
            None => {
                current_period = Some(period);
                *totals.entry(entry.identity).or_insert(0) += entry.bytes;
            }
            Some(active) => {
                flush(&mut writer, active, &mut totals).await;
                current_period = Some(period);
            }
        }
    }

    if let Some(active) = current_period {
        flush(&mut writer, active, &mut totals).await;
    }
}

async fn flush(writer: &mut RotatingWriter, period: DateTime<Local>, totals: &mut HashMap<String, u64>) {
    for (identity, bytes) in totals.drain() {
        if bytes == 0 {
            continue;
        }

        let line = format!("{} {} {}\n", period.format(RECORD_TIME_FORMAT), identity, bytes);
        if let Err(err) = writer.write_line(&line).await {
            warn!("failed to write traffic record for '{}': {}", identity, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        path::PathBuf,
        sync::atomic::{AtomicU64, Ordering},
    };
    use tokio::time::{sleep, Duration};

    fn scratch_path(label: &str) -> PathBuf {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!("lsocks-reporter-test-{}-{}-{}", label, n, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join("traffics.log")
    }

    #[tokio::test]
    async fn accumulates_within_a_single_period_and_flushes_on_close() {
        let base = scratch_path("accumulate");
        let service = TrafficReporterService::start(3600, base.clone());
        let handle = service.handle();

        handle.report("u", 100);
        handle.report("u", 50);
        handle.report("v", 1);

        service.close().await;

        let rotated = crate::traffic::rotated_path(&base, Local::now());
        let contents = tokio::fs::read_to_string(&rotated).await.expect("rotated file should exist");

        assert!(contents.contains(" u 150\n"));
        assert!(contents.contains(" v 1\n"));
    }

    #[tokio::test]
    async fn zero_byte_reports_never_produce_a_record() {
        let base = scratch_path("zero-bytes");
        let service = TrafficReporterService::start(3600, base.clone());
        let handle = service.handle();

        handle.report("u", 0);
        service.close().await;

        let rotated = crate::traffic::rotated_path(&base, Local::now());
        assert!(tokio::fs::metadata(&rotated).await.is_err(), "no file should have been written");
    }

    #[tokio::test]
    async fn channel_overflow_drops_excess_entries_but_keeps_accepting() {
        let base = scratch_path("overflow");
        let writer = RotatingWriter::new(base);
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);

        // Fill the channel without a consumer draining it.
        for _ in 0..CHANNEL_CAPACITY {
            sender
                .try_send(TrafficEntry {
                    identity: "u".to_string(),
                    bytes: 1,
                })
                .expect("channel has capacity");
        }

        let overflow = sender.try_send(TrafficEntry {
            identity: "u".to_string(),
            bytes: 1,
        });
        assert!(overflow.is_err(), "channel at capacity should reject the 1001st send");

        drop(receiver);
        drop(writer);
        sleep(Duration::from_millis(1)).await;
    }
}
