use crate::{
    dashboard::store::TrafficStore,
    logging,
    traffic::{self, is_rotated_file_name, rotated_path},
};
use chrono::Local;
use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Discovers rotated traffic files, replays history into the store once,
/// then continuously tails the live file, re-tailing whenever the expected
/// active path rotates.
pub struct Statistician {
    store: Arc<TrafficStore>,
    ready: Arc<AtomicBool>,
    base_path: PathBuf,
}

impl Statistician {
    /// How often the expected active path is recomputed and compared
    /// against the path currently being tailed.
    const ROTATION_CHECK_INTERVAL: Duration = Duration::from_secs(5);

    /// Builds a statistician and returns it alongside the store it feeds and
    /// a readiness flag the HTTP healthcheck route can consult (true once
    /// the initial archived-file scan completes).
    pub fn new(base_path: PathBuf) -> (Statistician, Arc<TrafficStore>, Arc<AtomicBool>) {
        let store = Arc::new(TrafficStore::new());
        let ready = Arc::new(AtomicBool::new(false));

        (
            Statistician {
                store: Arc::clone(&store),
                ready: Arc::clone(&ready),
                base_path,
            },
            store,
            ready,
        )
    }

    pub async fn run(self, cancellation: CancellationToken) {
        self.scan_archived().await;
        self.ready.store(true, Ordering::Relaxed);

        let mut active_path: Option<PathBuf> = None;
        let mut active_tail: Option<(CancellationToken, JoinHandle<()>)> = None;
        let mut ticker = tokio::time::interval(Self::ROTATION_CHECK_INTERVAL);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let expected = rotated_path(&self.base_path, Local::now());
                    let is_new = active_path.as_ref() != Some(&expected);

                    if is_new && tokio::fs::metadata(&expected).await.is_ok() {
                        if let Some((token, handle)) = active_tail.take() {
                            token.cancel();
                            let _ = handle.await;
                        }

                        let tail_token = CancellationToken::new();
                        let store = Arc::clone(&self.store);
                        let path = expected.clone();
                        let token_for_task = tail_token.clone();

                        active_tail = Some((
                            tail_token,
                            tokio::spawn(async move {
                                if let Err(err) = traffic::tail(&path, &token_for_task, |record| {
                                    let store = Arc::clone(&store);
                                    async move { store.put(&record.identity, record.time, record.bytes).await }
                                })
                                .await
                                {
                                    logging::log_statistician_scan_failed!(path.display(), err);
                                }
                            }),
                        ));

                        active_path = Some(expected);
                    }
                }
                _ = cancellation.cancelled() => {
                    if let Some((token, handle)) = active_tail.take() {
                        token.cancel();
                        let _ = handle.await;
                    }
                    return;
                }
            }
        }
    }

    async fn scan_archived(&self) {
        let dir = self.base_path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
        let stem = self.base_path.file_stem().and_then(|s| s.to_str()).unwrap_or("traffics");
        let ext = self.base_path.extension().and_then(|s| s.to_str());
        let active = rotated_path(&self.base_path, Local::now());

        let mut read_dir = match tokio::fs::read_dir(dir).await {
            Ok(read_dir) => read_dir,
            Err(_) => return,
        };

        let mut archived = Vec::new();
        while let Ok(Some(entry)) = read_dir.next_entry().await {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            if is_rotated_file_name(name, stem, ext) && path != active {
                archived.push(path);
            }
        }
        archived.sort();

        let token = CancellationToken::new();
        for path in archived {
            let store = Arc::clone(&self.store);
            if let Err(err) = traffic::scan(&path, &token, |record| {
                let store = Arc::clone(&store);
                async move { store.put(&record.identity, record.time, record.bytes).await }
            })
            .await
            {
                logging::log_statistician_scan_failed!(path.display(), err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    fn scratch_dir(label: &str) -> PathBuf {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!("lsocks-statistician-test-{}-{}-{}", label, n, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn scan_archived_replays_non_active_rotated_files_into_the_store() {
        let dir = scratch_dir("archived");
        let base = dir.join("traffics.log");

        let yesterday = rotated_path(&base, Local::now() - chrono::Duration::days(1));
        tokio::fs::write(&yesterday, "20240101000000 u 100\n20240101000000 v 1\n").await.unwrap();

        let (statistician, store, ready) = Statistician::new(base);
        assert!(!ready.load(Ordering::Relaxed));

        statistician.scan_archived().await;

        let records = store.list("u", Local::now() - chrono::Duration::days(2), Local::now()).await;
        assert_eq!(1, records.len());
        assert_eq!(100, records[0].bytes);
    }

    #[tokio::test]
    async fn scan_archived_skips_the_currently_active_rotated_path() {
        let dir = scratch_dir("active-skip");
        let base = dir.join("traffics.log");

        let today = rotated_path(&base, Local::now());
        tokio::fs::write(&today, "20240101000000 u 100\n").await.unwrap();

        let (statistician, store, _ready) = Statistician::new(base);
        statistician.scan_archived().await;

        assert!(store.list("u", Local::now() - chrono::Duration::days(1), Local::now() + chrono::Duration::days(1)).await.is_empty());
    }
}
