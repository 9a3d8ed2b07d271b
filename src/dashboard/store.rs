use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// One traffic record as exposed through the HTTP query API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub identifier: String,
    pub bytes: i64,
    pub time: DateTime<Local>,
}

/// The collector's in-memory query store: a per-identifier list of records,
/// kept in time order. Writers (the statistician) append in monotone time
/// order per identifier; readers binary-search the sorted list.
pub struct TrafficStore {
    inner: RwLock<HashMap<String, Vec<Record>>>,
}

impl TrafficStore {
    pub fn new() -> TrafficStore {
        TrafficStore { inner: RwLock::new(HashMap::new()) }
    }

    pub async fn put(&self, identifier: &str, time: DateTime<Local>, bytes: i64) {
        let mut records = self.inner.write().await;
        records.entry(identifier.to_string()).or_default().push(Record {
            identifier: identifier.to_string(),
            bytes,
            time,
        });
    }

    /// Returns the sub-slice of `identifier`'s records whose time falls in
    /// `[begin, end)`, located via binary search over the time column. An
    /// unknown identifier yields an empty list, not an error.
    pub async fn list(&self, identifier: &str, begin: DateTime<Local>, end: DateTime<Local>) -> Vec<Record> {
        let records = self.inner.read().await;
        let Some(records) = records.get(identifier) else {
            return Vec::new();
        };

        let start = records.partition_point(|r| r.time < begin);
        let stop = records.partition_point(|r| r.time < end);
        records[start..stop].to_vec()
    }
}

impl Default for TrafficStore {
    fn default() -> Self {
        Self::new()
    }
}
