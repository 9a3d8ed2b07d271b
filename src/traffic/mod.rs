//! Per-identity traffic accounting: a bounded reporter aggregates byte
//! counts into time-bucketed records, appended to a date-rotated log file
//! that a collector process can later scan and tail.

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

pub mod reporter;
pub mod scanner;
pub mod writer;

pub use reporter::{TrafficReporter, TrafficReporterHandle, TrafficReporterService};
pub use scanner::{scan, tail, ParsedRecord};
pub use writer::RotatingWriter;

/// Format used both when writing and parsing the time column of a traffic
/// record, and the date segment of a rotated file name.
pub const RECORD_TIME_FORMAT: &str = "%Y%m%d%H%M%S";
const ROTATION_DATE_FORMAT: &str = "%Y%m%d";

/// A single `(identity, bytes)` accounting entry in flight on the reporter's
/// channel.
#[derive(Debug, Clone)]
pub struct TrafficEntry {
    pub identity: String,
    pub bytes: u64,
}

/// Given a base path `name.ext`, returns the rotated path for date `t`:
/// `name-YYYYMMDD.ext` (or `name-YYYYMMDD` if `base` has no extension).
pub fn rotated_path(base: &Path, t: DateTime<Local>) -> PathBuf {
    let stem = base.file_stem().and_then(|s| s.to_str()).unwrap_or("traffics");
    let ext = base.extension().and_then(|s| s.to_str());
    let date = t.format(ROTATION_DATE_FORMAT);

    let file_name = match ext {
        Some(ext) => format!("{stem}-{date}.{ext}"),
        None => format!("{stem}-{date}"),
    };

    base.with_file_name(file_name)
}

/// True if `name` is a rotated traffic file name for the given base
/// `stem`/`ext`, i.e. matches `<stem>-<8 digits>[.ext]`.
pub fn is_rotated_file_name(name: &str, stem: &str, ext: Option<&str>) -> bool {
    let Some(rest) = name.strip_prefix(stem) else {
        return false;
    };
    let Some(rest) = rest.strip_prefix('-') else {
        return false;
    };

    let digits = match ext {
        Some(ext) => match rest.strip_suffix(&format!(".{ext}")) {
            Some(digits) => digits,
            None => return false,
        },
        None => rest,
    };

    digits.len() == 8 && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Computes the start of the wall-clock period of length `interval_secs`
/// that `t` falls in, i.e. `floor(t, interval)`.
pub fn period_start(t: DateTime<Local>, interval_secs: i64) -> DateTime<Local> {
    use chrono::TimeZone;

    let ts = t.timestamp();
    let floored = ts - ts.rem_euclid(interval_secs.max(1));
    Local.timestamp_opt(floored, 0).single().expect("floored timestamp is always valid")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn local(ts: i64) -> DateTime<Local> {
        Local.timestamp_opt(ts, 0).single().unwrap()
    }

    #[test]
    fn rotated_path_keeps_extension() {
        let base = Path::new("/var/log/traffics.log");
        let t = local(1_700_000_000);
        let rotated = rotated_path(base, t);
        assert_eq!(rotated.extension().unwrap(), "log");
        assert!(rotated.file_stem().unwrap().to_str().unwrap().starts_with("traffics-"));
    }

    #[test]
    fn rotated_path_same_day_is_equal() {
        let base = Path::new("traffics.log");
        let morning = local(1_700_000_000);
        let evening = local(1_700_000_000 + 3600 * 10);
        assert_eq!(rotated_path(base, morning), rotated_path(base, evening));
    }

    #[test]
    fn is_rotated_file_name_matches_expected_pattern() {
        assert!(is_rotated_file_name("traffics-20240101.log", "traffics", Some("log")));
        assert!(!is_rotated_file_name("traffics-2024010.log", "traffics", Some("log")));
        assert!(!is_rotated_file_name("traffics-20240101.txt", "traffics", Some("log")));
        assert!(!is_rotated_file_name("traffics.log", "traffics", Some("log")));
        assert!(is_rotated_file_name("traffics-20240101", "traffics", None));
    }

    #[test]
    fn period_start_floors_to_interval_boundary() {
        let t = local(1_700_000_097);
        assert_eq!(local(1_700_000_040), period_start(t, 60));
    }
}
