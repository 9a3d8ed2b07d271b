use crate::traffic::RECORD_TIME_FORMAT;
use chrono::{DateTime, Local, TimeZone};
use std::{future::Future, io, path::Path, time::Duration};
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, AsyncSeekExt, BufReader},
    time::sleep,
};
use tokio_util::sync::CancellationToken;

/// Time between end-of-file polls while tailing the live traffic file.
const TAIL_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// One successfully parsed line of a traffic file.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecord {
    pub time: DateTime<Local>,
    pub identity: String,
    pub bytes: i64,
}

fn parse_record(line: &str) -> Option<ParsedRecord> {
    let mut parts = line.splitn(3, ' ');
    let (time, identity, bytes) = (parts.next()?, parts.next()?, parts.next()?);

    let naive = chrono::NaiveDateTime::parse_from_str(time, RECORD_TIME_FORMAT).ok()?;
    let time = Local.from_local_datetime(&naive).single()?;
    let bytes: i64 = bytes.parse().ok()?;

    Some(ParsedRecord {
        time,
        identity: identity.to_string(),
        bytes,
    })
}

/// Reads `path` line by line, invoking `f` for each parsed record. Stops at
/// EOF, at the first malformed line (silently — this mirrors the reference
/// scanner's observed behavior rather than skipping and continuing), or
/// once `token` is cancelled. The first I/O error is returned.
pub async fn scan<F, Fut>(path: &Path, token: &CancellationToken, mut f: F) -> io::Result<()>
where
    F: FnMut(ParsedRecord) -> Fut,
    Fut: Future<Output = ()>,
{
    let file = File::open(path).await?;
    let mut reader = BufReader::new(file);
    let mut line = String::new();

    loop {
        if token.is_cancelled() {
            return Ok(());
        }

        line.clear();
        let read = reader.read_line(&mut line).await?;
        if read == 0 {
            return Ok(());
        }

        match parse_record(line.trim_end_matches(['\r', '\n'])) {
            Some(record) => f(record).await,
            None => return Ok(()),
        }
    }
}

/// Like [`scan`], but on EOF polls every 500ms instead of returning,
/// forever following the live file. Detects in-place truncation (the read
/// offset exceeding the file's current size, e.g. the file was replaced)
/// and reseeks to the start; does not follow rename-based rotation.
pub async fn tail<F, Fut>(path: &Path, token: &CancellationToken, mut f: F) -> io::Result<()>
where
    F: FnMut(ParsedRecord) -> Fut,
    Fut: Future<Output = ()>,
{
    let file = File::open(path).await?;
    let mut reader = BufReader::new(file);
    let mut line = String::new();
    let mut offset: u64 = 0;

    loop {
        if token.is_cancelled() {
            return Ok(());
        }

        line.clear();
        let read = reader.read_line(&mut line).await?;

        if read == 0 {
            tokio::select! {
                _ = sleep(TAIL_POLL_INTERVAL) => {}
                _ = token.cancelled() => return Ok(()),
            }

            let current_len = tokio::fs::metadata(path).await?.len();
            if offset > current_len {
                reader.get_mut().seek(io::SeekFrom::Start(0)).await?;
                offset = 0;
            }
            continue;
        }

        offset += read as u64;
        match parse_record(line.trim_end_matches(['\r', '\n'])) {
            Some(record) => f(record).await,
            None => return Ok(()),
        }
    }
}
