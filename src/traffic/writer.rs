use crate::{logging, traffic::rotated_path};
use anyhow::{anyhow, Result};
use chrono::Local;
use log::warn;
use std::path::PathBuf;
use tokio::{
    fs::{File, OpenOptions},
    io::AsyncWriteExt,
};

/// An append-only writer whose backing file transparently swaps to a new
/// date-stamped path once the wall-clock day advances. Not safe for
/// concurrent writers; the traffic reporter is this writer's sole caller.
pub struct RotatingWriter {
    base: PathBuf,
    current_path: Option<PathBuf>,
    file: Option<File>,
}

impl RotatingWriter {
    pub fn new(base: PathBuf) -> RotatingWriter {
        RotatingWriter {
            base,
            current_path: None,
            file: None,
        }
    }

    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        let target = rotated_path(&self.base, Local::now());

        if self.current_path.as_ref() != Some(&target) {
            match OpenOptions::new().create(true).append(true).open(&target).await {
                Ok(file) => {
                    self.file = Some(file);
                    self.current_path = Some(target);
                }
                Err(err) => {
                    // Swallow rotation failures and keep writing to whichever
                    // file was already open, matching the original rotator.
                    logging::log_traffic_rotation_failed!(target.display(), err);
                }
            }
        }

        match self.file.as_mut() {
            Some(file) => {
                file.write_all(line.as_bytes()).await?;
                Ok(())
            }
            None => Err(anyhow!("no traffic log file could be opened at '{}'", target.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile_like_dir::TempDir;

    /// Minimal scratch-directory helper so tests don't depend on the
    /// `tempfile` crate, which isn't part of this crate's dependency set.
    mod tempfile_like_dir {
        use std::{
            path::PathBuf,
            sync::atomic::{AtomicU64, Ordering},
        };

        static COUNTER: AtomicU64 = AtomicU64::new(0);

        pub struct TempDir(pub PathBuf);

        impl TempDir {
            pub fn new(label: &str) -> TempDir {
                let n = COUNTER.fetch_add(1, Ordering::Relaxed);
                let path = std::env::temp_dir().join(format!("lsocks-test-{label}-{n}-{}", std::process::id()));
                std::fs::create_dir_all(&path).unwrap();
                TempDir(path)
            }

            pub fn path(&self) -> &std::path::Path {
                &self.0
            }
        }

        impl Drop for TempDir {
            fn drop(&mut self) {
                let _ = std::fs::remove_dir_all(&self.0);
            }
        }
    }

    #[tokio::test]
    async fn writes_to_todays_rotated_file() {
        let dir = TempDir::new("writer");
        let base = dir.path().join("traffics.log");
        let mut writer = RotatingWriter::new(base.clone());

        writer.write_line("hello\n").await.expect("should write");

        let expected = rotated_path(&base, Local::now());
        let contents = tokio::fs::read_to_string(&expected).await.expect("rotated file should exist");
        assert_eq!("hello\n", contents);
    }

    #[tokio::test]
    async fn appends_across_multiple_writes_same_day() {
        let dir = TempDir::new("writer-append");
        let base = dir.path().join("traffics.log");
        let mut writer = RotatingWriter::new(base.clone());

        writer.write_line("one\n").await.unwrap();
        writer.write_line("two\n").await.unwrap();

        let expected = rotated_path(&base, Local::now());
        let contents = tokio::fs::read_to_string(&expected).await.unwrap();
        assert_eq!("one\ntwo\n", contents);
    }
}
