// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Append-only traffic log file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

const FILE_PREFIX: &str = "traffic_";
const FILE_STAMP: &str = "%Y-%m-%d_%H-%M-%S";

/// Appends rendered blocks to a log file. Clones share the same file handle,
/// and each `append` lands as one uninterrupted write.
#[derive(Clone)]
pub struct LogWriter {
    path: PathBuf,
    file: Arc<Mutex<tokio::fs::File>>,
}

impl LogWriter {
    pub async fn new<P: Into<PathBuf>>(path: P) -> anyhow::Result<Self> {
        let path: PathBuf = path.into();
        let f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(Self {
            path,
            file: Arc::new(Mutex::new(f)),
        })
    }

    /// Create `dir` if needed and open a fresh timestamped log inside it.
    pub async fn in_dir<P: AsRef<Path>>(dir: P) -> anyhow::Result<Self> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;
        Self::new(dir.join(log_file_name(chrono::Local::now()))).await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, text: &str) -> anyhow::Result<()> {
        let mut file = self.file.lock().await;
        file.write_all(text.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// `traffic_<YYYY-MM-DD_HH-MM-SS>.log`
pub fn log_file_name<Tz>(at: chrono::DateTime<Tz>) -> String
where
    Tz: chrono::TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!("{}{}.log", FILE_PREFIX, at.format(FILE_STAMP))
}
