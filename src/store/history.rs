use std::{future::Future, io::ErrorKind, path::PathBuf};

use anyhow::Result;
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
};
use tracing::{debug, warn};

use super::entities::IntervalRecord;

/// Interface for abstracting storage of the interval history log.
pub trait HistoryStore {
    /// Returns every record in append order, which is chronological by end
    /// time because intervals are only appended when a timer stops.
    fn load(&self) -> impl Future<Output = Result<Vec<IntervalRecord>>> + Send;

    /// Appends one record. Existing records are never touched.
    fn append(&self, record: &IntervalRecord) -> impl Future<Output = Result<()>> + Send;
}

/// The main realization of [HistoryStore]. Records are stored as JSON
/// lines in a single append-only file.
pub struct HistoryStoreImpl {
    path: PathBuf,
}

impl HistoryStoreImpl {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn load_inner(&self) -> std::result::Result<Vec<IntervalRecord>, std::io::Error> {
        debug!("Extracting {:?}", self.path);
        let file = File::open(&self.path).await?;
        file.lock_shared()?;
        let buffer = BufReader::new(file);
        let mut lines = buffer.lines();
        let mut records = vec![];
        while let Ok(Some(v)) = lines.next_line().await {
            match serde_json::from_str::<IntervalRecord>(&v) {
                Ok(v) => records.push(v),
                Err(e) => {
                    // ignore illegal values. Might happen after shutdowns
                    warn!(
                        "During parsing in path {:?} found illegal json string {}:  {e}",
                        self.path, &v
                    )
                }
            }
        }

        lines.into_inner().into_inner().unlock_async().await?;

        Ok(records)
    }
}

impl HistoryStore for HistoryStoreImpl {
    async fn load(&self) -> Result<Vec<IntervalRecord>> {
        match self.load_inner().await {
            Ok(records) => Ok(records),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(vec![]),
            Err(e) => Err(e)?,
        }
    }

    async fn append(&self, record: &IntervalRecord) -> Result<()> {
        let mut file = File::options()
            .append(true)
            .create(true)
            .open(&self.path)
            .await?;

        let mut buffer = serde_json::to_vec(record)?;
        buffer.push(b'\n');

        // Semi-safe acquire-release for a file
        file.lock_exclusive()?;
        let result = async {
            file.write_all(&buffer).await?;
            file.flush().await?;
            Ok::<_, std::io::Error>(())
        }
        .await;
        file.unlock_async().await?;
        result?;
        Ok(())
    }
}
