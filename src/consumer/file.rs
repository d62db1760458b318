use std::path::{Path, PathBuf};

use log::{debug, info};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::consumer::{Disposition, FrameConsumer};
use crate::error::ConsumerError;
use crate::protocol::frame::SensorFrame;

/// Consumer strategy that appends each frame as one JSON line to a file.
///
/// Any pre-existing file of the same name is removed at session start. When
/// a record cap is configured the strategy returns [`Disposition::Stop`]
/// exactly when the cap is reached.
pub struct FileConsumer {
    path: PathBuf,
    file: Option<File>,
    records_written: u64,
    record_cap: Option<u64>,
}

impl FileConsumer {
    /// Open `path` for appending, removing any previous file of that name.
    /// `record_cap` of `None` streams until stopped externally.
    pub async fn create(path: impl AsRef<Path>, record_cap: Option<u64>) -> Result<Self, ConsumerError> {
        let path = path.as_ref().to_path_buf();

        match fs::remove_file(&path).await {
            Ok(()) => debug!("Removed previous output file {}", path.to_string_lossy()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        if let Some(directory) = path.parent() {
            if !directory.as_os_str().is_empty() {
                fs::create_dir_all(directory).await?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        info!("Writing records to {}", path.to_string_lossy());
        Ok(FileConsumer {
            path,
            file: Some(file),
            records_written: 0,
            record_cap,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }
}

impl FrameConsumer for FileConsumer {
    async fn on_frame(&mut self, frame: SensorFrame) -> Result<Disposition, ConsumerError> {
        let file = self.file.as_mut().ok_or(ConsumerError::Callback(
            "file consumer used after finish".to_string(),
        ))?;

        let mut line = frame.to_record_json()?;
        line.push('\n');

        file.write_all(line.as_bytes()).await?;
        self.records_written += 1;
        debug!("wrote record[{}]: {}", self.records_written, frame.epoch);

        match self.record_cap {
            Some(cap) if self.records_written >= cap => Ok(Disposition::Stop),
            _ => Ok(Disposition::Continue),
        }
    }

    async fn finish(&mut self) {
        if let Some(mut file) = self.file.take() {
            if let Err(err) = file.flush().await {
                log::warn!("Failed to flush output file: {:?}", err);
            }
            info!(
                "Closed {} after {} records",
                self.path.to_string_lossy(),
                self.records_written
            );
        }
    }
}
