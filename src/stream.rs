use std::path::Path;
use tokio::fs;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use crate::error::DownloadError;

pub struct Stream {
    file: File,
}

impl Stream {
    pub async fn new(path: impl AsRef<Path>) -> crate::error::Result<Stream> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if parent.symlink_metadata().is_err() {
                let _ = fs::create_dir_all(parent).await;
            }
        }
        match OpenOptions::new().
            create(true).
            write(true).
            truncate(true).
            open(path).await {
            Ok(file) => {
                Ok(Stream {
                    file,
                })
            }
            Err(e) => {
                Err(DownloadError::OpenOrCreateFile(format!("{} {}", path.display(), e)))
            }
        }
    }

    pub async fn write_async(&mut self, buffer: &[u8]) -> crate::error::Result<()> {
        if let Err(e) = self.file.write_all(buffer).await {
            return Err(DownloadError::FileWrite(e.to_string()));
        }

        Ok(())
    }

    pub async fn flush_async(&mut self) -> crate::error::Result<()> {
        if let Err(e) = self.file.flush().await {
            return Err(DownloadError::FileFlush(e.to_string()));
        }

        Ok(())
    }
}
