use std::sync::Arc;
use futures::StreamExt;
use reqwest::Client;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use crate::error::DownloadError;
use crate::stream::Stream;

#[derive(Clone)]
pub struct DownloadTaskConfiguration {
    pub url: Arc<String>,
    pub save_path: Arc<String>,
    pub index: u32,
    pub retry_times_on_failure: u8,
}

pub struct DownloadTask {
    config: DownloadTaskConfiguration,
}

impl DownloadTask {
    pub fn new(config: DownloadTaskConfiguration) -> DownloadTask {
        DownloadTask {
            config,
        }
    }

    pub fn file_path(&self) -> String {
        format!("{}/{}.png", self.config.save_path, self.config.index)
    }

    pub async fn start_download(
        &mut self,
        client: Arc<Client>,
        cancel_token: CancellationToken,
    ) -> crate::error::Result<()> {
        let mut attempt = 0u8;
        loop {
            match self.download_once(&client, &cancel_token).await {
                Ok(()) => return Ok(()),
                Err(DownloadError::Cancelled) => return Err(DownloadError::Cancelled),
                Err(e) => {
                    if attempt >= self.config.retry_times_on_failure {
                        return Err(e);
                    }
                    attempt += 1;
                    tracing::warn!(
                        "image {} failed ({}), retry {}/{}",
                        self.config.index, e, attempt, self.config.retry_times_on_failure
                    );
                }
            }
        }
    }

    async fn download_once(
        &self,
        client: &Client,
        cancel_token: &CancellationToken,
    ) -> crate::error::Result<()> {
        let result = client.get(self.config.url.as_str()).send().await;

        if cancel_token.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                return Err(DownloadError::Request(format!("image {} {}", self.config.index, e)));
            }
        };

        let response = match response.error_for_status() {
            Ok(response) => response,
            Err(e) => {
                return Err(DownloadError::Response(format!("image {} {}", self.config.index, e)));
            }
        };

        let file_path = self.file_path();
        let mut stream = Stream::new(&file_path).await?;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            if cancel_token.is_cancelled() {
                // drop the partial file so a stopped run leaves only complete images
                drop(stream);
                let _ = fs::remove_file(&file_path).await;
                return Err(DownloadError::Cancelled);
            }
            match chunk {
                Ok(bytes) => {
                    stream.write_async(&bytes).await?;
                }
                Err(e) => {
                    return Err(DownloadError::ResponseChunk(format!("image {} {}", self.config.index, e)));
                }
            }
        }
        stream.flush_async().await?;

        Ok(())
    }
}
