use tokio_util::sync::CancellationToken;
use crate::download_receiver::DownloadReceiver;
use crate::download_status::DownloadStatus;
use crate::error::DownloadError;

/// Caller-side handle for observing and stopping a running batch download.
pub struct DownloadOperation {
    cancel_token: CancellationToken,
    download_receiver: DownloadReceiver,
}

impl DownloadOperation {
    pub fn new(
        cancel_token: CancellationToken,
        download_receiver: DownloadReceiver) -> DownloadOperation {
        DownloadOperation {
            cancel_token,
            download_receiver,
        }
    }

    pub fn status(&self) -> DownloadStatus {
        DownloadStatus::from(*self.download_receiver.status_receiver.borrow())
    }

    pub fn completed_count(&self) -> u32 {
        *self.download_receiver.completed_count_receiver.borrow()
    }

    pub fn total_count(&self) -> u32 {
        *self.download_receiver.total_count_receiver.borrow()
    }

    pub fn progress(&self) -> f64 {
        if self.total_count() == 0 {
            return 0f64;
        }
        let total_count = self.total_count() as f64;
        let completed_count = self.completed_count() as f64;
        (completed_count / total_count).clamp(0f64, 1f64)
    }

    pub fn error(&self) -> DownloadError {
        self.download_receiver.error_receiver.borrow().clone()
    }

    pub fn is_done(&self) -> bool {
        self.status().is_done()
    }

    pub fn stop(&self) {
        self.cancel_token.cancel();
    }
}
