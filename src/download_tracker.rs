use tokio::sync::watch::channel;
use crate::download_receiver::DownloadReceiver;
use crate::download_sender::DownloadSender;
use crate::error::DownloadError;

pub fn new() -> (DownloadSender, DownloadReceiver) {
    let (completed_count_sender, completed_count_receiver) = channel(0u32);
    let (total_count_sender, total_count_receiver) = channel(0u32);
    let (status_sender, status_receiver) = channel(0u8);
    let (error_sender, error_receiver) = channel(DownloadError::None);
    let sender = DownloadSender {
        completed_count_sender,
        total_count_sender,
        status_sender,
        error_sender,
    };
    let receiver = DownloadReceiver {
        completed_count_receiver,
        total_count_receiver,
        status_receiver,
        error_receiver,
    };
    (sender, receiver)
}
