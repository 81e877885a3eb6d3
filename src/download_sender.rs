use tokio::sync::watch::Sender;
use crate::error::DownloadError;

pub struct DownloadSender {
    pub completed_count_sender: Sender<u32>,
    pub total_count_sender: Sender<u32>,
    pub status_sender: Sender<u8>,
    pub error_sender: Sender<DownloadError>,
}
