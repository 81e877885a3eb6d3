use tokio::sync::watch::Receiver;
use crate::error::DownloadError;

#[derive(Clone)]
pub struct DownloadReceiver {
    pub completed_count_receiver: Receiver<u32>,
    pub total_count_receiver: Receiver<u32>,
    pub status_receiver: Receiver<u8>,
    pub error_receiver: Receiver<DownloadError>,
}
