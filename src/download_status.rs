use std::fmt::{Display, Formatter};

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum DownloadStatus {
    None,
    Pending,
    Download,
    Complete,
    Failed,
    Stop,
}

impl DownloadStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, DownloadStatus::Complete | DownloadStatus::Failed | DownloadStatus::Stop)
    }
}

impl Display for DownloadStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DownloadStatus::None => write!(f, "None"),
            DownloadStatus::Pending => write!(f, "Pending"),
            DownloadStatus::Download => write!(f, "Download"),
            DownloadStatus::Complete => write!(f, "Complete"),
            DownloadStatus::Failed => write!(f, "Failed"),
            DownloadStatus::Stop => write!(f, "Stop"),
        }
    }
}

impl From<DownloadStatus> for u8 {
    fn from(status: DownloadStatus) -> u8 {
        match status {
            DownloadStatus::None => 0,
            DownloadStatus::Pending => 1,
            DownloadStatus::Download => 2,
            DownloadStatus::Complete => 3,
            DownloadStatus::Failed => 4,
            DownloadStatus::Stop => 5,
        }
    }
}

impl From<u8> for DownloadStatus {
    fn from(value: u8) -> Self {
        match value {
            0 => DownloadStatus::None,
            1 => DownloadStatus::Pending,
            2 => DownloadStatus::Download,
            3 => DownloadStatus::Complete,
            4 => DownloadStatus::Failed,
            5 => DownloadStatus::Stop,
            _ => DownloadStatus::None,
        }
    }
}
