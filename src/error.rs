use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq)]
pub enum DownloadError {
    None,
    Cancelled,
    InvalidConfig(String),
    Request(String),
    Response(String),
    ResponseChunk(String),
    OpenOrCreateFile(String),
    FileWrite(String),
    FileFlush(String),
    DownloadTask,
}

pub type Result<T> = core::result::Result<T, DownloadError>;

impl DownloadError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DownloadError::Cancelled)
    }
}

impl Display for DownloadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DownloadError::None => { write!(f, "None") }
            DownloadError::Cancelled => { write!(f, "Cancelled") }
            DownloadError::InvalidConfig(message) => {
                write!(f, "InvalidConfig {}", message)
            }
            DownloadError::Request(message) => {
                write!(f, "Request {}", message)
            }
            DownloadError::Response(message) => {
                write!(f, "Response {}", message)
            }
            DownloadError::ResponseChunk(message) => {
                write!(f, "ResponseChunk {}", message)
            }
            DownloadError::OpenOrCreateFile(message) => {
                write!(f, "OpenOrCreateFile {}", message)
            }
            DownloadError::FileWrite(message) => {
                write!(f, "FileWrite {}", message)
            }
            DownloadError::FileFlush(message) => {
                write!(f, "FileFlush {}", message)
            }
            DownloadError::DownloadTask => { write!(f, "DownloadTask") }
        }
    }
}
