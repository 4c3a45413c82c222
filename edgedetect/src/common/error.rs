use std::fmt;
use std::io;
use std::path::PathBuf;

/// Direction of a host/device copy, used in transfer failure messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    HostToDevice,
    DeviceToHost,
}

impl fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferDirection::HostToDevice => write!(f, "input image to device"),
            TransferDirection::DeviceToHost => write!(f, "output image from device to host"),
        }
    }
}

/// Which of the two batch list files an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListRole {
    Input,
    Output,
}

impl fmt::Display for ListRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListRole::Input => write!(f, "input"),
            ListRole::Output => write!(f, "output"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid usage: {0}")]
    Usage(String),

    #[error("Error opening {role} file list {}: {source}", .path.display())]
    ListOpen {
        role: ListRole,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Input image {} failed to load: {reason}", .path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("Failed to copy {direction}: {reason}")]
    Transfer {
        direction: TransferDirection,
        reason: String,
    },

    #[error("Filter kernel failed: {0}")]
    Kernel(String),

    #[error("Output image {} could not be written: {reason}", .path.display())]
    Encode { path: PathBuf, reason: String },

    #[error("Invalid buffer: {0}")]
    InvalidBuffer(String),

    #[error("Device error: {0}")]
    Device(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn upload(reason: impl Into<String>) -> Self {
        Error::Transfer {
            direction: TransferDirection::HostToDevice,
            reason: reason.into(),
        }
    }

    pub(crate) fn download(reason: impl Into<String>) -> Self {
        Error::Transfer {
            direction: TransferDirection::DeviceToHost,
            reason: reason.into(),
        }
    }

    /// Returns true for failures that end the whole run rather than one image.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Usage(_) | Error::ListOpen { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
