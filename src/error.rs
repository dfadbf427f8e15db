//! Error types for shadekit

use std::fmt;
use std::io;

/// Result type for shadekit operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in shadekit operations
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(io::Error),

    /// DEM source with an invalid layout (wrong size, bad header)
    InvalidDem(String),

    /// Unsupported container or feature
    Unsupported(String),

    /// Rendering was stopped cooperatively
    Cancelled,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::InvalidDem(msg) => write!(f, "Invalid DEM: {}", msg),
            Error::Unsupported(msg) => write!(f, "Unsupported: {}", msg),
            Error::Cancelled => write!(f, "Rendering cancelled"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Error::Io(error)
    }
}
