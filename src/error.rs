use std::io;

use thiserror::Error;

/// Error kinds shared by the arithmetic, parsing, and cache layers.
///
/// Conversion and overflow failures carry no payload on purpose: callers
/// either propagate them or treat the whole operation as failed, and the
/// offending value is logged at the site that detected it.
#[derive(Debug, Error)]
pub enum StatusError {
    #[error("buffer too small")]
    BufferTooSmall,
    #[error("file not found")]
    FileNotFound,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid JSON")]
    InvalidJson,
    #[error("missing field")]
    MissingField,
    #[error("type mismatch")]
    TypeMismatch,
    #[error("invalid format")]
    InvalidFormat,
    #[error("invalid numeric conversion")]
    InvalidConversion,
    #[error("arithmetic overflow")]
    Overflow,
    #[error("arithmetic underflow")]
    Underflow,
    #[error("division by zero")]
    DivisionByZero,
}

impl StatusError {
    /// Process exit code for this error when it reaches `main`.
    pub fn exit_code(&self) -> u8 {
        match self {
            StatusError::BufferTooSmall | StatusError::FileNotFound | StatusError::Io(_) => 3,
            StatusError::InvalidJson => 4,
            _ => 1,
        }
    }
}
