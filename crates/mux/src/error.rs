//! Muxer error types.

use thiserror::Error;

/// Errors that can occur during MP4 stream writing.
#[derive(Error, Debug)]
pub enum MuxError {
    /// I/O error against the sink.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The writer was closed twice.
    #[error("Stream writer already closed")]
    AlreadyClosed,
}

/// Convenience Result type for mux operations.
pub type MuxResult<T> = Result<T, MuxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mux_error_display_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "sink gone");
        let mux_err = MuxError::from(io_err);
        assert!(mux_err.to_string().contains("IO error"));
        assert!(mux_err.to_string().contains("sink gone"));
    }

    #[test]
    fn mux_error_display_closed() {
        assert_eq!(
            MuxError::AlreadyClosed.to_string(),
            "Stream writer already closed"
        );
    }
}
