use std::fmt;

/// Broad classification shared by every pbxlink error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or invalid caller-supplied configuration or arguments.
    Argument,
    /// Socket, accept, or connect failures, including unexpected closes.
    Transport,
    /// Data from the peer could not be framed or decoded.
    Protocol,
    /// The peer answered a command with a non-success status.
    CommandFailure,
    /// The manager rejected the configured credentials.
    Authentication,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Argument => "argument",
            ErrorKind::Transport => "transport",
            ErrorKind::Protocol => "protocol",
            ErrorKind::CommandFailure => "command_failure",
            ErrorKind::Authentication => "authentication",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while framing a text stream.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Too much data arrived without a line or message terminator.
    #[error("unterminated data exceeds buffer limit ({size} bytes, max {max})")]
    BufferOverflow { size: usize, max: usize },

    /// An I/O error occurred while reading or writing the stream.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FrameError::BufferOverflow { .. } => ErrorKind::Protocol,
            FrameError::Io(_) => ErrorKind::Transport,
        }
    }

    /// Stable identifier for this error.
    pub fn code(&self) -> &'static str {
        match self {
            FrameError::BufferOverflow { .. } => "E_FRAME_BUFFER_OVERFLOW",
            FrameError::Io(_) => "E_FRAME_IO",
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
