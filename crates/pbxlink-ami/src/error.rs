use pbxlink_frame::{ErrorKind, FrameError};

/// Errors that can occur in the AMI client role.
#[derive(Debug, thiserror::Error)]
pub enum AmiError {
    #[error("argument 'hostname' missing")]
    MissingHostname,

    #[error("argument 'port' missing")]
    MissingPort,

    #[error("argument 'username' missing")]
    MissingUsername,

    #[error("argument 'password' missing")]
    MissingSecret,

    /// Failed to open the TCP connection.
    #[error("could not connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// An I/O error occurred on an established connection.
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The manager closed the connection, or the client was shut down.
    #[error("lost connection to server")]
    ConnectionClosed,

    /// The login response was not `Response: Success`.
    #[error("authentication failed{}", detail_suffix(.message))]
    AuthenticationFailed { message: Option<String> },

    /// An action was built without a name.
    #[error("action name is empty")]
    EmptyActionName,

    /// A field key or value would break the line framing.
    #[error("invalid field {key:?}: keys must be non-empty and fields single-line")]
    InvalidField { key: String },
}

impl AmiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AmiError::MissingHostname
            | AmiError::MissingPort
            | AmiError::MissingUsername
            | AmiError::MissingSecret
            | AmiError::EmptyActionName
            | AmiError::InvalidField { .. } => ErrorKind::Argument,
            AmiError::Connect { .. } | AmiError::Io(_) | AmiError::ConnectionClosed => {
                ErrorKind::Transport
            }
            AmiError::Frame(err) => err.kind(),
            AmiError::AuthenticationFailed { .. } => ErrorKind::Authentication,
        }
    }

    /// Stable identifier for this error.
    pub fn code(&self) -> &'static str {
        match self {
            AmiError::MissingHostname => "E_AMI_ARGUMENT_HOSTNAME",
            AmiError::MissingPort => "E_AMI_ARGUMENT_PORT",
            AmiError::MissingUsername => "E_AMI_ARGUMENT_USERNAME",
            AmiError::MissingSecret => "E_AMI_ARGUMENT_PASSWORD",
            AmiError::Connect { .. } | AmiError::Io(_) => "E_AMI_SOCKED_ERROR",
            AmiError::Frame(err) => err.code(),
            AmiError::ConnectionClosed => "E_AMI_SOCKED_CLOSE",
            AmiError::AuthenticationFailed { .. } => "E_AMI_AUTH_FAILED",
            AmiError::EmptyActionName => "E_AMI_ACTION_NAME",
            AmiError::InvalidField { .. } => "E_AMI_ACTION_FIELD",
        }
    }
}

pub type Result<T> = std::result::Result<T, AmiError>;

fn detail_suffix(message: &Option<String>) -> String {
    match message {
        Some(message) if !message.is_empty() => format!(": {message}"),
        _ => String::new(),
    }
}
