use pbxlink_frame::{ErrorKind, FrameError};

/// Errors raised while validating or walking a menu tree.
#[derive(Debug, thiserror::Error)]
pub enum MenuError {
    /// The tree has no selector to match `agi_network_script` against.
    #[error("missing menu selector (agi_network_script)")]
    MissingSelector,

    /// The named entry menu does not exist.
    #[error("missing entry menu '{0}'")]
    MissingEntry(String),

    /// A branch points at a menu that does not exist.
    #[error("menu '{menu}' item {index} branches to unknown menu '{target}'")]
    UnknownBranchTarget {
        menu: String,
        index: usize,
        target: String,
    },

    /// A branch key is not one of `0`-`9`, `*`, `#` or `none`.
    #[error("menu '{menu}' item {index} uses unknown branch key '{key}'")]
    UnknownBranchKey {
        menu: String,
        index: usize,
        key: String,
    },

    /// The menu document is not valid JSON for a menu tree.
    #[error("invalid menu document: {0}")]
    Json(#[from] serde_json::Error),
}

impl MenuError {
    pub fn code(&self) -> &'static str {
        match self {
            MenuError::MissingSelector => "E_AGI_IVR_AGI_NETWORK_SCRIPT",
            MenuError::MissingEntry(_) => "E_AGI_IVR_ENTRY",
            MenuError::UnknownBranchTarget { .. } => "E_AGI_IVR_BRANCH_TARGET",
            MenuError::UnknownBranchKey { .. } => "E_AGI_IVR_BRANCH_KEY",
            MenuError::Json(_) => "E_AGI_IVR_DOCUMENT",
        }
    }
}

/// Errors that can occur in the AGI server role.
#[derive(Debug, thiserror::Error)]
pub enum AgiError {
    /// No listening port was configured.
    #[error("argument 'port' missing")]
    MissingPort,

    /// Failed to bind the listening socket.
    #[error("server error: failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("server error: failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on a connection.
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The peer closed the connection, or it was closed locally.
    #[error("socket closed")]
    ConnectionClosed,

    /// The peer reported that the channel hung up.
    #[error("channel hung up")]
    Hangup,

    /// A command was empty.
    #[error("empty command")]
    EmptyCommand,

    /// A command contained a line break.
    #[error("command must be a single line: {0:?}")]
    MultilineCommand(String),

    /// A command was issued before the previous one resolved.
    #[error("command already in flight: {pending:?}")]
    CommandInFlight { pending: String },

    /// The peer rejected a command with a non-200 status.
    #[error("command {command:?} failed with status {code}")]
    CommandFailed { command: String, code: u16 },

    /// The reply to a command could not be decoded.
    #[error("malformed reply to {command:?}: {raw:?}")]
    MalformedReply { command: String, raw: String },

    /// Menu tree error.
    #[error("menu error: {0}")]
    Menu(#[from] MenuError),
}

impl AgiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgiError::MissingPort
            | AgiError::EmptyCommand
            | AgiError::MultilineCommand(_)
            | AgiError::Menu(_) => ErrorKind::Argument,
            AgiError::Bind { .. }
            | AgiError::Accept(_)
            | AgiError::Io(_)
            | AgiError::ConnectionClosed
            | AgiError::Hangup => ErrorKind::Transport,
            AgiError::Frame(err) => err.kind(),
            AgiError::CommandInFlight { .. } | AgiError::MalformedReply { .. } => {
                ErrorKind::Protocol
            }
            AgiError::CommandFailed { .. } => ErrorKind::CommandFailure,
        }
    }

    /// Stable identifier for this error.
    pub fn code(&self) -> &'static str {
        match self {
            AgiError::MissingPort => "E_AGI_ARGUMENT_PORT",
            AgiError::Bind { .. } | AgiError::Accept(_) => "E_AGI_SERVER_ERROR",
            AgiError::Io(_) => "E_AGI_SOCKET_ERROR",
            AgiError::Frame(err) => err.code(),
            AgiError::ConnectionClosed => "E_AGI_SOCKET_CLOSE",
            AgiError::Hangup => "E_AGI_HANGUP",
            AgiError::EmptyCommand => "E_AGI_COMMAND_EMPTY",
            AgiError::MultilineCommand(_) => "E_AGI_COMMAND_MULTILINE",
            AgiError::CommandInFlight { .. } => "E_AGI_COMMAND_IN_FLIGHT",
            AgiError::CommandFailed { .. } => "E_AGI_COMMAND_FAILED",
            AgiError::MalformedReply { .. } => "E_AGI_REPLY_MALFORMED",
            AgiError::Menu(err) => err.code(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AgiError>;
