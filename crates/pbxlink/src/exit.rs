use std::fmt;
use std::io;

use pbxlink_agi::{AgiError, MenuError};
use pbxlink_ami::AmiError;
use pbxlink_frame::ErrorKind;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const AUTH_FAILED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn kind_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Argument => USAGE,
        ErrorKind::Transport => TRANSPORT_ERROR,
        ErrorKind::Protocol => DATA_INVALID,
        ErrorKind::CommandFailure => FAILURE,
        ErrorKind::Authentication => AUTH_FAILED,
    }
}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::InvalidInput => USAGE,
        io::ErrorKind::PermissionDenied => AUTH_FAILED,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn agi_error(context: &str, err: AgiError) -> CliError {
    CliError::new(
        kind_code(err.kind()),
        format!("{context}: [{}] {err}", err.code()),
    )
}

pub fn menu_error(context: &str, err: MenuError) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: [{}] {err}", err.code()))
}

pub fn ami_error(context: &str, err: AmiError) -> CliError {
    CliError::new(
        kind_code(err.kind()),
        format!("{context}: [{}] {err}", err.code()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_distinct_codes() {
        assert_eq!(ami_error("x", AmiError::MissingUsername).code, USAGE);
        assert_eq!(
            ami_error("x", AmiError::AuthenticationFailed { message: None }).code,
            AUTH_FAILED
        );
        assert_eq!(ami_error("x", AmiError::ConnectionClosed).code, TRANSPORT_ERROR);
        assert_eq!(
            agi_error(
                "x",
                AgiError::CommandFailed {
                    command: "ANSWER".to_string(),
                    code: 510
                }
            )
            .code,
            FAILURE
        );
    }

    #[test]
    fn message_carries_stable_code() {
        let err = agi_error("bind failed", AgiError::MissingPort);
        assert_eq!(err.code, USAGE);
        assert!(err.message.contains("E_AGI_ARGUMENT_PORT"));
    }
}
