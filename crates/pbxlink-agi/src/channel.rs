//! Single-outstanding command state machine for one AGI connection.
//!
//! The channel does no I/O. The connection registers a command with
//! [`CommandChannel::begin`], writes it, then feeds every reply line to
//! [`CommandChannel::on_line`] until a [`LineOutcome::Reply`] comes back.

use crate::error::{AgiError, Result};
use crate::reply::{decode_reply, Reply};

/// Reply line announcing that the channel hung up (compared case-insensitively).
pub const HANGUP_LINE: &str = "hangup";

/// Prefix of the first line of a multi-line usage error.
pub const CONTINUATION_START: &str = "520-Invalid";

/// Substring of the last line of a multi-line usage error.
pub const CONTINUATION_END: &str = "520 End of proper";

/// The command awaiting its reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    command: String,
    raw: String,
}

impl PendingCommand {
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Reply text accumulated so far.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// What a reply line meant for the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// The peer hung up. The pending command (if any) is dropped unanswered.
    Hangup,
    /// Part of a multi-line reply; keep reading.
    Continue,
    /// The pending command resolved.
    Reply { command: String, reply: Reply },
    /// A line arrived with no command in flight.
    Unsolicited(String),
}

/// Queue-of-one command/reply correlation.
#[derive(Debug, Default)]
pub struct CommandChannel {
    pending: Option<PendingCommand>,
    continuation: bool,
}

impl CommandChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `command` as the one in flight.
    ///
    /// Fails with [`AgiError::CommandInFlight`] while an earlier command is
    /// still unresolved, so that reply is never lost.
    pub fn begin(&mut self, command: &str) -> Result<()> {
        validate_command(command)?;
        if let Some(pending) = &self.pending {
            return Err(AgiError::CommandInFlight {
                pending: pending.command.clone(),
            });
        }

        self.pending = Some(PendingCommand {
            command: command.to_string(),
            raw: String::new(),
        });
        Ok(())
    }

    pub fn pending(&self) -> Option<&PendingCommand> {
        self.pending.as_ref()
    }

    pub fn in_continuation(&self) -> bool {
        self.continuation
    }

    /// Drop the pending command without resolving it.
    pub fn abandon(&mut self) -> Option<PendingCommand> {
        self.continuation = false;
        self.pending.take()
    }

    /// Feed one reply line (terminator already removed).
    pub fn on_line(&mut self, line: &str) -> LineOutcome {
        if line.eq_ignore_ascii_case(HANGUP_LINE) {
            self.abandon();
            return LineOutcome::Hangup;
        }

        let starts_continuation = line.starts_with(CONTINUATION_START);
        if starts_continuation {
            self.continuation = true;
        }

        let Some(pending) = self.pending.as_mut() else {
            if self.continuation && line.contains(CONTINUATION_END) {
                self.continuation = false;
            }
            return LineOutcome::Unsolicited(line.to_string());
        };

        if self.continuation {
            if starts_continuation {
                pending.raw.clear();
            }
            pending.raw.push_str(line);
            pending.raw.push('\n');
            if !line.contains(CONTINUATION_END) {
                return LineOutcome::Continue;
            }
            self.continuation = false;
        } else {
            pending.raw = line.to_string();
        }

        match self.pending.take() {
            Some(PendingCommand { command, raw }) => LineOutcome::Reply {
                command,
                reply: decode_reply(&raw),
            },
            None => LineOutcome::Unsolicited(line.to_string()),
        }
    }
}

fn validate_command(command: &str) -> Result<()> {
    if command.trim().is_empty() {
        return Err(AgiError::EmptyCommand);
    }
    if command.contains(['\n', '\r']) {
        return Err(AgiError::MultilineCommand(command.to_string()));
    }
    Ok(())
}
