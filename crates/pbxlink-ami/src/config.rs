use std::fmt;

use crate::error::{AmiError, Result};

/// Default manager port (see `manager.conf`).
pub const DEFAULT_PORT: u16 = 5038;

/// Connection and login settings.
#[derive(Clone)]
pub struct AmiConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub secret: String,
    /// Ask the manager to stream events after login (`Events: on`).
    pub events: bool,
}

impl Default for AmiConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            username: String::new(),
            secret: String::new(),
            events: true,
        }
    }
}

impl AmiConfig {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            secret: secret.into(),
            events: true,
        }
    }

    pub fn with_events(mut self, events: bool) -> Self {
        self.events = events;
        self
    }

    /// Check every required setting; called before any socket is opened.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(AmiError::MissingHostname);
        }
        if self.port == 0 {
            return Err(AmiError::MissingPort);
        }
        self.validate_credentials()
    }

    pub fn validate_credentials(&self) -> Result<()> {
        if self.username.is_empty() {
            return Err(AmiError::MissingUsername);
        }
        if self.secret.is_empty() {
            return Err(AmiError::MissingSecret);
        }
        Ok(())
    }

    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Debug for AmiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmiConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .field("events", &self.events)
            .finish()
    }
}
