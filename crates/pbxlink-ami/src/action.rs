use bytes::{Bytes, BytesMut};
use pbxlink_frame::{encode_field, encode_message_end};
use uuid::Uuid;

use crate::error::{AmiError, Result};

/// Header naming the action.
pub const ACTION_KEY: &str = "Action";

/// Header carrying the correlation token.
pub const ACTION_ID_KEY: &str = "ActionID";

/// A named manager action with its fields.
///
/// `Action` and `ActionID` are always written first and cannot be
/// overridden; fields with empty values are left out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    name: String,
    fields: Vec<(String, String)>,
}

impl Action {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Add a field. A repeated key replaces the earlier value in place.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if value.is_empty() || key == ACTION_KEY || key == ACTION_ID_KEY {
            return;
        }
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Reject names and fields that would corrupt the framing.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AmiError::EmptyActionName);
        }
        if has_line_break(&self.name) {
            return Err(AmiError::InvalidField {
                key: ACTION_KEY.to_string(),
            });
        }
        for (key, value) in &self.fields {
            if key.trim().is_empty()
                || key.contains(':')
                || has_line_break(key)
                || has_line_break(value)
            {
                return Err(AmiError::InvalidField { key: key.clone() });
            }
        }
        Ok(())
    }

    /// Serialize with `action_id`, CRLF line endings and a closing blank line.
    pub fn encode(&self, action_id: &str) -> Bytes {
        let mut dst = BytesMut::new();
        encode_field(ACTION_KEY, &self.name, &mut dst);
        encode_field(ACTION_ID_KEY, action_id, &mut dst);
        for (key, value) in &self.fields {
            encode_field(key, value, &mut dst);
        }
        encode_message_end(&mut dst);
        dst.freeze()
    }
}

fn has_line_break(text: &str) -> bool {
    text.contains(|c: char| c == '\n' || c == '\r')
}

/// Source of correlation tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionIdGenerator;

impl ActionIdGenerator {
    pub fn new() -> Self {
        Self
    }

    /// A fresh random (version 4) UUID in hyphenated lowercase form.
    pub fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}
