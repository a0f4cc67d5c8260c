//! Correlation of outbound actions with inbound responses.
//!
//! [`ActionChannel`] is sans-I/O: [`send`](ActionChannel::send) returns the
//! bytes to write, [`dispatch`](ActionChannel::dispatch) classifies each
//! decoded message. `R` is whatever the caller uses to deliver a response,
//! typically a `oneshot::Sender`.

use std::collections::HashMap;

use bytes::Bytes;
use pbxlink_frame::HeaderBlock;

use crate::action::{Action, ActionIdGenerator, ACTION_ID_KEY};
use crate::error::Result;
use crate::event::{AmiEvent, EVENT_KEY};

/// Header present on every response.
pub const RESPONSE_KEY: &str = "Response";

/// Kind of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageClass {
    /// Has `Response` and `ActionID` but no `Event`.
    Response,
    /// Has `Event`, whatever else it carries.
    Event,
    /// Neither; dropped.
    Other,
}

/// Classify a message. Fields count only when their value is non-empty.
pub fn classify(message: &HeaderBlock) -> MessageClass {
    if message.has(EVENT_KEY) {
        MessageClass::Event
    } else if message.has(RESPONSE_KEY) && message.has(ACTION_ID_KEY) {
        MessageClass::Response
    } else {
        MessageClass::Other
    }
}

/// An action awaiting its response.
#[derive(Debug)]
pub struct PendingAction<R> {
    pub action_id: String,
    pub text: Bytes,
    pub responder: R,
}

/// Serialized action ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub action_id: String,
    pub text: Bytes,
}

/// What an inbound message turned out to be.
#[derive(Debug)]
pub enum Dispatch<R> {
    /// Response to a pending action, now removed from the table.
    Response {
        message: HeaderBlock,
        pending: PendingAction<R>,
    },
    /// Response whose `ActionID` is not pending.
    Unmatched(HeaderBlock),
    Event(AmiEvent),
    Ignored(HeaderBlock),
}

/// Pending-action table plus token generation for one connection.
#[derive(Debug)]
pub struct ActionChannel<R> {
    ids: ActionIdGenerator,
    pending: HashMap<String, PendingAction<R>>,
}

impl<R> Default for ActionChannel<R> {
    fn default() -> Self {
        Self {
            ids: ActionIdGenerator::new(),
            pending: HashMap::new(),
        }
    }
}

impl<R> ActionChannel<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a fresh `ActionID`, serialize and register `action`.
    pub fn send(&mut self, action: &Action, responder: R) -> Result<Outbound> {
        action.validate()?;
        let action_id = self.ids.next_id();
        let text = action.encode(&action_id);
        self.pending.insert(
            action_id.clone(),
            PendingAction {
                action_id: action_id.clone(),
                text: text.clone(),
                responder,
            },
        );
        Ok(Outbound { action_id, text })
    }

    /// Route one decoded message. A matched response leaves the table, so it
    /// can only be delivered once.
    pub fn dispatch(&mut self, message: HeaderBlock) -> Dispatch<R> {
        match classify(&message) {
            MessageClass::Event => match AmiEvent::from_message(message) {
                Ok(event) => Dispatch::Event(event),
                Err(message) => Dispatch::Ignored(message),
            },
            MessageClass::Response => {
                let pending = message
                    .get(ACTION_ID_KEY)
                    .and_then(|id| self.pending.remove(id));
                match pending {
                    Some(pending) => Dispatch::Response { message, pending },
                    None => Dispatch::Unmatched(message),
                }
            }
            MessageClass::Other => Dispatch::Ignored(message),
        }
    }

    pub fn is_pending(&self, action_id: &str) -> bool {
        self.pending.contains_key(action_id)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Remove one pending action without a response.
    pub fn cancel(&mut self, action_id: &str) -> Option<PendingAction<R>> {
        self.pending.remove(action_id)
    }

    /// Remove every pending action, e.g. when the transport closes.
    pub fn drain(&mut self) -> Vec<PendingAction<R>> {
        self.pending.drain().map(|(_, pending)| pending).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pbxlink_frame::parse_header_block;

    fn response(action_id: &str, extra: &str) -> HeaderBlock {
        parse_header_block(&format!(
            "Response: Success\r\nActionID: {action_id}\r\n{extra}"
        ))
    }

    #[test]
    fn classification_order() {
        let both = parse_header_block("Response: Success\nActionID: 1\nEvent: Hangup");
        assert_eq!(classify(&both), MessageClass::Event);
        assert_eq!(classify(&response("1", "")), MessageClass::Response);
        assert_eq!(
            classify(&parse_header_block("Event: Shutdown")),
            MessageClass::Event
        );
        assert_eq!(
            classify(&parse_header_block("Response: Success")),
            MessageClass::Other
        );
        assert_eq!(
            classify(&parse_header_block("Response: Success\nActionID:")),
            MessageClass::Other
        );
    }

    #[test]
    fn out_of_order_responses_reach_their_own_responder() {
        let mut channel = ActionChannel::new();
        let first = channel.send(&Action::new("Ping"), "first").unwrap();
        let second = channel.send(&Action::new("CoreSettings"), "second").unwrap();
        assert_ne!(first.action_id, second.action_id);
        assert_eq!(channel.pending_len(), 2);

        match channel.dispatch(response(&second.action_id, "AMIversion: 5.0")) {
            Dispatch::Response { message, pending } => {
                assert_eq!(pending.responder, "second");
                assert_eq!(message.get("AMIversion"), Some("5.0"));
            }
            other => panic!("unexpected dispatch {other:?}"),
        }
        match channel.dispatch(response(&first.action_id, "Ping: Pong")) {
            Dispatch::Response { pending, .. } => assert_eq!(pending.responder, "first"),
            other => panic!("unexpected dispatch {other:?}"),
        }
        assert_eq!(channel.pending_len(), 0);
    }

    #[test]
    fn response_is_delivered_at_most_once() {
        let mut channel = ActionChannel::new();
        let out = channel.send(&Action::new("Ping"), ()).unwrap();
        assert!(matches!(
            channel.dispatch(response(&out.action_id, "")),
            Dispatch::Response { .. }
        ));
        assert!(matches!(
            channel.dispatch(response(&out.action_id, "")),
            Dispatch::Unmatched(_)
        ));
    }

    #[test]
    fn event_is_dispatched_with_full_message() {
        let mut channel: ActionChannel<()> = ActionChannel::new();
        match channel.dispatch(parse_header_block("Event: Shutdown\nShutdown: Cleanly")) {
            Dispatch::Event(event) => {
                assert_eq!(event.name(), "Shutdown");
                assert_eq!(event.get("Shutdown"), Some("Cleanly"));
            }
            other => panic!("unexpected dispatch {other:?}"),
        }
    }

    #[test]
    fn send_writes_registered_text() {
        let mut channel = ActionChannel::new();
        let out = channel
            .send(&Action::new("Command").field("Command", "core show uptime"), ())
            .unwrap();
        let expected = format!(
            "Action: Command\r\nActionID: {}\r\nCommand: core show uptime\r\n\r\n",
            out.action_id
        );
        assert_eq!(out.text, Bytes::from(expected));
        assert!(channel.is_pending(&out.action_id));
    }

    #[test]
    fn invalid_action_is_not_registered() {
        let mut channel = ActionChannel::new();
        assert!(channel.send(&Action::new(""), ()).is_err());
        assert_eq!(channel.pending_len(), 0);
    }

    #[test]
    fn drain_and_cancel_abandon_pending() {
        let mut channel = ActionChannel::new();
        let a = channel.send(&Action::new("Ping"), 1).unwrap();
        channel.send(&Action::new("Ping"), 2).unwrap();
        assert_eq!(channel.cancel(&a.action_id).map(|p| p.responder), Some(1));
        let drained = channel.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].responder, 2);
        assert_eq!(channel.pending_len(), 0);
    }
}
