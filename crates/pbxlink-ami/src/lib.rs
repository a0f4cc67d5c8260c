//! Client role of the Asterisk Manager Interface.
//!
//! The client logs in once, then multiplexes any number of named actions
//! over one connection. Each action carries a unique `ActionID`; the
//! manager echoes it on the response, which is how replies find their
//! caller. Messages with an `Event` field are unsolicited and fan out to
//! subscribers instead.
//!
//! ```no_run
//! use pbxlink_ami::{Action, AmiClient, AmiConfig};
//!
//! # async fn run() -> pbxlink_ami::Result<()> {
//! let client = AmiClient::connect(&AmiConfig::new("127.0.0.1", 5038, "admin", "secret")).await?;
//! let mut shutdown = client.subscribe("Shutdown");
//! let settings = client.send(Action::new("CoreSettings")).await?;
//! println!("{:?}", settings.get("AsteriskVersion"));
//! let event = shutdown.recv().await?;
//! println!("{}", event.topic());
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod event;

pub use action::{Action, ActionIdGenerator, ACTION_ID_KEY, ACTION_KEY};
pub use channel::{
    classify, ActionChannel, Dispatch, MessageClass, Outbound, PendingAction, RESPONSE_KEY,
};
pub use client::{AmiClient, LOGIN_SUCCESS};
pub use config::{AmiConfig, DEFAULT_PORT};
pub use error::{AmiError, Result};
pub use event::{AmiEvent, EventSubscription, ANY_EVENT_TOPIC, EVENT_KEY, EVENT_PREFIX};
