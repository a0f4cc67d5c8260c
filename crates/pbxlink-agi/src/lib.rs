//! Server role of the Asterisk Gateway Interface (FastAGI).
//!
//! A PBX connects, sends a greeting block of `agi_*` variables, and then
//! waits for commands. Each command gets exactly one reply line
//! (`200 result=49 (abcd)`), or a multi-line `520` usage error.
//!
//! Layers, bottom up:
//! - [`reply`] decodes reply text into a [`Reply`]
//! - [`channel::CommandChannel`] correlates one in-flight command with its reply lines
//! - [`menu`] holds immutable [`MenuTree`]s and the [`MenuCursor`] that walks them
//! - [`AgiConnection`] and [`run_menu`] drive those over a tokio stream
//! - [`AgiServer`] listens on TCP and dispatches connections by `agi_network_script`

pub mod channel;
pub mod connection;
pub mod engine;
pub mod error;
pub mod menu;
pub mod reply;
pub mod server;

pub use channel::{CommandChannel, LineOutcome, PendingCommand};
pub use connection::{AgiConnection, NETWORK_SCRIPT_VARIABLE};
pub use engine::{run_menu, MenuOutcome};
pub use error::{AgiError, MenuError, Result};
pub use menu::{
    BranchKey, MenuCursor, MenuItem, MenuItemConfig, MenuTree, MenuTreeConfig, Transition,
    DEFAULT_ENTRY,
};
pub use reply::{decode_reply, DecodedReply, Reply, SUCCESS_CODE};
pub use server::{AgiServer, AgiServerConfig, MenuRegistry};
