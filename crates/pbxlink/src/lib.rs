//! Asterisk gateway (AGI) and manager (AMI) protocols as structured
//! request/response and event streams.
//!
//! # Crate Structure
//!
//! - [`frame`]: Incremental header-block and line framing shared by both roles
//! - [`agi`]: Server role: command channel, menu engine, TCP listener
//! - [`ami`]: Client role: login, correlated actions, event subscriptions

/// Re-export frame types.
pub mod frame {
    pub use pbxlink_frame::*;
}

/// Re-export AGI server types.
pub mod agi {
    pub use pbxlink_agi::*;
}

/// Re-export AMI client types.
pub mod ami {
    pub use pbxlink_ami::*;
}
