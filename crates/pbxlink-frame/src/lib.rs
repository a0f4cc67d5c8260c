//! Incremental framing for Asterisk's telnet-style text protocols.
//!
//! Both the gateway interface (AGI) and the manager interface (AMI) speak
//! UTF-8 text in `key: value` lines, grouped into blocks that end with a
//! blank line (`\n\n` or `\r\n\r\n`). AGI sends one such block as a greeting
//! and then switches to single reply lines; AMI sends a block per message.
//!
//! This crate turns arbitrary byte chunks into those units:
//! - [`MessageFramer`]: `feed(bytes)` style framer with no I/O
//! - [`AgiCodec`] / [`AmiCodec`]: `tokio_util::codec` adapters over the same rules
//!
//! Partial data is held until its terminator arrives and is never emitted.

pub mod codec;
pub mod error;
pub mod framer;
pub mod header;

pub use codec::{
    decode_header_block, decode_line, encode_command, encode_field, encode_message_end,
    parse_header_block, parse_header_line, AgiCodec, AmiCodec, EventDecoder, FrameEvent,
    FramerMode, DEFAULT_MAX_BUFFER, LINE_TERMINATOR, MESSAGE_TERMINATORS,
};
pub use error::{ErrorKind, FrameError, Result};
pub use framer::{FramerConfig, MessageFramer};
pub use header::HeaderBlock;
