use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{FrameError, Result};
use crate::header::HeaderBlock;

/// Terminator of a single reply line.
pub const LINE_TERMINATOR: u8 = b'\n';

/// Blank-line terminators that end a header block.
pub const MESSAGE_TERMINATORS: [&[u8]; 2] = [b"\n\n", b"\r\n\r\n"];

const LONGEST_TERMINATOR: usize = 4;

/// Default cap on buffered, not yet terminated data: 1 MiB.
pub const DEFAULT_MAX_BUFFER: usize = 1024 * 1024;

/// One unit produced by the framer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// A parsed blank-line terminated block.
    Headers(HeaderBlock),
    /// A single line with its terminator removed.
    Line(String),
}

/// How a stream is split after its first header block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramerMode {
    /// One greeting block, then bare `\n` separated lines (AGI).
    Greeting,
    /// A header block per message for the lifetime of the stream (AMI).
    Messages,
}

/// Decode one header block from the front of `src`.
///
/// Returns `None` until a terminator is buffered. The earliest of `\n\n` and
/// `\r\n\r\n` wins; the block and its terminator are consumed.
pub fn decode_header_block(src: &mut BytesMut) -> Option<HeaderBlock> {
    split_header_block(src, 0)
}

/// Decode one line from the front of `src`, dropping `\n` and a trailing `\r`.
pub fn decode_line(src: &mut BytesMut) -> Option<String> {
    split_line(src, 0)
}

// `from` is where the terminator search starts; bytes before it are known not to start one.
fn split_header_block(src: &mut BytesMut, from: usize) -> Option<HeaderBlock> {
    let (at, terminator_len) = find_message_end(src, from)?;
    let block = src.split_to(at);
    src.advance(terminator_len);
    Some(parse_header_block(&String::from_utf8_lossy(&block)))
}

fn split_line(src: &mut BytesMut, from: usize) -> Option<String> {
    let at = from + src[from..].iter().position(|b| *b == LINE_TERMINATOR)?;
    let mut line = src.split_to(at + 1);
    line.truncate(at);
    if line.last() == Some(&b'\r') {
        line.truncate(at - 1);
    }
    Some(String::from_utf8_lossy(&line).into_owned())
}

/// Parse the text of a block (terminator already removed).
pub fn parse_header_block(text: &str) -> HeaderBlock {
    text.split('\n')
        .filter(|line| !line.is_empty())
        .filter_map(parse_header_line)
        .collect()
}

/// Split a line on its first `:`. Lines without a colon or with an empty key yield nothing.
pub fn parse_header_line(line: &str) -> Option<(String, String)> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), value.trim().to_string()))
}

/// Append an AGI command and its `\n` terminator.
pub fn encode_command(command: &str, dst: &mut BytesMut) {
    dst.reserve(command.len() + 1);
    dst.put_slice(command.as_bytes());
    dst.put_u8(LINE_TERMINATOR);
}

/// Append one `key: value` line terminated by CRLF.
pub fn encode_field(key: &str, value: &str, dst: &mut BytesMut) {
    dst.reserve(key.len() + value.len() + 4);
    dst.put_slice(key.as_bytes());
    dst.put_slice(b": ");
    dst.put_slice(value.as_bytes());
    dst.put_slice(b"\r\n");
}

/// Append the blank line that closes a message.
pub fn encode_message_end(dst: &mut BytesMut) {
    dst.put_slice(b"\r\n");
}

// Earliest terminator at or after `from`, as (offset, terminator length).
fn find_message_end(buf: &[u8], from: usize) -> Option<(usize, usize)> {
    (from..buf.len()).find_map(|at| {
        MESSAGE_TERMINATORS
            .iter()
            .find(|terminator| buf[at..].starts_with(terminator))
            .map(|terminator| (at, terminator.len()))
    })
}

/// Stateful decoder shared by [`MessageFramer`](crate::MessageFramer) and the codecs.
///
/// Expects the same buffer on every call, only ever appended to between
/// calls; a failed search resumes where the previous one stopped.
#[derive(Debug, Clone)]
pub struct EventDecoder {
    mode: FramerMode,
    in_body: bool,
    max_buffer: usize,
    scanned: usize,
}

impl EventDecoder {
    pub fn new(mode: FramerMode, max_buffer: usize) -> Self {
        Self {
            mode,
            in_body: false,
            max_buffer,
            scanned: 0,
        }
    }

    pub fn mode(&self) -> FramerMode {
        self.mode
    }

    /// True once a greeting-mode stream has switched to line splitting.
    pub fn in_body(&self) -> bool {
        self.in_body
    }

    /// Decode the next event from `src`, or `None` if more data is needed.
    pub fn decode_event(&mut self, src: &mut BytesMut) -> Result<Option<FrameEvent>> {
        let from = self.scanned.min(src.len());
        let event = if self.in_body {
            split_line(src, from).map(FrameEvent::Line)
        } else {
            split_header_block(src, from).map(FrameEvent::Headers)
        };

        let Some(event) = event else {
            self.scanned = if self.in_body {
                src.len()
            } else {
                // A terminator may straddle the end of what has arrived so far.
                src.len().saturating_sub(LONGEST_TERMINATOR - 1)
            };
            if src.len() > self.max_buffer {
                return Err(FrameError::BufferOverflow {
                    size: src.len(),
                    max: self.max_buffer,
                });
            }
            return Ok(None);
        };

        self.scanned = 0;
        if matches!(event, FrameEvent::Headers(_)) && self.mode == FramerMode::Greeting {
            self.in_body = true;
        }
        Ok(Some(event))
    }

    fn discard_remainder(&mut self, src: &mut BytesMut) {
        self.scanned = 0;
        if !src.is_empty() {
            tracing::debug!(bytes = src.len(), "discarding unterminated data at end of stream");
            src.clear();
        }
    }
}

/// Codec for the AGI side: greeting block, then reply lines out, commands in.
#[derive(Debug, Clone)]
pub struct AgiCodec {
    events: EventDecoder,
}

impl AgiCodec {
    pub fn new() -> Self {
        Self::with_max_buffer(DEFAULT_MAX_BUFFER)
    }

    pub fn with_max_buffer(max_buffer: usize) -> Self {
        Self {
            events: EventDecoder::new(FramerMode::Greeting, max_buffer),
        }
    }

    pub fn in_body(&self) -> bool {
        self.events.in_body()
    }
}

impl Default for AgiCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for AgiCodec {
    type Item = FrameEvent;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<FrameEvent>> {
        self.events.decode_event(src)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<FrameEvent>> {
        match self.decode(src)? {
            Some(event) => Ok(Some(event)),
            None => {
                self.events.discard_remainder(src);
                Ok(None)
            }
        }
    }
}

impl<'a> Encoder<&'a str> for AgiCodec {
    type Error = FrameError;

    fn encode(&mut self, command: &'a str, dst: &mut BytesMut) -> Result<()> {
        encode_command(command, dst);
        Ok(())
    }
}

/// Codec for the AMI side: one header block per inbound message.
///
/// Outbound messages are serialized by the caller and written as-is.
#[derive(Debug, Clone)]
pub struct AmiCodec {
    events: EventDecoder,
}

impl AmiCodec {
    pub fn new() -> Self {
        Self::with_max_buffer(DEFAULT_MAX_BUFFER)
    }

    pub fn with_max_buffer(max_buffer: usize) -> Self {
        Self {
            events: EventDecoder::new(FramerMode::Messages, max_buffer),
        }
    }
}

impl Default for AmiCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for AmiCodec {
    type Item = HeaderBlock;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<HeaderBlock>> {
        loop {
            match self.events.decode_event(src)? {
                Some(FrameEvent::Headers(block)) => return Ok(Some(block)),
                // Messages mode never leaves header decoding.
                Some(FrameEvent::Line(_)) => continue,
                None => return Ok(None),
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<HeaderBlock>> {
        match self.decode(src)? {
            Some(block) => Ok(Some(block)),
            None => {
                self.events.discard_remainder(src);
                Ok(None)
            }
        }
    }
}

impl Encoder<Bytes> for AmiCodec {
    type Error = FrameError;

    fn encode(&mut self, message: Bytes, dst: &mut BytesMut) -> Result<()> {
        dst.extend_from_slice(&message);
        Ok(())
    }
}
