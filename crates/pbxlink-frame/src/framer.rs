use bytes::BytesMut;

use crate::codec::{EventDecoder, FrameEvent, FramerMode, DEFAULT_MAX_BUFFER};
use crate::error::Result;

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;

/// Configuration for [`MessageFramer`].
#[derive(Debug, Clone)]
pub struct FramerConfig {
    /// Maximum unterminated bytes held before failing. Default: 1 MiB.
    pub max_buffer: usize,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self {
            max_buffer: DEFAULT_MAX_BUFFER,
        }
    }
}

/// Push-style framer: feed byte chunks, get back every complete event.
///
/// Holds only the unconsumed remainder between calls, so a terminator split
/// across two chunks is still found.
#[derive(Debug)]
pub struct MessageFramer {
    buf: BytesMut,
    events: EventDecoder,
}

impl MessageFramer {
    /// Framer for an AGI session: one greeting block, then lines.
    pub fn greeting() -> Self {
        Self::with_config(FramerMode::Greeting, FramerConfig::default())
    }

    /// Framer for an AMI session: a header block per message.
    pub fn messages() -> Self {
        Self::with_config(FramerMode::Messages, FramerConfig::default())
    }

    pub fn with_config(mode: FramerMode, config: FramerConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            events: EventDecoder::new(mode, config.max_buffer),
        }
    }

    /// Append `chunk` and return all events that are now complete, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<FrameEvent>> {
        let mut out = Vec::new();
        if chunk.is_empty() {
            return Ok(out);
        }

        self.buf.extend_from_slice(chunk);
        while let Some(event) = self.events.decode_event(&mut self.buf)? {
            out.push(event);
        }
        Ok(out)
    }

    pub fn mode(&self) -> FramerMode {
        self.events.mode()
    }

    /// True once the greeting block has been emitted.
    pub fn in_body(&self) -> bool {
        self.events.in_body()
    }

    /// Bytes held back waiting for a terminator.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FrameError;
    use crate::header::HeaderBlock;

    const GREETING: &[u8] = b"agi_network_script: app300\r\nagi_channel: SIP/100-0001\r\nno colon here\r\n\r\n";

    fn headers(events: &[FrameEvent]) -> Vec<&HeaderBlock> {
        events
            .iter()
            .filter_map(|event| match event {
                FrameEvent::Headers(block) => Some(block),
                FrameEvent::Line(_) => None,
            })
            .collect()
    }

    #[test]
    fn block_split_across_every_byte_is_emitted_once() {
        let mut framer = MessageFramer::messages();
        let mut events = Vec::new();
        for byte in GREETING {
            events.extend(framer.feed(std::slice::from_ref(byte)).unwrap());
        }

        let blocks = headers(&events);
        assert_eq!(events.len(), 1);
        assert_eq!(blocks[0].get("agi_network_script"), Some("app300"));
        assert_eq!(blocks[0].get("agi_channel"), Some("SIP/100-0001"));
        assert_eq!(blocks[0].len(), 2);
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn split_inside_terminator_is_detected() {
        let mut framer = MessageFramer::messages();
        assert!(framer.feed(b"Event: Shutdown\r\n\r").unwrap().is_empty());
        let events = framer.feed(b"\n").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(headers(&events)[0].get("Event"), Some("Shutdown"));
    }

    #[test]
    fn several_blocks_in_one_chunk() {
        let mut framer = MessageFramer::messages();
        let events = framer
            .feed(b"Event: A\r\n\r\nEvent: B\r\n\r\nEvent: C\r\n\r\nEvent: D")
            .unwrap();
        let names: Vec<_> = headers(&events)
            .iter()
            .map(|block| block.get("Event").unwrap().to_string())
            .collect();
        assert_eq!(names, ["A", "B", "C"]);
        assert_eq!(framer.buffered(), "Event: D".len());
    }

    #[test]
    fn empty_chunk_is_noop() {
        let mut framer = MessageFramer::greeting();
        assert!(framer.feed(b"").unwrap().is_empty());
        assert!(!framer.in_body());
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn greeting_then_lines_in_same_chunk() {
        let mut framer = MessageFramer::greeting();
        let mut chunk = GREETING.to_vec();
        chunk.extend_from_slice(b"200 result=0\n200 result=49 (abcd)\n200 res");

        let events = framer.feed(&chunk).unwrap();
        assert!(framer.in_body());
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], FrameEvent::Headers(_)));
        assert_eq!(events[1], FrameEvent::Line("200 result=0".to_string()));
        assert_eq!(events[2], FrameEvent::Line("200 result=49 (abcd)".to_string()));

        let events = framer.feed(b"ult=1\n").unwrap();
        assert_eq!(events, vec![FrameEvent::Line("200 result=1".to_string())]);
    }

    #[test]
    fn body_lines_are_not_parsed_as_headers() {
        let mut framer = MessageFramer::greeting();
        framer.feed(b"a: b\n\n").unwrap();
        let events = framer.feed(b"Event: Shutdown\n\n").unwrap();
        assert_eq!(
            events,
            vec![
                FrameEvent::Line("Event: Shutdown".to_string()),
                FrameEvent::Line(String::new()),
            ]
        );
    }

    #[test]
    fn identical_input_yields_identical_events() {
        let input: &[u8] =
            b"Response: Success\r\nActionID: 1\r\n\r\nEvent: FullyBooted\r\nStatus: ok\r\n\r\n";
        let mut left = MessageFramer::messages();
        let mut right = MessageFramer::messages();

        let a = left.feed(input).unwrap();
        let mut b = right.feed(&input[..7]).unwrap();
        b.extend(right.feed(&input[7..]).unwrap());

        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn overflow_is_reported() {
        let mut framer =
            MessageFramer::with_config(FramerMode::Messages, FramerConfig { max_buffer: 4 });
        let err = framer.feed(b"Event: endless").unwrap_err();
        assert!(matches!(err, FrameError::BufferOverflow { .. }));
    }
}
