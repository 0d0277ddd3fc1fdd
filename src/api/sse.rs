//! Incremental decoder for the chat server's event stream.
//!
//! The transport hands over the body in arbitrary chunks, so the decoder keeps
//! the trailing partial line in a byte buffer and only decodes complete lines.
//! Splitting on `\n` before UTF-8 decoding means a multi-byte character cut in
//! half by a chunk boundary is reassembled before it is ever turned into text.

/// One decoded `(event, data)` unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub event: String,
    /// Raw payload text; multiple `data:` lines are joined with `\n`.
    pub data: String,
}

impl Frame {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
        }
    }
}

/// Pull-style SSE decoder: `feed` bytes in, get complete frames out.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Bytes after the last complete line.
    buffer: Vec<u8>,
    /// Event name of the frame being assembled.
    event: Option<String>,
    data_lines: Vec<String>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one chunk and drain every frame it completes, in arrival order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        // The retained remainder never contains `\n`, so only new bytes need scanning.
        let mut scan = self.buffer.len();
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut line_start = 0;
        while let Some(offset) = self.buffer[scan..].iter().position(|b| *b == b'\n') {
            let line_end = scan + offset;
            let line = String::from_utf8_lossy(&self.buffer[line_start..line_end]).into_owned();
            self.process_line(&line, &mut frames);
            line_start = line_end + 1;
            scan = line_start;
        }
        self.buffer.drain(..line_start);
        frames
    }

    /// Flush whatever is left when the stream closes.
    ///
    /// Servers normally end every frame with a blank line; this recovers
    /// frames cut short of their terminator. A trailing `event:` line closes
    /// the pending frame and opens another, so up to two frames come back.
    pub fn finish(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        if !self.buffer.is_empty() {
            let line = String::from_utf8_lossy(&self.buffer).into_owned();
            self.buffer.clear();
            self.process_line(&line, &mut frames);
        }
        self.flush(&mut frames);
        frames
    }

    /// True when no partial line or half-assembled frame is pending.
    pub fn is_idle(&self) -> bool {
        self.buffer.is_empty() && self.event.is_none() && self.data_lines.is_empty()
    }

    fn process_line(&mut self, raw_line: &str, frames: &mut Vec<Frame>) {
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
        if line.is_empty() {
            self.flush(frames);
            return;
        }
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => {
                // A new event line also closes a frame whose blank line went missing.
                self.flush(frames);
                self.event = Some(value.trim().to_string());
            }
            "data" if self.event.is_some() => self.data_lines.push(value.to_string()),
            _ => {}
        }
    }

    fn flush(&mut self, frames: &mut Vec<Frame>) {
        let data = self.data_lines.join("\n");
        self.data_lines.clear();
        if let Some(event) = self.event.take() {
            frames.push(Frame { event, data });
        }
    }
}

/// Decode a complete stream body in one shot.
pub fn decode_all(body: &[u8]) -> Vec<Frame> {
    let mut decoder = FrameDecoder::new();
    let mut frames = decoder.feed(body);
    frames.extend(decoder.finish());
    frames
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport::sse_event_block;

    fn sample_stream() -> String {
        [
            sse_event_block("token", r#"{"content":"Hel"}"#),
            ": keep-alive\n".to_string(),
            sse_event_block("token", r#"{"content":"lo, wörld 🎧"}"#),
            sse_event_block(
                "tool_call",
                r#"{"name":"search_products","args":{"q":"headphones"}}"#,
            ),
            sse_event_block("done", "{}"),
        ]
        .concat()
    }

    #[test]
    fn feed_whole_stream_yields_frames_in_order() {
        let frames = decode_all(sample_stream().as_bytes());
        let names = frames.iter().map(|f| f.event.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["token", "token", "tool_call", "done"]);
        assert_eq!(frames[1].data, r#"{"content":"lo, wörld 🎧"}"#);
    }

    #[test]
    fn every_two_way_split_matches_single_chunk_decode() {
        let stream = sample_stream();
        let bytes = stream.as_bytes();
        let expected = decode_all(bytes);
        for split in 0..=bytes.len() {
            let mut decoder = FrameDecoder::new();
            let mut frames = decoder.feed(&bytes[..split]);
            frames.extend(decoder.feed(&bytes[split..]));
            frames.extend(decoder.finish());
            assert_eq!(frames, expected, "split at byte {split}");
        }
    }

    #[test]
    fn byte_at_a_time_feed_reassembles_multibyte_chars() {
        let stream = sample_stream();
        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        for byte in stream.as_bytes() {
            frames.extend(decoder.feed(std::slice::from_ref(byte)));
        }
        assert!(decoder.is_idle());
        assert_eq!(frames, decode_all(stream.as_bytes()));
        assert!(frames[1].data.contains("wörld 🎧"));
    }

    #[test]
    fn partial_line_is_withheld_until_newline_arrives() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(b"event: tok").is_empty());
        assert!(decoder.feed(b"en\ndata: {\"content\":").is_empty());
        assert!(decoder.feed(b"\"x\"}\n").is_empty());
        let frames = decoder.feed(b"\n");
        assert_eq!(frames, vec![Frame::new("token", r#"{"content":"x"}"#)]);
        assert!(decoder.is_idle());
    }

    #[test]
    fn crlf_lines_and_multiline_data_are_normalized() {
        let frames = decode_all(b"event: error\r\ndata: {\"message\":\r\ndata: \"boom\"}\r\n\r\n");
        assert_eq!(frames, vec![Frame::new("error", "{\"message\":\n\"boom\"}")]);
    }

    #[test]
    fn new_event_line_closes_frame_without_blank_separator() {
        let frames =
            decode_all(b"event: token\ndata: {\"content\":\"a\"}\nevent: done\ndata: {}\n");
        assert_eq!(
            frames,
            vec![
                Frame::new("token", r#"{"content":"a"}"#),
                Frame::new("done", "{}"),
            ]
        );
    }

    #[test]
    fn data_without_event_and_unknown_fields_are_ignored() {
        let frames = decode_all(b"data: {\"orphan\":true}\n\nid: 7\nevent: done\nretry: 10\n\n");
        assert_eq!(frames, vec![Frame::new("done", "")]);
    }

    #[test]
    fn finish_recovers_unterminated_final_frame() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(b"event: done\ndata: {}").is_empty());
        assert_eq!(decoder.finish(), vec![Frame::new("done", "{}")]);
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn finish_keeps_pending_frame_before_trailing_event_line() {
        let frames = decode_all(b"event: token\ndata: {\"content\":\"x\"}\nevent: done");
        assert_eq!(
            frames,
            vec![
                Frame::new("token", r#"{"content":"x"}"#),
                Frame::new("done", ""),
            ]
        );
    }

    #[cfg(feature = "fuzz-tests")]
    mod prop_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn arbitrary_chunking_preserves_frames(
                payloads in proptest::collection::vec(
                    proptest::string::string_regex("[ -~é漢]{0,24}").expect("regex"),
                    0..8
                ),
                cuts in proptest::collection::vec(any::<prop::sample::Index>(), 0..6)
            ) {
                let mut stream = String::new();
                for (idx, payload) in payloads.iter().enumerate() {
                    stream.push_str(&sse_event_block(&format!("e{idx}"), payload));
                }
                let bytes = stream.as_bytes();
                let expected = decode_all(bytes);

                let mut points = cuts.iter().map(|c| c.index(bytes.len() + 1)).collect::<Vec<_>>();
                points.sort_unstable();
                let mut decoder = FrameDecoder::new();
                let mut frames = Vec::new();
                let mut last = 0;
                for point in points {
                    frames.extend(decoder.feed(&bytes[last..point]));
                    last = point;
                }
                frames.extend(decoder.feed(&bytes[last..]));
                frames.extend(decoder.finish());

                prop_assert_eq!(frames, expected);
            }
        }
    }
}
