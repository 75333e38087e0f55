//! Incremental parser for the server-sent events body of a streaming completion.

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseEvent {
    pub(crate) event: Option<String>,
    pub(crate) data: String,
}

/// Buffers raw bytes across network reads and yields complete events.
///
/// Blocks are decoded only once their terminating blank line arrived, so a
/// UTF-8 sequence split between reads is never decoded in halves.
#[derive(Debug, Default)]
pub(crate) struct SseParser {
    buffer: Vec<u8>,
}

impl SseParser {
    pub(crate) fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        // CR never occurs inside a multi-byte sequence.
        self.buffer
            .extend(bytes.iter().copied().filter(|byte| *byte != b'\r'));

        let mut events = Vec::new();
        while let Some(boundary) = find_blank_line(&self.buffer) {
            let block: Vec<u8> = self.buffer.drain(..boundary + 2).collect();

            if let Some(event) = parse_block(&String::from_utf8_lossy(&block[..boundary])) {
                events.push(event);
            }
        }

        events
    }

    /// Flushes a trailing event that was not followed by a blank line.
    pub(crate) fn finish(&mut self) -> Option<SseEvent> {
        let block = std::mem::take(&mut self.buffer);
        parse_block(String::from_utf8_lossy(&block).trim_end_matches('\n'))
    }
}

fn find_blank_line(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|pair| pair == b"\n\n")
}

fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event = None;
    let mut data_lines = Vec::new();

    for line in block.lines() {
        if let Some(value) = line.strip_prefix("event:") {
            event = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.strip_prefix(' ').unwrap_or(value));
        }
    }

    if data_lines.is_empty() {
        return None;
    }

    Some(SseEvent {
        event,
        data: data_lines.join("\n"),
    })
}
