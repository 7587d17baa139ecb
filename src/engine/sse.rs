//! # engine::sse
//!
//! Incremental decoder for a `text/event-stream` body.
//!
//! Network chunks do not respect event boundaries, so bytes are buffered until
//! a blank line closes an event. Only `data:` fields matter to the feed;
//! comments (`:`), `event:`, `id:` and `retry:` lines are skipped. Multiple
//! `data:` lines within one event are joined with `\n`.

#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk; returns the `data` payload of every event it completed.
    ///
    /// Text is decoded per complete event, so a multi-byte character or a
    /// `\r\n` pair split across chunks survives intact.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(end) = event_end(&self.pending) {
            let block: Vec<u8> = self.pending.drain(..end).collect();
            let text = String::from_utf8_lossy(&block).replace("\r\n", "\n").replace('\r', "\n");
            if let Some(data) = data_of(&text) {
                events.push(data);
            }
        }
        events
    }
}

/// Offset just past the blank line that closes the first buffered event.
/// Lines end in `\n`, `\r\n` or a lone `\r`; a trailing `\r` waits for the
/// next byte before it counts.
fn event_end(buf: &[u8]) -> Option<usize> {
    let mut line_start = 0;
    let mut i = 0;
    while i < buf.len() {
        let next = match buf[i] {
            b'\n' => i + 1,
            b'\r' if i + 1 == buf.len() => return None,
            b'\r' if buf[i + 1] == b'\n' => i + 2,
            b'\r' => i + 1,
            _ => {
                i += 1;
                continue;
            }
        };
        if i == line_start {
            return Some(next);
        }
        line_start = next;
        i = next;
    }
    None
}

fn data_of(block: &str) -> Option<String> {
    let lines: Vec<&str> = block
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}
