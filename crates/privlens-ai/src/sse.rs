//! Incremental server-sent-events line decoder.
//!
//! Network chunks split events at arbitrary byte offsets, including inside a
//! UTF-8 sequence, so bytes are buffered until a full line is available.

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SseEvent {
    Data(String),
    Done,
}

#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    /// Feed a chunk, returning every event completed by it.
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buf.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            events.extend(parse_line(&line));
        }
        events
    }

    /// Flush a final line that arrived without a trailing newline.
    pub(crate) fn finish(&mut self) -> Vec<SseEvent> {
        let rest = std::mem::take(&mut self.buf);
        parse_line(&rest).into_iter().collect()
    }
}

fn parse_line(line: &[u8]) -> Option<SseEvent> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches(['\r', '\n']);
    // Comments (": keep-alive"), `event:`/`id:` fields and blank separators carry no data.
    let data = line.strip_prefix("data:")?;
    let data = data.strip_prefix(' ').unwrap_or(data);
    match data {
        "" => None,
        "[DONE]" => Some(SseEvent::Done),
        _ => Some(SseEvent::Data(data.to_string())),
    }
}
