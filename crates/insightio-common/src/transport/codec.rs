use bytes::{Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::protocol::error::Result;

/// Newline-delimited JSON codec used for streaming RPCs.
///
/// Each message is one JSON document followed by `\n`. Client-streaming
/// calls (`SendEventStream`) send a body of such lines; server-streaming
/// calls (`SubscribeMetrics`) answer with one.
///
/// # Example
///
/// ```
/// use insightio_common::transport::NdjsonCodec;
/// use insightio_common::protocol::Ack;
///
/// let line = NdjsonCodec::encode(&Ack::accepted("ok")).unwrap();
/// assert!(line.ends_with(b"\n"));
///
/// let ack: Ack = NdjsonCodec::decode(&line).unwrap();
/// assert!(ack.ok);
/// ```
pub struct NdjsonCodec;

impl NdjsonCodec {
    /// Content type of an NDJSON body.
    pub const CONTENT_TYPE: &'static str = "application/x-ndjson";

    /// Encodes a message as a single newline-terminated line.
    pub fn encode<T: Serialize>(message: &T) -> Result<Bytes> {
        let mut buf = serde_json::to_vec(message)?;
        buf.push(b'\n');
        Ok(Bytes::from(buf))
    }

    /// Encodes a sequence of messages into one body.
    pub fn encode_all<'a, T, I>(messages: I) -> Result<Bytes>
    where
        T: Serialize + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        let mut buf = Vec::new();
        for message in messages {
            serde_json::to_writer(&mut buf, message)?;
            buf.push(b'\n');
        }
        Ok(Bytes::from(buf))
    }

    /// Decodes one line. Trailing `\r\n` or `\n` is ignored.
    pub fn decode<T: DeserializeOwned>(line: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(trim_line(line))?)
    }
}

/// Incremental splitter turning arbitrarily chunked bytes into lines.
///
/// Network bodies arrive in chunks that need not align with message
/// boundaries; `LineDecoder` buffers the partial tail until the rest of the
/// line shows up. Blank lines are skipped.
///
/// # Example
///
/// ```
/// use insightio_common::transport::LineDecoder;
///
/// let mut decoder = LineDecoder::new();
/// decoder.push(b"{\"a\":1}\n{\"b\"");
/// assert_eq!(decoder.next_line().as_deref(), Some(&b"{\"a\":1}"[..]));
/// assert!(decoder.next_line().is_none());
///
/// decoder.push(b":2}\n");
/// assert_eq!(decoder.next_line().as_deref(), Some(&b"{\"b\":2}"[..]));
/// ```
#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: BytesMut,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk of body bytes.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Pops the next complete, non-blank line without its terminator.
    pub fn next_line(&mut self) -> Option<Bytes> {
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line = self.buf.split_to(pos + 1).freeze();
            let (start, end) = trim_bounds(&line);
            if start < end {
                return Some(line.slice(start..end));
            }
        }
        None
    }

    /// Drains whatever is left once the body has ended.
    ///
    /// A final message is allowed to omit its newline.
    pub fn finish(&mut self) -> Option<Bytes> {
        if let Some(line) = self.next_line() {
            return Some(line);
        }
        let rest = self.buf.split().freeze();
        let (start, end) = trim_bounds(&rest);
        (start < end).then(|| rest.slice(start..end))
    }

    /// Number of buffered bytes not yet returned.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

fn trim_bounds(line: &[u8]) -> (usize, usize) {
    let start = line
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(line.len());
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |p| p + 1);
    (start, end)
}

fn trim_line(line: &[u8]) -> &[u8] {
    let (start, end) = trim_bounds(line);
    &line[start..end]
}
