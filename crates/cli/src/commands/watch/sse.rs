//! Minimal Server-Sent Events reader.
//!
//! Handles the subset the bookmark feed emits: `event:`, `data:` and `id:`
//! fields, comment lines (keep-alives), and frames split across chunks.

use async_stream::stream;
use futures::{Stream, StreamExt};

/// One decoded SSE frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    /// Event name; `None` means the default `message` event.
    pub event: Option<String>,
    /// Data lines joined with `\n`.
    pub data: String,
    /// Last event id, if sent.
    pub id: Option<String>,
}

/// Errors reading the event stream.
#[derive(Debug, thiserror::Error)]
pub enum SseError {
    /// The connection failed mid-stream.
    #[error("stream error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A frame was not valid UTF-8.
    #[error("invalid UTF-8 in event stream")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Take one complete raw frame off the front of `buffer`.
///
/// Returns `None` (leaving the buffer untouched) until a blank line
/// terminates the frame.
fn extract_frame(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let end = buffer.windows(2).position(|w| w == b"\n\n")?;
    let rest = buffer.split_off(end + 2);
    let mut frame = std::mem::replace(buffer, rest);
    frame.truncate(end);
    Some(frame)
}

/// Parse a raw frame. Comment-only frames yield `None`.
fn parse_frame(raw: &str) -> Option<SseFrame> {
    let mut frame = SseFrame::default();
    let mut data_lines: Vec<&str> = Vec::new();
    let mut seen = false;

    for line in raw.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() || line.starts_with(':') {
            continue;
        }

        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);

        match field {
            "event" => frame.event = Some(value.to_string()),
            "data" => data_lines.push(value),
            "id" => frame.id = Some(value.to_string()),
            _ => continue,
        }
        seen = true;
    }

    if !seen {
        return None;
    }
    frame.data = data_lines.join("\n");
    Some(frame)
}

/// Decode a byte stream into SSE frames.
///
/// A transport error is yielded once and ends the stream.
pub fn frames<S, B>(bytes: S) -> impl Stream<Item = Result<SseFrame, SseError>>
where
    S: Stream<Item = Result<B, reqwest::Error>>,
    B: AsRef<[u8]>,
{
    stream! {
        let mut buffer: Vec<u8> = Vec::new();
        let mut bytes = std::pin::pin!(bytes);

        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(chunk) => {
                    buffer.extend_from_slice(chunk.as_ref());
                    while let Some(raw) = extract_frame(&mut buffer) {
                        match String::from_utf8(raw) {
                            Ok(text) => {
                                if let Some(frame) = parse_frame(&text) {
                                    yield Ok(frame);
                                }
                            }
                            Err(e) => yield Err(SseError::Utf8(e)),
                        }
                    }
                }
                Err(e) => {
                    yield Err(SseError::Transport(e));
                    break;
                }
            }
        }
    }
}
