//! Incremental HTTP/1.1 request framer.
//!
//! ```text
//! push(bytes) ─► buffered > ceiling? ──yes──► TooLarge
//!                     │ no
//!                     ▼
//!            ┌─ Head: scan for CRLFCRLF ─ not found ─► Incomplete
//!            │        │ found
//!            │        ▼ parse request line + headers ─ bad ─► Malformed
//!            ├─ head + Content-Length > ceiling ─► TooLarge
//!            └─ Body: buffered ≥ head + Content-Length ─ no ─► Incomplete
//!                     │ yes
//!                     ▼
//!                  Complete(ParsedRequest)
//! ```
//!
//! Feeding the same bytes in any chunking yields the same result. The
//! header terminator scan resumes where the previous push stopped, so each
//! byte is scanned at most a constant number of times.

use std::collections::HashMap;

/// Total buffered input above which a request is rejected with 413.
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 2_000_000;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// One framed request. Header keys are lower-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl ParsedRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Path with any query string removed.
    pub fn route_path(&self) -> &str {
        self.path
            .split_once('?')
            .map_or(self.path.as_str(), |(path, _)| path)
    }
}

/// Result of feeding bytes to a [`RequestFramer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameStatus {
    /// Keep reading.
    Incomplete,
    Complete(ParsedRequest),
    /// Unparseable request line or non-UTF-8 head; close without a response.
    Malformed,
    /// Buffered input exceeded the ceiling; answer 413.
    TooLarge,
}

#[derive(Debug)]
enum State {
    Head {
        scanned: usize,
    },
    Body {
        method: String,
        path: String,
        headers: HashMap<String, String>,
        body_start: usize,
        body_end: usize,
    },
    Done(FrameStatus),
}

/// Per-connection framing state. Single use: once a terminal status is
/// produced, later pushes return it again.
#[derive(Debug)]
pub struct RequestFramer {
    buffer: Vec<u8>,
    max_bytes: usize,
    state: State,
}

impl Default for RequestFramer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUEST_BYTES)
    }
}

impl RequestFramer {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_bytes,
            state: State::Head { scanned: 0 },
        }
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Append `bytes` and advance as far as the buffered input allows.
    pub fn push(&mut self, bytes: &[u8]) -> FrameStatus {
        if let State::Done(status) = &self.state {
            return status.clone();
        }

        self.buffer.extend_from_slice(bytes);
        if self.buffer.len() > self.max_bytes {
            return self.finish(FrameStatus::TooLarge);
        }

        if let State::Head { scanned } = self.state {
            let from = scanned.saturating_sub(HEADER_TERMINATOR.len() - 1);
            let Some(offset) = find_terminator(&self.buffer[from..]) else {
                self.state = State::Head {
                    scanned: self.buffer.len(),
                };
                return FrameStatus::Incomplete;
            };
            let head_end = from + offset;
            match parse_head(&self.buffer[..head_end]) {
                Some((method, path, headers)) => {
                    let content_length = headers
                        .get("content-length")
                        .and_then(|v| v.parse::<usize>().ok())
                        .unwrap_or(0);
                    let body_start = head_end + HEADER_TERMINATOR.len();
                    let body_end = match body_start.checked_add(content_length) {
                        Some(end) if end <= self.max_bytes => end,
                        _ => return self.finish(FrameStatus::TooLarge),
                    };
                    self.state = State::Body {
                        method,
                        path,
                        headers,
                        body_start,
                        body_end,
                    };
                }
                None => return self.finish(FrameStatus::Malformed),
            }
        }

        let State::Body {
            body_start,
            body_end,
            ..
        } = self.state
        else {
            return FrameStatus::Incomplete;
        };
        if self.buffer.len() < body_end {
            return FrameStatus::Incomplete;
        }
        let body = self.buffer[body_start..body_end].to_vec();

        let state = std::mem::replace(&mut self.state, State::Head { scanned: 0 });
        let State::Body {
            method,
            path,
            headers,
            ..
        } = state
        else {
            return FrameStatus::Incomplete;
        };
        self.finish(FrameStatus::Complete(ParsedRequest {
            method,
            path,
            headers,
            body,
        }))
    }

    fn finish(&mut self, status: FrameStatus) -> FrameStatus {
        self.state = State::Done(status.clone());
        status
    }
}

fn find_terminator(haystack: &[u8]) -> Option<usize> {
    haystack
        .windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
}

type Head = (String, String, HashMap<String, String>);

fn parse_head(head: &[u8]) -> Option<Head> {
    let text = std::str::from_utf8(head).ok()?;
    let mut lines = text.split("\r\n");

    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();

    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_ascii_lowercase(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect();

    Some((method, path, headers))
}
