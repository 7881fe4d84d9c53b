//! HTTP response head parsing
//!
//! Only the status line and headers are parsed. Bytes that arrive after the
//! blank line belong to the body and are handed back untouched.

use super::{Error, Headers, ResponseHead, Result, Status, Version, MAX_HEADERS};

/// Find the next CRLF in a buffer
pub(crate) fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Parse HTTP response status line
///
/// Format: VERSION STATUS REASON\r\n
/// Example: HTTP/1.1 200 OK\r\n
pub fn parse_status_line(line: &str) -> Result<(Version, Status, String)> {
    let parts: Vec<&str> = line.splitn(3, ' ').collect();

    if parts.len() < 2 {
        return Err(Error::Parse(format!(
            "Invalid status line: expected at least 2 parts, got {}",
            parts.len()
        )));
    }

    let version = parts[0].parse::<Version>()?;
    let status_code = parts[1]
        .parse::<u16>()
        .map_err(|_| Error::Parse(format!("Invalid status code: {}", parts[1])))?;
    let status = Status::new(status_code)?;
    let reason = if parts.len() == 3 {
        parts[2].to_string()
    } else {
        status.reason_phrase().to_string()
    };

    Ok((version, status, reason))
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ParserState {
    StatusLine,
    Headers,
    Complete,
}

/// HTTP response head parser
pub struct ResponseParser {
    state: ParserState,
    buffer: Vec<u8>,
    status_line: Option<(Version, Status, String)>,
    headers: Headers,
}

impl ResponseParser {
    /// Create a new response parser
    pub fn new() -> Self {
        ResponseParser {
            state: ParserState::StatusLine,
            buffer: Vec::new(),
            status_line: None,
            headers: Headers::new(),
        }
    }

    /// Feed data to the parser
    ///
    /// Returns Ok(Some(head)) once the blank line after the headers has been
    /// seen, Ok(None) if more data is needed, or Err on parse error.
    pub fn parse(&mut self, data: &[u8]) -> Result<Option<ResponseHead>> {
        self.buffer.extend_from_slice(data);

        loop {
            let crlf_pos = match self.state {
                ParserState::Complete => return Ok(None),
                _ => match find_crlf(&self.buffer) {
                    Some(pos) => pos,
                    None => return Ok(None),
                },
            };

            let line = String::from_utf8_lossy(&self.buffer[..crlf_pos]).to_string();
            self.buffer.drain(..crlf_pos + 2);

            match self.state {
                ParserState::StatusLine => {
                    self.status_line = Some(parse_status_line(&line)?);
                    self.state = ParserState::Headers;
                }
                ParserState::Headers if line.is_empty() => {
                    self.state = ParserState::Complete;
                    let (version, status, reason) = self
                        .status_line
                        .take()
                        .ok_or_else(|| Error::Parse("Missing status line".to_string()))?;
                    return Ok(Some(ResponseHead {
                        version,
                        status,
                        reason,
                        headers: std::mem::take(&mut self.headers),
                    }));
                }
                ParserState::Headers => {
                    if self.headers.len() >= MAX_HEADERS {
                        return Err(Error::InvalidHeader(format!(
                            "more than {} response headers",
                            MAX_HEADERS
                        )));
                    }
                    let (name, value) = Headers::parse_header_line(&line)?;
                    self.headers.insert(name, value);
                }
                ParserState::Complete => return Ok(None),
            }
        }
    }

    /// Take the bytes received past the end of the head
    pub fn take_remaining(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }

    /// Reset the parser for reuse
    pub fn reset(&mut self) {
        self.state = ParserState::StatusLine;
        self.buffer.clear();
        self.status_line = None;
        self.headers.clear();
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}
