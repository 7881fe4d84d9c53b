//! Live response body
//!
//! The body is read straight from the connection as the caller pulls it.
//! Nothing is buffered beyond what arrived together with the response head.

use super::chunked::ChunkedDecoder;
use super::message::{Method, ResponseHead};
use super::session::{HttpSession, SessionOps};
use super::{Error, Result};
use bytes::{Buf, BytesMut};
use std::io::{self, Read};

const READ_SIZE: usize = 8192;

/// How the end of the body is found
#[derive(Debug)]
pub(crate) enum Framing {
    /// No body at all (HEAD, 1xx, 204, 304)
    Empty,
    /// `Content-Length` bytes remain
    Length(u64),
    /// `Transfer-Encoding: chunked`
    Chunked(ChunkedDecoder),
    /// Everything until the server closes the connection
    UntilClose,
}

impl Framing {
    /// Pick the framing for a response to `method`
    pub(crate) fn for_response(method: Method, head: &ResponseHead) -> Result<Framing> {
        if method == Method::Head || head.status().is_bodiless() {
            return Ok(Framing::Empty);
        }

        let chunked = head
            .headers()
            .get_all("Transfer-Encoding")
            .iter()
            .any(|v| v.split(',').any(|c| c.trim().eq_ignore_ascii_case("chunked")));
        if chunked {
            return Ok(Framing::Chunked(ChunkedDecoder::new()));
        }

        match head.headers().get("Content-Length") {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .map(Framing::Length)
                .map_err(|_| Error::InvalidHeader(format!("Content-Length: {}", value))),
            None => Ok(Framing::UntilClose),
        }
    }
}

/// Reader over a response body
///
/// Reading past the declared end returns 0. A connection that closes before
/// a `Content-Length` or chunked body is complete yields
/// `ErrorKind::UnexpectedEof`.
pub struct BodyReader<S: SessionOps> {
    session: HttpSession<S>,
    pending: BytesMut,
    framing: Framing,
    done: bool,
}

impl<S: SessionOps> BodyReader<S> {
    pub(crate) fn new(session: HttpSession<S>, framing: Framing, pending: Vec<u8>) -> Self {
        let done = matches!(framing, Framing::Empty | Framing::Length(0));
        BodyReader {
            session,
            pending: BytesMut::from(&pending[..]),
            framing,
            done,
        }
    }

    /// Whether the whole body has been read
    pub fn is_finished(&self) -> bool {
        self.done
    }

    /// Read the rest of the body into memory
    pub fn read_to_vec(&mut self) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        self.read_to_end(&mut body)?;
        Ok(body)
    }

    /// Fill `buf` from pending bytes first, then from the connection
    fn read_raw(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.pending.is_empty() {
            let n = buf.len().min(self.pending.len());
            buf[..n].copy_from_slice(&self.pending[..n]);
            self.pending.advance(n);
            return Ok(n);
        }
        self.session.read(buf)
    }

    fn read_chunked(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            if !self.pending.is_empty() {
                let Framing::Chunked(decoder) = &mut self.framing else {
                    return Err(Error::Protocol("chunked read on non-chunked body".to_string()));
                };
                let (consumed, decoded, complete) = decoder.decode(&self.pending, buf)?;
                self.pending.advance(consumed);
                if complete {
                    self.done = true;
                }
                if decoded > 0 || complete {
                    return Ok(decoded);
                }
                if consumed > 0 {
                    continue;
                }
            }

            let mut temp = [0u8; READ_SIZE];
            let n = self.session.read(&mut temp)?;
            if n == 0 {
                return Err(Error::Incomplete);
            }
            self.pending.extend_from_slice(&temp[..n]);
        }
    }
}

impl<S: SessionOps> Read for BodyReader<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.done || buf.is_empty() {
            return Ok(0);
        }

        match self.framing {
            Framing::Empty => Ok(0),
            Framing::Length(remaining) => {
                let limit = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
                let n = self.read_raw(&mut buf[..limit])?;
                if n == 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("connection closed with {} body bytes outstanding", remaining),
                    ));
                }
                let remaining = remaining - n as u64;
                self.framing = Framing::Length(remaining);
                self.done = remaining == 0;
                Ok(n)
            }
            Framing::Chunked(_) => match self.read_chunked(buf) {
                Err(Error::Incomplete) => Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed inside a chunked body",
                )),
                other => Ok(other?),
            },
            Framing::UntilClose => {
                let n = self.read_raw(buf)?;
                if n == 0 {
                    self.done = true;
                }
                Ok(n)
            }
        }
    }
}
