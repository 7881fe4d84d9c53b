//! HTTP/1.1 exchange over a single connection
//!
//! [`HttpClient`] writes one request head, optionally streams a multipart
//! body, and turns the connection into a [`Response`] once the response
//! head has arrived. The body stays on the wire until the caller reads it.

use super::body::{BodyReader, Framing};
use super::message::{Method, RequestHead, ResponseHead, Status, Version};
use super::multipart::Multipart;
use super::session::{HttpSession, SessionOps, Transport};
use super::{Error, Headers, ResponseParser, Result};
use std::fmt;
use std::io::{self, Read};
use std::time::Duration;

const READ_SIZE: usize = 8192;

/// HTTP client for one request/response exchange
pub struct HttpClient<S: SessionOps> {
    session: HttpSession<S>,
    parser: ResponseParser,
}

impl<S: SessionOps> HttpClient<S> {
    /// Create a new HTTP client with a session
    pub fn new(session: S) -> Self {
        HttpClient {
            session: HttpSession::new(session),
            parser: ResponseParser::new(),
        }
    }

    /// Set the timeout for operations
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.session.set_timeout(Some(timeout));
    }

    /// Send the request line and headers
    pub fn send_head(&mut self, head: &RequestHead) -> Result<()> {
        self.session.write_all(&head.to_wire())
    }

    /// Stream a multipart body, returning the number of bytes written
    pub fn send_body(&mut self, body: &mut Multipart<'_>) -> Result<u64> {
        let mut written = 0u64;
        while let Some(chunk) = body.next_chunk()? {
            if chunk.is_empty() {
                continue;
            }
            self.session.write_all(&chunk)?;
            written += chunk.len() as u64;
        }
        self.session.flush()?;
        Ok(written)
    }

    /// Wait for the response head to `method`
    ///
    /// Interim 1xx responses are skipped. The returned response owns the
    /// connection.
    pub fn receive_response(mut self, method: Method) -> Result<Response<S>> {
        self.parser.reset();
        let mut temp = [0u8; READ_SIZE];
        let mut input: Vec<u8> = Vec::new();

        loop {
            let head = if input.is_empty() {
                let n = self.session.read(&mut temp)?;
                if n == 0 {
                    return Err(Error::ConnectionClosed);
                }
                self.parser.parse(&temp[..n])?
            } else {
                self.parser.parse(&std::mem::take(&mut input))?
            };

            let Some(head) = head else {
                continue;
            };

            let remaining = self.parser.take_remaining();
            if head.status().code() < 200 {
                tracing::debug!(status = head.status().code(), "skipping interim response");
                self.parser.reset();
                input = remaining;
                continue;
            }

            let framing = Framing::for_response(method, &head)?;
            return Ok(Response {
                head,
                body: BodyReader::new(self.session, framing, remaining),
            });
        }
    }
}

/// A response whose body is still on the connection
///
/// Status and headers are available immediately; the body is read through
/// [`std::io::Read`] or drained with [`Response::read_body`].
pub struct Response<S: SessionOps = Transport> {
    head: ResponseHead,
    body: BodyReader<S>,
}

impl<S: SessionOps> Response<S> {
    pub fn status(&self) -> Status {
        self.head.status()
    }

    pub fn reason(&self) -> &str {
        self.head.reason()
    }

    pub fn version(&self) -> Version {
        self.head.version()
    }

    pub fn headers(&self) -> &Headers {
        self.head.headers()
    }

    pub fn head(&self) -> &ResponseHead {
        &self.head
    }

    /// Read the rest of the body into memory
    pub fn read_body(&mut self) -> Result<Vec<u8>> {
        self.body.read_to_vec()
    }

    /// Split into head and body reader
    pub fn into_parts(self) -> (ResponseHead, BodyReader<S>) {
        (self.head, self.body)
    }
}

impl<S: SessionOps> fmt::Debug for Response<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("head", &self.head)
            .field("finished", &self.body.is_finished())
            .finish()
    }
}

impl<S: SessionOps> Read for Response<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.body.read(buf)
    }
}
