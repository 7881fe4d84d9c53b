//! HTTP/1.1 REST client with streaming multipart/form-data bodies
//!
//! This module provides the URL codecs, the query string builder, the lazy
//! multipart encoder and a blocking REST client that opens one connection
//! per request.
//!
//! # Architecture
//!
//! The HTTP layer uses a session operations abstraction pattern that allows
//! seamless switching between plain TCP and TLS connections:
//!
//! - `SessionOps` trait defines operations (poll, read, write, close)
//! - `HttpSession` wraps a transport and enforces the configured timeout
//! - `Transport` selects plain or TLS operations per request
//!
//! Request bodies for POST and PUT are produced by [`Multipart`], a state
//! machine that emits the document chunk by chunk. Its exact length is
//! computed up front so the request can be framed with `Content-Length`.
//!
//! # Examples
//!
//! ```no_run
//! use mmrest::http::{ClientConfig, FileField, FormField, Query, RestClient};
//!
//! let config = ClientConfig::builder()
//!     .default_header("Accept", "application/json")
//!     .build();
//! let mut client = RestClient::new(config);
//!
//! let query = Query::new().push("q", "name:puma").push("rows", 10);
//! let mut response = client.get("http://localhost:8080/search", Some(&query), None).unwrap();
//! assert_eq!(response.status().code(), 200);
//! let _body = response.read_body().unwrap();
//!
//! let fields = vec![FormField::new("pid", "abc123")];
//! let files = vec![FileField::new("object", "data.csv", "a,b\n1,2\n")];
//! let response = client
//!     .post("http://localhost:8080/object", None, None, fields, files)
//!     .unwrap();
//! println!("{}", response.status());
//! ```

pub mod body;
pub mod chunked;
pub mod client;
pub mod config;
pub mod encoding;
pub mod headers;
pub mod message;
pub mod multipart;
pub mod parser;
pub mod query;
pub mod rest;
pub mod session;
pub mod target;
pub mod tls;

pub use body::BodyReader;
pub use client::{HttpClient, Response};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use encoding::{
    decode_path_element, encode_path_element, encode_query_bytes, encode_query_element,
};
pub use headers::Headers;
pub use message::{Method, RequestHead, ResponseHead, Status, Version};
pub use multipart::{ByteSource, Cursor, FileField, FormField, Multipart, State};
pub use parser::ResponseParser;
pub use query::{urlencode, Query, QueryValue};
pub use rest::{RequestSpec, RestClient};
pub use session::{HttpSession, SessionOps, Transport};
pub use target::{Scheme, TargetUrl};

/// Result type for HTTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP operation errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File source error: {0}")]
    Source(#[source] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] crate::net::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] tls::TlsError),

    #[error("Invalid query input: {0}")]
    InvalidQueryInput(String),

    #[error("Source for field {name:?} (file {filename:?}) does not support seek/tell")]
    UnseekableSource { name: String, filename: String },

    #[error("Invalid multipart state: {0}")]
    InvalidState(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid percent-encoded text: {0}")]
    InvalidEncoding(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid HTTP version: {0}")]
    InvalidVersion(String),

    #[error("Invalid HTTP status: {0}")]
    InvalidStatus(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(String),

    #[error("Incomplete message")]
    Incomplete,

    #[error("Timeout")]
    Timeout,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Whether this error came from the connection rather than from the input
    ///
    /// Transport errors are handed back unmodified and never retried. A
    /// failure reading a local file source is [`Error::Source`], not transport,
    /// and neither is a TLS context that could not be built from local files.
    pub fn is_transport(&self) -> bool {
        match self {
            Error::Tls(e) => e.is_handshake(),
            Error::Io(_) | Error::Network(_) | Error::Timeout | Error::ConnectionClosed => true,
            _ => false,
        }
    }
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        use std::io::ErrorKind;
        match err {
            Error::Io(e) | Error::Source(e) => e,
            Error::Timeout => std::io::Error::new(ErrorKind::TimedOut, "timeout"),
            Error::ConnectionClosed => {
                std::io::Error::new(ErrorKind::UnexpectedEof, "connection closed")
            }
            other => std::io::Error::new(ErrorKind::Other, other),
        }
    }
}

/// Maximum number of headers accepted in a response head
pub const MAX_HEADERS: usize = 64;

/// Default HTTP port
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Default HTTPS port
pub const DEFAULT_HTTPS_PORT: u16 = 443;

/// CRLF line ending
pub const CRLF: &str = "\r\n";
