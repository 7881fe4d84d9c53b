//! TLS support for HTTPS requests
//!
//! This module implements client-side TLS on top of OpenSSL for the REST
//! client's HTTPS connections.
//!
//! # Architecture
//!
//! 1. `TlsConfig` holds an immutable OpenSSL context built from the client
//!    settings (certificate validation, client certificate and key)
//! 2. `TlsSessionOps` implements the `SessionOps` trait for encrypted I/O
//! 3. All HTTP code remains unchanged - it transparently uses TLS operations
//!
//! # Examples
//!
//! ```no_run
//! use mmrest::http::tls::TlsConfig;
//! use std::net::TcpStream;
//!
//! let tls_config = TlsConfig::client()
//!     .unwrap()
//!     .verify_peer(true)
//!     .unwrap()
//!     .build()
//!     .unwrap();
//!
//! let tcp_stream = TcpStream::connect("example.com:443").unwrap();
//! let tls_session = tls_config.connect(tcp_stream, "example.com").unwrap();
//! println!("{}", tls_session.info().version);
//! ```

pub mod config;
pub mod session;

pub use config::{ClientConfigBuilder, TlsConfig, TlsError};
pub use session::{TlsInfo, TlsSessionOps};

/// Result type for TLS operations
pub type Result<T> = std::result::Result<T, TlsError>;
