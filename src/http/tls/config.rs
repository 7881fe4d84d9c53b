//! TLS configuration
//!
//! This module provides the TLS client configuration builder.

use openssl::ssl::{SslContext, SslContextBuilder, SslFiletype, SslMethod, SslVerifyMode};
use std::net::TcpStream;
use std::path::{Path, PathBuf};

/// TLS errors
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),
}

impl TlsError {
    /// Whether the error came from talking to the peer
    pub fn is_handshake(&self) -> bool {
        matches!(self, TlsError::HandshakeFailed(_) | TlsError::Io(_))
    }
}

/// TLS configuration (immutable after building)
#[derive(Clone)]
pub struct TlsConfig {
    pub(crate) ctx: SslContext,
    pub(crate) verify_peer: bool,
}

impl TlsConfig {
    /// Create a new client configuration builder
    pub fn client() -> Result<ClientConfigBuilder, TlsError> {
        ClientConfigBuilder::new()
    }

    /// Whether peer certificates and host names are verified
    pub fn verify_peer(&self) -> bool {
        self.verify_peer
    }

    /// Connect to a server with TLS
    ///
    /// `servername` is sent as SNI and, when verification is on, checked
    /// against the peer certificate.
    pub fn connect(
        &self,
        stream: TcpStream,
        servername: &str,
    ) -> Result<super::TlsSessionOps, TlsError> {
        super::session::TlsSessionOps::connect(stream, self, servername)
    }
}

/// Client configuration builder
pub struct ClientConfigBuilder {
    ctx_builder: SslContextBuilder,
    verify_peer: bool,
    cert_file: Option<PathBuf>,
    key_file: Option<PathBuf>,
}

impl ClientConfigBuilder {
    fn new() -> Result<Self, TlsError> {
        let mut ctx_builder = SslContextBuilder::new(SslMethod::tls_client())?;

        // Verification stays off until verify_peer(true)
        ctx_builder.set_verify(SslVerifyMode::NONE);

        Ok(ClientConfigBuilder {
            ctx_builder,
            verify_peer: false,
            cert_file: None,
            key_file: None,
        })
    }

    /// Enable/disable peer certificate verification
    ///
    /// Enabling loads the system trust store.
    pub fn verify_peer(mut self, verify: bool) -> Result<Self, TlsError> {
        self.verify_peer = verify;
        if verify {
            self.ctx_builder.set_default_verify_paths()?;
            self.ctx_builder.set_verify(SslVerifyMode::PEER);
        } else {
            self.ctx_builder.set_verify(SslVerifyMode::NONE);
        }
        Ok(self)
    }

    /// Trust an additional CA certificate file (PEM)
    pub fn ca_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, TlsError> {
        self.ctx_builder.set_ca_file(path.as_ref())?;
        Ok(self)
    }

    /// Load the client certificate chain from a PEM file
    pub fn cert_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, TlsError> {
        self.ctx_builder
            .set_certificate_chain_file(path.as_ref())
            .map_err(|e| {
                TlsError::Certificate(format!(
                    "Failed to load certificate {}: {}",
                    path.as_ref().display(),
                    e
                ))
            })?;
        self.cert_file = Some(path.as_ref().to_path_buf());
        Ok(self)
    }

    /// Load the client private key from a PEM file
    pub fn key_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, TlsError> {
        self.ctx_builder
            .set_private_key_file(path.as_ref(), SslFiletype::PEM)
            .map_err(|e| {
                TlsError::Certificate(format!(
                    "Failed to load private key {}: {}",
                    path.as_ref().display(),
                    e
                ))
            })?;
        self.key_file = Some(path.as_ref().to_path_buf());
        Ok(self)
    }

    /// Build the TLS configuration
    pub fn build(self) -> Result<TlsConfig, TlsError> {
        match (&self.cert_file, &self.key_file) {
            (Some(_), Some(_)) => self.ctx_builder.check_private_key().map_err(|e| {
                TlsError::Certificate(format!("Private key does not match certificate: {}", e))
            })?,
            (None, Some(key)) => {
                return Err(TlsError::InvalidConfig(format!(
                    "Private key {} given without a certificate",
                    key.display()
                )))
            }
            _ => {}
        }

        Ok(TlsConfig {
            ctx: self.ctx_builder.build(),
            verify_peer: self.verify_peer,
        })
    }
}
