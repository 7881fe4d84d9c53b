//! REST client configuration
//!
//! A [`ClientConfig`] is built once and never changes afterwards. Every
//! request copies the default headers before merging its own on top, so no
//! request can leak headers into the next one.

use super::tls::{TlsConfig, TlsError};
use super::Headers;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default bound on connect, handshake and every socket read or write
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Immutable client settings
#[derive(Debug, Clone)]
pub struct ClientConfig {
    default_headers: Headers,
    timeout: Duration,
    cert_file: Option<PathBuf>,
    key_file: Option<PathBuf>,
    ca_file: Option<PathBuf>,
    strict_https: bool,
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Headers sent with every request unless the call overrides them
    pub fn default_headers(&self) -> &Headers {
        &self.default_headers
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn cert_file(&self) -> Option<&Path> {
        self.cert_file.as_deref()
    }

    pub fn key_file(&self) -> Option<&Path> {
        self.key_file.as_deref()
    }

    /// Extra PEM CA certificates trusted in strict mode
    pub fn ca_file(&self) -> Option<&Path> {
        self.ca_file.as_deref()
    }

    /// Whether HTTPS peers must present a valid certificate for the host
    pub fn strict_https(&self) -> bool {
        self.strict_https
    }

    /// Build the OpenSSL client context for HTTPS requests
    pub fn tls_config(&self) -> Result<TlsConfig, TlsError> {
        let mut builder = TlsConfig::client()?.verify_peer(self.strict_https)?;
        if let (true, Some(ca)) = (self.strict_https, &self.ca_file) {
            builder = builder.ca_file(ca)?;
        }
        if let Some(cert) = &self.cert_file {
            builder = builder.cert_file(cert)?;
        }
        if let Some(key) = &self.key_file {
            builder = builder.key_file(key)?;
        }
        builder.build()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfigBuilder::default().build()
    }
}

/// Builder for [`ClientConfig`]
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    default_headers: Headers,
    timeout: Duration,
    cert_file: Option<PathBuf>,
    key_file: Option<PathBuf>,
    ca_file: Option<PathBuf>,
    strict_https: bool,
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        ClientConfigBuilder {
            default_headers: Headers::new(),
            timeout: RESPONSE_TIMEOUT,
            cert_file: None,
            key_file: None,
            ca_file: None,
            strict_https: true,
        }
    }
}

impl ClientConfigBuilder {
    /// Add a default header, replacing an earlier one with the same name
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.set(name, value);
        self
    }

    /// Replace the whole default header set
    pub fn default_headers(mut self, headers: Headers) -> Self {
        self.default_headers = headers;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// PEM client certificate chain presented on HTTPS connections
    pub fn cert_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cert_file = Some(path.into());
        self
    }

    /// PEM private key matching the client certificate
    pub fn key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_file = Some(path.into());
        self
    }

    /// PEM file of CA certificates trusted on top of the system store
    pub fn ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_file = Some(path.into());
        self
    }

    pub fn strict_https(mut self, strict: bool) -> Self {
        self.strict_https = strict;
        self
    }

    pub fn build(self) -> ClientConfig {
        ClientConfig {
            default_headers: self.default_headers,
            timeout: self.timeout,
            cert_file: self.cert_file,
            key_file: self.key_file,
            ca_file: self.ca_file,
            strict_https: self.strict_https,
        }
    }
}
