//! Request target parsing
//!
//! Splits an absolute `http` or `https` URL into the parts a request needs:
//! where to connect, what to put in the `Host` header and the origin-form
//! target for the request line.

use super::{Error, Result, DEFAULT_HTTPS_PORT, DEFAULT_HTTP_PORT};
use std::fmt;
use url::{Host, Url};

/// URL scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => DEFAULT_HTTP_PORT,
            Scheme::Https => DEFAULT_HTTPS_PORT,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed request URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetUrl {
    scheme: Scheme,
    /// Host as written in a URL (IPv6 in brackets)
    host: String,
    /// Host as handed to the resolver (IPv6 without brackets)
    connect_host: String,
    port: u16,
    path: String,
    query: Option<String>,
    fragment: Option<String>,
}

impl TargetUrl {
    /// Parse an absolute URL
    ///
    /// The port defaults to 80 for `http` and 443 for `https`; an empty path
    /// becomes `/`. Path and query are sent as written, dot segments and
    /// escapes included, unless they hold characters that cannot go on the
    /// wire as they are; those take the escaped form the URL parser produces.
    pub fn parse(input: &str) -> Result<Self> {
        let url = Url::parse(input).map_err(|e| Error::InvalidUrl(format!("{}: {}", input, e)))?;

        let scheme = match url.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => {
                return Err(Error::InvalidUrl(format!(
                    "{}: unsupported scheme {:?}",
                    input, other
                )))
            }
        };

        let (host, connect_host) = match url.host() {
            Some(Host::Domain(d)) => (d.to_string(), d.to_string()),
            Some(Host::Ipv4(ip)) => (ip.to_string(), ip.to_string()),
            Some(Host::Ipv6(ip)) => (format!("[{}]", ip), ip.to_string()),
            None => return Err(Error::InvalidUrl(format!("{}: missing host", input))),
        };

        let (path, query, fragment) = match raw_tail(input) {
            Some((path, query, fragment)) => (
                path.to_string(),
                query.map(str::to_string),
                fragment.map(str::to_string),
            ),
            None => (
                url.path().to_string(),
                url.query().map(str::to_string),
                url.fragment().map(str::to_string),
            ),
        };
        let path = if path.is_empty() { "/".to_string() } else { path };

        Ok(TargetUrl {
            scheme,
            host,
            connect_host,
            port: url.port().unwrap_or_else(|| scheme.default_port()),
            path,
            query,
            fragment,
        })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Host name or address to connect to
    pub fn connect_host(&self) -> &str {
        &self.connect_host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// Add an encoded query string, after any query already present
    pub fn append_query(&mut self, encoded: &str) {
        if encoded.is_empty() {
            return;
        }
        self.query = match self.query.take() {
            Some(existing) if !existing.is_empty() => Some(format!("{}&{}", existing, encoded)),
            _ => Some(encoded.to_string()),
        };
    }

    /// Origin-form target for the request line; the fragment is never sent
    pub fn request_target(&self) -> String {
        match &self.query {
            Some(q) => format!("{}?{}", self.path, q),
            None => self.path.clone(),
        }
    }

    /// Value for the `Host` header; the port is left out when it is the default
    pub fn host_header(&self) -> String {
        if self.port == self.scheme.default_port() {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Fully qualified form, always with an explicit port
impl fmt::Display for TargetUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}:{}{}",
            self.scheme,
            self.host,
            self.port,
            self.request_target()
        )
    }
}

/// Path, query and fragment exactly as they follow the authority
///
/// None when the tail holds anything other than printable ASCII.
fn raw_tail(input: &str) -> Option<(&str, Option<&str>, Option<&str>)> {
    let (_, rest) = input.trim().split_once("://")?;
    let tail = rest
        .find(|c: char| matches!(c, '/' | '?' | '#'))
        .map_or("", |i| &rest[i..]);
    if !tail.bytes().all(|b| b.is_ascii_graphic()) || tail.contains('\\') {
        return None;
    }

    let (tail, fragment) = match tail.split_once('#') {
        Some((t, f)) => (t, Some(f)),
        None => (tail, None),
    };
    let (path, query) = match tail.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (tail, None),
    };
    Some((path, query, fragment))
}
