//! Blocking REST client
//!
//! Every call opens a fresh connection, sends one request and hands the
//! live [`Response`] back. Status codes are never interpreted here.
//!
//! GET, HEAD and DELETE carry no body. POST and PUT send a multipart body
//! whose `Content-Type` and `Content-Length` are set from the document, so
//! callers must not override those two headers.

use super::client::{HttpClient, Response};
use super::config::ClientConfig;
use super::message::{Method, RequestHead};
use super::multipart::{FileField, FormField, Multipart};
use super::session::{FdSessionOps, Transport};
use super::target::{Scheme, TargetUrl};
use super::tls::TlsConfig;
use super::{Error, Headers, Query, Result};

/// One request: method, URL, optional query and headers, and body parts
#[derive(Debug)]
pub struct RequestSpec<'a> {
    method: Method,
    url: String,
    query: Option<Query>,
    headers: Headers,
    fields: Vec<FormField>,
    files: Vec<FileField<'a>>,
}

impl<'a> RequestSpec<'a> {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        RequestSpec {
            method,
            url: url.into(),
            query: None,
            headers: Headers::new(),
            fields: Vec::new(),
            files: Vec::new(),
        }
    }

    pub fn query(mut self, query: Query) -> Self {
        self.query = Some(query);
        self
    }

    /// Add a per-call header; it wins over a default with the same name
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn field(mut self, field: impl Into<FormField>) -> Self {
        self.fields.push(field.into());
        self
    }

    pub fn fields(mut self, fields: Vec<FormField>) -> Self {
        self.fields = fields;
        self
    }

    pub fn file(mut self, file: FileField<'a>) -> Self {
        self.files.push(file);
        self
    }

    pub fn files(mut self, files: Vec<FileField<'a>>) -> Self {
        self.files = files;
        self
    }
}

/// REST client with a fixed configuration
///
/// The client keeps the URL and a curl reproduction of the last request for
/// debugging.
pub struct RestClient {
    config: ClientConfig,
    tls: Option<TlsConfig>,
    last_url: String,
    curl_request: Vec<String>,
}

impl RestClient {
    pub fn new(config: ClientConfig) -> Self {
        RestClient {
            config,
            tls: None,
            last_url: String::new(),
            curl_request: Vec::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn get(
        &mut self,
        url: &str,
        query: Option<&Query>,
        headers: Option<&Headers>,
    ) -> Result<Response> {
        self.execute(no_body(Method::Get, url, query, headers))
    }

    /// HEAD request; the response never has a body
    pub fn head(
        &mut self,
        url: &str,
        query: Option<&Query>,
        headers: Option<&Headers>,
    ) -> Result<Response> {
        self.execute(no_body(Method::Head, url, query, headers))
    }

    pub fn delete(
        &mut self,
        url: &str,
        query: Option<&Query>,
        headers: Option<&Headers>,
    ) -> Result<Response> {
        self.execute(no_body(Method::Delete, url, query, headers))
    }

    /// POST a multipart body built from `fields` and `files`
    pub fn post(
        &mut self,
        url: &str,
        query: Option<&Query>,
        headers: Option<&Headers>,
        fields: Vec<FormField>,
        files: Vec<FileField<'_>>,
    ) -> Result<Response> {
        self.execute(no_body(Method::Post, url, query, headers).fields(fields).files(files))
    }

    /// PUT a multipart body built from `fields` and `files`
    pub fn put(
        &mut self,
        url: &str,
        query: Option<&Query>,
        headers: Option<&Headers>,
        fields: Vec<FormField>,
        files: Vec<FileField<'_>>,
    ) -> Result<Response> {
        self.execute(no_body(Method::Put, url, query, headers).fields(fields).files(files))
    }

    /// Issue a request and return the response once its head has arrived
    ///
    /// The body length is computed before connecting, so a source that
    /// cannot report its size fails without any network I/O.
    pub fn execute(&mut self, request: RequestSpec<'_>) -> Result<Response> {
        let RequestSpec {
            method,
            url,
            query,
            headers: overrides,
            fields,
            files,
        } = request;

        if !method.has_body() && !(fields.is_empty() && files.is_empty()) {
            return Err(Error::Protocol(format!("{} requests carry no body", method)));
        }

        let mut target = TargetUrl::parse(&url)?;
        let mut headers = self.config.default_headers().merged(Some(&overrides));

        if let Some(query) = &query {
            let data = query.encode(false);
            tracing::debug!(%data, "query parameters");
            target.append_query(&data);
        }

        let mut body = if method.has_body() {
            let mut doc = Multipart::new(fields, files);
            let length = doc.content_length()?;
            tracing::debug!(length, "multipart body");
            headers.set("Content-Type", doc.content_type());
            headers.set("Content-Length", length.to_string());
            Some(doc)
        } else {
            None
        };

        self.record(method, &target, &headers, body.as_ref());
        tracing::debug!(url = %self.last_url, headers = %headers, "sending request");

        let transport = self.connect(&target)?;
        let mut client = HttpClient::new(transport);
        client.set_timeout(self.config.timeout());

        let head = RequestHead::builder()
            .method(method)
            .target(target.request_target())
            .headers(wire_headers(&target, headers))
            .build();
        client.send_head(&head)?;
        if let Some(doc) = body.as_mut() {
            let sent = client.send_body(doc)?;
            tracing::debug!(sent, "multipart body sent");
        }

        client.receive_response(method)
    }

    /// Fully qualified URL of the last request
    pub fn last_url(&self) -> &str {
        &self.last_url
    }

    /// The last request as an equivalent curl command line
    pub fn last_request_as_curl(&self) -> String {
        self.curl_request.join(" ")
    }

    fn record(
        &mut self,
        method: Method,
        target: &TargetUrl,
        headers: &Headers,
        body: Option<&Multipart<'_>>,
    ) {
        self.last_url = target.to_string();

        let mut curl = vec!["curl".to_string(), format!("-X {}", method)];
        for (name, value) in headers.iter() {
            curl.push(format!("-H \"{}: {}\"", name, value));
        }
        if let Some(doc) = body {
            for field in doc.fields() {
                curl.push(format!("-F {}={}", field.name, field.value));
            }
            for file in doc.files() {
                curl.push(format!("-F {}=@{}", file.name, file.filename));
            }
        }
        curl.push(format!("\"{}\"", self.last_url));
        self.curl_request = curl;
    }

    fn connect(&mut self, target: &TargetUrl) -> Result<Transport> {
        tracing::debug!(
            scheme = %target.scheme(),
            host = target.connect_host(),
            port = target.port(),
            "connecting"
        );
        // Certificate and key files are loaded before dialing
        let tls = match target.scheme() {
            Scheme::Http => None,
            Scheme::Https => Some(self.tls_config()?),
        };
        let stream =
            crate::net::connect(target.connect_host(), target.port(), self.config.timeout())?;

        match tls {
            None => Ok(Transport::Plain(FdSessionOps::new(stream))),
            Some(tls) => {
                let session = tls.connect(stream, target.connect_host())?;
                Ok(Transport::Tls(Box::new(session)))
            }
        }
    }

    /// The OpenSSL context, built on first HTTPS use
    fn tls_config(&mut self) -> Result<TlsConfig> {
        if let Some(tls) = &self.tls {
            return Ok(tls.clone());
        }
        let tls = self.config.tls_config()?;
        self.tls = Some(tls.clone());
        Ok(tls)
    }
}

fn no_body<'a>(
    method: Method,
    url: &str,
    query: Option<&Query>,
    headers: Option<&Headers>,
) -> RequestSpec<'a> {
    let mut request = RequestSpec::new(method, url);
    request.query = query.cloned();
    if let Some(headers) = headers {
        request.headers = headers.clone();
    }
    request
}

/// Headers as sent: `Host` first and `Connection: close` last unless given
fn wire_headers(target: &TargetUrl, headers: Headers) -> Headers {
    let mut wire = Headers::new();
    if !headers.contains("Host") {
        wire.insert("Host", target.host_header());
    }
    for (name, value) in headers.iter() {
        wire.insert(name, value);
    }
    if !headers.contains("Connection") {
        wire.insert("Connection", "close");
    }
    wire
}
