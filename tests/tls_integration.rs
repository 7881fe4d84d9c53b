//! HTTPS integration tests
//!
//! A one-shot OpenSSL server with a freshly generated self-signed
//! certificate answers each request.

use mmrest::http::{ClientConfig, Error, FileField, RestClient};
use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::ssl::{SslAcceptor, SslMethod, SslVerifyMode};
use openssl::x509::extension::{BasicConstraints, SubjectAlternativeName};
use openssl::x509::{X509NameBuilder, X509};
use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

fn self_signed(common_name: &str) -> (X509, PKey<Private>) {
    let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_nid(Nid::COMMONNAME, common_name).unwrap();
    let name = name.build();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    builder.set_not_after(&Asn1Time::days_from_now(1).unwrap()).unwrap();
    let san = SubjectAlternativeName::new()
        .ip("127.0.0.1")
        .dns("localhost")
        .build(&builder.x509v3_context(None, None))
        .unwrap();
    builder.append_extension(san).unwrap();
    builder
        .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
        .unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();

    (builder.build(), key)
}

/// What the server learned from one exchange
struct Exchange {
    request_line: String,
    body_len: usize,
    client_cert: Option<String>,
}

/// Serve one HTTPS request; the thread yields None if the handshake fails
fn serve_tls(require_client_cert: bool) -> (String, thread::JoinHandle<Option<Exchange>>) {
    let (cert, key) = self_signed("localhost");
    serve_tls_with(&cert, &key, require_client_cert)
}

fn serve_tls_with(
    cert: &X509,
    key: &PKey<Private>,
    require_client_cert: bool,
) -> (String, thread::JoinHandle<Option<Exchange>>) {
    let mut acceptor = SslAcceptor::mozilla_intermediate(SslMethod::tls()).unwrap();
    acceptor.set_private_key(key).unwrap();
    acceptor.set_certificate(cert).unwrap();
    acceptor.check_private_key().unwrap();
    if require_client_cert {
        acceptor.set_verify_callback(
            SslVerifyMode::PEER | SslVerifyMode::FAIL_IF_NO_PEER_CERT,
            |_, _| true,
        );
    }
    let acceptor = acceptor.build();

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("https://{}", listener.local_addr().unwrap());

    let handle = thread::spawn(move || {
        let (tcp, _) = listener.accept().unwrap();
        let mut stream = acceptor.accept(tcp).ok()?;

        let mut data = Vec::new();
        let mut buf = [0u8; 4096];
        let head_end = loop {
            if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
            let n = stream.read(&mut buf).ok()?;
            if n == 0 {
                return None;
            }
            data.extend_from_slice(&buf[..n]);
        };
        let head = String::from_utf8_lossy(&data[..head_end]).to_string();
        let length: usize = head
            .lines()
            .find_map(|l| l.strip_prefix("Content-Length: "))
            .map(|v| v.trim().parse().unwrap())
            .unwrap_or(0);
        while data.len() - head_end < length {
            let n = stream.read(&mut buf).ok()?;
            if n == 0 {
                return None;
            }
            data.extend_from_slice(&buf[..n]);
        }

        let client_cert = stream.ssl().peer_certificate().and_then(|c| {
            c.subject_name()
                .entries_by_nid(Nid::COMMONNAME)
                .next()
                .and_then(|e| e.data().as_utf8().ok())
                .map(|s| s.to_string())
        });

        stream
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 6\r\n\r\nsecret")
            .ok()?;
        let _ = stream.shutdown();

        Some(Exchange {
            request_line: head.lines().next().unwrap_or("").to_string(),
            body_len: data.len() - head_end,
            client_cert,
        })
    });

    (base, handle)
}

fn lenient() -> ClientConfig {
    ClientConfig::builder()
        .strict_https(false)
        .timeout(Duration::from_secs(5))
        .build()
}

#[test]
fn test_lenient_https_get() {
    let (base, handle) = serve_tls(false);
    let mut client = RestClient::new(lenient());

    let mut response = client.get(&format!("{}/secure", base), None, None).unwrap();
    assert_eq!(response.status().code(), 200);
    assert_eq!(response.read_body().unwrap(), b"secret");
    assert!(client.last_url().starts_with("https://127.0.0.1:"));

    let exchange = handle.join().unwrap().unwrap();
    assert_eq!(exchange.request_line, "GET /secure HTTP/1.1");
    assert!(exchange.client_cert.is_none());
}

#[test]
fn test_strict_https_rejects_self_signed() {
    let (base, handle) = serve_tls(false);
    let mut client = RestClient::new(
        ClientConfig::builder()
            .timeout(Duration::from_secs(5))
            .build(),
    );

    let err = client.get(&format!("{}/", base), None, None).unwrap_err();
    assert!(matches!(err, Error::Tls(_)));
    assert!(err.is_transport());
    assert!(handle.join().unwrap().is_none());
}

#[test]
fn test_strict_https_with_trusted_ca_file() {
    let (cert, key) = self_signed("localhost");
    let dir = tempfile::tempdir().unwrap();
    let ca_path = dir.path().join("ca.pem");
    std::fs::write(&ca_path, cert.to_pem().unwrap()).unwrap();

    let (base, handle) = serve_tls_with(&cert, &key, false);
    let mut client = RestClient::new(
        ClientConfig::builder()
            .ca_file(&ca_path)
            .timeout(Duration::from_secs(5))
            .build(),
    );

    let mut response = client.get(&format!("{}/trusted", base), None, None).unwrap();
    assert_eq!(response.read_body().unwrap(), b"secret");
    assert_eq!(handle.join().unwrap().unwrap().request_line, "GET /trusted HTTP/1.1");
}

#[test]
fn test_https_post_multipart() {
    let (base, handle) = serve_tls(false);
    let mut client = RestClient::new(lenient());

    let files = vec![FileField::new("object", "o.bin", vec![1u8; 50_000])];
    let mut response = client
        .post(&format!("{}/object", base), None, None, vec![], files)
        .unwrap();
    assert_eq!(response.read_body().unwrap(), b"secret");

    let exchange = handle.join().unwrap().unwrap();
    assert_eq!(exchange.request_line, "POST /object HTTP/1.1");
    assert!(exchange.body_len > 50_000);
}

#[test]
fn test_client_certificate_presented() {
    let (base, handle) = serve_tls(true);

    let (cert, key) = self_signed("test-client");
    let dir = tempfile::tempdir().unwrap();
    let cert_path = dir.path().join("client.pem");
    let key_path = dir.path().join("client.key");
    std::fs::write(&cert_path, cert.to_pem().unwrap()).unwrap();
    std::fs::write(&key_path, key.private_key_to_pem_pkcs8().unwrap()).unwrap();

    let config = ClientConfig::builder()
        .strict_https(false)
        .cert_file(&cert_path)
        .key_file(&key_path)
        .timeout(Duration::from_secs(5))
        .build();
    let mut client = RestClient::new(config);

    let mut response = client.get(&format!("{}/whoami", base), None, None).unwrap();
    assert_eq!(response.read_body().unwrap(), b"secret");

    let exchange = handle.join().unwrap().unwrap();
    assert_eq!(exchange.client_cert.as_deref(), Some("test-client"));
}

#[test]
fn test_missing_client_key_file() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    listener.set_nonblocking(true).unwrap();

    let mut client = RestClient::new(
        ClientConfig::builder()
            .strict_https(false)
            .key_file("/nonexistent/client.key")
            .build(),
    );
    let err = client.get(&format!("https://{}/", addr), None, None).unwrap_err();
    assert!(matches!(err, Error::Tls(_)));
    assert!(!err.is_transport());

    // The key is loaded before dialing
    assert!(listener.accept().is_err());
}
