//! TLS transport tests against an in-process server with a self-signed
//! certificate.

#![allow(clippy::unwrap_used, clippy::expect_used, missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use abrimail_transport::{Error, create_tls_connector, open_with};
use rcgen::generate_simple_self_signed;
use rustls::pki_types::{CertificateDer, PrivatePkcs8KeyDer};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio_rustls::{TlsAcceptor, TlsConnector};

struct TestServer {
    port: u16,
    cert: CertificateDer<'static>,
    _handle: tokio::task::JoinHandle<()>,
}

/// Starts a TLS server that greets, then echoes each line back with a
/// `250 ` prefix.
async fn start_echo_server() -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let cert = generate_simple_self_signed(vec!["127.0.0.1".to_string()])
        .expect("generate self-signed cert");
    let cert_der = cert.cert.der().clone();
    let key_der = PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());

    let tls_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert_der.clone()], key_der.into())
        .expect("build server TLS config");
    let acceptor = TlsAcceptor::from(Arc::new(tls_config));

    let handle = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                let Ok(tls) = acceptor.accept(stream).await else {
                    return;
                };
                let (reader, mut writer) = tokio::io::split(tls);
                let mut reader = BufReader::new(reader);
                if writer.write_all(b"220 ready\r\n").await.is_err() {
                    return;
                }
                let mut line = String::new();
                while reader.read_line(&mut line).await.unwrap_or(0) > 0 {
                    let reply = format!("250 {line}");
                    if writer.write_all(reply.as_bytes()).await.is_err() {
                        return;
                    }
                    line.clear();
                }
            });
        }
    });

    TestServer {
        port,
        cert: cert_der,
        _handle: handle,
    }
}

fn trusting(cert: &CertificateDer<'static>) -> TlsConnector {
    let mut roots = rustls::RootCertStore::empty();
    roots.add(cert.clone()).unwrap();
    let config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
}

#[tokio::test]
async fn test_tls_round_trip() {
    let server = start_echo_server().await;
    let connector = trusting(&server.cert);

    let mut stream = open_with("127.0.0.1", server.port, &connector, Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(stream.read_text_line().await.unwrap(), "220 ready\r\n");

    stream.write_all(b"EHLO client\r\n").await.unwrap();
    assert_eq!(stream.read_text_line().await.unwrap(), "250 EHLO client\r\n");

    stream.close().await;
    assert!(!stream.is_open());
}

#[tokio::test]
async fn test_untrusted_certificate_is_rejected() {
    let server = start_echo_server().await;

    // Web PKI roots do not include the self-signed test certificate.
    let err = open_with(
        "127.0.0.1",
        server.port,
        &create_tls_connector(),
        Duration::from_secs(5),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Connection { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_silent_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let _handle = tokio::spawn(async move {
        // Accept and hold the socket without ever answering the handshake.
        let (_socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    let err = open_with(
        "127.0.0.1",
        port,
        &create_tls_connector(),
        Duration::from_millis(200),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Timeout(_)), "got {err:?}");
}
