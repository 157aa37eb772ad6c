//! End-to-end runs of the echo server.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use ws_transport::config::TransportConfig;
use ws_transport::lifecycle::Shutdown;
use ws_transport::net::{TlsProtocol, TlsUpgrader};
use ws_transport::server::EchoServer;

mod common;

fn test_config() -> TransportConfig {
    let mut config = TransportConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.listener.drain_timeout_secs = 2;
    config
}

#[tokio::test]
async fn echoes_plain_tcp_and_stops_on_shutdown() {
    let server = Arc::new(EchoServer::new(test_config()).unwrap());
    let listener = server.bind().unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let running = {
        let server = server.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { server.run(listener, shutdown).await })
    };

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(b"ping").await.unwrap();
    let mut buf = [0u8; 4];
    client.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"ping");
    assert_eq!(server.tracker().active_count(), 1);

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("server did not stop")
        .unwrap();
    assert_eq!(server.tracker().active_count(), 0);

    // The server closed our connection.
    let n = client.read(&mut buf).await.unwrap_or(0);
    assert_eq!(n, 0);
}

#[tokio::test]
async fn echoes_over_tls() {
    let server_cert = common::TestCert::generate("localhost");
    let server = Arc::new(EchoServer::with_identity(
        test_config(),
        server_cert.identity(),
        TlsUpgrader::default(),
        TlsProtocol::ALL.to_vec(),
    ));
    let listener = server.bind().unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let running = {
        let server = server.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { server.run(listener, shutdown).await })
    };

    let connector = common::connector(rustls::ALL_VERSIONS, None);
    let stream = TcpStream::connect(addr).await.unwrap();
    let mut tls = common::tls_connect(&connector, stream).await.unwrap();
    tls.write_all(b"over tls").await.unwrap();
    let mut buf = [0u8; 8];
    tls.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"over tls");

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("server did not stop")
        .unwrap();
}

#[tokio::test]
async fn loads_tls_material_from_config() {
    let server_cert = common::TestCert::generate("localhost");
    let dir = std::env::temp_dir().join(format!("ws-transport-echo-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let cert_path = dir.join("cert.pem");
    let key_path = dir.join("key.pem");
    std::fs::write(&cert_path, &server_cert.cert_pem).unwrap();
    std::fs::write(&key_path, &server_cert.key_pem).unwrap();

    let toml = format!(
        r#"
        [listener]
        bind_address = "127.0.0.1:0"

        [tls]
        cert_path = "{}"
        key_path = "{}"
        reference_cert_path = "{}"
        "#,
        cert_path.display(),
        key_path.display(),
        cert_path.display(),
    );
    let config = ws_transport::config::loader::parse_config(&toml).unwrap();

    let server = EchoServer::new(config).unwrap();
    let listener = server.bind().unwrap();
    assert!(listener.identity().is_some());
    listener.close().await;
}
