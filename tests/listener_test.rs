//! Listener binding, backpressure and trust policy integration tests.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{Request, Response};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::net::{TcpStream, UnixStream};
use tokio_rustls::TlsConnector;
use tokio_util::sync::CancellationToken;

use rpclink::client::{ChannelConfig, ChannelOptions};
use rpclink::config::schema::{LimitsSection, ListenerSection};
use rpclink::config::RpcServerConfig;
use rpclink::error::AcceptError;
use rpclink::transport::listener::{ListenerOptions, ListenerSecurity};
use rpclink::transport::{BoundListener, ListenTarget, TlsMaterial};
use rpclink::config::ClientCertificateMode;
use rpclink::trust::CertificateEvaluator;

mod common;

async fn rpc_ok(_request: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    Ok(Response::new(Full::new(Bytes::from_static(b"rpc-ok"))))
}

/// Bind a plaintext listener on a loopback port and serve accepted
/// connections with the `rpc_ok` service in the background.
async fn start_plaintext(
    max_connections: u32,
    fallback: Option<String>,
) -> (Arc<BoundListener>, std::net::SocketAddr, CancellationToken) {
    let listener = BoundListener::bind(
        ListenTarget::Network("127.0.0.1".parse().unwrap(), 0),
        common::test_limits(max_connections),
        None,
        ListenerOptions {
            enable_connection_logging: true,
            non_rpc_warning: fallback,
        },
    )
    .await
    .unwrap();

    let listener = Arc::new(listener);
    let addr = listener.local_addr().unwrap();
    let token = CancellationToken::new();

    let server = Arc::clone(&listener);
    let server_token = token.clone();
    tokio::spawn(async move {
        loop {
            match server.accept(&server_token).await {
                Ok(connection) => {
                    let server = Arc::clone(&server);
                    tokio::spawn(async move {
                        let _ = server.serve_connection(connection, service_fn(rpc_ok)).await;
                    });
                }
                Err(AcceptError::Cancelled) => break,
                Err(_) => continue,
            }
        }
    });

    (listener, addr, token)
}

#[tokio::test]
async fn non_rpc_requests_get_the_informational_response() {
    common::init_tracing();
    let (_listener, addr, token) =
        start_plaintext(4, Some("RPC clients only".to_string())).await;

    let stream = TcpStream::connect(addr).await.unwrap();
    let (mut sender, connection) =
        hyper::client::conn::http2::handshake::<_, _, Full<Bytes>>(
            TokioExecutor::new(),
            TokioIo::new(stream),
        )
        .await
        .unwrap();
    tokio::spawn(connection);

    // A plain request is answered by the fallback, not the service.
    let request = Request::builder()
        .uri(format!("http://{addr}/"))
        .body(Full::default())
        .unwrap();
    let response = sender.send_request(request).await.unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body.as_ref(), b"RPC clients only");

    // An RPC request reaches the injected dispatch service.
    let request = Request::builder()
        .method("POST")
        .uri(format!("http://{addr}/echo.Echo/Say"))
        .header(CONTENT_TYPE, "application/grpc")
        .body(Full::default())
        .unwrap();
    let response = sender.send_request(request).await.unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body.as_ref(), b"rpc-ok");

    token.cancel();
}

#[tokio::test]
async fn connection_ceiling_applies_backpressure() {
    common::init_tracing();
    let listener = Arc::new(
        BoundListener::bind(
            ListenTarget::Network("127.0.0.1".parse().unwrap(), 0),
            common::test_limits(1),
            None,
            ListenerOptions::default(),
        )
        .await
        .unwrap(),
    );
    let addr = listener.local_addr().unwrap();
    let token = CancellationToken::new();

    let _client1 = TcpStream::connect(addr).await.unwrap();
    let held = listener.accept(&token).await.unwrap();
    assert_eq!(listener.available_permits(), 0);

    // The ceiling is exhausted: the next accept must block.
    let _client2 = TcpStream::connect(addr).await.unwrap();
    let blocked = tokio::time::timeout(Duration::from_millis(100), listener.accept(&token)).await;
    assert!(blocked.is_err());

    // Dropping the held connection releases the slot.
    drop(held);
    let accepted = tokio::time::timeout(Duration::from_secs(1), listener.accept(&token)).await;
    assert!(accepted.is_ok());
}

#[tokio::test]
async fn cancellation_stops_the_accept_loop() {
    let listener = BoundListener::bind(
        ListenTarget::Network("127.0.0.1".parse().unwrap(), 0),
        common::test_limits(4),
        None,
        ListenerOptions::default(),
    )
    .await
    .unwrap();

    let token = CancellationToken::new();
    token.cancel();
    assert!(matches!(
        listener.accept(&token).await,
        Err(AcceptError::Cancelled)
    ));
}

#[tokio::test]
async fn local_socket_wins_over_network_fields() {
    common::init_tracing();
    let dir = common::scratch_dir();
    let socket_path = dir.join("rpc.sock");

    let config = RpcServerConfig {
        limits: LimitsSection {
            max_concurrent_connections: Some(4),
            max_concurrent_upgraded_connections: Some(4),
            ..LimitsSection::default()
        },
        listener: ListenerSection {
            bind_address: Some("127.0.0.1".into()),
            port: Some(59999),
            unix_socket_path: Some(socket_path.display().to_string()),
        },
        ..RpcServerConfig::default()
    };

    let listener = BoundListener::from_config(&config).await.unwrap();
    assert_eq!(
        listener.target(),
        &ListenTarget::LocalSocket(socket_path.clone())
    );
    // The network fields were ignored entirely.
    assert!(listener.local_addr().is_none());

    let token = CancellationToken::new();
    let _client = UnixStream::connect(&socket_path).await.unwrap();
    let connection = listener.accept(&token).await.unwrap();
    assert_eq!(connection.peer(), "local-socket");
}

/// Full TLS round trips: the client-side trust policies against a
/// self-signed server certificate.
#[tokio::test]
async fn trust_policies_decide_the_handshake() {
    common::init_tracing();
    let (cert_path, key_path) = common::self_signed_pem();

    let listener = Arc::new(
        BoundListener::bind(
            ListenTarget::Network("127.0.0.1".parse().unwrap(), 0),
            common::test_limits(8),
            Some(ListenerSecurity {
                material: TlsMaterial::from_pem_files(&cert_path, &key_path).unwrap(),
                client_certificate_mode: ClientCertificateMode::None,
                evaluator: CertificateEvaluator::strict(),
            }),
            ListenerOptions::default(),
        )
        .await
        .unwrap(),
    );
    let addr = listener.local_addr().unwrap();
    let token = CancellationToken::new();

    // Drive server-side handshakes; rejected ones fail individually and
    // must not disturb the loop.
    let server = Arc::clone(&listener);
    let server_token = token.clone();
    tokio::spawn(async move {
        loop {
            match server.accept(&server_token).await {
                Ok(connection) => drop(connection),
                Err(AcceptError::Cancelled) => break,
                Err(_) => continue,
            }
        }
    });

    let connect = |options: ChannelOptions, host: &'static str| async move {
        let stream = TcpStream::connect(addr).await.unwrap();
        let domain = rustls::pki_types::ServerName::try_from(host).unwrap();
        TlsConnector::from(options.tls_config())
            .connect(domain, stream)
            .await
    };

    // Self-signed certificate, matching host: only the relaxed policies
    // accept it.
    let strict = ChannelOptions::build(ChannelConfig::for_policy(4, false, false)).unwrap();
    assert!(connect(strict, "localhost").await.is_err());

    let relaxed = ChannelOptions::build(ChannelConfig::for_policy(4, true, false)).unwrap();
    assert!(connect(relaxed, "localhost").await.is_ok());

    // Wrong host: only the host-mismatch variant accepts it.
    let relaxed = ChannelOptions::build(ChannelConfig::for_policy(4, true, false)).unwrap();
    assert!(connect(relaxed, "other.test").await.is_err());

    let mismatch_ok =
        ChannelOptions::build(ChannelConfig::for_policy(4, true, true)).unwrap();
    assert!(connect(mismatch_ok, "other.test").await.is_ok());

    token.cancel();
}
