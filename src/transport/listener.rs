//! Listener binding and the bounded accept loop.
//!
//! # Responsibilities
//! - Choose between a network endpoint and a local socket path
//! - Bind with the resolved transport limits and the trust evaluator
//!   installed as the handshake callback
//! - Enforce the connection ceilings via semaphore permits
//! - Serve accepted connections as HTTP/2 with the non-RPC fallback
//!
//! # Design Decisions
//! - A non-empty local socket path always wins over the network fields;
//!   this precedence is a documented design choice, not an error
//! - Plaintext binding happens only on explicit absence of TLS material,
//!   with a single warning; it is never a fallback after a failed load
//! - A trust rejection terminates one handshake and nothing else

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Request, Response};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::service::Service;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, UnixListener};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;

use crate::config::schema::{ClientCertificateMode, ListenerSection, RpcServerConfig};
use crate::error::{AcceptError, ConfigError};
use crate::transport::limits::{available_core_count, TransportLimits};
use crate::transport::tls::{build_server_config, TlsMaterial};
use crate::trust::evaluator::CertificateEvaluator;

/// Informational response for clients speaking something other than the
/// RPC protocol on this listener.
pub const DEFAULT_NON_RPC_WARNING: &str =
    "Communication with RPC endpoints must be made through an RPC client. \
     This server only accepts HTTP/2 RPC traffic.";

/// Where a listener binds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenTarget {
    Network(IpAddr, u16),
    LocalSocket(PathBuf),
}

impl ListenTarget {
    /// Select the target from the configuration snapshot. A non-empty
    /// socket path takes precedence; the network fields are then ignored
    /// entirely.
    pub fn from_config(listener: &ListenerSection) -> Result<Self, ConfigError> {
        if let Some(path) = listener
            .unix_socket_path
            .as_deref()
            .filter(|path| !path.trim().is_empty())
        {
            return Ok(ListenTarget::LocalSocket(PathBuf::from(path)));
        }

        match (listener.bind_address.as_deref(), listener.port) {
            (Some(address), Some(port)) => {
                let ip: IpAddr = address.parse().map_err(|_| {
                    ConfigError::Validation(vec![crate::error::ValidationError::InvalidBindAddress(
                        address.to_string(),
                    )])
                })?;
                Ok(ListenTarget::Network(ip, port))
            }
            _ => Err(ConfigError::MissingListenTarget),
        }
    }
}

impl std::fmt::Display for ListenTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenTarget::Network(ip, port) => write!(f, "{ip}:{port}"),
            ListenTarget::LocalSocket(path) => write!(f, "unix:{}", path.display()),
        }
    }
}

/// TLS inputs for a secured listener.
pub struct ListenerSecurity {
    pub material: TlsMaterial,
    pub client_certificate_mode: ClientCertificateMode,
    pub evaluator: CertificateEvaluator,
}

/// Non-security listener knobs.
#[derive(Debug, Clone, Default)]
pub struct ListenerOptions {
    /// Verbose per-connection diagnostics; no effect on trust decisions.
    pub enable_connection_logging: bool,
    /// Message for non-RPC requests; `None` disables the fallback.
    pub non_rpc_warning: Option<String>,
}

trait Io: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> Io for T {}

enum ListenerInner {
    Tcp(TcpListener),
    Unix(UnixListener),
}

impl ListenerInner {
    async fn accept(&self) -> std::io::Result<(Box<dyn Io>, String)> {
        match self {
            ListenerInner::Tcp(listener) => {
                let (stream, peer) = listener.accept().await?;
                Ok((Box::new(stream), peer.to_string()))
            }
            ListenerInner::Unix(listener) => {
                let (stream, _) = listener.accept().await?;
                Ok((Box::new(stream), "local-socket".to_string()))
            }
        }
    }
}

/// A bound listener: the output of the binding selector, immutable and
/// shared read-only across all connection-handling tasks.
pub struct BoundListener {
    inner: ListenerInner,
    tls: Option<TlsAcceptor>,
    limits: TransportLimits,
    connection_permits: Arc<Semaphore>,
    upgraded_permits: Arc<Semaphore>,
    options: ListenerOptions,
    target: ListenTarget,
}

impl BoundListener {
    /// Bind `target` with `limits`. `security` absent means a deliberate
    /// plaintext opt-out.
    pub async fn bind(
        target: ListenTarget,
        limits: TransportLimits,
        security: Option<ListenerSecurity>,
        options: ListenerOptions,
    ) -> Result<Self, ConfigError> {
        let inner = match &target {
            ListenTarget::Network(ip, port) => {
                let listener = TcpListener::bind(SocketAddr::new(*ip, *port)).await?;
                ListenerInner::Tcp(listener)
            }
            ListenTarget::LocalSocket(path) => {
                // A stale socket file from a previous run blocks the bind.
                let _ = std::fs::remove_file(path);
                ListenerInner::Unix(UnixListener::bind(path)?)
            }
        };

        let tls = match security {
            Some(security) => Some(TlsAcceptor::from(build_server_config(
                security.material,
                security.client_certificate_mode,
                security.evaluator,
            )?)),
            None => {
                tracing::warn!(
                    target = %target,
                    "Listener bound without TLS material; plaintext opt-out in effect"
                );
                None
            }
        };

        tracing::info!(
            target = %target,
            max_connections = limits.max_concurrent_connections,
            max_upgraded = limits.max_concurrent_upgraded_connections,
            max_streams = limits.max_streams_per_connection,
            tls = tls.is_some(),
            "Listener bound"
        );

        Ok(Self {
            inner,
            tls,
            connection_permits: Arc::new(Semaphore::new(limits.max_concurrent_connections)),
            upgraded_permits: Arc::new(Semaphore::new(limits.max_concurrent_upgraded_connections)),
            limits,
            options,
            target,
        })
    }

    /// Bind straight from a validated configuration snapshot. The trust
    /// policy comes from the snapshot's relaxation toggles; core scaling
    /// uses the machine's available core count.
    pub async fn from_config(config: &RpcServerConfig) -> Result<Self, ConfigError> {
        let limits = TransportLimits::resolve(&config.limits(), available_core_count())?;
        let target = ListenTarget::from_config(&config.listener)?;

        let security = match &config.tls {
            Some(section) => Some(ListenerSecurity {
                material: TlsMaterial::from_section(section)?,
                client_certificate_mode: config.client_certificate_mode,
                evaluator: config.trust_policy().into(),
            }),
            None => None,
        };

        let non_rpc_warning = config.enable_non_rpc_warning.unwrap_or(true).then(|| {
            config
                .non_rpc_warning_message
                .clone()
                .unwrap_or_else(|| DEFAULT_NON_RPC_WARNING.to_string())
        });

        Self::bind(
            target,
            limits,
            security,
            ListenerOptions {
                enable_connection_logging: config.enable_connection_logging.unwrap_or(false),
                non_rpc_warning,
            },
        )
        .await
    }

    /// The resolved limits this listener was built with.
    pub fn limits(&self) -> &TransportLimits {
        &self.limits
    }

    /// The bound target.
    pub fn target(&self) -> &ListenTarget {
        &self.target
    }

    /// Local address for network bindings (useful with port 0).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.inner {
            ListenerInner::Tcp(listener) => listener.local_addr().ok(),
            ListenerInner::Unix(_) => None,
        }
    }

    /// Current free connection slots.
    pub fn available_permits(&self) -> usize {
        self.connection_permits.available_permits()
    }

    /// Accept one connection, respecting the connection ceiling and the
    /// shutdown signal.
    ///
    /// The TLS handshake (where the installed evaluator runs) is bounded
    /// by the request-headers timeout. A handshake failure, including a
    /// trust rejection, terminates only this connection.
    pub async fn accept(&self, shutdown: &CancellationToken) -> Result<ServerConnection, AcceptError> {
        // Acquire the permit first (backpressure), then accept.
        let permit = tokio::select! {
            _ = shutdown.cancelled() => return Err(AcceptError::Cancelled),
            permit = self.connection_permits.clone().acquire_owned() => {
                permit.expect("connection semaphore closed")
            }
        };

        let (io, peer) = tokio::select! {
            _ = shutdown.cancelled() => return Err(AcceptError::Cancelled),
            accepted = self.inner.accept() => accepted.map_err(AcceptError::Accept)?,
        };

        if self.options.enable_connection_logging {
            tracing::debug!(
                peer = %peer,
                available_permits = self.connection_permits.available_permits(),
                "Connection accepted"
            );
        }

        let io: Box<dyn Io> = match &self.tls {
            Some(acceptor) => {
                let handshake =
                    tokio::time::timeout(self.limits.request_headers_timeout, acceptor.accept(io));
                match handshake.await {
                    Err(_) => return Err(AcceptError::HandshakeTimeout),
                    Ok(Err(error)) => {
                        tracing::debug!(peer = %peer, %error, "Handshake rejected");
                        return Err(AcceptError::Handshake(error));
                    }
                    Ok(Ok(stream)) => Box::new(stream),
                }
            }
            None => io,
        };

        Ok(ServerConnection {
            io,
            peer,
            _permit: permit,
        })
    }

    /// Serve one accepted connection as HTTP/2, applying the stream cap
    /// and keep-alive from the resolved limits. `service` is the external
    /// RPC dispatch; requests that are not RPC traffic get the configured
    /// informational response instead.
    ///
    /// Waits for an upgraded-connection permit before serving and holds it
    /// for the connection's lifetime.
    pub async fn serve_connection<S>(
        &self,
        connection: ServerConnection,
        service: S,
    ) -> hyper::Result<()>
    where
        S: Service<Request<Incoming>, Response = Response<Full<Bytes>>, Error = Infallible>
            + Send
            + 'static,
        S::Future: Send + 'static,
    {
        let upgraded_permit = self
            .upgraded_permits
            .clone()
            .acquire_owned()
            .await
            .expect("upgraded-connection semaphore closed");

        if self.options.enable_connection_logging {
            tracing::debug!(peer = %connection.peer, "Serving HTTP/2 connection");
        }

        let service = WithFallback {
            inner: service,
            message: self
                .options
                .non_rpc_warning
                .as_deref()
                .map(Arc::<str>::from),
        };

        let mut builder = hyper::server::conn::http2::Builder::new(TokioExecutor::new());
        builder
            .timer(TokioTimer::new())
            .max_concurrent_streams(self.limits.max_streams_per_connection)
            .keep_alive_interval(self.limits.keep_alive_timeout)
            .keep_alive_timeout(self.limits.keep_alive_timeout);

        let result = builder
            .serve_connection(TokioIo::new(connection.io), service)
            .await;
        drop(upgraded_permit);
        result
    }
}

/// One accepted (and, when TLS is configured, handshaken) connection.
///
/// Holds its connection permit; dropping the connection releases the slot
/// even if the handler panics.
pub struct ServerConnection {
    io: Box<dyn Io>,
    peer: String,
    _permit: OwnedSemaphorePermit,
}

impl ServerConnection {
    pub fn peer(&self) -> &str {
        &self.peer
    }
}

/// Wraps the external dispatch service with the non-RPC fallback.
struct WithFallback<S> {
    inner: S,
    message: Option<Arc<str>>,
}

fn is_rpc_request<B>(request: &Request<B>) -> bool {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|content_type| content_type.starts_with("application/grpc"))
}

impl<S> Service<Request<Incoming>> for WithFallback<S>
where
    S: Service<Request<Incoming>, Response = Response<Full<Bytes>>, Error = Infallible>,
    S::Future: Send + 'static,
{
    type Response = Response<Full<Bytes>>;
    type Error = Infallible;
    type Future =
        Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, request: Request<Incoming>) -> Self::Future {
        if let Some(message) = &self.message {
            if !is_rpc_request(&request) {
                let mut response =
                    Response::new(Full::new(Bytes::from(message.to_string())));
                response
                    .headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
                return Box::pin(async move { Ok(response) });
            }
        }
        Box::pin(self.inner.call(request))
    }
}
