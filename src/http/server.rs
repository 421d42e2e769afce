//! Web server: listener lifecycle, accept loop and per-connection serving.
//!
//! # Responsibilities
//! - Hold the set of registered handlers (extensions)
//! - On start: snapshot the route table, bind, spawn the accept loop
//! - One task per accepted connection (TLS handshake, then HTTP/1.1)
//! - On stop: stop accepting, abort the accept loop, close the socket
//!
//! # Lifecycle
//! ```text
//! Created ──start()──▶ Started ──stop()──▶ Stopped (terminal)
//!    │                   │ start() is a no-op
//!    └──────stop()───────┴──────────────────▶ Stopped
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;

use crate::config::WebServerConfig;
use crate::entrypoint::{Bridge, Handler};
use crate::http::Dispatcher;
use crate::net::{build_acceptor, ConnectionGuard, ConnectionPermit, ConnectionTracker, Listener, ListenerError, TlsError};
use crate::routing::{router::same_handler, RouteError, RouteTable};

/// Error raised when a server cannot start.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("listener error: {0}")]
    Listener(#[from] ListenerError),

    #[error("TLS setup failed: {0}")]
    Tls(#[from] TlsError),

    #[error("route table error: {0}")]
    Route(#[from] RouteError),

    #[error("server has been stopped")]
    Stopped,
}

/// Per-connection settings derived from the engine options.
#[derive(Debug, Clone, Copy)]
struct ConnectionSettings {
    keep_alive: bool,
    header_read_timeout: Option<Duration>,
    suppress_ragged_eofs: bool,
}

enum ServerState {
    Created,
    Started(Running),
    Stopped,
}

struct Running {
    local_addr: SocketAddr,
    accepting: Arc<AtomicBool>,
    accept_task: JoinHandle<()>,
}

/// One listener and accept loop, shared by every handler bound to the same
/// configuration.
pub struct WebServer {
    config: WebServerConfig,
    bridge: Arc<Bridge>,
    extensions: Mutex<Vec<Arc<dyn Handler>>>,
    state: tokio::sync::Mutex<ServerState>,
    local_addr: OnceLock<SocketAddr>,
    tracker: ConnectionTracker,
}

impl std::fmt::Debug for WebServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebServer")
            .field("bind_address", &self.config.bind_address())
            .field("tls", &self.config.tls.is_some())
            .field("local_addr", &self.local_addr.get())
            .field("active_connections", &self.tracker.active_count())
            .finish_non_exhaustive()
    }
}

impl WebServer {
    pub fn new(config: WebServerConfig, bridge: Bridge) -> Self {
        if !config.server.extra.is_empty() {
            tracing::info!(
                options = ?config.server.extra.keys().collect::<Vec<_>>(),
                "Ignoring unrecognised server options"
            );
        }

        Self {
            config,
            bridge: Arc::new(bridge),
            extensions: Mutex::new(Vec::new()),
            state: tokio::sync::Mutex::new(ServerState::Created),
            local_addr: OnceLock::new(),
            tracker: ConnectionTracker::new(),
        }
    }

    pub fn config(&self) -> &WebServerConfig {
        &self.config
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    /// Add a handler. Takes effect at the next `start()`. Returns false if it
    /// was already registered.
    pub fn register_extension(&self, handler: Arc<dyn Handler>) -> bool {
        let mut extensions = self.extensions.lock().unwrap_or_else(PoisonError::into_inner);
        if extensions.iter().any(|h| same_handler(h, &handler)) {
            return false;
        }
        tracing::debug!(entrypoint = handler.name(), rule = handler.rule(), "Extension registered");
        extensions.push(handler);
        true
    }

    /// Remove a handler. Returns false if it was not registered.
    pub fn unregister_extension(&self, handler: &Arc<dyn Handler>) -> bool {
        let mut extensions = self.extensions.lock().unwrap_or_else(PoisonError::into_inner);
        let before = extensions.len();
        extensions.retain(|h| !same_handler(h, handler));
        let removed = extensions.len() != before;
        if removed {
            tracing::debug!(entrypoint = handler.name(), "Extension unregistered");
        }
        removed
    }

    pub fn extension_count(&self) -> usize {
        self.extensions.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Build the route table, bind and start accepting. A no-op when already
    /// started.
    pub async fn start(&self) -> Result<SocketAddr, ServerError> {
        let mut state = self.state.lock().await;
        match &*state {
            ServerState::Started(running) => return Ok(running.local_addr),
            ServerState::Stopped => return Err(ServerError::Stopped),
            ServerState::Created => {}
        }

        let routes = {
            let extensions = self.extensions.lock().unwrap_or_else(PoisonError::into_inner);
            RouteTable::from_handlers(extensions.iter())?
        };

        let tls = self.config.tls.as_ref().map(build_acceptor).transpose()?;
        let listener = Listener::bind(&self.config.bind_address(), self.config.server.max_connections).await?;
        let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;
        let _ = self.local_addr.set(local_addr);

        tracing::info!(
            address = %local_addr,
            tls = tls.is_some(),
            routes = routes.len(),
            max_connections = self.config.server.max_connections,
            "Web server listening"
        );

        let dispatcher = Arc::new(
            Dispatcher::new(Arc::new(routes), Arc::clone(&self.bridge)).with_debug(self.config.server.debug),
        );
        let accepting = Arc::new(AtomicBool::new(true));
        let accept_task = tokio::spawn(accept_loop(
            listener,
            dispatcher,
            tls,
            self.connection_settings(),
            Arc::clone(&accepting),
            self.tracker.clone(),
        ));

        *state = ServerState::Started(Running {
            local_addr,
            accepting,
            accept_task,
        });
        Ok(local_addr)
    }

    /// Stop accepting and close the listening socket. In-flight connections
    /// finish on their own; see [`wait_connections_closed`](Self::wait_connections_closed).
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        if let ServerState::Started(running) = std::mem::replace(&mut *state, ServerState::Stopped) {
            running.accepting.store(false, Ordering::Release);
            running.accept_task.abort();
            let _ = running.accept_task.await;
            tracing::info!(
                address = ?self.local_addr.get(),
                active_connections = self.tracker.active_count(),
                "Web server stopped"
            );
        }
    }

    pub async fn is_running(&self) -> bool {
        matches!(*self.state.lock().await, ServerState::Started(_))
    }

    /// Address actually bound, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Wait for open connections to finish. Returns false on timeout.
    pub async fn wait_connections_closed(&self, timeout: Duration) -> bool {
        self.tracker.wait_idle(timeout).await
    }

    fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            keep_alive: self.config.server.keep_alive,
            header_read_timeout: self.config.server.socket_timeout_secs.map(Duration::from_secs),
            suppress_ragged_eofs: self.config.tls.as_ref().map_or(true, |tls| tls.suppress_ragged_eofs),
        }
    }
}

impl Drop for WebServer {
    fn drop(&mut self) {
        if let ServerState::Started(running) = self.state.get_mut() {
            running.accepting.store(false, Ordering::Release);
            running.accept_task.abort();
        }
    }
}

async fn accept_loop(
    listener: Listener,
    dispatcher: Arc<Dispatcher>,
    tls: Option<TlsAcceptor>,
    settings: ConnectionSettings,
    accepting: Arc<AtomicBool>,
    tracker: ConnectionTracker,
) {
    while accepting.load(Ordering::Acquire) {
        let (stream, peer_addr, permit) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(ListenerError::Closed) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Accept failed");
                tokio::time::sleep(Duration::from_millis(10)).await;
                continue;
            }
        };

        if !accepting.load(Ordering::Acquire) {
            break;
        }

        let guard = tracker.track();
        tokio::spawn(serve_connection(
            stream,
            peer_addr,
            permit,
            guard,
            Arc::clone(&dispatcher),
            tls.clone(),
            settings,
        ));
    }

    tracing::debug!("Accept loop exited");
}

async fn serve_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    _permit: ConnectionPermit,
    guard: ConnectionGuard,
    dispatcher: Arc<Dispatcher>,
    tls: Option<TlsAcceptor>,
    settings: ConnectionSettings,
) {
    let connection_id = guard.id();
    tracing::debug!(connection_id = %connection_id, peer_addr = %peer_addr, "Connection opened");

    let result = match tls {
        Some(acceptor) => match acceptor.accept(stream).await {
            Ok(stream) => serve_http(stream, dispatcher, settings).await,
            Err(e) => {
                tracing::warn!(connection_id = %connection_id, peer_addr = %peer_addr, error = %e, "TLS handshake failed");
                return;
            }
        },
        None => serve_http(stream, dispatcher, settings).await,
    };

    if let Err(e) = result {
        if settings.suppress_ragged_eofs && is_ragged_eof(&e) {
            tracing::debug!(connection_id = %connection_id, error = %e, "Connection closed without close_notify");
        } else {
            tracing::warn!(connection_id = %connection_id, peer_addr = %peer_addr, error = %e, "Connection error");
        }
    }

    tracing::debug!(connection_id = %connection_id, "Connection closed");
}

async fn serve_http<S>(stream: S, dispatcher: Arc<Dispatcher>, settings: ConnectionSettings) -> Result<(), hyper::Error>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let service = service_fn(move |request: http::Request<Incoming>| {
        let dispatcher = Arc::clone(&dispatcher);
        async move { Ok::<_, Infallible>(dispatcher.dispatch(request).await) }
    });

    let mut builder = http1::Builder::new();
    builder.keep_alive(settings.keep_alive).timer(TokioTimer::new());
    if let Some(timeout) = settings.header_read_timeout {
        builder.header_read_timeout(timeout);
    }

    builder.serve_connection(TokioIo::new(stream), service).await
}

/// True for a peer that hung up mid-stream without a clean shutdown.
fn is_ragged_eof(error: &hyper::Error) -> bool {
    if error.is_incomplete_message() {
        return true;
    }
    let mut source = std::error::Error::source(error);
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            return io.kind() == std::io::ErrorKind::UnexpectedEof;
        }
        source = err.source();
    }
    false
}
