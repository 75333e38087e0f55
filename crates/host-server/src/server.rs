use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use rustls::ServerConfig;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, timeout};
use tokio_rustls::TlsAcceptor;
use tokio_rustls::server::TlsStream;
use tracing::{debug, info, warn};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);
const READY_CONNECTION_QUEUE: usize = 64;

#[derive(Debug, Error)]
pub enum HostServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },
    #[error("{listener} listener failed: {source}")]
    Serve {
        listener: &'static str,
        source: io::Error,
    },
}

/// Fires once when both listeners should stop accepting connections.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

#[derive(Debug)]
pub struct ShutdownTrigger {
    sender: watch::Sender<bool>,
}

pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (sender, receiver) = watch::channel(false);
    (ShutdownTrigger { sender }, ShutdownSignal { receiver })
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }
}

impl ShutdownSignal {
    /// Resolves once shutdown was triggered or the trigger was dropped.
    pub async fn recv(&mut self) {
        let _ = self.receiver.wait_for(|stopped| *stopped).await;
    }
}

pub async fn bind(addr: SocketAddr) -> Result<TcpListener, HostServerError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| HostServerError::Bind { addr, source })
}

/// TCP listener that hands out connections only after a completed TLS
/// handshake.
///
/// Handshakes run on their own tasks, so a slow or broken client never holds
/// up the accept loop. A failed handshake is logged and the connection dropped.
pub struct TlsListener {
    ready: mpsc::Receiver<(TlsStream<TcpStream>, SocketAddr)>,
    local_addr: SocketAddr,
}

impl TlsListener {
    pub fn new(listener: TcpListener, tls_config: Arc<ServerConfig>) -> io::Result<Self> {
        let local_addr = listener.local_addr()?;
        let (sender, ready) = mpsc::channel(READY_CONNECTION_QUEUE);
        tokio::spawn(accept_tls_connections(
            listener,
            TlsAcceptor::from(tls_config),
            sender,
        ));

        Ok(Self { ready, local_addr })
    }
}

impl axum::serve::Listener for TlsListener {
    type Io = TlsStream<TcpStream>;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        match self.ready.recv().await {
            Some(connection) => connection,
            // The accept loop only stops once this listener is gone.
            None => std::future::pending().await,
        }
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        Ok(self.local_addr)
    }
}

async fn accept_tls_connections(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    ready: mpsc::Sender<(TlsStream<TcpStream>, SocketAddr)>,
) {
    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(err) => {
                    warn!(error = %err, "failed to accept https connection");
                    sleep(ACCEPT_ERROR_BACKOFF).await;
                    continue;
                }
            },
            () = ready.closed() => break,
        };

        let acceptor = acceptor.clone();
        let ready = ready.clone();
        tokio::spawn(async move {
            match timeout(HANDSHAKE_TIMEOUT, acceptor.accept(stream)).await {
                Ok(Ok(tls_stream)) => {
                    if ready.send((tls_stream, peer)).await.is_err() {
                        debug!(peer = %peer, "dropping connection accepted during shutdown");
                    }
                }
                Ok(Err(err)) => warn!(peer = %peer, error = %err, "tls handshake failed"),
                Err(_) => warn!(peer = %peer, "tls handshake timed out"),
            }
        });
    }

    debug!("tls accept loop stopped");
}

/// Serves the static router over TLS until shutdown. Open connections finish
/// their in-flight requests before the listener returns.
pub async fn serve_https(
    listener: TcpListener,
    tls_config: Arc<ServerConfig>,
    app: Router,
    mut shutdown: ShutdownSignal,
) -> Result<(), HostServerError> {
    let serve_err = |source| HostServerError::Serve {
        listener: "https",
        source,
    };

    let listener = TlsListener::new(listener, tls_config).map_err(serve_err)?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.recv().await })
        .await
        .map_err(serve_err)?;

    info!("https listener stopped");
    Ok(())
}

/// Serves the plaintext redirect router until shutdown.
pub async fn serve_redirect(
    listener: TcpListener,
    app: Router,
    mut shutdown: ShutdownSignal,
) -> Result<(), HostServerError> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.recv().await })
        .await
        .map_err(|source| HostServerError::Serve {
            listener: "http redirect",
            source,
        })?;

    info!("http redirect listener stopped");
    Ok(())
}
