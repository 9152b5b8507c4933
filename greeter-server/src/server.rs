//! TCP server for the chat adapter.

use crate::broadcast::Notification;
use crate::config::NetworkConfig;
use crate::error::ServerError;
use crate::handler::CommandHandler;
use crate::protocol::{Request, Response};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

/// Maximum request line size, newline included.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Idle connection timeout. Subscribed connections are exempt.
    pub idle_timeout: Duration,
    /// Maximum concurrent connections.
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        NetworkConfig::default().into()
    }
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }
}

impl From<NetworkConfig> for ServerConfig {
    fn from(network: NetworkConfig) -> Self {
        Self {
            bind_addr: network.bind_addr,
            idle_timeout: network.idle_timeout(),
            max_connections: network.max_connections,
        }
    }
}

/// Server statistics.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
    pub requests_total: AtomicU64,
    pub errors_total: AtomicU64,
}

/// Line-delimited JSON server the chat adapter connects to.
pub struct Server {
    config: ServerConfig,
    handler: Arc<CommandHandler>,
    stats: Arc<ServerStats>,
    shutdown: broadcast::Sender<()>,
}

impl Server {
    pub fn new(config: ServerConfig, handler: Arc<CommandHandler>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            handler,
            stats: Arc::new(ServerStats::default()),
            shutdown: shutdown_tx,
        }
    }

    /// Binds the configured address and serves until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serves connections from an already bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        tracing::info!("Server listening on {}", listener.local_addr()?);

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.stats.connections_active.load(Ordering::Relaxed)
                                >= self.config.max_connections as u64
                            {
                                tracing::warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            self.stats.connections_total.fetch_add(1, Ordering::Relaxed);
                            self.stats.connections_active.fetch_add(1, Ordering::Relaxed);

                            let handler = self.handler.clone();
                            let stats = self.stats.clone();
                            let config = self.config.clone();
                            let mut conn_shutdown = self.shutdown.subscribe();

                            tokio::spawn(async move {
                                let result = Self::handle_connection(
                                    stream,
                                    addr,
                                    handler,
                                    stats.clone(),
                                    config,
                                    &mut conn_shutdown,
                                )
                                .await;

                                if let Err(e) = result {
                                    tracing::debug!("Connection {} error: {}", addr, e);
                                }

                                stats.connections_active.fetch_sub(1, Ordering::Relaxed);
                                tracing::info!("Client disconnected: {}", addr);
                            });
                        }
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        handler: Arc<CommandHandler>,
        stats: Arc<ServerStats>,
        config: ServerConfig,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        tracing::info!("Client connected: {}", addr);

        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        let mut notifications: Option<broadcast::Receiver<Notification>> = None;

        loop {
            tokio::select! {
                biased;

                received = next_notification(&mut notifications) => {
                    match received {
                        Ok(notification) => {
                            let push = Response::Notify {
                                chat_id: notification.chat_id,
                                members: notification.members,
                            };
                            tracing::debug!("[{}] Pushing notification", addr);
                            writer.write_all(&push.to_line()?).await?;
                        }
                        Err(RecvError::Lagged(n)) => {
                            tracing::warn!("[{}] Subscriber lagged {} notifications", addr, n);
                        }
                        Err(RecvError::Closed) => {
                            notifications = None;
                        }
                    }
                }

                read = read_request_line(&mut reader, &mut buf) => {
                    let n = read?;
                    if buf.last() != Some(&b'\n') {
                        if buf.len() > MAX_LINE_BYTES {
                            let err = ServerError::InvalidRequest(format!(
                                "request line exceeds {} bytes",
                                MAX_LINE_BYTES
                            ));
                            tracing::warn!("[{}] {}", addr, err);
                            stats.errors_total.fetch_add(1, Ordering::Relaxed);
                            let response = Response::error(err.error_code(), err.to_string());
                            writer.write_all(&response.to_line()?).await?;
                            return Err(err);
                        }
                        if n == 0 {
                            tracing::debug!("[{}] Connection closed by client", addr);
                            return Ok(());
                        }
                        continue;
                    }

                    let line = std::mem::take(&mut buf);
                    if line.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    stats.requests_total.fetch_add(1, Ordering::Relaxed);

                    let response = match serde_json::from_slice::<Request>(&line) {
                        Ok(Request::Subscribe) => {
                            if notifications.is_none() {
                                notifications = Some(handler.subscribe());
                            }
                            Response::Subscribed
                        }
                        Ok(request) => {
                            tracing::debug!("[{}] Request: {:?}", addr, request);
                            handler.handle(&request)
                        }
                        Err(e) => {
                            let err = ServerError::Json(e);
                            tracing::warn!("[{}] Malformed request: {}", addr, err);
                            Response::error(err.error_code(), err.to_string())
                        }
                    };

                    if response.is_error() {
                        stats.errors_total.fetch_add(1, Ordering::Relaxed);
                    }
                    writer.write_all(&response.to_line()?).await?;
                }

                _ = tokio::time::sleep(config.idle_timeout), if notifications.is_none() => {
                    tracing::debug!("[{}] Idle timeout", addr);
                    return Ok(());
                }

                _ = shutdown.recv() => {
                    tracing::debug!("[{}] Shutdown signal received", addr);
                    return Err(ServerError::ShuttingDown);
                }
            }
        }
    }

    /// Initiates server shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    /// Returns server statistics.
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }
}

/// Appends bytes up to and including the next newline to `buf`, reading at most one byte past
/// [`MAX_LINE_BYTES`] in total. Partial lines stay in `buf` across calls.
async fn read_request_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let remaining = (MAX_LINE_BYTES + 1).saturating_sub(buf.len()) as u64;
    reader.take(remaining).read_until(b'\n', buf).await
}

/// Waits for the next notification, or forever when not subscribed.
async fn next_notification(
    receiver: &mut Option<broadcast::Receiver<Notification>>,
) -> Result<Notification, RecvError> {
    match receiver {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
