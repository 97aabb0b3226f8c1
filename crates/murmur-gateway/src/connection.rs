use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use murmur_types::UserId;

use crate::error::GatewayError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// What the connection hands to its consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// One raw text frame. May hold several newline-separated envelopes.
    Payload(String),
    /// The transport dropped and was re-established. Events may have been
    /// missed in between.
    Resumed,
    /// The transport is gone for good; the handle is inert from here on.
    Closed,
}

/// What to do when an established connection drops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Stay disconnected.
    #[default]
    Never,
    /// Retry with exponentially growing delays, capped at `max`.
    Backoff {
        initial: Duration,
        max: Duration,
        max_attempts: u32,
    },
}

impl ReconnectPolicy {
    pub fn backoff(max_attempts: u32) -> Self {
        Self::Backoff {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(30),
            max_attempts,
        }
    }

    /// Delay before reconnect attempt number `attempt` (0-based), or `None`
    /// when no further attempt should be made.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        match *self {
            Self::Never => None,
            Self::Backoff { initial, max, max_attempts } => {
                if attempt >= max_attempts {
                    return None;
                }
                let factor = 1u32 << attempt.min(16);
                Some(initial.saturating_mul(factor).min(max))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the gateway endpoint, e.g. `ws://localhost:8080/ws`.
    pub url: String,
    pub reconnect: ReconnectPolicy,
    /// Frames buffered between the reader task and the consumer.
    pub inbound_capacity: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8080/ws".into(),
            reconnect: ReconnectPolicy::Never,
            inbound_capacity: 256,
        }
    }
}

/// Build the per-identity gateway URL. `http(s)` bases are mapped to `ws(s)`.
pub fn endpoint(base: &str, identity: UserId) -> Result<Url, GatewayError> {
    let mut url = Url::parse(base)?;
    let scheme = match url.scheme() {
        "ws" | "http" => "ws",
        "wss" | "https" => "wss",
        other => return Err(GatewayError::Scheme(other.to_string())),
    };
    if url.scheme() != scheme && url.set_scheme(scheme).is_err() {
        return Err(GatewayError::Scheme(url.scheme().to_string()));
    }
    url.query_pairs_mut()
        .append_pair("userID", &identity.to_string());
    Ok(url)
}

/// The single live gateway connection of a session.
///
/// Owned by whoever runs the session; dropping it or calling
/// [`Connection::disconnect`] closes the transport.
pub struct Connection {
    inbound: mpsc::Receiver<Inbound>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Connection {
    /// Open the gateway for `identity`. Errors only if the initial handshake
    /// fails; later failures are reported as [`Inbound::Closed`].
    pub async fn connect(config: &GatewayConfig, identity: UserId) -> Result<Self, GatewayError> {
        let url = endpoint(&config.url, identity)?;
        let (stream, _) = connect_async(url.as_str()).await?;
        info!("Connected to gateway {} as user {}", config.url, identity);

        let (tx, rx) = mpsc::channel(config.inbound_capacity.max(1));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_reader(
            stream,
            url,
            config.reconnect.clone(),
            tx,
            cancel.clone(),
        ));

        Ok(Self {
            inbound: rx,
            cancel,
            task: Some(task),
        })
    }

    /// Drive a session from an in-process source instead of a socket
    /// (replays, tests).
    pub fn from_receiver(inbound: mpsc::Receiver<Inbound>) -> Self {
        Self {
            inbound,
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    /// Next inbound item. `None` once the reader is gone.
    pub async fn recv(&mut self) -> Option<Inbound> {
        self.inbound.recv().await
    }

    /// Close the transport and wait for the reader task to finish.
    pub async fn disconnect(mut self) {
        self.cancel.cancel();
        self.inbound.close();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Gateway reader task failed: {}", e);
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

enum PumpExit {
    Cancelled,
    ReceiverGone,
    Lost,
}

async fn run_reader(
    mut stream: WsStream,
    url: Url,
    policy: ReconnectPolicy,
    tx: mpsc::Sender<Inbound>,
    cancel: CancellationToken,
) {
    loop {
        match pump(&mut stream, &tx, &cancel).await {
            PumpExit::Cancelled => {
                if let Err(e) = stream.close(None).await {
                    debug!("Gateway close handshake failed: {}", e);
                }
                info!("Gateway connection closed");
                return;
            }
            PumpExit::ReceiverGone => {
                let _ = stream.close(None).await;
                debug!("Gateway consumer went away, closing");
                return;
            }
            PumpExit::Lost => {}
        }

        match reconnect(&url, &policy, &cancel).await {
            Some(fresh) => {
                stream = fresh;
                if tx.send(Inbound::Resumed).await.is_err() {
                    let _ = stream.close(None).await;
                    return;
                }
            }
            None => {
                if !cancel.is_cancelled() {
                    warn!("Gateway connection lost, no further reconnect attempts");
                    let _ = tx.send(Inbound::Closed).await;
                }
                return;
            }
        }
    }
}

async fn pump(
    stream: &mut WsStream,
    tx: &mpsc::Sender<Inbound>,
    cancel: &CancellationToken,
) -> PumpExit {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => return PumpExit::Cancelled,
            frame = stream.next() => frame,
        };

        let text = match frame {
            Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
            Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                Ok(text) => text,
                Err(_) => {
                    warn!("Dropping non-UTF-8 binary frame ({} bytes)", data.len());
                    continue;
                }
            },
            Some(Ok(Message::Close(frame))) => {
                info!("Gateway closed the connection: {:?}", frame);
                return PumpExit::Lost;
            }
            // Ping/Pong are answered by tungstenite itself
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                warn!("Gateway connection error: {}", e);
                return PumpExit::Lost;
            }
            None => {
                warn!("Gateway stream ended");
                return PumpExit::Lost;
            }
        };

        if tx.send(Inbound::Payload(text)).await.is_err() {
            return PumpExit::ReceiverGone;
        }
    }
}

async fn reconnect(url: &Url, policy: &ReconnectPolicy, cancel: &CancellationToken) -> Option<WsStream> {
    let mut attempt = 0;
    while let Some(delay) = policy.delay(attempt) {
        attempt += 1;
        info!("Reconnecting to gateway in {:?} (attempt {})", delay, attempt);
        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(delay) => {}
        }
        let attempted = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Reconnect attempt {} abandoned, connection cancelled", attempt);
                return None;
            }
            attempted = connect_async(url.as_str()) => attempted,
        };
        match attempted {
            Ok((stream, _)) => {
                info!("Gateway connection re-established after {} attempt(s)", attempt);
                return Some(stream);
            }
            Err(e) => warn!("Reconnect attempt {} failed: {}", attempt, e),
        }
    }
    None
}
