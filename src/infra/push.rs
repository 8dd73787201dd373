use futures_util::{SinkExt as _, StreamExt as _};
use rand_core::OsRng;
use rand_core::RngCore as _;
use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

const INITIAL_BACKOFF_MS: u64 = 250;
const MAX_BACKOFF_MS: u64 = 30_000;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PushEvent {
    /// A connection was (re-)established; anything pushed while disconnected
    /// was missed, so listeners should resync.
    Connected,
    /// The server announced that session data changed elsewhere.
    ExternalChange,
    Disconnected(String),
}

#[derive(Debug, Error)]
pub enum PushError {
    #[error("failed to start push runtime: {0}")]
    Runtime(#[source] io::Error),

    #[error("failed to spawn push thread: {0}")]
    Thread(#[source] io::Error),

    #[error("websocket error: {0}")]
    Ws(String),
}

/// Keeps the push channel alive; dropping it shuts the listener down.
pub struct PushSubscription {
    shutdown: watch::Sender<bool>,
}

impl Drop for PushSubscription {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

/// Listens on the updates websocket from a background thread and reports
/// every event through `on_event`. Reconnects with capped exponential backoff.
pub fn subscribe_to_external_changes<F>(
    url: Url,
    on_event: F,
) -> Result<PushSubscription, PushError>
where
    F: Fn(PushEvent) + Send + 'static,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(PushError::Runtime)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    std::thread::Builder::new()
        .name("stopwatch-push".to_string())
        .spawn(move || runtime.block_on(push_loop(url, on_event, shutdown_rx)))
        .map_err(PushError::Thread)?;

    Ok(PushSubscription {
        shutdown: shutdown_tx,
    })
}

async fn push_loop<F>(url: Url, on_event: F, mut shutdown_rx: watch::Receiver<bool>)
where
    F: Fn(PushEvent),
{
    let mut backoff_ms = INITIAL_BACKOFF_MS;

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((ws, _response)) => {
                backoff_ms = INITIAL_BACKOFF_MS;
                log::info!("push channel connected to {url}");
                on_event(PushEvent::Connected);

                let reason = match listen(ws, &on_event, &mut shutdown_rx).await {
                    Ok(()) => "closed by server".to_string(),
                    Err(error) => error.to_string(),
                };
                if *shutdown_rx.borrow() {
                    break;
                }
                log::warn!("push channel lost: {reason}");
                on_event(PushEvent::Disconnected(reason));
            }
            Err(error) => {
                log::warn!("push channel connect to {url} failed: {error}");
            }
        }

        let sleep_ms = backoff_ms.saturating_add(jitter_ms(backoff_ms / 4));
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(sleep_ms)) => {}
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
        backoff_ms = backoff_ms.saturating_mul(2).min(MAX_BACKOFF_MS);
    }

    log::debug!("push channel shut down");
}

async fn listen<F>(
    mut ws: WsStream,
    on_event: &F,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> Result<(), PushError>
where
    F: Fn(PushEvent),
{
    loop {
        tokio::select! {
            biased;
            Ok(()) = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    let _ = ws.send(Message::Close(None)).await;
                    return Ok(());
                }
            }
            msg = ws.next() => {
                let Some(msg) = msg else {
                    return Ok(());
                };
                match msg.map_err(|error| PushError::Ws(error.to_string()))? {
                    Message::Text(_) | Message::Binary(_) => on_event(PushEvent::ExternalChange),
                    Message::Ping(bytes) => {
                        ws.send(Message::Pong(bytes))
                            .await
                            .map_err(|error| PushError::Ws(error.to_string()))?;
                    }
                    Message::Close(_) => return Ok(()),
                    _ => {}
                }
            }
        }
    }
}

fn jitter_ms(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }
    let mut rng = OsRng;
    let mut buf = [0u8; 8];
    rng.fill_bytes(&mut buf);
    let n = u64::from_le_bytes(buf);
    n % (max_ms + 1)
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;
