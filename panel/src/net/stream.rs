//! VU push-stream client: subscribes to the backend's WebSocket, parses
//! `vu` frames, and forwards them to the view loop over an mpsc channel.
//!
//! Reconnection lives here, not in the meter: a dropped link just stops the
//! flow of samples and the hold freezes until frames resume. Backoff is
//! exponential, capped, and resets once a connection delivers frames again.

use futures_util::StreamExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{info, warn};

use crate::net::protocol::VuFrame;

const BACKOFF_INITIAL: Duration = Duration::from_millis(500);
const BACKOFF_MAX: Duration = Duration::from_secs(8);

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Handle to a live VU subscription. Dropping it tears the task down.
pub struct VuStream {
    rx: mpsc::Receiver<VuFrame>,
    task: JoinHandle<()>,
}

impl VuStream {
    /// Subscribe to `ws://host/ws?deviceId=..[&ch=..]` and keep the
    /// subscription alive across disconnects.
    pub fn subscribe(ws_url: String) -> Self {
        let (tx, rx) = mpsc::channel(64);
        let task = tokio::spawn(run(ws_url, tx));
        Self { rx, task }
    }

    /// Next frame; `None` once the stream task has ended.
    pub async fn recv(&mut self) -> Option<VuFrame> {
        self.rx.recv().await
    }

    /// Build the subscription URL for a device and optional channel filter.
    pub fn url(ws_base: &str, device_id: &str, ch: Option<usize>) -> String {
        match ch {
            Some(ch) => format!("{ws_base}/ws?deviceId={device_id}&ch={ch}"),
            None => format!("{ws_base}/ws?deviceId={device_id}"),
        }
    }
}

impl Drop for VuStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(ws_url: String, tx: mpsc::Sender<VuFrame>) {
    let mut backoff = BACKOFF_INITIAL;
    loop {
        match connect_and_stream(&ws_url, &tx).await {
            Ok(forwarded) => {
                if forwarded > 0 {
                    backoff = BACKOFF_INITIAL;
                }
                warn!("vu stream closed, reconnecting in {:?}", backoff);
            }
            Err(e) => {
                warn!("vu stream error: {e}, reconnecting in {:?}", backoff);
            }
        }
        if tx.is_closed() {
            return;
        }
        sleep(backoff).await;
        backoff = (backoff * 2).min(BACKOFF_MAX);
    }
}

/// One connection's lifetime; returns how many frames were forwarded.
async fn connect_and_stream(
    ws_url: &str,
    tx: &mpsc::Sender<VuFrame>,
) -> Result<usize, StreamError> {
    info!("connecting to vu stream at {ws_url}");
    let (ws, _) = connect_async(ws_url).await?;
    info!("vu stream connected");

    let (_write, mut read) = ws.split();
    let mut forwarded = 0usize;

    while let Some(msg) = read.next().await {
        match msg? {
            Message::Text(text) => match serde_json::from_str::<VuFrame>(&text) {
                Ok(frame) if frame.is_vu() => {
                    if tx.send(frame).await.is_err() {
                        // Consumer went away; nothing left to feed.
                        return Ok(forwarded);
                    }
                    forwarded += 1;
                }
                Ok(_) => {}
                Err(e) => warn!("skipping unparseable frame: {e}"),
            },
            Message::Close(_) => {
                info!("vu stream closed by server");
                break;
            }
            _ => {}
        }
    }
    Ok(forwarded)
}
