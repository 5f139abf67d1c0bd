//! TCP client for the interception host bridge.
//!
//! The host pushes one JSON `SessionEvent` per line; commands go back the same way.
//! A closed or failed read side is reported as a `Disconnected` event.

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Result, TraderError};
use crate::session::{decode_line, encode_line, MessageSink, OutgoingMessage, SessionEvent};

/// Buffered notifications between the socket reader and the dispatcher
const EVENT_BUFFER: usize = 256;

pub struct BridgeClient {
    writer: Mutex<OwnedWriteHalf>,
    reader_task: JoinHandle<()>,
}

impl BridgeClient {
    /// Connect to the host, failing with `HostUnreachable` when nothing answers within `window`
    pub async fn connect(
        host: &str,
        port: u16,
        window: Duration,
    ) -> Result<(Self, mpsc::Receiver<SessionEvent>)> {
        info!("Starting connection to G-Earth...");

        let unreachable = || TraderError::HostUnreachable {
            host: host.to_string(),
            port,
        };
        let stream = tokio::time::timeout(window, TcpStream::connect((host, port)))
            .await
            .map_err(|_| unreachable())?
            .map_err(|e| {
                debug!(error = %e, "connect to interception host failed");
                unreachable()
            })?;
        stream.set_nodelay(true)?;

        let (reader, writer) = stream.into_split();
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let reader_task = tokio::spawn(read_events(reader, event_tx));

        info!("Connected to G-Earth on port {}", port);

        Ok((
            Self {
                writer: Mutex::new(writer),
                reader_task,
            },
            event_rx,
        ))
    }
}

impl Drop for BridgeClient {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

#[async_trait]
impl MessageSink for BridgeClient {
    async fn send(&self, message: OutgoingMessage) -> Result<()> {
        let line = encode_line(&message)?;
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        debug!(message = message.kind(), "sent to interception host");
        Ok(())
    }
}

async fn read_events(reader: OwnedReadHalf, event_tx: mpsc::Sender<SessionEvent>) {
    let mut lines = BufReader::new(reader).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match decode_line(&line) {
                Ok(Some(event)) => {
                    if event_tx.send(event).await.is_err() {
                        debug!("event receiver dropped, stopping bridge reader");
                        return;
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("Skipping bridge line: {}", e),
            },
            Ok(None) => {
                info!("Interception host closed the connection");
                break;
            }
            Err(e) => {
                warn!("Bridge read failed: {}", e);
                break;
            }
        }
    }

    let _ = event_tx.send(SessionEvent::Disconnected).await;
}
