use crate::config::LiveFeedConfig;
use crate::db::models::{DetectionBatch, FeedCommand, FeedMessage, Resolution};
use crate::detection::{BatchCallback, DetectionSource, FeedSource};
use crate::error::Error;
use crate::messaging::Notifier;
use anyhow::Result;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

/// What the live feed view shows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveFeedState {
    pub connected: bool,
    pub playing: bool,
    /// Latest base64 JPEG frame
    pub frame: Option<String>,
    pub detections: Option<DetectionBatch>,
    pub fps: f64,
    pub resolution: Option<Resolution>,
    pub connection_error: Option<String>,
}

/// Apply one inbound socket message to `state`.
///
/// Returns the batch to forward for `frame` messages. Malformed messages are
/// logged and leave `state` untouched.
pub fn apply_message(state: &mut LiveFeedState, text: &str) -> Option<DetectionBatch> {
    match serde_json::from_str::<FeedMessage>(text) {
        Ok(FeedMessage::Frame(frame)) => {
            let batch = DetectionBatch::from(frame.detections);
            state.frame = Some(frame.frame);
            state.detections = Some(batch.clone());
            state.fps = frame.fps;
            state.resolution = Some(frame.resolution);
            Some(batch)
        }
        Ok(FeedMessage::Other) => {
            debug!("Ignoring non-frame message");
            None
        }
        Err(e) => {
            warn!("Error parsing feed message: {}", e);
            None
        }
    }
}

struct Connection {
    outbound: mpsc::UnboundedSender<Message>,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Client for the external analytics WebSocket
pub struct LiveFeedClient {
    url: String,
    notifier: Notifier,
    state: Arc<watch::Sender<LiveFeedState>>,
    on_batch: Arc<StdMutex<Option<BatchCallback>>>,
    connection: Mutex<Option<Connection>>,
}

impl LiveFeedClient {
    /// Create a new client; nothing is opened until [`connect`](Self::connect)
    pub fn new(config: &LiveFeedConfig, notifier: Notifier) -> Self {
        let (state, _) = watch::channel(LiveFeedState::default());
        Self {
            url: config.server_url.clone(),
            notifier,
            state: Arc::new(state),
            on_batch: Arc::new(StdMutex::new(None)),
            connection: Mutex::new(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> LiveFeedState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LiveFeedState> {
        self.state.subscribe()
    }

    /// Register the receiver of forwarded batches
    pub fn on_batch(&self, callback: Option<BatchCallback>) {
        *self
            .on_batch
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = callback;
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.lock().await.is_some() && self.state.borrow().connected
    }

    /// Open the socket. An existing connection is closed first.
    pub async fn connect(&self) -> Result<()> {
        let mut connection = self.connection.lock().await;
        self.close(&mut connection).await;
        self.state.send_modify(|state| state.connection_error = None);

        let socket = match connect_async(self.url.as_str()).await {
            Ok((socket, _)) => socket,
            Err(e) => {
                error!("WebSocket error on {}: {}", self.url, e);
                self.state.send_modify(|state| {
                    state.connected = false;
                    state.connection_error = Some("Failed to connect to AI server".to_string());
                });
                self.notifier
                    .error("Connection error: Check if AI server is running");
                return Err(Error::Connection(format!("Failed to connect to {}: {}", self.url, e)).into());
            }
        };

        info!("Connected to WebSocket server {}", self.url);
        self.state.send_modify(|state| {
            state.connected = true;
            state.connection_error = None;
        });
        self.notifier.success("Connected to AI detection server");

        let (mut sink, mut stream) = socket.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let token = CancellationToken::new();
        let task_token = token.clone();
        let state = self.state.clone();
        let on_batch = self.on_batch.clone();
        let notifier = self.notifier.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                    Some(message) = outbound_rx.recv() => {
                        if let Err(e) = sink.send(message).await {
                            warn!("Failed to send feed command: {}", e);
                        }
                    }
                    incoming = stream.next() => match incoming {
                        Some(Ok(Message::Text(text))) => {
                            let mut batch = None;
                            state.send_if_modified(|current| {
                                batch = apply_message(current, &text);
                                batch.is_some()
                            });
                            if let Some(batch) = batch {
                                let callback = on_batch
                                    .lock()
                                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                                    .clone();
                                if let Some(callback) = callback {
                                    callback(batch);
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            info!("WebSocket connection closed");
                            state.send_modify(|state| {
                                state.connected = false;
                                state.playing = false;
                            });
                            notifier.error("Disconnected from AI detection server");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            error!("WebSocket error: {}", e);
                            state.send_modify(|state| {
                                state.connected = false;
                                state.playing = false;
                                state.connection_error = Some("Failed to connect to AI server".to_string());
                            });
                            notifier.error("Connection error: Check if AI server is running");
                            break;
                        }
                    }
                }
            }
            debug!("Feed socket task finished");
        });

        *connection = Some(Connection {
            outbound,
            token,
            handle,
        });
        Ok(())
    }

    /// Close the socket and reset all local state
    pub async fn disconnect(&self) {
        let mut connection = self.connection.lock().await;
        self.close(&mut connection).await;
        self.state.send_replace(LiveFeedState::default());
    }

    async fn close(&self, connection: &mut Option<Connection>) {
        if let Some(Connection { token, handle, .. }) = connection.take() {
            token.cancel();
            let _ = handle.await;
        }
    }

    /// Ask the server to play; ignored while disconnected
    pub async fn start_feed(&self, video_path: Option<String>) -> Result<()> {
        if !self.state.borrow().connected {
            return Err(Error::Connection("Not connected to AI detection server".to_string()).into());
        }
        self.state.send_modify(|state| state.playing = true);
        self.send(FeedCommand::start(video_path)).await
    }

    pub async fn pause_feed(&self) -> Result<()> {
        self.state.send_modify(|state| state.playing = false);
        self.send(FeedCommand::pause()).await
    }

    pub async fn stop_feed(&self) -> Result<()> {
        self.state.send_modify(|state| {
            state.playing = false;
            state.frame = None;
            state.detections = None;
        });
        self.send(FeedCommand::stop()).await
    }

    /// Fire-and-forget; no acknowledgement is expected
    async fn send(&self, command: FeedCommand) -> Result<()> {
        let connection = self.connection.lock().await;
        let Some(connection) = connection.as_ref() else {
            debug!("No socket for {:?}", command.command);
            return Ok(());
        };
        let text = serde_json::to_string(&command).map_err(Error::from)?;
        connection
            .outbound
            .send(Message::Text(text))
            .map_err(|_| Error::Connection("Feed socket is closed".to_string()))?;
        Ok(())
    }
}

/// [`DetectionSource`] over the live analytics socket
pub struct LiveFeedSource {
    client: LiveFeedClient,
}

impl LiveFeedSource {
    pub fn new(client: LiveFeedClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &LiveFeedClient {
        &self.client
    }
}

#[async_trait]
impl DetectionSource for LiveFeedSource {
    async fn start(&self, source: FeedSource, on_batch: BatchCallback) -> Result<()> {
        self.client.on_batch(Some(on_batch));
        let started = async {
            if !self.client.is_connected().await {
                self.client.connect().await?;
            }
            self.client.start_feed(source.video_path).await
        }
        .await;
        if started.is_err() {
            self.client.on_batch(None);
        }
        started
    }

    async fn stop(&self) {
        self.client.on_batch(None);
        if let Err(e) = self.client.stop_feed().await {
            debug!("Stop command not sent: {}", e);
        }
        self.client.disconnect().await;
    }

    fn is_active(&self) -> bool {
        let state = self.client.state.borrow();
        state.connected && state.playing
    }

    fn name(&self) -> &'static str {
        "live"
    }
}
