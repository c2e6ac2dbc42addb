use crate::config::FeedServerConfig;
use crate::db::models::{
    BoundingBox, CommandKind, Detection, DetectionBatch, FeedCommand, FeedMessage, FrameMessage,
    Resolution, WireBatch,
};
use crate::detection::overlay::{draw_overlay, encode_frame, OverlayStyle};
use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{sink::SinkExt, stream::StreamExt};
use image::{Rgb, RgbImage};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// COCO ids of the vehicle classes the feed reports
pub const VEHICLE_CLASSES: [(u32, &str); 4] = [(2, "car"), (3, "motorcycle"), (5, "bus"), (7, "truck")];

/// Detections at or below this confidence are filtered out
pub const CONFIDENCE_THRESHOLD: f32 = 0.5;

#[derive(Clone)]
struct FeedState {
    config: Arc<FeedServerConfig>,
}

/// Mock analytics server speaking the live feed protocol over WebSocket
pub struct FeedServer {
    config: FeedServerConfig,
}

/// A feed server running in the background
pub struct FeedServerHandle {
    addr: SocketAddr,
    token: CancellationToken,
    handle: JoinHandle<Result<()>>,
}

impl FeedServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Stop accepting connections and wait for the server to exit
    pub async fn shutdown(self) -> Result<()> {
        self.token.cancel();
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(crate::Error::Internal(format!("Feed server task failed: {}", e)).into()),
        }
    }
}

impl FeedServer {
    pub fn new(config: &FeedServerConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn router(&self) -> Router {
        let state = FeedState {
            config: Arc::new(self.config.clone()),
        };
        Router::new().route("/", get(ws_handler)).with_state(state)
    }

    /// Bind the configured address and serve in the background
    pub async fn spawn(&self) -> Result<FeedServerHandle> {
        let addr = self.config.address.clone() + ":" + &self.config.port.to_string();
        let addr: SocketAddr = addr.parse()?;

        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        info!("Feed server listening on ws://{}", addr);

        let app = self.router();
        let token = CancellationToken::new();
        let shutdown = token.clone();
        let server = axum::Server::from_tcp(listener.into_std()?)?
            .serve(app.into_make_service())
            .with_graceful_shutdown(async move { shutdown.cancelled().await });

        let handle = tokio::spawn(async move {
            server.await?;
            info!("Feed server stopped");
            Ok::<(), anyhow::Error>(())
        });

        Ok(FeedServerHandle { addr, token, handle })
    }

    /// Serve until `shutdown` is cancelled
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let handle = self.spawn().await?;
        shutdown.cancelled().await;
        handle.shutdown().await
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<FeedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

struct Playback {
    playing: bool,
    frame_number: u64,
    video_path: Option<String>,
}

impl Playback {
    fn apply(&mut self, command: FeedCommand) {
        match command.command {
            CommandKind::Start => {
                if command.video_path.is_some() && command.video_path != self.video_path {
                    info!("Switching to video: {:?}", command.video_path);
                    self.frame_number = 0;
                    self.video_path = command.video_path;
                }
                self.playing = true;
            }
            CommandKind::Pause => self.playing = false,
            CommandKind::Stop => {
                self.playing = false;
                self.frame_number = 0;
            }
        }
    }
}

async fn handle_socket(socket: WebSocket, state: FeedState) {
    info!("Feed client connected");
    let config = state.config;
    let (mut sender, mut receiver) = socket.split();

    let background = lot_background(config.width, config.height);
    let mut rng = StdRng::from_entropy();
    let mut playback = Playback {
        playing: false,
        frame_number: 0,
        video_path: None,
    };
    let mut ticker = interval(Duration::from_secs_f64(1.0 / config.frame_rate.max(1) as f64));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            message = receiver.next() => match message {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<FeedCommand>(&text) {
                    Ok(command) => {
                        debug!("Feed command {:?}", command.command);
                        playback.apply(command);
                    }
                    Err(e) => error!("Invalid JSON message {:?}: {}", text, e),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Feed socket error: {}", e);
                    break;
                }
            },
            _ = ticker.tick(), if playback.playing => {
                playback.frame_number += 1;
                let text = match render_frame(&config, &background, &mut rng, playback.frame_number) {
                    Ok(text) => text,
                    Err(e) => {
                        error!("Failed to render frame {}: {}", playback.frame_number, e);
                        continue;
                    }
                };
                if sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
        }
    }
    info!("Feed client disconnected");
}

/// Random vehicle detections above the confidence threshold
pub fn mock_vehicle_detections<R: Rng + ?Sized>(rng: &mut R, width: u32, height: u32) -> Vec<Detection> {
    let count = rng.gen_range(0..=5);
    (0..count)
        .map(|_| {
            let (class_id, class_name) = VEHICLE_CLASSES[rng.gen_range(0..VEHICLE_CLASSES.len())];
            let box_width = rng.gen_range(60.0..=160.0f32).min(width as f32);
            let box_height = rng.gen_range(40.0..=120.0f32).min(height as f32);
            Detection {
                class_name: class_name.to_string(),
                confidence: rng.gen_range(0.51..=0.99),
                bbox: BoundingBox {
                    x: rng.gen_range(0.0..=(width as f32 - box_width)).round(),
                    y: rng.gen_range(0.0..=(height as f32 - box_height)).round(),
                    width: box_width.round(),
                    height: box_height.round(),
                },
                class_id: Some(class_id),
            }
        })
        .collect()
}

fn render_frame(
    config: &FeedServerConfig,
    background: &RgbImage,
    rng: &mut StdRng,
    frame_number: u64,
) -> Result<String> {
    let detections = mock_vehicle_detections(rng, config.width, config.height);

    let mut image = background.clone();
    draw_overlay(&mut image, &detections, OverlayStyle::Live);

    let batch = DetectionBatch::new(detections, frame_number);
    let message = FeedMessage::Frame(FrameMessage {
        frame: encode_frame(&image)?,
        detections: WireBatch::from(&batch),
        fps: config.frame_rate as f64,
        resolution: Resolution {
            width: config.width,
            height: config.height,
        },
    });
    Ok(serde_json::to_string(&message).map_err(crate::Error::from)?)
}

/// Asphalt with painted bay lines
fn lot_background(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width.max(1), height.max(1), |x, y| {
        if x % 80 < 3 && y > height / 4 && y < height * 3 / 4 {
            Rgb([230, 230, 230])
        } else {
            Rgb([58, 60, 64])
        }
    })
}
