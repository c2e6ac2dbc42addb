use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{info, warn};
use spotwise::api::FeedServer;
use spotwise::config::{self, Config, DetectionBackend};
use spotwise::db::models::{DetectionBatch, UserRole};
use spotwise::db::DatabaseService;
use spotwise::detection::{self, DetectionStats, FeedSource};
use spotwise::messaging::Notifier;
use spotwise::registry::{CameraRegistry, DetectionStatusBook, SlotRegistry};
use spotwise::remote::{DataService, InMemoryDataService};
use spotwise::services::{demo_slots, directions, VideoCameraSeeder};
use spotwise::session::{Navigator, SessionResolver};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Parking occupancy demo and its supporting tools
#[derive(Debug, Parser)]
#[command(name = "spotwise", author, version)]
struct Args {
    /// Configuration file (.toml or .json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply database migrations
    Migrate {
        /// Also upsert the demo parking slots
        #[arg(long)]
        seed: bool,
    },

    /// Run the registries and a detection source against in-memory data
    Demo {
        /// Seconds to keep detection running
        #[arg(short, long, default_value_t = 5)]
        seconds: u64,

        /// Override the configured detection backend
        #[arg(short, long, value_enum)]
        backend: Option<DetectionBackend>,
    },

    /// Serve mock analytics frames over WebSocket
    FeedServer,

    /// Check whether the analytics server is reachable
    Probe {
        /// Server URL; defaults to live_feed.server_url
        #[arg(short, long)]
        url: Option<String>,
    },

    /// Print walking directions to a slot
    Directions {
        #[arg(long)]
        slot: String,

        #[arg(long)]
        zone: String,
    },
}

async fn run_app(args: Args) -> Result<()> {
    let config = config::load_config(args.config.as_deref())?;

    let mut logger = env_logger::Builder::new();
    logger.parse_filters(&config.log_level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        logger.parse_filters(&filters);
    }
    logger.init();
    info!("Configuration loaded");

    match args.command {
        Command::Migrate { seed } => {
            let db = DatabaseService::connect(&config.database).await?;
            db.run_migrations().await?;
            info!("Migrations completed successfully");
            if seed {
                db.seed_slots(&demo_slots()).await?;
            }
        }
        Command::Demo { seconds, backend } => run_demo(config, seconds, backend).await?,
        Command::FeedServer => {
            let shutdown = CancellationToken::new();
            let signal = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Shutting down...");
                }
                signal.cancel();
            });
            FeedServer::new(&config.feed_server).run(shutdown).await?;
        }
        Command::Probe { url } => {
            let url = url.unwrap_or_else(|| config.live_feed.server_url.clone());
            let limit = Duration::from_secs(config.live_feed.probe_timeout_secs);
            let status = detection::check_server(&url, limit).await;
            println!("{}: {:?}", url, status);
            if let Some(instructions) = status.instructions() {
                println!("{}", instructions);
            }
        }
        Command::Directions { slot, zone } => match directions::plan(&slot, &zone) {
            Some(plan) => {
                println!(
                    "Slot {} in Zone {}: about {} mins, {}m",
                    plan.slot, plan.zone, plan.estimated_minutes, plan.total_distance_m
                );
                for (n, step) in plan.steps.iter().enumerate() {
                    println!("{:>2}. {} ({}m)", n + 1, step.instruction, step.distance_m);
                }
            }
            None => warn!("Both --slot and --zone are required"),
        },
    }

    Ok(())
}

async fn run_demo(mut config: Config, seconds: u64, backend: Option<DetectionBackend>) -> Result<()> {
    if let Some(backend) = backend {
        config.detection.backend = backend;
    }

    let notifier = Notifier::new();

    let remote = Arc::new(InMemoryDataService::new());
    remote.seed_slots(&demo_slots());
    remote.add_account("admin@spotwise.local", "demo-admin", "Demo Admin", UserRole::Admin);
    remote.sign_in("admin@spotwise.local", "demo-admin").await?;

    let navigator = Navigator::default();
    let resolver = SessionResolver::new(remote.clone(), navigator.clone(), notifier.clone(), Some(UserRole::Admin));
    let auth = resolver.resolve().await;
    info!("Signed in as {:?}, at {}", auth.role(), navigator.current());

    let cameras = CameraRegistry::new(remote.clone(), notifier.clone(), &config.registry);
    let slots = SlotRegistry::new(remote.clone(), notifier.clone());
    cameras.start_sync();
    slots.start_sync();
    slots.fetch().await;

    VideoCameraSeeder::new(remote.clone(), notifier.clone())
        .setup_video_cameras()
        .await?;
    cameras.fetch().await;
    let camera = cameras
        .cameras()
        .into_iter()
        .next()
        .ok_or_else(|| spotwise::Error::NotFound("No cameras after seeding".to_string()))?;
    let camera = cameras.open(camera.id).await?;

    // Live mode talks to a local mock analytics server
    let feed_server = match config.detection.backend {
        DetectionBackend::Live => {
            let mut server_config = config.feed_server.clone();
            server_config.port = 0;
            let handle = FeedServer::new(&server_config).spawn().await?;
            config.live_feed.server_url = handle.url();
            Some(handle)
        }
        DetectionBackend::Mock => None,
    };

    let source = detection::source_from_config(&config, notifier.clone());
    let book = DetectionStatusBook::new(notifier.clone(), config.detection.reported_fps);
    let batches = Arc::new(AtomicUsize::new(0));
    let counter = batches.clone();
    let fps = config.detection.reported_fps;
    let on_batch: detection::BatchCallback = Arc::new(move |batch: DetectionBatch| {
        counter.fetch_add(1, Ordering::Relaxed);
        let stats = DetectionStats::from_detections(&batch.detections, fps);
        log::debug!("Frame {}: {:?}", batch.frame_number, stats);
    });

    let feed = FeedSource::new(config.detection.canvas_width, config.detection.canvas_height)
        .with_video(camera.url.clone());
    source.start(feed, on_batch).await?;
    book.start(camera.id, slots.occupancy());
    info!("Running {} detection on {} for {}s", source.name(), camera.name, seconds);

    for _ in 0..seconds {
        tokio::time::sleep(Duration::from_secs(1)).await;
        if let Err(e) = slots.simulate_detection().await {
            warn!("Simulation step failed: {}", e);
        }
    }

    source.stop().await;
    book.stop(camera.id);
    if let Some(handle) = feed_server {
        handle.shutdown().await?;
    }

    // Let the slot sync catch the last flip
    tokio::time::sleep(Duration::from_millis(100)).await;
    let occupancy = slots.occupancy();
    println!(
        "{} batches from {}; {} of {} slots occupied ({}%)",
        batches.load(Ordering::Relaxed),
        source.name(),
        occupancy.occupied,
        occupancy.total,
        occupancy.rate_percent
    );
    if let Some(slot) = slots.nearest_vacant() {
        if let Some(plan) = directions::plan(&slot.slot_number, &slot.zone) {
            println!("Directions to {}: {} steps, {}m", plan.slot, plan.steps.len(), plan.total_distance_m);
        }
    }

    cameras.stop_sync();
    slots.stop_sync();
    resolver.logout().await?;

    for notification in notifier.history() {
        println!("{}", notification);
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(e) = run_app(args).await {
        eprintln!("Application error: {}", e);
        std::process::exit(1);
    }
}
