//! Stance Worker - rating weight recompute loop
//!
//! Subscribes to declaration events on NATS and recomputes rating weights
//! and mod aggregates as like/dislike/report declarations land.
//!
//! Usage:
//!   stance-worker --nats-url nats://localhost:4222 --mongodb-uri mongodb://localhost:27017
//!
//! Environment variables:
//!   MONGODB_URI - MongoDB connection URI (default: mongodb://localhost:27017)
//!   MONGODB_DB - database name (default: stance)
//!   NATS_URL - NATS server URL (default: nats://127.0.0.1:4222)
//!   NODE_ID - unique node identifier (default: auto-generated UUID)
//!   SWEEP - recompute every mod aggregate before the event loop

use std::sync::Arc;

use clap::Parser;
use stance::db::MongoClient;
use stance::events::{EventBus, NatsEventBus};
use stance::weight::{spawn_weight_engine, MongoModStore, MongoRatingStore, RatingWeightEngine};
use stance::Args;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{},stance=debug", args.log_level))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    info!(
        "Starting stance worker {} (git {})",
        args.node_id,
        env!("GIT_COMMIT_SHORT")
    );

    if let Err(e) = run(args).await {
        error!("Worker failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> stance::Result<()> {
    let mongo = MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await?;
    info!("Connected to MongoDB database '{}'", mongo.db_name());

    let ratings = Arc::new(MongoRatingStore::new(&mongo).await?);
    let mods = Arc::new(MongoModStore::new(&mongo).await?);
    let engine = Arc::new(RatingWeightEngine::new(ratings, mods));

    if args.sweep {
        let swept = engine.recompute_all().await?;
        info!("Startup sweep recomputed {} mod aggregates", swept);
    }

    let worker_name = format!("stance-worker-{}", args.node_id);
    let bus: Arc<dyn EventBus> = Arc::new(NatsEventBus::connect(&args.nats, &worker_name).await?);
    info!("Connected to NATS at {}", args.nats.nats_url);

    let engine_handle = spawn_weight_engine(engine, bus).await?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = engine_handle => {
            if let Err(e) = result {
                error!("Engine task error: {}", e);
            }
        }
    }

    info!("Worker shutting down");
    Ok(())
}
