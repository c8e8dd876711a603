//! scib-room - realtime investigation room feed server

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use scib_room::{
    config::Args,
    logging,
    persist::{FileStateStore, MemoryStateStore, StateStore},
    server::{self, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    logging::init(&args.log_level, args.log_format);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  scib-room - Investigation Room Feed");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Rooms: {}", args.room_list().join(", "));
    info!("Unlock keys: {}", args.unlock_key_list().join(", "));
    info!(
        "Limits: {} chars/post, stream buffer {}, {} open trackers",
        args.max_body_chars, args.stream_capacity, args.max_trackers
    );
    match args.max_feed_entries {
        0 => info!("History: unbounded"),
        n => info!("History: newest {} entries per room", n),
    }
    info!("Keep-alive: every {}s", args.stream_keepalive_secs);
    match args.state_dir {
        Some(ref dir) => info!("Unlock state: {}", dir.display()),
        None => info!("Unlock state: in-memory"),
    }
    info!("======================================");

    let state_store: Arc<dyn StateStore> = match args.state_dir {
        Some(ref dir) => Arc::new(FileStateStore::open(dir.clone()).await?),
        None => Arc::new(MemoryStateStore::new()),
    };

    let state = Arc::new(AppState::new(args, state_store));
    state.open_rooms()?;

    tokio::select! {
        result = server::run(Arc::clone(&state)) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
        }
    }

    Ok(())
}
