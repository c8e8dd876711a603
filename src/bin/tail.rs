//! scib-tail - follow a room's thread from the terminal
//!
//! Prints the most recent posts, then every new one as it arrives. Stops on
//! Ctrl-C or when the stream ends. A lost connection is reported and not
//! retried; run it again to reconnect.
//!
//! Usage:
//!   scib-tail --url http://localhost:8080 --room case01 --user Kelly

use std::collections::HashSet;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::debug;

use scib_room::client::RoomClient;
use scib_room::feed::{
    ConnectionStatus, Entry, FeedSource, FeedSubscriber, FeedView, DISPLAY_LIMIT, UNIDENTIFIED,
};
use scib_room::logging::{self, LogFormat};

#[derive(Parser, Debug)]
#[command(name = "scib-tail")]
#[command(about = "Follow an investigation room feed")]
#[command(version)]
struct TailArgs {
    /// Room server base URL
    #[arg(long, env = "SCIB_URL", default_value = "http://localhost:8080")]
    url: String,

    /// Room to follow
    #[arg(long, env = "SCIB_ROOM", default_value = "case01")]
    room: String,

    /// Display identity; your own posts are marked
    #[arg(long, env = "SCIB_USER")]
    user: Option<String>,

    /// Recent posts to print before following
    #[arg(long, default_value_t = DISPLAY_LIMIT)]
    limit: usize,

    /// Log level for diagnostics on stderr
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = TailArgs::parse();
    logging::init(&args.log_level, LogFormat::Text);

    let mut client = RoomClient::new(&args.url, &args.room)?;
    if let Some(ref user) = args.user {
        client = client.with_user(user.as_str());
    }
    let identity = args.user.clone().unwrap_or_else(|| UNIDENTIFIED.to_string());

    let subscriber = Arc::new(FeedSubscriber::new(client));
    let (tx, rx) = mpsc::unbounded_channel::<Entry>();

    let printer = tokio::spawn(print_feed(Arc::clone(&subscriber), rx, identity, args.limit));

    let runner = {
        let subscriber = Arc::clone(&subscriber);
        tokio::spawn(async move {
            subscriber
                .run(move |entry| {
                    let _ = tx.send(entry.clone());
                })
                .await
        })
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            debug!("Interrupted");
            subscriber.close();
        }
        _ = subscriber_done(&subscriber) => {}
    }

    let status = runner.await?;
    printer.await?;

    if let Some(message) = status.message() {
        eprintln!("{}", message);
        std::process::exit(1);
    }
    Ok(())
}

/// Resolves once the subscriber reaches a terminal status
async fn subscriber_done<S: FeedSource>(subscriber: &FeedSubscriber<S>) {
    let mut status = subscriber.status();
    let _ = status
        .wait_for(|s| matches!(s, ConnectionStatus::Closed | ConnectionStatus::Lost(_)))
        .await;
}

/// Print the backlog once the stream is live, then each merged post.
///
/// Posts merged before the backlog was printed show up in both; the id set
/// keeps them from printing twice.
async fn print_feed<S: FeedSource>(
    subscriber: Arc<FeedSubscriber<S>>,
    mut rx: mpsc::UnboundedReceiver<Entry>,
    identity: String,
    limit: usize,
) {
    let is_live = {
        let mut status = subscriber.status();
        let reached = status.wait_for(|s| *s != ConnectionStatus::Connecting).await;
        let live = matches!(reached.as_deref(), Ok(ConnectionStatus::Live));
        live
    };
    let mut printed = HashSet::new();

    if is_live {
        let view = subscriber.view();
        let view = view.read().await;
        for entry in view.recent(limit).iter().rev() {
            print_entry(entry, &identity);
            printed.insert(entry.id.clone());
        }
    }

    while let Some(entry) = rx.recv().await {
        if printed.insert(entry.id.clone()) {
            print_entry(&entry, &identity);
        }
    }
}

fn print_entry(entry: &Entry, identity: &str) {
    let time = chrono::DateTime::from_timestamp_millis(entry.timestamp)
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string());
    let marker = if FeedView::is_own(entry, identity) { "*" } else { " " };
    println!("[{}]{}{}: {}", time, marker, entry.author, entry.body);
}
