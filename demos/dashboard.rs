use realtime_sync_rs::{
    Channel, ConnectionNotice, FileTokenStore, QueryCache, RealtimeClient, RealtimeClientOptions,
    SubscriptionDescriptor,
};
use std::sync::Arc;

/// Follows a few dashboard channels on a live server
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing to see logs
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "realtime_sync_rs=debug,info".into()),
        )
        .init();

    let options = RealtimeClientOptions::from_env()?;
    println!("📡 Realtime host: {} (secure: {})\n", options.host, options.secure);

    let cache = Arc::new(QueryCache::new());
    let mut builder = RealtimeClient::builder(options)?.cache_invalidator(cache.clone());
    if let Ok(path) = std::env::var("REALTIME_TOKEN_FILE") {
        builder = builder.token_store(Arc::new(FileTokenStore::new(path)));
    }
    let client = builder.build();

    // Terminal notices
    let mut notices = client.notices();
    tokio::spawn(async move {
        while let Ok(notice) = notices.recv().await {
            match notice {
                ConnectionNotice::RetriesExhausted { attempts } => {
                    println!("❌ Connection lost after {attempts} attempts, press Ctrl+C to quit");
                }
            }
        }
    });

    // Status changes
    let mut status = client.watch_status();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = status.borrow_and_update().clone();
            println!(
                "🔌 {:?} (attempts: {}, channels: {:?})",
                current.state, current.reconnect_attempts, current.active_channels
            );
        }
    });

    cache.insert("leads", serde_json::json!([]));
    let _leads = client.subscribe(
        SubscriptionDescriptor::new(Channel::Leads)
            .invalidate(["leads", "dashboard-stats"])
            .on_message(|lead| println!("📨 lead: {lead}")),
    )?;
    let _notifications = client.subscribe(
        SubscriptionDescriptor::new(Channel::Notifications)
            .on_message(|frame| println!("🔔 notification: {frame}")),
    )?;
    let _demandes = client.subscribe(
        SubscriptionDescriptor::new(Channel::Demandes)
            .invalidate(["demandes"])
            .on_message(|demande| println!("📨 demande: {demande}")),
    )?;

    println!("⏳ Listening, press Ctrl+C to stop\n");
    tokio::signal::ctrl_c().await?;

    println!("\nleads cache stale: {}", cache.is_stale("leads"));
    println!("Shutting down...");
    client.shutdown().await;
    println!("Done!");

    Ok(())
}
