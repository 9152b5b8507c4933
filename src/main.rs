//! greeter - Newcomer tracking service
//!
//! Tracks members who joined a group chat, reminds those who stay silent and moves the ones who
//! ignore the reminder to a penalty list.

use greeter_core::{Clock, MembershipStore, SystemClock, TransitionEngine};
use greeter_server::{
    CommandHandler, Config, NotificationBroadcaster, Server, ServerConfig, SharedStore,
    SweepScheduler,
};
use greeter_storage::StateFile;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration (from file if GREETER_CONFIG is set, then env overrides)
    let config = match Config::load() {
        Ok(c) => {
            if let Ok(path) = std::env::var("GREETER_CONFIG") {
                tracing::info!("Loaded config from {}", path);
            }
            c
        }
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            return Err(e.into());
        }
    };

    if let Err(e) = config.validate() {
        tracing::error!("{}", e);
        return Err(e.into());
    }

    tracing::info!("Starting greeter");
    tracing::info!("  Chat: {}", config.chat.chat_id);
    tracing::info!("  Bind address: {}", config.network.bind_addr);
    tracing::info!("  State file: {}", config.storage.state_file.display());
    tracing::info!(
        "  Thresholds: notify after {}s, penalize after {}s",
        config.sweep.notify_after_secs,
        config.sweep.kick_after_secs
    );
    tracing::info!("  Daily sweep: {} UTC", config.sweep.daily_at);

    // Unreadable state is fatal
    let store = match MembershipStore::load(StateFile::new(&config.storage.state_file)) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(
                "Failed to load state from {}: {}",
                config.storage.state_file.display(),
                e
            );
            return Err(e.into());
        }
    };
    tracing::info!(
        "  Tracking {} member(s), {} penalized",
        store.active().len(),
        store.penalized().len()
    );
    let store: SharedStore = Arc::new(parking_lot::Mutex::new(store));

    let engine = TransitionEngine::new(config.sweep.thresholds())?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let broadcaster = Arc::new(NotificationBroadcaster::default());

    let scheduler = Arc::new(SweepScheduler::new(
        store.clone(),
        engine,
        clock.clone(),
        broadcaster.clone(),
        config.chat.chat_id,
        config.sweep.daily_at,
    ));
    if config.sweep.autostart {
        scheduler.start_tracking();
    } else {
        tracing::info!("  Tracking idle until start-tracking");
    }

    let handler = Arc::new(
        CommandHandler::new(
            store,
            clock,
            scheduler.clone(),
            broadcaster,
            config.chat.chat_id,
        )
        .with_test_delay(config.sweep.test_delay()),
    );

    let server = Arc::new(Server::new(
        ServerConfig::from(config.network.clone()),
        handler,
    ));

    // Spawn shutdown signal handler
    let shutdown_server = server.clone();
    let shutdown_scheduler = scheduler.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal, stopping server...");
        shutdown_scheduler.shutdown();
        shutdown_server.shutdown();
    });

    // Run server (blocks until shutdown)
    server.run().await?;

    tracing::info!("Server stopped");
    Ok(())
}
