use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

use arena_persistence::{
    connection::connect_and_migrate,
    repositories::{LeaderboardRepository, PlayerRepository, QuestionRepository},
};
use arena_server::{
    config::Config,
    create_routes,
    generator::{HttpGenerator, NullGenerator, QuestionGenerator},
    match_manager::MatchManager,
    matchmaking::MatchmakingQueue,
    websocket::ConnectionManager,
};
use arena_types::ServerMessage;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("Starting Code Arena server...");

    let config = Config::new();
    let connection_manager = Arc::new(ConnectionManager::new());
    let matchmaking_queue = Arc::new(MatchmakingQueue::new_with_config(
        config.level_tolerance,
        Duration::from_secs(config.queue_timeout_seconds),
    ));

    // Initialize database connection and run migrations
    let db = match connect_and_migrate().await {
        Ok(db) => db,
        Err(e) => {
            tracing::error!("Failed to connect to database and run migrations: {}", e);
            std::process::exit(1);
        }
    };
    let player_repository = Arc::new(PlayerRepository::new(db.clone()));
    let question_repository = Arc::new(QuestionRepository::new(db.clone()));
    let leaderboard_repository = Arc::new(LeaderboardRepository::new(db));

    let generator: Arc<dyn QuestionGenerator> = match &config.generator_url {
        Some(url) => {
            info!("Using question generation service at {}", url);
            Arc::new(HttpGenerator::new(url.clone()))
        }
        None => {
            info!("No generation service configured; serving stored questions only");
            Arc::new(NullGenerator)
        }
    };

    let match_manager = Arc::new(MatchManager::new(
        connection_manager.clone(),
        player_repository.clone(),
        question_repository.clone(),
        leaderboard_repository.clone(),
        generator,
    ));

    let routes = create_routes(
        connection_manager.clone(),
        match_manager.clone(),
        matchmaking_queue.clone(),
        player_repository.clone(),
        leaderboard_repository.clone(),
    );

    // Start cleanup task
    let cleanup_connection_manager = connection_manager.clone();
    let cleanup_match_manager = match_manager.clone();
    let cleanup_queue = matchmaking_queue.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(30));
        loop {
            interval.tick().await;
            let connection_timeout = Duration::from_secs(config.connection_timeout_seconds);
            let session_timeout = Duration::from_secs(config.session_timeout_minutes * 60);

            for entry in cleanup_queue.cleanup_expired().await {
                cleanup_connection_manager
                    .send_to_connection(entry.connection_id, ServerMessage::MatchCancelled)
                    .await
                    .ok();
            }
            cleanup_match_manager
                .cleanup_stale_sessions(session_timeout)
                .await;
            cleanup_connection_manager
                .cleanup_inactive_connections(connection_timeout)
                .await;
        }
    });

    info!("Server starting on {}:{}", config.host, config.port);

    let addr = match config.host.parse::<std::net::IpAddr>() {
        Ok(ip) => (ip, config.port),
        Err(e) => {
            tracing::error!("Invalid HOST '{}': {}", config.host, e);
            std::process::exit(1);
        }
    };

    let (addr, server) = warp::serve(routes).bind_with_graceful_shutdown(addr, async {
        // Wait for SIGINT (Ctrl+C) or SIGTERM
        #[cfg(unix)]
        {
            let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
                .expect("Failed to register SIGINT handler");
            let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to register SIGTERM handler");

            tokio::select! {
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully...");
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            signal::ctrl_c().await.expect("Failed to listen for ctrl+c");
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    });

    info!(
        "Server started successfully on {}. Press Ctrl+C to stop.",
        addr
    );
    server.await;
    info!("Server shutdown complete.");
}
