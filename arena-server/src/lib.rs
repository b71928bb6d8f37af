use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use warp::Filter;

use crate::match_manager::MatchManager;
use crate::matchmaking::MatchmakingQueue;
use crate::websocket::ConnectionManager;
use arena_persistence::repositories::{LeaderboardRepository, PlayerRepository};

pub mod config;
pub mod error;
pub mod generator;
pub mod match_manager;
pub mod matchmaking;
pub mod websocket;

#[derive(Deserialize)]
struct LeaderboardQuery {
    limit: Option<u64>,
}

#[derive(serde::Serialize)]
struct PlayerStatsResponse {
    player: arena_types::Player,
    level: i32,
    points_for_next_level: i32,
    total_wins: i32,
    total_losses: i32,
    rank: Option<u32>,
}

pub fn create_routes(
    connection_manager: Arc<ConnectionManager>,
    match_manager: Arc<MatchManager>,
    matchmaking_queue: Arc<MatchmakingQueue>,
    player_repository: Arc<PlayerRepository>,
    leaderboard_repository: Arc<LeaderboardRepository>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    // Clone for filters
    let connection_manager_filter = warp::any().map({
        let connection_manager = connection_manager.clone();
        move || connection_manager.clone()
    });

    let match_manager_filter = warp::any().map({
        let match_manager = match_manager.clone();
        move || match_manager.clone()
    });

    let matchmaking_filter = warp::any().map({
        let matchmaking_queue = matchmaking_queue.clone();
        move || matchmaking_queue.clone()
    });

    let player_repository_filter = warp::any().map({
        let player_repository = player_repository.clone();
        move || player_repository.clone()
    });

    let leaderboard_repository_filter = warp::any().map({
        let leaderboard_repository = leaderboard_repository.clone();
        move || leaderboard_repository.clone()
    });

    // WebSocket endpoint
    let websocket = warp::path("ws")
        .and(warp::ws())
        .and(connection_manager_filter.clone())
        .and(match_manager_filter.clone())
        .and(matchmaking_filter.clone())
        .and(player_repository_filter.clone())
        .map(|ws: warp::ws::Ws, conn_mgr, match_mgr, queue, players| {
            ws.on_upgrade(move |socket| {
                websocket::handle_connection(socket, conn_mgr, match_mgr, queue, players)
            })
        });

    // Health check endpoint
    let health = warp::path("health")
        .and(warp::get())
        .map(|| warp::reply::with_status("OK", warp::http::StatusCode::OK));

    // Leaderboard endpoint
    let leaderboard = warp::path("leaderboard")
        .and(warp::get())
        .and(warp::query::<LeaderboardQuery>())
        .and(leaderboard_repository_filter.clone())
        .and_then(handle_leaderboard_request);

    // Player stats endpoint
    let player_stats = warp::path!("player" / String / "stats")
        .and(warp::get())
        .and(player_repository_filter.clone())
        .and(leaderboard_repository_filter.clone())
        .and_then(handle_player_stats_request);

    // CORS configuration
    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type"])
        .allow_methods(vec!["GET", "POST"]);

    websocket
        .or(health)
        .or(leaderboard)
        .or(player_stats)
        .with(cors)
        .with(warp::log("arena_server"))
}

async fn handle_leaderboard_request(
    query: LeaderboardQuery,
    leaderboard_repository: Arc<LeaderboardRepository>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let limit = query.limit.unwrap_or(10).min(100); // Default 10, max 100

    match leaderboard_repository.get_leaderboard(limit).await {
        Ok(entries) => Ok(warp::reply::with_status(
            warp::reply::json(&entries),
            warp::http::StatusCode::OK,
        )),
        Err(err) => {
            tracing::error!("Failed to fetch leaderboard: {}", err);
            Ok(warp::reply::with_status(
                warp::reply::json(&serde_json::json!({
                    "error": "Failed to fetch leaderboard"
                })),
                warp::http::StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

async fn handle_player_stats_request(
    player_id: String,
    player_repository: Arc<PlayerRepository>,
    leaderboard_repository: Arc<LeaderboardRepository>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let player_uuid = match Uuid::parse_str(&player_id) {
        Ok(uuid) => uuid,
        Err(_) => {
            return Ok(warp::reply::with_status(
                warp::reply::json(&serde_json::json!({
                    "error": "Invalid player ID format"
                })),
                warp::http::StatusCode::BAD_REQUEST,
            ));
        }
    };

    match player_repository.get_stats(player_uuid).await {
        Ok(Some(stats)) => {
            let rank = match leaderboard_repository.get_rank(player_uuid).await {
                Ok(rank) => rank,
                Err(err) => {
                    tracing::error!("Failed to get player rank: {}", err);
                    None
                }
            };

            let response = PlayerStatsResponse {
                level: arena_core::level_for_points(stats.player.points),
                points_for_next_level: arena_core::points_for_next_level(stats.player.points),
                player: stats.player,
                total_wins: stats.total_wins,
                total_losses: stats.total_losses,
                rank,
            };
            Ok(warp::reply::with_status(
                warp::reply::json(&response),
                warp::http::StatusCode::OK,
            ))
        }
        Ok(None) => Ok(warp::reply::with_status(
            warp::reply::json(&serde_json::json!({
                "error": "Player not found"
            })),
            warp::http::StatusCode::NOT_FOUND,
        )),
        Err(err) => {
            tracing::error!("Failed to fetch player stats: {}", err);
            Ok(warp::reply::with_status(
                warp::reply::json(&serde_json::json!({
                    "error": "Failed to fetch player stats"
                })),
                warp::http::StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::generator::NullGenerator;
    use arena_persistence::repositories::{QuestionRepository, RankedEntry};
    use arena_types::{ClientMessage, MatchErrorKind, Player, Question, ServerMessage, TestCase};
    use migration::{Migrator, MigratorTrait};
    use serde_json::json;
    use std::time::Duration;

    struct TestApp {
        routes: warp::filters::BoxedFilter<(Box<dyn warp::Reply>,)>,
        player_repository: Arc<PlayerRepository>,
        question_repository: Arc<QuestionRepository>,
        leaderboard_repository: Arc<LeaderboardRepository>,
    }

    async fn create_test_app() -> TestApp {
        let db = arena_persistence::connection::connect_to_memory_database()
            .await
            .unwrap();
        Migrator::up(&db, None).await.unwrap();

        let connection_manager = Arc::new(ConnectionManager::new());
        let matchmaking_queue = Arc::new(MatchmakingQueue::new());
        let player_repository = Arc::new(PlayerRepository::new(db.clone()));
        let question_repository = Arc::new(QuestionRepository::new(db.clone()));
        let leaderboard_repository = Arc::new(LeaderboardRepository::new(db));

        let match_manager = Arc::new(MatchManager::new(
            connection_manager.clone(),
            player_repository.clone(),
            question_repository.clone(),
            leaderboard_repository.clone(),
            Arc::new(NullGenerator),
        ));

        let routes = create_routes(
            connection_manager,
            match_manager,
            matchmaking_queue,
            player_repository.clone(),
            leaderboard_repository.clone(),
        )
        .map(|reply| Box::new(reply) as Box<dyn warp::Reply>)
        .boxed();

        TestApp {
            routes,
            player_repository,
            question_repository,
            leaderboard_repository,
        }
    }

    async fn seed_question(app: &TestApp) -> Question {
        app.question_repository
            .create_question(
                Question {
                    id: Uuid::new_v4(),
                    title: "Add".to_string(),
                    prompt: "Add two numbers.".to_string(),
                    starter_code: "function add(a, b) {\n}".to_string(),
                    test_cases: vec![TestCase {
                        input: vec![json!(1), json!(2)],
                        expected: json!(3),
                    }],
                    difficulty: 1,
                    points: 100,
                    time_limit_seconds: 300,
                },
                true,
            )
            .await
            .unwrap()
    }

    fn parse_server_message(msg: &warp::ws::Message) -> ServerMessage {
        let text = msg.to_str().expect("Expected text frame");
        serde_json::from_str(text).expect("Should be valid ServerMessage")
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_test_app().await;

        let response = warp::test::request()
            .method("GET")
            .path("/health")
            .reply(&app.routes)
            .await;

        assert_eq!(response.status(), 200);
        assert_eq!(response.body(), "OK");
    }

    #[tokio::test]
    async fn test_websocket_connection_upgrade() {
        let app = create_test_app().await;

        let mut ws = warp::test::ws()
            .path("/ws")
            .handshake(app.routes)
            .await
            .expect("WebSocket handshake should succeed");

        // Heartbeat has no reply; a clean send means the socket works
        let heartbeat = serde_json::to_string(&ClientMessage::Heartbeat).unwrap();
        ws.send_text(heartbeat).await;
    }

    #[tokio::test]
    async fn test_websocket_invalid_message_handling() {
        let app = create_test_app().await;

        let mut ws = warp::test::ws()
            .path("/ws")
            .handshake(app.routes)
            .await
            .expect("WebSocket handshake should succeed");

        ws.send_text("invalid json").await;

        let msg = ws.recv().await.expect("Should receive error reply");
        match parse_server_message(&msg) {
            ServerMessage::MatchError { kind, message } => {
                assert_eq!(kind, MatchErrorKind::InvalidMessage);
                assert!(message.contains("Invalid JSON message"));
            }
            other => panic!("Expected MatchError, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_find_match_creates_guest_and_waits() {
        let app = create_test_app().await;
        let player_id = Uuid::new_v4();

        let mut ws = warp::test::ws()
            .path("/ws")
            .handshake(app.routes)
            .await
            .expect("WebSocket handshake should succeed");

        let find = serde_json::to_string(&ClientMessage::FindMatch { player_id, level: 1 }).unwrap();
        ws.send_text(find).await;

        let msg = ws.recv().await.expect("Should receive response");
        assert!(matches!(parse_server_message(&msg), ServerMessage::Waiting));

        // First contact registered a guest account
        let guest = app
            .player_repository
            .find_by_id(player_id)
            .await
            .unwrap()
            .expect("Guest player should exist");
        assert_eq!(guest.points, 0);
        assert_eq!(guest.hp, arena_types::MAX_HP);
    }

    #[tokio::test]
    async fn test_two_clients_get_matched() {
        let app = create_test_app().await;
        seed_question(&app).await;

        let mut ws1 = warp::test::ws()
            .path("/ws")
            .handshake(app.routes.clone())
            .await
            .expect("WebSocket handshake should succeed");
        let mut ws2 = warp::test::ws()
            .path("/ws")
            .handshake(app.routes)
            .await
            .expect("WebSocket handshake should succeed");

        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        ws1.send_text(
            serde_json::to_string(&ClientMessage::FindMatch {
                player_id: first,
                level: 1,
            })
            .unwrap(),
        )
        .await;
        let msg1 = ws1.recv().await.expect("Should receive response");
        assert!(matches!(parse_server_message(&msg1), ServerMessage::Waiting));

        ws2.send_text(
            serde_json::to_string(&ClientMessage::FindMatch {
                player_id: second,
                level: 2,
            })
            .unwrap(),
        )
        .await;

        // Both sides hear about the match
        let found1 = ws1.recv().await.expect("Should receive match");
        let found2 = ws2.recv().await.expect("Should receive match");
        match (parse_server_message(&found1), parse_server_message(&found2)) {
            (
                ServerMessage::MatchFound {
                    session_id: s1,
                    participants: p1,
                    ..
                },
                ServerMessage::MatchFound { session_id: s2, .. },
            ) => {
                assert_eq!(s1, s2);
                assert_eq!(p1.len(), 2);
            }
            other => panic!("Expected MatchFound on both sockets, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancel_match_leaves_queue() {
        let app = create_test_app().await;
        let player_id = Uuid::new_v4();

        let mut ws = warp::test::ws()
            .path("/ws")
            .handshake(app.routes)
            .await
            .expect("WebSocket handshake should succeed");

        ws.send_text(
            serde_json::to_string(&ClientMessage::FindMatch { player_id, level: 1 }).unwrap(),
        )
        .await;
        let _waiting = ws.recv().await.expect("Should receive waiting response");

        ws.send_text(serde_json::to_string(&ClientMessage::CancelMatch).unwrap())
            .await;
        let msg = ws.recv().await.expect("Should receive response");
        assert!(matches!(
            parse_server_message(&msg),
            ServerMessage::MatchCancelled
        ));
    }

    #[tokio::test]
    async fn test_cancel_is_noop_when_not_queued() {
        let app = create_test_app().await;

        let mut ws = warp::test::ws()
            .path("/ws")
            .handshake(app.routes)
            .await
            .expect("WebSocket handshake should succeed");

        // Never queued: cancelling still just acknowledges
        ws.send_text(serde_json::to_string(&ClientMessage::CancelMatch).unwrap())
            .await;

        let msg = ws.recv().await.expect("Should receive response");
        assert!(matches!(
            parse_server_message(&msg),
            ServerMessage::MatchCancelled
        ));
    }

    #[tokio::test]
    async fn test_submit_without_match_fails() {
        let app = create_test_app().await;

        let mut ws = warp::test::ws()
            .path("/ws")
            .handshake(app.routes)
            .await
            .expect("WebSocket handshake should succeed");

        ws.send_text(
            serde_json::to_string(&ClientMessage::SubmitCode {
                session_id: Uuid::new_v4(),
                question_id: Uuid::new_v4(),
                code: "function f() {}".to_string(),
            })
            .unwrap(),
        )
        .await;

        let msg = ws.recv().await.expect("Should receive response");
        match parse_server_message(&msg) {
            ServerMessage::MatchError { kind, .. } => {
                assert_eq!(kind, MatchErrorKind::MatchNotFound)
            }
            other => panic!("Expected MatchError, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ai_battle_over_websocket() {
        let app = create_test_app().await;
        let question = seed_question(&app).await;
        let player_id = Uuid::new_v4();

        let mut ws = warp::test::ws()
            .path("/ws")
            .handshake(app.routes)
            .await
            .expect("WebSocket handshake should succeed");

        ws.send_text(
            serde_json::to_string(&ClientMessage::StartAiBattle { player_id, level: 1 }).unwrap(),
        )
        .await;

        let found = ws.recv().await.expect("Should receive match");
        let session_id = match parse_server_message(&found) {
            ServerMessage::MatchFound {
                session_id,
                participants,
                ..
            } => {
                assert!(participants.iter().any(|p| p.is_ai));
                session_id
            }
            other => panic!("Expected MatchFound, got: {:?}", other),
        };

        ws.send_text(
            serde_json::to_string(&ClientMessage::SubmitCode {
                session_id,
                question_id: question.id,
                code: "function add(a, b) {\n    return a + b;\n}".to_string(),
            })
            .unwrap(),
        )
        .await;

        let received = ws.recv().await.expect("Should receive ack");
        assert!(matches!(
            parse_server_message(&received),
            ServerMessage::SubmissionReceived
        ));

        let finished = ws.recv().await.expect("Should receive final result");
        match parse_server_message(&finished) {
            ServerMessage::MatchFinished { winner_id, results } => {
                assert_eq!(winner_id, Some(player_id));
                assert_eq!(results.len(), 2);
            }
            other => panic!("Expected MatchFinished, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_websocket_heartbeat() {
        let app = create_test_app().await;

        let mut ws = warp::test::ws()
            .path("/ws")
            .handshake(app.routes)
            .await
            .expect("WebSocket handshake should succeed");

        let heartbeat = serde_json::to_string(&ClientMessage::Heartbeat).unwrap();
        ws.send(warp::ws::Message::text(heartbeat)).await;

        // No reply expected; give the server a moment to process
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test]
    async fn test_leaderboard_endpoint_empty() {
        let app = create_test_app().await;

        let response = warp::test::request()
            .method("GET")
            .path("/leaderboard")
            .reply(&app.routes)
            .await;

        assert_eq!(response.status(), 200);

        let entries: Vec<RankedEntry> =
            serde_json::from_slice(response.body()).expect("Should parse JSON");
        assert_eq!(entries.len(), 0);
    }

    #[tokio::test]
    async fn test_leaderboard_endpoint_with_limit() {
        let app = create_test_app().await;

        for i in 1..=5 {
            app.leaderboard_repository
                .record_result(Uuid::new_v4(), &format!("p{}", i), i * 10, true)
                .await
                .unwrap();
        }

        let response = warp::test::request()
            .method("GET")
            .path("/leaderboard?limit=2")
            .reply(&app.routes)
            .await;

        assert_eq!(response.status(), 200);

        let entries: Vec<RankedEntry> =
            serde_json::from_slice(response.body()).expect("Should parse JSON");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].points, 50);
    }

    #[tokio::test]
    async fn test_leaderboard_endpoint_with_invalid_limit() {
        let app = create_test_app().await;

        // Oversized limits are capped, not rejected
        let response = warp::test::request()
            .method("GET")
            .path("/leaderboard?limit=1000")
            .reply(&app.routes)
            .await;

        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn test_player_stats_endpoint() {
        let app = create_test_app().await;

        let player = app
            .player_repository
            .create_player(Player {
                id: Uuid::new_v4(),
                email: "alice@example.com".to_string(),
                display_name: "Alice".to_string(),
                points: 450,
                hp: 3,
                created_at: chrono::Utc::now().to_rfc3339(),
            })
            .await
            .unwrap();

        let response = warp::test::request()
            .method("GET")
            .path(&format!("/player/{}/stats", player.id))
            .reply(&app.routes)
            .await;

        assert_eq!(response.status(), 200);

        let body: serde_json::Value =
            serde_json::from_slice(response.body()).expect("Should parse JSON");
        assert_eq!(body["player"]["display_name"], "Alice");
        assert_eq!(body["level"], 3);
        assert_eq!(body["points_for_next_level"], 450);
        assert_eq!(body["rank"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_player_stats_endpoint_invalid_id() {
        let app = create_test_app().await;

        let response = warp::test::request()
            .method("GET")
            .path("/player/invalid-uuid/stats")
            .reply(&app.routes)
            .await;

        assert_eq!(response.status(), 400);

        let error: serde_json::Value =
            serde_json::from_slice(response.body()).expect("Should parse JSON");
        assert_eq!(error["error"], "Invalid player ID format");
    }

    #[tokio::test]
    async fn test_player_stats_endpoint_not_found() {
        let app = create_test_app().await;

        let response = warp::test::request()
            .method("GET")
            .path(&format!("/player/{}/stats", Uuid::new_v4()))
            .reply(&app.routes)
            .await;

        assert_eq!(response.status(), 404);

        let error: serde_json::Value =
            serde_json::from_slice(response.body()).expect("Should parse JSON");
        assert_eq!(error["error"], "Player not found");
    }

    #[tokio::test]
    async fn test_http_endpoints_cors() {
        let app = create_test_app().await;

        let response = warp::test::request()
            .method("OPTIONS")
            .path("/health")
            .header("origin", "http://localhost:3000")
            .header("access-control-request-method", "GET")
            .reply(&app.routes)
            .await;

        assert_eq!(response.status(), 200);
        assert!(response
            .headers()
            .contains_key("access-control-allow-origin"));
    }

    #[tokio::test]
    async fn test_invalid_routes() {
        let app = create_test_app().await;

        let response = warp::test::request()
            .method("GET")
            .path("/invalid")
            .reply(&app.routes)
            .await;

        assert_eq!(response.status(), 404);
    }
}
