//! QuizRaid Engine - Main entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quizraid_domain::{CategoryId, CombatPolicy, EventBossConfig, EventBossId, EventId, Question, QuestionId};
use quizraid_engine::api::websocket::{self, WsState};
use quizraid_engine::api::ConnectionManager;
use quizraid_engine::app::App;
use quizraid_engine::battle::registry;
use quizraid_engine::infrastructure::memory::{
    GuestIdentityResolver, InMemoryBadgeStore, InMemoryEventBossDirectory,
    InMemoryLeaderboardStore, InMemoryQuestionSource,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv_from_repo_root();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quizraid_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting QuizRaid Engine");

    let server_host = std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let server_port: u16 = std::env::var("SERVER_PORT")
        .or_else(|_| std::env::var("PORT"))
        .unwrap_or_else(|_| "3000".into())
        .parse()
        .unwrap_or(3000);

    // In-memory collaborators; a persistence backend slots in behind the
    // same ports
    let questions = Arc::new(InMemoryQuestionSource::new());
    let directory = Arc::new(InMemoryEventBossDirectory::new());
    let leaderboard = Arc::new(InMemoryLeaderboardStore::new());
    let badges = Arc::new(InMemoryBadgeStore::new());
    let identity = Arc::new(GuestIdentityResolver::new());

    seed_demo_content(&questions, &directory);

    let connections = Arc::new(ConnectionManager::new());
    let app = Arc::new(App::new(
        questions,
        directory,
        leaderboard,
        badges,
        identity,
        connections.clone(),
    ));

    registry::spawn_sweeper(app.registry.clone());

    let ws_state = Arc::new(WsState {
        app,
        connections,
    });

    let mut router = axum::Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/ws", get(websocket::ws_handler).with_state(ws_state))
        .layer(TraceLayer::new_for_http());

    if let Some(cors) = build_cors_layer_from_env() {
        router = router.layer(cors);
    }

    let addr: SocketAddr = format!("{server_host}:{server_port}").parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

/// Register one demo event-boss and its question set so a fresh engine is
/// playable out of the box. The boss id is logged at startup.
fn seed_demo_content(questions: &InMemoryQuestionSource, directory: &InMemoryEventBossDirectory) {
    let event_id = EventId::new();
    let event_boss_id = EventBossId::new();
    let category_id = CategoryId::new();

    let demo_questions = vec![
        demo_question(category_id, "What is 7 x 8?", &["54", "56", "64", "48"], 1),
        demo_question(
            category_id,
            "Which planet is closest to the sun?",
            &["Venus", "Earth", "Mercury", "Mars"],
            2,
        ),
        demo_question(
            category_id,
            "What gas do plants absorb from the air?",
            &["Oxygen", "Nitrogen", "Carbon dioxide", "Helium"],
            2,
        ),
        demo_question(
            category_id,
            "How many continents are there?",
            &["5", "6", "7", "8"],
            2,
        ),
        demo_question(
            category_id,
            "What is the capital of Japan?",
            &["Osaka", "Tokyo", "Kyoto", "Nagoya"],
            1,
        ),
    ];
    questions.add_category(category_id, demo_questions);

    directory.add(EventBossConfig {
        event_id,
        event_boss_id,
        boss_name: "Demo Dragon".into(),
        max_hp: 200,
        cooldown_secs: 30,
        number_of_teams: 2,
        max_players_per_team: None,
        join_code: None,
        category_id,
        policy: CombatPolicy::default(),
    });

    tracing::info!(
        event_id = %event_id,
        event_boss_id = %event_boss_id,
        "Seeded demo event-boss"
    );
}

fn demo_question(
    category_id: CategoryId,
    text: &str,
    choices: &[&str],
    correct_choice: u32,
) -> Question {
    Question {
        id: QuestionId::new(),
        category_id,
        text: text.into(),
        choices: choices.iter().map(|c| c.to_string()).collect(),
        correct_choice,
        time_limit_ms: 30_000,
    }
}

fn load_dotenv_from_repo_root() {
    let repo_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..");

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}

fn build_cors_layer_from_env() -> Option<CorsLayer> {
    let allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())?;

    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    if allowed_origins == "*" {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|s| HeaderValue::from_str(s).ok())
            .collect();

        if origins.is_empty() {
            return None;
        }

        cors = cors.allow_origin(origins);
    }

    Some(cors)
}
