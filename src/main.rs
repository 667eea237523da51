use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quizduel::{api, questions::QuestionBank, state::AppState, ws};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quizduel=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting quizduel...");

    // Load the question bank; a broken or missing file degrades to an empty
    // bank rather than refusing to start.
    let questions_path =
        std::env::var("QUIZDUEL_QUESTIONS").unwrap_or_else(|_| "data/questions.json".into());
    let bank = match QuestionBank::load(&questions_path) {
        Ok(bank) => {
            tracing::info!(
                path = %questions_path,
                questions = bank.len(),
                topics = bank.topics().len(),
                "question bank loaded"
            );
            bank
        }
        Err(e) => {
            tracing::warn!(
                path = %questions_path,
                error = %e,
                "failed to load question bank, serving without questions"
            );
            QuestionBank::empty()
        }
    };

    let state = Arc::new(AppState::new(bank));

    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/stats", get(api::server_stats))
        .fallback_service(ServeDir::new("static"))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = std::env::var("QUIZDUEL_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:3000".into())
        .parse()
        .expect("invalid QUIZDUEL_ADDR");
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
