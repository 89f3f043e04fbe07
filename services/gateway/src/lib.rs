// PotSplit Gateway Service Library
// Exposes the router for the binary and for tests

pub mod config;
pub mod error;
pub mod metrics;
pub mod routes;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use routes::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health_check))
        .route("/metrics", get(routes::metrics_handler))
        .route("/sessions", post(routes::create_session))
        .route("/sessions/:id", get(routes::get_session))
        .route(
            "/sessions/:id/players",
            get(routes::list_players).post(routes::add_player),
        )
        .route("/sessions/:id/players/:index", patch(routes::update_player))
        .route("/sessions/:id/settle", post(routes::settle))
        .route(
            "/sessions/:id/execute-settlements",
            post(routes::execute_settlement),
        )
        .route("/sessions/:id/complete", post(routes::complete))
        .layer(middleware::from_fn(routes::track_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
