pub mod auth;
pub mod error;
pub mod hours;
pub mod token;
mod validation;

use axum::{
    http::{StatusCode, Uri},
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

/// Route prefixes reported by the health check and the 404 fallback
const ROUTE_PREFIXES: [&str; 3] = ["/api/auth", "/api/hours", "/api/health"];

pub fn create_router(state: Arc<AppState>) -> Router {
    // Auth routes (public)
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    // Hours ledger routes, all behind the authorization gate
    let hours_routes = Router::new()
        .route("/log", post(hours::log_hours))
        .route("/my-hours", get(hours::my_hours))
        .route("/summary", get(hours::summary))
        .route("/:id", delete(hours::delete_entry))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/hours", hours_routes)
        .route("/api/health", get(health_check))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    routes: Vec<&'static str>,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: chrono::Utc::now().to_rfc3339(),
        routes: ROUTE_PREFIXES.to_vec(),
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NotFoundResponse {
    message: &'static str,
    path: String,
    available_routes: Vec<&'static str>,
}

async fn not_found(uri: Uri) -> (StatusCode, Json<NotFoundResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(NotFoundResponse {
            message: "Route not found",
            path: uri.path().to_string(),
            available_routes: ROUTE_PREFIXES.to_vec(),
        }),
    )
}
