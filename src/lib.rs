//! Selection admin
//!
//! Reactive view-state for administering topic selection periods, plus a
//! reference SQLite store served over a REST API.

pub mod adapter;
pub mod api;
pub mod config;
pub mod db;
pub mod dialog;
pub mod errors;
pub mod features;
pub mod models;
pub mod reactive;
pub mod root;
pub mod store;
pub mod sync;

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use db::Repository;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Arc<Config>,
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/revision", get(api::get_revision))
        // Periods
        .route("/periods", get(api::list_periods).post(api::create_period))
        .route(
            "/periods/{id}",
            put(api::update_period).delete(api::delete_period),
        )
        .route("/periods/{id}/activate", post(api::activate_period))
        .route("/periods/{id}/assignments", get(api::list_assignments))
        // Topics
        .route("/topics", get(api::list_topics).post(api::create_topic))
        .route("/topics/{id}", put(api::update_topic).delete(api::delete_topic))
        // Questions
        .route("/questions", get(api::list_questions).post(api::create_question))
        .route(
            "/questions/{id}",
            put(api::update_question).delete(api::delete_question),
        )
        // Categories
        .route(
            "/categories",
            get(api::list_categories).post(api::create_category),
        )
        .route(
            "/categories/{id}",
            put(api::update_category).delete(api::delete_category),
        )
        // Students
        .route("/students", get(api::list_students).post(api::create_student))
        .route("/students/{id}", axum::routing::delete(api::delete_student))
        // Links
        .route("/links/{set}/{parent}", get(api::list_links))
        .route(
            "/links/{set}/{parent}/{child}",
            put(api::put_link).delete(api::delete_link),
        );

    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
