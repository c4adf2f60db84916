//! Swim School Backend
//!
//! REST backend for the swim school administration dashboard, with SQLite
//! persistence and a Tantivy participant search index.

mod api;
mod auth;
mod balance;
mod config;
mod db;
mod errors;
mod matcher;
mod models;
mod reports;
mod schedule;
mod search;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::Repository;
use search::SearchIndex;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub search: Arc<SearchIndex>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting swim school backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Index path: {:?}", config.index_path);

    if config.api_psk.is_none() {
        tracing::warn!("No operator key configured (SWIM_API_PSK). Authentication is disabled!");
    }

    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    let search = Arc::new(SearchIndex::open(&config.index_path)?);
    let participants = repo.list_participants().await?;
    search.rebuild(&participants).await?;

    let state = AppState {
        repo,
        search,
        config: Arc::new(config.clone()),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let psk = state.config.api_psk.clone();

    // Operator routes
    let api_routes = Router::new()
        .route("/datastore/revision", get(api::get_revision))
        // Seasons
        .route("/seasons", get(api::list_seasons).post(api::create_season))
        .route(
            "/seasons/{id}",
            get(api::get_season)
                .put(api::update_season)
                .delete(api::delete_season),
        )
        .route(
            "/seasons/{id}/pools",
            get(api::list_season_pools).post(api::link_season_pool),
        )
        .route(
            "/seasons/{id}/pools/{pool_id}",
            delete(api::unlink_season_pool),
        )
        // Pools
        .route("/pools", get(api::list_pools).post(api::create_pool))
        .route(
            "/pools/{id}",
            get(api::get_pool).put(api::update_pool).delete(api::delete_pool),
        )
        // Products
        .route("/products", get(api::list_products).post(api::create_product))
        .route(
            "/products/{id}",
            get(api::get_product)
                .put(api::update_product)
                .delete(api::delete_product),
        )
        .route("/products/{id}/progress", get(api::get_product_progress))
        // Participants
        .route(
            "/participants",
            get(api::list_participants).post(api::create_participant),
        )
        .route("/participants/search", get(api::search_participants))
        .route(
            "/participants/{id}",
            get(api::get_participant)
                .put(api::update_participant)
                .delete(api::delete_participant),
        )
        // Registrations
        .route(
            "/registrations",
            get(api::list_registrations).post(api::create_registration),
        )
        .route(
            "/registrations/{id}",
            get(api::get_registration)
                .put(api::update_registration)
                .delete(api::delete_registration),
        )
        .route("/registrations/{id}/discount", post(api::apply_discount))
        .route(
            "/registrations/{id}/payments",
            get(api::list_registration_payments),
        )
        .route(
            "/registrations/{id}/health-declaration",
            get(api::get_registration_declaration),
        )
        // Payments
        .route("/payments", post(api::create_payment))
        .route("/payments/{id}", delete(api::delete_payment))
        // Health declarations
        .route(
            "/health-declarations",
            get(api::list_declarations).post(api::create_declaration),
        )
        .route(
            "/health-declarations/{id}/status",
            put(api::update_declaration_status),
        )
        // Reports
        .route(
            "/reports/registrations.csv",
            get(api::export_registrations_csv),
        )
        .route("/reports/summary", get(api::get_summary_report))
        .layer(middleware::from_fn(move |req, next| {
            auth::operator_auth_layer(psk.clone(), req, next)
        }));

    // Guardian signing page, reachable by token only
    let public_routes = Router::new().route(
        "/health-declarations/{token}",
        get(api::get_public_declaration).post(api::submit_public_declaration),
    );

    Router::new()
        .nest("/api", api_routes)
        .nest("/public", public_routes)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
