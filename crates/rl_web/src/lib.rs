use std::net::SocketAddr;
use std::sync::Arc;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::info;

pub mod auth;
pub mod error;
pub mod handlers;
pub mod state;

pub use auth::{AuthUser, StaticTokenVerifier};
pub use error::ApiError;
pub use state::AppState;

pub async fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/history", post(handlers::receive_history))
        .route("/create_user_profile", post(handlers::create_user_profile))
        .route("/article/:id", delete(handlers::delete_article))
        .route("/article/:id/reflection", post(handlers::save_reflection))
        .route("/api/jobs/:id", get(handlers::get_job))
        .route("/api/articles", get(handlers::list_articles))
        .route("/api/articles/:id", get(handlers::get_article))
        .route("/api/article/:id/read_later", post(handlers::toggle_read_later))
        .route("/api/generate-recommendations", post(handlers::generate_recommendations))
        .route("/api/recommendations", get(handlers::get_recommendations))
        .layer(cors)
        .with_state(Arc::new(state))
}

pub async fn serve(addr: SocketAddr, state: AppState) -> rl_core::Result<()> {
    let app = create_app(state).await;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("🌐 Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

pub mod prelude {
    pub use rl_core::{ArticleRecord, Result, Error};
    pub use crate::{AppState, AuthUser};
}
