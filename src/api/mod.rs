mod access_groups;
mod auth;
mod error;
mod json;

use axum::{Router, routing::get};
use serde_json::{Value, json};

use crate::auth::{CredentialAuthenticator, TokenService};

pub use error::ApiError;
pub use json::Json;

/// State shared by all API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub authenticator: CredentialAuthenticator,
    pub tokens: TokenService,
}

/// Create the API router, mounted under `/api`.
///
/// Collection paths answer both with and without a trailing slash.
pub fn create_api_router(state: ApiState) -> Router {
    let routes = Router::new()
        .merge(access_groups::router(state.clone()))
        .merge(auth::router(state));

    Router::new()
        .route("/api", get(root))
        .route("/api/", get(root))
        .nest("/api", routes)
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "The JWT Auth Service is running!" }))
}
