//! Session token endpoints.
//!
//! - POST `/auth` - Exchange access group credentials for a new token
//! - PUT `/auth` - Verify a token, sliding its expiry when close

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use serde::Deserialize;
use serde_json::json;

use super::error::ApiError;
use super::{ApiState, Json};
use crate::auth::AuthError;
use crate::db::TokenRecord;
use crate::jwt::Claims;

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/auth", post(create_token).put(verify_token))
        .route("/auth/", post(create_token).put(verify_token))
        .with_state(state)
}

#[derive(Deserialize)]
struct TokenRequest {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct VerifyTokenRequest {
    access_group: String,
    signature: String,
}

async fn create_token(
    State(state): State<ApiState>,
    Json(payload): Json<TokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = payload.email.trim();
    if email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::unprocessable("Email and password are required"));
    }

    let access_group = state
        .authenticator
        .authenticate(email, &payload.password)
        .await?;

    // Everything the caller sent except the password
    let mut claims = Claims::new();
    claims.insert("sub".into(), json!(access_group.to_string()));
    claims.insert("email".into(), json!(email));

    let token = state.tokens.issue(claims, access_group).await?;

    Ok((StatusCode::CREATED, Json(token)))
}

async fn verify_token(
    State(state): State<ApiState>,
    Json(payload): Json<VerifyTokenRequest>,
) -> Result<Json<TokenRecord>, ApiError> {
    // No token can belong to an id that is not a UUID
    let access_group =
        uuid::Uuid::parse_str(payload.access_group.trim()).map_err(|_| AuthError::InvalidToken)?;

    let token = state
        .tokens
        .verify_and_refresh(access_group, &payload.signature)
        .await?;

    Ok(Json(token))
}
