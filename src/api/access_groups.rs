//! Access group endpoints.
//!
//! - POST `/access-groups` - Register a new access group
//! - GET `/access-groups` - List access groups
//! - GET `/access-groups/by-id?id=` - Fetch one access group

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::ValidateEmail;

use super::error::ApiError;
use super::{ApiState, Json};
use crate::auth::parse_id;
use crate::db::AccessGroup;

const MAX_NAME_LENGTH: usize = 50;
const MAX_EMAIL_LENGTH: usize = 50;

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route(
            "/access-groups",
            get(list_access_groups).post(create_access_group),
        )
        .route(
            "/access-groups/",
            get(list_access_groups).post(create_access_group),
        )
        .route("/access-groups/by-id", get(get_access_group))
        .with_state(state)
}

#[derive(Deserialize)]
struct CreateAccessGroupRequest {
    name: String,
    email: String,
    password: String,
}

/// Public view of an access group. Never carries the password hash.
#[derive(Serialize)]
struct AccessGroupResponse {
    id: Uuid,
    name: String,
    email: String,
    created_at: DateTime<Utc>,
}

impl From<AccessGroup> for AccessGroupResponse {
    fn from(group: AccessGroup) -> Self {
        Self {
            id: group.id,
            name: group.name,
            email: group.email,
            created_at: group.created_at,
        }
    }
}

async fn create_access_group(
    State(state): State<ApiState>,
    Json(payload): Json<CreateAccessGroupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = payload.name.trim();
    let email = payload.email.trim().to_string();

    if name.is_empty() {
        return Err(ApiError::unprocessable("Name cannot be empty"));
    }

    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ApiError::unprocessable(format!(
            "Name cannot be longer than {} characters",
            MAX_NAME_LENGTH
        )));
    }

    if email.chars().count() > MAX_EMAIL_LENGTH || !email.validate_email() {
        return Err(ApiError::unprocessable("Email is not a valid address"));
    }

    if payload.password.is_empty() {
        return Err(ApiError::unprocessable("Password cannot be empty"));
    }

    let group = state
        .authenticator
        .register(name, &email, &payload.password)
        .await?;

    Ok((StatusCode::CREATED, Json(AccessGroupResponse::from(group))))
}

async fn list_access_groups(
    State(state): State<ApiState>,
) -> Result<Json<Vec<AccessGroupResponse>>, ApiError> {
    let groups = state.authenticator.list().await?;
    Ok(Json(
        groups.into_iter().map(AccessGroupResponse::from).collect(),
    ))
}

#[derive(Deserialize)]
struct ByIdQuery {
    id: String,
}

async fn get_access_group(
    State(state): State<ApiState>,
    Query(query): Query<ByIdQuery>,
) -> Result<Json<AccessGroupResponse>, ApiError> {
    let id = parse_id(&query.id)?;
    let group = state.authenticator.get(id).await?;
    Ok(Json(group.into()))
}
