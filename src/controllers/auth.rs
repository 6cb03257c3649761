use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;
use crate::models::User;
use crate::store::NewUser;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
}

/// User as the API exposes it, without the password hash.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: String,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            role: user.role,
        }
    }
}

impl From<AuthUser> for UserProfile {
    fn from(user: AuthUser) -> Self {
        Self {
            id: user.user_id,
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            role: user.role,
        }
    }
}

// POST /api/auth/register
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    #[validate(length(min = 3, max = 32))]
    username: String,
    #[validate(length(min = 6))]
    password: String,
    #[validate(email)]
    email: String,
    #[validate(length(min = 1))]
    full_name: String,
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<UserProfile>)> {
    req.validate()?;

    let password_hash = bcrypt::hash(&req.password, state.config.auth.bcrypt_cost)?;
    let user = state
        .store
        .create_user(NewUser {
            username: req.username,
            password_hash,
            email: req.email,
            full_name: req.full_name,
            role: "user".to_string(),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(user.into())))
}

// POST /api/auth/login
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    username: String,
    password: String,
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<UserProfile>> {
    let user = state
        .store
        .get_user_by_username(&req.username)
        .await?
        .filter(|u| u.verify_password(&req.password))
        .ok_or(ApiError::Unauthorized)?;

    Ok(Json(user.into()))
}

// GET /api/auth/me
async fn me(user: AuthUser) -> Json<UserProfile> {
    Json(user.into())
}
