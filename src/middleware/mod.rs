use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use base64::{engine::general_purpose, Engine as _};
use std::sync::Arc;

use crate::error::ApiError;
use crate::models::User;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            role: user.role,
        }
    }
}

// Basic Auth extractor
impl FromRequestParts<Arc<crate::AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let encoded = auth_header
            .strip_prefix("Basic ")
            .ok_or(ApiError::Unauthorized)?;

        let decoded = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|_| ApiError::Unauthorized)?;

        let credentials = String::from_utf8(decoded).map_err(|_| ApiError::Unauthorized)?;

        let (username, password) = credentials
            .split_once(':')
            .ok_or(ApiError::Unauthorized)?;

        let user = state
            .store
            .get_user_by_username(username)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        if !user.verify_password(password) {
            return Err(ApiError::Unauthorized);
        }

        Ok(user.into())
    }
}

/// Extractor for admin-only routes. Authenticates like [`AuthUser`]
/// and then rejects non-admin roles with 403.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl FromRequestParts<Arc<crate::AppState>> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(ApiError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}
