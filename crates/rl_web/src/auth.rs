use std::collections::HashMap;
use std::sync::Arc;
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use rl_core::{Error, IdentityVerifier, Result};
use tracing::warn;
use crate::error::ApiError;
use crate::state::AppState;

/// Verifier backed by a fixed token table. An empty table rejects everyone.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, String>,
}

impl StaticTokenVerifier {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        if tokens.is_empty() {
            warn!("⚠️ No API tokens configured, every request will be rejected");
        }
        Self { tokens }
    }
}

#[async_trait]
impl IdentityVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Result<String> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| Error::Unauthorized("Invalid token".to_string()))
    }
}

/// The verified user behind a request's bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> std::result::Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::Unauthorized("Authorization header is missing or invalid".to_string()))?;

        match state.verifier.verify(token).await {
            Ok(user_id) => Ok(AuthUser(user_id)),
            Err(e) => {
                warn!("API token verification failed: {}", e);
                Err(ApiError::Unauthorized("Invalid token".to_string()))
            }
        }
    }
}
