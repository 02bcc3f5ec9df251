//! Authentication module

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use planeja_common::types::{Actor, EmailAddress};
use planeja_common::{Clock, Error};
use planeja_core::InvitationManager;
use planeja_storage::{SnapshotRepository, StateStore};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::handlers::ApiError;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub invitations: Arc<InvitationManager>,
    pub snapshots: Arc<dyn SnapshotRepository>,
    pub store: Arc<dyn StateStore>,
    pub clock: Arc<dyn Clock>,
    /// SHA-256 hex digest of the shared API key, when one is required
    pub api_key_sha256: Option<String>,
}

/// Authenticated context extracted from the request headers
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// The user performing the request
    pub actor: Actor,
}

/// Extract API key from request
pub fn extract_api_key(req: &Request) -> Option<&str> {
    // Check Authorization header
    if let Some(auth) = req.headers().get("authorization") {
        if let Ok(auth_str) = auth.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token);
            }
        }
    }

    // Check X-API-Key header
    if let Some(key) = req.headers().get("x-api-key") {
        if let Ok(key_str) = key.to_str() {
            return Some(key_str);
        }
    }

    None
}

/// Hash an API key for comparison
pub fn hash_api_key(api_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    hex::encode(hasher.finalize())
}

fn header<'r>(req: &'r Request, name: &str) -> Option<&'r str> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Build the acting user from the identity headers
fn extract_actor(req: &Request) -> Result<Actor, Error> {
    let id = header(req, "x-user-id")
        .ok_or_else(|| Error::Auth("Missing x-user-id header".to_string()))?;
    let id = Uuid::parse_str(id)
        .map_err(|_| Error::Auth("x-user-id must be a UUID".to_string()))?;

    let email = header(req, "x-user-email")
        .ok_or_else(|| Error::Auth("Missing x-user-email header".to_string()))?;
    let email = EmailAddress::parse(email)
        .ok_or_else(|| Error::Auth("x-user-email is not a valid address".to_string()))?;

    let name = header(req, "x-user-name")
        .map(str::to_string)
        .unwrap_or_else(|| email.local.clone());

    Ok(Actor::new(id, name, email.as_string()))
}

/// Authentication middleware
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // Skip auth for health check endpoints
    if request.uri().path().starts_with("/health") {
        return Ok(next.run(request).await);
    }

    if let Some(expected) = &state.api_key_sha256 {
        let api_key = extract_api_key(&request).ok_or_else(|| {
            warn!("Missing API key in request to {}", request.uri().path());
            Error::Auth("Missing API key".to_string())
        })?;

        if !hash_api_key(api_key).eq_ignore_ascii_case(expected) {
            warn!("API key hash mismatch for request to {}", request.uri().path());
            return Err(Error::Auth("Invalid API key".to_string()).into());
        }
    }

    let actor = extract_actor(&request).map_err(|e| {
        warn!("Rejected request to {}: {}", request.uri().path(), e);
        e
    })?;

    debug!(user_id = %actor.id, "Request authenticated");

    // Store auth context in request extensions
    request.extensions_mut().insert(AuthContext { actor });

    Ok(next.run(request).await)
}
