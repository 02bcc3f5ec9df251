//! Health check handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::AppState;

/// Basic health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall health status
    pub status: String,
}

/// Detailed health response with component checks
#[derive(Debug, Serialize, Deserialize)]
pub struct DetailedHealthResponse {
    pub status: String,
    pub checks: HealthChecks,
}

/// Individual health checks
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthChecks {
    /// State store health status
    pub state_store: ComponentHealth,
    /// Expiry sweeper progress
    pub expiry_sweep: SweepHealth,
}

/// Pending invitations already past expiry that the sweeper has not flipped yet
#[derive(Debug, Serialize, Deserialize)]
pub struct SweepHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overdue_pending: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Individual component health status
#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component status (healthy/unhealthy)
    pub status: String,
    /// Configured backend: memory, file or postgres
    pub backend: String,
    /// Response latency in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    /// Error message if unhealthy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Basic health check
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

/// Liveness check (is the process running)
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Readiness check (can the state store be reached)
pub async fn readiness(State(state): State<Arc<AppState>>) -> Result<StatusCode, StatusCode> {
    state
        .store
        .health_check()
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;

    Ok(StatusCode::OK)
}

/// Detailed health check with all dependencies
pub async fn health_detailed(State(state): State<Arc<AppState>>) -> Json<DetailedHealthResponse> {
    let start = std::time::Instant::now();
    let store_check = state.store.health_check().await;
    let latency = start.elapsed().as_millis() as u64;

    let store_status = match store_check {
        Ok(_) => ComponentHealth {
            status: "healthy".to_string(),
            backend: state.store.backend().to_string(),
            latency_ms: Some(latency),
            error: None,
        },
        Err(e) => ComponentHealth {
            status: "unhealthy".to_string(),
            backend: state.store.backend().to_string(),
            latency_ms: None,
            error: Some(e.to_string()),
        },
    };

    // A backlog is normal between sweeps; only a failed read is unhealthy
    let sweep_status = match state.invitations.sweep_backlog().await {
        Ok(overdue) => SweepHealth {
            status: "healthy".to_string(),
            overdue_pending: Some(overdue),
            error: None,
        },
        Err(e) => SweepHealth {
            status: "unhealthy".to_string(),
            overdue_pending: None,
            error: Some(e.to_string()),
        },
    };

    let overall_status = if store_status.status == "healthy" && sweep_status.status == "healthy" {
        "healthy"
    } else {
        "unhealthy"
    };

    Json(DetailedHealthResponse {
        status: overall_status.to_string(),
        checks: HealthChecks {
            state_store: store_status,
            expiry_sweep: sweep_status,
        },
    })
}
