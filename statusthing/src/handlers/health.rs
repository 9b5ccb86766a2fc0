//! Health check handlers

use std::collections::HashMap;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// Shared state for the health routes
#[derive(Debug, Clone)]
pub struct HealthState {
    service: String,
    pool: Option<SqlitePool>,
}

impl HealthState {
    /// Create health state; without a pool readiness has nothing to probe
    pub fn new(service: impl Into<String>, pool: Option<SqlitePool>) -> Self {
        Self {
            service: service.into(),
            pool,
        }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service name
    pub service: String,

    /// Version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Readiness check response with dependency status
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessResponse {
    /// Overall readiness status
    pub ready: bool,

    /// Service name
    pub service: String,

    /// Dependency statuses
    pub dependencies: HashMap<String, DependencyStatus>,
}

/// Individual dependency status
#[derive(Debug, Serialize, Deserialize)]
pub struct DependencyStatus {
    /// Dependency is healthy
    pub healthy: bool,

    /// Optional message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Liveness probe; always 200 while the process serves requests
pub async fn health(State(state): State<HealthState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy".to_string(),
        service: state.service,
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
    };

    (StatusCode::OK, Json(response))
}

/// Readiness probe; 503 when the database does not answer `SELECT 1`
pub async fn readiness(State(state): State<HealthState>) -> impl IntoResponse {
    let mut dependencies = HashMap::new();
    let mut ready = true;

    if let Some(pool) = &state.pool {
        let status = match sqlx::query("SELECT 1").fetch_one(pool).await {
            Ok(_) => DependencyStatus {
                healthy: true,
                message: Some("Connected".to_string()),
            },
            Err(e) => {
                tracing::error!("Database health check failed: {}", e);
                ready = false;
                DependencyStatus {
                    healthy: false,
                    message: Some("Connection failed".to_string()),
                }
            }
        };
        dependencies.insert("database".to_string(), status);
    }

    let code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let response = ReadinessResponse {
        ready,
        service: state.service,
        dependencies,
    };

    (code, Json(response))
}
