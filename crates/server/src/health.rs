use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use pitchwatch_core::{CycleReport, Reconciler};
use serde::Serialize;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    reconciler: Arc<Reconciler>,
}

impl HealthState {
    pub fn new(reconciler: Arc<Reconciler>) -> Self {
        Self { reconciler }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TrackerCheck {
    pub tracked: usize,
    pub unseen: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub tracker: TrackerCheck,
    pub last_cycle: Option<CycleReport>,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn spawn(bind_address: &str, port: u16, state: HealthState) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(state)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

/// `starting` until the first cycle finishes, `degraded` while the latest
/// cycle had fetch failures.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let tracker = state.reconciler.tracker();
    let tracker = TrackerCheck {
        tracked: tracker.len().await,
        unseen: tracker.retrieve_unseen().await.len(),
    };
    let last_cycle = state.reconciler.last_report().await;

    let status = match &last_cycle {
        None => "starting",
        Some(report) if report.is_degraded() => "degraded",
        Some(_) => "ready",
    };
    let status_code =
        if status == "degraded" { StatusCode::SERVICE_UNAVAILABLE } else { StatusCode::OK };

    let payload =
        HealthResponse { status, tracker, last_cycle, checked_at: Utc::now().to_rfc3339() };
    (status_code, Json(payload))
}
