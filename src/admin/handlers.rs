use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::admin::AdminState;
use crate::resilience::{BreakerSnapshot, BreakerState};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub breakers: usize,
    pub open: usize,
    pub half_open: usize,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn not_found(name: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: format!("no breaker named '{name}'"),
        }),
    )
        .into_response()
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let snapshots = state.registry.snapshots();
    let count = |wanted: BreakerState| snapshots.iter().filter(|s| s.state == wanted).count();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        breakers: snapshots.len(),
        open: count(BreakerState::Open),
        half_open: count(BreakerState::HalfOpen),
    })
}

pub async fn list_breakers(State(state): State<AdminState>) -> Json<Vec<BreakerSnapshot>> {
    Json(state.registry.snapshots())
}

pub async fn get_breaker(State(state): State<AdminState>, Path(name): Path<String>) -> Response {
    match state.registry.get(&name) {
        Some(breaker) => Json(breaker.snapshot()).into_response(),
        None => not_found(&name),
    }
}

pub async fn reset_breaker(State(state): State<AdminState>, Path(name): Path<String>) -> Response {
    match state.registry.get(&name) {
        Some(breaker) => {
            tracing::info!(breaker = %name, "Manual reset requested");
            breaker.reset();
            Json(breaker.snapshot()).into_response()
        }
        None => not_found(&name),
    }
}

pub async fn open_breaker(State(state): State<AdminState>, Path(name): Path<String>) -> Response {
    match state.registry.get(&name) {
        Some(breaker) => {
            tracing::info!(breaker = %name, "Manual open requested");
            breaker.force_open();
            Json(breaker.snapshot()).into_response()
        }
        None => not_found(&name),
    }
}
