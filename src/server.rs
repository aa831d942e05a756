//! HTTP routing for the stats endpoint.
//!
//! Handlers never drive sampling; each request performs a non-blocking read
//! of the monitors' last published values.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Serialize;

use crate::log_error;
use crate::monitor::Monitor;
use crate::utils::logging::SharedLogger;

/// The payload served to clients; both values are percentages in `[0, 100]`.
#[derive(Debug, Serialize)]
struct Stats {
    cpu: u8,
    mem: u8,
}

#[derive(Clone)]
struct AppState {
    cpu: Arc<dyn Monitor>,
    mem: Arc<dyn Monitor>,
    logger: SharedLogger,
}

/// Builds the router: the stats route, its older `/stats/summary` alias, and
/// a diagnostic catch-all.
pub fn router(cpu: Arc<dyn Monitor>, mem: Arc<dyn Monitor>, logger: SharedLogger) -> Router {
    let state = AppState { cpu, mem, logger };

    Router::new()
        .route("/stats", get(get_stats))
        .route("/stats/summary", get(get_stats))
        .fallback(echo)
        .with_state(state)
}

async fn get_stats(State(state): State<AppState>) -> Response {
    let stats = Stats {
        cpu: state.cpu.usage(),
        mem: state.mem.usage(),
    };

    match serde_json::to_vec(&stats) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        Err(err) => {
            // Not retried; the 200 status line stands and the body stays
            // empty.
            log_error!(state.logger, "failed to encode stats: {err}");
            StatusCode::OK.into_response()
        }
    }
}

/// Diagnostic catch-all: echoes the request method and path.
async fn echo(method: Method, uri: Uri) -> String {
    format!("{method}: {uri}\n")
}
