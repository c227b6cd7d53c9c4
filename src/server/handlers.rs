//! HTTP handlers for the health, pre-flight, credential-reset and progress-channel routes

use crate::credentials::{parse_slot_name, QuotaReport};
use crate::job::{CheckReport, JobRequest};
use crate::server::session::relay;
use crate::server::AppState;
use crate::SitemapError;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub credentials: Vec<QuotaReport>,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        credentials: state.orchestrator.pool().reports(),
    })
}

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub domain: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    #[serde(flatten)]
    pub report: CheckReport,
    pub details: Vec<String>,
    /// Progress channel for this domain, using the same security as the request
    pub websocket_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

pub async fn check(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CheckRequest>,
) -> Response {
    match state.orchestrator.check(&request.domain).await {
        Ok(report) => {
            let websocket_url = websocket_url(&headers, state.force_secure_websocket)
                .map(|base| channel_url(&base, &report.domain));
            let details = report.details();
            Json(CheckResponse {
                report,
                details,
                websocket_url,
            })
            .into_response()
        }
        Err(e @ SitemapError::InvalidDomain(_)) => {
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e) => {
            tracing::warn!("Check of {} failed: {}", request.domain, e);
            error_response(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

/// `POST /credentials/API3/reset`: puts a credential back into rotation
pub async fn reset_credential(
    State(state): State<AppState>,
    Path(api_name): Path<String>,
) -> Response {
    let Some(slot) = parse_slot_name(&api_name) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("Unknown credential '{}'", api_name),
        );
    };

    let pool = state.orchestrator.pool();
    match pool.reset(slot).and_then(|()| pool.get(slot)) {
        Ok(credential) => Json(pool.quota_report(&credential)).into_response(),
        Err(e) => error_response(StatusCode::NOT_FOUND, e.to_string()),
    }
}

/// `GET /ws?domain=...&credentialSlot=...`
pub async fn ws_query(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(request): Query<JobRequest>,
) -> Response {
    ws.on_upgrade(move |socket| run_socket(socket, state, request))
}

/// `GET /ws/API3/example.com`
pub async fn ws_path(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path((api_name, domain)): Path<(String, String)>,
) -> Response {
    let Some(slot) = parse_slot_name(&api_name) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("Unknown credential '{}'", api_name),
        );
    };
    let request = JobRequest::new(domain, Some(slot));
    ws.on_upgrade(move |socket| run_socket(socket, state, request))
}

async fn run_socket(socket: WebSocket, state: AppState, request: JobRequest) {
    let (outgoing, incoming) = socket.split();
    let handle = state.orchestrator.start(request);
    tracing::debug!("Job {} attached to WebSocket subscriber", handle.id);
    relay(outgoing, incoming, handle, state.limits).await;
}

/// Base URL of the progress channel as seen by the client
///
/// The scheme mirrors the request: `wss` when the request arrived over TLS (as
/// reported by a reverse proxy) or when secure channels are forced, `ws` otherwise.
///
/// # Returns
///
/// `None` if the request names no host
pub fn websocket_url(headers: &HeaderMap, force_secure: bool) -> Option<String> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(',').next().unwrap_or(v).trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let host = header("x-forwarded-host").or_else(|| header("host"))?;

    let secure = force_secure
        || header("x-forwarded-proto").is_some_and(|p| p.eq_ignore_ascii_case("https"))
        || header("forwarded").is_some_and(|f| {
            f.split(';')
                .any(|part| part.trim().eq_ignore_ascii_case("proto=https"))
        });

    let scheme = if secure { "wss" } else { "ws" };
    Some(format!("{}://{}/ws", scheme, host))
}

fn channel_url(base: &str, domain: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("domain", domain)
        .finish();
    format!("{}?{}", base, query)
}
