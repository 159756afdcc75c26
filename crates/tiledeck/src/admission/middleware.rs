//! Request admission: rate limiting, then token authentication.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use tracing::{debug, trace, warn};

use super::AdmissionError;
use super::rate_limit::Decision;
use super::token::{TOKEN_HEADER, client_key, ct_eq, token_from_query};
use crate::api::{ApiError, AppState};

/// Budget units charged for a request.
pub fn route_cost(method: &Method, path: &str) -> u32 {
    let path = path.trim_end_matches('/');
    if path == "/api/settings/autodetect" {
        5
    } else if path == "/api/programs" || path.starts_with("/api/programs/") {
        3
    } else if path == "/api/run"
        || path.starts_with("/api/actions/")
        || (method == Method::GET && path == "/api/tiles")
    {
        2
    } else {
        1
    }
}

/// Token from the `X-Token` header, else from the `token` query parameter.
pub fn presented_token(req: &Request) -> Option<String> {
    req.headers()
        .get(TOKEN_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .or_else(|| req.uri().query().and_then(token_from_query))
        .filter(|t| !t.is_empty())
}

fn client_ip(req: &Request) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Admission middleware for every `/api` route.
pub async fn admission_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (expected, limits) = state
        .store
        .read(|c| (c.token.clone(), c.rate_limit))
        .await;

    let token = presented_token(&req);
    let verified = token
        .as_deref()
        .filter(|t| ct_eq(t.as_bytes(), expected.as_bytes()));
    let ip = client_ip(&req);
    // Failed or missing tokens all share the bare-IP bucket.
    let key = client_key(&ip, verified);
    let cost = route_cost(req.method(), req.uri().path());

    match state.limiter.check(&key, cost, limits) {
        Decision::Limited { retry_after_secs } => {
            warn!(client = %ip, path = %req.uri().path(), retry_after_secs, "rate limited");
            return Err(AdmissionError::RateLimited { retry_after_secs }.into());
        }
        Decision::Allowed { remaining } => {
            trace!(client = %ip, remaining, "request admitted by rate limiter");
        }
    }

    if token.is_none() {
        debug!(client = %ip, path = %req.uri().path(), "missing token");
        return Err(AdmissionError::MissingToken.into());
    }
    if verified.is_none() {
        warn!(client = %ip, path = %req.uri().path(), "token mismatch");
        return Err(AdmissionError::TokenMismatch.into());
    }

    Ok(next.run(req).await)
}
