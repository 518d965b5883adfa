// rate_limit_middleware.rs
use crate::auth::verifier::bearer_token;
use crate::common::helpers::safe_token_log;
use crate::services::rate_limit::{RateLimitResult, RateLimitService};
use axum::{
    extract::{ConnectInfo, Extension, Request},
    http::{header::RETRY_AFTER, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Serialize)]
struct RateLimitErrorResponse {
    error: String,
    code: String,
    retry_after: u32,
}

/// Client IP: first `X-Forwarded-For` hop, then `X-Real-IP`, then the socket
fn extract_ip_address(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(forwarded_str) = forwarded.to_str() {
            if let Some(first_ip) = forwarded_str.split(',').next() {
                let first_ip = first_ip.trim();
                if !first_ip.is_empty() {
                    return Some(first_ip.to_string());
                }
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return Some(ip_str.trim().to_string());
        }
    }

    connect_info.map(|info| info.0.ip().to_string())
}

/// Caller key from the bearer token prefix. Unverified; only used for bucketing.
fn extract_user_identifier(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_token)
        .map(|token| format!("token:{}", &token[..token.len().min(20)]))
}

fn too_many_requests(retry_after: u32) -> Response {
    let body = RateLimitErrorResponse {
        error: "Rate limit exceeded. Please try again later.".to_string(),
        code: "RATE_LIMIT_EXCEEDED".to_string(),
        retry_after,
    };
    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
        response.headers_mut().insert(RETRY_AFTER, value);
    }
    response
}

/// Rate limiting middleware. Credential endpoints are checked against the
/// strict bucket first, then every request against the general limits.
pub async fn rate_limit_middleware(
    Extension(rate_limit_service): Extension<Arc<RateLimitService>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    let headers = request.headers();
    let ip_address = extract_ip_address(headers, connect_info.as_ref());
    let user_identifier = extract_user_identifier(headers);
    let is_authenticated = user_identifier.is_some();

    let identifier = user_identifier
        .or_else(|| ip_address.clone().map(|ip| format!("anon:{}", ip)))
        .unwrap_or_else(|| "unknown".to_string());

    let path = request.uri().path().to_string();

    let mut result = RateLimitResult::Allowed;
    if rate_limit_service.is_strict_path(&path) {
        result = rate_limit_service
            .check_strict(&path, ip_address.as_deref())
            .await;
    }
    if result == RateLimitResult::Allowed {
        result = rate_limit_service
            .check_rate_limit(&identifier, ip_address.as_deref(), is_authenticated)
            .await;
    }

    match result {
        RateLimitResult::Allowed => {
            debug!(
                identifier = %safe_token_log(&identifier),
                ip = ?ip_address,
                path = %path,
                "Request allowed by rate limiter"
            );
            Ok(next.run(request).await)
        }
        RateLimitResult::Limited { retry_after } => {
            warn!(
                ip = ?ip_address,
                path = %path,
                retry_after = retry_after,
                "Request blocked by rate limiter"
            );
            rate_limit_service.log_violation(
                &safe_token_log(&identifier),
                ip_address.as_deref(),
                &path,
            );
            Err(too_many_requests(retry_after))
        }
    }
}
