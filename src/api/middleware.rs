//! Access control for the review/edit API.
//!
//! Both settings come from the environment when the server starts:
//! - `FEEDBACK_LENS_API_KEY` - bearer token required on every session route
//! - `FEEDBACK_LENS_CORS_ORIGINS` - comma-separated browser origins allowed to call the API

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tower_http::cors::{Any, AllowOrigin, CorsLayer};

const API_KEY_VAR: &str = "FEEDBACK_LENS_API_KEY";
const CORS_ORIGINS_VAR: &str = "FEEDBACK_LENS_CORS_ORIGINS";

#[derive(Clone, Debug, Default)]
pub struct SecurityConfig {
    /// Token reviewers must present. `None` leaves the API open.
    pub api_key: Option<String>,
    /// `None` allows any origin.
    pub cors_origins: Option<Vec<String>>,
}

impl SecurityConfig {
    pub fn from_env() -> Self {
        let config = Self {
            api_key: std::env::var(API_KEY_VAR).ok().filter(|k| !k.is_empty()),
            cors_origins: std::env::var(CORS_ORIGINS_VAR)
                .ok()
                .map(|raw| parse_origins(&raw)),
        };
        if config.api_key.is_none() {
            tracing::warn!("{} is not set; session routes are unauthenticated", API_KEY_VAR);
        }
        config
    }

    /// Open API with permissive CORS, for local use and tests.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn with_api_key(key: impl Into<String>) -> Self {
        Self {
            api_key: Some(key.into()),
            ..Self::default()
        }
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn cors_layer(config: &SecurityConfig) -> CorsLayer {
    let Some(origins) = &config.cors_origins else {
        return CorsLayer::permissive();
    };

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            HeaderValue::from_str(origin)
                .inspect_err(|_| tracing::warn!("Ignoring invalid CORS origin: {}", origin))
                .ok()
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([header::CONTENT_DISPOSITION])
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Reject requests whose bearer token does not match the configured key.
pub async fn auth_middleware(
    State(config): State<SecurityConfig>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = config.api_key.as_deref() else {
        return Ok(next.run(request).await);
    };

    match bearer_token(request.headers()) {
        Some(token) if token == expected => Ok(next.run(request).await),
        Some(_) => {
            tracing::warn!("Rejected {} {}: wrong API key", request.method(), request.uri());
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            tracing::warn!("Rejected {} {}: no bearer token", request.method(), request.uri());
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
