//! Middleware for the PCX server
//!
//! This module provides middleware for:
//! - CORS (Cross-Origin Resource Sharing)
//! - Request logging with tracing
//! - Origin enforcement on mutating requests
//! - Keyed per-identity rate limiting
//! - API-key authentication

use axum::{
    extract::{Request, State},
    http::{header, HeaderName, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::config::CorsConfig;

pub mod auth;
pub mod rate_limit;

/// Create CORS layer from configuration
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let mut cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ACCEPT,
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-api-key"),
        ])
        .max_age(Duration::from_secs(3600));

    if config.allowed_origins.is_empty() || config.allowed_origins.contains(&"*".to_string()) {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Vec<_> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        cors = cors.allow_origin(origins);

        // Credentials cannot be combined with a wildcard origin.
        if config.allow_credentials {
            cors = cors.allow_credentials(true);
        }
    }

    cors
}

/// Create tracing/logging layer
pub fn tracing_layer(
) -> TraceLayer<tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>>
{
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(tower_http::LatencyUnit::Micros),
        )
}

/// Origin policy applied to mutating requests.
#[derive(Clone)]
pub struct OriginPolicy {
    allowed: Arc<Vec<String>>,
    allow_any: bool,
}

impl OriginPolicy {
    pub fn from_config(config: &CorsConfig) -> Self {
        let allow_any = config.allowed_origins.is_empty()
            || config.allowed_origins.contains(&"*".to_string());
        Self {
            allowed: Arc::new(config.allowed_origins.clone()),
            allow_any,
        }
    }

    fn permits(&self, origin: &str) -> bool {
        self.allow_any || self.allowed.iter().any(|allowed| allowed == origin)
    }
}

/// Reject mutating browser requests from unknown origins.
///
/// Non-browser clients send no Origin header and pass through; the auth
/// gate still applies to them.
pub async fn origin_guard(
    State(policy): State<OriginPolicy>,
    request: Request,
    next: Next,
) -> Response {
    let mutating = matches!(
        *request.method(),
        Method::POST | Method::PUT | Method::DELETE | Method::PATCH
    );

    if mutating {
        if let Some(origin) = request
            .headers()
            .get(header::ORIGIN)
            .and_then(|v| v.to_str().ok())
        {
            if !policy.permits(origin) {
                tracing::warn!(origin, "rejected mutating request from unknown origin");
                return (
                    StatusCode::FORBIDDEN,
                    Json(json!({
                        "error": {
                            "message": "Origin not allowed",
                            "status": 403,
                        }
                    })),
                )
                    .into_response();
            }
        }
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_with_specific_origins() {
        let config = CorsConfig {
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "https://example.com".to_string(),
            ],
            allow_credentials: true,
        };

        let _layer = cors_layer(&config);
    }

    #[test]
    fn test_cors_layer_with_wildcard() {
        let config = CorsConfig {
            allowed_origins: vec!["*".to_string()],
            allow_credentials: false,
        };

        let _layer = cors_layer(&config);
    }

    #[test]
    fn test_origin_policy_exact_match() {
        let policy = OriginPolicy::from_config(&CorsConfig {
            allowed_origins: vec!["https://example.com".to_string()],
            allow_credentials: true,
        });

        assert!(policy.permits("https://example.com"));
        assert!(!policy.permits("https://evil.example"));
    }

    #[test]
    fn test_origin_policy_wildcard() {
        let policy = OriginPolicy::from_config(&CorsConfig {
            allowed_origins: vec!["*".to_string()],
            allow_credentials: false,
        });

        assert!(policy.permits("https://anything.example"));
    }
}
