use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
    Extension,
};
use subtle::ConstantTimeEq;

use crate::{config::AuthConfig, error::ApiError};

const SCHEME: &str = "Bearer";

/// Why a request was turned away by the access guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    MissingHeader,
    WrongScheme,
    BadCredential,
}

impl AuthFailure {
    fn label(self) -> &'static str {
        match self {
            AuthFailure::MissingHeader => "missing_header",
            AuthFailure::WrongScheme => "wrong_scheme",
            AuthFailure::BadCredential => "bad_credential",
        }
    }
}

impl From<AuthFailure> for ApiError {
    fn from(failure: AuthFailure) -> Self {
        match failure {
            AuthFailure::MissingHeader => ApiError::Unauthenticated("Missing Authorization header".to_string()),
            AuthFailure::WrongScheme | AuthFailure::BadCredential => {
                ApiError::Forbidden("Invalid API key".to_string())
            }
        }
    }
}

/// Checks an `Authorization` header value against the shared secret.
/// An empty header counts as missing.
pub fn check_authorization(value: Option<&HeaderValue>, secret: &str) -> Result<(), AuthFailure> {
    let value = match value {
        Some(v) if !v.is_empty() => v,
        _ => return Err(AuthFailure::MissingHeader),
    };
    let value = value.to_str().map_err(|_| AuthFailure::BadCredential)?;

    let (scheme, key) = value.split_once(' ').ok_or(AuthFailure::WrongScheme)?;
    if scheme != SCHEME {
        return Err(AuthFailure::WrongScheme);
    }

    if bool::from(key.as_bytes().ct_eq(secret.as_bytes())) {
        Ok(())
    } else {
        Err(AuthFailure::BadCredential)
    }
}

pub async fn auth_middleware<B>(
    Extension(config): Extension<Arc<AuthConfig>>,
    req: Request<B>,
    next: Next<B>,
) -> Response {
    match check_authorization(req.headers().get(header::AUTHORIZATION), &config.api_key) {
        Ok(()) => next.run(req).await,
        Err(failure) => {
            tracing::warn!(reason = failure.label(), method = %req.method(), path = %req.uri().path(), "Rejected request");
            metrics::increment_counter!("blobsync_auth_failures_total", "reason" => failure.label());
            ApiError::from(failure).into_response()
        }
    }
}
