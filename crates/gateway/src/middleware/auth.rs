//! Bearer token authentication middleware
//!
//! Validates the Authorization header and stores the resulting AuthContext
//! in request extensions for handler extractors.

use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use leadforge_common::auth::extract_bearer;
use leadforge_common::errors::AppError;
use uuid::Uuid;

/// Authenticate the request and attach its AuthContext
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let auth_header = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized {
            message: "Missing Authorization header".to_string(),
        })?;

    let token = extract_bearer(auth_header).ok_or_else(|| AppError::Unauthorized {
        message: "Authorization header is not a bearer token".to_string(),
    })?;

    let context = state.jwt.authenticate(token, request_id)?;
    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}
