use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::{instrument, warn};

use crate::shared::{AppError, AppState};

/// Bearer-token authentication middleware - validates the Authorization
/// header and adds the decoded Claims to request extensions.
/// Usage: .route_layer(middleware::from_fn_with_state(app_state.clone(), auth::jwt_auth))
/// Handlers can then extract Extension(claims): Extension<Claims>.
#[instrument(skip(state, req, next))]
pub async fn jwt_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|header| header.to_str().ok())
        .ok_or_else(|| {
            warn!("missing authorization header");
            AppError::Unauthorized("missing authorization header".to_string())
        })?;

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        warn!("authorization header is not a bearer token");
        AppError::Unauthorized("invalid authorization header format".to_string())
    })?;

    // Signature-and-expiry check only; the session store is not consulted
    // on the hot path.
    let claims = state.auth.validate_access_token(token).map_err(|e| {
        warn!(error = %e, "access token rejected");
        AppError::from(e)
    })?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}
