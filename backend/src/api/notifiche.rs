use axum::{extract::State, Json};
use serde::Deserialize;
use validator::Validate;

use crate::{
    auth::AuthUser,
    error::{AppError, Result},
    AppState,
};

#[derive(Debug, Deserialize, Validate)]
pub struct TestNotificaRequest {
    #[validate(email(message = "to must be a valid email address"))]
    pub to: String,
}

/// Connectivity probe for the mail relay. Unlike regular notifications this
/// one is synchronous and reports the relay error to the caller.
pub async fn test(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<TestNotificaRequest>,
) -> Result<Json<serde_json::Value>> {
    req.validate()?;

    if !auth.role.can_manage_users() {
        return Err(AppError::Forbidden);
    }

    state.notifier.send_test(&req.to).await.map_err(|e| {
        tracing::warn!(error = %e, "test notification failed");
        AppError::BadRequest(format!("test notification failed: {e}"))
    })?;

    Ok(Json(serde_json::json!({ "ok": true })))
}
