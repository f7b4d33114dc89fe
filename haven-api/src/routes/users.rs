/// Current-user endpoints
///
/// - `GET /v1/users/me` - The authenticated user
/// - `PATCH /v1/users/me` - Change own display name
/// - `POST /v1/users/me/verification` - Send a fresh verification mail

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    mailer::VerificationMail,
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use haven_shared::{
    auth::{identity::Identity, verification::generate_verification_token},
    models::{
        tenant::Tenant,
        user::{PendingVerification, UpdateUser, User},
    },
};
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMeRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,
}

fn user_not_found() -> ApiError {
    ApiError::NotFound("User not found".to_string())
}

pub async fn get_me(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<User>> {
    let user = User::find_by_id(&state.db, identity.tenant_id, identity.user_id)
        .await?
        .ok_or_else(user_not_found)?;

    Ok(Json(user))
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<UpdateMeRequest>,
) -> ApiResult<Json<User>> {
    req.validate()?;

    let user = User::update(
        &state.db,
        identity.tenant_id,
        identity.user_id,
        UpdateUser { name: req.name },
    )
    .await?;

    Ok(Json(user))
}

/// Replaces any pending token and mails the new one
///
/// # Errors
///
/// - `409 Conflict`: already verified
/// - `503 Service Unavailable`: the mailer failed
pub async fn resend_verification(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<StatusCode> {
    let user = User::find_by_id(&state.db, identity.tenant_id, identity.user_id)
        .await?
        .ok_or_else(user_not_found)?;

    if user.email_verified {
        return Err(ApiError::Conflict("Email is already verified".to_string()));
    }

    let tenant = Tenant::find_by_id(&state.db, identity.tenant_id)
        .await?
        .ok_or_else(|| ApiError::InternalError(format!("Tenant {} missing", identity.tenant_id)))?;

    let verification = generate_verification_token();
    User::set_verification_token(
        &state.db,
        identity.tenant_id,
        user.id,
        PendingVerification {
            token_hash: verification.hash.clone(),
            expires_at: verification.expires_at,
        },
    )
    .await?;

    state
        .mailer
        .send(VerificationMail {
            recipient: user.email,
            tenant_slug: tenant.slug,
            token: verification.token,
        })
        .await
        .map_err(|e| ApiError::ServiceUnavailable(e.to_string()))?;

    Ok(StatusCode::ACCEPTED)
}
