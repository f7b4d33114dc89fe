/// Authentication endpoints
///
/// - `POST /v1/auth/register` - Create a tenant and its first (admin) user
/// - `POST /v1/auth/login` - Exchange tenant slug, email and password for tokens
/// - `POST /v1/auth/refresh` - Exchange a refresh token for a new pair
/// - `POST /v1/auth/verify-email` - Redeem an email verification token
///
/// Login and refresh failures all answer with the same 401 body, whether the
/// tenant, the user, the password or the token was wrong.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    mailer::VerificationMail,
};
use axum::{extract::State, http::StatusCode, Json};
use haven_shared::{
    auth::{
        identity::Role,
        jwt::TokenPair,
        password,
        verification::{generate_verification_token, hash_verification_token},
    },
    models::{
        tenant::{validate_slug, CreateTenant, Tenant},
        user::{CreateUser, PendingVerification, User},
    },
    tenant::TenantId,
};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::{info, warn};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 255, message = "Tenant name must be 1-255 characters"))]
    pub tenant_name: String,

    /// Lowercase letters, digits and inner hyphens, 3-63 characters
    pub tenant_slug: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Checked for strength separately
    pub password: String,

    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub tenant: Tenant,
    pub user: User,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    pub tenant_slug: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub tenant_slug: String,
    pub token: String,
}

/// Registers a new tenant together with its admin user
///
/// The tenant and the user are inserted in one tenant-scoped transaction, so
/// a taken slug or a failed user insert leaves nothing behind.
///
/// ```text
/// POST /v1/auth/register
///
/// {
///   "tenant_name": "Acme",
///   "tenant_slug": "acme",
///   "email": "owner@acme.example",
///   "password": "SecureP@ss123",
///   "name": "Olive Owner"
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: validation failed or weak password
/// - `409 Conflict`: slug already taken
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    req.validate()?;
    validate_slug(&req.tenant_slug)?;
    password::validate_password_strength(&req.password)?;

    let password_hash = password::hash_password(&req.password)?;
    let verification = generate_verification_token();

    let tenant_data = CreateTenant {
        name: req.tenant_name,
        slug: req.tenant_slug,
    };
    let user_data = CreateUser {
        email: req.email,
        password_hash,
        name: req.name,
        role: Role::Admin,
        verification: Some(PendingVerification {
            token_hash: verification.hash.clone(),
            expires_at: verification.expires_at,
        }),
    };

    let (tenant, user) = state
        .db
        .run_scoped(TenantId::generate(), move |tx| {
            Box::pin(async move {
                let tenant = Tenant::insert(tx, tenant_data).await?;
                let user = User::insert(tx, user_data).await?;
                Ok((tenant, user))
            })
        })
        .await?;

    info!(tenant_id = %tenant.id, user_id = %user.id, "Registered tenant");

    let mail = VerificationMail {
        recipient: user.email.clone(),
        tenant_slug: tenant.slug.clone(),
        token: verification.token,
    };
    if let Err(e) = state.mailer.send(mail).await {
        // The account exists; the user can ask for another mail
        warn!(error = %e, user_id = %user.id, "Verification mail not sent");
    }

    let tokens = state
        .tokens
        .issue_token_pair(user.id, user.tenant(), &user.email, user.role)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse { tenant, user, tokens }),
    ))
}

/// Hash verified when the tenant or user is unknown, so every failed login
/// costs one Argon2 verification
fn decoy_hash() -> Option<&'static str> {
    static DECOY: OnceLock<Option<String>> = OnceLock::new();
    DECOY
        .get_or_init(|| password::hash_password("decoy-password-never-matches").ok())
        .as_deref()
}

/// Logs a user into one tenant
///
/// ```text
/// POST /v1/auth/login
///
/// { "tenant_slug": "acme", "email": "owner@acme.example", "password": "SecureP@ss123" }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: malformed email
/// - `401 Unauthorized`: unknown tenant, unknown user, or wrong password
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<TokenPair>> {
    req.validate()?;

    let user = match Tenant::find_by_slug(&state.db, &req.tenant_slug).await? {
        Some(tenant) => User::find_by_email(&state.db, tenant.tenant_id(), &req.email).await?,
        None => None,
    };

    let Some(user) = user else {
        if let Some(hash) = decoy_hash() {
            let _ = password::verify_password(&req.password, hash);
        }
        return Err(ApiError::Unauthorized);
    };

    if !password::verify_password(&req.password, &user.password_hash)? {
        return Err(ApiError::Unauthorized);
    }

    info!(user_id = %user.id, tenant_id = %user.tenant_id, "User logged in");

    let tokens = state
        .tokens
        .issue_token_pair(user.id, user.tenant(), &user.email, user.role)?;

    Ok(Json(tokens))
}

/// Exchanges a refresh token for a new pair
///
/// The user is re-read so a deleted user cannot refresh and a changed role
/// is picked up. Presenting an access token here is a 401.
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<TokenPair>> {
    let claims = state.tokens.verify_refresh(&req.refresh_token)?;

    let user = User::find_by_id(&state.db, claims.tenant(), claims.sub)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    let tokens = state
        .tokens
        .issue_token_pair(user.id, user.tenant(), &user.email, user.role)?;

    Ok(Json(tokens))
}

/// Marks the owner of a verification token as verified
///
/// An unknown tenant, unknown token and expired token are indistinguishable.
pub async fn verify_email(
    State(state): State<AppState>,
    Json(req): Json<VerifyEmailRequest>,
) -> ApiResult<Json<User>> {
    let not_found = || ApiError::NotFound("Verification token not found".to_string());

    let tenant = Tenant::find_by_slug(&state.db, &req.tenant_slug)
        .await?
        .ok_or_else(not_found)?;

    let token_hash = hash_verification_token(req.token.trim());
    let user = User::verify_email(&state.db, tenant.tenant_id(), &token_hash)
        .await
        .map_err(|e| match e {
            haven_shared::db::StoreError::NotFound(_) => not_found(),
            other => other.into(),
        })?;

    info!(user_id = %user.id, tenant_id = %user.tenant_id, "Email verified");
    Ok(Json(user))
}
