/// Bearer-token authentication middleware for Axum
///
/// Verifies the `Authorization: Bearer <token>` header as an access token
/// and inserts the resulting [`Identity`] into request extensions. Handlers
/// take it with `Extension<Identity>` and pass it on explicitly.
///
/// Every failure (missing header, wrong scheme, bad signature, expired,
/// refresh token) produces the same 401 response, so clients cannot probe
/// which check failed.
///
/// # Example
///
/// ```no_run
/// use axum::{middleware, routing::get, Extension, Router};
/// use haven_shared::auth::identity::Identity;
/// use haven_shared::auth::jwt::TokenService;
/// use haven_shared::auth::middleware::require_identity;
///
/// async fn whoami(Extension(identity): Extension<Identity>) -> String {
///     identity.email
/// }
///
/// let tokens = TokenService::with_default_ttls("an-hs256-secret-of-at-least-32-bytes!");
/// let app: Router = Router::new()
///     .route("/whoami", get(whoami))
///     .layer(middleware::from_fn_with_state(tokens, require_identity));
/// ```

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::debug;

use super::identity::Identity;
use super::jwt::{JwtError, TokenService};

/// Body message for every authentication failure
pub const UNAUTHORIZED_MESSAGE: &str = "Invalid or missing credentials";

/// Why authentication failed; only used for logs
#[derive(Debug)]
pub enum AuthError {
    MissingCredentials,
    InvalidScheme,
    Token(JwtError),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        debug!(reason = ?self, "Rejected request credentials");

        let body = Json(serde_json::json!({
            "error": "unauthorized",
            "message": UNAUTHORIZED_MESSAGE,
        }));

        let mut response = (StatusCode::UNAUTHORIZED, body).into_response();
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        response
    }
}

/// Extracts the token from an `Authorization` value; the scheme is case-insensitive
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();

    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

/// Middleware requiring a valid access token
pub async fn require_identity(
    State(tokens): State<TokenService>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    let token = bearer_token(header_value).ok_or(AuthError::InvalidScheme)?;

    let claims = tokens.verify_access(token).map_err(AuthError::Token)?;
    let identity = Identity::from(claims);

    debug!(user_id = %identity.user_id, tenant_id = %identity.tenant_id, "Authenticated request");
    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}
