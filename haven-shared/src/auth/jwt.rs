/// JWT token issuance and verification
///
/// Tokens are signed with HS256 and carry the caller's user, tenant, email
/// and role. Verification is strict: only HS256 is accepted, the issuer must
/// be `haven`, `exp`/`nbf` are checked with zero leeway, and claims are
/// decoded into a fixed struct that rejects unknown fields. Every failure
/// is reported as [`JwtError::InvalidToken`] so callers cannot distinguish
/// an expired token from a forged one.
///
/// # Token Types
///
/// - **Access Token**: short-lived (1h default), authenticates API calls
/// - **Refresh Token**: long-lived (7d default), exchanged for a new pair
///
/// # Example
///
/// ```
/// use haven_shared::auth::identity::Role;
/// use haven_shared::auth::jwt::TokenService;
/// use haven_shared::tenant::TenantId;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let tokens = TokenService::with_default_ttls("an-hs256-secret-of-at-least-32-bytes!");
/// let tenant_id = TenantId::generate();
///
/// let pair = tokens.issue_token_pair(Uuid::new_v4(), tenant_id, "a@example.com", Role::Admin)?;
/// let claims = tokens.verify_access(&pair.access_token)?;
/// assert_eq!(claims.tenant_id, tenant_id.as_uuid());
/// # Ok(())
/// # }
/// ```

use crate::auth::identity::Role;
use crate::tenant::TenantId;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Issuer written into and required on every token
pub const ISSUER: &str = "haven";

/// Minimum HS256 secret length in bytes
pub const MIN_SECRET_LEN: usize = 32;

pub const DEFAULT_ACCESS_TTL_SECONDS: i64 = 3600;
pub const DEFAULT_REFRESH_TTL_SECONDS: i64 = 604_800;

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to create token: {0}")]
    CreateError(#[source] jsonwebtoken::errors::Error),

    /// Bad signature, expired, not yet valid, wrong algorithm or issuer,
    /// malformed or unexpected claims
    #[error("Invalid token: {0}")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),

    /// Valid token of the other kind
    #[error("Expected {} token", .expected.as_str())]
    WrongTokenKind { expected: TokenType },
}

/// Token kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// JWT claims
///
/// `sub` is the user id. Unknown fields, a missing field, an unknown role or
/// token kind all fail decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Claims {
    pub sub: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub role: Role,
    pub token_type: TokenType,
    pub iss: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(
        user_id: Uuid,
        tenant_id: TenantId,
        email: impl Into<String>,
        role: Role,
        token_type: TokenType,
        expires_in: Duration,
    ) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id,
            tenant_id: tenant_id.as_uuid(),
            email: email.into(),
            role,
            token_type,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + expires_in).timestamp(),
        }
    }

    pub fn tenant(&self) -> TenantId {
        TenantId::new(self.tenant_id)
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

/// Access and refresh token issued together
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

/// Issues and verifies tokens with one HS256 secret
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// The secret should be at least [`MIN_SECRET_LEN`] bytes; configuration
    /// enforces this before a service is built.
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub"]);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn with_default_ttls(secret: &str) -> Self {
        Self::new(
            secret,
            Duration::seconds(DEFAULT_ACCESS_TTL_SECONDS),
            Duration::seconds(DEFAULT_REFRESH_TTL_SECONDS),
        )
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Signs an access and a refresh token for the same identity
    pub fn issue_token_pair(
        &self,
        user_id: Uuid,
        tenant_id: TenantId,
        email: &str,
        role: Role,
    ) -> Result<TokenPair, JwtError> {
        let access = Claims::new(user_id, tenant_id, email, role, TokenType::Access, self.access_ttl);
        let refresh = Claims::new(user_id, tenant_id, email, role, TokenType::Refresh, self.refresh_ttl);

        Ok(TokenPair {
            access_token: self.sign(&access)?,
            refresh_token: self.sign(&refresh)?,
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, JwtError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding).map_err(JwtError::CreateError)
    }

    /// Verifies signature, algorithm, issuer, `exp` and `nbf`, and decodes the claims
    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(JwtError::InvalidToken)
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, JwtError> {
        self.verify_kind(token, TokenType::Access)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, JwtError> {
        self.verify_kind(token, TokenType::Refresh)
    }

    /// Exchanges a refresh token for a fresh pair with the same identity
    pub fn refresh(&self, refresh_token: &str) -> Result<TokenPair, JwtError> {
        let claims = self.verify_refresh(refresh_token)?;
        self.issue_token_pair(claims.sub, claims.tenant(), &claims.email, claims.role)
    }

    fn verify_kind(&self, token: &str, expected: TokenType) -> Result<Claims, JwtError> {
        let claims = self.verify(token)?;

        if claims.token_type != expected {
            return Err(JwtError::WrongTokenKind { expected });
        }

        Ok(claims)
    }
}
