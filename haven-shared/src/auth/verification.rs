/// Email verification tokens
///
/// A token is 32 random bytes rendered as 64 hex characters. Only its SHA-256
/// hash is persisted; the plaintext goes to the user once, by mail.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Random bytes per token
const TOKEN_BYTES: usize = 32;

/// How long a verification token stays redeemable
pub fn verification_ttl() -> Duration {
    Duration::hours(24)
}

/// A freshly generated token: plaintext for the mail, hash for the database
#[derive(Clone)]
pub struct VerificationToken {
    pub token: String,
    pub hash: String,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for VerificationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationToken")
            .field("hash", &self.hash)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

pub fn generate_verification_token() -> VerificationToken {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    let token = hex::encode(bytes);

    VerificationToken {
        hash: hash_verification_token(&token),
        token,
        expires_at: Utc::now() + verification_ttl(),
    }
}

/// SHA-256 of the plaintext token, lowercase hex
pub fn hash_verification_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
