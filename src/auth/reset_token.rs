//! One-time password reset tokens. Only the SHA-256 digest is persisted.

use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};

pub const RESET_TOKEN_TTL: Duration = Duration::minutes(15);
const TOKEN_BYTES: usize = 20;

#[derive(Debug, Clone)]
pub struct ResetToken {
    /// Sent to the user inside the reset link.
    pub presented: String,
    pub digest: String,
    pub expires_at: OffsetDateTime,
}

pub fn generate(now: OffsetDateTime) -> ResetToken {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    let presented = hex::encode(bytes);
    ResetToken {
        digest: digest(&presented),
        presented,
        expires_at: now + RESET_TOKEN_TTL,
    }
}

pub fn digest(presented: &str) -> String {
    hex::encode(Sha256::digest(presented.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic_and_differs_from_token() {
        let now = OffsetDateTime::now_utc();
        let token = generate(now);
        assert_eq!(token.presented.len(), TOKEN_BYTES * 2);
        assert_eq!(token.digest, digest(&token.presented));
        assert_ne!(token.digest, token.presented);
        assert_eq!(token.expires_at - now, Duration::minutes(15));
    }

    #[test]
    fn tokens_are_random() {
        let now = OffsetDateTime::now_utc();
        assert_ne!(generate(now).presented, generate(now).presented);
    }

    #[test]
    fn known_digest() {
        assert_eq!(
            digest("hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }
}
