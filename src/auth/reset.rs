use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};

/// Reset secrets live for 30 minutes from issuance.
pub const RESET_TOKEN_TTL: Duration = Duration::minutes(30);

/// A freshly generated reset secret. The raw value goes into the email link
/// and is never persisted; the store only ever sees `token_hash`.
#[derive(Debug, Clone)]
pub struct ResetSecret {
    pub raw: String,
    pub token_hash: String,
    pub expires_at: OffsetDateTime,
}

impl ResetSecret {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 20];
        OsRng.fill_bytes(&mut bytes);
        let raw = hex::encode(bytes);
        Self {
            token_hash: hash_secret(&raw),
            expires_at: OffsetDateTime::now_utc() + RESET_TOKEN_TTL,
            raw,
        }
    }
}

/// Deterministic, unsalted digest. The store is queried by exact hash
/// equality, so unlike password storage the same input must always produce
/// the same stored value.
pub fn hash_secret(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}
