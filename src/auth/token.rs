use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "token";

/// The token carries the user id and the time window, nothing else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iat: usize,
    pub exp: usize,
}

/// Signing and verification keys plus the configured lifetime, built once
/// from config at construction.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl JwtKeys {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            ttl: Duration::minutes(config.ttl_minutes),
        }
    }

    pub fn sign(&self, user_id: Uuid) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + self.ttl;
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, "session token signed");
        Ok(token)
    }

    /// Malformed tokens, bad signatures and expired tokens all come back as
    /// the same error; callers surface a single Unauthorized outcome.
    pub fn verify(&self, token: &str) -> anyhow::Result<Uuid> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())?;
        Ok(data.claims.sub)
    }

    /// Cookie carrying the session token; its lifetime matches the token's.
    pub fn session_cookie(&self, token: &str) -> String {
        format!(
            "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.ttl.whole_seconds()
        )
    }
}

/// Logout overwrites the cookie with an empty, already-expired value. There
/// is no server-side invalidation: a token copied out of the cookie before
/// logout stays valid until its expiry.
pub fn expired_session_cookie() -> String {
    format!(
        "{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0; \
         Expires=Thu, 01 Jan 1970 00:00:00 GMT"
    )
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        JwtKeys::new(&state.config.jwt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(ttl_minutes: i64) -> JwtKeys {
        JwtKeys::new(&JwtConfig {
            secret: "test-secret".into(),
            ttl_minutes,
        })
    }

    #[test]
    fn sign_and_verify_resolves_issuing_user() {
        let keys = keys(60);
        let user_id = Uuid::new_v4();
        let token = keys.sign(user_id).expect("sign");
        assert_eq!(keys.verify(&token).expect("verify"), user_id);
    }

    #[test]
    fn expired_token_fails_verification() {
        // issued with a lifetime 31 minutes in the past, well beyond leeway
        let keys = keys(-31);
        let token = keys.sign(Uuid::new_v4()).expect("sign");
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn tampered_signature_fails_verification() {
        let signer = keys(60);
        let other = JwtKeys::new(&JwtConfig {
            secret: "different-secret".into(),
            ttl_minutes: 60,
        });
        let token = signer.sign(Uuid::new_v4()).expect("sign");
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn garbage_token_fails_verification() {
        assert!(keys(60).verify("not-a-jwt").is_err());
    }

    #[test]
    fn session_cookie_is_http_only_with_matching_lifetime() {
        let cookie = keys(60).session_cookie("abc");
        assert!(cookie.starts_with("token=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=3600"));
    }

    #[test]
    fn expired_cookie_clears_value() {
        let cookie = expired_session_cookie();
        assert!(cookie.starts_with("token=;"));
        assert!(cookie.contains("Max-Age=0"));
        assert!(cookie.contains("Expires=Thu, 01 Jan 1970"));
    }
}
