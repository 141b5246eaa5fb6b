use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use tracing::warn;

use super::token::{JwtKeys, SESSION_COOKIE};
use crate::errors::ApiError;
use crate::state::AppState;
use crate::users::model::{Role, User};
use crate::users::store::UserStore;

const LOGIN_REQUIRED: &str = "Please login to access this resource";
const SESSION_REJECTED: &str = "Invalid or expired session";

/// First gate: a valid session cookie resolving to a live user record.
/// The identity is fetched fresh from the store; token claims are only
/// trusted for the user id.
pub struct CurrentUser(pub User);

fn session_token(parts: &Parts) -> Option<String> {
    let cookies = parts.headers.get(header::COOKIE)?.to_str().ok()?;
    cookies
        .split(';')
        .map(str::trim)
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(parts)
            .ok_or_else(|| ApiError::Unauthorized(LOGIN_REQUIRED.into()))?;

        let keys = JwtKeys::from_ref(state);
        let user_id = keys.verify(&token).map_err(|_| {
            warn!("session token rejected");
            ApiError::Unauthorized(SESSION_REJECTED.into())
        })?;

        // A deleted user's still-unexpired token resolves to nothing.
        let user = state
            .store
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| ApiError::Unauthorized(SESSION_REJECTED.into()))?;

        Ok(CurrentUser(user))
    }
}

/// Second gate: runs the first, then checks the role allow-list.
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if user.role != Role::Admin {
            warn!(user_id = %user.id, role = %user.role, "admin route refused");
            return Err(ApiError::Forbidden(format!(
                "Role ({}) is not allowed to access this resource",
                user.role
            )));
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::Request;

    use super::*;
    use crate::mail::fakes::RecordingMailer;
    use crate::users::store::{memory::MemoryUserStore, NewUser, ProfileUpdate};

    async fn state_with_user(role: Role) -> (AppState, User) {
        let store = Arc::new(MemoryUserStore::default());
        let user = store
            .create(NewUser {
                name: "Ana".into(),
                email: "a@x.com".into(),
                password_hash: "hash".into(),
            })
            .await
            .unwrap();
        let user = store
            .update_profile(
                user.id,
                ProfileUpdate {
                    role: Some(role),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        let state = AppState::for_tests(store, Arc::new(RecordingMailer::default()));
        (state, user)
    }

    fn parts_with_cookie(cookie: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/me");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn missing_cookie_is_unauthorized() {
        let (state, _) = state_with_user(Role::User).await;
        let mut parts = parts_with_cookie(None);
        let err = CurrentUser::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("should reject");
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn valid_cookie_attaches_fresh_identity() {
        let (state, user) = state_with_user(Role::User).await;
        let token = JwtKeys::from_ref(&state).sign(user.id).unwrap();
        let mut parts = parts_with_cookie(Some(&format!("token={token}")));
        let CurrentUser(resolved) = CurrentUser::from_request_parts(&mut parts, &state)
            .await
            .expect("should authenticate");
        assert_eq!(resolved.id, user.id);
        assert_eq!(resolved.email, "a@x.com");
    }

    #[tokio::test]
    async fn cookie_is_found_among_others() {
        let (state, user) = state_with_user(Role::User).await;
        let token = JwtKeys::from_ref(&state).sign(user.id).unwrap();
        let cookie = format!("theme=dark; token={token}; lang=en");
        let mut parts = parts_with_cookie(Some(&cookie));
        assert!(CurrentUser::from_request_parts(&mut parts, &state)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn tampered_token_is_unauthorized() {
        let (state, user) = state_with_user(Role::User).await;
        let token = JwtKeys::from_ref(&state).sign(user.id).unwrap();
        let mut parts = parts_with_cookie(Some(&format!("token={token}x")));
        let err = CurrentUser::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("should reject");
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn deleted_user_token_is_unauthorized() {
        let (state, user) = state_with_user(Role::User).await;
        let token = JwtKeys::from_ref(&state).sign(user.id).unwrap();
        state.store.delete(user.id).await.unwrap();
        let mut parts = parts_with_cookie(Some(&format!("token={token}")));
        let err = CurrentUser::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("should reject");
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn non_admin_is_forbidden_on_admin_gate() {
        let (state, user) = state_with_user(Role::User).await;
        let token = JwtKeys::from_ref(&state).sign(user.id).unwrap();
        let mut parts = parts_with_cookie(Some(&format!("token={token}")));
        let err = AdminUser::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("should reject");
        assert!(matches!(err, ApiError::Forbidden(_)));
        assert!(err.to_string().contains("user"));
    }

    #[tokio::test]
    async fn admin_passes_both_gates() {
        let (state, user) = state_with_user(Role::Admin).await;
        let token = JwtKeys::from_ref(&state).sign(user.id).unwrap();
        let mut parts = parts_with_cookie(Some(&format!("token={token}")));
        let AdminUser(resolved) = AdminUser::from_request_parts(&mut parts, &state)
            .await
            .expect("should authorize");
        assert_eq!(resolved.role, Role::Admin);
    }
}
