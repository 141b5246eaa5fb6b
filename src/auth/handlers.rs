use axum::{
    extract::{FromRef, Path, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use super::dto::{
    AuthResponse, ForgotPasswordRequest, LoginRequest, MessageResponse, RegisterRequest,
    ResetPasswordRequest, UpdatePasswordRequest, UpdateProfileRequest,
};
use super::extract::CurrentUser;
use super::password::{hash_password, verify_password};
use super::reset::{hash_secret, ResetSecret};
use super::token::{expired_session_cookie, JwtKeys};
use crate::errors::ApiError;
use crate::mail::{password_reset_email, Mailer};
use crate::state::AppState;
use crate::users::model::{PublicUser, User};
use crate::users::store::{NewUser, ProfileUpdate, UserStore};

// Identical for unknown email and wrong password; the two cases must be
// indistinguishable to the caller.
const INVALID_CREDENTIALS: &str = "Invalid email or password";
// Identical for unknown and expired secrets, to avoid a guessing oracle.
const RESET_TOKEN_INVALID: &str = "Password reset token is invalid or has expired";

const MIN_PASSWORD_LEN: usize = 6;
const MAX_NAME_LEN: usize = 50;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/password/forgot", post(forgot_password))
        .route("/password/reset/:token", put(reset_password))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me))
        .route("/me/update", put(update_profile))
        .route("/password/update", put(update_password))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalized_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn require(field: Option<String>, message: &str) -> Result<String, ApiError> {
    field
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest(message.into()))
}

fn check_password_length(password: &str) -> Result<(), ApiError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "Your password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Issues a session token for `user`, sets it in the HTTP-only cookie and
/// echoes it in the body.
fn session_response(
    keys: &JwtKeys,
    user: User,
    status: StatusCode,
) -> Result<(StatusCode, HeaderMap, Json<AuthResponse>), ApiError> {
    let token = keys.sign(user.id)?;
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        keys.session_cookie(&token)
            .parse()
            .map_err(|e| anyhow::anyhow!("session cookie header: {e}"))?,
    );
    Ok((
        status,
        headers,
        Json(AuthResponse {
            token,
            user: user.into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, HeaderMap, Json<AuthResponse>), ApiError> {
    let name = require(payload.name, "Please enter your name")?
        .trim()
        .to_string();
    let email = normalized_email(&require(payload.email, "Please enter your email")?);
    let password = require(payload.password, "Please enter your password")?;

    if name.len() > MAX_NAME_LEN {
        return Err(ApiError::BadRequest(format!(
            "Your name cannot exceed {MAX_NAME_LEN} characters"
        )));
    }
    if !is_valid_email(&email) {
        warn!(email = %email, "register rejected: invalid email");
        return Err(ApiError::BadRequest("Invalid email".into()));
    }
    check_password_length(&password)?;

    if state.store.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "register rejected: email taken");
        return Err(ApiError::Conflict("Email already registered".into()));
    }

    let password_hash = hash_password(&password)?;
    let user = state
        .store
        .create(NewUser {
            name,
            email,
            password_hash,
        })
        .await?;

    info!(user_id = %user.id, "user registered");
    session_response(&JwtKeys::from_ref(&state), user, StatusCode::CREATED)
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<(StatusCode, HeaderMap, Json<AuthResponse>), ApiError> {
    let (Some(email), Some(password)) = (payload.email, payload.password) else {
        return Err(ApiError::BadRequest("Please enter email & password".into()));
    };
    let email = normalized_email(&email);

    let Some(user) = state.store.find_by_email(&email).await? else {
        warn!("login rejected: unknown email");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.into()));
    };

    if !verify_password(&password, &user.password_hash)? {
        warn!(user_id = %user.id, "login rejected: password mismatch");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.into()));
    }

    info!(user_id = %user.id, "user logged in");
    session_response(&JwtKeys::from_ref(&state), user, StatusCode::OK)
}

#[instrument]
pub async fn logout() -> Result<(HeaderMap, Json<MessageResponse>), ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        expired_session_cookie()
            .parse()
            .map_err(|e| anyhow::anyhow!("logout cookie header: {e}"))?,
    );
    Ok((
        headers,
        Json(MessageResponse {
            message: "Logged out".into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let email = normalized_email(&require(payload.email, "Please enter your email")?);

    let user = state
        .store
        .find_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found with this email".into()))?;

    let secret = ResetSecret::generate();
    state
        .store
        .set_reset_token(user.id, &secret.token_hash, secret.expires_at)
        .await?;

    let reset_url = format!(
        "{}/password/reset/{}",
        state.config.frontend_url, secret.raw
    );
    let mail = password_reset_email(&user.email, &user.name, &reset_url);

    let timeout = std::time::Duration::from_secs(state.config.mail_timeout_secs);
    let dispatch = match tokio::time::timeout(timeout, state.mailer.send(mail)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err("email dispatch timed out".to_string()),
    };

    if let Err(message) = dispatch {
        // Roll back: the record must not keep a secret nobody received.
        state.store.clear_reset_token(user.id).await?;
        warn!(user_id = %user.id, error = %message, "reset email dispatch failed");
        return Err(ApiError::Dependency(message));
    }

    info!(user_id = %user.id, "password reset email dispatched");
    Ok(Json(MessageResponse {
        message: format!("Email sent to: {}", user.email),
    }))
}

#[instrument(skip(state, token, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<(StatusCode, HeaderMap, Json<AuthResponse>), ApiError> {
    let password = require(payload.password, "Please enter your password")?;
    let confirm = require(payload.confirm_password, "Please confirm your password")?;
    if password != confirm {
        return Err(ApiError::BadRequest("Passwords do not match".into()));
    }
    check_password_length(&password)?;

    // Lookup, expiry check, password swap and reset-field clearing are one
    // conditional store mutation; a concurrent attempt with the same secret
    // finds nothing left to consume.
    let new_hash = hash_password(&password)?;
    let user = state
        .store
        .consume_reset_token(&hash_secret(&token), &new_hash, OffsetDateTime::now_utc())
        .await?
        .ok_or_else(|| ApiError::BadRequest(RESET_TOKEN_INVALID.into()))?;

    info!(user_id = %user.id, "password reset completed");
    session_response(&JwtKeys::from_ref(&state), user, StatusCode::OK)
}

#[instrument(skip_all)]
pub async fn get_me(CurrentUser(user): CurrentUser) -> Json<PublicUser> {
    Json(user.into())
}

#[instrument(skip_all)]
pub async fn update_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<UpdatePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let old_password = require(payload.old_password, "Please enter your old password")?;
    let password = require(payload.password, "Please enter your new password")?;
    check_password_length(&password)?;

    if !verify_password(&old_password, &user.password_hash)? {
        warn!(user_id = %user.id, "password update rejected: old password mismatch");
        return Err(ApiError::BadRequest("Old password is incorrect".into()));
    }

    let password_hash = hash_password(&password)?;
    state.store.set_password_hash(user.id, &password_hash).await?;

    info!(user_id = %user.id, "password updated");
    Ok(Json(MessageResponse {
        message: "Password updated".into(),
    }))
}

#[instrument(skip_all)]
pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<PublicUser>, ApiError> {
    let email = match payload.email {
        Some(raw) => {
            let email = normalized_email(&raw);
            if !is_valid_email(&email) {
                return Err(ApiError::BadRequest("Invalid email".into()));
            }
            Some(email)
        }
        None => None,
    };

    // Name and email only; role never flows through the self-service path,
    // and the password hash is untouched here.
    let update = ProfileUpdate {
        name: payload.name,
        email,
        role: None,
    };
    let updated = state
        .store
        .update_profile(user.id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User not found with id: {}", user.id)))?;

    info!(user_id = %updated.id, "profile updated");
    Ok(Json(updated.into()))
}
