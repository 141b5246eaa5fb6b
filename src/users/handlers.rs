use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::model::PublicUser;
use super::store::{ProfileUpdate, UserStore};
use crate::auth::dto::{AdminUpdateUserRequest, MessageResponse};
use crate::auth::extract::AdminUser;
use crate::auth::handlers::is_valid_email;
use crate::errors::ApiError;
use crate::state::AppState;

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users))
        .route(
            "/admin/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

fn user_not_found(id: Uuid) -> ApiError {
    ApiError::NotFound(format!("User not found with id: {id}"))
}

#[instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<Vec<PublicUser>>, ApiError> {
    let users = state.store.list().await?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

#[instrument(skip_all, fields(target = %id))]
pub async fn get_user(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PublicUser>, ApiError> {
    let user = state
        .store
        .find_by_id(id)
        .await?
        .ok_or_else(|| user_not_found(id))?;
    Ok(Json(user.into()))
}

#[instrument(skip_all, fields(target = %id))]
pub async fn update_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdminUpdateUserRequest>,
) -> Result<Json<PublicUser>, ApiError> {
    let email = match payload.email {
        Some(raw) => {
            let email = raw.trim().to_lowercase();
            if !is_valid_email(&email) {
                return Err(ApiError::BadRequest("Invalid email".into()));
            }
            Some(email)
        }
        None => None,
    };

    let update = ProfileUpdate {
        name: payload.name,
        email,
        role: payload.role,
    };
    let user = state
        .store
        .update_profile(id, update)
        .await?
        .ok_or_else(|| user_not_found(id))?;

    info!(admin_id = %admin.id, user_id = %user.id, "user updated by admin");
    Ok(Json(user.into()))
}

#[instrument(skip_all, fields(target = %id))]
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    // Dropping the record also drops any outstanding reset token with it.
    if !state.store.delete(id).await? {
        return Err(user_not_found(id));
    }
    info!(admin_id = %admin.id, user_id = %id, "user deleted by admin");
    Ok(Json(MessageResponse {
        message: "User deleted".into(),
    }))
}
