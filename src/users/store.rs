use axum::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use super::model::{Role, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Fields a profile update may touch. `role` is only ever set on the admin
/// path; self-service updates pass `None`.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
}

/// Identity Store accessor. Persistence consistency is the implementation's
/// concern; callers only rely on the contracts spelled out per method.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn list(&self) -> Result<Vec<User>, StoreError>;
    async fn update_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> Result<Option<User>, StoreError>;
    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError>;
    async fn set_reset_token(
        &self,
        id: Uuid,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError>;
    async fn clear_reset_token(&self, id: Uuid) -> Result<(), StoreError>;
    /// Single conditional update: match a live (unexpired) token hash,
    /// install the new password hash and clear both reset fields in one
    /// mutation. Returns `None` when no live token matched. Two racing calls
    /// with the same hash cannot both return `Some`.
    async fn consume_reset_token(
        &self,
        token_hash: &str,
        new_password_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Option<User>, StoreError>;
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}

pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn map_unique(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StoreError::DuplicateEmail;
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, name, email, role, password_hash,
                      reset_token_hash, reset_token_expires_at, created_at
            "#,
        )
        .bind(&new_user.name)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(map_unique)?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, role, password_hash,
                   reset_token_hash, reset_token_expires_at, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, role, password_hash,
                   reset_token_hash, reset_token_expires_at, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, role, password_hash,
                   reset_token_hash, reset_token_expires_at, created_at
            FROM users
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                role = COALESCE($4, role)
            WHERE id = $1
            RETURNING id, name, email, role, password_hash,
                      reset_token_hash, reset_token_expires_at, created_at
            "#,
        )
        .bind(id)
        .bind(update.name)
        .bind(update.email)
        .bind(update.role)
        .fetch_optional(&self.db)
        .await
        .map_err(map_unique)?;
        Ok(user)
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn set_reset_token(
        &self,
        id: Uuid,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE users
            SET reset_token_hash = $2, reset_token_expires_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn clear_reset_token(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE users
            SET reset_token_hash = NULL, reset_token_expires_at = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        token_hash: &str,
        new_password_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET password_hash = $2,
                reset_token_hash = NULL,
                reset_token_expires_at = NULL
            WHERE reset_token_hash = $1
              AND reset_token_expires_at > $3
            RETURNING id, name, email, role, password_hash,
                      reset_token_hash, reset_token_expires_at, created_at
            "#,
        )
        .bind(token_hash)
        .bind(new_password_hash)
        .bind(now)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
