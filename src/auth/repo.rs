use async_trait::async_trait;
use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::db::{is_unique_violation, PgStore};

/// User record in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string
    pub created_at: OffsetDateTime,
}

#[derive(Debug, PartialEq, Eq)]
pub enum UserError {
    /// the username is already registered
    AlreadyExists,
}

#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Insert a new account. A taken username is reported as `Ok(Err(..))`
    /// so callers can tell it apart from a backend failure.
    async fn create(
        &self,
        username: &str,
        password_hash: &str,
    ) -> anyhow::Result<Result<User, UserError>>;

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;
}

#[async_trait]
impl UserRepo for PgStore {
    async fn create(
        &self,
        username: &str,
        password_hash: &str,
    ) -> anyhow::Result<Result<User, UserError>> {
        let res = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password_hash)
            VALUES ($1, $2)
            RETURNING username, password_hash, created_at
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await;

        match res {
            Ok(user) => Ok(Ok(user)),
            Err(e) if is_unique_violation(&e) => Ok(Err(UserError::AlreadyExists)),
            Err(e) => Err(anyhow::Error::new(e).context("insert user")),
        }
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT username, password_hash, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }
}
