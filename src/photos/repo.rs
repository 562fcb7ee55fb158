use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::PgStore;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Photo {
    pub id: Uuid,
    pub username: String,
    pub filename: String,
    pub created_at: OffsetDateTime,
}

#[async_trait]
pub trait PhotoRepo: Send + Sync {
    /// Records an upload that has not reached storage yet. Pending rows are
    /// invisible to listings.
    async fn insert_pending(&self, username: &str, filename: &str) -> anyhow::Result<Uuid>;
    async fn mark_uploaded(&self, id: Uuid) -> anyhow::Result<()>;
    async fn delete(&self, id: Uuid) -> anyhow::Result<()>;

    /// Uploaded photos of `username`, oldest first.
    async fn list_by_owner(&self, username: &str) -> anyhow::Result<Vec<Photo>>;

    /// Uploaded photos of `username` whose filename contains `keyword` literally.
    async fn search_by_owner(&self, username: &str, keyword: &str) -> anyhow::Result<Vec<Photo>>;

    async fn list_pending_before(&self, cutoff: OffsetDateTime) -> anyhow::Result<Vec<Photo>>;

    /// Whether any uploaded photo, for any user, still points at this storage key.
    async fn is_key_in_use(&self, filename: &str) -> anyhow::Result<bool>;
}

/// Escapes LIKE metacharacters so `keyword` only ever matches itself.
pub(crate) fn like_pattern(keyword: &str) -> String {
    let mut pattern = String::with_capacity(keyword.len() + 2);
    pattern.push('%');
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[async_trait]
impl PhotoRepo for PgStore {
    async fn insert_pending(&self, username: &str, filename: &str) -> anyhow::Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO photos (id, username, filename, status)
            VALUES ($1, $2, $3, 'pending')
            "#,
        )
        .bind(id)
        .bind(username)
        .bind(filename)
        .execute(&self.pool)
        .await
        .context("insert pending photo")?;
        Ok(id)
    }

    async fn mark_uploaded(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("UPDATE photos SET status = 'uploaded' WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("mark photo uploaded")?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM photos WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("delete photo")?;
        Ok(())
    }

    async fn list_by_owner(&self, username: &str) -> anyhow::Result<Vec<Photo>> {
        let rows = sqlx::query_as::<_, Photo>(
            r#"
            SELECT id, username, filename, created_at
              FROM photos
             WHERE username = $1 AND status = 'uploaded'
             ORDER BY created_at ASC
            "#,
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await
        .context("list photos by owner")?;
        Ok(rows)
    }

    async fn search_by_owner(&self, username: &str, keyword: &str) -> anyhow::Result<Vec<Photo>> {
        let rows = sqlx::query_as::<_, Photo>(
            r#"
            SELECT id, username, filename, created_at
              FROM photos
             WHERE username = $1 AND status = 'uploaded'
               AND filename LIKE $2 ESCAPE '\'
             ORDER BY created_at ASC
            "#,
        )
        .bind(username)
        .bind(like_pattern(keyword))
        .fetch_all(&self.pool)
        .await
        .context("search photos by owner")?;
        Ok(rows)
    }

    async fn list_pending_before(&self, cutoff: OffsetDateTime) -> anyhow::Result<Vec<Photo>> {
        let rows = sqlx::query_as::<_, Photo>(
            r#"
            SELECT id, username, filename, created_at
              FROM photos
             WHERE status = 'pending' AND created_at < $1
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .context("list stale pending photos")?;
        Ok(rows)
    }

    async fn is_key_in_use(&self, filename: &str) -> anyhow::Result<bool> {
        let (in_use,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM photos WHERE filename = $1 AND status = 'uploaded')",
        )
        .bind(filename)
        .fetch_one(&self.pool)
        .await
        .context("check storage key usage")?;
        Ok(in_use)
    }
}
