use std::time::Duration;

use time::OffsetDateTime;

use super::repo::PhotoRepo;
use crate::storage::StorageClient;

/// Drops pending photo rows created before `cutoff`, together with their
/// object unless an uploaded photo still uses the same key. Returns how many
/// rows were reclaimed.
pub async fn reconcile_pending(
    photos: &dyn PhotoRepo,
    storage: &dyn StorageClient,
    cutoff: OffsetDateTime,
) -> anyhow::Result<usize> {
    let stale = photos.list_pending_before(cutoff).await?;
    if stale.is_empty() {
        return Ok(0);
    }

    for photo in &stale {
        if photos.is_key_in_use(&photo.filename).await? {
            tracing::debug!(photo_id = %photo.id, filename = %photo.filename, "key still referenced, keeping object");
        } else {
            storage.delete_object(&photo.filename).await?;
        }
        photos.delete(photo.id).await?;
        tracing::info!(photo_id = %photo.id, owner = %photo.username, filename = %photo.filename, "reclaimed stale pending upload");
    }

    Ok(stale.len())
}

/// Runs [`reconcile_pending`] forever. Failures are logged and retried on the next tick.
pub async fn run_periodically(
    photos: &dyn PhotoRepo,
    storage: &dyn StorageClient,
    interval: Duration,
    grace: Duration,
) {
    loop {
        let cutoff = OffsetDateTime::now_utc() - grace;
        match reconcile_pending(photos, storage, cutoff).await {
            Ok(0) => {}
            Ok(n) => tracing::info!(reclaimed = n, "cleanup pass done"),
            Err(e) => tracing::warn!(error = %format!("{e:#}"), "cleanup pass failed"),
        }
        tokio::time::sleep(interval).await;
    }
}
