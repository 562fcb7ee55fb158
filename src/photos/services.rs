use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::repo::Photo;
use crate::state::AppState;
use crate::storage::Disposition;

/// Lifetime of every signed view/download link.
pub const SIGNED_URL_TTL: Duration = Duration::from_secs(60 * 60);

pub struct UploadItem {
    pub filename: String,
    pub body: Bytes,
    pub content_type: String,
}

/// What a page needs to show one photo.
#[derive(Debug, Serialize)]
pub struct PhotoLinks {
    pub filename: String,
    pub view_url: String,
    pub download_url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

/// Stores `item` for `owner`: pending row, then object, then flip the row to
/// uploaded. A failed object write removes the pending row again; anything
/// left pending after a crash is picked up by the cleanup pass.
pub async fn store_photo(st: &AppState, owner: &str, item: UploadItem) -> anyhow::Result<Uuid> {
    let id = st
        .photos
        .insert_pending(owner, &item.filename)
        .await
        .with_context(|| format!("record upload of {}", item.filename))?;

    let size = item.body.len();
    if let Err(e) = st
        .storage
        .put_object(&item.filename, item.body, &item.content_type)
        .await
    {
        if let Err(rollback) = st.photos.delete(id).await {
            warn!(error = %rollback, photo_id = %id, "could not drop pending photo after failed upload");
        }
        return Err(e.context(format!("put_object {}", item.filename)));
    }

    st.photos
        .mark_uploaded(id)
        .await
        .with_context(|| format!("confirm upload of {}", item.filename))?;

    info!(photo_id = %id, owner, filename = %item.filename, size, "photo stored");
    Ok(id)
}

/// Mints fresh inline and attachment URLs for each photo. Nothing is cached.
pub async fn sign_photos(st: &AppState, photos: Vec<Photo>) -> anyhow::Result<Vec<PhotoLinks>> {
    let mut out = Vec::with_capacity(photos.len());
    for photo in photos {
        let minted_at = OffsetDateTime::now_utc();
        let view_url = st
            .storage
            .presign_get(&photo.filename, SIGNED_URL_TTL, Disposition::Inline)
            .await
            .with_context(|| format!("presign view url for {}", photo.filename))?;
        let download_url = st
            .storage
            .presign_get(&photo.filename, SIGNED_URL_TTL, Disposition::Attachment)
            .await
            .with_context(|| format!("presign download url for {}", photo.filename))?;
        out.push(PhotoLinks {
            filename: photo.filename,
            view_url,
            download_url,
            expires_at: minted_at + SIGNED_URL_TTL,
        });
    }
    Ok(out)
}
