use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    response::{Html, Redirect},
    routing::get,
    Form, Router,
};
use axum_flash::{Flash, IncomingFlashes};
use serde::Deserialize;
use tracing::{debug, instrument};

use super::filename::sanitize_filename;
use super::services::{sign_photos, store_photo, UploadItem};
use crate::{
    auth::session::AuthUser,
    error::{AppError, Result},
    state::AppState,
    views::{page_context, render},
};

/// Multipart field carrying the file.
const PHOTO_FIELD: &str = "photo";

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/gallery", get(gallery))
        .route("/search", get(search_form).post(search))
}

pub fn write_routes(upload_limit_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/upload", get(upload_form).post(upload_photo))
        .layer(DefaultBodyLimit::max(upload_limit_bytes))
}

#[derive(Debug, Deserialize)]
pub struct SearchForm {
    #[serde(default)]
    pub keyword: String,
}

#[instrument(skip(state, flashes))]
pub async fn upload_form(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
    flashes: IncomingFlashes,
) -> Result<(IncomingFlashes, Html<String>)> {
    let ctx = page_context(Some(&username), Some(&flashes));
    let page = render(&state, "upload.html", &ctx)?;
    Ok((flashes, page))
}

#[instrument(skip(state, flash, multipart))]
pub async fn upload_photo(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
    flash: Flash,
    mut multipart: Multipart,
) -> Result<(Flash, Redirect)> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(PHOTO_FIELD) {
            debug!(field = ?field.name(), "skipping form field");
            continue;
        }
        // a part without a filename parameter is a plain form value, not a file
        let Some(client_name) = field.file_name().map(str::to_owned) else {
            debug!("photo field is not a file part");
            continue;
        };
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let body = field.bytes().await?;
        upload = Some((client_name, content_type, body));
        break;
    }

    let Some((client_name, content_type, body)) = upload else {
        return Err(AppError::BadRequest("No file uploaded"));
    };
    if client_name.is_empty() {
        return Err(AppError::BadRequest("No file selected"));
    }
    let filename =
        sanitize_filename(&client_name).ok_or(AppError::BadRequest("Invalid filename"))?;

    let item = UploadItem {
        filename: filename.clone(),
        body,
        content_type,
    };
    store_photo(&state, &username, item).await?;

    Ok((
        flash.success(format!("Uploaded {filename}")),
        Redirect::to("/gallery"),
    ))
}

#[instrument(skip(state, flashes))]
pub async fn gallery(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
    flashes: IncomingFlashes,
) -> Result<(IncomingFlashes, Html<String>)> {
    let photos = state.photos.list_by_owner(&username).await?;
    let links = sign_photos(&state, photos).await?;

    let mut ctx = page_context(Some(&username), Some(&flashes));
    ctx.insert("photos", &links);
    let page = render(&state, "gallery.html", &ctx)?;
    Ok((flashes, page))
}

#[instrument(skip(state))]
pub async fn search_form(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
) -> Result<Html<String>> {
    let ctx = page_context(Some(&username), None);
    render(&state, "search.html", &ctx)
}

#[instrument(skip(state))]
pub async fn search(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
    Form(form): Form<SearchForm>,
) -> Result<Html<String>> {
    let photos = state
        .photos
        .search_by_owner(&username, &form.keyword)
        .await?;
    debug!(matches = photos.len(), "search done");
    let links = sign_photos(&state, photos).await?;

    let mut ctx = page_context(Some(&username), None);
    ctx.insert("keyword", &form.keyword);
    ctx.insert("photos", &links);
    render(&state, "search_results.html", &ctx)
}
