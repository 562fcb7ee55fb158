use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use axum_flash::{Flash, IncomingFlashes};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        password::{check_password, hash_password, PasswordCheck},
        repo::UserError,
        session::Identity,
    },
    error::Result,
    state::AppState,
    views::{page_context, render},
};

const INVALID_CREDENTIALS: &str = "Invalid credentials";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", get(register_form).post(register))
        .route("/login", get(login_form).post(login))
        .route("/logout", get(logout))
}

/// Missing fields deserialize as empty strings and fail validation like blank ones.
#[derive(Deserialize)]
pub struct CredentialsForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

// keep the password out of logs
impl std::fmt::Debug for CredentialsForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsForm")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Re-renders `template` with an error notice and the username prefilled.
fn form_with_error(
    state: &AppState,
    identity: &Identity,
    template: &str,
    status: StatusCode,
    message: &str,
    username: &str,
) -> Result<Response> {
    let mut ctx = page_context(identity.username.as_deref(), None);
    ctx.insert("error", message);
    ctx.insert("form_username", username);
    let page = render(state, template, &ctx)?;
    Ok((status, page).into_response())
}

#[instrument(skip_all)]
pub async fn register_form(
    State(state): State<AppState>,
    identity: Identity,
    flashes: IncomingFlashes,
) -> Result<(IncomingFlashes, Html<String>)> {
    let ctx = page_context(identity.username.as_deref(), Some(&flashes));
    let page = render(&state, "register.html", &ctx)?;
    Ok((flashes, page))
}

#[instrument(skip(state, identity, flash))]
pub async fn register(
    State(state): State<AppState>,
    identity: Identity,
    flash: Flash,
    Form(form): Form<CredentialsForm>,
) -> Result<Response> {
    let username = form.username.trim();
    if username.is_empty() || form.password.is_empty() {
        warn!("registration with empty username or password");
        return form_with_error(
            &state,
            &identity,
            "register.html",
            StatusCode::BAD_REQUEST,
            "Username and password are required",
            username,
        );
    }

    let hash = hash_password(&form.password)?;
    match state.users.create(username, &hash).await? {
        Ok(user) => {
            info!(username = %user.username, "user registered");
            Ok((
                flash.success("Account created, please log in."),
                Redirect::to("/login"),
            )
                .into_response())
        }
        Err(UserError::AlreadyExists) => {
            warn!(%username, "username already registered");
            form_with_error(
                &state,
                &identity,
                "register.html",
                StatusCode::CONFLICT,
                "Username already taken",
                username,
            )
        }
    }
}

#[instrument(skip_all)]
pub async fn login_form(
    State(state): State<AppState>,
    identity: Identity,
    flashes: IncomingFlashes,
) -> Result<(IncomingFlashes, Html<String>)> {
    let ctx = page_context(identity.username.as_deref(), Some(&flashes));
    let page = render(&state, "login.html", &ctx)?;
    Ok((flashes, page))
}

#[instrument(skip(state, identity, flash))]
pub async fn login(
    State(state): State<AppState>,
    mut identity: Identity,
    flash: Flash,
    Form(form): Form<CredentialsForm>,
) -> Result<Response> {
    let username = form.username.trim();

    let user = state.users.find_by_username(username).await?;
    let check = check_password(
        &form.password,
        user.as_ref().map(|u| u.password_hash.as_str()),
    );
    match check {
        PasswordCheck::Match => {}
        PasswordCheck::UnknownUser => warn!(%username, "login for unknown user"),
        PasswordCheck::WrongPassword => warn!(%username, "login with wrong password"),
        PasswordCheck::Unusable => warn!(%username, "login against an unusable hash"),
    }

    if !check.is_match() {
        return form_with_error(
            &state,
            &identity,
            "login.html",
            StatusCode::UNAUTHORIZED,
            INVALID_CREDENTIALS,
            username,
        );
    }

    identity.log_in(username).await?;
    info!(%username, "user logged in");
    Ok((flash.success("Login successful!"), Redirect::to("/upload")).into_response())
}

#[instrument(skip_all)]
pub async fn logout(mut identity: Identity) -> Result<Redirect> {
    if let Some(username) = identity.username.as_deref() {
        info!(%username, "user logged out");
    }
    identity.log_out().await?;
    Ok(Redirect::to("/"))
}
