use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use std::time::Duration;

use tower_sessions::{session, session_store::ExpiredDeletion, Session};
use tracing::{debug, error, warn};

/// Key under which the authenticated username lives in the session.
pub(crate) const SESSION_USER_KEY: &str = "username";

/// The caller as seen by the session layer: a username once logged in, `None` otherwise.
pub struct Identity {
    session: Session,
    pub username: Option<String>,
}

impl Identity {
    /// Binds the session to `username`. The session id is rotated first so a
    /// pre-login cookie can never be reused as an authenticated one.
    pub async fn log_in(&mut self, username: &str) -> Result<(), session::Error> {
        self.session.cycle_id().await?;
        self.session.insert(SESSION_USER_KEY, username).await?;
        self.username = Some(username.to_owned());
        Ok(())
    }

    pub async fn log_out(&mut self) -> Result<(), session::Error> {
        self.session.flush().await?;
        self.username = None;
        Ok(())
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        let username = session
            .get::<String>(SESSION_USER_KEY)
            .await
            .map_err(|e| {
                error!(error = %e, "session store read failed");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            })?;

        Ok(Self { session, username })
    }
}

/// Guard for protected routes: yields the logged-in username or redirects to `/login`.
pub struct AuthUser(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let identity = Identity::from_request_parts(parts, state).await?;
        match identity.username {
            Some(username) => Ok(AuthUser(username)),
            None => {
                debug!(path = %parts.uri.path(), "no session, redirecting to login");
                Err(Redirect::to("/login").into_response())
            }
        }
    }
}

/// Purges expired session records every `interval`, starting immediately.
/// Failures are logged and retried on the next tick.
pub async fn sweep_expired<S: ExpiredDeletion>(store: S, interval: Duration) {
    loop {
        if let Err(e) = store.delete_expired().await {
            warn!(error = %e, "expired session sweep failed");
        }
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use time::OffsetDateTime;
    use tower_sessions::session::{Id, Record};
    use tower_sessions::session_store::SessionStore;

    use super::sweep_expired;
    use crate::testing::ExpiringSessions;

    fn record(ttl_secs: i64) -> Record {
        Record {
            id: Id::default(),
            data: Default::default(),
            expiry_date: OffsetDateTime::now_utc() + time::Duration::seconds(ttl_secs),
        }
    }

    #[tokio::test]
    async fn sweeper_drops_only_expired_records() {
        let store = ExpiringSessions::default();
        let live = record(3600);
        store.save(&record(-60)).await.unwrap();
        store.save(&record(-1)).await.unwrap();
        store.save(&live).await.unwrap();
        assert_eq!(store.len(), 3);

        let task = tokio::spawn(sweep_expired(store.clone(), Duration::from_secs(3600)));
        for _ in 0..100 {
            if store.len() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        task.abort();

        assert_eq!(store.len(), 1);
        assert!(store.load(&live.id).await.unwrap().is_some());
    }
}
