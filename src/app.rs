use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;
use tower_sessions::{
    cookie::{time::Duration, Key},
    Expiry, SessionManagerLayer, SessionStore,
};

use crate::state::AppState;
use crate::{auth, photos, views};

pub fn build_app<S>(state: AppState, session_store: S) -> anyhow::Result<Router>
where
    S: SessionStore + Clone,
{
    let session_cfg = &state.config.session;
    let key = Key::try_from(session_cfg.secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("invalid SESSION_SECRET: {e}"))?;
    let sessions = SessionManagerLayer::new(session_store)
        .with_secure(session_cfg.secure_cookies)
        .with_expiry(Expiry::OnInactivity(Duration::minutes(session_cfg.idle_minutes)))
        .with_signed(key);

    let upload_limit = state.config.upload_limit_bytes;
    Ok(Router::new()
        .route("/", get(views::home))
        .merge(auth::router())
        .merge(photos::router(upload_limit))
        .with_state(state)
        .layer(sessions)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        ))
}

pub async fn serve(app: Router, host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{host}:{port}").parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
