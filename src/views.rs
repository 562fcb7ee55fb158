use axum::{extract::State, response::Html};
use axum_flash::{IncomingFlashes, Level};
use serde::Serialize;
use tera::{Context, Tera};
use tracing::instrument;

use crate::{auth::session::Identity, error::Result, state::AppState};

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/base.html")),
    ("index.html", include_str!("../templates/index.html")),
    ("register.html", include_str!("../templates/register.html")),
    ("login.html", include_str!("../templates/login.html")),
    ("upload.html", include_str!("../templates/upload.html")),
    ("gallery.html", include_str!("../templates/gallery.html")),
    ("search.html", include_str!("../templates/search.html")),
    ("search_results.html", include_str!("../templates/search_results.html")),
];

/// Templates are compiled into the binary so the server has no runtime file dependency.
pub fn load_templates() -> tera::Result<Tera> {
    let mut tera = Tera::default();
    tera.add_raw_templates(TEMPLATES.iter().copied())?;
    Ok(tera)
}

#[derive(Serialize, Debug)]
struct TplFlash<'a> {
    level: &'static str,
    message: &'a str,
}

fn level_name(level: Level) -> &'static str {
    match level {
        Level::Debug => "debug",
        Level::Info => "info",
        Level::Success => "success",
        Level::Warning => "warning",
        Level::Error => "error",
        #[allow(unreachable_patterns)]
        _ => "info",
    }
}

/// Base context shared by every page: who is logged in and the pending flashes.
pub(crate) fn page_context(username: Option<&str>, flashes: Option<&IncomingFlashes>) -> Context {
    let mut ctx = Context::new();
    ctx.insert("username", &username);
    let messages: Vec<TplFlash> = flashes
        .into_iter()
        .flat_map(|f| f.iter())
        .map(|(level, message)| TplFlash {
            level: level_name(level),
            message,
        })
        .collect();
    ctx.insert("flashes", &messages);
    ctx
}

pub(crate) fn render(state: &AppState, name: &str, ctx: &Context) -> Result<Html<String>> {
    Ok(Html(state.templates.render(name, ctx)?))
}

#[instrument(skip_all)]
pub async fn home(
    State(state): State<AppState>,
    identity: Identity,
    flashes: IncomingFlashes,
) -> Result<(IncomingFlashes, Html<String>)> {
    let ctx = page_context(identity.username.as_deref(), Some(&flashes));
    let page = render(&state, "index.html", &ctx)?;
    Ok((flashes, page))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_templates_compile() {
        let tera = load_templates().expect("templates should parse");
        for (name, _) in TEMPLATES {
            assert!(tera.get_template_names().any(|n| n == *name), "{name} missing");
        }
    }

    #[test]
    fn filenames_are_escaped() {
        let tera = load_templates().unwrap();
        let mut ctx = page_context(Some("alice"), None);
        ctx.insert(
            "photos",
            &vec![serde_json::json!({
                "filename": "<script>",
                "view_url": "https://x/1",
                "download_url": "https://x/2",
                "expires_at": "2024-01-01T00:00:00Z",
            })],
        );
        let html = tera.render("gallery.html", &ctx).unwrap();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }
}
