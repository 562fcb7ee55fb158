use std::sync::Arc;

use anyhow::Context;
use axum::extract::FromRef;
use tera::Tera;

use crate::auth::repo::UserRepo;
use crate::config::AppConfig;
use crate::db::PgStore;
use crate::photos::repo::PhotoRepo;
use crate::storage::{Storage, StorageClient};
use crate::views;

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepo>,
    pub photos: Arc<dyn PhotoRepo>,
    pub storage: Arc<dyn StorageClient>,
    pub templates: Arc<Tera>,
    pub flash_config: axum_flash::Config,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Connects to Postgres and S3 using `config`. Returns the store as well so
    /// the caller can run migrations before serving.
    pub async fn init(config: AppConfig) -> anyhow::Result<(Self, PgStore)> {
        let config = Arc::new(config);
        let db = PgStore::connect(&config).await?;
        let storage = Arc::new(Storage::new(&config.storage).await?) as Arc<dyn StorageClient>;

        let repo = Arc::new(db.clone());
        let state = Self::from_parts(repo.clone(), repo, storage, config)?;
        Ok((state, db))
    }

    pub fn from_parts(
        users: Arc<dyn UserRepo>,
        photos: Arc<dyn PhotoRepo>,
        storage: Arc<dyn StorageClient>,
        config: Arc<AppConfig>,
    ) -> anyhow::Result<Self> {
        let templates = Arc::new(views::load_templates().context("load templates")?);
        let key = axum_flash::Key::try_from(config.session.secret.as_bytes())
            .map_err(|e| anyhow::anyhow!("invalid SESSION_SECRET for flash cookies: {e}"))?;
        let flash_config =
            axum_flash::Config::new(key).use_secure_cookies(config.session.secure_cookies);

        Ok(Self {
            users,
            photos,
            storage,
            templates,
            flash_config,
            config,
        })
    }
}

impl FromRef<AppState> for axum_flash::Config {
    fn from_ref(state: &AppState) -> Self {
        state.flash_config.clone()
    }
}

#[cfg(test)]
impl AppState {
    pub(crate) fn fake() -> Self {
        Self::fake_with(Arc::new(crate::testing::FakeStorage::default()))
    }

    pub(crate) fn fake_with(storage: Arc<crate::testing::FakeStorage>) -> Self {
        let repo = Arc::new(crate::testing::MemoryRepo::default());
        Self::from_parts(repo.clone(), repo, storage, Arc::new(crate::testing::config()))
            .expect("fake state")
    }
}
