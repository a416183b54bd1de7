use std::sync::Arc;

use storage::local::LocalProgressStore;
use storage::repository::{InMemoryProgressTable, ProgressTable, Storage};
use storage::rest::RestProgressTable;
use tracing::info;
use tracker_core::Catalog;

use crate::Clock;
use crate::auth::{LocalSessionProvider, RestAuthClient, SessionProvider};
use crate::config::AppConfig;
use crate::contest_feed::ContestFeedClient;
use crate::error::AppServicesError;
use crate::progress::ProgressStore;

/// Assembles app-facing services from configuration.
#[derive(Clone)]
pub struct AppServices {
    catalog: Arc<Catalog>,
    progress: ProgressStore,
    sessions: Arc<dyn SessionProvider>,
    auth: Option<Arc<RestAuthClient>>,
    contests: ContestFeedClient,
    clock: Clock,
}

impl AppServices {
    /// Build services backed by `SQLite` storage at `config.db_url`.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage, the catalog, or the stored
    /// session cannot be loaded.
    pub async fn bootstrap(config: &AppConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(&config.db_url).await?;
        Self::with_storage(config, clock, storage).await
    }

    /// Build services over an already opened `Storage`.
    ///
    /// # Errors
    ///
    /// See [`AppServices::bootstrap`].
    pub async fn with_storage(
        config: &AppConfig,
        clock: Clock,
        storage: Storage,
    ) -> Result<Self, AppServicesError> {
        match &config.backend {
            Some(backend) => {
                let auth = Arc::new(
                    RestAuthClient::restore(backend.clone(), Arc::clone(&storage.kv), clock).await?,
                );
                let sessions: Arc<dyn SessionProvider> = auth.clone();
                let remote: Arc<dyn ProgressTable> = Arc::new(RestProgressTable::new(
                    backend.clone(),
                    config.progress_table.clone(),
                ));
                Self::assemble(config, clock, &storage, Some(auth), sessions, remote).await
            }
            None => {
                let sessions = Arc::new(LocalSessionProvider::signed_out());
                let remote = Arc::new(InMemoryProgressTable::new());
                Self::with_backends(config, clock, storage, sessions, remote).await
            }
        }
    }

    /// Build services over caller-supplied session and remote backends.
    ///
    /// No hosted auth client is attached; sign-in flows go through `sessions`.
    ///
    /// # Errors
    ///
    /// See [`AppServices::bootstrap`].
    pub async fn with_backends(
        config: &AppConfig,
        clock: Clock,
        storage: Storage,
        sessions: Arc<dyn SessionProvider>,
        remote: Arc<dyn ProgressTable>,
    ) -> Result<Self, AppServicesError> {
        Self::assemble(config, clock, &storage, None, sessions, remote).await
    }

    async fn assemble(
        config: &AppConfig,
        clock: Clock,
        storage: &Storage,
        auth: Option<Arc<RestAuthClient>>,
        sessions: Arc<dyn SessionProvider>,
        remote: Arc<dyn ProgressTable>,
    ) -> Result<Self, AppServicesError> {
        let catalog = Arc::new(Catalog::bundled()?);
        let local = LocalProgressStore::new(Arc::clone(&storage.kv));
        let progress =
            ProgressStore::open(local, remote, Arc::clone(&sessions), clock, config.sync).await?;
        let contests = ContestFeedClient::new(config.contest_feed_url.clone());
        info!(
            topics = catalog.topics().len(),
            remote = auth.is_some(),
            "services ready"
        );

        Ok(Self {
            catalog,
            progress,
            sessions,
            auth,
            contests,
            clock,
        })
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<Catalog> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn progress(&self) -> ProgressStore {
        self.progress.clone()
    }

    #[must_use]
    pub fn sessions(&self) -> Arc<dyn SessionProvider> {
        Arc::clone(&self.sessions)
    }

    /// The hosted auth client, when a backend is configured.
    #[must_use]
    pub fn auth(&self) -> Option<Arc<RestAuthClient>> {
        self.auth.clone()
    }

    #[must_use]
    pub fn contests(&self) -> ContestFeedClient {
        self.contests.clone()
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }
}
