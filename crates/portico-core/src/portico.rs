//! Portico facade
//!
//! Owns the wired-up stack. The dispatcher, downloader and sidekick store
//! share one transport, one credential store and one backend selection.

use std::sync::Arc;

use portico_dispatch::{Dispatcher, HttpTransport, ReqwestTransport, ServiceSelection};
use portico_download::{
    DeliveryDecision, DeliveryPlatform, DirectoryPlatform, DownloadOptions, Downloader, Notifier,
    TracingNotifier,
};
use portico_sidekick::{HttpSidekickBackend, SidekickStore};
use portico_storage::{CredentialStore, Database, SettingsCredentials};

use crate::config::Config;
use crate::Result;

pub struct Portico {
    config: Config,
    dispatcher: Dispatcher,
    downloader: Downloader,
    sidekick: SidekickStore,
    db: Option<Database>,
}

impl Portico {
    pub fn new(
        config: Config,
        transport: Arc<dyn HttpTransport>,
        credentials: Arc<dyn CredentialStore>,
        platform: Arc<dyn DeliveryPlatform>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let dispatcher = Dispatcher::new(
            transport,
            credentials,
            config.backend.clone(),
            config.trust_policy(),
        );
        let downloader = Downloader::new(dispatcher.clone(), platform, notifier);
        let sidekick = SidekickStore::new(
            Arc::new(HttpSidekickBackend::new(dispatcher.clone())),
            config.sidekick_cache_ttl(),
        );

        tracing::info!(
            service = config.backend.selected.as_str(),
            dev_mode = config.dev_mode,
            "Portico initialized"
        );

        Self {
            config,
            dispatcher,
            downloader,
            sidekick,
            db: None,
        }
    }

    /// Build the default stack: reqwest transport, token from the settings
    /// database, file-system delivery, and log notifications.
    pub fn open(config: Config) -> Result<Self> {
        let db = Database::open(&config.database_path)?;
        let transport = ReqwestTransport::with_timeout(config.request_timeout())?;
        let platform = DirectoryPlatform::new(config.staging_dir.clone(), config.download_dir.clone());

        let mut portico = Self::new(
            config,
            Arc::new(transport),
            Arc::new(SettingsCredentials::new(db.clone())),
            Arc::new(platform),
            Arc::new(TracingNotifier),
        );
        portico.db = Some(db);
        Ok(portico)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn downloader(&self) -> &Downloader {
        &self.downloader
    }

    pub fn sidekick(&self) -> &SidekickStore {
        &self.sidekick
    }

    /// Settings database, when opened by `open`
    pub fn database(&self) -> Option<&Database> {
        self.db.as_ref()
    }

    pub fn select_service(&self, selection: ServiceSelection) {
        self.dispatcher.select_service(selection);
    }

    pub async fn download(
        &self,
        url: &str,
        options: DownloadOptions,
    ) -> portico_download::Result<DeliveryDecision> {
        self.downloader.download(url, options).await
    }
}
