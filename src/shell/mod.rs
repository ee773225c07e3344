//! Page shell: wires config, storage, the REST client and the indicator
//!
//! Booting a page configures the indicator from [`AppConfig::progress`],
//! starts it, and resolves the signed-in user when there is a session.
//! [`AppShell::page_loaded`] completes the indicator.

pub mod session;

pub use session::{SessionBootstrap, CURRENT_USER_KEY};

use crate::api::{ApiClient, User};
use crate::config::AppConfig;
use crate::controllers::{CsrfToken, PasswordController, TrickController};
use crate::dom::SharedDocument;
use crate::errors::Result;
use crate::progress::ProgressBar;
use crate::storage::TtlStore;
use std::sync::Arc;
use tracing::{info, warn};

/// Ratio shown once the home page has mounted its content.
pub const HOME_READY_RATIO: f64 = 0.3;

#[derive(Debug)]
pub struct AppShell {
    config: AppConfig,
    client: ApiClient,
    store: Arc<TtlStore>,
    progress: ProgressBar,
    session: SessionBootstrap,
    csrf: CsrfToken,
    user: Option<User>,
}

/// Storage for `config`: file-backed when a path is configured.
pub fn open_store(config: &AppConfig) -> Result<TtlStore> {
    match config.storage_path() {
        Some(path) => TtlStore::open(path),
        None => Ok(TtlStore::new()),
    }
}

impl AppShell {
    /// Boot a page on `document`.
    ///
    /// A failed session lookup is logged and leaves the page anonymous.
    pub async fn boot(
        config: AppConfig,
        document: SharedDocument,
        client: ApiClient,
        store: Arc<TtlStore>,
        csrf: CsrfToken,
        logged_in: bool,
    ) -> Result<Self> {
        config.validate()?;
        let progress = ProgressBar::new(document)?;
        progress.configure(&config.progress)?;
        progress.start();

        let session =
            SessionBootstrap::new(client.clone(), Arc::clone(&store), config.session_ttl());
        let user = if logged_in {
            match session.current_user().await {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!(error = %e, "session lookup failed, continuing anonymously");
                    None
                }
            }
        } else {
            None
        };

        info!(
            app = %config.app.name,
            env = config.environment.as_str(),
            user = user.as_ref().map(|u| u.username.as_str()),
            "page booted"
        );

        Ok(Self {
            config,
            client,
            store,
            progress,
            session,
            csrf,
            user,
        })
    }

    /// Every resource of the page has loaded.
    pub fn page_loaded(&self) {
        self.progress.done(false);
    }

    /// The home page listing is mounted.
    pub fn home_ready(&self) {
        self.progress.set(HOME_READY_RATIO);
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn store(&self) -> &Arc<TtlStore> {
        &self.store
    }

    pub fn progress(&self) -> &ProgressBar {
        &self.progress
    }

    pub fn session(&self) -> &SessionBootstrap {
        &self.session
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn passwords(&self) -> PasswordController {
        PasswordController::new(self.client.clone(), self.progress.clone(), self.csrf.clone())
    }

    pub fn tricks(&self) -> TrickController {
        TrickController::new(
            self.client.clone(),
            Arc::clone(&self.store),
            self.csrf.clone(),
            self.config.tricks_ttl(),
            self.user.clone(),
        )
    }
}
