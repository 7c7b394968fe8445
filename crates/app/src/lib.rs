//! Libris client composition root
//!
//! Wires the token store, auth backend, session manager, API client and
//! route guard into one [`LibrisClient`].

use std::sync::Arc;

use libris_api::{ApiClient, RecordingNavigator};
use libris_auth::{
    AuthBackend, AuthBackendFactory, FileTokenStore, RouteGuard, SessionManager, TokenStore,
};
use libris_common::ClientConfig;

pub struct LibrisClient {
    config: ClientConfig,
    session: Arc<SessionManager>,
    api: ApiClient,
    navigator: RecordingNavigator,
    guard: RouteGuard,
}

/// Build the client from configuration, persisting tokens to the configured file
pub fn create_client(config: ClientConfig) -> Result<LibrisClient, anyhow::Error> {
    let http = reqwest::Client::builder()
        .user_agent(concat!("libris/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let store: Arc<dyn TokenStore> = Arc::new(FileTokenStore::new(config.token_file.clone()));
    let backend = AuthBackendFactory::create_with_client(&config, http.clone());

    Ok(LibrisClient::assemble(config, http, store, backend))
}

impl LibrisClient {
    /// Assemble from explicit parts
    pub fn assemble(
        config: ClientConfig,
        http: reqwest::Client,
        store: Arc<dyn TokenStore>,
        backend: Arc<dyn AuthBackend>,
    ) -> Self {
        let session = Arc::new(SessionManager::new(store, backend));
        let navigator = RecordingNavigator::new();
        let api = ApiClient::new(
            http,
            &config.api_base_url,
            Arc::clone(&session),
            Arc::new(navigator.clone()),
            config.login_path.clone(),
        );
        let guard = RouteGuard::new(config.login_path.clone());

        Self {
            config,
            session,
            api,
            navigator,
            guard,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn navigator(&self) -> &RecordingNavigator {
        &self.navigator
    }

    pub fn guard(&self) -> &RouteGuard {
        &self.guard
    }
}
