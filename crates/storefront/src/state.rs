//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::{Backend, StorefrontConfig};
use crate::services::SessionRegistry;
use crate::services::auth::{FirebaseIdentityProvider, IdentityProvider, MemoryIdentityProvider};
use crate::store::{DocumentStore, FirebaseStore, MemoryStore};

use hapus_core::AdminAllowList;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the document store, the auth provider and the identity registry.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    store: Arc<dyn DocumentStore>,
    provider: Arc<dyn IdentityProvider>,
    allow: Arc<AdminAllowList>,
    sessions: SessionRegistry,
}

impl AppState {
    /// Create application state with the backends named in `config`.
    #[must_use]
    pub fn new(config: StorefrontConfig) -> Self {
        let (store, provider): (Arc<dyn DocumentStore>, Arc<dyn IdentityProvider>) =
            match &config.backend {
                Backend::Firebase(firebase) => (
                    Arc::new(FirebaseStore::new(
                        firebase.database_url.clone(),
                        firebase.database_secret.clone(),
                    )),
                    Arc::new(FirebaseIdentityProvider::new(firebase.api_key.clone())),
                ),
                Backend::Memory => (
                    Arc::new(MemoryStore::new()),
                    Arc::new(MemoryIdentityProvider::new()),
                ),
            };
        Self::with_backends(config, store, provider)
    }

    /// Create application state around existing backends.
    ///
    /// Tests use this to keep a handle on the in-memory store and provider.
    #[must_use]
    pub fn with_backends(
        config: StorefrontConfig,
        store: Arc<dyn DocumentStore>,
        provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        let allow = Arc::new(config.admin_emails.clone());
        let sessions =
            SessionRegistry::new(Arc::clone(&store), Arc::clone(&allow), config.identity_idle);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                provider,
                allow,
                sessions,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the document store.
    #[must_use]
    pub fn store(&self) -> &dyn DocumentStore {
        self.inner.store.as_ref()
    }

    /// Get a reference to the auth provider.
    #[must_use]
    pub fn provider(&self) -> &dyn IdentityProvider {
        self.inner.provider.as_ref()
    }

    /// Get a reference to the admin allow-list.
    #[must_use]
    pub fn admin_emails(&self) -> &AdminAllowList {
        &self.inner.allow
    }

    /// Get a reference to the per-session identity registry.
    #[must_use]
    pub fn sessions(&self) -> &SessionRegistry {
        &self.inner.sessions
    }
}
