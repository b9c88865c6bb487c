//! Application state assembly.
//!
//! Builds the auth component graph once at startup with explicit
//! lifetimes; nothing here is a static. The in-memory stores wire a
//! single-process deployment — swapping in the shared cache service and
//! the relational account store is a matter of constructing different
//! trait objects here.

use std::sync::Arc;

use axum::extract::FromRef;
use tably_auth::{
    AnomalyDetector, AttemptThrottle, AuthState, JwtSigner, LoginService, MemoryAccountStore,
    MemoryCacheStore, MemoryLoginHistoryStore, SessionRegistry, TokenService,
    store::{AccountStore, CacheStore, LoginHistoryStore},
};

use crate::config::AppConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// The login orchestrator.
    pub login: Arc<LoginService>,

    /// Token service, shared with the bearer middleware.
    pub tokens: Arc<TokenService>,

    /// Session registry, shared with the bearer middleware and the
    /// compaction task.
    pub sessions: Arc<SessionRegistry>,

    /// The account store (exposed for provisioning endpoints and tests).
    pub accounts: Arc<MemoryAccountStore>,
}

impl AppState {
    /// Builds the component graph from configuration.
    ///
    /// # Errors
    /// Fails if the signing secret is missing or unusable. This is the
    /// fatal, not-retried signer misconfiguration path.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let signer = Arc::new(
            JwtSigner::from_base64_secret(&config.auth.jwt_secret)
                .map_err(|e| anyhow::anyhow!("auth.jwt_secret: {e}"))?,
        );

        let accounts = Arc::new(MemoryAccountStore::new());
        let history: Arc<dyn LoginHistoryStore> = Arc::new(MemoryLoginHistoryStore::new());
        let cache: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::new());

        let tokens = Arc::new(TokenService::new(Arc::clone(&signer), &config.auth));
        let sessions = Arc::new(SessionRegistry::new(signer));
        let throttle = AttemptThrottle::new(Arc::clone(&cache), &config.auth);
        let anomaly = AnomalyDetector::new(
            accounts.clone() as Arc<dyn AccountStore>,
            Arc::clone(&history),
            Arc::clone(&cache),
            &config.auth,
        );

        let login = Arc::new(LoginService::new(
            accounts.clone() as Arc<dyn AccountStore>,
            history,
            throttle,
            anomaly,
            Arc::clone(&sessions),
            Arc::clone(&tokens),
        ));

        Ok(Self {
            login,
            tokens,
            sessions,
            accounts,
        })
    }
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        AuthState::new(Arc::clone(&state.tokens), Arc::clone(&state.sessions))
    }
}
