use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::credentials::ServiceConfig;
use crate::observability::metrics::Metrics;
use crate::resilience::error::TokenError;
use crate::sinks::TokenSink;
use crate::sources::token_manager::{TokenManager, TokenPolicy};

/// One token manager per configured credential
#[derive(Default, Clone)]
pub struct TokenManagers {
    managers: HashMap<String, Arc<TokenManager>>,
}

impl TokenManagers {
    /// Resolve every credential, build its manager and restore persisted tokens
    pub async fn build(config: &ServiceConfig, client: &Client, metrics: Arc<Metrics>) -> Self {
        let policy = TokenPolicy::from(&config.settings);
        let sink = TokenSink::from_config(config.settings.token_sink.as_ref());

        let mut managers = Self::default();
        for (name, credential) in &config.credentials {
            let manager = TokenManager::new(
                credential.resolve(name),
                client.clone(),
                policy.clone(),
                sink.clone(),
                metrics.clone(),
            );
            manager.restore().await;
            managers.insert(manager);
        }
        info!("token managers ready: {:?}", managers.managers.keys().collect::<Vec<_>>());
        managers
    }

    pub fn insert(&mut self, manager: TokenManager) -> Arc<TokenManager> {
        let manager = Arc::new(manager);
        self.managers.insert(manager.name().to_owned(), manager.clone());
        manager
    }

    pub fn manager(&self, credential: &str) -> Result<Arc<TokenManager>, TokenError> {
        self.managers
            .get(credential)
            .cloned()
            .ok_or_else(|| TokenError::UnknownCredential(credential.to_owned()))
    }

    pub async fn get_token(&self, credential: &str, force_refresh: bool) -> Result<String, TokenError> {
        self.manager(credential)?.get_token(force_refresh).await
    }

    pub async fn invalidate(&self, credential: &str) {
        match self.managers.get(credential) {
            Some(manager) => manager.invalidate().await,
            None => warn!("invalidate: credential '{}' is not configured", credential),
        }
    }
}
