use std::sync::Arc;
use std::time::Instant;

use filedeck_common::preview::PreviewRegistry;

use crate::config::ServerConfig;
use crate::events::{EventBus, WebhookObserver};
use crate::facts::FactFetcher;
use crate::service::FileService;
use crate::store::{self, HostedBlobs};

/// Shared application state
pub struct AppState {
    pub files: FileService,
    /// `None` when fact lookups are disabled
    pub facts: Option<FactFetcher>,
    pub previews: PreviewRegistry,
    /// Set when objects are served by this process under `/blobs`
    pub hosted: Option<HostedBlobs>,
    /// Server startup time for uptime calculation
    pub started_at: Instant,
}

impl AppState {
    pub fn new(files: FileService) -> Self {
        Self {
            files,
            facts: None,
            previews: PreviewRegistry::default(),
            hosted: None,
            started_at: Instant::now(),
        }
    }

    pub fn with_facts(mut self, facts: FactFetcher) -> Self {
        self.facts = Some(facts);
        self
    }

    pub fn with_hosted(mut self, hosted: HostedBlobs) -> Self {
        self.hosted = Some(hosted);
        self
    }

    pub fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        let (blob_store, hosted) = store::from_config(config)?;

        let mut events = EventBus::new();
        if let Some(url) = &config.notify_url {
            events.subscribe(Arc::new(WebhookObserver::new(url.clone())?));
            tracing::info!(url = %url, "Upload notifications enabled");
        }

        let files = FileService::new(blob_store)
            .with_events(events)
            .with_cache_control_max_age(config.cache_control_max_age);

        let mut state = AppState::new(files);
        if config.facts_enabled {
            state = state.with_facts(FactFetcher::new()?);
        }
        if let Some(hosted) = hosted {
            state = state.with_hosted(hosted);
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_default_config() {
        let state = AppState::from_config(&ServerConfig::default()).unwrap();
        assert!(state.facts.is_some());
        assert!(matches!(state.hosted, Some(HostedBlobs::Memory { .. })));
    }

    #[test]
    fn test_directory_config_hosts_blobs() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            storage: crate::config::StorageConfig::Directory {
                path: dir.path().join("blobs"),
                public_url: None,
            },
            facts_enabled: false,
            ..ServerConfig::default()
        };
        let state = AppState::from_config(&config).unwrap();
        assert!(state.facts.is_none());
        match state.hosted {
            Some(HostedBlobs::Directory(path)) => assert!(path.is_dir()),
            _ => panic!("expected hosted directory"),
        }
    }
}
