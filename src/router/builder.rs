//! Builder for configuring router instances

use std::sync::Arc;

use super::EngineRouter;
use crate::analyzer::{AnalyzerConfig, ComplexityAnalyzer};
use crate::cache::{CacheConfig, CacheLayer};
use crate::config::Config;
use crate::engine::{EngineAdapter, EngineRegistry, EngineSettings, RetryConfig};
use crate::fallback::FallbackHandler;
use crate::Result;

/// Main entry point for creating routers.
pub struct Muninn;

impl Muninn {
    /// Create a new builder for configuring the router.
    pub fn builder() -> MuninnBuilder {
        MuninnBuilder::new()
    }
}

/// Builder for configuring router instances.
pub struct MuninnBuilder {
    analyzer: AnalyzerConfig,
    cache_config: CacheConfig,
    cache: Option<Arc<CacheLayer>>,
    retry: RetryConfig,
    fallback: Option<Arc<FallbackHandler>>,
    engines: Vec<(Arc<dyn EngineAdapter>, EngineSettings)>,
    #[cfg(feature = "http")]
    http_engines: Vec<crate::config::EngineConfig>,
}

impl MuninnBuilder {
    pub fn new() -> Self {
        Self {
            analyzer: AnalyzerConfig::default(),
            cache_config: CacheConfig::default(),
            cache: None,
            retry: RetryConfig::default(),
            fallback: None,
            engines: Vec::new(),
            #[cfg(feature = "http")]
            http_engines: Vec::new(),
        }
    }

    /// Take analyzer, cache and retry settings from a loaded file.
    ///
    /// With the `http` feature, `[[engine]]` entries become [`HttpEngine`]s
    /// when the router is built.
    ///
    /// [`HttpEngine`]: crate::engine::HttpEngine
    pub fn config(mut self, config: Config) -> Self {
        self.analyzer = config.analyzer;
        self.cache_config = config.cache;
        self.retry = config.retry;
        #[cfg(feature = "http")]
        {
            self.http_engines = config.engines;
        }
        self
    }

    pub fn analyzer(mut self, config: AnalyzerConfig) -> Self {
        self.analyzer = config;
        self
    }

    /// Size and TTL of a router-owned cache.
    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.cache_config = config;
        self
    }

    /// Share an existing cache instead of creating one.
    pub fn cache(mut self, cache: Arc<CacheLayer>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Retry policy for engines without their own.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Share a fallback handler (and its metrics) between routers.
    pub fn fallback_handler(mut self, handler: Arc<FallbackHandler>) -> Self {
        self.fallback = Some(handler);
        self
    }

    /// Register an engine. Registration order breaks priority ties.
    pub fn engine(self, adapter: impl EngineAdapter + 'static, settings: EngineSettings) -> Self {
        self.shared_engine(Arc::new(adapter), settings)
    }

    /// Register an engine that is also held elsewhere.
    pub fn shared_engine(
        mut self,
        adapter: Arc<dyn EngineAdapter>,
        settings: EngineSettings,
    ) -> Self {
        self.engines.push((adapter, settings));
        self
    }

    /// Build the router.
    ///
    /// Fails on invalid analyzer, cache or retry settings and on duplicate
    /// or empty engine ids. A router without engines is valid: every
    /// request is answered by the fallback handler.
    pub fn build(self) -> Result<EngineRouter> {
        let analyzer = ComplexityAnalyzer::new(self.analyzer)?;
        self.retry.validate()?;

        let cache = match self.cache {
            Some(cache) => cache,
            None => {
                self.cache_config.validate()?;
                Arc::new(CacheLayer::new(self.cache_config))
            }
        };

        let mut registry = EngineRegistry::new();
        for (adapter, settings) in self.engines {
            registry.register(adapter, settings)?;
        }
        #[cfg(feature = "http")]
        for config in &self.http_engines {
            let engine = crate::engine::HttpEngine::from_config(config)?;
            registry.register(Arc::new(engine), config.settings.clone())?;
        }

        Ok(EngineRouter {
            analyzer,
            cache,
            registry,
            fallback: self.fallback.unwrap_or_default(),
            retry: self.retry,
        })
    }
}

impl Default for MuninnBuilder {
    fn default() -> Self {
        Self::new()
    }
}
