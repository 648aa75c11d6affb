//! Engine registry.
//!
//! Holds every registered [`EngineAdapter`] together with its operator
//! settings (priority, timeout, retry override) and runtime state (enabled
//! flag, latency). Registration order is remembered and breaks priority
//! ties when the router builds a chain.
//!
//! Engines are toggled at runtime through [`EngineRegistry::set_enabled`];
//! the flag is an atomic, so toggling never blocks a request in flight.
//! A request that already built its chain keeps it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::latency::EngineLatency;
use super::retry::RetryConfig;
use super::traits::EngineAdapter;
use crate::types::Capability;
use crate::{MuninnError, Result};

/// Operator settings for one engine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Lower runs first. Default: 100.
    pub priority: u32,
    /// Initial enabled state. Default: true.
    pub enabled: bool,
    /// Per-attempt timeout. Default: 30s.
    #[serde(deserialize_with = "crate::config::duration_secs::deserialize")]
    pub timeout: Duration,
    /// Overrides the router's retry policy for this engine.
    pub retry: Option<RetryConfig>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            priority: 100,
            enabled: true,
            timeout: Duration::from_secs(30),
            retry: None,
        }
    }
}

impl EngineSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(MuninnError::Configuration(
                "engine timeout must be positive".to_string(),
            ));
        }
        if let Some(retry) = &self.retry {
            retry.validate()?;
        }
        Ok(())
    }
}

/// Snapshot of one engine's registration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineDescriptor {
    pub id: String,
    pub priority: u32,
    pub enabled: bool,
    pub capabilities: Vec<Capability>,
    /// Smoothed attempt latency, once observed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_latency_ms: Option<u64>,
}

/// Result of one health probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineHealth {
    pub id: String,
    pub enabled: bool,
    pub healthy: bool,
}

/// A registered engine and its runtime state.
pub struct RegisteredEngine {
    adapter: Arc<dyn EngineAdapter>,
    settings: EngineSettings,
    enabled: AtomicBool,
    latency: EngineLatency,
}

impl RegisteredEngine {
    pub fn id(&self) -> &str {
        self.adapter.id()
    }

    pub fn adapter(&self) -> &Arc<dyn EngineAdapter> {
        &self.adapter
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn capabilities(&self) -> &[Capability] {
        self.adapter.capabilities()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn latency(&self) -> &EngineLatency {
        &self.latency
    }

    pub fn descriptor(&self) -> EngineDescriptor {
        EngineDescriptor {
            id: self.id().to_owned(),
            priority: self.settings.priority,
            enabled: self.is_enabled(),
            capabilities: self.capabilities().to_vec(),
            average_latency_ms: self.latency.average().map(|d| d.as_millis() as u64),
        }
    }
}

impl std::fmt::Debug for RegisteredEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredEngine")
            .field("id", &self.id())
            .field("settings", &self.settings)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Registry of engines in registration order.
#[derive(Debug, Default)]
pub struct EngineRegistry {
    engines: Vec<RegisteredEngine>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an engine. Ids must be unique.
    pub fn register(
        &mut self,
        adapter: Arc<dyn EngineAdapter>,
        settings: EngineSettings,
    ) -> Result<()> {
        let id = adapter.id();
        if id.trim().is_empty() {
            return Err(MuninnError::Configuration(
                "engine id must not be empty".to_string(),
            ));
        }
        if self.get(id).is_some() {
            return Err(MuninnError::DuplicateEngine(id.to_owned()));
        }
        settings.validate()?;
        self.engines.push(RegisteredEngine {
            enabled: AtomicBool::new(settings.enabled),
            adapter,
            settings,
            latency: EngineLatency::default(),
        });
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&RegisteredEngine> {
        self.engines.iter().find(|e| e.id() == id)
    }

    /// All engines, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredEngine> {
        self.engines.iter()
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    /// Enable or disable an engine at runtime.
    pub fn set_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        let engine = self
            .get(id)
            .ok_or_else(|| MuninnError::EngineNotFound(id.to_owned()))?;
        let was = engine.enabled.swap(enabled, Ordering::AcqRel);
        if was != enabled {
            info!(engine = id, enabled, "engine toggled");
        }
        Ok(())
    }

    /// Snapshots of every registration, in registration order.
    pub fn descriptors(&self) -> Vec<EngineDescriptor> {
        self.engines.iter().map(RegisteredEngine::descriptor).collect()
    }

    pub fn latency(&self, id: &str) -> Option<Duration> {
        self.get(id).and_then(|e| e.latency.average())
    }

    /// Probe every engine concurrently.
    pub async fn health_check_all(&self) -> Vec<EngineHealth> {
        let probes = self.engines.iter().map(|engine| async move {
            let healthy = engine.adapter.health_check().await;
            if !healthy {
                warn!(engine = engine.id(), "health check failed");
            }
            EngineHealth {
                id: engine.id().to_owned(),
                enabled: engine.is_enabled(),
                healthy,
            }
        });
        join_all(probes).await
    }
}
