//! Plugin lifecycle management

use crate::plugin::{Plugin, PluginContext, PluginInfo, PluginState};
use anyhow::Result;
use std::time::Instant;

/// Plugin handle for driving one plugin through load → enable → disable → unload
pub struct PluginHandle {
    pub info: PluginInfo,
    state: PluginState,
    plugin: Box<dyn Plugin>,
    last_state_change: Instant,
    stats: PluginStats,
}

/// Plugin statistics
#[derive(Debug, Clone, Default)]
pub struct PluginStats {
    pub load_count: u64,
    pub enable_count: u64,
    pub failure_count: u64,
    /// Time when the plugin was last enabled
    pub last_enabled_time: Option<Instant>,
}

impl PluginHandle {
    pub fn new(plugin: Box<dyn Plugin>) -> Self {
        let info = plugin.info();
        Self {
            info,
            state: PluginState::Unloaded,
            plugin,
            last_state_change: Instant::now(),
            stats: PluginStats::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn version(&self) -> &semver::Version {
        &self.info.version
    }

    pub fn state(&self) -> PluginState {
        self.state
    }

    pub fn stats(&self) -> &PluginStats {
        &self.stats
    }

    /// Time since the last state change
    pub fn state_age(&self) -> std::time::Duration {
        self.last_state_change.elapsed()
    }

    /// Load the plugin
    pub fn load(&mut self) -> Result<()> {
        if self.state != PluginState::Unloaded {
            return Err(anyhow::anyhow!(
                "Plugin '{}' is in state {:?}, expected Unloaded",
                self.info.name,
                self.state
            ));
        }

        match self.plugin.on_load() {
            Ok(()) => {
                self.set_state(PluginState::Loaded)?;
                self.stats.load_count += 1;
                tracing::info!("Loaded plugin: {} v{}", self.info.name, self.info.version);
                Ok(())
            }
            Err(e) => self.fail("load", e),
        }
    }

    /// Enable the plugin
    pub fn enable(&mut self, ctx: &PluginContext) -> Result<()> {
        if self.state != PluginState::Loaded && self.state != PluginState::Disabled {
            return Err(anyhow::anyhow!(
                "Plugin '{}' is in state {:?}, expected Loaded or Disabled",
                self.info.name,
                self.state
            ));
        }

        match self.plugin.on_enable(ctx) {
            Ok(()) => {
                self.set_state(PluginState::Enabled)?;
                self.stats.enable_count += 1;
                self.stats.last_enabled_time = Some(Instant::now());
                tracing::info!("Enabled plugin: {} v{}", self.info.name, self.info.version);
                Ok(())
            }
            Err(e) => self.fail("enable", e),
        }
    }

    /// Disable the plugin
    pub fn disable(&mut self) -> Result<()> {
        if self.state != PluginState::Enabled {
            return Err(anyhow::anyhow!(
                "Plugin '{}' is in state {:?}, expected Enabled",
                self.info.name,
                self.state
            ));
        }

        match self.plugin.on_disable() {
            Ok(()) => {
                self.set_state(PluginState::Disabled)?;
                tracing::info!("Disabled plugin: {} v{}", self.info.name, self.info.version);
                Ok(())
            }
            Err(e) => self.fail("disable", e),
        }
    }

    /// Unload the plugin, disabling it first if needed
    pub fn unload(&mut self) -> Result<()> {
        if self.state == PluginState::Enabled {
            self.disable()?;
        }

        if !matches!(self.state, PluginState::Loaded | PluginState::Disabled | PluginState::Failed) {
            return Err(anyhow::anyhow!(
                "Plugin '{}' is in state {:?}, expected Loaded, Disabled, or Failed",
                self.info.name,
                self.state
            ));
        }

        match self.plugin.on_unload() {
            Ok(()) => {
                self.set_state(PluginState::Unloaded)?;
                tracing::info!("Unloaded plugin: {} v{}", self.info.name, self.info.version);
                Ok(())
            }
            Err(e) => self.fail("unload", e),
        }
    }

    fn fail(&mut self, stage: &str, error: anyhow::Error) -> Result<()> {
        self.set_state(PluginState::Failed)?;
        self.stats.failure_count += 1;
        tracing::error!("Plugin '{}' failed to {}: {:#}", self.info.name, stage, error);
        Err(error.context(format!("Failed to {} plugin '{}'", stage, self.info.name)))
    }

    /// Set plugin state with validation
    fn set_state(&mut self, new_state: PluginState) -> Result<()> {
        if !self.state.can_transition_to(new_state) {
            return Err(anyhow::anyhow!(
                "Plugin '{}' cannot transition from {:?} to {:?}",
                self.info.name,
                self.state,
                new_state
            ));
        }

        tracing::debug!("Plugin {} state: {:?} -> {:?}", self.info.name, self.state, new_state);
        self.state = new_state;
        self.last_state_change = Instant::now();
        Ok(())
    }
}

impl std::fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHandle")
            .field("info", &self.info)
            .field("state", &self.state)
            .field("stats", &self.stats)
            .finish()
    }
}
