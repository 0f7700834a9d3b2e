//! Plugin trait and metadata for host-loaded game modes

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything the host hands a plugin when enabling it
#[derive(Debug, Clone)]
pub struct PluginContext {
    /// Directory holding the plugin's config and data files
    pub data_folder: PathBuf,
}

impl PluginContext {
    pub fn new(data_folder: impl Into<PathBuf>) -> Self {
        Self {
            data_folder: data_folder.into(),
        }
    }
}

/// Core trait that all plugins must implement
pub trait Plugin: Send + Sync {
    /// Get plugin information and metadata
    fn info(&self) -> PluginInfo;

    /// Called when the plugin is loaded
    ///
    /// This runs before the host world is available. Use it for setup that
    /// needs neither configuration nor the data folder.
    fn on_load(&self) -> Result<()> {
        Ok(())
    }

    /// Called when the plugin is enabled
    ///
    /// Read configuration and build runtime state here.
    fn on_enable(&self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }

    /// Called when the plugin is disabled
    ///
    /// Runtime state created in `on_enable` must be torn down here.
    fn on_disable(&self) -> Result<()> {
        Ok(())
    }

    /// Called when the plugin is unloaded
    fn on_unload(&self) -> Result<()> {
        Ok(())
    }
}

/// Lets the host keep its own handle to a plugin it registers
impl<P: Plugin + ?Sized> Plugin for std::sync::Arc<P> {
    fn info(&self) -> PluginInfo {
        (**self).info()
    }

    fn on_load(&self) -> Result<()> {
        (**self).on_load()
    }

    fn on_enable(&self, ctx: &PluginContext) -> Result<()> {
        (**self).on_enable(ctx)
    }

    fn on_disable(&self) -> Result<()> {
        (**self).on_disable()
    }

    fn on_unload(&self) -> Result<()> {
        (**self).on_unload()
    }
}

/// Plugin information and metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Plugin name (must be unique)
    pub name: String,
    pub version: semver::Version,
    pub description: String,
    pub author: String,
}

impl PluginInfo {
    pub fn new(name: impl Into<String>, version: semver::Version) -> Self {
        Self {
            name: name.into(),
            version,
            description: String::new(),
            author: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }
}

/// Plugin state in the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PluginState {
    /// Plugin is not loaded
    Unloaded,
    /// Plugin is loaded but not enabled
    Loaded,
    /// Plugin is enabled and receiving events
    Enabled,
    Disabled,
    /// A lifecycle hook returned an error
    Failed,
}

impl PluginState {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Enabled)
    }

    /// Any state except unloaded
    pub fn is_loaded(self) -> bool {
        !matches!(self, Self::Unloaded)
    }

    pub fn is_failed(self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Get the next valid states from the current state
    pub fn valid_transitions(self) -> &'static [PluginState] {
        match self {
            Self::Unloaded => &[Self::Loaded, Self::Failed],
            Self::Loaded => &[Self::Enabled, Self::Unloaded, Self::Failed],
            Self::Enabled => &[Self::Disabled, Self::Failed],
            Self::Disabled => &[Self::Enabled, Self::Unloaded, Self::Failed],
            Self::Failed => &[Self::Unloaded],
        }
    }

    pub fn can_transition_to(self, target: PluginState) -> bool {
        self.valid_transitions().contains(&target)
    }
}

impl std::fmt::Display for PluginState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unloaded => write!(f, "Unloaded"),
            Self::Loaded => write!(f, "Loaded"),
            Self::Enabled => write!(f, "Enabled"),
            Self::Disabled => write!(f, "Disabled"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}
