//! Bingo Plugins
//!
//! Host-facing layer of the Bingo minigame: the plugin lifecycle, the
//! translation of server events into engine commands and the tick driver.

pub mod adapter;
pub mod bingo;
pub mod lifecycle;
pub mod logging;
pub mod plugin;
pub mod ticker;

pub use adapter::{translate, Command, HostEvent, ItemSource, SignKind};
pub use bingo::{BingoPlugin, BingoRuntime, CommandOutcome, TickReport};
pub use lifecycle::{PluginHandle, PluginStats};
pub use plugin::{Plugin, PluginContext, PluginInfo, PluginState};

// Re-export engine types hosts need for events and notifications
pub use bingo_core::{ArenaId, GoalId, Notification, NotificationQueue, NotificationSink, PlayerId, SessionId};
