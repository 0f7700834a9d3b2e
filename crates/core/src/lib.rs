//! Bingo Core
//!
//! In-memory engine for the Bingo minigame: matches, teams, goal boards,
//! win conditions and sign menus. The engine never talks to the game server
//! directly; commands come in through [`MatchRegistry`] and
//! [`SignMenuController`], and every committed change goes out as a
//! [`Notification`].

pub mod board;
pub mod config;
pub mod error;
pub mod game;
pub mod goal;
pub mod ids;
pub mod menu;
pub mod notify;
pub mod registry;
pub mod team;
pub mod win;

pub use board::{Completion, GoalBoard, Line};
pub use config::{BingoConfig, ConfigError, LoggingSettings, MatchSettings};
pub use error::{BingoError, Result};
pub use game::{FinishReason, Match, MatchOutcome, MatchPhase, ProgressOutcome};
pub use goal::{Difficulty, Goal, GoalPool};
pub use ids::{ArenaId, GoalId, MatchId, PlayerId, SessionId, TeamId};
pub use menu::{MenuCloseReason, MenuResolution, MenuSpec, SignMenuController};
pub use notify::{Notification, NotificationQueue, NotificationSink, NullSink, Standing};
pub use registry::{MatchHandle, MatchRegistry};
pub use team::{Team, TeamColor};
pub use win::WinCondition;
