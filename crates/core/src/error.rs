//! Error types for the bingo engine

use crate::game::MatchPhase;
use crate::ids::{ArenaId, GoalId, MatchId, PlayerId, SessionId, TeamId};
use thiserror::Error;

/// Main result type for engine operations
pub type Result<T> = std::result::Result<T, BingoError>;

/// Every failure a match command can report.
///
/// All variants are recoverable: they are returned to the adapter that issued
/// the command and never leave a match half-updated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BingoError {
    #[error("Unknown match: {0}")]
    UnknownMatch(MatchId),

    #[error("Cannot {action} while match is {phase}")]
    InvalidTransition {
        phase: MatchPhase,
        action: &'static str,
    },

    #[error("Player {0} is already assigned to a team")]
    PlayerAlreadyAssigned(PlayerId),

    #[error("Arena '{0}' already hosts a match")]
    ArenaBusy(ArenaId),

    #[error("Unknown menu session: {0}")]
    UnknownSession(SessionId),

    #[error("No match in arena '{0}'")]
    UnknownArena(ArenaId),

    #[error("Unknown team: {0}")]
    UnknownTeam(TeamId),

    #[error("No team named '{0}'")]
    NoSuchTeam(String),

    #[error("Unknown goal: {0}")]
    UnknownGoal(GoalId),

    #[error("Team {team} has already reached {max} players")]
    TeamFull { team: TeamId, max: usize },

    #[error("A team named '{0}' already exists")]
    TeamNameTaken(String),

    #[error("Invalid team name '{0}': must be between 3 and 14 characters")]
    InvalidTeamName(String),

    #[error("Cannot start a match without a team that has players")]
    NoTeams,

    #[error("Player {0} is not part of this match")]
    PlayerNotInMatch(PlayerId),

    #[error("Goal pool has {available} eligible goals, board needs {required}")]
    InsufficientGoals { required: usize, available: usize },

    #[error("Invalid match settings: {0}")]
    InvalidSettings(String),

    #[error("Bingo runtime is shutting down")]
    ShuttingDown,
}

impl BingoError {
    /// Shorthand for a rejected lifecycle transition
    pub fn invalid(phase: MatchPhase, action: &'static str) -> Self {
        Self::InvalidTransition { phase, action }
    }
}
