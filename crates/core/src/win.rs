//! Win conditions and the scoring rule used when a match is cut short

use crate::board::GoalBoard;
use crate::ids::TeamId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a team wins a running match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinCondition {
    /// Every goal on the board ("blackout")
    #[default]
    FullBoard,
    /// Any complete row, column or diagonal
    Line,
    /// Goals lock to the first team; a majority share wins
    Lockout,
    /// No early win, the leader at the time limit takes it
    Timed,
}

impl WinCondition {
    /// Whether `team` has won, given the number of teams that started the match
    pub fn check(self, board: &GoalBoard, team: TeamId, contenders: usize) -> bool {
        match self {
            Self::FullBoard => board.is_board_clear(team),
            Self::Line => !board.completed_lines(team).is_empty(),
            Self::Lockout => board.progress_count(team) >= lockout_threshold(board.len(), contenders),
            Self::Timed => false,
        }
    }

    /// Completing a goal locks it for every other team
    pub fn locks_goals(self) -> bool {
        matches!(self, Self::Lockout)
    }
}

impl fmt::Display for WinCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FullBoard => "full board",
            Self::Line => "line",
            Self::Lockout => "lockout",
            Self::Timed => "timed",
        };
        f.write_str(name)
    }
}

/// Goals needed to win a lockout match: a strict majority share, capped at the board size
pub fn lockout_threshold(goals: usize, contenders: usize) -> usize {
    (goals / contenders.max(1) + 1).min(goals)
}

/// Team with the most completions; ties go to whoever reached their count first.
///
/// Teams with no completions never lead.
pub fn leader<'a>(board: &GoalBoard, teams: impl IntoIterator<Item = &'a TeamId>) -> Option<TeamId> {
    teams
        .into_iter()
        .filter_map(|team| {
            let last = board.last_completion(*team)?;
            Some((board.progress_count(*team), last.seq, *team))
        })
        .min_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)))
        .map(|(_, _, team)| team)
}
