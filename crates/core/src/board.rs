//! The goal board: which goals are in play and who completed them

use crate::config::board_side;
use crate::error::{BingoError, Result};
use crate::goal::Goal;
use crate::ids::{GoalId, PlayerId, TeamId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Record of one team completing one goal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub at: DateTime<Utc>,
    /// Board-wide completion order, strictly increasing
    pub seq: u64,
    pub player: PlayerId,
}

/// A complete line on a square board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Line {
    Row(usize),
    Column(usize),
    Diagonal,
    AntiDiagonal,
}

#[derive(Debug, Clone)]
struct TeamProgress {
    slots: Vec<Option<Completion>>,
    count: usize,
    last: Option<Completion>,
}

impl TeamProgress {
    fn new(len: usize) -> Self {
        Self {
            slots: vec![None; len],
            count: 0,
            last: None,
        }
    }
}

/// Goals of one match, frozen at start, with per-team completion state.
///
/// Completions are append-only: once a goal is marked for a team it stays
/// marked for the lifetime of the board.
#[derive(Debug, Clone)]
pub struct GoalBoard {
    goals: Vec<Goal>,
    index: HashMap<GoalId, usize>,
    side: Option<usize>,
    progress: HashMap<TeamId, TeamProgress>,
    next_seq: u64,
}

impl GoalBoard {
    pub fn new(goals: Vec<Goal>, teams: impl IntoIterator<Item = TeamId>) -> Self {
        let mut index = HashMap::with_capacity(goals.len());
        let mut kept = Vec::with_capacity(goals.len());
        for goal in goals {
            if !index.contains_key(&goal.id) {
                index.insert(goal.id.clone(), kept.len());
                kept.push(goal);
            }
        }

        let len = kept.len();
        Self {
            side: board_side(len),
            progress: teams.into_iter().map(|team| (team, TeamProgress::new(len))).collect(),
            goals: kept,
            index,
            next_seq: 0,
        }
    }

    /// Goals in board order (row-major on square boards)
    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    pub fn len(&self) -> usize {
        self.goals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.goals.is_empty()
    }

    /// Side length when the board is square
    pub fn side(&self) -> Option<usize> {
        self.side
    }

    pub fn contains(&self, goal: &GoalId) -> bool {
        self.index.contains_key(goal)
    }

    pub fn teams(&self) -> impl Iterator<Item = &TeamId> {
        self.progress.keys()
    }

    /// Mark `goal` complete for `team`. Returns whether anything changed.
    pub fn mark_complete(&mut self, team: TeamId, goal: &GoalId, player: PlayerId, at: DateTime<Utc>) -> Result<bool> {
        let position = *self.index.get(goal).ok_or_else(|| BingoError::UnknownGoal(goal.clone()))?;
        let progress = self.progress.get_mut(&team).ok_or(BingoError::UnknownTeam(team))?;

        if progress.slots[position].is_some() {
            return Ok(false);
        }

        let completion = Completion { at, seq: self.next_seq, player };
        self.next_seq += 1;

        progress.slots[position] = Some(completion);
        progress.count += 1;
        progress.last = Some(completion);
        Ok(true)
    }

    pub fn completion(&self, team: TeamId, goal: &GoalId) -> Option<Completion> {
        let position = *self.index.get(goal)?;
        self.progress.get(&team)?.slots[position]
    }

    pub fn is_complete(&self, team: TeamId, goal: &GoalId) -> bool {
        self.completion(team, goal).is_some()
    }

    /// Every goal completed by `team`
    pub fn is_board_clear(&self, team: TeamId) -> bool {
        self.progress
            .get(&team)
            .is_some_and(|progress| progress.count == self.goals.len())
    }

    pub fn progress_count(&self, team: TeamId) -> usize {
        self.progress.get(&team).map_or(0, |progress| progress.count)
    }

    /// The team's most recent completion
    pub fn last_completion(&self, team: TeamId) -> Option<Completion> {
        self.progress.get(&team).and_then(|progress| progress.last)
    }

    /// Teams that completed `goal`, earliest first
    pub fn claimed_by(&self, goal: &GoalId) -> Vec<TeamId> {
        let Some(&position) = self.index.get(goal) else {
            return Vec::new();
        };

        let mut claims: Vec<(u64, TeamId)> = self
            .progress
            .iter()
            .filter_map(|(team, progress)| progress.slots[position].map(|c| (c.seq, *team)))
            .collect();
        claims.sort_unstable();
        claims.into_iter().map(|(_, team)| team).collect()
    }

    /// Whether every goal has been completed by at least one team
    pub fn all_claimed(&self) -> bool {
        (0..self.goals.len()).all(|position| {
            self.progress
                .values()
                .any(|progress| progress.slots[position].is_some())
        })
    }

    /// Rows, columns and diagonals fully completed by `team`; empty on non-square boards
    pub fn completed_lines(&self, team: TeamId) -> Vec<Line> {
        let (Some(side), Some(progress)) = (self.side, self.progress.get(&team)) else {
            return Vec::new();
        };
        let done = |row: usize, col: usize| progress.slots[row * side + col].is_some();

        let mut lines = Vec::new();
        lines.extend((0..side).filter(|&row| (0..side).all(|col| done(row, col))).map(Line::Row));
        lines.extend((0..side).filter(|&col| (0..side).all(|row| done(row, col))).map(Line::Column));
        if (0..side).all(|i| done(i, i)) {
            lines.push(Line::Diagonal);
        }
        if (0..side).all(|i| done(i, side - 1 - i)) {
            lines.push(Line::AntiDiagonal);
        }
        lines
    }
}
