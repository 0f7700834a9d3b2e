//! Match state: teams, players, the board and the lobby → running → finished lifecycle
//!
//! A [`Match`] is not synchronized on its own; the registry wraps each one in a
//! mutex so that every command on a match runs to completion before the next.
//! Commands validate first and only then mutate, so an `Err` never leaves
//! partial state behind.

use crate::board::GoalBoard;
use crate::config::MatchSettings;
use crate::error::{BingoError, Result};
use crate::goal::GoalPool;
use crate::ids::{ArenaId, GoalId, MatchId, PlayerId, TeamId};
use crate::notify::{Notification, Standing};
use crate::team::{validate_team_name, Team, TeamColor};
use crate::win;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Lifecycle phase of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    Lobby,
    Running,
    Finished,
}

impl fmt::Display for MatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Lobby => "lobby",
            Self::Running => "running",
            Self::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// Why a match ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// A team met the win condition
    Completed,
    TimeLimit,
    /// Ended by an explicit `finish`
    Forced,
    /// Lockout board fully claimed without a majority
    LockoutExhausted,
}

/// Recorded result of a finished match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub winner: Option<TeamId>,
    pub reason: FinishReason,
    pub finished_at: DateTime<Utc>,
}

/// What a progress report did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressOutcome {
    /// Newly completed for `team`; `won` if it ended the match
    Completed { team: TeamId, won: bool },
    AlreadyComplete,
    /// The item is not a goal on this board
    NotOnBoard,
    /// Lockout: another team holds this goal
    Locked { by: TeamId },
    /// The report arrived after the time limit; it ended the match and did not count
    TimeUp { winner: Option<TeamId> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PlayerEntry {
    team: TeamId,
    online: bool,
}

/// One Bingo match
#[derive(Debug)]
pub struct Match {
    id: MatchId,
    arena: ArenaId,
    phase: MatchPhase,
    settings: MatchSettings,
    pool: Arc<GoalPool>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    teams: IndexMap<TeamId, Team>,
    next_team: u32,
    players: HashMap<PlayerId, PlayerEntry>,
    board: Option<GoalBoard>,
    /// Teams with players when the match started
    contenders: usize,
    outcome: Option<MatchOutcome>,
    outbox: Vec<Notification>,
    rng: StdRng,
}

impl Match {
    pub fn new(arena: ArenaId, settings: MatchSettings, pool: Arc<GoalPool>, now: DateTime<Utc>) -> Self {
        let id = MatchId::random();
        let rng = settings.seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);

        Self {
            outbox: vec![Notification::MatchCreated { match_id: id, arena: arena.clone() }],
            id,
            arena,
            phase: MatchPhase::Lobby,
            settings,
            pool,
            created_at: now,
            started_at: None,
            teams: IndexMap::new(),
            next_team: 0,
            players: HashMap::new(),
            board: None,
            contenders: 0,
            outcome: None,
            rng,
        }
    }

    pub fn id(&self) -> MatchId {
        self.id
    }

    pub fn arena(&self) -> &ArenaId {
        &self.arena
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn settings(&self) -> &MatchSettings {
        &self.settings
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// When the time limit runs out, if the match is timed and started
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        Some(self.started_at? + self.settings.time_limit()?)
    }

    /// Teams in creation order
    pub fn teams(&self) -> impl Iterator<Item = &Team> {
        self.teams.values()
    }

    pub fn team(&self, id: TeamId) -> Option<&Team> {
        self.teams.get(&id)
    }

    /// Case-insensitive lookup, as typed on a sign
    pub fn team_by_name(&self, name: &str) -> Option<&Team> {
        let name = name.trim();
        self.teams.values().find(|team| team.name().eq_ignore_ascii_case(name))
    }

    pub fn team_of(&self, player: &PlayerId) -> Option<TeamId> {
        self.players.get(player).map(|entry| entry.team)
    }

    pub fn contains_player(&self, player: &PlayerId) -> bool {
        self.players.contains_key(player)
    }

    pub fn is_online(&self, player: &PlayerId) -> bool {
        self.players.get(player).is_some_and(|entry| entry.online)
    }

    pub fn players(&self) -> impl Iterator<Item = &PlayerId> {
        self.players.keys()
    }

    pub fn board(&self) -> Option<&GoalBoard> {
        self.board.as_ref()
    }

    pub fn outcome(&self) -> Option<&MatchOutcome> {
        self.outcome.as_ref()
    }

    pub fn winner(&self) -> Option<TeamId> {
        self.outcome.and_then(|outcome| outcome.winner)
    }

    /// Teams ordered by completed goals, creation order among equals
    pub fn standings(&self) -> Vec<Standing> {
        let mut standings: Vec<Standing> = self
            .teams
            .values()
            .map(|team| Standing {
                team: team.id(),
                name: team.name().to_string(),
                completed: team.completed(),
            })
            .collect();
        standings.sort_by(|a, b| b.completed.cmp(&a.completed));
        standings
    }

    /// Take the notifications queued by committed commands
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.outbox)
    }

    /// Create a team, optionally placing its creator in it.
    pub fn create_team(&mut self, name: &str, creator: Option<PlayerId>) -> Result<TeamId> {
        if self.phase != MatchPhase::Lobby {
            return Err(BingoError::invalid(self.phase, "create a team"));
        }

        let name = validate_team_name(name)?;
        if self.team_by_name(&name).is_some() {
            return Err(BingoError::TeamNameTaken(name));
        }

        if let Some(player) = creator {
            if self.players.contains_key(&player) {
                return Err(BingoError::PlayerAlreadyAssigned(player));
            }
        }

        let taken: Vec<TeamColor> = self.teams.values().map(Team::color).collect();
        let color = match TeamColor::pick(&taken, &mut self.rng) {
            Some(color) => color,
            None => TeamColor::from_rgb(self.rng.gen()),
        };

        let id = TeamId::new(self.next_team);
        let mut team = Team::new(id, name.clone(), color);
        if let Some(player) = creator {
            team.add_member(player, self.settings.max_team_size)?;
        }

        self.next_team += 1;
        self.teams.insert(id, team);
        self.outbox.push(Notification::TeamCreated { match_id: self.id, team: id, name: name.clone(), color });

        if let Some(player) = creator {
            self.players.insert(player, PlayerEntry { team: id, online: true });
            self.outbox.push(Notification::PlayerJoined { match_id: self.id, player, team: id });
        }

        tracing::debug!("Match {} created team '{}' ({})", self.id, name, id);
        Ok(id)
    }

    /// Put a player on a team. Returns `false` if they were already on it.
    pub fn join(&mut self, player: PlayerId, team: TeamId) -> Result<bool> {
        if self.phase != MatchPhase::Lobby {
            return Err(BingoError::invalid(self.phase, "join"));
        }

        if !self.teams.contains_key(&team) {
            return Err(BingoError::UnknownTeam(team));
        }

        match self.players.get(&player) {
            Some(entry) if entry.team == team => return Ok(false),
            Some(_) => return Err(BingoError::PlayerAlreadyAssigned(player)),
            None => {}
        }

        let max = self.settings.max_team_size;
        let target = self.teams.get_mut(&team).ok_or(BingoError::UnknownTeam(team))?;
        target.add_member(player, max)?;

        self.players.insert(player, PlayerEntry { team, online: true });
        self.outbox.push(Notification::PlayerJoined { match_id: self.id, player, team });

        tracing::debug!("Player {} joined {} in match {}", player, team, self.id);
        Ok(true)
    }

    /// Drop a player from the match.
    ///
    /// In the lobby the player leaves their team. Once running they only go
    /// offline; membership and progress stay. Returns whether anything changed.
    pub fn leave(&mut self, player: PlayerId) -> Result<bool> {
        if self.phase == MatchPhase::Finished {
            return Err(BingoError::invalid(self.phase, "leave"));
        }

        let Some(entry) = self.players.get(&player).copied() else {
            return Ok(false);
        };

        let removed = match self.phase {
            MatchPhase::Lobby => {
                self.players.remove(&player);
                if let Some(team) = self.teams.get_mut(&entry.team) {
                    team.remove_member(&player);
                }
                true
            }
            _ if entry.online => {
                if let Some(entry) = self.players.get_mut(&player) {
                    entry.online = false;
                }
                false
            }
            _ => return Ok(false),
        };

        self.outbox.push(Notification::PlayerLeft { match_id: self.id, player, team: entry.team, removed });
        tracing::debug!("Player {} left match {} (removed: {})", player, self.id, removed);
        Ok(true)
    }

    /// Bring a disconnected player back online. Returns whether they were offline.
    pub fn rejoin(&mut self, player: PlayerId) -> Result<bool> {
        if self.phase == MatchPhase::Finished {
            return Err(BingoError::invalid(self.phase, "rejoin"));
        }

        let entry = self.players.get_mut(&player).ok_or(BingoError::PlayerNotInMatch(player))?;
        if entry.online {
            return Ok(false);
        }

        entry.online = true;
        let team = entry.team;
        self.outbox.push(Notification::PlayerRejoined { match_id: self.id, player, team });
        Ok(true)
    }

    /// Draw the board and begin play
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.phase != MatchPhase::Lobby {
            return Err(BingoError::invalid(self.phase, "start"));
        }

        let contenders = self.teams.values().filter(|team| !team.is_empty()).count();
        if contenders == 0 {
            return Err(BingoError::NoTeams);
        }

        let goals = self
            .pool
            .draw(self.settings.board_size, self.settings.difficulty, &mut self.rng)?;

        self.board = Some(GoalBoard::new(goals.clone(), self.teams.keys().copied()));
        self.contenders = contenders;
        self.started_at = Some(now);
        self.phase = MatchPhase::Running;

        self.outbox.push(Notification::MatchStarted { match_id: self.id, goals });
        self.outbox.push(Notification::ScoreboardChanged { match_id: self.id, standings: self.standings() });

        tracing::info!(
            "Match {} started in '{}' with {} teams ({} win)",
            self.id,
            self.arena,
            contenders,
            self.settings.win_condition
        );
        Ok(())
    }

    /// A player obtained `goal`.
    pub fn report_progress(&mut self, player: PlayerId, goal: &GoalId, now: DateTime<Utc>) -> Result<ProgressOutcome> {
        // Reports past the deadline must not count, even before the next tick
        if self.tick(now) {
            return Ok(ProgressOutcome::TimeUp { winner: self.winner() });
        }

        if self.phase != MatchPhase::Running {
            return Err(BingoError::invalid(self.phase, "report progress"));
        }

        let team = self.team_of(&player).ok_or(BingoError::PlayerNotInMatch(player))?;
        let condition = self.settings.win_condition;
        let contenders = self.contenders;
        let phase = self.phase;
        let Some(board) = self.board.as_mut() else {
            return Err(BingoError::invalid(phase, "report progress"));
        };

        if !board.contains(goal) {
            return Ok(ProgressOutcome::NotOnBoard);
        }

        if board.is_complete(team, goal) {
            return Ok(ProgressOutcome::AlreadyComplete);
        }

        if condition.locks_goals() {
            if let Some(&holder) = board.claimed_by(goal).first() {
                return Ok(ProgressOutcome::Locked { by: holder });
            }
        }

        board.mark_complete(team, goal, player, now)?;
        let progress = board.progress_count(team);
        let total = board.len();
        let won = condition.check(board, team, contenders);
        let exhausted = condition.locks_goals() && board.all_claimed();

        if let Some(entry) = self.teams.get_mut(&team) {
            entry.record_completion();
        }

        self.outbox.push(Notification::GoalCompleted {
            match_id: self.id,
            team,
            player,
            goal: goal.clone(),
            progress,
            total,
        });
        self.outbox.push(Notification::ScoreboardChanged { match_id: self.id, standings: self.standings() });
        tracing::debug!("{} completed {} in match {} ({}/{})", team, goal, self.id, progress, total);

        if won {
            self.conclude(Some(team), FinishReason::Completed, now);
        } else if exhausted {
            let leader = self.leader();
            self.conclude(leader, FinishReason::LockoutExhausted, now);
        }

        Ok(ProgressOutcome::Completed { team, won })
    }

    /// Periodic check; ends a running match whose time limit elapsed. Returns whether it ended.
    pub fn tick(&mut self, now: DateTime<Utc>) -> bool {
        if self.phase != MatchPhase::Running {
            return false;
        }

        match self.deadline() {
            Some(deadline) if now >= deadline => {
                let leader = self.leader();
                self.conclude(leader, FinishReason::TimeLimit, now);
                true
            }
            _ => false,
        }
    }

    /// End the match now. Repeated calls return the recorded winner.
    pub fn finish(&mut self, now: DateTime<Utc>) -> Result<Option<TeamId>> {
        match self.phase {
            MatchPhase::Lobby => Err(BingoError::invalid(self.phase, "finish")),
            MatchPhase::Finished => Ok(self.winner()),
            MatchPhase::Running => {
                let leader = self.leader();
                self.conclude(leader, FinishReason::Forced, now);
                Ok(leader)
            }
        }
    }

    fn leader(&self) -> Option<TeamId> {
        self.board
            .as_ref()
            .and_then(|board| win::leader(board, self.teams.keys()))
    }

    fn conclude(&mut self, winner: Option<TeamId>, reason: FinishReason, now: DateTime<Utc>) {
        self.phase = MatchPhase::Finished;
        self.outcome = Some(MatchOutcome { winner, reason, finished_at: now });
        self.outbox.push(Notification::MatchFinished { match_id: self.id, winner, reason });

        match winner.and_then(|team| self.teams.get(&team)) {
            Some(team) => tracing::info!("Match {} finished ({:?}), winner '{}'", self.id, reason, team.name()),
            None => tracing::info!("Match {} finished ({:?}) without a winner", self.id, reason),
        }
    }
}
