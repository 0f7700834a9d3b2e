//! Registry of live matches, indexed by id, arena and player
//!
//! Lock order is player index entry → match mutex. Code holding a match lock
//! never touches the index maps, so the two can not deadlock. Notifications
//! queued by a command are handed to the sink before the match lock is
//! released, which keeps per-match delivery in commit order.

use crate::config::{ConfigError, MatchSettings};
use crate::error::{BingoError, Result};
use crate::game::{Match, MatchPhase, ProgressOutcome};
use crate::goal::GoalPool;
use crate::ids::{ArenaId, GoalId, MatchId, PlayerId, TeamId};
use crate::notify::{Notification, NotificationSink};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub type MatchHandle = Arc<Mutex<Match>>;

/// All matches hosted by one server
pub struct MatchRegistry {
    matches: DashMap<MatchId, MatchHandle>,
    arenas: DashMap<ArenaId, MatchId>,
    /// Player → the match they last joined; finished matches do not bind
    players: DashMap<PlayerId, MatchId>,
    sink: Arc<dyn NotificationSink>,
    closed: AtomicBool,
}

impl MatchRegistry {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            matches: DashMap::new(),
            arenas: DashMap::new(),
            players: DashMap::new(),
            sink,
            closed: AtomicBool::new(false),
        }
    }

    /// Create a lobby in `arena` and register it
    pub fn create(&self, arena: ArenaId, settings: MatchSettings, pool: Arc<GoalPool>) -> Result<MatchId> {
        self.register(Match::new(arena, settings, pool, Utc::now()))
    }

    /// Register a match; only one match may occupy an arena.
    ///
    /// Players already on the match's teams are bound to it, unless one of
    /// them is still playing elsewhere, in which case nothing is registered.
    pub fn register(&self, game: Match) -> Result<MatchId> {
        self.ensure_open()?;
        game.settings().validate().map_err(|e| match e {
            ConfigError::Invalid(reason) => BingoError::InvalidSettings(reason),
            other => BingoError::InvalidSettings(other.to_string()),
        })?;

        let id = game.id();
        let members: Vec<PlayerId> = match game.phase() {
            MatchPhase::Finished => Vec::new(),
            _ => game.players().copied().collect(),
        };

        let handle = match self.arenas.entry(game.arena().clone()) {
            Entry::Occupied(occupied) => return Err(BingoError::ArenaBusy(occupied.key().clone())),
            Entry::Vacant(vacant) => {
                let handle = Arc::new(Mutex::new(game));
                self.matches.insert(id, Arc::clone(&handle));
                if let Err(e) = self.bind_members(id, &members) {
                    self.matches.remove(&id);
                    return Err(e);
                }
                vacant.insert(id);
                handle
            }
        };

        // Flush the creation notice
        self.apply(&handle, |_| Ok(()))?;
        tracing::info!("Registered match {} with {} players", id, members.len());
        Ok(id)
    }

    /// Remove a match and free its arena and players
    pub fn unregister(&self, id: MatchId) -> Result<()> {
        let (_, handle) = self.matches.remove(&id).ok_or(BingoError::UnknownMatch(id))?;
        let arena = handle.lock().arena().clone();

        self.arenas.remove_if(&arena, |_, current| *current == id);
        self.players.retain(|_, current| *current != id);
        self.sink.notify(Notification::MatchRemoved { match_id: id });

        tracing::info!("Unregistered match {} from '{}'", id, arena);
        Ok(())
    }

    pub fn lookup_by_player(&self, player: &PlayerId) -> Option<MatchId> {
        self.players.get(player).map(|entry| *entry.value())
    }

    pub fn lookup_by_arena(&self, arena: &ArenaId) -> Option<MatchId> {
        self.arenas.get(arena).map(|entry| *entry.value())
    }

    pub fn match_ids(&self) -> Vec<MatchId> {
        self.matches.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Send a notification that is not tied to a match command
    pub fn notify(&self, notification: Notification) {
        self.sink.notify(notification);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Read a match without mutating it
    pub fn inspect<T>(&self, id: MatchId, f: impl FnOnce(&Match) -> T) -> Result<T> {
        let handle = self.handle(id)?;
        let game = handle.lock();
        Ok(f(&game))
    }

    /// Run a command against one match under its lock
    pub fn with_match<T>(&self, id: MatchId, f: impl FnOnce(&mut Match) -> Result<T>) -> Result<T> {
        let handle = self.handle(id)?;
        self.apply(&handle, f)
    }

    pub fn create_team(&self, id: MatchId, name: &str, creator: Option<PlayerId>) -> Result<TeamId> {
        self.ensure_open()?;
        match creator {
            Some(player) => self.assign(id, player, |game| game.create_team(name, Some(player))),
            None => self.with_match(id, |game| game.create_team(name, None)),
        }
    }

    pub fn join(&self, id: MatchId, player: PlayerId, team: TeamId) -> Result<bool> {
        self.ensure_open()?;
        self.assign(id, player, |game| game.join(player, team))
    }

    /// Player left the server or the lobby. Unknown players are a no-op.
    pub fn leave(&self, player: PlayerId) -> Result<bool> {
        let Entry::Occupied(occupied) = self.players.entry(player) else {
            return Ok(false);
        };

        let Ok(handle) = self.handle(*occupied.get()) else {
            occupied.remove();
            return Ok(false);
        };

        let (changed, still_member) = self.apply(&handle, |game| {
            let changed = game.leave(player)?;
            Ok((changed, game.contains_player(&player)))
        })?;

        if !still_member {
            occupied.remove();
        }
        Ok(changed)
    }

    /// Player came back to the server. Unknown players are a no-op.
    pub fn rejoin(&self, player: PlayerId) -> Result<bool> {
        match self.lookup_by_player(&player) {
            Some(id) => self.with_match(id, |game| game.rejoin(player)),
            None => Ok(false),
        }
    }

    pub fn start(&self, id: MatchId, now: DateTime<Utc>) -> Result<()> {
        self.ensure_open()?;
        self.with_match(id, |game| game.start(now))
    }

    pub fn report_progress(&self, id: MatchId, player: PlayerId, goal: &GoalId, now: DateTime<Utc>) -> Result<ProgressOutcome> {
        self.ensure_open()?;
        self.with_match(id, |game| game.report_progress(player, goal, now))
    }

    /// Route a progress report to whichever match the player is in
    pub fn report_progress_for_player(&self, player: PlayerId, goal: &GoalId, now: DateTime<Utc>) -> Result<ProgressOutcome> {
        let id = self.lookup_by_player(&player).ok_or(BingoError::PlayerNotInMatch(player))?;
        self.report_progress(id, player, goal, now)
    }

    pub fn finish(&self, id: MatchId, now: DateTime<Utc>) -> Result<Option<TeamId>> {
        self.with_match(id, |game| game.finish(now))
    }

    /// Run the timeout check on every match. Returns the matches that ended.
    pub fn tick(&self, now: DateTime<Utc>) -> Vec<MatchId> {
        self.handles()
            .into_iter()
            .filter_map(|(id, handle)| {
                let ended = self.apply(&handle, |game| Ok(game.tick(now))).unwrap_or(false);
                ended.then_some(id)
            })
            .collect()
    }

    /// Refuse new work and force-finish every running match. Returns how many were cut short.
    pub fn shutdown(&self, now: DateTime<Utc>) -> usize {
        self.closed.store(true, Ordering::Release);

        let finished = self
            .handles()
            .into_iter()
            .filter(|(_, handle)| {
                self.apply(handle, |game| {
                    let running = game.phase() == MatchPhase::Running;
                    if running {
                        game.finish(now)?;
                    }
                    Ok(running)
                })
                .unwrap_or(false)
            })
            .count();

        tracing::info!("Match registry shut down, {} running matches finished", finished);
        finished
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(BingoError::ShuttingDown)
        } else {
            Ok(())
        }
    }

    fn handle(&self, id: MatchId) -> Result<MatchHandle> {
        self.matches
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(BingoError::UnknownMatch(id))
    }

    fn handles(&self) -> Vec<(MatchId, MatchHandle)> {
        self.matches
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect()
    }

    fn apply<T>(&self, handle: &Mutex<Match>, f: impl FnOnce(&mut Match) -> Result<T>) -> Result<T> {
        let mut game = handle.lock();
        let result = f(&mut game);
        for notification in game.drain_notifications() {
            self.sink.notify(notification);
        }
        result
    }

    /// Whether `id` is a registered match that has not finished
    fn is_active(&self, id: MatchId) -> bool {
        self.handle(id)
            .map(|other| other.lock().phase() != MatchPhase::Finished)
            .unwrap_or(false)
    }

    /// Run a command that may bind `player` to match `id`, holding the
    /// player's index entry so no other match can claim them meanwhile.
    fn assign<T>(&self, id: MatchId, player: PlayerId, f: impl FnOnce(&mut Match) -> Result<T>) -> Result<T> {
        let handle = self.handle(id)?;

        match self.players.entry(player) {
            Entry::Occupied(mut occupied) => {
                let current = *occupied.get();
                if current != id && self.is_active(current) {
                    return Err(BingoError::PlayerAlreadyAssigned(player));
                }

                let value = self.apply(&handle, f)?;
                occupied.insert(id);
                Ok(value)
            }
            Entry::Vacant(vacant) => {
                let value = self.apply(&handle, f)?;
                vacant.insert(id);
                Ok(value)
            }
        }
    }

    /// Bind every member of a match being registered, or none of them.
    ///
    /// Entries are taken one at a time; a conflict rolls back the ones
    /// already bound to their previous values.
    fn bind_members(&self, id: MatchId, members: &[PlayerId]) -> Result<()> {
        let mut bound: Vec<(PlayerId, Option<MatchId>)> = Vec::with_capacity(members.len());

        for &player in members {
            let claimed = match self.players.entry(player) {
                Entry::Occupied(mut occupied) => {
                    let current = *occupied.get();
                    if current != id && self.is_active(current) {
                        None
                    } else {
                        occupied.insert(id);
                        Some(Some(current))
                    }
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(id);
                    Some(None)
                }
            };

            match claimed {
                Some(previous) => bound.push((player, previous)),
                None => {
                    self.unbind(id, bound);
                    return Err(BingoError::PlayerAlreadyAssigned(player));
                }
            }
        }
        Ok(())
    }

    fn unbind(&self, id: MatchId, bound: Vec<(PlayerId, Option<MatchId>)>) {
        for (player, previous) in bound {
            match previous {
                Some(previous) => {
                    if let Some(mut current) = self.players.get_mut(&player) {
                        if *current == id {
                            *current = previous;
                        }
                    }
                }
                None => {
                    self.players.remove_if(&player, |_, current| *current == id);
                }
            }
        }
    }
}

impl std::fmt::Debug for MatchRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchRegistry")
            .field("matches", &self.matches.len())
            .field("players", &self.players.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goal::{Difficulty, Goal};
    use crate::notify::NotificationQueue;
    use crate::win::WinCondition;
    use chrono::Duration;

    fn setup() -> (MatchRegistry, Arc<NotificationQueue>) {
        let queue = Arc::new(NotificationQueue::new());
        (MatchRegistry::new(queue.clone()), queue)
    }

    fn settings() -> MatchSettings {
        MatchSettings {
            board_size: 3,
            difficulty: Difficulty::Medium,
            seed: Some(5),
            ..MatchSettings::default()
        }
    }

    fn pool() -> Arc<GoalPool> {
        Arc::new(GoalPool::new((0..6).map(|i| Goal::new(format!("g{i}"), "", 2))))
    }

    #[test]
    fn test_one_match_per_arena() {
        let (registry, _) = setup();
        let arena = ArenaId::new("bingo_1");

        let id = registry.create(arena.clone(), settings(), pool()).unwrap();
        assert_eq!(
            registry.create(arena.clone(), settings(), pool()),
            Err(BingoError::ArenaBusy(arena.clone()))
        );
        assert_eq!(registry.lookup_by_arena(&arena), Some(id));

        registry.unregister(id).unwrap();
        assert_eq!(registry.lookup_by_arena(&arena), None);
        assert_eq!(registry.unregister(id), Err(BingoError::UnknownMatch(id)));
        assert!(registry.create(arena, settings(), pool()).is_ok());
    }

    #[test]
    fn test_player_in_one_active_match() {
        let (registry, _) = setup();
        let first = registry.create(ArenaId::new("a"), settings(), pool()).unwrap();
        let second = registry.create(ArenaId::new("b"), settings(), pool()).unwrap();
        let player = PlayerId::random();

        let team = registry.create_team(first, "Alpha", Some(player)).unwrap();
        let other = registry.create_team(second, "Bravo", None).unwrap();
        assert_eq!(registry.lookup_by_player(&player), Some(first));
        assert_eq!(registry.join(second, player, other), Err(BingoError::PlayerAlreadyAssigned(player)));

        // Once the first match is over the player is free again
        registry.start(first, Utc::now()).unwrap();
        registry.finish(first, Utc::now()).unwrap();
        assert!(registry.join(second, player, other).unwrap());
        assert_eq!(registry.lookup_by_player(&player), Some(second));
        assert_eq!(registry.inspect(first, |game| game.team_of(&player)).unwrap(), Some(team));
    }

    #[test]
    fn test_register_binds_prebuilt_members() {
        let (registry, _) = setup();
        let first = registry.create(ArenaId::new("a"), settings(), pool()).unwrap();
        let (busy, free) = (PlayerId::random(), PlayerId::random());
        registry.create_team(first, "Alpha", Some(busy)).unwrap();

        // A player still in a lobby elsewhere blocks the whole registration
        let mut clash = Match::new(ArenaId::new("b"), settings(), pool(), Utc::now());
        clash.create_team("Bravo", Some(free)).unwrap();
        clash.create_team("Charlie", Some(busy)).unwrap();
        assert_eq!(registry.register(clash), Err(BingoError::PlayerAlreadyAssigned(busy)));
        assert_eq!(registry.lookup_by_arena(&ArenaId::new("b")), None);
        assert_eq!(registry.lookup_by_player(&free), None);
        assert_eq!(registry.lookup_by_player(&busy), Some(first));
        assert_eq!(registry.len(), 1);

        let mut prebuilt = Match::new(ArenaId::new("b"), settings(), pool(), Utc::now());
        prebuilt.create_team("Bravo", Some(free)).unwrap();
        let second = registry.register(prebuilt).unwrap();
        assert_eq!(registry.lookup_by_player(&free), Some(second));

        let other = registry.create_team(first, "Delta", None).unwrap();
        assert_eq!(registry.join(first, free, other), Err(BingoError::PlayerAlreadyAssigned(free)));
    }

    #[test]
    fn test_register_rejects_unplayable_settings() {
        let (registry, _) = setup();

        let mut line = settings();
        line.win_condition = WinCondition::Line;
        line.board_size = 5;
        assert!(matches!(
            registry.create(ArenaId::new("a"), line, pool()),
            Err(BingoError::InvalidSettings(_))
        ));

        let mut timed = settings();
        timed.win_condition = WinCondition::Timed;
        timed.time_limit_minutes = None;
        assert!(matches!(
            registry.create(ArenaId::new("a"), timed, pool()),
            Err(BingoError::InvalidSettings(_))
        ));

        assert!(registry.is_empty());
        assert_eq!(registry.lookup_by_arena(&ArenaId::new("a")), None);
    }

    #[test]
    fn test_leave_clears_index_in_lobby_only() {
        let (registry, _) = setup();
        let id = registry.create(ArenaId::new("a"), settings(), pool()).unwrap();
        let (stays, goes) = (PlayerId::random(), PlayerId::random());
        let team = registry.create_team(id, "Alpha", Some(stays)).unwrap();
        registry.join(id, goes, team).unwrap();

        assert!(registry.leave(goes).unwrap());
        assert_eq!(registry.lookup_by_player(&goes), None);
        assert!(!registry.leave(goes).unwrap());

        registry.start(id, Utc::now()).unwrap();
        assert!(registry.leave(stays).unwrap());
        assert_eq!(registry.lookup_by_player(&stays), Some(id));
        assert!(registry.rejoin(stays).unwrap());
        assert!(!registry.rejoin(PlayerId::random()).unwrap());
    }

    #[test]
    fn test_tick_ends_expired_matches() {
        let (registry, queue) = setup();
        let mut timed = settings();
        timed.win_condition = WinCondition::Timed;
        timed.time_limit_minutes = Some(5);

        let id = registry.create(ArenaId::new("a"), timed, pool()).unwrap();
        registry.create_team(id, "Alpha", Some(PlayerId::random())).unwrap();
        let start = Utc::now();
        registry.start(id, start).unwrap();

        assert!(registry.tick(start + Duration::minutes(4)).is_empty());
        assert_eq!(registry.tick(start + Duration::minutes(5)), vec![id]);
        assert!(registry.tick(start + Duration::minutes(6)).is_empty());

        let finished = queue
            .drain()
            .into_iter()
            .filter(|n| matches!(n, Notification::MatchFinished { winner: None, .. }))
            .count();
        assert_eq!(finished, 1);
    }

    #[test]
    fn test_progress_routed_by_player() {
        let (registry, _) = setup();
        let id = registry.create(ArenaId::new("a"), settings(), pool()).unwrap();
        let player = PlayerId::random();
        let team = registry.create_team(id, "Alpha", Some(player)).unwrap();
        registry.start(id, Utc::now()).unwrap();

        let goal = registry
            .inspect(id, |game| game.board().unwrap().goals()[0].id.clone())
            .unwrap();
        assert_eq!(
            registry.report_progress_for_player(player, &goal, Utc::now()),
            Ok(ProgressOutcome::Completed { team, won: false })
        );

        let stranger = PlayerId::random();
        assert_eq!(
            registry.report_progress_for_player(stranger, &goal, Utc::now()),
            Err(BingoError::PlayerNotInMatch(stranger))
        );
    }

    #[test]
    fn test_shutdown_finishes_running_matches() {
        let (registry, _) = setup();
        let running = registry.create(ArenaId::new("a"), settings(), pool()).unwrap();
        registry.create(ArenaId::new("b"), settings(), pool()).unwrap();
        registry.create_team(running, "Alpha", Some(PlayerId::random())).unwrap();
        registry.start(running, Utc::now()).unwrap();

        assert_eq!(registry.shutdown(Utc::now()), 1);
        assert_eq!(registry.inspect(running, Match::phase).unwrap(), MatchPhase::Finished);
        assert_eq!(
            registry.create(ArenaId::new("c"), settings(), pool()),
            Err(BingoError::ShuttingDown)
        );
    }
}
