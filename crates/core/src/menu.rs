//! Sign menus: short-lived text prompts that turn typed input into match commands

use crate::config::MatchSettings;
use crate::error::{BingoError, Result};
use crate::game::ProgressOutcome;
use crate::goal::GoalPool;
use crate::ids::{ArenaId, GoalId, MatchId, PlayerId, SessionId, TeamId};
use crate::notify::Notification;
use crate::registry::MatchRegistry;
use crate::team::{validate_team_name, Team};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Second sign line, shown under the input line
pub const INPUT_HINT: &str = "Enter above";

/// What a sign prompt is asking for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MenuSpec {
    /// Type the name of an existing team to join it
    TeamSelect { arena: ArenaId },
    /// Type a name to create a team and join it
    TeamCreate { arena: ArenaId },
    /// Type `yes` to claim a goal
    GoalConfirm { arena: ArenaId, goal: GoalId },
}

impl MenuSpec {
    pub fn arena(&self) -> &ArenaId {
        match self {
            Self::TeamSelect { arena } | Self::TeamCreate { arena } | Self::GoalConfirm { arena, .. } => arena,
        }
    }

    /// Initial sign text; the first line is left blank for input
    pub fn lines(&self) -> [String; 4] {
        let (prompt, detail) = match self {
            Self::TeamSelect { .. } => ("Team name".to_string(), String::new()),
            Self::TeamCreate { .. } => ("New team name".to_string(), String::new()),
            Self::GoalConfirm { goal, .. } => ("Type yes to claim".to_string(), goal.to_string()),
        };
        [String::new(), INPUT_HINT.to_string(), prompt, detail]
    }
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuCloseReason {
    Resolved,
    Failed,
    Cancelled,
    /// The player opened another menu
    Replaced,
    Expired,
    Disconnected,
}

/// Result of submitting a sign
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuResolution {
    Joined { match_id: MatchId, team: TeamId },
    TeamCreated { match_id: MatchId, team: TeamId },
    Progress { match_id: MatchId, outcome: ProgressOutcome },
    /// Goal confirmation answered with something other than `yes`
    Declined,
    /// Blank input; the sign is shown again and the session stays open
    Reprompt,
}

#[derive(Debug, Clone)]
struct MenuSession {
    player: PlayerId,
    spec: MenuSpec,
    opened_at: DateTime<Utc>,
}

/// Rules for lobbies opened by a team-create sign in an empty arena
#[derive(Debug, Clone)]
struct LobbyTemplate {
    settings: MatchSettings,
    pool: Arc<GoalPool>,
}

/// Tracks open sign menus, at most one per player
pub struct SignMenuController {
    registry: Arc<MatchRegistry>,
    sessions: DashMap<SessionId, MenuSession>,
    by_player: DashMap<PlayerId, SessionId>,
    lifetime: Duration,
    lobby: Option<LobbyTemplate>,
}

impl SignMenuController {
    pub fn new(registry: Arc<MatchRegistry>, lifetime: Duration) -> Self {
        Self {
            registry,
            sessions: DashMap::new(),
            by_player: DashMap::new(),
            lifetime,
            lobby: None,
        }
    }

    /// Let a submitted team-create sign open a lobby when its arena has no match.
    ///
    /// The lobby only exists once a team is created in it; opening, cancelling
    /// or letting a menu expire never touches the registry.
    pub fn with_lobby(mut self, settings: MatchSettings, pool: Arc<GoalPool>) -> Self {
        self.lobby = Some(LobbyTemplate { settings, pool });
        self
    }

    pub fn registry(&self) -> &Arc<MatchRegistry> {
        &self.registry
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// The player's open session, if any
    pub fn session_for(&self, player: &PlayerId) -> Option<SessionId> {
        self.by_player.get(player).map(|entry| *entry.value())
    }

    /// Open a menu, replacing any menu the player already has open
    pub fn open(&self, player: PlayerId, spec: MenuSpec, now: DateTime<Utc>) -> Result<SessionId> {
        if self.registry.is_closed() {
            return Err(BingoError::ShuttingDown);
        }

        let session = SessionId::random();
        let lines = spec.lines();
        self.sessions.insert(session, MenuSession { player, spec, opened_at: now });

        if let Some(previous) = self.by_player.insert(player, session) {
            if self.sessions.remove(&previous).is_some() {
                self.close(previous, player, MenuCloseReason::Replaced);
            }
        }

        self.registry.notify(Notification::MenuOpened { session, player, lines });
        tracing::debug!("Opened sign menu {} for {}", session, player);
        Ok(session)
    }

    /// Resolve a session with the sign's four lines; only the first carries input.
    ///
    /// Anything but blank input ends the session, whether or not the
    /// forwarded command succeeds.
    pub fn submit(&self, session: SessionId, input: &[String; 4], now: DateTime<Utc>) -> Result<MenuResolution> {
        let text = input[0].trim();

        if text.is_empty() {
            let mut open = self.sessions.get_mut(&session).ok_or(BingoError::UnknownSession(session))?;
            if !self.is_expired(&open, now) {
                open.opened_at = now;
                let (player, lines) = (open.player, open.spec.lines());
                drop(open);
                self.registry.notify(Notification::MenuOpened { session, player, lines });
                return Ok(MenuResolution::Reprompt);
            }
        }

        let (_, open) = self.sessions.remove(&session).ok_or(BingoError::UnknownSession(session))?;
        self.by_player.remove_if(&open.player, |_, current| *current == session);

        if self.is_expired(&open, now) {
            self.close(session, open.player, MenuCloseReason::Expired);
            return Err(BingoError::UnknownSession(session));
        }

        let result = self.forward(&open, text, now);
        let reason = match &result {
            Ok(_) => MenuCloseReason::Resolved,
            Err(e) => {
                tracing::debug!("Sign menu {} for {} failed: {}", session, open.player, e);
                MenuCloseReason::Failed
            }
        };
        self.close(session, open.player, reason);
        result
    }

    /// Close a session without side effects. Returns whether it was open.
    pub fn cancel(&self, session: SessionId) -> bool {
        let Some((_, open)) = self.sessions.remove(&session) else {
            return false;
        };
        self.by_player.remove_if(&open.player, |_, current| *current == session);
        self.close(session, open.player, MenuCloseReason::Cancelled);
        true
    }

    /// Drop the player's session when they leave the server
    pub fn discard_player(&self, player: &PlayerId) -> bool {
        let Some((_, session)) = self.by_player.remove(player) else {
            return false;
        };
        if self.sessions.remove(&session).is_none() {
            return false;
        }
        self.close(session, *player, MenuCloseReason::Disconnected);
        true
    }

    /// Discard every session older than the configured lifetime. Returns how many.
    pub fn expire(&self, now: DateTime<Utc>) -> usize {
        let stale: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|entry| self.is_expired(entry.value(), now))
            .map(|entry| *entry.key())
            .collect();

        stale
            .into_iter()
            .filter(|session| {
                let Some((_, open)) = self.sessions.remove_if(session, |_, open| self.is_expired(open, now)) else {
                    return false;
                };
                self.by_player.remove_if(&open.player, |_, current| current == session);
                self.close(*session, open.player, MenuCloseReason::Expired);
                true
            })
            .count()
    }

    fn is_expired(&self, session: &MenuSession, now: DateTime<Utc>) -> bool {
        now - session.opened_at >= self.lifetime
    }

    fn close(&self, session: SessionId, player: PlayerId, reason: MenuCloseReason) {
        self.registry.notify(Notification::MenuClosed { session, player, reason });
    }

    fn forward(&self, open: &MenuSession, text: &str, now: DateTime<Utc>) -> Result<MenuResolution> {
        let arena = open.spec.arena();
        let existing = || {
            self.registry
                .lookup_by_arena(arena)
                .ok_or_else(|| BingoError::UnknownArena(arena.clone()))
        };

        match &open.spec {
            MenuSpec::TeamCreate { .. } => self.create_team(open.player, arena, text),
            MenuSpec::TeamSelect { .. } => {
                let match_id = existing()?;
                let team = self
                    .registry
                    .inspect(match_id, |game| game.team_by_name(text).map(Team::id))?
                    .ok_or_else(|| BingoError::NoSuchTeam(text.to_string()))?;
                self.registry.join(match_id, open.player, team)?;
                Ok(MenuResolution::Joined { match_id, team })
            }
            MenuSpec::GoalConfirm { goal, .. } if text.eq_ignore_ascii_case("yes") => {
                let match_id = existing()?;
                let outcome = self.registry.report_progress(match_id, open.player, goal, now)?;
                Ok(MenuResolution::Progress { match_id, outcome })
            }
            MenuSpec::GoalConfirm { .. } => Ok(MenuResolution::Declined),
        }
    }

    /// Create a team, opening a lobby first if the arena is empty and a
    /// template is configured. A lobby opened here is removed again if the
    /// team can not be created.
    fn create_team(&self, player: PlayerId, arena: &ArenaId, name: &str) -> Result<MenuResolution> {
        let (match_id, opened) = match (self.registry.lookup_by_arena(arena), &self.lobby) {
            (Some(id), _) => (id, false),
            (None, None) => return Err(BingoError::UnknownArena(arena.clone())),
            (None, Some(lobby)) => {
                validate_team_name(name)?;
                match self
                    .registry
                    .create(arena.clone(), lobby.settings.clone(), Arc::clone(&lobby.pool))
                {
                    Ok(id) => (id, true),
                    Err(BingoError::ArenaBusy(_)) => {
                        let id = self
                            .registry
                            .lookup_by_arena(arena)
                            .ok_or_else(|| BingoError::UnknownArena(arena.clone()))?;
                        (id, false)
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        match self.registry.create_team(match_id, name, Some(player)) {
            Ok(team) => Ok(MenuResolution::TeamCreated { match_id, team }),
            Err(e) => {
                if opened && self.registry.inspect(match_id, |game| game.teams().count() == 0)? {
                    self.registry.unregister(match_id)?;
                }
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for SignMenuController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignMenuController")
            .field("sessions", &self.sessions.len())
            .field("lifetime", &self.lifetime)
            .field("opens_lobbies", &self.lobby.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goal::Goal;
    use crate::notify::NotificationQueue;

    struct Fixture {
        menus: SignMenuController,
        queue: Arc<NotificationQueue>,
        arena: ArenaId,
        match_id: MatchId,
    }

    fn fixture() -> Fixture {
        let queue = Arc::new(NotificationQueue::new());
        let registry = Arc::new(MatchRegistry::new(queue.clone()));
        let arena = ArenaId::new("lobby");
        let settings = MatchSettings { board_size: 2, seed: Some(3), ..MatchSettings::default() };
        let pool = Arc::new(GoalPool::new((0..4).map(|i| Goal::new(format!("g{i}"), "", 2))));
        let match_id = registry.create(arena.clone(), settings, pool).unwrap();

        Fixture {
            menus: SignMenuController::new(registry, Duration::seconds(30)),
            queue,
            arena,
            match_id,
        }
    }

    fn typed(text: &str) -> [String; 4] {
        [text.to_string(), INPUT_HINT.to_string(), String::new(), String::new()]
    }

    fn closes(queue: &NotificationQueue) -> Vec<MenuCloseReason> {
        queue
            .drain()
            .into_iter()
            .filter_map(|n| match n {
                Notification::MenuClosed { reason, .. } => Some(reason),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_create_then_select_team() {
        let f = fixture();
        let now = Utc::now();
        let (creator, joiner) = (PlayerId::random(), PlayerId::random());

        let session = f.menus.open(creator, MenuSpec::TeamCreate { arena: f.arena.clone() }, now).unwrap();
        let created = f.menus.submit(session, &typed("Pandas"), now).unwrap();
        let MenuResolution::TeamCreated { team, .. } = created else {
            panic!("unexpected resolution {created:?}");
        };
        assert!(f.menus.is_empty());

        let session = f.menus.open(joiner, MenuSpec::TeamSelect { arena: f.arena.clone() }, now).unwrap();
        assert_eq!(
            f.menus.submit(session, &typed("pandas"), now),
            Ok(MenuResolution::Joined { match_id: f.match_id, team })
        );
        assert_eq!(f.menus.registry().lookup_by_player(&joiner), Some(f.match_id));
    }

    #[test]
    fn test_blank_input_reprompts() {
        let f = fixture();
        let now = Utc::now();
        let player = PlayerId::random();
        let session = f.menus.open(player, MenuSpec::TeamCreate { arena: f.arena.clone() }, now).unwrap();

        assert_eq!(f.menus.submit(session, &typed("   "), now), Ok(MenuResolution::Reprompt));
        assert_eq!(f.menus.session_for(&player), Some(session));
        assert!(f.menus.submit(session, &typed("Otters"), now).is_ok());
    }

    #[test]
    fn test_failed_command_destroys_session() {
        let f = fixture();
        let now = Utc::now();
        let player = PlayerId::random();
        let session = f.menus.open(player, MenuSpec::TeamSelect { arena: f.arena.clone() }, now).unwrap();

        assert_eq!(
            f.menus.submit(session, &typed("Ghosts"), now),
            Err(BingoError::NoSuchTeam("Ghosts".to_string()))
        );
        assert_eq!(f.menus.submit(session, &typed("Ghosts"), now), Err(BingoError::UnknownSession(session)));
        assert_eq!(f.menus.registry().lookup_by_player(&player), None);
        assert_eq!(closes(&f.queue), vec![MenuCloseReason::Failed]);
    }

    #[test]
    fn test_open_replaces_previous_session() {
        let f = fixture();
        let now = Utc::now();
        let player = PlayerId::random();
        let first = f.menus.open(player, MenuSpec::TeamSelect { arena: f.arena.clone() }, now).unwrap();
        let second = f.menus.open(player, MenuSpec::TeamCreate { arena: f.arena.clone() }, now).unwrap();

        assert_eq!(f.menus.len(), 1);
        assert_eq!(f.menus.session_for(&player), Some(second));
        assert!(!f.menus.cancel(first));
        assert!(f.menus.cancel(second));
        assert_eq!(closes(&f.queue), vec![MenuCloseReason::Replaced, MenuCloseReason::Cancelled]);
    }

    #[test]
    fn test_expired_sessions_have_no_effect() {
        let f = fixture();
        let now = Utc::now();
        let (late, idle) = (PlayerId::random(), PlayerId::random());
        let session = f.menus.open(late, MenuSpec::TeamCreate { arena: f.arena.clone() }, now).unwrap();
        f.menus.open(idle, MenuSpec::TeamCreate { arena: f.arena.clone() }, now).unwrap();

        let later = now + Duration::seconds(31);
        assert_eq!(f.menus.submit(session, &typed("Latecomers"), later), Err(BingoError::UnknownSession(session)));
        assert_eq!(f.menus.expire(later), 1);
        assert!(f.menus.is_empty());

        let teams = f.menus.registry().inspect(f.match_id, |game| game.teams().count()).unwrap();
        assert_eq!(teams, 0);
    }

    #[test]
    fn test_goal_confirm() {
        let f = fixture();
        let now = Utc::now();
        let player = PlayerId::random();
        let registry = f.menus.registry();
        registry.create_team(f.match_id, "Solo", Some(player)).unwrap();
        registry.start(f.match_id, now).unwrap();
        let goal = registry
            .inspect(f.match_id, |game| game.board().unwrap().goals()[0].id.clone())
            .unwrap();

        let spec = MenuSpec::GoalConfirm { arena: f.arena.clone(), goal: goal.clone() };
        let session = f.menus.open(player, spec.clone(), now).unwrap();
        assert_eq!(f.menus.submit(session, &typed("no"), now), Ok(MenuResolution::Declined));

        let session = f.menus.open(player, spec, now).unwrap();
        let resolution = f.menus.submit(session, &typed("YES"), now).unwrap();
        assert!(matches!(
            resolution,
            MenuResolution::Progress { outcome: ProgressOutcome::Completed { .. }, .. }
        ));
    }

    #[test]
    fn test_discard_player() {
        let f = fixture();
        let player = PlayerId::random();
        f.menus.open(player, MenuSpec::TeamSelect { arena: f.arena.clone() }, Utc::now()).unwrap();

        assert!(f.menus.discard_player(&player));
        assert!(!f.menus.discard_player(&player));
        assert!(f.menus.is_empty());
    }

    fn on_demand() -> SignMenuController {
        let registry = Arc::new(MatchRegistry::new(Arc::new(NotificationQueue::new())));
        let settings = MatchSettings { board_size: 2, seed: Some(3), ..MatchSettings::default() };
        let pool = Arc::new(GoalPool::new((0..4).map(|i| Goal::new(format!("g{i}"), "", 2))));
        SignMenuController::new(registry, Duration::seconds(30)).with_lobby(settings, pool)
    }

    #[test]
    fn test_unresolved_menus_open_no_lobby() {
        let menus = on_demand();
        let arena = ArenaId::new("fresh");
        let now = Utc::now();
        let (a, b) = (PlayerId::random(), PlayerId::random());

        let session = menus.open(a, MenuSpec::TeamSelect { arena: arena.clone() }, now).unwrap();
        assert!(menus.cancel(session));
        menus.open(b, MenuSpec::TeamCreate { arena: arena.clone() }, now).unwrap();
        assert_eq!(menus.expire(now + Duration::seconds(31)), 1);

        assert_eq!(menus.registry().lookup_by_arena(&arena), None);
        assert!(menus.registry().is_empty());
    }

    #[test]
    fn test_team_create_opens_lobby_on_submit() {
        let menus = on_demand();
        let arena = ArenaId::new("fresh");
        let now = Utc::now();
        let (creator, joiner) = (PlayerId::random(), PlayerId::random());

        // Nothing to select from yet
        let session = menus.open(joiner, MenuSpec::TeamSelect { arena: arena.clone() }, now).unwrap();
        assert_eq!(menus.submit(session, &typed("Foxes"), now), Err(BingoError::UnknownArena(arena.clone())));

        // A rejected name leaves the arena empty
        let session = menus.open(creator, MenuSpec::TeamCreate { arena: arena.clone() }, now).unwrap();
        assert_eq!(
            menus.submit(session, &typed("Fx"), now),
            Err(BingoError::InvalidTeamName("Fx".to_string()))
        );
        assert!(menus.registry().is_empty());

        let session = menus.open(creator, MenuSpec::TeamCreate { arena: arena.clone() }, now).unwrap();
        let MenuResolution::TeamCreated { match_id, .. } = menus.submit(session, &typed("Foxes"), now).unwrap() else {
            panic!("team not created");
        };
        assert_eq!(menus.registry().lookup_by_arena(&arena), Some(match_id));
        assert_eq!(menus.registry().lookup_by_player(&creator), Some(match_id));
    }

    #[test]
    fn test_failed_team_create_removes_new_lobby() {
        let menus = on_demand();
        let busy = PlayerId::random();
        let elsewhere = menus.registry().create(
            ArenaId::new("other"),
            MatchSettings { board_size: 2, ..MatchSettings::default() },
            Arc::new(GoalPool::builtin()),
        );
        menus.registry().create_team(elsewhere.unwrap(), "Owls", Some(busy)).unwrap();

        let arena = ArenaId::new("fresh");
        let session = menus.open(busy, MenuSpec::TeamCreate { arena: arena.clone() }, Utc::now()).unwrap();
        assert_eq!(
            menus.submit(session, &typed("Foxes"), Utc::now()),
            Err(BingoError::PlayerAlreadyAssigned(busy))
        );
        assert_eq!(menus.registry().lookup_by_arena(&arena), None);
        assert_eq!(menus.registry().len(), 1);
    }
}
