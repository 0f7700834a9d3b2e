//! Outbound notifications for the presentation layer (signs, scoreboards, chat)

use crate::game::FinishReason;
use crate::goal::Goal;
use crate::ids::{ArenaId, GoalId, MatchId, PlayerId, SessionId, TeamId};
use crate::menu::MenuCloseReason;
use crate::team::TeamColor;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;

/// One line of the scoreboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Standing {
    pub team: TeamId,
    pub name: String,
    pub completed: usize,
}

/// A committed state change, described for whoever renders it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    MatchCreated {
        match_id: MatchId,
        arena: ArenaId,
    },
    TeamCreated {
        match_id: MatchId,
        team: TeamId,
        name: String,
        color: TeamColor,
    },
    PlayerJoined {
        match_id: MatchId,
        player: PlayerId,
        team: TeamId,
    },
    /// `removed` is false when the player only went offline mid-game
    PlayerLeft {
        match_id: MatchId,
        player: PlayerId,
        team: TeamId,
        removed: bool,
    },
    PlayerRejoined {
        match_id: MatchId,
        player: PlayerId,
        team: TeamId,
    },
    MatchStarted {
        match_id: MatchId,
        goals: Vec<Goal>,
    },
    GoalCompleted {
        match_id: MatchId,
        team: TeamId,
        player: PlayerId,
        goal: GoalId,
        progress: usize,
        total: usize,
    },
    ScoreboardChanged {
        match_id: MatchId,
        standings: Vec<Standing>,
    },
    MatchFinished {
        match_id: MatchId,
        winner: Option<TeamId>,
        reason: FinishReason,
    },
    MatchRemoved {
        match_id: MatchId,
    },
    MenuOpened {
        session: SessionId,
        player: PlayerId,
        lines: [String; 4],
    },
    MenuClosed {
        session: SessionId,
        player: PlayerId,
        reason: MenuCloseReason,
    },
}

impl Notification {
    /// The match this notification is about, if any
    pub fn match_id(&self) -> Option<MatchId> {
        match self {
            Self::MatchCreated { match_id, .. }
            | Self::TeamCreated { match_id, .. }
            | Self::PlayerJoined { match_id, .. }
            | Self::PlayerLeft { match_id, .. }
            | Self::PlayerRejoined { match_id, .. }
            | Self::MatchStarted { match_id, .. }
            | Self::GoalCompleted { match_id, .. }
            | Self::ScoreboardChanged { match_id, .. }
            | Self::MatchFinished { match_id, .. }
            | Self::MatchRemoved { match_id } => Some(*match_id),
            Self::MenuOpened { .. } | Self::MenuClosed { .. } => None,
        }
    }
}

/// Receiver of committed notifications.
///
/// Called while the originating match is locked, so implementations must not
/// block or call back into the registry.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

impl NotificationSink for crossbeam::channel::Sender<Notification> {
    fn notify(&self, notification: Notification) {
        if self.try_send(notification).is_err() {
            tracing::trace!("Notification receiver gone or full, dropping");
        }
    }
}

/// In-memory FIFO of notifications, drained by the host on its own thread
#[derive(Debug, Default)]
pub struct NotificationQueue {
    pending: Mutex<VecDeque<Notification>>,
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every pending notification in delivery order
    pub fn drain(&self) -> Vec<Notification> {
        self.pending.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

impl NotificationSink for NotificationQueue {
    fn notify(&self, notification: Notification) {
        self.pending.lock().push_back(notification);
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn notify(&self, _notification: Notification) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn removed() -> Notification {
        Notification::MatchRemoved { match_id: MatchId::random() }
    }

    #[test]
    fn test_queue_preserves_order() {
        let queue = NotificationQueue::new();
        let first = removed();
        let second = removed();
        queue.notify(first.clone());
        queue.notify(second.clone());

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.drain(), vec![first, second]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_channel_sink() {
        let (tx, rx) = crossbeam::channel::unbounded();
        let notification = removed();
        tx.notify(notification.clone());
        assert_eq!(rx.try_recv().unwrap(), notification);

        drop(rx);
        // Disconnected receivers are tolerated
        tx.notify(removed());
    }

    #[test]
    fn test_serialized_tag() {
        let id = MatchId::random();
        let json = serde_json::to_value(Notification::MatchRemoved { match_id: id }).unwrap();
        assert_eq!(json["type"], "match_removed");
        assert_eq!(Notification::MatchRemoved { match_id: id }.match_id(), Some(id));
    }
}
