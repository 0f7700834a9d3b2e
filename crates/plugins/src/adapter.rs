//! Translation of raw host callbacks into engine commands

use bingo_core::{ArenaId, GoalId, MenuSpec, PlayerId, SessionId};
use serde::{Deserialize, Serialize};

/// How a player obtained an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemSource {
    Pickup,
    Craft,
    FurnaceExtract,
}

/// Which sign a player clicked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignKind {
    TeamSelect,
    TeamCreate,
    GoalConfirm { goal: GoalId },
}

/// Events raised by the game server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    PlayerJoin { player: PlayerId, world: ArenaId },
    PlayerQuit { player: PlayerId },
    ItemAcquired { player: PlayerId, item: GoalId, source: ItemSource },
    SignInteract { player: PlayerId, world: ArenaId, sign: SignKind },
    SignEdit { player: PlayerId, session: SessionId, lines: [String; 4] },
}

/// Engine-level command produced from one host event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Player is on the server again, in `arena`
    Join { player: PlayerId, arena: ArenaId },
    Leave { player: PlayerId },
    Progress { player: PlayerId, goal: GoalId },
    MenuOpen { player: PlayerId, spec: MenuSpec },
    MenuSubmit { player: PlayerId, session: SessionId, lines: [String; 4] },
}

impl Command {
    pub fn player(&self) -> PlayerId {
        match self {
            Self::Join { player, .. }
            | Self::Leave { player }
            | Self::Progress { player, .. }
            | Self::MenuOpen { player, .. }
            | Self::MenuSubmit { player, .. } => *player,
        }
    }
}

/// Map a host event to exactly one command
pub fn translate(event: HostEvent) -> Command {
    match event {
        HostEvent::PlayerJoin { player, world } => Command::Join { player, arena: world },
        HostEvent::PlayerQuit { player } => Command::Leave { player },
        HostEvent::ItemAcquired { player, item, .. } => Command::Progress { player, goal: item },
        HostEvent::SignInteract { player, world, sign } => {
            let spec = match sign {
                SignKind::TeamSelect => MenuSpec::TeamSelect { arena: world },
                SignKind::TeamCreate => MenuSpec::TeamCreate { arena: world },
                SignKind::GoalConfirm { goal } => MenuSpec::GoalConfirm { arena: world, goal },
            };
            Command::MenuOpen { player, spec }
        }
        HostEvent::SignEdit { player, session, lines } => Command::MenuSubmit { player, session, lines },
    }
}
