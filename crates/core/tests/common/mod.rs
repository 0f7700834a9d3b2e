//! Shared fixtures for the engine integration tests

#![allow(dead_code)]

use bingo_core::{
    ArenaId, Difficulty, Goal, GoalId, GoalPool, MatchId, MatchRegistry, MatchSettings, NotificationQueue,
    WinCondition,
};
use std::sync::Arc;

/// Registry wired to an in-memory notification queue
pub fn registry() -> (Arc<MatchRegistry>, Arc<NotificationQueue>) {
    let queue = Arc::new(NotificationQueue::new());
    (Arc::new(MatchRegistry::new(queue.clone())), queue)
}

/// `count` medium-difficulty goals named `goal_0`, `goal_1`, ...
pub fn pool(count: usize) -> Arc<GoalPool> {
    Arc::new(GoalPool::new(
        (0..count).map(|i| Goal::new(format!("goal_{i}"), format!("Goal {i}"), 2)),
    ))
}

pub fn settings(condition: WinCondition, board_size: usize) -> MatchSettings {
    MatchSettings {
        win_condition: condition,
        board_size,
        difficulty: Difficulty::Medium,
        seed: Some(2024),
        ..MatchSettings::default()
    }
}

pub fn lobby(registry: &MatchRegistry, arena: &str, condition: WinCondition, board_size: usize) -> MatchId {
    registry
        .create(ArenaId::new(arena), settings(condition, board_size), pool(board_size.max(3)))
        .unwrap()
}

/// Goal ids in board order
pub fn board_goals(registry: &MatchRegistry, id: MatchId) -> Vec<GoalId> {
    registry
        .inspect(id, |game| {
            game.board()
                .map(|board| board.goals().iter().map(|goal| goal.id.clone()).collect())
                .unwrap_or_default()
        })
        .unwrap()
}
