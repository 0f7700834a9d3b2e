//! Races on the registry: arenas, player assignment and progress

mod common;

use bingo_core::{ArenaId, BingoError, MatchPhase, PlayerId, ProgressOutcome, WinCondition};
use chrono::Utc;
use common::*;
use std::sync::{Arc, Barrier};
use std::thread;

const THREADS: usize = 8;

#[test]
fn test_concurrent_register_admits_one_match() {
    let (registry, _) = registry();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                registry.create(ArenaId::new("contested"), settings(WinCondition::FullBoard, 3), pool(3))
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|handle| handle.join().unwrap()).collect();
    let winners: Vec<_> = results.iter().filter_map(|result| result.as_ref().ok()).collect();

    assert_eq!(winners.len(), 1);
    assert!(results
        .iter()
        .filter_map(|result| result.as_ref().err())
        .all(|e| *e == BingoError::ArenaBusy(ArenaId::new("contested"))));
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.lookup_by_arena(&ArenaId::new("contested")), Some(*winners[0]));
}

#[test]
fn test_concurrent_joins_bind_player_once() {
    let (registry, _) = registry();
    let player = PlayerId::random();
    let targets: Vec<_> = (0..THREADS)
        .map(|i| {
            let id = lobby(&registry, &format!("arena_{i}"), WinCondition::FullBoard, 3);
            let team = registry.create_team(id, &format!("Team {i}"), None).unwrap();
            (id, team)
        })
        .collect();

    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = targets
        .iter()
        .copied()
        .map(|(id, team)| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                registry.join(id, player, team)
            })
        })
        .collect();

    let joined = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .filter(|result| *result == Ok(true))
        .count();
    assert_eq!(joined, 1);

    let memberships = targets
        .iter()
        .filter(|(id, _)| registry.inspect(*id, |game| game.contains_player(&player)).unwrap())
        .count();
    assert_eq!(memberships, 1);
}

#[test]
fn test_concurrent_progress_counts_each_goal_once() {
    let (registry, _) = registry();
    let id = lobby(&registry, "arena", WinCondition::FullBoard, 6);
    let players: Vec<_> = (0..4).map(|_| PlayerId::random()).collect();
    let team = registry.create_team(id, "Swarm", Some(players[0])).unwrap();
    for player in &players[1..] {
        registry.join(id, *player, team).unwrap();
    }
    registry.start(id, Utc::now()).unwrap();
    let goals = Arc::new(board_goals(&registry, id));

    let barrier = Arc::new(Barrier::new(players.len()));
    let handles: Vec<_> = players
        .iter()
        .copied()
        .map(|player| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            let goals = Arc::clone(&goals);
            thread::spawn(move || {
                barrier.wait();
                goals
                    .iter()
                    .map(|goal| registry.report_progress(id, player, goal, Utc::now()))
                    .filter(|result| matches!(result, Ok(ProgressOutcome::Completed { .. })))
                    .count()
            })
        })
        .collect();

    let completed: usize = handles.into_iter().map(|handle| handle.join().unwrap()).sum();
    assert_eq!(completed, goals.len());

    registry
        .inspect(id, |game| {
            assert_eq!(game.phase(), MatchPhase::Finished);
            assert_eq!(game.winner(), Some(team));
            assert_eq!(game.team(team).unwrap().completed(), goals.len());
        })
        .unwrap();
}
