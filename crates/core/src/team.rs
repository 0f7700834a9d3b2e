//! Teams: named groups of players sharing goal progress

use crate::error::{BingoError, Result};
use crate::ids::{PlayerId, TeamId};
use indexmap::IndexSet;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Allowed team name length, in characters
pub const TEAM_NAME_LEN: std::ops::RangeInclusive<usize> = 3..=14;

/// 24-bit RGB colour used for tab names and sign text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamColor(u32);

impl TeamColor {
    /// The sixteen named chat colours, handed out before random ones
    pub const NAMED: [TeamColor; 16] = [
        TeamColor(0xFF5555), // red
        TeamColor(0x5555FF), // blue
        TeamColor(0x55FF55), // green
        TeamColor(0xFFFF55), // yellow
        TeamColor(0xFF55FF), // light purple
        TeamColor(0x55FFFF), // aqua
        TeamColor(0xFFAA00), // gold
        TeamColor(0xAA00AA), // dark purple
        TeamColor(0x00AA00), // dark green
        TeamColor(0x0000AA), // dark blue
        TeamColor(0xAA0000), // dark red
        TeamColor(0x00AAAA), // dark aqua
        TeamColor(0xFFFFFF), // white
        TeamColor(0xAAAAAA), // gray
        TeamColor(0x555555), // dark gray
        TeamColor(0x000000), // black
    ];

    const MAX_RANDOM_ATTEMPTS: usize = 1000;

    pub fn from_rgb(rgb: u32) -> Self {
        Self(rgb & 0xFF_FFFF)
    }

    pub fn rgb(self) -> u32 {
        self.0
    }

    /// Pick a colour not in `taken`: first unused named colour, then random RGB.
    pub fn pick<R: Rng + ?Sized>(taken: &[TeamColor], rng: &mut R) -> Option<Self> {
        if let Some(color) = Self::NAMED.iter().find(|c| !taken.contains(*c)) {
            return Some(*color);
        }

        (0..Self::MAX_RANDOM_ATTEMPTS)
            .map(|_| Self::from_rgb(rng.gen_range(0..=0xFF_FFFF)))
            .find(|color| !taken.contains(color))
    }
}

impl fmt::Display for TeamColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06X}", self.0)
    }
}

/// Check length bounds; returns the trimmed name
pub fn validate_team_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if TEAM_NAME_LEN.contains(&trimmed.chars().count()) {
        Ok(trimmed.to_string())
    } else {
        Err(BingoError::InvalidTeamName(name.to_string()))
    }
}

/// A named group of players and their cumulative progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    id: TeamId,
    name: String,
    color: TeamColor,
    members: IndexSet<PlayerId>,
    completed: usize,
}

impl Team {
    pub fn new(id: TeamId, name: impl Into<String>, color: TeamColor) -> Self {
        Self {
            id,
            name: name.into(),
            color,
            members: IndexSet::new(),
            completed: 0,
        }
    }

    pub fn id(&self) -> TeamId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn color(&self) -> TeamColor {
        self.color
    }

    /// Members in join order
    pub fn members(&self) -> impl Iterator<Item = &PlayerId> {
        self.members.iter()
    }

    pub fn has_member(&self, player: &PlayerId) -> bool {
        self.members.contains(player)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Completed-goal count
    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Add a player, respecting the capacity limit.
    ///
    /// Returns `false` if the player was already a member. Membership in
    /// other teams is the caller's concern since a team only sees itself.
    pub fn add_member(&mut self, player: PlayerId, max_size: usize) -> Result<bool> {
        if self.members.contains(&player) {
            return Ok(false);
        }

        if self.members.len() >= max_size {
            return Err(BingoError::TeamFull { team: self.id, max: max_size });
        }

        self.members.insert(player);
        Ok(true)
    }

    /// Remove a player; an emptied team stays around for scoring.
    pub fn remove_member(&mut self, player: &PlayerId) -> bool {
        self.members.shift_remove(player)
    }

    pub(crate) fn record_completion(&mut self) {
        self.completed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_add_and_remove_members() {
        let mut team = Team::new(TeamId::new(1), "Creepers", TeamColor::NAMED[0]);
        let (a, b, c) = (PlayerId::random(), PlayerId::random(), PlayerId::random());

        assert!(team.add_member(a, 2).unwrap());
        assert!(!team.add_member(a, 2).unwrap());
        assert!(team.add_member(b, 2).unwrap());
        assert_eq!(team.add_member(c, 2), Err(BingoError::TeamFull { team: TeamId::new(1), max: 2 }));

        assert!(team.remove_member(&a));
        assert!(!team.remove_member(&a));
        assert!(team.remove_member(&b));
        assert!(team.is_empty());
        assert_eq!(team.name(), "Creepers");
    }

    #[test]
    fn test_members_keep_join_order() {
        let mut team = Team::new(TeamId::new(1), "Order", TeamColor::NAMED[1]);
        let players: Vec<_> = (0..4).map(|_| PlayerId::random()).collect();
        for player in &players {
            team.add_member(*player, 10).unwrap();
        }
        team.remove_member(&players[1]);

        let members: Vec<_> = team.members().copied().collect();
        assert_eq!(members, vec![players[0], players[2], players[3]]);
    }

    #[test]
    fn test_team_name_validation() {
        assert_eq!(validate_team_name("  Axolotls ").unwrap(), "Axolotls");
        assert!(validate_team_name("ab").is_err());
        assert!(validate_team_name("fifteen_chars__").is_err());
        assert!(validate_team_name("fourteen_chars").is_ok());
    }

    #[test]
    fn test_color_pick_prefers_named_then_random() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(TeamColor::pick(&[], &mut rng), Some(TeamColor::NAMED[0]));
        assert_eq!(TeamColor::pick(&TeamColor::NAMED[..1], &mut rng), Some(TeamColor::NAMED[1]));

        let color = TeamColor::pick(&TeamColor::NAMED, &mut rng).unwrap();
        assert!(!TeamColor::NAMED.contains(&color));
        assert_eq!(color.to_string().len(), 7);
    }
}
