//! Goal definitions, the configured goal pool and board drawing

use crate::config::{ConfigError, ConfigFormat};
use crate::error::{BingoError, Result};
use crate::ids::GoalId;
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Lowest and highest difficulty score a goal can carry
pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 5;

/// A single task on the board: obtain the named item
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Goal {
    #[serde(alias = "name")]
    pub id: GoalId,
    #[serde(default)]
    pub description: String,
    /// How hard the goal is, 1 (trivial) to 5 (very rare)
    pub score: u8,
}

impl Goal {
    pub fn new(id: impl AsRef<str>, description: impl Into<String>, score: u8) -> Self {
        Self {
            id: GoalId::new(id),
            description: description.into(),
            score: score.clamp(MIN_SCORE, MAX_SCORE),
        }
    }

    /// Text shown on signs and scoreboards
    pub fn display_name(&self) -> &str {
        if self.description.is_empty() {
            self.id.as_str()
        } else {
            &self.description
        }
    }
}

/// Board difficulty, expressed as sampling weights per goal score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Extreme,
}

impl Difficulty {
    /// Relative weight of drawing a goal with the given score
    pub fn weight(self, score: u8) -> u32 {
        let table: [u32; 5] = match self {
            Self::Easy => [80, 40, 5, 0, 0],
            Self::Medium => [15, 60, 45, 5, 0],
            Self::Hard => [2, 10, 50, 30, 3],
            Self::Extreme => [0, 0, 40, 60, 10],
        };

        match score {
            MIN_SCORE..=MAX_SCORE => table[usize::from(score - MIN_SCORE)],
            _ => 0,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PoolFile {
    List(Vec<Goal>),
    Table { goals: Vec<Goal> },
}

#[derive(Serialize)]
struct PoolFileOut<'a> {
    goals: &'a [Goal],
}

/// Every goal a board may be drawn from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoalPool {
    goals: Vec<Goal>,
}

impl GoalPool {
    /// Build a pool, dropping repeated ids (the first definition wins)
    pub fn new(goals: impl IntoIterator<Item = Goal>) -> Self {
        let mut seen = HashSet::new();
        let goals = goals
            .into_iter()
            .filter(|goal| seen.insert(goal.id.clone()))
            .map(|mut goal| {
                goal.score = goal.score.clamp(MIN_SCORE, MAX_SCORE);
                goal
            })
            .collect();

        Self { goals }
    }

    /// Load a pool from a JSON or TOML file.
    ///
    /// JSON files may hold a bare array of goals; both formats accept a
    /// top-level `goals` list.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> std::result::Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileNotFound(format!("{}: {}", path.display(), e)))?;

        let goals = match ConfigFormat::from_extension(path).parse::<PoolFile>(&content)? {
            PoolFile::List(goals) | PoolFile::Table { goals } => goals,
        };

        tracing::info!("Loaded {} goals from {}", goals.len(), path.display());
        Ok(Self::new(goals))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> std::result::Result<(), ConfigError> {
        let path = path.as_ref();
        let content = ConfigFormat::from_extension(path).render(&PoolFileOut { goals: &self.goals })?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::FileNotFound(format!("{}: {}", path.display(), e)))
    }

    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    pub fn len(&self) -> usize {
        self.goals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.goals.is_empty()
    }

    pub fn get(&self, id: &GoalId) -> Option<&Goal> {
        self.goals.iter().find(|goal| &goal.id == id)
    }

    /// Number of goals that can be drawn at the given difficulty
    pub fn eligible_count(&self, difficulty: Difficulty) -> usize {
        self.goals
            .iter()
            .filter(|goal| difficulty.weight(goal.score) > 0)
            .count()
    }

    /// Draw `size` distinct goals by weighted sampling without replacement,
    /// then shuffle them into board order.
    pub fn draw<R: Rng + ?Sized>(&self, size: usize, difficulty: Difficulty, rng: &mut R) -> Result<Vec<Goal>> {
        let mut candidates: Vec<(&Goal, u32)> = self
            .goals
            .iter()
            .map(|goal| (goal, difficulty.weight(goal.score)))
            .filter(|(_, weight)| *weight > 0)
            .collect();

        let insufficient = |available| BingoError::InsufficientGoals { required: size, available };
        if candidates.len() < size {
            return Err(insufficient(candidates.len()));
        }

        let mut drawn = Vec::with_capacity(size);
        while drawn.len() < size {
            let dist = WeightedIndex::new(candidates.iter().map(|(_, weight)| *weight))
                .map_err(|_| insufficient(drawn.len() + candidates.len()))?;
            let (goal, _) = candidates.swap_remove(dist.sample(rng));
            drawn.push(goal.clone());
        }

        drawn.shuffle(rng);
        Ok(drawn)
    }

    /// The pool shipped with the plugin
    pub fn builtin() -> Self {
        const BUILTIN: &[(&str, &str, u8)] = &[
            ("oak_log", "Oak Log", 1),
            ("cobblestone", "Cobblestone", 1),
            ("dirt", "Dirt", 1),
            ("sand", "Sand", 1),
            ("wheat_seeds", "Wheat Seeds", 1),
            ("stick", "Stick", 1),
            ("crafting_table", "Crafting Table", 1),
            ("torch", "Torch", 1),
            ("gravel", "Gravel", 1),
            ("white_wool", "White Wool", 1),
            ("flint", "Flint", 2),
            ("coal", "Coal", 2),
            ("iron_ingot", "Iron Ingot", 2),
            ("bread", "Bread", 2),
            ("furnace", "Furnace", 2),
            ("glass", "Glass", 2),
            ("bone", "Bone", 2),
            ("string", "String", 2),
            ("sugar_cane", "Sugar Cane", 2),
            ("shears", "Shears", 2),
            ("bucket", "Bucket", 2),
            ("copper_ingot", "Copper Ingot", 2),
            ("gold_ingot", "Gold Ingot", 3),
            ("redstone", "Redstone Dust", 3),
            ("lapis_lazuli", "Lapis Lazuli", 3),
            ("bow", "Bow", 3),
            ("compass", "Compass", 3),
            ("clock", "Clock", 3),
            ("book", "Book", 3),
            ("pumpkin_pie", "Pumpkin Pie", 3),
            ("cake", "Cake", 3),
            ("slime_ball", "Slimeball", 3),
            ("gunpowder", "Gunpowder", 3),
            ("spider_eye", "Spider Eye", 3),
            ("iron_pickaxe", "Iron Pickaxe", 3),
            ("golden_apple", "Golden Apple", 3),
            ("diamond", "Diamond", 4),
            ("obsidian", "Obsidian", 4),
            ("ender_pearl", "Ender Pearl", 4),
            ("blaze_rod", "Blaze Rod", 4),
            ("emerald", "Emerald", 4),
            ("amethyst_shard", "Amethyst Shard", 4),
            ("nether_wart", "Nether Wart", 4),
            ("quartz", "Nether Quartz", 4),
            ("magma_cream", "Magma Cream", 4),
            ("glowstone_dust", "Glowstone Dust", 4),
            ("jukebox", "Jukebox", 4),
            ("diamond_sword", "Diamond Sword", 4),
            ("rabbit_foot", "Rabbit's Foot", 4),
            ("enchanting_table", "Enchanting Table", 4),
            ("ghast_tear", "Ghast Tear", 5),
            ("ender_eye", "Eye of Ender", 5),
            ("wither_skeleton_skull", "Wither Skeleton Skull", 5),
            ("netherite_scrap", "Netherite Scrap", 5),
            ("shulker_shell", "Shulker Shell", 5),
            ("heart_of_the_sea", "Heart of the Sea", 5),
            ("trident", "Trident", 5),
            ("totem_of_undying", "Totem of Undying", 5),
            ("music_disc_cat", "Music Disc (cat)", 5),
            ("sponge", "Sponge", 5),
        ];

        Self::new(
            BUILTIN
                .iter()
                .map(|(key, description, score)| Goal::new(key, *description, *score)),
        )
    }
}
