//! The Bingo plugin: owns the engine runtime between enable and disable

use crate::adapter::{translate, Command, HostEvent};
use crate::plugin::{Plugin, PluginContext, PluginInfo};
use anyhow::Context;
use bingo_core::{
    ArenaId, BingoConfig, BingoError, GoalPool, MatchId, MatchRegistry, MenuResolution,
    NotificationSink, ProgressOutcome, SessionId, SignMenuController, TeamId,
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;

/// Name of the config file inside the plugin data folder
pub const CONFIG_FILE: &str = "config.toml";

/// What a dispatched command did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Whether a known player came back online
    Rejoined(bool),
    /// Whether the player's match state changed
    Left(bool),
    Progress(ProgressOutcome),
    MenuOpened(SessionId),
    Menu(MenuResolution),
}

/// Result of one periodic tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub finished: Vec<MatchId>,
    pub expired_menus: usize,
}

/// Process-wide engine state, alive while the plugin is enabled
#[derive(Debug)]
pub struct BingoRuntime {
    config: BingoConfig,
    pool: Arc<GoalPool>,
    registry: Arc<MatchRegistry>,
    menus: SignMenuController,
}

impl BingoRuntime {
    pub fn new(config: BingoConfig, pool: GoalPool, sink: Arc<dyn NotificationSink>) -> Self {
        let pool = Arc::new(pool);
        let registry = Arc::new(MatchRegistry::new(sink));
        let menus = SignMenuController::new(Arc::clone(&registry), config.session_lifetime())
            .with_lobby(config.match_settings.clone(), Arc::clone(&pool));

        Self {
            config,
            pool,
            registry,
            menus,
        }
    }

    pub fn config(&self) -> &BingoConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<MatchRegistry> {
        &self.registry
    }

    pub fn menus(&self) -> &SignMenuController {
        &self.menus
    }

    /// Open a lobby in `arena` with the configured rules
    pub fn create_match(&self, arena: ArenaId) -> bingo_core::Result<MatchId> {
        self.registry
            .create(arena, self.config.match_settings.clone(), Arc::clone(&self.pool))
    }

    pub fn start(&self, arena: &ArenaId, now: DateTime<Utc>) -> bingo_core::Result<()> {
        let id = self.arena_match(arena)?;
        self.registry.start(id, now)
    }

    pub fn finish(&self, arena: &ArenaId, now: DateTime<Utc>) -> bingo_core::Result<Option<TeamId>> {
        let id = self.arena_match(arena)?;
        self.registry.finish(id, now)
    }

    /// Clear the arena's match so a new lobby can open
    pub fn reset(&self, arena: &ArenaId) -> bingo_core::Result<()> {
        let id = self.arena_match(arena)?;
        self.registry.unregister(id)
    }

    pub fn execute(&self, command: Command, now: DateTime<Utc>) -> bingo_core::Result<CommandOutcome> {
        match command {
            Command::Join { player, .. } => self.registry.rejoin(player).map(CommandOutcome::Rejoined),
            Command::Leave { player } => {
                self.menus.discard_player(&player);
                self.registry.leave(player).map(CommandOutcome::Left)
            }
            Command::Progress { player, goal } => self
                .registry
                .report_progress_for_player(player, &goal, now)
                .map(CommandOutcome::Progress),
            Command::MenuOpen { player, spec } => self.menus.open(player, spec, now).map(CommandOutcome::MenuOpened),
            Command::MenuSubmit { player, session, lines } => {
                if self.menus.session_for(&player) != Some(session) {
                    return Err(BingoError::UnknownSession(session));
                }
                self.menus.submit(session, &lines, now).map(CommandOutcome::Menu)
            }
        }
    }

    pub fn tick(&self, now: DateTime<Utc>) -> TickReport {
        TickReport {
            finished: self.registry.tick(now),
            expired_menus: self.menus.expire(now),
        }
    }

    pub fn shutdown(&self, now: DateTime<Utc>) {
        self.registry.shutdown(now);
    }

    fn arena_match(&self, arena: &ArenaId) -> bingo_core::Result<MatchId> {
        self.registry
            .lookup_by_arena(arena)
            .ok_or_else(|| BingoError::UnknownArena(arena.clone()))
    }
}

/// Host plugin wrapping [`BingoRuntime`]
pub struct BingoPlugin {
    sink: Arc<dyn NotificationSink>,
    runtime: RwLock<Option<Arc<BingoRuntime>>>,
}

impl BingoPlugin {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            sink,
            runtime: RwLock::new(None),
        }
    }

    /// The running engine, `None` unless enabled
    pub fn runtime(&self) -> Option<Arc<BingoRuntime>> {
        self.runtime.read().clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.runtime.read().is_some()
    }

    /// Translate and dispatch one host event. Returns `None` if the plugin is not enabled.
    pub fn handle(&self, event: HostEvent, now: DateTime<Utc>) -> Option<bingo_core::Result<CommandOutcome>> {
        let Some(runtime) = self.runtime() else {
            tracing::debug!("Dropping host event while disabled: {:?}", event);
            return None;
        };

        let command = translate(event);
        let player = command.player();
        let result = runtime.execute(command, now);

        if let Err(e) = &result {
            match e {
                BingoError::PlayerNotInMatch(_) | BingoError::InvalidTransition { .. } => {
                    tracing::debug!("Ignored event from {}: {}", player, e)
                }
                _ => tracing::warn!("Rejected event from {}: {}", player, e),
            }
        }
        Some(result)
    }

    /// Periodic host tick. Returns `None` if the plugin is not enabled.
    pub fn tick(&self, now: DateTime<Utc>) -> Option<TickReport> {
        let report = self.runtime()?.tick(now);
        if !report.finished.is_empty() || report.expired_menus > 0 {
            tracing::debug!(
                "Tick ended {} matches and expired {} menus",
                report.finished.len(),
                report.expired_menus
            );
        }
        Some(report)
    }

    fn load_config(ctx: &PluginContext) -> anyhow::Result<BingoConfig> {
        let path = ctx.data_folder.join(CONFIG_FILE);
        if path.exists() {
            return BingoConfig::load_from_file(&path)
                .with_context(|| format!("Failed to load {}", path.display()));
        }

        std::fs::create_dir_all(&ctx.data_folder)
            .with_context(|| format!("Failed to create {}", ctx.data_folder.display()))?;
        let config = BingoConfig::default();
        config.save_to_file(&path)?;
        tracing::info!("Wrote default configuration to {}", path.display());
        Ok(config)
    }
}

impl Plugin for BingoPlugin {
    fn info(&self) -> PluginInfo {
        PluginInfo::new("bingo", semver::Version::new(0, 1, 0))
            .with_description("Team Bingo: race to collect the items on your card")
            .with_author("Bingo Team")
    }

    fn on_enable(&self, ctx: &PluginContext) -> anyhow::Result<()> {
        let config = Self::load_config(ctx)?;
        if !crate::logging::init_tracing(&config.logging)? {
            tracing::debug!("Keeping the host's tracing subscriber");
        }
        let pool = config.load_goal_pool(&ctx.data_folder)?;
        tracing::info!(
            "Bingo enabled: {} goals, {} win, boards of {}",
            pool.len(),
            config.match_settings.win_condition,
            config.match_settings.board_size
        );

        let runtime = Arc::new(BingoRuntime::new(config, pool, Arc::clone(&self.sink)));
        *self.runtime.write() = Some(runtime);
        Ok(())
    }

    fn on_disable(&self) -> anyhow::Result<()> {
        if let Some(runtime) = self.runtime.write().take() {
            runtime.shutdown(Utc::now());
        }
        Ok(())
    }
}
