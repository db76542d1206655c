//! Server Configuration
//!
//! Loads [`ServerConfig`] from a TOML file, applies environment overrides
//! and validates the result before the server starts.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::grid::WorldBounds;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "GRIDGRAB_CONFIG";

/// Configuration file used when [`CONFIG_PATH_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config/server.toml";

// =============================================================================
// SERVER CONFIG
// =============================================================================

/// Top-level server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path the configuration was loaded from.
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Listen address for WebSocket clients.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Capacity of each connection's outbound message queue.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,

    /// Simulation settings.
    #[serde(default)]
    pub game: GameConfig,
}

/// Simulation settings shared by the game loop and the sync layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    /// World width in grid units.
    #[serde(default = "default_world_width")]
    pub world_width: u32,

    /// World height in grid units.
    #[serde(default = "default_world_height")]
    pub world_height: u32,

    /// Cell size used for spawn alignment.
    #[serde(default = "default_grid_size")]
    pub grid_size: u32,

    /// Milliseconds between ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Distance moved per tick by a player with a pending direction.
    #[serde(default = "default_player_speed_per_tick")]
    pub player_speed_per_tick: u32,

    /// Broadcast a full snapshot every N ticks (0 disables).
    #[serde(default = "default_snapshot_interval_ticks")]
    pub snapshot_interval_ticks: u64,

    /// Collectible values are drawn from `1..=max_collectible_value`.
    #[serde(default = "default_max_collectible_value")]
    pub max_collectible_value: u32,

    /// Random placement attempts before falling back to a scan.
    #[serde(default = "default_spawn_attempts")]
    pub spawn_attempts: u32,

    /// Fixed RNG seed. A random seed is drawn when unset.
    #[serde(default)]
    pub rng_seed: Option<u64>,
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

fn default_max_connections() -> usize {
    256
}

fn default_outbound_buffer() -> usize {
    64
}

fn default_world_width() -> u32 {
    640
}

fn default_world_height() -> u32 {
    480
}

fn default_grid_size() -> u32 {
    10
}

fn default_tick_interval_ms() -> u64 {
    50 // 20 Hz
}

fn default_player_speed_per_tick() -> u32 {
    5
}

fn default_snapshot_interval_ticks() -> u64 {
    100 // every 5 seconds at 20 Hz
}

fn default_max_collectible_value() -> u32 {
    3
}

fn default_spawn_attempts() -> u32 {
    32
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            world_width: default_world_width(),
            world_height: default_world_height(),
            grid_size: default_grid_size(),
            tick_interval_ms: default_tick_interval_ms(),
            player_speed_per_tick: default_player_speed_per_tick(),
            snapshot_interval_ticks: default_snapshot_interval_ticks(),
            max_collectible_value: default_max_collectible_value(),
            spawn_attempts: default_spawn_attempts(),
            rng_seed: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            bind_addr: default_bind_addr(),
            max_connections: default_max_connections(),
            outbound_buffer: default_outbound_buffer(),
            game: GameConfig::default(),
        }
    }
}

impl GameConfig {
    /// World bounds derived from the configured dimensions.
    pub fn bounds(&self) -> WorldBounds {
        WorldBounds::new(
            self.world_width as i32,
            self.world_height as i32,
            self.grid_size as i32,
        )
    }

    /// Tick period.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Movement step as a signed grid distance.
    pub fn speed(&self) -> i32 {
        self.player_speed_per_tick as i32
    }

    /// Check the simulation settings for consistency.
    pub fn validate(&self) -> Result<()> {
        const MAX_EXTENT: u32 = 1 << 20;

        if self.world_width == 0 || self.world_height == 0 {
            anyhow::bail!("World dimensions must be positive");
        }
        if self.world_width > MAX_EXTENT || self.world_height > MAX_EXTENT {
            anyhow::bail!("World dimensions must not exceed {}", MAX_EXTENT);
        }
        if self.grid_size == 0 {
            anyhow::bail!("Grid size must be positive");
        }
        if self.grid_size > self.world_width || self.grid_size > self.world_height {
            anyhow::bail!(
                "Grid size {} does not fit a {}x{} world",
                self.grid_size,
                self.world_width,
                self.world_height
            );
        }
        if self.player_speed_per_tick == 0 {
            anyhow::bail!("Player speed must be positive");
        }
        // Players must be able to land exactly on every cell.
        if self.grid_size % self.player_speed_per_tick != 0 {
            anyhow::bail!(
                "Grid size {} must be a multiple of player speed {}",
                self.grid_size,
                self.player_speed_per_tick
            );
        }
        if !(5..=1000).contains(&self.tick_interval_ms) {
            anyhow::bail!("Tick interval must be between 5 and 1000 ms");
        }
        if self.max_collectible_value == 0 {
            anyhow::bail!("Collectible value must be positive");
        }
        Ok(())
    }
}

impl ServerConfig {
    /// Load configuration from file and environment variables.
    pub async fn load() -> Result<Self> {
        let config_path = env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut config = if config_path.exists() {
            let content = tokio::fs::read_to_string(&config_path)
                .await
                .with_context(|| {
                    format!("Failed to read config file: {}", config_path.display())
                })?;

            Self::from_toml(&content).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?
        } else {
            tracing::warn!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            Self::default()
        };

        config.config_path = config_path;
        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply `GRIDGRAB_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup. Unparseable values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("GRIDGRAB_BIND_ADDR") {
            match val.parse() {
                Ok(addr) => self.bind_addr = addr,
                Err(_) => tracing::warn!("Ignoring invalid GRIDGRAB_BIND_ADDR: {}", val),
            }
        }
        if let Some(val) = lookup("GRIDGRAB_MAX_CONNECTIONS") {
            if let Ok(max) = val.parse() {
                self.max_connections = max;
            }
        }
        if let Some(val) = lookup("GRIDGRAB_TICK_INTERVAL_MS") {
            if let Ok(ms) = val.parse() {
                self.game.tick_interval_ms = ms;
            }
        }
        if let Some(val) = lookup("GRIDGRAB_RNG_SEED") {
            if let Ok(seed) = val.parse() {
                self.game.rng_seed = Some(seed);
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            anyhow::bail!("Max connections must be positive");
        }
        if self.outbound_buffer == 0 {
            anyhow::bail!("Outbound buffer must be positive");
        }
        self.game.validate().context("Invalid [game] section")
    }
}
