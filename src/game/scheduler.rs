//! Game Loop
//!
//! Owns the world and steps it once per tick. The async driver that calls
//! [`GameLoop::step`] on a timer lives in the network layer; this type is
//! synchronous so it can be stepped directly in tests and benchmarks.

use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::config::GameConfig;
use crate::core::rng::entropy_seed;
use crate::game::input::RequestQueue;
use crate::game::state::WorldState;
use crate::game::tick::{tick, TickResult};

/// Loop lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Created, not yet ticking.
    Idle,
    /// Ticking.
    Running,
    /// Stopped for good. No further ticks fire.
    Stopped,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Game loop errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoopError {
    /// Transition not allowed from the current state.
    #[error("Cannot move game loop from {from} to {to}")]
    InvalidTransition {
        /// Current state.
        from: LoopState,
        /// Requested state.
        to: LoopState,
    },

    /// `step` called outside `Running`.
    #[error("Game loop is {0}, not running")]
    NotRunning(LoopState),
}

/// The authoritative simulation loop.
pub struct GameLoop {
    state: LoopState,
    world: WorldState,
    config: GameConfig,
    queue: Arc<RequestQueue>,
}

impl GameLoop {
    /// Create an idle loop. Uses `config.rng_seed` or a fresh seed.
    pub fn new(config: GameConfig, queue: Arc<RequestQueue>) -> Self {
        let seed = config.rng_seed.unwrap_or_else(entropy_seed);
        let world = WorldState::from_config(&config, seed);

        Self {
            state: LoopState::Idle,
            world,
            config,
            queue,
        }
    }

    /// Idle -> Running.
    pub fn start(&mut self) -> Result<(), LoopError> {
        if self.state != LoopState::Idle {
            return Err(LoopError::InvalidTransition {
                from: self.state,
                to: LoopState::Running,
            });
        }
        self.state = LoopState::Running;
        info!("Game loop started (seed {})", self.world.rng_seed);
        Ok(())
    }

    /// Any state -> Stopped. Stopping twice is harmless.
    pub fn stop(&mut self) {
        if self.state != LoopState::Stopped {
            info!("Game loop stopped at tick {}", self.world.tick);
            self.state = LoopState::Stopped;
        }
    }

    /// Drain the request queue and run one tick.
    pub fn step(&mut self) -> Result<TickResult, LoopError> {
        if self.state != LoopState::Running {
            return Err(LoopError::NotRunning(self.state));
        }
        let requests = self.queue.drain();
        Ok(tick(&mut self.world, requests, &self.config))
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Read-only world access.
    pub fn world(&self) -> &WorldState {
        &self.world
    }

    /// Mutable world access for setup in tests and tools.
    pub fn world_mut(&mut self) -> &mut WorldState {
        &mut self.world
    }

    /// Simulation settings.
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Queue feeding this loop.
    pub fn queue(&self) -> &Arc<RequestQueue> {
        &self.queue
    }
}
