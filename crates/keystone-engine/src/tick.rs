//! Fixed-timestep tick loop.
//!
//! The [`TickLoop`] drives a [`Scene`] forward. Each tick:
//!
//! 1. The physics world advances by `fixed_dt`.
//! 2. Every active entity updates in slot order, its components in kind
//!    order with the spatial component last.
//! 3. Queued scene commands are applied (FIFO).
//! 4. The tick counter and the scene's frame counter advance.
//!
//! With a seeded guid generator the whole loop is deterministic: same
//! initial scene, same registered scripts, same results.
//!
//! # Example
//!
//! ```
//! use keystone_engine::prelude::*;
//!
//! let config = EngineConfig { fixed_dt: 1.0 / 30.0, ..EngineConfig::default() };
//! let mut tick_loop = TickLoop::new(Scene::new(config.clone()), &config).unwrap();
//! tick_loop.run_ticks(10);
//! assert_eq!(tick_loop.tick_count(), 10);
//! ```

use std::time::{Duration, Instant};

use tracing::trace;

use crate::config::{ConfigError, EngineConfig};
use crate::scene::Scene;

/// Timing diagnostics for the last tick.
#[derive(Debug, Clone, Default)]
pub struct TickDiagnostics {
    pub physics_time: Duration,
    pub update_time: Duration,
    pub command_apply_time: Duration,
    /// Physics + updates + command apply.
    pub total_time: Duration,
    /// Scene commands that took effect this tick.
    pub commands_applied: usize,
}

pub struct TickLoop {
    scene: Scene,
    tick_counter: u64,
    fixed_dt: f64,
    last_diagnostics: TickDiagnostics,
}

impl TickLoop {
    /// Drive `scene` with the timestep from `config`, installing the
    /// config's log filter unless a subscriber is already in place.
    pub fn new(scene: Scene, config: &EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        config.init_logging();
        Ok(Self {
            scene,
            tick_counter: 0,
            fixed_dt: config.fixed_dt,
            last_diagnostics: TickDiagnostics::default(),
        })
    }

    /// Execute one simulation tick.
    pub fn tick(&mut self) -> &TickDiagnostics {
        let tick_start = Instant::now();

        let physics_start = Instant::now();
        self.scene.physics_mut().step(self.fixed_dt);
        let physics_time = physics_start.elapsed();

        let update_start = Instant::now();
        self.scene.update_entities();
        let update_time = update_start.elapsed();

        let apply_start = Instant::now();
        let commands_applied = self.scene.flush_commands();
        let command_apply_time = apply_start.elapsed();

        self.scene.advance_frame();
        self.tick_counter += 1;
        self.last_diagnostics = TickDiagnostics {
            physics_time,
            update_time,
            command_apply_time,
            total_time: tick_start.elapsed(),
            commands_applied,
        };
        trace!(
            tick = self.tick_counter,
            commands_applied,
            entities = self.scene.entity_count(),
            "tick"
        );
        &self.last_diagnostics
    }

    /// Run `count` ticks. Returns the total number of commands applied.
    pub fn run_ticks(&mut self, count: u64) -> u64 {
        let mut total = 0u64;
        for _ in 0..count {
            total += self.tick().commands_applied as u64;
        }
        total
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    /// `tick_count * fixed_dt`, computed by multiplication to avoid drift.
    pub fn sim_time(&self) -> f64 {
        self.tick_counter as f64 * self.fixed_dt
    }

    pub fn fixed_dt(&self) -> f64 {
        self.fixed_dt
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn into_scene(self) -> Scene {
        self.scene
    }

    pub fn last_diagnostics(&self) -> &TickDiagnostics {
        &self.last_diagnostics
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
