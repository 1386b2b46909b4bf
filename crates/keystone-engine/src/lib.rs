//! Keystone Engine -- scene ownership, persistence and the tick loop.
//!
//! This crate builds on [`keystone_ecs`] to provide what an entity needs from
//! its surroundings: a [`Scene`](scene::Scene) that creates, owns and
//! destroys entities, a deterministic built-in physics world, a script host,
//! checksummed scene files, and a fixed-timestep tick loop.
//!
//! # Quick Start
//!
//! ```
//! use keystone_engine::prelude::*;
//!
//! fn rise(ctx: &mut ScriptContext<'_>) {
//!     ctx.transform.translation.y += 1.0;
//! }
//!
//! let config = EngineConfig { guid_seed: Some(7), ..EngineConfig::default() };
//! let mut scene = Scene::new(config.clone());
//! scene.scripts_mut().register("rise", rise);
//!
//! let balloon = scene.create_named_entity("Balloon");
//! scene.get_mut(balloon).unwrap().attach::<Script>().set_path("rise");
//!
//! let mut tick_loop = TickLoop::new(scene, &config).unwrap();
//! tick_loop.run_ticks(3);
//!
//! let y = tick_loop.scene().get(balloon).unwrap().spatial().unwrap().translation().y;
//! assert_eq!(y, 3.0);
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod guid;
pub mod logging;
pub mod physics;
pub mod pool;
pub mod scene;
pub mod scripting;
pub mod tick;

/// Re-export the ECS crate for convenience.
pub use keystone_ecs;

/// Convenience re-exports for common engine usage.
pub mod prelude {
    pub use keystone_ecs::prelude::*;

    pub use crate::config::{ConfigError, EngineConfig};
    pub use crate::guid::GuidGenerator;
    pub use crate::logging::init_logging;
    pub use crate::physics::{PhysicsBody, PhysicsCollider, PhysicsJoint, PhysicsWorld};
    pub use crate::pool::EntityPool;
    pub use crate::scene::{Scene, SceneError, SceneLoadReport, SCENE_MAGIC, SCENE_VERSION};
    pub use crate::scripting::{ScriptFn, ScriptHost};
    pub use crate::tick::{TickDiagnostics, TickLoop};
}
