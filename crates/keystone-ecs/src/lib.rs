//! Keystone ECS -- entity composition core with tag-dispatched persistence.
//!
//! An [`Entity`](entity::Entity) owns at most one component per
//! [`ComponentKind`](component::ComponentKind) in a fixed slot table. Every
//! entity carries a [`Spatial`](components::Spatial) for its whole life.
//! Components reach their owner and the shared engine services through a
//! [`ComponentLink`](component::ComponentLink) whose handles are cleared when
//! the component is detached.
//!
//! Entities persist to a little-endian binary stream. Each component is
//! written as its kind's tag followed by a length-prefixed payload, so loaders
//! can skip tags they do not know.
//!
//! # Quick Start
//!
//! ```
//! use keystone_ecs::prelude::*;
//!
//! let mut entity = Entity::new(EntityId::new(0, 0), "a1", Services::headless(), DirtySignal::new());
//! entity.attach::<Light>().intensity = 4.0;
//! entity.spatial_mut().unwrap().set_translation(glam::Vec3::new(1.0, 2.0, 3.0));
//!
//! let bytes = entity.save_to_vec().unwrap();
//!
//! let mut copy = Entity::new(EntityId::new(1, 0), "b2", Services::headless(), DirtySignal::new());
//! let report = copy.load_from_slice(&bytes).unwrap();
//! assert!(report.is_clean());
//! assert_eq!(copy.guid(), "a1");
//! assert_eq!(copy.get::<Light>().unwrap().intensity, 4.0);
//! ```

#![deny(unsafe_code)]

pub mod component;
pub mod components;
pub mod entity;
pub mod persist;
pub mod registry;
pub mod resources;
pub mod services;
pub mod stream;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by entity persistence.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// The entity was destroyed and can no longer be saved or loaded.
    #[error("entity {entity} is destroyed")]
    EntityDestroyed { entity: entity::EntityId },

    /// The entity header could not be written.
    #[error("failed to save entity '{guid}': {source}")]
    Save {
        guid: String,
        #[source]
        source: stream::StreamError,
    },

    /// A component payload could not be written.
    #[error("failed to save {kind} of entity '{guid}': {source}")]
    ComponentSave {
        guid: String,
        kind: component::ComponentKind,
        #[source]
        source: stream::StreamError,
    },

    /// The entity record is malformed. The target entity was left unchanged.
    #[error("failed to load entity '{guid}': {source}")]
    Load {
        guid: String,
        #[source]
        source: stream::StreamError,
    },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::component::{
        Component, ComponentKind, ComponentLink, ComponentType, FrameContext,
    };
    pub use crate::components::{
        Camera, Collider, ColliderDesc, ColliderShape, Environment, EnvironmentKind, Joint,
        JointDesc, Light, LightKind, LineRenderer, LineSegment, MeshCollider, MeshData,
        MeshRenderer, Projection, RigidBody, RigidBodySettings, Script, Spatial, Transform,
    };
    pub use crate::entity::{Entity, EntityId, DEFAULT_ENTITY_NAME};
    pub use crate::persist::{FailedComponent, LoadReport, SkippedComponent};
    pub use crate::registry::ComponentRegistry;
    pub use crate::resources::{
        Material, Mesh, RenderDevice, Resource, ResourcePool, Shader, Texture, TextureKind,
    };
    pub use crate::services::{
        BodyHandle, ColliderHandle, CommandQueue, DirtySignal, JointHandle, NullPhysics,
        NullScripts, PhysicsEngine, PhysicsRelease, SceneCommand, ScriptContext, ScriptEngine,
        ScriptHandle, Services,
    };
    pub use crate::stream::{SceneReader, SceneWriter, StreamError};
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
