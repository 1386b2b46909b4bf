//! Shared engine services injected into every attached component.
//!
//! Components never own their collaborators. The registry hands each one a
//! [`ComponentLink`](crate::component::ComponentLink) carrying a clone of the
//! entity's [`Services`], which are cheap reference-counted handles to:
//!
//! - the render device and the mesh/material/texture/shader resource pools,
//! - the physics engine ([`PhysicsEngine`]) and script engine ([`ScriptEngine`]),
//! - the scene's deferred [`CommandQueue`].
//!
//! Everything here is single-threaded (`Rc`/`RefCell`). The outer frame loop
//! serializes all access; no locking is added.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use glam::Vec3;

use crate::component::ComponentKind;
use crate::components::{ColliderDesc, JointDesc, RigidBodySettings, Transform};
use crate::entity::EntityId;
use crate::resources::{Material, Mesh, RenderDevice, ResourcePool, Shader, Texture};

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// Opaque handle to a physics body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle(pub u64);

/// Opaque handle to one registered collision shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColliderHandle(pub u64);

/// Opaque handle to a physics joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JointHandle(pub u64);

/// Opaque handle to a resolved script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScriptHandle(pub u32);

// ---------------------------------------------------------------------------
// PhysicsEngine
// ---------------------------------------------------------------------------

/// Physics service consumed by the rigid body, collider and joint components.
///
/// The core never inspects the engine's internals; it only registers and
/// unregisters bodies, colliders and joints and reads body positions back.
pub trait PhysicsEngine {
    /// Create a body for `owner` at `translation`.
    fn add_body(
        &mut self,
        owner: EntityId,
        settings: &RigidBodySettings,
        translation: Vec3,
    ) -> BodyHandle;

    /// Remove a body. Unknown handles are ignored.
    fn remove_body(&mut self, body: BodyHandle);

    /// Teleport a body (used for kinematic bodies every frame).
    fn set_body_translation(&mut self, body: BodyHandle, translation: Vec3);

    /// Current body position, or `None` for unknown handles.
    fn body_translation(&self, body: BodyHandle) -> Option<Vec3>;

    /// Add a collision shape to `owner`. An entity may carry several
    /// shapes; each is owned by the component that added it.
    fn add_collider(&mut self, owner: EntityId, collider: &ColliderDesc) -> ColliderHandle;

    /// Remove one collision shape. Unknown handles are ignored.
    fn remove_collider(&mut self, collider: ColliderHandle);

    /// Create a joint anchored on `owner`.
    fn add_joint(&mut self, owner: EntityId, joint: &JointDesc) -> JointHandle;

    /// Remove a joint. Unknown handles are ignored.
    fn remove_joint(&mut self, joint: JointHandle);
}

/// Physics engine that accepts every registration and simulates nothing.
#[derive(Debug, Default)]
pub struct NullPhysics {
    next_handle: u64,
}

impl PhysicsEngine for NullPhysics {
    fn add_body(&mut self, _: EntityId, _: &RigidBodySettings, _: Vec3) -> BodyHandle {
        self.next_handle += 1;
        BodyHandle(self.next_handle)
    }

    fn remove_body(&mut self, _: BodyHandle) {}

    fn set_body_translation(&mut self, _: BodyHandle, _: Vec3) {}

    fn body_translation(&self, _: BodyHandle) -> Option<Vec3> {
        None
    }

    fn add_collider(&mut self, _: EntityId, _: &ColliderDesc) -> ColliderHandle {
        self.next_handle += 1;
        ColliderHandle(self.next_handle)
    }

    fn remove_collider(&mut self, _: ColliderHandle) {}

    fn add_joint(&mut self, _: EntityId, _: &JointDesc) -> JointHandle {
        self.next_handle += 1;
        JointHandle(self.next_handle)
    }

    fn remove_joint(&mut self, _: JointHandle) {}
}

/// A physics registration to undo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysicsRelease {
    Body(BodyHandle),
    Collider(ColliderHandle),
    Joint(JointHandle),
}

impl PhysicsRelease {
    pub fn apply(self, engine: &mut dyn PhysicsEngine) {
        match self {
            PhysicsRelease::Body(body) => engine.remove_body(body),
            PhysicsRelease::Collider(collider) => engine.remove_collider(collider),
            PhysicsRelease::Joint(joint) => engine.remove_joint(joint),
        }
    }
}

// ---------------------------------------------------------------------------
// ScriptEngine
// ---------------------------------------------------------------------------

/// What a running script can see and touch during its update.
pub struct ScriptContext<'a> {
    /// The entity running the script, `None` if it was torn down.
    pub entity: Option<EntityId>,
    /// The entity's working transform for this frame.
    pub transform: &'a mut Transform,
    /// Deferred structural changes, applied at end of frame.
    pub commands: &'a CommandQueue,
}

/// Script service consumed by the script component.
pub trait ScriptEngine {
    /// Resolve a script path to a runnable handle.
    fn resolve(&mut self, path: &str) -> Option<ScriptHandle>;

    /// Run one update of a resolved script.
    fn run_update(&mut self, script: ScriptHandle, ctx: &mut ScriptContext<'_>);
}

/// Script engine that resolves nothing.
#[derive(Debug, Default)]
pub struct NullScripts;

impl ScriptEngine for NullScripts {
    fn resolve(&mut self, _: &str) -> Option<ScriptHandle> {
        None
    }

    fn run_update(&mut self, _: ScriptHandle, _: &mut ScriptContext<'_>) {}
}

// ---------------------------------------------------------------------------
// CommandQueue
// ---------------------------------------------------------------------------

/// A structural change requested while entities are updating.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneCommand {
    /// Destroy the entity and release all its components.
    DestroyEntity(EntityId),
    /// Detach one component kind from the entity.
    DetachComponent(EntityId, ComponentKind),
    /// Change the entity's active flag.
    SetActive(EntityId, bool),
    /// Undo a physics registration whose owner could not reach the engine
    /// because it was borrowed at the time.
    ReleasePhysics(PhysicsRelease),
}

/// FIFO of [`SceneCommand`]s shared between components and the scene owner.
///
/// Detaching or destroying while another component's update is executing is
/// unsafe for the registry, so such requests are queued and applied by the
/// owner after the frame's updates complete.
#[derive(Debug, Clone, Default)]
pub struct CommandQueue(Rc<RefCell<VecDeque<SceneCommand>>>);

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, command: SceneCommand) {
        self.0.borrow_mut().push_back(command);
    }

    /// Take every queued command in FIFO order.
    pub fn drain(&self) -> Vec<SceneCommand> {
        self.0.borrow_mut().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

// ---------------------------------------------------------------------------
// DirtySignal
// ---------------------------------------------------------------------------

/// Fire-and-forget notification raised on every attach/detach.
///
/// The scene owner reads and resets it to invalidate caches built over the
/// entity set (for example spatial acceleration structures).
#[derive(Debug, Clone, Default)]
pub struct DirtySignal(Rc<Cell<bool>>);

impl DirtySignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.set(true);
    }

    pub fn is_raised(&self) -> bool {
        self.0.get()
    }

    /// Return the current state and reset it.
    pub fn take(&self) -> bool {
        self.0.replace(false)
    }
}

// ---------------------------------------------------------------------------
// Services
// ---------------------------------------------------------------------------

/// Bundle of shared collaborators. Cloning shares, never copies.
#[derive(Clone)]
pub struct Services {
    pub device: Rc<RenderDevice>,
    pub meshes: Rc<ResourcePool<Mesh>>,
    pub materials: Rc<ResourcePool<Material>>,
    pub textures: Rc<ResourcePool<Texture>>,
    pub shaders: Rc<ResourcePool<Shader>>,
    pub physics: Rc<RefCell<dyn PhysicsEngine>>,
    pub scripts: Rc<RefCell<dyn ScriptEngine>>,
    pub commands: CommandQueue,
}

impl Services {
    /// Services backed by the given physics and script engines, with empty
    /// resource pools and a headless render device.
    pub fn new(
        physics: Rc<RefCell<dyn PhysicsEngine>>,
        scripts: Rc<RefCell<dyn ScriptEngine>>,
    ) -> Self {
        Self {
            device: Rc::new(RenderDevice::headless()),
            meshes: Rc::new(ResourcePool::new()),
            materials: Rc::new(ResourcePool::new()),
            textures: Rc::new(ResourcePool::new()),
            shaders: Rc::new(ResourcePool::new()),
            physics,
            scripts,
            commands: CommandQueue::new(),
        }
    }

    /// Inert services for tools and tests.
    pub fn headless() -> Self {
        Self::new(
            Rc::new(RefCell::new(NullPhysics::default())),
            Rc::new(RefCell::new(NullScripts)),
        )
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("device", &self.device)
            .field("meshes", &self.meshes.len())
            .field("materials", &self.materials.len())
            .field("textures", &self.textures.len())
            .field("shaders", &self.shaders.len())
            .field("pending_commands", &self.commands.len())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
