//! Components that register with the [`PhysicsEngine`] service.
//!
//! Registration is lazy: it happens on the first update after attach (or
//! after the settings change), once the entity's working transform is known
//! and any stream payload has been loaded. Every registration is undone when
//! the component is dropped. Kind order guarantees the rigid body of an
//! entity is registered before its colliders and joints.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::component::{Component, ComponentKind, ComponentLink, FrameContext};
use crate::components::mesh::resolve_resource;
use crate::resources::{Mesh, ResourcePool};
use crate::services::{
    BodyHandle, ColliderHandle, CommandQueue, JointHandle, PhysicsEngine, PhysicsRelease,
    SceneCommand,
};
use crate::stream::{SceneReader, SceneWriter, StreamError};

/// A component's route to the physics engine.
///
/// Removals that find the engine borrowed are queued on the scene's
/// [`CommandQueue`] as [`SceneCommand::ReleasePhysics`], so a handle is never
/// dropped while the engine still holds its registration.
struct PhysicsAccess {
    engine: Rc<RefCell<dyn PhysicsEngine>>,
    commands: CommandQueue,
}

impl PhysicsAccess {
    fn from_link(link: &ComponentLink) -> Self {
        let services = link.services();
        Self {
            engine: Rc::clone(&services.physics),
            commands: services.commands.clone(),
        }
    }

    /// Run `f` against the engine unless it is already borrowed.
    fn with<R>(&self, f: impl FnOnce(&mut dyn PhysicsEngine) -> R) -> Option<R> {
        match self.engine.try_borrow_mut() {
            Ok(mut engine) => Some(f(&mut *engine)),
            Err(_) => {
                warn!("physics engine is busy; skipping registration");
                None
            }
        }
    }

    fn release(&self, release: PhysicsRelease) {
        match self.engine.try_borrow_mut() {
            Ok(mut engine) => release.apply(&mut *engine),
            Err(_) => {
                debug!(?release, "physics engine is busy; release deferred");
                self.commands.push(SceneCommand::ReleasePhysics(release));
            }
        }
    }
}

fn with_physics<R>(
    physics: Option<&PhysicsAccess>,
    f: impl FnOnce(&mut dyn PhysicsEngine) -> R,
) -> Option<R> {
    physics?.with(f)
}

// ---------------------------------------------------------------------------
// RigidBody
// ---------------------------------------------------------------------------

/// Persistent rigid body parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RigidBodySettings {
    pub mass: f32,
    pub drag: f32,
    pub angular_drag: f32,
    pub restitution: f32,
    pub use_gravity: bool,
    /// Kinematic bodies follow the transform instead of driving it.
    pub is_kinematic: bool,
}

impl Default for RigidBodySettings {
    fn default() -> Self {
        Self {
            mass: 1.0,
            drag: 0.0,
            angular_drag: 0.05,
            restitution: 0.0,
            use_gravity: true,
            is_kinematic: false,
        }
    }
}

#[derive(Default)]
pub struct RigidBody {
    settings: RigidBodySettings,
    physics: Option<PhysicsAccess>,
    body: Option<BodyHandle>,
}

impl RigidBody {
    pub fn settings(&self) -> &RigidBodySettings {
        &self.settings
    }

    /// Replace the settings; the body is re-created on the next update.
    pub fn set_settings(&mut self, settings: RigidBodySettings) {
        self.settings = settings;
        self.release_body();
    }

    /// The registered body, once the component has been updated.
    pub fn body(&self) -> Option<BodyHandle> {
        self.body
    }

    fn release_body(&mut self) {
        if let (Some(body), Some(physics)) = (self.body.take(), &self.physics) {
            physics.release(PhysicsRelease::Body(body));
        }
    }
}

impl Component for RigidBody {
    fn kind(&self) -> ComponentKind {
        ComponentKind::RigidBody
    }

    fn initialize(&mut self, link: &ComponentLink) {
        self.physics = Some(PhysicsAccess::from_link(link));
    }

    fn update(&mut self, frame: &mut FrameContext<'_>) {
        let Some(owner) = frame.link.entity() else {
            return;
        };
        let settings = &self.settings;
        let body = &mut self.body;
        let translation = frame.transform.translation;
        let synced = with_physics(self.physics.as_ref(), |engine| {
            let handle = *body.get_or_insert_with(|| engine.add_body(owner, settings, translation));
            if settings.is_kinematic {
                engine.set_body_translation(handle, translation);
                None
            } else {
                engine.body_translation(handle)
            }
        });
        if let Some(Some(position)) = synced {
            frame.transform.translation = position;
        }
    }

    fn save(&self, out: &mut SceneWriter) -> Result<(), StreamError> {
        out.write_value(&self.settings)
    }

    fn load(&mut self, input: &mut SceneReader<'_>) -> Result<(), StreamError> {
        let settings = input.read_value()?;
        self.set_settings(settings);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Drop for RigidBody {
    fn drop(&mut self) {
        self.release_body();
    }
}

impl std::fmt::Debug for RigidBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RigidBody")
            .field("settings", &self.settings)
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Collider
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColliderShape {
    Box { half_extents: Vec3 },
    Sphere { radius: f32 },
    Capsule { radius: f32, height: f32 },
    ConvexHull { points: Vec<Vec3> },
    TriMesh { vertices: Vec<Vec3>, indices: Vec<u32> },
}

/// One collision shape registered with the physics engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColliderDesc {
    pub shape: ColliderShape,
    /// Offset from the entity origin.
    pub center: Vec3,
    pub is_trigger: bool,
}

impl Default for ColliderDesc {
    fn default() -> Self {
        Self {
            shape: ColliderShape::Box {
                half_extents: Vec3::splat(0.5),
            },
            center: Vec3::ZERO,
            is_trigger: false,
        }
    }
}

/// Primitive collision shape.
#[derive(Default)]
pub struct Collider {
    desc: ColliderDesc,
    physics: Option<PhysicsAccess>,
    handle: Option<ColliderHandle>,
}

impl Collider {
    pub fn desc(&self) -> &ColliderDesc {
        &self.desc
    }

    /// Replace the shape; re-registered on the next update.
    pub fn set_desc(&mut self, desc: ColliderDesc) {
        self.desc = desc;
        self.unregister();
    }

    pub fn is_registered(&self) -> bool {
        self.handle.is_some()
    }

    /// The shape registered with the physics engine, once updated.
    pub fn handle(&self) -> Option<ColliderHandle> {
        self.handle
    }

    fn unregister(&mut self) {
        if let (Some(handle), Some(physics)) = (self.handle.take(), &self.physics) {
            physics.release(PhysicsRelease::Collider(handle));
        }
    }
}

impl Component for Collider {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Collider
    }

    fn initialize(&mut self, link: &ComponentLink) {
        self.physics = Some(PhysicsAccess::from_link(link));
    }

    fn update(&mut self, frame: &mut FrameContext<'_>) {
        if self.handle.is_some() {
            return;
        }
        let Some(owner) = frame.link.entity() else {
            return;
        };
        let desc = &self.desc;
        self.handle = with_physics(self.physics.as_ref(), |engine| engine.add_collider(owner, desc));
    }

    fn save(&self, out: &mut SceneWriter) -> Result<(), StreamError> {
        out.write_value(&self.desc)
    }

    fn load(&mut self, input: &mut SceneReader<'_>) -> Result<(), StreamError> {
        let desc = input.read_value()?;
        self.set_desc(desc);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Drop for Collider {
    fn drop(&mut self) {
        self.unregister();
    }
}

impl std::fmt::Debug for Collider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collider")
            .field("desc", &self.desc)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// MeshCollider
// ---------------------------------------------------------------------------

/// Collision shape built from a pooled mesh.
///
/// Registers its own shape, independent of any [`Collider`] on the same
/// entity: with both attached the entity carries both shapes, and detaching
/// either one leaves the other registered.
#[derive(Default)]
pub struct MeshCollider {
    mesh_id: String,
    /// Use the convex hull of the vertices instead of the triangle soup.
    convex: bool,
    mesh: Option<Rc<Mesh>>,
    pool: Option<Rc<ResourcePool<Mesh>>>,
    physics: Option<PhysicsAccess>,
    handle: Option<ColliderHandle>,
}

impl MeshCollider {
    pub fn mesh_id(&self) -> &str {
        &self.mesh_id
    }

    pub fn is_convex(&self) -> bool {
        self.convex
    }

    pub fn set_mesh(&mut self, mesh_id: impl Into<String>, convex: bool) {
        self.mesh_id = mesh_id.into();
        self.convex = convex;
        self.mesh = resolve_resource(self.pool.as_deref(), &self.mesh_id, "mesh");
        self.unregister();
    }

    pub fn is_registered(&self) -> bool {
        self.handle.is_some()
    }

    /// The shape registered with the physics engine, once updated.
    pub fn handle(&self) -> Option<ColliderHandle> {
        self.handle
    }

    fn collider_desc(&self) -> Option<ColliderDesc> {
        let mesh = self.mesh.as_ref()?;
        let shape = if self.convex {
            ColliderShape::ConvexHull {
                points: mesh.vertices.clone(),
            }
        } else {
            ColliderShape::TriMesh {
                vertices: mesh.vertices.clone(),
                indices: mesh.indices.clone(),
            }
        };
        Some(ColliderDesc {
            shape,
            center: Vec3::ZERO,
            is_trigger: false,
        })
    }

    fn unregister(&mut self) {
        if let (Some(handle), Some(physics)) = (self.handle.take(), &self.physics) {
            physics.release(PhysicsRelease::Collider(handle));
        }
    }
}

impl Component for MeshCollider {
    fn kind(&self) -> ComponentKind {
        ComponentKind::MeshCollider
    }

    fn initialize(&mut self, link: &ComponentLink) {
        self.pool = Some(Rc::clone(&link.services().meshes));
        self.physics = Some(PhysicsAccess::from_link(link));
    }

    fn update(&mut self, frame: &mut FrameContext<'_>) {
        if self.handle.is_some() {
            return;
        }
        let (Some(owner), Some(desc)) = (frame.link.entity(), self.collider_desc()) else {
            return;
        };
        self.handle = with_physics(self.physics.as_ref(), |engine| engine.add_collider(owner, &desc));
    }

    fn save(&self, out: &mut SceneWriter) -> Result<(), StreamError> {
        out.write_str(&self.mesh_id)?;
        out.write_bool(self.convex);
        Ok(())
    }

    fn load(&mut self, input: &mut SceneReader<'_>) -> Result<(), StreamError> {
        let mesh_id = input.read_string()?;
        let convex = input.read_bool()?;
        self.set_mesh(mesh_id, convex);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Drop for MeshCollider {
    fn drop(&mut self) {
        self.unregister();
    }
}

impl std::fmt::Debug for MeshCollider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshCollider")
            .field("mesh_id", &self.mesh_id)
            .field("convex", &self.convex)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Joint
// ---------------------------------------------------------------------------

/// Hinge joint description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointDesc {
    /// Guid of the entity on the other side; `None` anchors to the world.
    pub connected: Option<String>,
    pub axis: Vec3,
    pub pivot: Vec3,
    /// Angular limits in degrees.
    pub limits: Option<(f32, f32)>,
}

impl Default for JointDesc {
    fn default() -> Self {
        Self {
            connected: None,
            axis: Vec3::Y,
            pivot: Vec3::ZERO,
            limits: None,
        }
    }
}

#[derive(Default)]
pub struct Joint {
    desc: JointDesc,
    physics: Option<PhysicsAccess>,
    handle: Option<JointHandle>,
}

impl Joint {
    pub fn desc(&self) -> &JointDesc {
        &self.desc
    }

    pub fn set_desc(&mut self, desc: JointDesc) {
        self.desc = desc;
        self.release();
    }

    pub fn handle(&self) -> Option<JointHandle> {
        self.handle
    }

    fn release(&mut self) {
        if let (Some(handle), Some(physics)) = (self.handle.take(), &self.physics) {
            physics.release(PhysicsRelease::Joint(handle));
        }
    }
}

impl Component for Joint {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Joint
    }

    fn initialize(&mut self, link: &ComponentLink) {
        self.physics = Some(PhysicsAccess::from_link(link));
    }

    fn update(&mut self, frame: &mut FrameContext<'_>) {
        if self.handle.is_some() {
            return;
        }
        let Some(owner) = frame.link.entity() else {
            return;
        };
        let desc = &self.desc;
        self.handle = with_physics(self.physics.as_ref(), |engine| engine.add_joint(owner, desc));
    }

    fn save(&self, out: &mut SceneWriter) -> Result<(), StreamError> {
        out.write_value(&self.desc)
    }

    fn load(&mut self, input: &mut SceneReader<'_>) -> Result<(), StreamError> {
        let desc = input.read_value()?;
        self.set_desc(desc);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Drop for Joint {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Joint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Joint")
            .field("desc", &self.desc)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}
