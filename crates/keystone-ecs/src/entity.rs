//! Entity handles and the entity container.
//!
//! An [`EntityId`] is a 64-bit handle that packs a *generation* counter in the
//! high 32 bits and an *index* in the low 32 bits. Components hold these
//! handles as back-references; a recycled slot bumps the generation so stale
//! handles are detectable by the owner.
//!
//! An [`Entity`] is a named, persistent identity owning a registry of
//! components. It always carries a [`Spatial`] from construction until
//! destruction.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::component::{Component, ComponentKind, ComponentType};
use crate::components::{Spatial, Transform};
use crate::registry::ComponentRegistry;
use crate::services::{DirtySignal, Services};

/// Name given to entities that were never named.
pub const DEFAULT_ENTITY_NAME: &str = "Entity";

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// A generational entity handle.
///
/// Layout: `[generation: u32 | index: u32]`
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        Self((generation as u64) << 32 | index as u64)
    }

    /// The index portion (low 32 bits).
    #[inline]
    pub fn index(self) -> u32 {
        self.0 as u32
    }

    /// The generation portion (high 32 bits).
    #[inline]
    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({}v{})", self.index(), self.generation())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A game object: identity, flags and at most one component per kind.
///
/// Lifecycle: constructed (with Spatial), active or inactive any number of
/// times, then destroyed. Destruction is terminal and idempotent; it also
/// runs on drop if the owner never called [`destroy`](Entity::destroy).
pub struct Entity {
    handle: EntityId,
    pub(crate) guid: String,
    pub(crate) name: String,
    pub(crate) active: bool,
    pub(crate) visible: bool,
    pub(crate) registry: ComponentRegistry,
    destroyed: bool,
}

impl Entity {
    /// Build an entity that owns only a [`Spatial`].
    ///
    /// `handle` is the owner's pool handle for this entity, used as the
    /// back-reference in every component link. `dirty` is raised on every
    /// attach and detach.
    pub fn new(handle: EntityId, guid: impl Into<String>, services: Services, dirty: DirtySignal) -> Self {
        let mut entity = Self {
            handle,
            guid: guid.into(),
            name: DEFAULT_ENTITY_NAME.to_owned(),
            active: true,
            visible: true,
            registry: ComponentRegistry::new(handle, services, dirty),
            destroyed: false,
        };
        entity.registry.attach::<Spatial>();
        entity
    }

    pub fn handle(&self) -> EntityId {
        self.handle
    }

    pub fn guid(&self) -> &str {
        &self.guid
    }

    pub fn set_guid(&mut self, guid: impl Into<String>) {
        self.guid = guid.into();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    // -- components ---------------------------------------------------------

    /// Attach a `T`, or return the existing one unchanged.
    pub fn attach<T: ComponentType>(&mut self) -> &mut T {
        debug_assert!(!self.destroyed, "attach on destroyed entity {}", self.handle);
        self.registry.attach::<T>()
    }

    pub fn attach_kind(&mut self, kind: ComponentKind) -> &mut dyn Component {
        debug_assert!(!self.destroyed, "attach on destroyed entity {}", self.handle);
        self.registry.attach_kind(kind)
    }

    pub fn get<T: ComponentType>(&self) -> Option<&T> {
        self.registry.get::<T>()
    }

    pub fn get_mut<T: ComponentType>(&mut self) -> Option<&mut T> {
        self.registry.get_mut::<T>()
    }

    pub fn get_kind(&self, kind: ComponentKind) -> Option<&dyn Component> {
        self.registry.get_kind(kind)
    }

    pub fn has<T: ComponentType>(&self) -> bool {
        self.registry.has::<T>()
    }

    pub fn has_kind(&self, kind: ComponentKind) -> bool {
        self.registry.has_kind(kind)
    }

    /// Detach and release the `T`. The Spatial cannot be detached.
    pub fn detach<T: ComponentType>(&mut self) -> bool {
        self.detach_kind(T::KIND)
    }

    pub fn detach_kind(&mut self, kind: ComponentKind) -> bool {
        if kind == ComponentKind::Spatial {
            warn!(entity = %self.handle, guid = %self.guid, "refusing to detach Spatial");
            return false;
        }
        self.registry.detach_kind(kind)
    }

    pub fn spatial(&self) -> Option<&Spatial> {
        self.registry.get::<Spatial>()
    }

    pub fn spatial_mut(&mut self) -> Option<&mut Spatial> {
        self.registry.get_mut::<Spatial>()
    }

    /// Attached kinds in slot order.
    pub fn component_kinds(&self) -> Vec<ComponentKind> {
        self.registry.kinds().collect()
    }

    pub fn component_count(&self) -> usize {
        self.registry.len()
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    // -- lifecycle ----------------------------------------------------------

    /// Run one frame. No-op while inactive or after destruction.
    pub fn update(&mut self) {
        if !self.active || self.destroyed {
            return;
        }
        let mut transform = self
            .spatial()
            .map(|spatial| *spatial.transform())
            .unwrap_or(Transform::IDENTITY);
        self.registry.update_all(&mut transform);
    }

    /// Release every component and enter the terminal state.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.registry.clear();
        self.guid.clear();
        self.name.clear();
        self.active = false;
        self.visible = false;
        self.destroyed = true;
        debug!(entity = %self.handle, "entity destroyed");
    }
}

impl Drop for Entity {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("handle", &self.handle)
            .field("guid", &self.guid)
            .field("name", &self.name)
            .field("active", &self.active)
            .field("visible", &self.visible)
            .field("components", &self.component_kinds())
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use glam::Vec3;

    use super::*;
    use crate::components::{Camera, Light, Script};
    use crate::services::{NullPhysics, ScriptContext, ScriptEngine, ScriptHandle};

    fn entity() -> Entity {
        Entity::new(EntityId::new(0, 0), "guid-0", Services::headless(), DirtySignal::new())
    }

    /// Moves the working transform one unit along X per update.
    struct Walker;

    impl ScriptEngine for Walker {
        fn resolve(&mut self, path: &str) -> Option<ScriptHandle> {
            (path == "walk").then_some(ScriptHandle(0))
        }

        fn run_update(&mut self, _: ScriptHandle, ctx: &mut ScriptContext<'_>) {
            ctx.transform.translation += Vec3::X;
        }
    }

    #[test]
    fn entity_id_roundtrip() {
        let id = EntityId::new(42, 7);
        assert_eq!(id.index(), 42);
        assert_eq!(id.generation(), 7);
        assert_eq!(EntityId::from_raw(id.to_raw()), id);
        assert_eq!(id.to_string(), "42v7");
    }

    #[test]
    fn new_entity_has_only_spatial() {
        let e = entity();
        assert!(e.has::<Spatial>());
        assert_eq!(e.component_kinds(), vec![ComponentKind::Spatial]);
        assert_eq!(e.name(), DEFAULT_ENTITY_NAME);
        assert!(e.is_active() && e.is_visible());
    }

    #[test]
    fn spatial_cannot_be_detached() {
        let mut e = entity();
        assert!(!e.detach::<Spatial>());
        assert!(!e.detach_kind(ComponentKind::Spatial));
        assert!(e.has::<Spatial>());
    }

    #[test]
    fn destroy_is_terminal_and_idempotent() {
        let mut e = entity();
        e.attach::<Light>();
        let light_link = e.registry().link(ComponentKind::Light).cloned().unwrap();
        e.destroy();
        assert!(e.is_destroyed());
        assert_eq!(e.component_count(), 0);
        assert_eq!(e.guid(), "");
        assert!(!e.is_active() && !e.is_visible());
        assert!(!light_link.is_attached());
        e.destroy();
        assert!(e.is_destroyed());
    }

    #[test]
    fn update_lets_components_move_the_spatial() {
        let services = Services::new(
            Rc::new(RefCell::new(NullPhysics::default())),
            Rc::new(RefCell::new(Walker)),
        );
        let mut e = Entity::new(EntityId::new(0, 0), "g", services, DirtySignal::new());
        e.attach::<Script>().set_path("walk");
        e.attach::<Camera>();

        e.update();
        e.update();
        assert_eq!(e.spatial().unwrap().translation(), Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(e.spatial().unwrap().matrix(), e.spatial().unwrap().transform().to_matrix());
    }

    #[test]
    fn inactive_entity_does_not_update() {
        let services = Services::new(
            Rc::new(RefCell::new(NullPhysics::default())),
            Rc::new(RefCell::new(Walker)),
        );
        let mut e = Entity::new(EntityId::new(0, 0), "g", services, DirtySignal::new());
        e.attach::<Script>().set_path("walk");
        e.set_active(false);
        e.update();
        assert_eq!(e.spatial().unwrap().translation(), Vec3::ZERO);
    }
}
