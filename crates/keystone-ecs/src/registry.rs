//! Per-entity component storage.
//!
//! A fixed slot table indexed by [`ComponentKind`]: lookup is O(1) and the
//! one-component-per-kind rule is structural rather than checked.

use tracing::debug;

use crate::component::{Component, ComponentKind, ComponentLink, ComponentType, FrameContext};
use crate::components::Transform;
use crate::entity::EntityId;
use crate::services::{DirtySignal, Services};

struct Slot {
    link: ComponentLink,
    component: Box<dyn Component>,
}

/// The components attached to one entity, at most one per kind.
pub struct ComponentRegistry {
    owner: EntityId,
    services: Services,
    dirty: DirtySignal,
    slots: [Option<Slot>; ComponentKind::COUNT],
}

impl ComponentRegistry {
    /// An empty registry for `owner`. Every attach and detach raises `dirty`.
    pub fn new(owner: EntityId, services: Services, dirty: DirtySignal) -> Self {
        Self {
            owner,
            services,
            dirty,
            slots: std::array::from_fn(|_| None),
        }
    }

    pub fn owner(&self) -> EntityId {
        self.owner
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Attach a `T`, or return the one already attached unchanged.
    pub fn attach<T: ComponentType>(&mut self) -> &mut T {
        if self.slots[T::KIND.index()].is_none() {
            self.insert(Box::new(T::default()));
        }
        self.get_mut::<T>()
            .expect("registry slot holds the component type of its kind")
    }

    /// Dynamic form of [`attach`](Self::attach) used by the load dispatcher.
    pub fn attach_kind(&mut self, kind: ComponentKind) -> &mut dyn Component {
        if self.slots[kind.index()].is_none() {
            self.insert(crate::persist::instantiate(kind));
        }
        self.get_kind_mut(kind)
            .expect("slot was filled just above")
    }

    fn insert(&mut self, mut component: Box<dyn Component>) {
        let kind = component.kind();
        let link = ComponentLink::new(kind, self.owner, self.services.clone());
        component.initialize(&link);
        self.slots[kind.index()] = Some(Slot { link, component });
        self.dirty.raise();
        debug!(entity = %self.owner, %kind, "component attached");
    }

    pub fn get<T: ComponentType>(&self) -> Option<&T> {
        self.get_kind(T::KIND)?.as_any().downcast_ref::<T>()
    }

    pub fn get_mut<T: ComponentType>(&mut self) -> Option<&mut T> {
        self.get_kind_mut(T::KIND)?.as_any_mut().downcast_mut::<T>()
    }

    pub fn get_kind(&self, kind: ComponentKind) -> Option<&dyn Component> {
        self.slots[kind.index()]
            .as_ref()
            .map(|slot| slot.component.as_ref())
    }

    pub fn get_kind_mut(&mut self, kind: ComponentKind) -> Option<&mut dyn Component> {
        match &mut self.slots[kind.index()] {
            Some(slot) => Some(slot.component.as_mut()),
            None => None,
        }
    }

    /// The back-reference handed to the component of `kind`, if attached.
    pub fn link(&self, kind: ComponentKind) -> Option<&ComponentLink> {
        self.slots[kind.index()].as_ref().map(|slot| &slot.link)
    }

    pub fn has<T: ComponentType>(&self) -> bool {
        self.has_kind(T::KIND)
    }

    pub fn has_kind(&self, kind: ComponentKind) -> bool {
        self.slots[kind.index()].is_some()
    }

    /// Detach and release the `T`. Returns `false` if none was attached.
    pub fn detach<T: ComponentType>(&mut self) -> bool {
        self.detach_kind(T::KIND)
    }

    /// Clear the component's link, release it and drop the entry.
    pub fn detach_kind(&mut self, kind: ComponentKind) -> bool {
        let Some(slot) = self.slots[kind.index()].take() else {
            return false;
        };
        slot.link.clear();
        drop(slot.component);
        self.dirty.raise();
        debug!(entity = %self.owner, %kind, "component detached");
        true
    }

    /// Number of attached components.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Attached kinds in slot order.
    pub fn kinds(&self) -> impl Iterator<Item = ComponentKind> + '_ {
        self.slots
            .iter()
            .flatten()
            .map(|slot| slot.link.kind())
    }

    /// Attached components in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (ComponentKind, &dyn Component)> + '_ {
        self.slots
            .iter()
            .flatten()
            .map(|slot| (slot.link.kind(), slot.component.as_ref()))
    }

    /// Run one frame: every component except Spatial in slot order, each
    /// free to modify `transform`, then Spatial, which adopts the result.
    pub fn update_all(&mut self, transform: &mut Transform) {
        for slot in self.slots.iter_mut().flatten() {
            if slot.link.kind() == ComponentKind::Spatial {
                continue;
            }
            slot.component.update(&mut FrameContext {
                link: &slot.link,
                transform: &mut *transform,
            });
        }
        if let Some(slot) = self.slots[ComponentKind::Spatial.index()].as_mut() {
            slot.component.update(&mut FrameContext {
                link: &slot.link,
                transform,
            });
        }
    }

    /// Teardown: clear every link first, then release every component.
    pub fn clear(&mut self) {
        if self.is_empty() {
            return;
        }
        for slot in self.slots.iter().flatten() {
            slot.link.clear();
        }
        for slot in &mut self.slots {
            drop(slot.take());
        }
        self.dirty.raise();
        debug!(entity = %self.owner, "registry cleared");
    }
}

impl Drop for ComponentRegistry {
    fn drop(&mut self) {
        self.clear();
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("owner", &self.owner)
            .field("kinds", &self.kinds().collect::<Vec<_>>())
            .finish()
    }
}
