//! Generational entity storage.
//!
//! Slots are indexed by [`EntityId::index`]. Removing an entity bumps the
//! slot's generation, so handles to the removed entity go stale immediately
//! and can never reach whatever occupies the slot next.

use std::collections::VecDeque;

use keystone_ecs::entity::{Entity, EntityId};

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    entity: Option<Entity>,
}

/// Owns every live entity of a scene.
///
/// Free indices are recycled in FIFO order so generations are spread out
/// over time rather than concentrated on a hot index.
#[derive(Debug, Default)]
pub struct EntityPool {
    slots: Vec<Slot>,
    free: VecDeque<u32>,
    len: usize,
}

impl EntityPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty pool whose handles can never equal a handle of `self`.
    ///
    /// Every slot of `self` is carried over free, one generation ahead, so
    /// the successor hands out indices in ascending order.
    pub fn successor(&self) -> Self {
        Self {
            slots: self
                .slots
                .iter()
                .map(|slot| Slot {
                    generation: slot.generation.wrapping_add(1),
                    entity: None,
                })
                .collect(),
            free: (0..self.slots.len() as u32).collect(),
            len: 0,
        }
    }

    /// Allocate a handle and store the entity `build` makes for it.
    pub fn spawn_with(&mut self, build: impl FnOnce(EntityId) -> Entity) -> EntityId {
        let index = match self.free.pop_front() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        let handle = EntityId::new(index, slot.generation);
        slot.entity = Some(build(handle));
        self.len += 1;
        handle
    }

    fn slot(&self, id: EntityId) -> Option<&Slot> {
        self.slots
            .get(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
    }

    /// Whether `id` refers to a live entity.
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.slot(id).is_some_and(|slot| slot.entity.is_some())
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.slot(id)?.entity.as_ref()
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.slots
            .get_mut(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())?
            .entity
            .as_mut()
    }

    /// Take the entity out of the pool. Stale or unknown handles return
    /// `None`.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        let slot = self
            .slots
            .get_mut(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())?;
        let entity = slot.entity.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push_back(id.index());
        self.len -= 1;
        Some(entity)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Live handles in slot order.
    pub fn handles(&self) -> Vec<EntityId> {
        self.iter().map(Entity::handle).collect()
    }

    /// Live entities in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.slots.iter().filter_map(|slot| slot.entity.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> + '_ {
        self.slots.iter_mut().filter_map(|slot| slot.entity.as_mut())
    }
}

#[cfg(test)]
mod tests {
    use keystone_ecs::services::{DirtySignal, Services};

    use super::*;

    fn spawn(pool: &mut EntityPool, guid: &str) -> EntityId {
        pool.spawn_with(|handle| Entity::new(handle, guid, Services::headless(), DirtySignal::new()))
    }

    #[test]
    fn spawned_entity_knows_its_handle() {
        let mut pool = EntityPool::new();
        let id = spawn(&mut pool, "a");
        assert_eq!(pool.get(id).unwrap().handle(), id);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn generation_increments_on_recycle() {
        let mut pool = EntityPool::new();
        let e0 = spawn(&mut pool, "a");
        assert_eq!(e0.generation(), 0);
        assert!(pool.remove(e0).is_some());
        let e1 = spawn(&mut pool, "b");
        assert_eq!(e1.index(), e0.index());
        assert_eq!(e1.generation(), 1);
        assert!(pool.get(e0).is_none(), "stale handle must not resolve");
        assert_eq!(pool.get(e1).unwrap().guid(), "b");
    }

    #[test]
    fn double_remove_returns_none() {
        let mut pool = EntityPool::new();
        let e = spawn(&mut pool, "a");
        assert!(pool.remove(e).is_some());
        assert!(pool.remove(e).is_none());
        assert!(pool.is_empty());
    }

    #[test]
    fn free_indices_are_recycled_fifo() {
        let mut pool = EntityPool::new();
        let ids: Vec<_> = (0..3).map(|i| spawn(&mut pool, &i.to_string())).collect();
        pool.remove(ids[2]);
        pool.remove(ids[0]);
        assert_eq!(spawn(&mut pool, "x").index(), 2);
        assert_eq!(spawn(&mut pool, "y").index(), 0);
        assert_eq!(spawn(&mut pool, "z").index(), 3);
    }

    #[test]
    fn successor_handles_never_collide() {
        let mut pool = EntityPool::new();
        let a = spawn(&mut pool, "a");
        let b = spawn(&mut pool, "b");
        pool.remove(b);

        let mut next = pool.successor();
        let x = spawn(&mut next, "x");
        let y = spawn(&mut next, "y");
        let z = spawn(&mut next, "z");
        assert_eq!((x.index(), y.index(), z.index()), (0, 1, 2));
        assert!(x != a && y != b);
        assert!(next.get(a).is_none());
        assert!(next.get(b).is_none());
    }

    #[test]
    fn handles_are_in_slot_order() {
        let mut pool = EntityPool::new();
        let a = spawn(&mut pool, "a");
        let b = spawn(&mut pool, "b");
        let c = spawn(&mut pool, "c");
        pool.remove(b);
        assert_eq!(pool.handles(), vec![a, c]);
    }
}
