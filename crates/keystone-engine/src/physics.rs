//! Built-in physics world.
//!
//! A deterministic point-mass integrator behind the
//! [`PhysicsEngine`] service trait. Dynamic bodies accumulate gravity and
//! linear drag with semi-implicit Euler; kinematic bodies are positioned by
//! their entity every frame and never integrated. Colliders and joints are
//! recorded for queries but take no part in the simulation. An entity may
//! carry several colliders, one per registering component.
//!
//! # Determinism
//!
//! Bodies live in a `BTreeMap` keyed by handle and handles are allocated
//! sequentially, so the integration order is fixed. Same registrations and
//! same step sizes give bit-identical positions.

use std::collections::BTreeMap;

use glam::Vec3;
use keystone_ecs::components::{ColliderDesc, JointDesc, RigidBodySettings};
use keystone_ecs::entity::EntityId;
use keystone_ecs::services::{BodyHandle, ColliderHandle, JointHandle, PhysicsEngine};
use tracing::trace;

/// Simulation state of one body.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicsBody {
    pub owner: EntityId,
    pub settings: RigidBodySettings,
    pub translation: Vec3,
    pub velocity: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhysicsCollider {
    pub owner: EntityId,
    pub desc: ColliderDesc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhysicsJoint {
    pub owner: EntityId,
    pub desc: JointDesc,
}

#[derive(Debug, Clone)]
pub struct PhysicsWorld {
    gravity: Vec3,
    next_handle: u64,
    bodies: BTreeMap<BodyHandle, PhysicsBody>,
    colliders: BTreeMap<ColliderHandle, PhysicsCollider>,
    joints: BTreeMap<JointHandle, PhysicsJoint>,
}

impl PhysicsWorld {
    pub fn new(gravity: Vec3) -> Self {
        Self {
            gravity,
            next_handle: 0,
            bodies: BTreeMap::new(),
            colliders: BTreeMap::new(),
            joints: BTreeMap::new(),
        }
    }

    pub fn new_zero_gravity() -> Self {
        Self::new(Vec3::ZERO)
    }

    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
    }

    /// Advance every dynamic body by `dt` seconds.
    pub fn step(&mut self, dt: f64) {
        let dt = dt as f32;
        for body in self.bodies.values_mut() {
            if body.settings.is_kinematic {
                continue;
            }
            if body.settings.use_gravity {
                body.velocity += self.gravity * dt;
            }
            body.velocity /= 1.0 + body.settings.drag.max(0.0) * dt;
            body.translation += body.velocity * dt;
        }
        trace!(bodies = self.bodies.len(), dt, "physics step");
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&PhysicsBody> {
        self.bodies.get(&handle)
    }

    /// The first body registered by `owner`, if any.
    pub fn body_of(&self, owner: EntityId) -> Option<(BodyHandle, &PhysicsBody)> {
        self.bodies
            .iter()
            .find(|(_, body)| body.owner == owner)
            .map(|(handle, body)| (*handle, body))
    }

    pub fn set_body_velocity(&mut self, handle: BodyHandle, velocity: Vec3) {
        if let Some(body) = self.bodies.get_mut(&handle) {
            body.velocity = velocity;
        }
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn collider(&self, handle: ColliderHandle) -> Option<&PhysicsCollider> {
        self.colliders.get(&handle)
    }

    /// Shapes registered by `owner`, in registration order.
    pub fn colliders_of(&self, owner: EntityId) -> impl Iterator<Item = &ColliderDesc> + '_ {
        self.colliders
            .values()
            .filter(move |collider| collider.owner == owner)
            .map(|collider| &collider.desc)
    }

    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }

    pub fn joint(&self, handle: JointHandle) -> Option<&PhysicsJoint> {
        self.joints.get(&handle)
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, -9.81, 0.0))
    }
}

impl PhysicsEngine for PhysicsWorld {
    fn add_body(&mut self, owner: EntityId, settings: &RigidBodySettings, translation: Vec3) -> BodyHandle {
        let handle = BodyHandle(self.next_handle());
        self.bodies.insert(
            handle,
            PhysicsBody {
                owner,
                settings: settings.clone(),
                translation,
                velocity: Vec3::ZERO,
            },
        );
        handle
    }

    fn remove_body(&mut self, body: BodyHandle) {
        self.bodies.remove(&body);
    }

    fn set_body_translation(&mut self, body: BodyHandle, translation: Vec3) {
        if let Some(state) = self.bodies.get_mut(&body) {
            state.translation = translation;
        }
    }

    fn body_translation(&self, body: BodyHandle) -> Option<Vec3> {
        self.bodies.get(&body).map(|state| state.translation)
    }

    fn add_collider(&mut self, owner: EntityId, collider: &ColliderDesc) -> ColliderHandle {
        let handle = ColliderHandle(self.next_handle());
        self.colliders.insert(
            handle,
            PhysicsCollider {
                owner,
                desc: collider.clone(),
            },
        );
        handle
    }

    fn remove_collider(&mut self, collider: ColliderHandle) {
        self.colliders.remove(&collider);
    }

    fn add_joint(&mut self, owner: EntityId, joint: &JointDesc) -> JointHandle {
        let handle = JointHandle(self.next_handle());
        self.joints.insert(
            handle,
            PhysicsJoint {
                owner,
                desc: joint.clone(),
            },
        );
        handle
    }

    fn remove_joint(&mut self, joint: JointHandle) {
        self.joints.remove(&joint);
    }
}

#[cfg(test)]
mod tests {
    use keystone_ecs::components::ColliderShape;

    use super::*;

    const DT: f64 = 1.0 / 60.0;

    fn owner() -> EntityId {
        EntityId::new(0, 0)
    }

    #[test]
    fn dynamic_body_falls_under_gravity() {
        let mut world = PhysicsWorld::default();
        let body = world.add_body(owner(), &RigidBodySettings::default(), Vec3::new(0.0, 10.0, 0.0));
        for _ in 0..60 {
            world.step(DT);
        }
        let y = world.body_translation(body).unwrap().y;
        assert!(y < 10.0 - 4.0 && y > 10.0 - 5.5, "fell to {y}");
    }

    #[test]
    fn kinematic_body_is_not_integrated() {
        let mut world = PhysicsWorld::default();
        let settings = RigidBodySettings {
            is_kinematic: true,
            ..RigidBodySettings::default()
        };
        let body = world.add_body(owner(), &settings, Vec3::ONE);
        world.step(DT);
        assert_eq!(world.body_translation(body), Some(Vec3::ONE));
    }

    #[test]
    fn gravity_can_be_disabled_per_body() {
        let mut world = PhysicsWorld::default();
        let settings = RigidBodySettings {
            use_gravity: false,
            ..RigidBodySettings::default()
        };
        let body = world.add_body(owner(), &settings, Vec3::ZERO);
        world.set_body_velocity(body, Vec3::X);
        world.step(1.0);
        assert_eq!(world.body_translation(body), Some(Vec3::X));
    }

    #[test]
    fn drag_slows_bodies_down() {
        let mut world = PhysicsWorld::new_zero_gravity();
        let free = world.add_body(owner(), &RigidBodySettings::default(), Vec3::ZERO);
        let dragged = world.add_body(
            owner(),
            &RigidBodySettings {
                drag: 2.0,
                ..RigidBodySettings::default()
            },
            Vec3::ZERO,
        );
        world.set_body_velocity(free, Vec3::X);
        world.set_body_velocity(dragged, Vec3::X);
        for _ in 0..30 {
            world.step(DT);
        }
        let a = world.body_translation(free).unwrap().x;
        let b = world.body_translation(dragged).unwrap().x;
        assert!(b < a, "{b} should trail {a}");
    }

    #[test]
    fn removal_forgets_registrations() {
        let mut world = PhysicsWorld::default();
        let body = world.add_body(owner(), &RigidBodySettings::default(), Vec3::ZERO);
        let collider = world.add_collider(owner(), &ColliderDesc::default());
        let joint = world.add_joint(owner(), &JointDesc::default());
        assert_eq!((world.body_count(), world.collider_count(), world.joint_count()), (1, 1, 1));

        world.remove_body(body);
        world.remove_collider(collider);
        world.remove_joint(joint);
        assert_eq!((world.body_count(), world.collider_count(), world.joint_count()), (0, 0, 0));
        assert_eq!(world.body_translation(body), None);
    }

    #[test]
    fn an_owner_can_hold_several_colliders() {
        let mut world = PhysicsWorld::default();
        let sphere = ColliderDesc {
            shape: ColliderShape::Sphere { radius: 2.0 },
            ..ColliderDesc::default()
        };
        let boxed = world.add_collider(owner(), &ColliderDesc::default());
        world.add_collider(owner(), &sphere);
        assert_eq!(world.colliders_of(owner()).count(), 2);

        world.remove_collider(boxed);
        let left: Vec<_> = world.colliders_of(owner()).collect();
        assert_eq!(left, vec![&sphere]);
    }

    #[test]
    fn determinism_two_identical_runs() {
        fn run() -> Vec<Vec3> {
            let mut world = PhysicsWorld::default();
            let handles: Vec<_> = (0..5)
                .map(|i| {
                    let settings = RigidBodySettings {
                        drag: i as f32 * 0.1,
                        ..RigidBodySettings::default()
                    };
                    world.add_body(EntityId::new(i, 0), &settings, Vec3::splat(i as f32))
                })
                .collect();
            for _ in 0..120 {
                world.step(DT);
            }
            handles
                .into_iter()
                .map(|h| world.body_translation(h).unwrap())
                .collect()
        }
        assert_eq!(run(), run());
    }
}
