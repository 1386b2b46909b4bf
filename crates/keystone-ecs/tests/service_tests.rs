//! Components that register with the physics and script services.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use glam::Vec3;
use keystone_ecs::prelude::*;

/// Physics engine that records registrations and lets tests move bodies.
#[derive(Default)]
struct RecordingPhysics {
    next: u64,
    bodies: BTreeMap<BodyHandle, (EntityId, Vec3, bool)>,
    colliders: BTreeMap<ColliderHandle, (EntityId, ColliderDesc)>,
    joints: BTreeMap<JointHandle, EntityId>,
}

impl PhysicsEngine for RecordingPhysics {
    fn add_body(&mut self, owner: EntityId, settings: &RigidBodySettings, translation: Vec3) -> BodyHandle {
        self.next += 1;
        let handle = BodyHandle(self.next);
        self.bodies
            .insert(handle, (owner, translation, settings.is_kinematic));
        handle
    }

    fn remove_body(&mut self, body: BodyHandle) {
        self.bodies.remove(&body);
    }

    fn set_body_translation(&mut self, body: BodyHandle, translation: Vec3) {
        if let Some(entry) = self.bodies.get_mut(&body) {
            entry.1 = translation;
        }
    }

    fn body_translation(&self, body: BodyHandle) -> Option<Vec3> {
        self.bodies.get(&body).map(|entry| entry.1)
    }

    fn add_collider(&mut self, owner: EntityId, collider: &ColliderDesc) -> ColliderHandle {
        self.next += 1;
        let handle = ColliderHandle(self.next);
        self.colliders.insert(handle, (owner, collider.clone()));
        handle
    }

    fn remove_collider(&mut self, collider: ColliderHandle) {
        self.colliders.remove(&collider);
    }

    fn add_joint(&mut self, owner: EntityId, _: &JointDesc) -> JointHandle {
        self.next += 1;
        let handle = JointHandle(self.next);
        self.joints.insert(handle, owner);
        handle
    }

    fn remove_joint(&mut self, joint: JointHandle) {
        self.joints.remove(&joint);
    }
}

impl RecordingPhysics {
    fn shapes_of(&self, owner: EntityId) -> Vec<ColliderShape> {
        self.colliders
            .values()
            .filter(|(o, _)| *o == owner)
            .map(|(_, desc)| desc.shape.clone())
            .collect()
    }
}

/// Queues destruction of its own entity on the first update.
struct SelfDestruct;

impl ScriptEngine for SelfDestruct {
    fn resolve(&mut self, path: &str) -> Option<ScriptHandle> {
        (path == "doom").then_some(ScriptHandle(7))
    }

    fn run_update(&mut self, _: ScriptHandle, ctx: &mut ScriptContext<'_>) {
        if let Some(entity) = ctx.entity {
            ctx.commands.push(SceneCommand::DestroyEntity(entity));
        }
    }
}

fn setup() -> (Rc<RefCell<RecordingPhysics>>, Services) {
    let physics = Rc::new(RefCell::new(RecordingPhysics::default()));
    let services = Services::new(physics.clone(), Rc::new(RefCell::new(SelfDestruct)));
    (physics, services)
}

#[test]
fn rigid_body_registers_lazily_and_unregisters_on_detach() {
    let (physics, services) = setup();
    let mut e = Entity::new(EntityId::new(5, 1), "g", services, DirtySignal::new());
    e.spatial_mut().unwrap().set_translation(Vec3::new(0.0, 10.0, 0.0));
    e.attach::<RigidBody>();
    assert!(physics.borrow().bodies.is_empty());

    e.update();
    let body = e.get::<RigidBody>().unwrap().body().unwrap();
    assert_eq!(
        physics.borrow().bodies.get(&body),
        Some(&(EntityId::new(5, 1), Vec3::new(0.0, 10.0, 0.0), false))
    );

    assert!(e.detach::<RigidBody>());
    assert!(physics.borrow().bodies.is_empty());
}

#[test]
fn dynamic_body_drives_the_spatial() {
    let (physics, services) = setup();
    let mut e = Entity::new(EntityId::new(0, 0), "g", services, DirtySignal::new());
    e.attach::<RigidBody>();
    e.update();

    let body = e.get::<RigidBody>().unwrap().body().unwrap();
    physics
        .borrow_mut()
        .set_body_translation(body, Vec3::new(1.0, -3.0, 0.0));
    e.update();
    assert_eq!(e.spatial().unwrap().translation(), Vec3::new(1.0, -3.0, 0.0));
}

#[test]
fn kinematic_body_follows_the_spatial() {
    let (physics, services) = setup();
    let mut e = Entity::new(EntityId::new(0, 0), "g", services, DirtySignal::new());
    e.attach::<RigidBody>().set_settings(RigidBodySettings {
        is_kinematic: true,
        ..RigidBodySettings::default()
    });
    e.update();
    e.spatial_mut().unwrap().set_translation(Vec3::new(2.0, 0.0, 0.0));
    e.update();

    let body = e.get::<RigidBody>().unwrap().body().unwrap();
    assert_eq!(
        physics.borrow().body_translation(body),
        Some(Vec3::new(2.0, 0.0, 0.0))
    );
}

#[test]
fn destroy_releases_colliders_and_joints() {
    let (physics, services) = setup();
    let mut e = Entity::new(EntityId::new(0, 0), "g", services, DirtySignal::new());
    e.attach::<RigidBody>();
    e.attach::<Collider>();
    e.attach::<Joint>();
    e.update();
    {
        let p = physics.borrow();
        assert_eq!(p.bodies.len(), 1);
        assert_eq!(p.colliders.len(), 1);
        assert_eq!(p.joints.len(), 1);
    }

    e.destroy();
    let p = physics.borrow();
    assert!(p.bodies.is_empty());
    assert!(p.colliders.is_empty());
    assert!(p.joints.is_empty());
}

#[test]
fn mesh_collider_builds_shape_from_pooled_mesh() {
    let (physics, services) = setup();
    services.meshes.insert(Mesh {
        id: "tri".into(),
        name: "triangle".into(),
        vertices: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
        indices: vec![0, 1, 2],
    });
    let owner = EntityId::new(2, 0);
    let mut e = Entity::new(owner, "g", services, DirtySignal::new());
    e.attach::<MeshCollider>().set_mesh("tri", false);
    e.update();

    let shapes = physics.borrow().shapes_of(owner);
    match shapes.as_slice() {
        [ColliderShape::TriMesh { vertices, indices }] => {
            assert_eq!(vertices.len(), 3);
            assert_eq!(indices, &vec![0, 1, 2]);
        }
        other => panic!("unexpected shapes {other:?}"),
    }
}

fn triangle_pool(services: &Services) {
    services.meshes.insert(Mesh {
        id: "tri".into(),
        name: "triangle".into(),
        vertices: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
        indices: vec![0, 1, 2],
    });
}

fn is_box(shape: &ColliderShape) -> bool {
    matches!(shape, ColliderShape::Box { .. })
}

fn is_trimesh(shape: &ColliderShape) -> bool {
    matches!(shape, ColliderShape::TriMesh { .. })
}

/// An entity with both a primitive and a mesh collider, updated once.
fn both_colliders() -> (Rc<RefCell<RecordingPhysics>>, Entity) {
    let (physics, services) = setup();
    triangle_pool(&services);
    let mut e = Entity::new(EntityId::new(4, 0), "g", services, DirtySignal::new());
    e.attach::<Collider>();
    e.attach::<MeshCollider>().set_mesh("tri", false);
    e.update();
    (physics, e)
}

#[test]
fn collider_and_mesh_collider_register_separate_shapes() {
    let (physics, e) = both_colliders();
    let shapes = physics.borrow().shapes_of(e.handle());
    assert_eq!(shapes.len(), 2);
    assert!(shapes.iter().any(is_box));
    assert!(shapes.iter().any(is_trimesh));
    assert_ne!(
        e.get::<Collider>().unwrap().handle(),
        e.get::<MeshCollider>().unwrap().handle()
    );
}

#[test]
fn detaching_collider_keeps_the_mesh_shape() {
    let (physics, mut e) = both_colliders();
    assert!(e.detach::<Collider>());
    for _ in 0..3 {
        e.update();
    }
    let shapes = physics.borrow().shapes_of(e.handle());
    assert_eq!(shapes.len(), 1);
    assert!(is_trimesh(&shapes[0]));
    assert!(e.get::<MeshCollider>().unwrap().is_registered());
}

#[test]
fn detaching_mesh_collider_keeps_the_primitive_shape() {
    let (physics, mut e) = both_colliders();
    assert!(e.detach::<MeshCollider>());
    e.update();
    let shapes = physics.borrow().shapes_of(e.handle());
    assert_eq!(shapes.len(), 1);
    assert!(is_box(&shapes[0]));
}

#[test]
fn reshaping_collider_leaves_the_mesh_shape_alone() {
    let (physics, mut e) = both_colliders();
    e.get_mut::<Collider>().unwrap().set_desc(ColliderDesc {
        shape: ColliderShape::Sphere { radius: 1.5 },
        ..ColliderDesc::default()
    });
    e.update();
    let shapes = physics.borrow().shapes_of(e.handle());
    assert_eq!(shapes.len(), 2);
    assert!(shapes.iter().any(is_trimesh));
    assert!(shapes.contains(&ColliderShape::Sphere { radius: 1.5 }));
}

#[test]
fn release_is_deferred_while_physics_is_borrowed() {
    let (physics, services) = setup();
    let queue = services.commands.clone();
    let mut e = Entity::new(EntityId::new(0, 0), "g", services, DirtySignal::new());
    e.attach::<RigidBody>();
    e.attach::<Collider>();
    e.attach::<Joint>();
    e.update();
    let body = e.get::<RigidBody>().unwrap().body().unwrap();
    let collider = e.get::<Collider>().unwrap().handle().unwrap();
    let joint = e.get::<Joint>().unwrap().handle().unwrap();

    {
        let _busy = physics.borrow_mut();
        e.destroy();
    }
    assert_eq!(physics.borrow().bodies.len(), 1, "engine was busy during destroy");

    let commands = queue.drain();
    assert_eq!(
        commands,
        vec![
            SceneCommand::ReleasePhysics(PhysicsRelease::Body(body)),
            SceneCommand::ReleasePhysics(PhysicsRelease::Collider(collider)),
            SceneCommand::ReleasePhysics(PhysicsRelease::Joint(joint)),
        ]
    );
    for command in commands {
        if let SceneCommand::ReleasePhysics(release) = command {
            release.apply(&mut *physics.borrow_mut());
        }
    }
    let p = physics.borrow();
    assert!(p.bodies.is_empty());
    assert!(p.colliders.is_empty());
    assert!(p.joints.is_empty());
}

#[test]
fn mesh_collider_with_unknown_mesh_stays_unregistered() {
    let (physics, services) = setup();
    let mut e = Entity::new(EntityId::new(0, 0), "g", services, DirtySignal::new());
    e.attach::<MeshCollider>().set_mesh("missing", true);
    e.update();
    assert!(!e.get::<MeshCollider>().unwrap().is_registered());
    assert!(physics.borrow().colliders.is_empty());
}

#[test]
fn script_queues_commands_for_its_owner() {
    let (_physics, services) = setup();
    let queue = services.commands.clone();
    let owner = EntityId::new(9, 2);
    let mut e = Entity::new(owner, "g", services, DirtySignal::new());
    e.attach::<Script>().set_path("doom");

    e.update();
    assert!(e.get::<Script>().unwrap().is_resolved());
    assert_eq!(queue.drain(), vec![SceneCommand::DestroyEntity(owner)]);
}

#[test]
fn unresolved_script_is_inert() {
    let (_physics, services) = setup();
    let queue = services.commands.clone();
    let mut e = Entity::new(EntityId::new(0, 0), "g", services, DirtySignal::new());
    e.attach::<Script>().set_path("nope");
    e.update();
    e.update();
    assert!(!e.get::<Script>().unwrap().is_resolved());
    assert!(queue.is_empty());
}

#[test]
fn mesh_renderer_resolves_material_after_load() {
    let (_physics, services) = setup();
    services.materials.insert(Material {
        id: "steel".into(),
        name: "Steel".into(),
        shader_id: "pbr".into(),
        albedo: glam::Vec4::ONE,
        roughness: 0.3,
        metallic: 1.0,
        albedo_texture: None,
    });
    let mut source = Entity::new(EntityId::new(0, 0), "g", Services::headless(), DirtySignal::new());
    source.attach::<MeshRenderer>().set_material_id("steel");
    assert!(source.get::<MeshRenderer>().unwrap().material().is_none());
    let bytes = source.save_to_vec().unwrap();

    let mut target = Entity::new(EntityId::new(1, 0), "h", services, DirtySignal::new());
    target.load_from_slice(&bytes).unwrap();
    let renderer = target.get::<MeshRenderer>().unwrap();
    assert_eq!(renderer.material().unwrap().name, "Steel");
}
