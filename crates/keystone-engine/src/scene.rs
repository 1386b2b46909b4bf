//! The scene: owner of every entity and of the services they share.
//!
//! Entities are constructed and registered only through the scene's
//! factories ([`Scene::create_entity`], [`Scene::create_named_entity`]), so
//! an [`Entity`] itself never touches global state. Structural changes
//! requested while entities update arrive through the shared
//! [`CommandQueue`](keystone_ecs::services::CommandQueue) and are applied by
//! [`Scene::flush_commands`] at the end of the frame.
//!
//! # Scene files
//!
//! ```text
//! ["KSCN"][version:i32][entityCount:i32][entity records...][blake3:32 bytes]
//! ```
//!
//! The digest covers every byte before it. Loading verifies it first, then
//! builds the complete entity set aside and only swaps it in once every
//! record has parsed; a failed load leaves the scene as it was.
//!
//! ```
//! use keystone_engine::prelude::*;
//!
//! let mut scene = Scene::new(EngineConfig { guid_seed: Some(1), ..EngineConfig::default() });
//! let lamp = scene.create_named_entity("Lamp");
//! scene.get_mut(lamp).unwrap().attach::<Light>();
//!
//! let bytes = scene.save().unwrap();
//! let mut copy = Scene::new(EngineConfig::default());
//! copy.load(&bytes).unwrap();
//! let loaded = copy.find_by_name("Lamp").unwrap();
//! assert!(copy.get(loaded).unwrap().has::<Light>());
//! ```

use std::cell::{Ref, RefCell, RefMut};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::Context;
use keystone_ecs::entity::{Entity, EntityId};
use keystone_ecs::persist::LoadReport;
use keystone_ecs::services::{DirtySignal, SceneCommand, Services};
use keystone_ecs::stream::{SceneReader, SceneWriter, StreamError};
use keystone_ecs::EcsError;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::guid::GuidGenerator;
use crate::physics::PhysicsWorld;
use crate::pool::EntityPool;
use crate::scripting::ScriptHost;

/// Leading bytes of every scene file.
pub const SCENE_MAGIC: [u8; 4] = *b"KSCN";
/// Current scene file version.
pub const SCENE_VERSION: i32 = 1;

const DIGEST_LEN: usize = 32;
const HEADER_LEN: usize = 4 + 4 + 4;

// ---------------------------------------------------------------------------
// Errors / reports
// ---------------------------------------------------------------------------

/// Errors produced by scene save and load.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("scene data is truncated: {len} bytes is shorter than the minimum {min}")]
    Truncated { len: usize, min: usize },

    #[error("scene checksum mismatch: stored {stored}, computed {computed}")]
    ChecksumMismatch { stored: String, computed: String },

    #[error("not a scene file (magic {found:?})")]
    BadMagic { found: [u8; 4] },

    #[error("unsupported scene version {found} (expected {})", SCENE_VERSION)]
    UnsupportedVersion { found: i32 },

    #[error("malformed scene header: {0}")]
    Header(#[from] StreamError),

    #[error("failed to load entity #{index}: {source}")]
    EntityLoad {
        index: usize,
        #[source]
        source: EcsError,
    },

    #[error("failed to save entity {entity}: {source}")]
    EntitySave {
        entity: EntityId,
        #[source]
        source: EcsError,
    },

    #[error("{count} unexpected bytes after the last entity record")]
    TrailingBytes { count: usize },

    #[error("too many entities to save: {0}")]
    TooManyEntities(usize),

    #[error("scene file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Per-entity outcome of [`Scene::load`], in record order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneLoadReport {
    pub entities: Vec<(EntityId, LoadReport)>,
}

impl SceneLoadReport {
    /// No entity skipped or failed a component.
    pub fn is_clean(&self) -> bool {
        self.entities.iter().all(|(_, report)| report.is_clean())
    }
}

// ---------------------------------------------------------------------------
// Scene
// ---------------------------------------------------------------------------

pub struct Scene {
    config: EngineConfig,
    physics: Rc<RefCell<PhysicsWorld>>,
    scripts: Rc<RefCell<ScriptHost>>,
    services: Services,
    pool: EntityPool,
    dirty: DirtySignal,
    guids: GuidGenerator,
    frame: u64,
}

impl Scene {
    /// An empty scene backed by the built-in physics world and script host.
    pub fn new(config: EngineConfig) -> Self {
        let physics = Rc::new(RefCell::new(PhysicsWorld::new(config.gravity)));
        let scripts = Rc::new(RefCell::new(ScriptHost::new()));
        let services = Services::new(physics.clone(), scripts.clone());
        Self {
            guids: GuidGenerator::from_seed_option(config.guid_seed),
            config,
            physics,
            scripts,
            services,
            pool: EntityPool::new(),
            dirty: DirtySignal::new(),
            frame: 0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Services handed to every entity of this scene.
    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn physics(&self) -> Ref<'_, PhysicsWorld> {
        self.physics.borrow()
    }

    pub fn physics_mut(&self) -> RefMut<'_, PhysicsWorld> {
        self.physics.borrow_mut()
    }

    pub fn scripts(&self) -> Ref<'_, ScriptHost> {
        self.scripts.borrow()
    }

    /// Register behaviours here before entities resolve them.
    pub fn scripts_mut(&self) -> RefMut<'_, ScriptHost> {
        self.scripts.borrow_mut()
    }

    /// Frames run so far, by [`update`](Self::update) or a tick loop.
    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    pub(crate) fn advance_frame(&mut self) {
        self.frame += 1;
    }

    // -- factories / lookup -------------------------------------------------

    /// Construct an entity with a fresh guid and register it.
    pub fn create_entity(&mut self) -> EntityId {
        let guid = self.guids.next_guid();
        let services = self.services.clone();
        let dirty = self.dirty.clone();
        let handle = self
            .pool
            .spawn_with(|handle| Entity::new(handle, guid, services, dirty));
        debug!(entity = %handle, "entity created");
        handle
    }

    pub fn create_named_entity(&mut self, name: &str) -> EntityId {
        let handle = self.create_entity();
        if let Some(entity) = self.pool.get_mut(handle) {
            entity.set_name(name);
        }
        handle
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.pool.get(id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.pool.get_mut(id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.pool.is_alive(id)
    }

    pub fn find_by_guid(&self, guid: &str) -> Option<EntityId> {
        self.pool.iter().find(|e| e.guid() == guid).map(Entity::handle)
    }

    /// First entity with this name, in slot order.
    pub fn find_by_name(&self, name: &str) -> Option<EntityId> {
        self.pool.iter().find(|e| e.name() == name).map(Entity::handle)
    }

    pub fn entity_count(&self) -> usize {
        self.pool.len()
    }

    /// Live handles in slot order.
    pub fn handles(&self) -> Vec<EntityId> {
        self.pool.handles()
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.pool.iter()
    }

    // -- structural changes -------------------------------------------------

    /// Destroy `id` at the end of the current frame.
    pub fn queue_destroy(&self, id: EntityId) {
        self.services.commands.push(SceneCommand::DestroyEntity(id));
    }

    /// Destroy `id` now. Returns `false` for stale or unknown handles.
    pub fn destroy_entity(&mut self, id: EntityId) -> bool {
        match self.pool.remove(id) {
            Some(mut entity) => {
                entity.destroy();
                debug!(entity = %id, "entity removed from scene");
                true
            }
            None => false,
        }
    }

    /// Apply every queued [`SceneCommand`] in FIFO order. Commands naming
    /// stale handles are dropped. Returns the number applied.
    pub fn flush_commands(&mut self) -> usize {
        let mut applied = 0;
        loop {
            let commands = self.services.commands.drain();
            if commands.is_empty() {
                break;
            }
            for command in commands {
                let done = match command {
                    SceneCommand::DestroyEntity(id) => self.destroy_entity(id),
                    SceneCommand::DetachComponent(id, kind) => self
                        .pool
                        .get_mut(id)
                        .is_some_and(|entity| entity.detach_kind(kind)),
                    SceneCommand::SetActive(id, active) => match self.pool.get_mut(id) {
                        Some(entity) => {
                            entity.set_active(active);
                            true
                        }
                        None => false,
                    },
                    SceneCommand::ReleasePhysics(release) => {
                        release.apply(&mut *self.physics.borrow_mut());
                        true
                    }
                };
                if done {
                    applied += 1;
                } else {
                    debug!(?command, "scene command had no effect");
                }
            }
        }
        applied
    }

    /// Update every active entity in slot order.
    pub fn update_entities(&mut self) {
        for entity in self.pool.iter_mut() {
            entity.update();
        }
    }

    /// One frame: update entities, then apply queued commands.
    pub fn update(&mut self) {
        self.update_entities();
        self.flush_commands();
        self.advance_frame();
    }

    /// Whether entities were created, destroyed or changed composition
    /// since the last [`take_dirty`](Self::take_dirty).
    pub fn is_dirty(&self) -> bool {
        self.dirty.is_raised()
    }

    pub fn take_dirty(&self) -> bool {
        self.dirty.take()
    }

    // -- persistence --------------------------------------------------------

    /// Encode every entity, in slot order, as a checksummed scene file.
    pub fn save(&self) -> Result<Vec<u8>, SceneError> {
        let count = i32::try_from(self.pool.len())
            .map_err(|_| SceneError::TooManyEntities(self.pool.len()))?;
        let mut out = SceneWriter::new();
        out.write_raw(&SCENE_MAGIC);
        out.write_i32(SCENE_VERSION);
        out.write_i32(count);
        for entity in self.pool.iter() {
            entity.save(&mut out).map_err(|source| SceneError::EntitySave {
                entity: entity.handle(),
                source,
            })?;
        }
        let digest = blake3::hash(out.as_bytes());
        out.write_raw(digest.as_bytes());

        let bytes = out.into_bytes();
        info!(entities = count, bytes = bytes.len(), "scene saved");
        Ok(bytes)
    }

    /// Replace every entity with the contents of a scene file.
    ///
    /// All-or-nothing: on error the current entities are untouched. Pending
    /// commands are discarded on success since they name the old entities.
    pub fn load(&mut self, bytes: &[u8]) -> Result<SceneLoadReport, SceneError> {
        let min = HEADER_LEN + DIGEST_LEN;
        if bytes.len() < min {
            return Err(SceneError::Truncated {
                len: bytes.len(),
                min,
            });
        }
        let (body, stored) = bytes.split_at(bytes.len() - DIGEST_LEN);
        let computed = blake3::hash(body);
        if computed.as_bytes() != stored {
            return Err(SceneError::ChecksumMismatch {
                stored: hex(stored),
                computed: computed.to_hex().to_string(),
            });
        }

        let mut input = SceneReader::new(body);
        let mut magic = [0u8; 4];
        magic.copy_from_slice(input.read_raw(4)?);
        if magic != SCENE_MAGIC {
            return Err(SceneError::BadMagic { found: magic });
        }
        let version = input.read_i32()?;
        if version != SCENE_VERSION {
            return Err(SceneError::UnsupportedVersion { found: version });
        }
        let count_offset = input.offset();
        let count = input.read_i32()?;
        let count = usize::try_from(count).map_err(|_| StreamError::NegativeLength {
            offset: count_offset,
            length: count,
        })?;

        let was_dirty = self.dirty.is_raised();
        let staged = self.stage_entities(&mut input, count);
        let (pool, report) = match staged {
            Ok(staged) => staged,
            Err(err) => {
                if !was_dirty {
                    self.dirty.take();
                }
                return Err(err);
            }
        };

        let old = std::mem::replace(&mut self.pool, pool);
        drop(old);
        self.services.commands.drain();
        self.dirty.raise();
        info!(
            entities = count,
            clean = report.is_clean(),
            "scene loaded"
        );
        Ok(report)
    }

    fn stage_entities(
        &mut self,
        input: &mut SceneReader<'_>,
        count: usize,
    ) -> Result<(EntityPool, SceneLoadReport), SceneError> {
        let mut pool = self.pool.successor();
        let mut report = SceneLoadReport::default();
        for index in 0..count {
            let services = self.services.clone();
            let dirty = self.dirty.clone();
            let handle = pool.spawn_with(|handle| Entity::new(handle, "", services, dirty));
            let entity = pool
                .get_mut(handle)
                .expect("entity was spawned just above");
            let entity_report = entity
                .load(input)
                .map_err(|source| SceneError::EntityLoad { index, source })?;
            report.entities.push((handle, entity_report));
        }
        if !input.is_exhausted() {
            return Err(SceneError::TrailingBytes {
                count: input.remaining(),
            });
        }
        Ok((pool, report))
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let bytes = self.save().context("failed to encode scene")?;
        std::fs::write(path, bytes).map_err(|source| SceneError::Io {
            path: path.to_owned(),
            source,
        })?;
        Ok(())
    }

    pub fn load_from_path(&mut self, path: impl AsRef<Path>) -> anyhow::Result<SceneLoadReport> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| SceneError::Io {
            path: path.to_owned(),
            source,
        })?;
        self.load(&bytes)
            .with_context(|| format!("failed to load scene file {}", path.display()))
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("entities", &self.pool.len())
            .field("frame", &self.frame)
            .field("dirty", &self.dirty.is_raised())
            .finish_non_exhaustive()
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
