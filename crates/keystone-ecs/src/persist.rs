//! Entity record persistence.
//!
//! Record layout (all little-endian, see [`crate::stream`]):
//!
//! ```text
//! [guid:string][name:string][active:bool][visible:bool][count:i32]
//! count x [tag:string][payload:block]
//! ```
//!
//! Every payload is framed as a length-prefixed block, so a tag this build
//! does not know is skipped without losing the position of the next record.
//!
//! Loading runs in two phases. The parse phase reads the whole record and
//! fails without touching the entity if the stream is malformed. The commit
//! phase then applies it: identity and flags, removal of components absent
//! from the record, and one dispatch per component record.

use tracing::{debug, warn};

use crate::component::{Component, ComponentKind};
use crate::components::{
    Camera, Collider, Environment, Joint, Light, LineRenderer, MeshCollider, MeshData,
    MeshRenderer, RigidBody, Script, Spatial,
};
use crate::entity::Entity;
use crate::stream::{SceneReader, SceneWriter, StreamError};
use crate::EcsError;

/// Guid reported when a record fails before its guid was read.
const UNKNOWN_GUID: &str = "<unknown>";

/// Construct a default component of `kind`. This match is the tag dispatch
/// table: every catalog kind has exactly one arm.
pub(crate) fn instantiate(kind: ComponentKind) -> Box<dyn Component> {
    match kind {
        ComponentKind::Spatial => Box::<Spatial>::default(),
        ComponentKind::MeshData => Box::<MeshData>::default(),
        ComponentKind::MeshRenderer => Box::<MeshRenderer>::default(),
        ComponentKind::Light => Box::<Light>::default(),
        ComponentKind::Camera => Box::<Camera>::default(),
        ComponentKind::Environment => Box::<Environment>::default(),
        ComponentKind::RigidBody => Box::<RigidBody>::default(),
        ComponentKind::Collider => Box::<Collider>::default(),
        ComponentKind::MeshCollider => Box::<MeshCollider>::default(),
        ComponentKind::Joint => Box::<Joint>::default(),
        ComponentKind::Script => Box::<Script>::default(),
        ComponentKind::LineRenderer => Box::<LineRenderer>::default(),
    }
}

// ---------------------------------------------------------------------------
// LoadReport
// ---------------------------------------------------------------------------

/// A component record whose tag is not in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedComponent {
    pub tag: String,
    /// Absolute offset of the payload.
    pub offset: usize,
    pub len: usize,
}

/// A known component whose payload failed to decode.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedComponent {
    pub kind: ComponentKind,
    pub error: StreamError,
}

/// Outcome of a successful [`Entity::load`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// Kinds loaded, in record order.
    pub loaded: Vec<ComponentKind>,
    pub skipped: Vec<SkippedComponent>,
    pub failed: Vec<FailedComponent>,
}

impl LoadReport {
    /// Every component record was understood and decoded.
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.failed.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Parse phase
// ---------------------------------------------------------------------------

struct ComponentRecord<'a> {
    tag: String,
    offset: usize,
    payload: &'a [u8],
}

struct EntityRecord<'a> {
    guid: String,
    name: String,
    active: bool,
    visible: bool,
    components: Vec<ComponentRecord<'a>>,
}

fn parse_body<'a>(input: &mut SceneReader<'a>) -> Result<(String, bool, bool, Vec<ComponentRecord<'a>>), StreamError> {
    let name = input.read_string()?;
    let active = input.read_bool()?;
    let visible = input.read_bool()?;

    let count_offset = input.offset();
    let count = input.read_i32()?;
    let count = usize::try_from(count).map_err(|_| StreamError::NegativeLength {
        offset: count_offset,
        length: count,
    })?;

    // The smallest component record is two empty length prefixes.
    let mut components = Vec::with_capacity(count.min(input.remaining() / 8));
    for _ in 0..count {
        let tag = input.read_string()?;
        let (offset, payload) = input.read_block()?;
        components.push(ComponentRecord { tag, offset, payload });
    }
    Ok((name, active, visible, components))
}

fn parse_record<'a>(input: &mut SceneReader<'a>) -> Result<EntityRecord<'a>, EcsError> {
    let guid = input.read_string().map_err(|source| EcsError::Load {
        guid: UNKNOWN_GUID.to_owned(),
        source,
    })?;
    match parse_body(input) {
        Ok((name, active, visible, components)) => Ok(EntityRecord {
            guid,
            name,
            active,
            visible,
            components,
        }),
        Err(source) => Err(EcsError::Load { guid, source }),
    }
}

// ---------------------------------------------------------------------------
// Entity save / load
// ---------------------------------------------------------------------------

fn write_component(
    out: &mut SceneWriter,
    kind: ComponentKind,
    component: &dyn Component,
) -> Result<(), StreamError> {
    let mut payload = SceneWriter::new();
    component.save(&mut payload)?;
    out.write_str(kind.tag())?;
    out.write_block(payload.as_bytes())
}

impl Entity {
    /// Append this entity's record to `out`.
    pub fn save(&self, out: &mut SceneWriter) -> Result<(), EcsError> {
        if self.is_destroyed() {
            return Err(EcsError::EntityDestroyed {
                entity: self.handle(),
            });
        }
        self.write_header(out).map_err(|source| EcsError::Save {
            guid: self.guid.clone(),
            source,
        })?;
        for (kind, component) in self.registry.iter() {
            write_component(out, kind, component).map_err(|source| EcsError::ComponentSave {
                guid: self.guid.clone(),
                kind,
                source,
            })?;
        }
        Ok(())
    }

    fn write_header(&self, out: &mut SceneWriter) -> Result<(), StreamError> {
        out.write_str(&self.guid)?;
        out.write_str(&self.name)?;
        out.write_bool(self.active);
        out.write_bool(self.visible);
        out.write_i32(self.registry.len() as i32);
        Ok(())
    }

    /// This entity's record as a standalone byte vector.
    pub fn save_to_vec(&self) -> Result<Vec<u8>, EcsError> {
        let mut out = SceneWriter::new();
        self.save(&mut out)?;
        Ok(out.into_bytes())
    }

    /// Replace this entity's state with the record at the reader position.
    ///
    /// Malformed records are rejected before anything changes. Unknown tags
    /// and undecodable payloads are reported in the returned [`LoadReport`]
    /// and the rest of the record still loads. Components not mentioned in
    /// the record are detached, except Spatial.
    pub fn load(&mut self, input: &mut SceneReader<'_>) -> Result<LoadReport, EcsError> {
        if self.is_destroyed() {
            return Err(EcsError::EntityDestroyed {
                entity: self.handle(),
            });
        }
        let record = parse_record(input)?;
        Ok(self.commit(record))
    }

    /// [`load`](Entity::load) from a standalone record.
    pub fn load_from_slice(&mut self, bytes: &[u8]) -> Result<LoadReport, EcsError> {
        self.load(&mut SceneReader::new(bytes))
    }

    fn commit(&mut self, record: EntityRecord<'_>) -> LoadReport {
        self.guid = record.guid;
        self.name = record.name;
        self.active = record.active;
        self.visible = record.visible;

        let mut present = [false; ComponentKind::COUNT];
        for component in &record.components {
            if let Some(kind) = ComponentKind::from_tag(&component.tag) {
                present[kind.index()] = true;
            }
        }
        for kind in self.component_kinds() {
            if kind != ComponentKind::Spatial && !present[kind.index()] {
                self.registry.detach_kind(kind);
            }
        }

        let mut report = LoadReport::default();
        for component in record.components {
            let Some(kind) = ComponentKind::from_tag(&component.tag) else {
                warn!(
                    guid = %self.guid,
                    tag = %component.tag,
                    offset = component.offset,
                    len = component.payload.len(),
                    "skipping component with unknown tag"
                );
                report.skipped.push(SkippedComponent {
                    tag: component.tag,
                    offset: component.offset,
                    len: component.payload.len(),
                });
                continue;
            };

            let mut reader = SceneReader::with_base_offset(component.payload, component.offset);
            let result = self.registry.attach_kind(kind).load(&mut reader);
            match result {
                Ok(()) => {
                    if !reader.is_exhausted() {
                        debug!(
                            guid = %self.guid,
                            %kind,
                            trailing = reader.remaining(),
                            "ignoring trailing payload bytes"
                        );
                    }
                    report.loaded.push(kind);
                }
                Err(error) => {
                    warn!(guid = %self.guid, %kind, %error, "component payload failed to load");
                    if kind == ComponentKind::Spatial {
                        if let Some(spatial) = self.spatial_mut() {
                            spatial.reset();
                        }
                    } else {
                        self.registry.detach_kind(kind);
                    }
                    report.failed.push(FailedComponent { kind, error });
                }
            }
        }

        debug!(
            guid = %self.guid,
            loaded = report.loaded.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "entity loaded"
        );
        report
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
