//! Component kinds, the [`Component`] capability trait, and back-references.
//!
//! The component catalog is closed: every kind the engine knows about is a
//! variant of [`ComponentKind`], and its [`tag`](ComponentKind::tag) is both the
//! registry key and the marker written to disk ahead of each payload. Adding
//! a kind means adding a variant here, a type implementing [`ComponentType`],
//! and an arm in the load dispatcher.

use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::components::Transform;
use crate::entity::EntityId;
use crate::services::Services;
use crate::stream::{SceneReader, SceneWriter, StreamError};

// ---------------------------------------------------------------------------
// ComponentKind
// ---------------------------------------------------------------------------

/// Discriminator for every component type the engine can store or persist.
///
/// Declaration order is significant: it is the slot order of the registry,
/// and therefore both the per-frame update order and the save order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentKind {
    Spatial,
    MeshData,
    MeshRenderer,
    Light,
    Camera,
    Environment,
    RigidBody,
    Collider,
    MeshCollider,
    Joint,
    Script,
    LineRenderer,
}

impl ComponentKind {
    /// Number of kinds; the size of the registry's slot table.
    pub const COUNT: usize = 12;

    /// Every kind, in slot order.
    pub const ALL: [ComponentKind; Self::COUNT] = [
        ComponentKind::Spatial,
        ComponentKind::MeshData,
        ComponentKind::MeshRenderer,
        ComponentKind::Light,
        ComponentKind::Camera,
        ComponentKind::Environment,
        ComponentKind::RigidBody,
        ComponentKind::Collider,
        ComponentKind::MeshCollider,
        ComponentKind::Joint,
        ComponentKind::Script,
        ComponentKind::LineRenderer,
    ];

    /// The stable on-disk tag.
    pub const fn tag(self) -> &'static str {
        match self {
            ComponentKind::Spatial => "Spatial",
            ComponentKind::MeshData => "MeshData",
            ComponentKind::MeshRenderer => "MeshRenderer",
            ComponentKind::Light => "Light",
            ComponentKind::Camera => "Camera",
            ComponentKind::Environment => "Environment",
            ComponentKind::RigidBody => "RigidBody",
            ComponentKind::Collider => "Collider",
            ComponentKind::MeshCollider => "MeshCollider",
            ComponentKind::Joint => "Joint",
            ComponentKind::Script => "Script",
            ComponentKind::LineRenderer => "LineRenderer",
        }
    }

    /// Resolve an on-disk tag. Returns `None` for tags outside the catalog.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    /// Slot index in the registry.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// ---------------------------------------------------------------------------
// ComponentLink
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct LinkState {
    kind: ComponentKind,
    entity: Cell<Option<EntityId>>,
    spatial: Cell<Option<EntityId>>,
    services: Services,
}

/// Non-owning back-references from a component to its owner.
///
/// Created by the registry when the component is attached and shared with the
/// component through [`Component::initialize`]. The entity and spatial
/// handles stay `Some` for the whole attached lifetime and are cleared exactly
/// once, when the component is detached or its entity is destroyed. Holders
/// of a cloned link observe the cleared state rather than a dangling owner.
#[derive(Debug, Clone)]
pub struct ComponentLink(Rc<LinkState>);

impl ComponentLink {
    pub(crate) fn new(kind: ComponentKind, owner: EntityId, services: Services) -> Self {
        Self(Rc::new(LinkState {
            kind,
            entity: Cell::new(Some(owner)),
            spatial: Cell::new(Some(owner)),
            services,
        }))
    }

    /// Kind of the component this link belongs to.
    pub fn kind(&self) -> ComponentKind {
        self.0.kind
    }

    /// Handle of the owning entity, or `None` once detached.
    pub fn entity(&self) -> Option<EntityId> {
        self.0.entity.get()
    }

    /// Handle of the entity whose Spatial places this component, or `None`
    /// once detached.
    pub fn spatial(&self) -> Option<EntityId> {
        self.0.spatial.get()
    }

    /// Whether the back-references are still valid.
    pub fn is_attached(&self) -> bool {
        self.entity().is_some()
    }

    /// Shared engine services injected at attach time.
    pub fn services(&self) -> &Services {
        &self.0.services
    }

    pub(crate) fn clear(&self) {
        self.0.entity.set(None);
        self.0.spatial.set(None);
    }
}

// ---------------------------------------------------------------------------
// FrameContext
// ---------------------------------------------------------------------------

/// Per-frame view handed to [`Component::update`].
///
/// `transform` is the entity's working transform for this frame. Components
/// may read or modify it; the Spatial component adopts the final value after
/// every other component has run.
pub struct FrameContext<'a> {
    pub link: &'a ComponentLink,
    pub transform: &'a mut Transform,
}

// ---------------------------------------------------------------------------
// Component traits
// ---------------------------------------------------------------------------

/// Capability set shared by every component: initialize, update, save, load.
///
/// Releasing a component is its `Drop`; components that registered with a
/// service undo that registration there.
pub trait Component: Any {
    /// Kind of this component instance.
    fn kind(&self) -> ComponentKind;

    /// Called once, right after the component is attached.
    fn initialize(&mut self, _link: &ComponentLink) {}

    /// Called once per frame while the owning entity is active.
    fn update(&mut self, _frame: &mut FrameContext<'_>) {}

    /// Write the component payload. The caller frames it as a block.
    fn save(&self, out: &mut SceneWriter) -> Result<(), StreamError>;

    /// Read the component payload written by [`save`](Component::save).
    fn load(&mut self, input: &mut SceneReader<'_>) -> Result<(), StreamError>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

pub(crate) mod sealed {
    pub trait Sealed {}
}

/// A concrete component type from the catalog.
///
/// Sealed: the catalog is closed, and each [`ComponentKind`] has exactly one
/// implementing type.
pub trait ComponentType: Component + Default + sealed::Sealed {
    const KIND: ComponentKind;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
