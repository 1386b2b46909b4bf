//! Mesh geometry and mesh rendering components.
//!
//! Both components persist resource ids only. The shared handles are
//! resolved through the resource pools captured at attach time, both when the
//! id is set programmatically and when it is loaded from a stream.

use std::any::Any;
use std::rc::Rc;

use tracing::warn;

use crate::component::{Component, ComponentKind, ComponentLink};
use crate::resources::{Material, Mesh, ResourcePool};
use crate::stream::{SceneReader, SceneWriter, StreamError};

// ---------------------------------------------------------------------------
// MeshData
// ---------------------------------------------------------------------------

/// Geometry attached to an entity, referenced by mesh id.
#[derive(Debug, Default)]
pub struct MeshData {
    mesh_id: String,
    mesh: Option<Rc<Mesh>>,
    pool: Option<Rc<ResourcePool<Mesh>>>,
}

impl MeshData {
    pub fn mesh_id(&self) -> &str {
        &self.mesh_id
    }

    /// The resolved mesh, `None` if the id is empty or not in the pool.
    pub fn mesh(&self) -> Option<&Rc<Mesh>> {
        self.mesh.as_ref()
    }

    pub fn set_mesh_id(&mut self, id: impl Into<String>) {
        self.mesh_id = id.into();
        self.resolve();
    }

    pub fn vertex_count(&self) -> usize {
        self.mesh.as_ref().map_or(0, |m| m.vertices.len())
    }

    fn resolve(&mut self) {
        self.mesh = resolve_resource(self.pool.as_deref(), &self.mesh_id, "mesh");
    }
}

impl Component for MeshData {
    fn kind(&self) -> ComponentKind {
        ComponentKind::MeshData
    }

    fn initialize(&mut self, link: &ComponentLink) {
        self.pool = Some(Rc::clone(&link.services().meshes));
    }

    fn save(&self, out: &mut SceneWriter) -> Result<(), StreamError> {
        out.write_str(&self.mesh_id)
    }

    fn load(&mut self, input: &mut SceneReader<'_>) -> Result<(), StreamError> {
        self.mesh_id = input.read_string()?;
        self.resolve();
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// MeshRenderer
// ---------------------------------------------------------------------------

/// Draws the entity's [`MeshData`] with a material.
#[derive(Debug)]
pub struct MeshRenderer {
    material_id: String,
    pub cast_shadows: bool,
    pub receive_shadows: bool,
    material: Option<Rc<Material>>,
    pool: Option<Rc<ResourcePool<Material>>>,
}

impl Default for MeshRenderer {
    fn default() -> Self {
        Self {
            material_id: String::new(),
            cast_shadows: true,
            receive_shadows: true,
            material: None,
            pool: None,
        }
    }
}

impl MeshRenderer {
    pub fn material_id(&self) -> &str {
        &self.material_id
    }

    pub fn material(&self) -> Option<&Rc<Material>> {
        self.material.as_ref()
    }

    pub fn set_material_id(&mut self, id: impl Into<String>) {
        self.material_id = id.into();
        self.resolve();
    }

    fn resolve(&mut self) {
        self.material = resolve_resource(self.pool.as_deref(), &self.material_id, "material");
    }
}

impl Component for MeshRenderer {
    fn kind(&self) -> ComponentKind {
        ComponentKind::MeshRenderer
    }

    fn initialize(&mut self, link: &ComponentLink) {
        self.pool = Some(Rc::clone(&link.services().materials));
    }

    fn save(&self, out: &mut SceneWriter) -> Result<(), StreamError> {
        out.write_str(&self.material_id)?;
        out.write_bool(self.cast_shadows);
        out.write_bool(self.receive_shadows);
        Ok(())
    }

    fn load(&mut self, input: &mut SceneReader<'_>) -> Result<(), StreamError> {
        self.material_id = input.read_string()?;
        self.cast_shadows = input.read_bool()?;
        self.receive_shadows = input.read_bool()?;
        self.resolve();
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Look `id` up in `pool`, warning when a non-empty id does not resolve.
pub(crate) fn resolve_resource<T: crate::resources::Resource>(
    pool: Option<&ResourcePool<T>>,
    id: &str,
    what: &'static str,
) -> Option<Rc<T>> {
    if id.is_empty() {
        return None;
    }
    let found = pool.and_then(|p| p.lookup(id));
    if found.is_none() {
        warn!(resource = what, id, "resource id does not resolve in its pool");
    }
    found
}
