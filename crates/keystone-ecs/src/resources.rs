//! Resource pools and the resource types components refer to by id.
//!
//! Resources are loaded by tooling outside this crate and registered in a
//! [`ResourcePool`]. Components persist only the resource id and resolve it
//! through the pool when attached or loaded; a missing id is not an error,
//! the component simply stays unresolved.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use glam::{Vec3, Vec4};

use crate::stream::{SceneReader, SceneWriter, StreamError};

/// Anything that can be stored in a [`ResourcePool`].
pub trait Resource {
    /// Unique id the resource is looked up by.
    fn id(&self) -> &str;
}

// ---------------------------------------------------------------------------
// ResourcePool
// ---------------------------------------------------------------------------

/// Id -> shared resource lookup table.
///
/// Read-mostly and shared between every component through
/// [`Services`](crate::services::Services); inserts go through a `RefCell`
/// so registering a resource does not require exclusive access to the pool.
#[derive(Debug)]
pub struct ResourcePool<T> {
    entries: RefCell<HashMap<String, Rc<T>>>,
}

impl<T: Resource> ResourcePool<T> {
    pub fn new() -> Self {
        Self {
            entries: RefCell::new(HashMap::new()),
        }
    }

    /// Register a resource, replacing any previous one with the same id.
    pub fn insert(&self, resource: T) -> Rc<T> {
        let resource = Rc::new(resource);
        self.entries
            .borrow_mut()
            .insert(resource.id().to_owned(), Rc::clone(&resource));
        resource
    }

    /// Resolve an id to a shared handle.
    pub fn lookup(&self, id: &str) -> Option<Rc<T>> {
        self.entries.borrow().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.borrow().contains_key(id)
    }

    pub fn remove(&self, id: &str) -> Option<Rc<T>> {
        self.entries.borrow_mut().remove(id)
    }
}

impl<T> ResourcePool<T> {
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl<T: Resource> Default for ResourcePool<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// RenderDevice
// ---------------------------------------------------------------------------

/// Opaque handle to the rendering device.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderDevice {
    /// Adapter description, `"headless"` when no GPU is attached.
    pub adapter: String,
}

impl RenderDevice {
    pub fn headless() -> Self {
        Self {
            adapter: "headless".to_owned(),
        }
    }

    pub fn is_headless(&self) -> bool {
        self.adapter == "headless"
    }
}

// ---------------------------------------------------------------------------
// Mesh / Material / Shader
// ---------------------------------------------------------------------------

/// Triangle mesh geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub id: String,
    pub name: String,
    pub vertices: Vec<Vec3>,
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Axis-aligned bounds as `(min, max)`, or `None` for an empty mesh.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.vertices.first()?;
        Some(
            self.vertices
                .iter()
                .fold((first, first), |(lo, hi), v| (lo.min(*v), hi.max(*v))),
        )
    }
}

impl Resource for Mesh {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub id: String,
    pub name: String,
    pub shader_id: String,
    pub albedo: Vec4,
    pub roughness: f32,
    pub metallic: f32,
    /// Texture id of the albedo map, if any.
    pub albedo_texture: Option<String>,
}

impl Resource for Material {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shader {
    pub id: String,
    pub name: String,
    pub path: String,
}

impl Resource for Shader {
    fn id(&self) -> &str {
        &self.id
    }
}

// ---------------------------------------------------------------------------
// Texture
// ---------------------------------------------------------------------------

/// How a texture is sampled by materials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureKind {
    #[default]
    Albedo,
    Roughness,
    Metallic,
    Normal,
    Height,
    Occlusion,
    Emission,
    Mask,
    CubeMap,
}

impl TextureKind {
    const ALL: [TextureKind; 9] = [
        TextureKind::Albedo,
        TextureKind::Roughness,
        TextureKind::Metallic,
        TextureKind::Normal,
        TextureKind::Height,
        TextureKind::Occlusion,
        TextureKind::Emission,
        TextureKind::Mask,
        TextureKind::CubeMap,
    ];

    fn to_i32(self) -> i32 {
        self as i32
    }

    fn from_i32(value: i32) -> Option<Self> {
        usize::try_from(value)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }
}

/// Texture metadata. Pixel data and GPU views live with the renderer; only
/// the description is owned here and persisted next to the image file.
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub id: String,
    pub name: String,
    pub file_path: String,
    pub metadata_path: String,
    pub width: i32,
    pub height: i32,
    pub kind: TextureKind,
    pub grayscale: bool,
    pub transparency: bool,
}

impl Default for Texture {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: "N/A".to_owned(),
            file_path: "N/A".to_owned(),
            metadata_path: "N/A".to_owned(),
            width: 0,
            height: 0,
            kind: TextureKind::Albedo,
            grayscale: false,
            transparency: false,
        }
    }
}

impl Texture {
    /// Write the metadata record:
    /// `[id][name][file_path][metadata_path][width][height][kind][grayscale][transparency]`.
    pub fn write_metadata(&self, out: &mut SceneWriter) -> Result<(), StreamError> {
        out.write_str(&self.id)?;
        out.write_str(&self.name)?;
        out.write_str(&self.file_path)?;
        out.write_str(&self.metadata_path)?;
        out.write_i32(self.width);
        out.write_i32(self.height);
        out.write_i32(self.kind.to_i32());
        out.write_bool(self.grayscale);
        out.write_bool(self.transparency);
        Ok(())
    }

    /// Read a record written by [`write_metadata`](Self::write_metadata).
    pub fn read_metadata(input: &mut SceneReader<'_>) -> Result<Self, StreamError> {
        let id = input.read_string()?;
        let name = input.read_string()?;
        let file_path = input.read_string()?;
        let metadata_path = input.read_string()?;
        let width = input.read_i32()?;
        let height = input.read_i32()?;
        let offset = input.offset();
        let raw_kind = input.read_i32()?;
        let kind = TextureKind::from_i32(raw_kind).ok_or(StreamError::InvalidDiscriminant {
            offset,
            what: "texture kind",
            value: raw_kind,
        })?;
        Ok(Self {
            id,
            name,
            file_path,
            metadata_path,
            width,
            height,
            kind,
            grayscale: input.read_bool()?,
            transparency: input.read_bool()?,
        })
    }
}

impl Resource for Texture {
    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skybox_texture() -> Texture {
        Texture {
            id: "tex-sky".to_owned(),
            name: "sky".to_owned(),
            file_path: "assets/sky.dds".to_owned(),
            metadata_path: "assets/sky.dds.meta".to_owned(),
            width: 2048,
            height: 2048,
            kind: TextureKind::CubeMap,
            grayscale: false,
            transparency: true,
        }
    }

    #[test]
    fn pool_lookup_and_replace() {
        let pool = ResourcePool::new();
        pool.insert(skybox_texture());
        assert!(pool.contains("tex-sky"));
        assert!(pool.lookup("missing").is_none());

        let mut wider = skybox_texture();
        wider.width = 4096;
        pool.insert(wider);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.lookup("tex-sky").unwrap().width, 4096);
    }

    #[test]
    fn texture_metadata_survives_stream() {
        let texture = skybox_texture();
        let mut w = SceneWriter::new();
        texture.write_metadata(&mut w).unwrap();
        let mut r = SceneReader::new(w.as_bytes());
        assert_eq!(Texture::read_metadata(&mut r).unwrap(), texture);
        assert!(r.is_exhausted());
    }

    #[test]
    fn texture_metadata_rejects_unknown_kind() {
        let mut texture = skybox_texture();
        texture.id = String::new();
        let mut w = SceneWriter::new();
        texture.write_metadata(&mut w).unwrap();
        let mut bytes = w.into_bytes();
        // kind sits right before the two trailing bools
        let kind_at = bytes.len() - 2 - 4;
        bytes[kind_at..kind_at + 4].copy_from_slice(&42i32.to_le_bytes());

        let err = Texture::read_metadata(&mut SceneReader::new(&bytes)).unwrap_err();
        assert_eq!(
            err,
            StreamError::InvalidDiscriminant {
                offset: kind_at,
                what: "texture kind",
                value: 42
            }
        );
    }

    #[test]
    fn mesh_bounds() {
        let mesh = Mesh {
            id: "m".to_owned(),
            name: "m".to_owned(),
            vertices: vec![Vec3::new(-1.0, 0.0, 2.0), Vec3::new(3.0, -2.0, 0.0)],
            indices: vec![],
        };
        assert_eq!(
            mesh.bounds(),
            Some((Vec3::new(-1.0, -2.0, 0.0), Vec3::new(3.0, 0.0, 2.0)))
        );
    }
}
