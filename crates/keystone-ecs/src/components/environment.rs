use std::any::Any;
use std::rc::Rc;

use crate::component::{Component, ComponentKind, ComponentLink};
use crate::components::mesh::resolve_resource;
use crate::resources::{ResourcePool, Texture};
use crate::stream::{SceneReader, SceneWriter, StreamError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvironmentKind {
    #[default]
    Cubemap,
    Sphere,
}

/// Skybox / image-based lighting environment.
#[derive(Debug, Default)]
pub struct Environment {
    pub environment_kind: EnvironmentKind,
    texture_id: String,
    texture: Option<Rc<Texture>>,
    pool: Option<Rc<ResourcePool<Texture>>>,
}

impl Environment {
    pub fn texture_id(&self) -> &str {
        &self.texture_id
    }

    pub fn texture(&self) -> Option<&Rc<Texture>> {
        self.texture.as_ref()
    }

    pub fn set_texture_id(&mut self, id: impl Into<String>) {
        self.texture_id = id.into();
        self.texture = resolve_resource(self.pool.as_deref(), &self.texture_id, "texture");
    }
}

impl Component for Environment {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Environment
    }

    fn initialize(&mut self, link: &ComponentLink) {
        self.pool = Some(Rc::clone(&link.services().textures));
    }

    fn save(&self, out: &mut SceneWriter) -> Result<(), StreamError> {
        out.write_i32(match self.environment_kind {
            EnvironmentKind::Cubemap => 0,
            EnvironmentKind::Sphere => 1,
        });
        out.write_str(&self.texture_id)
    }

    fn load(&mut self, input: &mut SceneReader<'_>) -> Result<(), StreamError> {
        let offset = input.offset();
        self.environment_kind = match input.read_i32()? {
            0 => EnvironmentKind::Cubemap,
            1 => EnvironmentKind::Sphere,
            value => {
                return Err(StreamError::InvalidDiscriminant {
                    offset,
                    what: "environment kind",
                    value,
                })
            }
        };
        let id = input.read_string()?;
        self.set_texture_id(id);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
