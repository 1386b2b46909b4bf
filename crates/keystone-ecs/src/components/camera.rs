use std::any::Any;

use glam::{Mat4, Vec4};

use crate::component::{Component, ComponentKind, FrameContext};
use crate::stream::{SceneReader, SceneWriter, StreamError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Projection {
    #[default]
    Perspective,
    Orthographic,
}

/// A viewpoint placed by the entity's Spatial.
///
/// The view matrix is refreshed every frame from the working transform.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub projection: Projection,
    /// Vertical field of view in degrees (perspective only).
    pub fov_degrees: f32,
    pub near_plane: f32,
    pub far_plane: f32,
    /// Half-height of the view volume (orthographic only).
    pub orthographic_size: f32,
    pub clear_color: Vec4,
    view: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            projection: Projection::Perspective,
            fov_degrees: 45.0,
            near_plane: 0.3,
            far_plane: 1000.0,
            orthographic_size: 5.0,
            clear_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            view: Mat4::IDENTITY,
        }
    }
}

impl Camera {
    /// World-to-view matrix as of the last update.
    pub fn view_matrix(&self) -> Mat4 {
        self.view
    }

    /// Right-handed projection matrix for the given aspect ratio.
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        match self.projection {
            Projection::Perspective => Mat4::perspective_rh(
                self.fov_degrees.to_radians(),
                aspect,
                self.near_plane,
                self.far_plane,
            ),
            Projection::Orthographic => {
                let h = self.orthographic_size;
                let w = h * aspect;
                Mat4::orthographic_rh(-w, w, -h, h, self.near_plane, self.far_plane)
            }
        }
    }
}

impl Component for Camera {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Camera
    }

    fn update(&mut self, frame: &mut FrameContext<'_>) {
        self.view = frame.transform.to_matrix().inverse();
    }

    fn save(&self, out: &mut SceneWriter) -> Result<(), StreamError> {
        out.write_i32(match self.projection {
            Projection::Perspective => 0,
            Projection::Orthographic => 1,
        });
        out.write_f32(self.fov_degrees);
        out.write_f32(self.near_plane);
        out.write_f32(self.far_plane);
        out.write_f32(self.orthographic_size);
        out.write_vec4(self.clear_color);
        Ok(())
    }

    fn load(&mut self, input: &mut SceneReader<'_>) -> Result<(), StreamError> {
        let offset = input.offset();
        self.projection = match input.read_i32()? {
            0 => Projection::Perspective,
            1 => Projection::Orthographic,
            value => {
                return Err(StreamError::InvalidDiscriminant {
                    offset,
                    what: "projection",
                    value,
                })
            }
        };
        self.fov_degrees = input.read_f32()?;
        self.near_plane = input.read_f32()?;
        self.far_plane = input.read_f32()?;
        self.orthographic_size = input.read_f32()?;
        self.clear_color = input.read_vec4()?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
