//! The mandatory placement component.

use std::any::Any;

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::component::{Component, ComponentKind, FrameContext};
use crate::stream::{SceneReader, SceneWriter, StreamError};

/// Translation, rotation and non-uniform scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    #[must_use]
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    /// Model matrix (scale, then rotate, then translate).
    #[must_use]
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Unit forward direction (-Z rotated).
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Placement of an entity. Every entity owns exactly one for its whole life.
#[derive(Debug, Clone, PartialEq)]
pub struct Spatial {
    transform: Transform,
    matrix: Mat4,
}

impl Spatial {
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
        self.matrix = transform.to_matrix();
    }

    pub fn translation(&self) -> Vec3 {
        self.transform.translation
    }

    pub fn set_translation(&mut self, translation: Vec3) {
        self.set_transform(Transform {
            translation,
            ..self.transform
        });
    }

    pub fn rotation(&self) -> Quat {
        self.transform.rotation
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.set_transform(Transform {
            rotation,
            ..self.transform
        });
    }

    pub fn scale(&self) -> Vec3 {
        self.transform.scale
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.set_transform(Transform {
            scale,
            ..self.transform
        });
    }

    /// Cached model matrix of the current transform.
    pub fn matrix(&self) -> Mat4 {
        self.matrix
    }

    /// Back to the identity transform.
    pub fn reset(&mut self) {
        self.set_transform(Transform::IDENTITY);
    }
}

impl Default for Spatial {
    fn default() -> Self {
        Self {
            transform: Transform::IDENTITY,
            matrix: Mat4::IDENTITY,
        }
    }
}

impl Component for Spatial {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Spatial
    }

    /// Adopts the frame's final working transform.
    fn update(&mut self, frame: &mut FrameContext<'_>) {
        if *frame.transform != self.transform {
            self.set_transform(*frame.transform);
        }
    }

    fn save(&self, out: &mut SceneWriter) -> Result<(), StreamError> {
        out.write_vec3(self.transform.translation);
        out.write_quat(self.transform.rotation);
        out.write_vec3(self.transform.scale);
        Ok(())
    }

    fn load(&mut self, input: &mut SceneReader<'_>) -> Result<(), StreamError> {
        let translation = input.read_vec3()?;
        let rotation = input.read_quat()?;
        let scale = input.read_vec3()?;
        self.set_transform(Transform {
            translation,
            rotation,
            scale,
        });
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setters_refresh_matrix() {
        let mut spatial = Spatial::default();
        spatial.set_translation(Vec3::new(1.0, 2.0, 3.0));
        spatial.set_scale(Vec3::splat(2.0));
        let expected =
            Mat4::from_scale_rotation_translation(Vec3::splat(2.0), Quat::IDENTITY, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(spatial.matrix(), expected);

        spatial.reset();
        assert_eq!(spatial.matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn payload_is_ten_floats() {
        let mut spatial = Spatial::default();
        spatial.set_rotation(Quat::from_rotation_y(0.5));
        let mut w = SceneWriter::new();
        spatial.save(&mut w).unwrap();
        assert_eq!(w.len(), 10 * 4);

        let mut loaded = Spatial::default();
        loaded.load(&mut SceneReader::new(w.as_bytes())).unwrap();
        assert_eq!(loaded, spatial);
    }

    #[test]
    fn forward_follows_rotation() {
        let t = Transform {
            rotation: Quat::from_rotation_y(std::f32::consts::PI),
            ..Transform::IDENTITY
        };
        assert!((t.forward() - Vec3::Z).length() < 1e-5);
    }
}
