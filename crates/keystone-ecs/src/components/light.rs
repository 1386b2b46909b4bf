use std::any::Any;

use glam::Vec4;

use crate::component::{Component, ComponentKind};
use crate::stream::{SceneReader, SceneWriter, StreamError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LightKind {
    #[default]
    Directional,
    Point,
    Spot,
}

impl LightKind {
    fn to_i32(self) -> i32 {
        match self {
            LightKind::Directional => 0,
            LightKind::Point => 1,
            LightKind::Spot => 2,
        }
    }

    fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(LightKind::Directional),
            1 => Some(LightKind::Point),
            2 => Some(LightKind::Spot),
            _ => None,
        }
    }
}

/// A light source positioned by the entity's Spatial.
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub light_kind: LightKind,
    pub color: Vec4,
    pub intensity: f32,
    pub range: f32,
    /// Cone angle in degrees, only meaningful for spot lights.
    pub spot_angle: f32,
    pub cast_shadows: bool,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            light_kind: LightKind::Directional,
            color: Vec4::ONE,
            intensity: 2.0,
            range: 1.0,
            spot_angle: 30.0,
            cast_shadows: true,
        }
    }
}

impl Component for Light {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Light
    }

    fn save(&self, out: &mut SceneWriter) -> Result<(), StreamError> {
        out.write_i32(self.light_kind.to_i32());
        out.write_vec4(self.color);
        out.write_f32(self.intensity);
        out.write_f32(self.range);
        out.write_f32(self.spot_angle);
        out.write_bool(self.cast_shadows);
        Ok(())
    }

    fn load(&mut self, input: &mut SceneReader<'_>) -> Result<(), StreamError> {
        let offset = input.offset();
        let raw = input.read_i32()?;
        self.light_kind = LightKind::from_i32(raw).ok_or(StreamError::InvalidDiscriminant {
            offset,
            what: "light kind",
            value: raw,
        })?;
        self.color = input.read_vec4()?;
        self.intensity = input.read_f32()?;
        self.range = input.read_f32()?;
        self.spot_angle = input.read_f32()?;
        self.cast_shadows = input.read_bool()?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
