use std::any::Any;

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::component::{Component, ComponentKind, FrameContext};
use crate::stream::{SceneReader, SceneWriter, StreamError};

/// One colored segment in entity-local space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineSegment {
    pub from: Vec3,
    pub to: Vec3,
    pub color: Vec4,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LinePayload {
    width: f32,
    segments: Vec<LineSegment>,
}

/// Debug line drawing. World-space vertices are rebuilt every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LineRenderer {
    pub width: f32,
    segments: Vec<LineSegment>,
    world_vertices: Vec<Vec3>,
}

impl Default for LineRenderer {
    fn default() -> Self {
        Self {
            width: 1.0,
            segments: Vec::new(),
            world_vertices: Vec::new(),
        }
    }
}

impl LineRenderer {
    pub fn segments(&self) -> &[LineSegment] {
        &self.segments
    }

    pub fn add_segment(&mut self, from: Vec3, to: Vec3, color: Vec4) {
        self.segments.push(LineSegment { from, to, color });
    }

    pub fn clear(&mut self) {
        self.segments.clear();
        self.world_vertices.clear();
    }

    /// Segment endpoints transformed by the last update, two per segment.
    pub fn world_vertices(&self) -> &[Vec3] {
        &self.world_vertices
    }
}

impl Component for LineRenderer {
    fn kind(&self) -> ComponentKind {
        ComponentKind::LineRenderer
    }

    fn update(&mut self, frame: &mut FrameContext<'_>) {
        let model = frame.transform.to_matrix();
        self.world_vertices.clear();
        self.world_vertices.extend(
            self.segments
                .iter()
                .flat_map(|s| [model.transform_point3(s.from), model.transform_point3(s.to)]),
        );
    }

    fn save(&self, out: &mut SceneWriter) -> Result<(), StreamError> {
        out.write_value(&LinePayload {
            width: self.width,
            segments: self.segments.clone(),
        })
    }

    fn load(&mut self, input: &mut SceneReader<'_>) -> Result<(), StreamError> {
        let payload: LinePayload = input.read_value()?;
        self.width = payload.width;
        self.segments = payload.segments;
        self.world_vertices.clear();
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
