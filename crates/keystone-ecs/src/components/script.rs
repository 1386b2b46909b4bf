//! Per-frame behaviour driven by the [`ScriptEngine`] service.
//!
//! Scripts see the entity's working transform and may only change the
//! scene through the [`CommandQueue`], applied after the frame.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::component::{Component, ComponentKind, ComponentLink, FrameContext};
use crate::services::{CommandQueue, ScriptContext, ScriptEngine, ScriptHandle};
use crate::stream::{SceneReader, SceneWriter, StreamError};

/// Runs a script from the script engine once per frame.
///
/// The path is resolved lazily on the first update. A path that does not
/// resolve is reported once and the component stays inert until the path
/// changes.
#[derive(Default)]
pub struct Script {
    path: String,
    handle: Option<ScriptHandle>,
    resolve_attempted: bool,
    scripts: Option<Rc<RefCell<dyn ScriptEngine>>>,
    commands: Option<CommandQueue>,
}

impl Script {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
        self.handle = None;
        self.resolve_attempted = false;
    }

    /// Whether the path resolved to a runnable script.
    pub fn is_resolved(&self) -> bool {
        self.handle.is_some()
    }

    fn resolve(&mut self) {
        self.resolve_attempted = true;
        if self.path.is_empty() {
            return;
        }
        let Some(scripts) = &self.scripts else {
            return;
        };
        let Ok(mut engine) = scripts.try_borrow_mut() else {
            warn!(path = %self.path, "script engine is busy; deferring resolve");
            self.resolve_attempted = false;
            return;
        };
        self.handle = engine.resolve(&self.path);
        match self.handle {
            Some(handle) => debug!(path = %self.path, handle = handle.0, "script resolved"),
            None => warn!(path = %self.path, "script path does not resolve"),
        }
    }
}

impl Component for Script {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Script
    }

    fn initialize(&mut self, link: &ComponentLink) {
        self.scripts = Some(Rc::clone(&link.services().scripts));
        self.commands = Some(link.services().commands.clone());
    }

    fn update(&mut self, frame: &mut FrameContext<'_>) {
        if !self.resolve_attempted {
            self.resolve();
        }
        let (Some(handle), Some(scripts), Some(commands)) =
            (self.handle, &self.scripts, &self.commands)
        else {
            return;
        };
        let Ok(mut engine) = scripts.try_borrow_mut() else {
            warn!(path = %self.path, "script engine is busy; skipping update");
            return;
        };
        let mut ctx = ScriptContext {
            entity: frame.link.entity(),
            transform: &mut *frame.transform,
            commands,
        };
        engine.run_update(handle, &mut ctx);
    }

    fn save(&self, out: &mut SceneWriter) -> Result<(), StreamError> {
        out.write_str(&self.path)
    }

    fn load(&mut self, input: &mut SceneReader<'_>) -> Result<(), StreamError> {
        let path = input.read_string()?;
        self.set_path(path);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl std::fmt::Debug for Script {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Script")
            .field("path", &self.path)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}
