//! Built-in script engine: named Rust functions registered by path.

use std::collections::HashMap;

use keystone_ecs::services::{ScriptContext, ScriptEngine, ScriptHandle};
use tracing::debug;

/// A script behaviour, run once per frame for every entity using it.
///
/// Structural changes (destroying the entity, detaching components) must go
/// through `ctx.commands`; they are applied after the frame.
pub type ScriptFn = fn(&mut ScriptContext<'_>);

#[derive(Debug)]
struct RegisteredScript {
    path: String,
    func: ScriptFn,
}

/// Resolves script paths to registered [`ScriptFn`]s.
#[derive(Debug, Default)]
pub struct ScriptHost {
    scripts: Vec<RegisteredScript>,
    by_path: HashMap<String, ScriptHandle>,
    runs: u64,
}

impl ScriptHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `func` under `path`. Registering a path again replaces its
    /// function and keeps its handle, so already-resolved scripts pick up
    /// the new behaviour.
    pub fn register(&mut self, path: &str, func: ScriptFn) -> ScriptHandle {
        if let Some(&handle) = self.by_path.get(path) {
            self.scripts[handle.0 as usize].func = func;
            debug!(path, "script replaced");
            return handle;
        }
        let handle = ScriptHandle(self.scripts.len() as u32);
        self.scripts.push(RegisteredScript {
            path: path.to_owned(),
            func,
        });
        self.by_path.insert(path.to_owned(), handle);
        debug!(path, handle = handle.0, "script registered");
        handle
    }

    pub fn contains(&self, path: &str) -> bool {
        self.by_path.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// Registered paths in registration order.
    pub fn paths(&self) -> Vec<&str> {
        self.scripts.iter().map(|s| s.path.as_str()).collect()
    }

    /// Total script updates run so far.
    pub fn run_count(&self) -> u64 {
        self.runs
    }
}

impl ScriptEngine for ScriptHost {
    fn resolve(&mut self, path: &str) -> Option<ScriptHandle> {
        self.by_path.get(path).copied()
    }

    fn run_update(&mut self, script: ScriptHandle, ctx: &mut ScriptContext<'_>) {
        if let Some(registered) = self.scripts.get(script.0 as usize) {
            (registered.func)(ctx);
            self.runs += 1;
        }
    }
}
