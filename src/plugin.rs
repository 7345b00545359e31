//! Plugins and the per-stage scheduler.
//!
//! A plugin is anything that implements [`Plugin`]: a name, the list of
//! stages it hooks, and one method per hooked stage. Every per-stage method
//! defaults to a no-op, and a plugin is only ever invoked for the stages it
//! lists in [`Plugin::stages`].
//!
//! ## Ordering
//!
//! For a given stage the [`Registry`] runs hooked plugins sorted by
//! `(priority, registration index)`, both ascending, with a stable sort.
//! For a fixed set of registered plugins the order never changes between
//! runs or processes; output determinism and cache reuse depend on it.
//!
//! ```text
//! A  priority -10               ─┐
//! B  priority 0, registered 1st  ├─▶  A, B, C
//! C  priority 0, registered 2nd ─┘
//! ```
//!
//! The constants in [`priority`] are well-known integers, nothing more.

use crate::error::HookResult;
use crate::manager::Manager;
use crate::stage::Stage;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Well-known priorities. Lower runs earlier.
pub mod priority {
    pub const FIRST: i32 = -1000;
    pub const EARLY: i32 = -100;
    pub const DEFAULT: i32 = 0;
    pub const LATE: i32 = 100;
    pub const LAST: i32 = 1000;
}

/// A unit of behavior attached to one or more stages.
///
/// Hooks receive the manager by shared reference and go through its
/// accessors for any state they read or change.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// Stages this plugin hooks. The plugin is skipped for every other stage.
    fn stages(&self) -> &[Stage];

    /// Priority for `stage`. Lower runs earlier.
    fn priority(&self, _stage: Stage) -> i32 {
        priority::DEFAULT
    }

    fn configure(&self, _manager: &Manager) -> HookResult {
        Ok(())
    }

    fn validate(&self, _manager: &Manager) -> HookResult {
        Ok(())
    }

    fn glob(&self, _manager: &Manager) -> HookResult {
        Ok(())
    }

    fn load(&self, _manager: &Manager) -> HookResult {
        Ok(())
    }

    fn transform(&self, _manager: &Manager) -> HookResult {
        Ok(())
    }

    fn render(&self, _manager: &Manager) -> HookResult {
        Ok(())
    }

    fn collect(&self, _manager: &Manager) -> HookResult {
        Ok(())
    }

    fn write(&self, _manager: &Manager) -> HookResult {
        Ok(())
    }

    fn cleanup(&self, _manager: &Manager) -> HookResult {
        Ok(())
    }

    /// Invoke the hook for `stage`.
    fn run(&self, stage: Stage, manager: &Manager) -> HookResult {
        match stage {
            Stage::Configure => self.configure(manager),
            Stage::Validate => self.validate(manager),
            Stage::Glob => self.glob(manager),
            Stage::Load => self.load(manager),
            Stage::Transform => self.transform(manager),
            Stage::Render => self.render(manager),
            Stage::Collect => self.collect(manager),
            Stage::Write => self.write(manager),
            Stage::Cleanup => self.cleanup(manager),
        }
    }
}

type HookFn = Box<dyn Fn(&Manager) -> HookResult + Send + Sync>;

/// A plugin assembled from closures, one per hooked stage.
///
/// ```rust,ignore
/// let plugin = FnPlugin::new("word-count")
///     .on(Stage::Transform, |m| { /* ... */ Ok(()) })
///     .with_priority(Stage::Transform, priority::LATE);
/// ```
pub struct FnPlugin {
    name: String,
    stages: Vec<Stage>,
    hooks: BTreeMap<Stage, HookFn>,
    priorities: BTreeMap<Stage, i32>,
}

impl FnPlugin {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            hooks: BTreeMap::new(),
            priorities: BTreeMap::new(),
        }
    }

    /// Attach a hook for `stage`, replacing any earlier one.
    pub fn on<F>(mut self, stage: Stage, hook: F) -> Self
    where
        F: Fn(&Manager) -> HookResult + Send + Sync + 'static,
    {
        if self.hooks.insert(stage, Box::new(hook)).is_none() {
            self.stages.push(stage);
            self.stages.sort();
        }
        self
    }

    pub fn with_priority(mut self, stage: Stage, priority: i32) -> Self {
        self.priorities.insert(stage, priority);
        self
    }
}

impl fmt::Debug for FnPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnPlugin")
            .field("name", &self.name)
            .field("stages", &self.stages)
            .field("priorities", &self.priorities)
            .finish()
    }
}

impl Plugin for FnPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn stages(&self) -> &[Stage] {
        &self.stages
    }

    fn priority(&self, stage: Stage) -> i32 {
        self.priorities
            .get(&stage)
            .copied()
            .unwrap_or(priority::DEFAULT)
    }

    fn run(&self, stage: Stage, manager: &Manager) -> HookResult {
        match self.hooks.get(&stage) {
            Some(hook) => hook(manager),
            None => Ok(()),
        }
    }
}

/// Registered plugins in registration order.
#[derive(Default, Clone)]
pub struct Registry {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.plugins.iter().map(|p| p.name().to_string()).collect()
    }

    /// Plugins hooking `stage`, in execution order.
    pub fn schedule(&self, stage: Stage) -> Vec<Arc<dyn Plugin>> {
        let mut hooked: Vec<(i32, usize, &Arc<dyn Plugin>)> = self
            .plugins
            .iter()
            .enumerate()
            .filter(|(_, p)| p.stages().contains(&stage))
            .map(|(index, p)| (p.priority(stage), index, p))
            .collect();
        hooked.sort_by_key(|(priority, index, _)| (*priority, *index));
        hooked.into_iter().map(|(_, _, p)| Arc::clone(p)).collect()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
