//! Severity-tagged failures raised by plugin hooks.
//!
//! Hooks never abort the pipeline directly. They return (or collect) one or
//! more [`HookError`]s and the [`Manager`](crate::manager::Manager) decides
//! what happens next:
//!
//! - **Warning**: recorded and surfaced through `Manager::warnings()`. The
//!   build carries on.
//! - **Critical**: once every plugin of the current stage has had its turn,
//!   the run stops and `run`/`run_to` return [`ManagerError::Hook`] carrying
//!   every failure of that stage.

use crate::filter::FilterError;
use crate::stage::Stage;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type returned by every plugin hook.
pub type HookResult = Result<(), HookErrors>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Critical => f.write_str("critical"),
        }
    }
}

/// A single hook failure.
///
/// Plugins usually build these with [`HookError::critical`] or
/// [`HookError::warning`] and leave `plugin`/`stage` empty; the manager fills
/// them in from the hook that returned the error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookError {
    pub plugin: String,
    pub stage: Option<Stage>,
    pub path: Option<PathBuf>,
    pub message: String,
    pub severity: Severity,
}

impl HookError {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            plugin: String::new(),
            stage: None,
            path: None,
            message: message.into(),
            severity,
        }
    }

    pub fn critical(message: impl Into<String>) -> Self {
        Self::new(Severity::Critical, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn with_path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_plugin(mut self, plugin: impl Into<String>) -> Self {
        self.plugin = plugin.into();
        self
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }

    /// Fill in plugin and stage where the hook left them blank.
    pub(crate) fn stamp(&mut self, plugin: &str, stage: Stage) {
        if self.plugin.is_empty() {
            self.plugin = plugin.to_string();
        }
        if self.stage.is_none() {
            self.stage = Some(stage);
        }
    }
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.severity)?;
        if let Some(stage) = self.stage {
            write!(f, " {}", stage)?;
        }
        if !self.plugin.is_empty() {
            write!(f, " {}", self.plugin)?;
        }
        if let Some(path) = &self.path {
            write!(f, " ({})", path.display())?;
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for HookError {}

/// Ordered collection of hook failures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookErrors(Vec<HookError>);

impl HookErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: HookError) {
        self.0.push(error);
    }

    pub fn extend(&mut self, other: HookErrors) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HookError> {
        self.0.iter()
    }

    pub fn has_critical(&self) -> bool {
        self.0.iter().any(HookError::is_critical)
    }

    pub fn criticals(&self) -> impl Iterator<Item = &HookError> {
        self.0.iter().filter(|e| e.is_critical())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &HookError> {
        self.0.iter().filter(|e| !e.is_critical())
    }

    pub fn into_vec(self) -> Vec<HookError> {
        self.0
    }

    /// `Ok(())` when empty, otherwise `Err(self)`. Lets a hook that collects
    /// errors end with `errors.into_result()`.
    pub fn into_result(self) -> HookResult {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }

    pub(crate) fn stamp(&mut self, plugin: &str, stage: Stage) {
        for error in &mut self.0 {
            error.stamp(plugin, stage);
        }
    }
}

impl From<HookError> for HookErrors {
    fn from(error: HookError) -> Self {
        Self(vec![error])
    }
}

impl FromIterator<HookError> for HookErrors {
    fn from_iter<I: IntoIterator<Item = HookError>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for HookErrors {
    type Item = HookError;
    type IntoIter = std::vec::IntoIter<HookError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a HookErrors {
    type Item = &'a HookError;
    type IntoIter = std::slice::Iter<'a, HookError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for HookErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for HookErrors {}

/// Errors returned by the manager's public surface.
#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("A build is already running on this manager")]
    Busy,
    #[error("Build failed:\n{0}")]
    Hook(HookErrors),
    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ManagerError {
    /// The individual hook failures, if this is a hook failure.
    pub fn hook_errors(&self) -> Option<&HookErrors> {
        match self {
            ManagerError::Hook(errors) => Some(errors),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_critical_false_for_warnings_only() {
        let errors: HookErrors = [HookError::warning("a"), HookError::warning("b")]
            .into_iter()
            .collect();
        assert!(!errors.has_critical());
        assert_eq!(errors.warnings().count(), 2);
    }

    #[test]
    fn has_critical_true_with_one_critical() {
        let mut errors = HookErrors::new();
        errors.push(HookError::warning("a"));
        errors.push(HookError::critical("b"));
        assert!(errors.has_critical());
        assert_eq!(errors.criticals().count(), 1);
    }

    #[test]
    fn stamp_fills_only_blank_fields() {
        let mut errors = HookErrors::new();
        errors.push(HookError::critical("blank"));
        errors.push(
            HookError::critical("attributed")
                .with_plugin("other")
                .with_stage(Stage::Load),
        );
        errors.stamp("render", Stage::Render);

        let all = errors.into_vec();
        assert_eq!(all[0].plugin, "render");
        assert_eq!(all[0].stage, Some(Stage::Render));
        assert_eq!(all[1].plugin, "other");
        assert_eq!(all[1].stage, Some(Stage::Load));
    }

    #[test]
    fn into_result_empty_is_ok() {
        assert!(HookErrors::new().into_result().is_ok());
        assert!(HookErrors::from(HookError::warning("w")).into_result().is_err());
    }

    #[test]
    fn display_includes_every_part() {
        let e = HookError::critical("bad frontmatter")
            .with_plugin("load")
            .with_stage(Stage::Load)
            .with_path("posts/a.md");
        assert_eq!(
            e.to_string(),
            "[critical] load load (posts/a.md): bad frontmatter"
        );
    }

    #[test]
    fn display_lists_one_error_per_line() {
        let errors: HookErrors = [HookError::warning("one"), HookError::critical("two")]
            .into_iter()
            .collect();
        let text = errors.to_string();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("[warning]: one"));
        assert!(text.contains("[critical]: two"));
    }

    #[test]
    fn manager_error_exposes_hook_errors() {
        let err = ManagerError::Hook(HookError::critical("x").into());
        assert_eq!(err.hook_errors().map(HookErrors::len), Some(1));
        assert!(ManagerError::Busy.hook_errors().is_none());
    }
}
