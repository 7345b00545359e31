//! The fixed build stages.
//!
//! Every build walks the same nine stages in the same order:
//!
//! ```text
//! configure → validate → glob → load → transform → render → collect → write → cleanup
//! ```
//!
//! The order is total and never changes. A stage may only run once every
//! earlier stage has run; the [`Manager`](crate::manager::Manager) enforces
//! this, the type here only encodes the order.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown stage: {0}")]
pub struct UnknownStage(pub String);

/// One phase of the build pipeline. Variants are declared in execution
/// order, so the derived `Ord` is the pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Configure,
    Validate,
    Glob,
    Load,
    Transform,
    Render,
    Collect,
    Write,
    Cleanup,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 9] = [
        Stage::Configure,
        Stage::Validate,
        Stage::Glob,
        Stage::Load,
        Stage::Transform,
        Stage::Render,
        Stage::Collect,
        Stage::Write,
        Stage::Cleanup,
    ];

    pub fn first() -> Stage {
        Stage::ALL[0]
    }

    pub fn last() -> Stage {
        Stage::ALL[Stage::ALL.len() - 1]
    }

    /// Position of this stage in [`Stage::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// The stage that follows this one, or `None` for `cleanup`.
    pub fn next(self) -> Option<Stage> {
        Stage::ALL.get(self.index() + 1).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Configure => "configure",
            Stage::Validate => "validate",
            Stage::Glob => "glob",
            Stage::Load => "load",
            Stage::Transform => "transform",
            Stage::Render => "render",
            Stage::Collect => "collect",
            Stage::Write => "write",
            Stage::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == wanted)
            .ok_or_else(|| UnknownStage(s.to_string()))
    }
}
