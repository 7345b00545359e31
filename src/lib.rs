//! # Pressroom
//!
//! The orchestration engine of a static-content build system. Source files
//! go in, pass through a fixed sequence of stages, and come out as pages.
//! Almost everything that happens along the way is a plugin; the engine owns
//! the order, the state, the cache and the failure rules.
//!
//! # Architecture: Nine Fixed Stages
//!
//! ```text
//! configure → validate → glob → load → transform → render → collect → write → cleanup
//! ```
//!
//! A [`Manager`](manager::Manager) runs the stages in that order, never
//! twice in one lifetime unless reset. Within a stage it runs every plugin
//! hooking that stage, sorted by `(priority, registration index)`. Plugins
//! read and change pipeline state only through the manager's accessors.
//!
//! ```rust,ignore
//! let manager = Manager::with_config(config::load_config(Path::new("pressroom.toml"))?);
//! manager.register_plugins(plugins::defaults());
//! manager.run_to(Stage::Render)?;          // glob, load, transform, render
//! let rust = manager.filter("'rust' in tags and draft == false")?;
//! manager.run()?;                          // collect, write, cleanup
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`stage`] | The `Stage` enumeration and its total order |
//! | [`document`] | `Document` and `Feed` records, the dynamic `Value` used by queries |
//! | [`error`] | Severity-tagged `HookError`s and the manager's error type |
//! | [`filter`] | The Filter/Map query language: lexer, parser, evaluator, stable sort |
//! | [`plugin`] | The `Plugin` trait, priorities, closure plugins, the per-stage scheduler |
//! | [`executor`] | Bounded rayon worker pool for per-document work |
//! | [`cache`] | Content-addressed build cache persisted as JSON |
//! | [`manager`] | The orchestrator: state machine, accessors, queries |
//! | [`config`] | `pressroom.toml` loading, merging, validation, fingerprinting |
//! | [`slug`] | URL-safe slugs |
//! | [`plugins`] | Built-in plugins for a plain markdown site |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Determinism Is the Contract
//!
//! A cold build, a warm build and a build on eight workers must write the
//! same bytes. Everything follows from that:
//!
//! - **Stable scheduling**: plugin order is a stable sort, never a hash map walk.
//! - **Sorted discovery**: globbed files are sorted before documents exist.
//! - **In-place parallelism**: workers mutate documents through `&mut`, so the
//!   document order is the slice order regardless of completion order.
//! - **No timestamps**: templates only render dates that come from content.
//!
//! ## Failures Collect, Then Abort
//!
//! A critical error never skips a sibling plugin. The stage finishes, every
//! failure is reported together, and only then does the run stop. Warnings
//! never stop anything. See [`error`].
//!
//! ## The Cache Degrades, It Never Fails
//!
//! A missing, corrupt or outdated cache store loads as empty and the build
//! runs cold. A cache hit additionally checks that the output on disk still
//! hashes to what was written, so a hit always means "byte-identical to a
//! recompute". See [`cache`].
//!
//! ## Manager as a Handle, Not a Global
//!
//! All state lives in a `Manager` value. Hooks get `&Manager`; interior
//! locks (`parking_lot`) let them update state without a `&mut` borrow of
//! the whole pipeline. Two managers never share anything but the disk.

pub mod cache;
pub mod config;
pub mod document;
pub mod error;
pub mod executor;
pub mod filter;
pub mod manager;
pub mod output;
pub mod plugin;
pub mod plugins;
pub mod slug;
pub mod stage;

pub use document::{Document, Feed, Value};
pub use error::{HookError, HookErrors, HookResult, ManagerError, Severity};
pub use manager::Manager;
pub use plugin::{FnPlugin, Plugin};
pub use stage::Stage;

#[cfg(test)]
pub(crate) mod test_helpers;
