//! The orchestrator.
//!
//! A [`Manager`] owns every piece of pipeline state (documents, discovered
//! files, feeds, warnings, the build cache, the plugin registry) and drives
//! the stage state machine. It is the only type callers and plugins touch:
//! hooks receive `&Manager` and go through its accessors.
//!
//! ## State machine
//!
//! [`Manager::run_to`] executes every stage that has not run yet, from the
//! first up to and including the target, in [`Stage`] order. Stages already
//! run are skipped, so asking for a stage at or before the furthest one run is
//! a successful no-op. [`Manager::reset`] forgets which stages ran and drops
//! the working state; the on-disk cache survives.
//!
//! ## Failures
//!
//! Within a stage every scheduled plugin runs even after a sibling reported a
//! critical error. Warnings are recorded and the run continues. If any
//! critical error was recorded the stage is left unmarked and `run_to` returns
//! [`ManagerError::Hook`] with every failure of that stage, warnings included;
//! those warnings are not added to [`Manager::warnings`], so retrying the
//! stage never records them twice.
//!
//! ## Locking
//!
//! One run at a time: `run`, `run_to`, `reset` or `clean` called while a run
//! is in flight fails with [`ManagerError::Busy`] instead of blocking. Collections
//! sit behind their own `parking_lot` locks; accessor guards must be dropped
//! before calling [`Manager::process_posts_concurrently`], which holds the
//! document lock for the whole batch.

use crate::cache::{BuildCache, CacheStats, combine_fingerprints};
use crate::config::{Config, effective_concurrency};
use crate::document::{Document, Feed, Value};
use crate::error::{HookError, HookErrors, ManagerError};
use crate::executor::WorkerPool;
use crate::filter;
use crate::plugin::{Plugin, Registry};
use crate::stage::Stage;
use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Default)]
struct RunState {
    stages_run: BTreeSet<Stage>,
    current: Option<Stage>,
}

pub struct Manager {
    run_lock: Mutex<()>,
    state: Mutex<RunState>,
    config: RwLock<Config>,
    registry: RwLock<Registry>,
    documents: RwLock<Vec<Document>>,
    files: RwLock<Vec<PathBuf>>,
    feeds: RwLock<Vec<Feed>>,
    warnings: Mutex<Vec<HookError>>,
    cache: Mutex<BuildCache>,
    concurrency: Mutex<Option<usize>>,
    pool: Mutex<Option<Arc<WorkerPool>>>,
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

impl Manager {
    /// A manager with the default config and no plugins.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            run_lock: Mutex::new(()),
            state: Mutex::new(RunState::default()),
            config: RwLock::new(config),
            registry: RwLock::new(Registry::new()),
            documents: RwLock::new(Vec::new()),
            files: RwLock::new(Vec::new()),
            feeds: RwLock::new(Vec::new()),
            warnings: Mutex::new(Vec::new()),
            cache: Mutex::new(BuildCache::empty()),
            concurrency: Mutex::new(None),
            pool: Mutex::new(None),
        }
    }

    // =========================================================================
    // Configuration and registration
    // =========================================================================

    pub fn config(&self) -> RwLockReadGuard<'_, Config> {
        self.config.read()
    }

    pub fn set_config(&self, config: Config) {
        *self.config.write() = config;
    }

    /// Override the worker count. Values below one are raised to one.
    pub fn set_concurrency(&self, n: usize) {
        *self.concurrency.lock() = Some(n.max(1));
    }

    /// Effective worker count: the override, else the config, else one per core.
    pub fn concurrency(&self) -> usize {
        let configured = (*self.concurrency.lock()).or(self.config.read().concurrency);
        effective_concurrency(configured)
    }

    pub fn register_plugin<P: Plugin + 'static>(&self, plugin: P) {
        self.registry.write().register(Arc::new(plugin));
    }

    pub fn register_plugins<I>(&self, plugins: I)
    where
        I: IntoIterator<Item = Arc<dyn Plugin>>,
    {
        let mut registry = self.registry.write();
        for plugin in plugins {
            registry.register(plugin);
        }
    }

    /// Names of the plugins hooking `stage`, in execution order.
    pub fn plugin_order(&self, stage: Stage) -> Vec<String> {
        self.registry
            .read()
            .schedule(stage)
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    /// Fingerprint of the build-global inputs: the config plus the set of
    /// registered plugins.
    pub fn fingerprint(&self) -> String {
        let config = self.config.read().fingerprint();
        let plugins = self.registry.read().names().join("\0");
        combine_fingerprints(&[&config, &plugins])
    }

    // =========================================================================
    // State machine
    // =========================================================================

    /// Run every remaining stage.
    pub fn run(&self) -> Result<(), ManagerError> {
        self.run_to(Stage::last())
    }

    /// Run every not-yet-run stage up to and including `target`.
    pub fn run_to(&self, target: Stage) -> Result<(), ManagerError> {
        let _running = self.run_lock.try_lock().ok_or(ManagerError::Busy)?;
        let result = self.run_stages(target);
        self.persist_cache();
        result
    }

    /// Forget which stages ran and drop documents, files, feeds and warnings.
    /// The persisted cache is kept and reloaded by the next `configure`.
    pub fn reset(&self) -> Result<(), ManagerError> {
        let _running = self.run_lock.try_lock().ok_or(ManagerError::Busy)?;
        *self.state.lock() = RunState::default();
        self.documents.write().clear();
        self.files.write().clear();
        self.feeds.write().clear();
        self.warnings.lock().clear();
        tracing::debug!("manager reset");
        Ok(())
    }

    pub fn stages_run(&self) -> BTreeSet<Stage> {
        self.state.lock().stages_run.clone()
    }

    pub fn has_run(&self, stage: Stage) -> bool {
        self.state.lock().stages_run.contains(&stage)
    }

    /// The stage currently executing, `None` when idle.
    pub fn current_stage(&self) -> Option<Stage> {
        self.state.lock().current
    }

    fn run_stages(&self, target: Stage) -> Result<(), ManagerError> {
        for stage in Stage::ALL.into_iter().take_while(|s| *s <= target) {
            if self.has_run(stage) {
                continue;
            }
            self.run_stage(stage)?;
        }
        Ok(())
    }

    fn run_stage(&self, stage: Stage) -> Result<(), ManagerError> {
        if stage == Stage::Configure {
            self.load_cache();
        }

        let plugins = self.registry.read().schedule(stage);
        self.state.lock().current = Some(stage);
        tracing::info!(stage = %stage, plugins = plugins.len(), "stage started");

        let mut errors = HookErrors::new();
        for plugin in &plugins {
            tracing::debug!(stage = %stage, plugin = plugin.name(), "running hook");
            if let Err(mut failed) = plugin.run(stage, self) {
                failed.stamp(plugin.name(), stage);
                errors.extend(failed);
            }
        }

        self.state.lock().current = None;

        // A failed stage reports its warnings through the error only; a
        // retry records them again if they recur.
        if errors.has_critical() {
            for error in errors.iter() {
                if error.is_critical() {
                    tracing::error!("{}", error);
                } else {
                    tracing::warn!("{}", error);
                }
            }
            return Err(ManagerError::Hook(errors));
        }

        {
            let mut warnings = self.warnings.lock();
            for warning in errors.warnings() {
                tracing::warn!("{}", warning);
                warnings.push(warning.clone());
            }
        }

        if stage == Stage::Cleanup {
            self.prune_cache();
        }
        self.state.lock().stages_run.insert(stage);
        tracing::info!(stage = %stage, "stage finished");
        Ok(())
    }

    // =========================================================================
    // Working state accessors
    // =========================================================================

    /// The working document list. Drop the guard before running a batch.
    pub fn documents(&self) -> RwLockReadGuard<'_, Vec<Document>> {
        self.documents.read()
    }

    pub fn documents_mut(&self) -> RwLockWriteGuard<'_, Vec<Document>> {
        self.documents.write()
    }

    pub fn set_documents(&self, documents: Vec<Document>) {
        *self.documents.write() = documents;
    }

    /// Discovered source files, relative to the content directory.
    pub fn files(&self) -> RwLockReadGuard<'_, Vec<PathBuf>> {
        self.files.read()
    }

    pub fn set_files(&self, files: Vec<PathBuf>) {
        *self.files.write() = files;
    }

    pub fn feeds(&self) -> RwLockReadGuard<'_, Vec<Feed>> {
        self.feeds.read()
    }

    pub fn set_feeds(&self, feeds: Vec<Feed>) {
        *self.feeds.write() = feeds;
    }

    /// Warnings recorded since the last reset, in the order they were raised.
    pub fn warnings(&self) -> Vec<HookError> {
        self.warnings.lock().clone()
    }

    /// Record a warning outside of a hook's return value.
    pub fn add_warning(&self, warning: HookError) {
        self.warnings.lock().push(warning);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Documents matching `expression`, in document order. Unknown fields
    /// are non-matches.
    pub fn filter(&self, expression: &str) -> Result<Vec<Document>, ManagerError> {
        Ok(filter::filter_documents(&self.documents.read(), expression)?)
    }

    /// Like [`Manager::filter`] but an unknown field is an error.
    pub fn filter_strict(&self, expression: &str) -> Result<Vec<Document>, ManagerError> {
        Ok(filter::filter_documents_strict(
            &self.documents.read(),
            expression,
        )?)
    }

    /// Filter, stable-sort on `sort`, then project onto `field`.
    pub fn map(
        &self,
        field: &str,
        filter_expr: &str,
        sort: &str,
        reverse: bool,
    ) -> Result<Vec<Value>, ManagerError> {
        Ok(filter::map_documents(
            &self.documents.read(),
            field,
            filter_expr,
            sort,
            reverse,
        )?)
    }

    // =========================================================================
    // Executor
    // =========================================================================

    /// Apply `f` to every document on the worker pool.
    ///
    /// Holds the document write lock until the batch finishes, so `f` must
    /// not read documents back through the manager. Returns every failure,
    /// each tagged with its document's path; the caller decides severity.
    pub fn process_posts_concurrently<F>(&self, f: F) -> HookErrors
    where
        F: Fn(&mut Document) -> Result<(), HookError> + Send + Sync,
    {
        let pool = match self.worker_pool() {
            Ok(pool) => pool,
            Err(e) => {
                return HookError::critical(format!("failed to start worker pool: {e}")).into();
            }
        };
        let mut documents = self.documents.write();
        tracing::debug!(
            documents = documents.len(),
            workers = pool.size(),
            "processing documents"
        );
        pool.process(&mut documents, f)
    }

    /// The shared pool, rebuilt when the effective concurrency changed.
    fn worker_pool(&self) -> Result<Arc<WorkerPool>, rayon::ThreadPoolBuildError> {
        let size = self.concurrency();
        let mut slot = self.pool.lock();
        if let Some(pool) = slot.as_ref().filter(|p| p.size() == size) {
            return Ok(Arc::clone(pool));
        }
        let pool = Arc::new(WorkerPool::new(size)?);
        *slot = Some(Arc::clone(&pool));
        Ok(pool)
    }

    // =========================================================================
    // Cache
    // =========================================================================

    /// The build cache. Hold the guard only as long as needed.
    pub fn cache(&self) -> MutexGuard<'_, BuildCache> {
        self.cache.lock()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.lock().stats
    }

    /// Remove the output directory. The cache is left alone; its entries
    /// miss once their artifacts are gone.
    pub fn clean(&self) -> Result<(), ManagerError> {
        let _running = self.run_lock.try_lock().ok_or(ManagerError::Busy)?;
        let output_dir = self.config.read().output_dir.clone();
        if output_dir.exists() {
            std::fs::remove_dir_all(&output_dir)?;
            tracing::info!(path = %output_dir.display(), "removed output directory");
        }
        Ok(())
    }

    fn load_cache(&self) {
        let (use_cache, cache_dir) = {
            let config = self.config.read();
            (config.use_cache, config.cache_dir.clone())
        };
        *self.cache.lock() = if use_cache {
            BuildCache::load(&cache_dir)
        } else {
            tracing::debug!("cache disabled, starting cold");
            BuildCache::empty()
        };
    }

    fn prune_cache(&self) {
        let live: BTreeSet<String> = self.documents.read().iter().map(Document::key).collect();
        let removed = self.cache.lock().prune(&live);
        if removed > 0 {
            tracing::debug!(removed, "pruned stale cache entries");
        }
    }

    fn persist_cache(&self) {
        let mut cache = self.cache.lock();
        if !cache.is_dirty() {
            return;
        }
        let cache_dir = self.config.read().cache_dir.clone();
        if let Err(e) = cache.save(&cache_dir) {
            tracing::warn!(path = %cache_dir.display(), error = %e, "failed to save build cache");
            self.warnings.lock().push(
                HookError::warning(format!("failed to save build cache: {e}"))
                    .with_plugin("cache")
                    .with_path(&cache_dir),
            );
        }
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("plugins", &*self.registry.read())
            .field("stages_run", &self.state.lock().stages_run)
            .field("documents", &self.documents.read().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{FnPlugin, priority};
    use crate::test_helpers::Recorder;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Config pointing every directory into `tmp`.
    fn temp_config(tmp: &TempDir) -> Config {
        Config {
            content_dir: tmp.path().join("content"),
            output_dir: tmp.path().join("public"),
            cache_dir: tmp.path().join("cache"),
            ..Config::default()
        }
    }

    // =========================================================================
    // Stage ordering
    // =========================================================================

    #[test]
    fn run_to_executes_every_earlier_stage_in_order() {
        let m = Manager::new();
        let rec = Recorder::new();
        m.register_plugin(rec.plugin("p", &Stage::ALL));
        m.run_to(Stage::Render).unwrap();
        assert_eq!(
            rec.events(),
            vec![
                "p:configure",
                "p:validate",
                "p:glob",
                "p:load",
                "p:transform",
                "p:render"
            ]
        );
        assert!(m.has_run(Stage::Transform));
        assert!(!m.has_run(Stage::Collect));
    }

    #[test]
    fn run_to_same_stage_twice_is_noop() {
        let m = Manager::new();
        let rec = Recorder::new();
        m.register_plugin(rec.plugin("p", &[Stage::Load]));
        m.run_to(Stage::Load).unwrap();
        m.run_to(Stage::Load).unwrap();
        assert_eq!(rec.events(), vec!["p:load"]);
    }

    #[test]
    fn run_to_earlier_stage_is_noop() {
        let m = Manager::new();
        let rec = Recorder::new();
        m.register_plugin(rec.plugin("p", &Stage::ALL));
        m.run_to(Stage::Render).unwrap();
        let before = rec.events().len();
        m.run_to(Stage::Glob).unwrap();
        assert_eq!(rec.events().len(), before);
    }

    #[test]
    fn run_continues_from_furthest_stage() {
        let m = Manager::new();
        let rec = Recorder::new();
        m.register_plugin(rec.plugin("p", &[Stage::Load, Stage::Render, Stage::Cleanup]));
        m.run_to(Stage::Load).unwrap();
        m.run().unwrap();
        assert_eq!(rec.events(), vec!["p:load", "p:render", "p:cleanup"]);
        assert_eq!(m.stages_run().len(), Stage::ALL.len());
    }

    #[test]
    fn current_stage_visible_inside_hook_and_cleared_after() {
        let m = Manager::new();
        let seen = Arc::new(Mutex::new(None));
        let seen_in_hook = Arc::clone(&seen);
        m.register_plugin(FnPlugin::new("watch").on(Stage::Transform, move |m| {
            *seen_in_hook.lock() = m.current_stage();
            Ok(())
        }));
        m.run_to(Stage::Transform).unwrap();
        assert_eq!(*seen.lock(), Some(Stage::Transform));
        assert_eq!(m.current_stage(), None);
    }

    // =========================================================================
    // Reset and busy
    // =========================================================================

    #[test]
    fn reset_clears_state_and_allows_rerun() {
        let m = Manager::new();
        let rec = Recorder::new();
        m.register_plugin(rec.plugin("p", &[Stage::Load]));
        m.register_plugin(FnPlugin::new("fill").on(Stage::Load, |m| {
            m.documents_mut().push(Document::new("a.md", "a"));
            m.add_warning(HookError::warning("noted"));
            Ok(())
        }));
        m.run_to(Stage::Load).unwrap();
        assert_eq!(m.documents().len(), 1);

        m.reset().unwrap();
        assert!(m.stages_run().is_empty());
        assert!(m.documents().is_empty());
        assert!(m.warnings().is_empty());

        m.run_to(Stage::Load).unwrap();
        assert_eq!(rec.events(), vec!["p:load", "p:load"]);
        assert_eq!(m.documents().len(), 1);
    }

    #[test]
    fn nested_run_is_busy() {
        let m = Manager::new();
        let outcome = Arc::new(Mutex::new(None));
        let outcome_in_hook = Arc::clone(&outcome);
        m.register_plugin(FnPlugin::new("reentrant").on(Stage::Load, move |m| {
            let busy = matches!(m.run(), Err(ManagerError::Busy))
                && matches!(m.reset(), Err(ManagerError::Busy))
                && matches!(m.clean(), Err(ManagerError::Busy));
            *outcome_in_hook.lock() = Some(busy);
            Ok(())
        }));
        m.run_to(Stage::Load).unwrap();
        assert_eq!(*outcome.lock(), Some(true));
    }

    // =========================================================================
    // Failures
    // =========================================================================

    #[test]
    fn critical_error_lets_siblings_run_and_names_plugin() {
        let m = Manager::new();
        let rec = Recorder::new();
        m.register_plugin(rec.plugin("first", &[Stage::Render]));
        m.register_plugin(
            FnPlugin::new("second")
                .on(Stage::Render, |_| Err(HookError::critical("broken").into())),
        );
        m.register_plugin(rec.plugin("third", &[Stage::Render]));
        m.register_plugin(rec.plugin("after", &[Stage::Collect]));

        let err = m.run().unwrap_err();
        assert_eq!(rec.events(), vec!["first:render", "third:render"]);

        let errors = err.hook_errors().unwrap();
        let critical: Vec<_> = errors.criticals().collect();
        assert_eq!(critical.len(), 1);
        assert_eq!(critical[0].plugin, "second");
        assert_eq!(critical[0].stage, Some(Stage::Render));
        assert!(err.to_string().contains("second"));
        assert!(!m.has_run(Stage::Render));
        assert!(m.has_run(Stage::Transform));
    }

    #[test]
    fn failed_stage_reruns_on_next_call() {
        let m = Manager::new();
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        m.register_plugin(FnPlugin::new("flaky").on(Stage::Load, move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(HookError::critical("first try fails").into())
            } else {
                Ok(())
            }
        }));
        assert!(m.run_to(Stage::Load).is_err());
        m.run_to(Stage::Load).unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn retried_stage_records_its_warnings_once() {
        let m = Manager::new();
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        m.register_plugin(FnPlugin::new("noisy").on(Stage::Load, |_| {
            Err(HookError::warning("odd encoding").with_path("a.md").into())
        }));
        m.register_plugin(FnPlugin::new("flaky").on(Stage::Load, move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(HookError::critical("first try fails").into())
            } else {
                Ok(())
            }
        }));

        let err = m.run_to(Stage::Load).unwrap_err();
        assert_eq!(err.hook_errors().unwrap().warnings().count(), 1);
        assert!(m.warnings().is_empty());

        m.run_to(Stage::Load).unwrap();
        let warnings = m.warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].plugin, "noisy");
    }

    #[test]
    fn warnings_do_not_abort() {
        let m = Manager::new();
        let rec = Recorder::new();
        m.register_plugin(
            FnPlugin::new("warns").on(Stage::Transform, |_| {
                Err(HookError::warning("odd slug").with_path("a.md").into())
            }),
        );
        m.register_plugin(rec.plugin("later", &[Stage::Write]));
        m.run().unwrap();
        assert_eq!(rec.events(), vec!["later:write"]);

        let warnings = m.warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].plugin, "warns");
        assert_eq!(warnings[0].stage, Some(Stage::Transform));
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    #[test]
    fn priority_order_a_b_c() {
        let m = Manager::new();
        let rec = Recorder::new();
        m.register_plugin(rec.plugin("B", &[Stage::Collect]));
        m.register_plugin(rec.plugin("C", &[Stage::Collect]));
        m.register_plugin(rec.plugin_with_priority("A", &[Stage::Collect], -10));
        m.run_to(Stage::Collect).unwrap();
        assert_eq!(
            rec.events(),
            vec!["A:collect", "B:collect", "C:collect"]
        );
        assert_eq!(m.plugin_order(Stage::Collect), vec!["A", "B", "C"]);
    }

    #[test]
    fn plugin_registered_mid_run_joins_later_stages() {
        let m = Manager::new();
        let rec = Recorder::new();
        let late = rec.plugin("late", &[Stage::Load, Stage::Render]);
        let slot = Arc::new(Mutex::new(Some(late)));
        m.register_plugin(
            FnPlugin::new("installer")
                .on(Stage::Transform, move |m| {
                    if let Some(p) = slot.lock().take() {
                        m.register_plugin(p);
                    }
                    Ok(())
                })
                .with_priority(Stage::Transform, priority::FIRST),
        );
        m.run_to(Stage::Render).unwrap();
        assert_eq!(rec.events(), vec!["late:render"]);
    }

    // =========================================================================
    // Queries and executor
    // =========================================================================

    #[test]
    fn filter_and_map_over_working_documents() {
        let m = Manager::new();
        let mut a = Document::new("a.md", "");
        a.published = true;
        a.title = Some("Alpha".into());
        let mut b = Document::new("b.md", "");
        b.title = Some("Beta".into());
        m.set_documents(vec![a, b]);

        let hits = m.filter("published == true").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].key(), "a.md");

        let titles = m.map("title", "", "title", true).unwrap();
        assert_eq!(
            titles,
            vec![Value::Str("Beta".into()), Value::Str("Alpha".into())]
        );

        assert!(matches!(m.filter("published =="), Err(ManagerError::Filter(_))));
        assert!(m.filter("nope == 1").unwrap().is_empty());
        assert!(matches!(
            m.filter_strict("nope == 1"),
            Err(ManagerError::Filter(filter::FilterError::UnknownField(_)))
        ));
    }

    #[test]
    fn process_posts_concurrently_mutates_in_place() {
        let m = Manager::new();
        m.set_concurrency(4);
        m.set_documents(
            (0..16)
                .map(|i| Document::new(format!("{i:02}.md"), format!("{i}")))
                .collect(),
        );
        let errors = m.process_posts_concurrently(|doc| {
            doc.html = format!("<p>{}</p>", doc.raw);
            Ok(())
        });
        assert!(errors.is_empty());
        let docs = m.documents();
        assert_eq!(docs[0].key(), "00.md");
        assert_eq!(docs[15].html, "<p>15</p>");
    }

    #[test]
    fn concurrency_override_wins_and_is_at_least_one() {
        let m = Manager::with_config(Config {
            concurrency: Some(3),
            ..Config::default()
        });
        assert_eq!(m.concurrency(), 3);
        m.set_concurrency(0);
        assert_eq!(m.concurrency(), 1);
        m.set_concurrency(8);
        assert_eq!(m.concurrency(), 8);
    }

    // =========================================================================
    // Cache lifecycle
    // =========================================================================

    #[test]
    fn corrupt_cache_store_does_not_fail_configure() {
        let tmp = TempDir::new().unwrap();
        let config = temp_config(&tmp);
        std::fs::create_dir_all(&config.cache_dir).unwrap();
        std::fs::write(crate::cache::store_path(&config.cache_dir), "{garbage").unwrap();
        let m = Manager::with_config(config);
        m.run_to(Stage::Configure).unwrap();
        assert!(m.cache().is_empty());
    }

    #[test]
    fn fingerprint_tracks_config_and_plugins() {
        let m = Manager::new();
        let base = m.fingerprint();
        assert_eq!(base, m.fingerprint());

        m.set_config(Config {
            title: "Other".into(),
            ..Config::default()
        });
        let retitled = m.fingerprint();
        assert_ne!(retitled, base);

        m.register_plugin(FnPlugin::new("extra"));
        assert_ne!(m.fingerprint(), retitled);
    }

    #[test]
    fn fingerprint_ignores_directories() {
        let tmp = TempDir::new().unwrap();
        let a = Manager::new();
        let b = Manager::with_config(temp_config(&tmp));
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn clean_removes_output_directory() {
        let tmp = TempDir::new().unwrap();
        let config = temp_config(&tmp);
        std::fs::create_dir_all(config.output_dir.join("post")).unwrap();
        std::fs::write(config.output_dir.join("post/index.html"), "x").unwrap();
        let out = config.output_dir.clone();
        let m = Manager::with_config(config);
        m.clean().unwrap();
        assert!(!out.exists());
        // Cleaning twice is fine.
        m.clean().unwrap();
    }
}
