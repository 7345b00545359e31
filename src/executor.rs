//! Bounded worker pool for per-document work.
//!
//! Plugins that want to parallelize their own per-document work hand a
//! closure to `Manager::process_posts_concurrently`, which lands here. The
//! pool has a fixed number of rayon workers, so fan-out is bounded by the
//! configured concurrency rather than by the number of documents.
//!
//! ## Guarantees
//!
//! - Every document is visited exactly once, in place, through `&mut`.
//!   Workers may finish in any order but the slice keeps its order, so the
//!   final contents don't depend on scheduling.
//! - A failing (or panicking) document never stops its siblings. Each
//!   failure is tagged with the document's path and collected.
//! - Collected errors come back in document order, not completion order.
//!
//! There is no cancellation: a batch always runs to completion and the
//! caller decides what the errors mean.

use crate::document::Document;
use crate::error::{HookError, HookErrors};
use rayon::prelude::*;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// A fixed-size rayon pool owned by one manager.
pub struct WorkerPool {
    size: usize,
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    /// Build a pool with `size` workers (at least one).
    pub fn new(size: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let size = size.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(size)
            .thread_name(|i| format!("pressroom-worker-{i}"))
            .build()?;
        Ok(Self { size, pool })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Apply `f` to every document and collect the failures.
    pub fn process<F>(&self, docs: &mut [Document], f: F) -> HookErrors
    where
        F: Fn(&mut Document) -> Result<(), HookError> + Send + Sync,
    {
        self.pool.install(|| {
            docs.par_iter_mut()
                .filter_map(|doc| run_one(doc, &f))
                .collect::<Vec<_>>()
        })
        .into_iter()
        .collect()
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool").field("size", &self.size).finish()
    }
}

fn run_one<F>(doc: &mut Document, f: &F) -> Option<HookError>
where
    F: Fn(&mut Document) -> Result<(), HookError>,
{
    let path = doc.path.clone();
    let outcome = catch_unwind(AssertUnwindSafe(|| f(doc)));
    let error = match outcome {
        Ok(Ok(())) => return None,
        Ok(Err(e)) => e,
        Err(panic) => HookError::critical(format!("worker panicked: {}", panic_message(&*panic))),
    };
    Some(if error.path.is_none() {
        error.with_path(path)
    } else {
        error
    })
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn docs(n: usize) -> Vec<Document> {
        (0..n)
            .map(|i| Document::new(format!("doc-{i:03}.md"), format!("body {i}")))
            .collect()
    }

    #[test]
    fn pool_size_is_at_least_one() {
        assert_eq!(WorkerPool::new(0).unwrap().size(), 1);
        assert_eq!(WorkerPool::new(4).unwrap().size(), 4);
    }

    #[test]
    fn every_document_visited_once_in_place() {
        let pool = WorkerPool::new(4).unwrap();
        let mut d = docs(50);
        let calls = AtomicUsize::new(0);
        let errors = pool.process(&mut d, |doc| {
            calls.fetch_add(1, Ordering::SeqCst);
            doc.html = doc.raw.to_uppercase();
            Ok(())
        });
        assert!(errors.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 50);
        for (i, doc) in d.iter().enumerate() {
            assert_eq!(doc.path, PathBuf::from(format!("doc-{i:03}.md")));
            assert_eq!(doc.html, format!("BODY {i}"));
        }
    }

    #[test]
    fn result_is_identical_for_one_and_many_workers() {
        let work = |doc: &mut Document| -> Result<(), HookError> {
            doc.slug = doc.raw.replace(' ', "-");
            Ok(())
        };
        let mut serial = docs(30);
        WorkerPool::new(1).unwrap().process(&mut serial, work);
        let mut parallel = docs(30);
        WorkerPool::new(8).unwrap().process(&mut parallel, work);
        assert_eq!(serial, parallel);
    }

    #[test]
    fn failures_do_not_stop_siblings_and_keep_document_order() {
        let pool = WorkerPool::new(4).unwrap();
        let mut d = docs(20);
        let errors = pool.process(&mut d, |doc| {
            doc.html = "done".into();
            if doc.raw.ends_with('3') {
                Err(HookError::critical("boom"))
            } else {
                Ok(())
            }
        });
        assert!(d.iter().all(|doc| doc.html == "done"));
        let paths: Vec<PathBuf> = errors.iter().filter_map(|e| e.path.clone()).collect();
        assert_eq!(
            paths,
            vec![PathBuf::from("doc-003.md"), PathBuf::from("doc-013.md")]
        );
    }

    #[test]
    fn explicit_error_path_is_kept() {
        let pool = WorkerPool::new(2).unwrap();
        let mut d = docs(1);
        let errors = pool.process(&mut d, |_| {
            Err(HookError::warning("w").with_path("elsewhere.md"))
        });
        assert_eq!(
            errors.iter().next().unwrap().path,
            Some(PathBuf::from("elsewhere.md"))
        );
    }

    #[test]
    fn panics_become_critical_errors() {
        let pool = WorkerPool::new(2).unwrap();
        let mut d = docs(3);
        let errors = pool.process(&mut d, |doc| {
            if doc.raw == "body 1" {
                panic!("bad document");
            }
            doc.html = "ok".into();
            Ok(())
        });
        assert_eq!(errors.len(), 1);
        let e = errors.iter().next().unwrap();
        assert!(e.is_critical());
        assert!(e.message.contains("bad document"));
        assert_eq!(d[0].html, "ok");
        assert_eq!(d[2].html, "ok");
    }
}
