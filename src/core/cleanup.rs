//! Run-scoped resource cleanup
//!
//! Disposable resources acquired during a run (temporary workspace
//! directories in particular) register their release action with a single
//! guard owned by the run. Releases execute on every exit path, success or
//! failure, via `Drop`.

use tempfile::TempDir;

/// Guard that owns the disposable resources of one run
#[derive(Default)]
pub struct ResourceGuard {
    actions: Vec<Box<dyn FnOnce() + Send>>,
    temp_dirs: Vec<TempDir>,
}

impl ResourceGuard {
    /// Create an empty guard
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a release action to run when the guard is dropped
    pub fn defer<F: FnOnce() + Send + 'static>(&mut self, action: F) {
        self.actions.push(Box::new(action));
    }

    /// Take ownership of a temporary directory, removing it at end of run
    pub fn adopt_temp_dir(&mut self, dir: TempDir) -> std::path::PathBuf {
        let path = dir.path().to_path_buf();
        self.temp_dirs.push(dir);
        path
    }
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        // Release in reverse acquisition order
        while let Some(action) = self.actions.pop() {
            action();
        }
        // TempDirs remove themselves when the Vec drops
    }
}

impl std::fmt::Debug for ResourceGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceGuard")
            .field("actions", &self.actions.len())
            .field("temp_dirs", &self.temp_dirs.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_actions_run_on_drop() {
        let counter = Arc::new(AtomicUsize::new(0));

        {
            let mut guard = ResourceGuard::new();
            let c = counter.clone();
            guard.defer(move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
            let c = counter.clone();
            guard.defer(move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
            assert_eq!(counter.load(Ordering::SeqCst), 0);
        }

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_reverse_release_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        {
            let mut guard = ResourceGuard::new();
            for i in 0..3 {
                let order = order.clone();
                guard.defer(move || order.lock().unwrap().push(i));
            }
        }

        assert_eq!(*order.lock().unwrap(), vec![2, 1, 0]);
    }

    #[test]
    fn test_temp_dir_removed_on_drop() {
        let path;
        {
            let mut guard = ResourceGuard::new();
            path = guard.adopt_temp_dir(TempDir::new().unwrap());
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_actions_run_on_panic_unwind() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();

        let result = std::panic::catch_unwind(move || {
            let mut guard = ResourceGuard::new();
            guard.defer(move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
            panic!("boom");
        });

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
