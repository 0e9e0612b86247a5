//! Teardown coordination
//!
//! Sync clients register one teardown hook at construction. Whoever owns the
//! larger workspace lifecycle runs the hooks once at shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

/// A cleanup callback run once at shutdown
pub type TeardownHook = Box<dyn FnOnce() + Send>;

/// Something that invokes registered teardown hooks at shutdown
pub trait Lifecycle {
    /// Register a hook to run exactly once when the owner shuts down
    fn register_teardown(&self, hook: TeardownHook);
}

/// In-process lifecycle coordinator
///
/// Hooks run in registration order. Hooks registered after `shutdown`
/// run immediately.
#[derive(Default)]
pub struct TeardownRegistry {
    hooks: Mutex<Vec<TeardownHook>>,
    shut_down: AtomicBool,
}

impl TeardownRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of hooks waiting for shutdown
    pub fn pending(&self) -> usize {
        self.hooks().len()
    }

    /// Whether `shutdown` has run
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Run every registered hook. Later calls do nothing.
    ///
    /// Returns the number of hooks run by this call.
    pub fn shutdown(&self) -> usize {
        let hooks = {
            let mut pending = self.hooks();
            if self.shut_down.swap(true, Ordering::SeqCst) {
                return 0;
            }
            std::mem::take(&mut *pending)
        };
        let count = hooks.len();
        debug!("Running {} teardown hook(s)", count);
        for hook in hooks {
            hook();
        }
        count
    }

    fn hooks(&self) -> MutexGuard<'_, Vec<TeardownHook>> {
        self.hooks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Lifecycle for TeardownRegistry {
    fn register_teardown(&self, hook: TeardownHook) {
        // The flag only flips while the hook list is locked
        let mut pending = self.hooks();
        if self.is_shut_down() {
            drop(pending);
            hook();
            return;
        }
        pending.push(hook);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn counting_hook(counter: &Arc<AtomicUsize>) -> TeardownHook {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_shutdown_runs_hooks_once() {
        let registry = TeardownRegistry::new();
        let runs = Arc::new(AtomicUsize::new(0));

        registry.register_teardown(counting_hook(&runs));
        registry.register_teardown(counting_hook(&runs));
        assert_eq!(registry.pending(), 2);

        assert_eq!(registry.shutdown(), 2);
        assert_eq!(registry.shutdown(), 0);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert!(registry.is_shut_down());
    }

    #[test]
    fn test_late_registration_runs_immediately() {
        let registry = TeardownRegistry::new();
        let runs = Arc::new(AtomicUsize::new(0));

        registry.shutdown();
        registry.register_teardown(counting_hook(&runs));

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(registry.pending(), 0);
    }

    #[test]
    fn test_registration_racing_shutdown_runs_every_hook() {
        for _ in 0..200 {
            let registry = Arc::new(TeardownRegistry::new());
            let runs = Arc::new(AtomicUsize::new(0));

            let registrar = {
                let registry = Arc::clone(&registry);
                let runs = Arc::clone(&runs);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        registry.register_teardown(counting_hook(&runs));
                    }
                })
            };
            registry.shutdown();
            registrar.join().unwrap();

            assert_eq!(runs.load(Ordering::SeqCst), 50);
            assert_eq!(registry.pending(), 0);
        }
    }
}
