//! Listener registry
//!
//! Handlers are stored per event name together with the id handed out at
//! installation, so removing by id exactly reverses one installation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

/// Event handler invoked with the event payload
pub type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Identity of one handler installation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Handlers keyed by event name
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<String, Vec<(ListenerId, Handler)>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a handler for an event
    pub fn add(&self, event: &str, handler: Handler) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock()
            .entry(event.to_string())
            .or_default()
            .push((id, handler));
        id
    }

    /// Remove one installation. Returns false if it was already gone.
    pub fn remove(&self, event: &str, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let Some(handlers) = listeners.get_mut(event) else {
            return false;
        };

        let before = handlers.len();
        handlers.retain(|(installed, _)| *installed != id);
        let removed = handlers.len() != before;

        if handlers.is_empty() {
            listeners.remove(event);
        }
        removed
    }

    /// Invoke every handler installed for `event`, in installation order
    ///
    /// Handlers run outside the registry lock and may add or remove
    /// listeners. A handler removed by an earlier one in the same dispatch
    /// is skipped. Returns the number of handlers invoked.
    pub fn dispatch(&self, event: &str, payload: &Value) -> usize {
        let snapshot: Vec<(ListenerId, Handler)> = match self.lock().get(event) {
            Some(handlers) => handlers.clone(),
            None => return 0,
        };

        let mut invoked = 0;
        for (id, handler) in snapshot {
            if self.contains(event, id) {
                handler(payload);
                invoked += 1;
            }
        }
        invoked
    }

    /// Number of handlers installed for an event
    pub fn count(&self, event: &str) -> usize {
        self.lock().get(event).map_or(0, Vec::len)
    }

    fn contains(&self, event: &str, id: ListenerId) -> bool {
        self.lock()
            .get(event)
            .is_some_and(|handlers| handlers.iter().any(|(installed, _)| *installed == id))
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<(ListenerId, Handler)>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.lock();
        let mut map = f.debug_map();
        for (event, handlers) in listeners.iter() {
            map.entry(event, &handlers.len());
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_handler(counter: &Arc<AtomicUsize>) -> Handler {
        let counter = Arc::clone(counter);
        Arc::new(move |_: &Value| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_add_and_dispatch() {
        let registry = ListenerRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        registry.add("connect", counting_handler(&hits));
        registry.add("connect", counting_handler(&hits));

        assert_eq!(registry.dispatch("connect", &Value::Null), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(registry.dispatch("disconnect", &Value::Null), 0);
    }

    #[test]
    fn test_remove_reverses_one_installation() {
        let registry = ListenerRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let first = registry.add("connect", counting_handler(&hits));
        let _second = registry.add("connect", counting_handler(&hits));

        assert!(registry.remove("connect", first));
        assert!(!registry.remove("connect", first));
        assert_eq!(registry.count("connect"), 1);

        registry.dispatch("connect", &Value::Null);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_repeated_add_remove_does_not_leak() {
        let registry = ListenerRegistry::new();
        for _ in 0..100 {
            let id = registry.add("server-updates", Arc::new(|_: &Value| {}));
            registry.remove("server-updates", id);
        }
        assert_eq!(registry.count("server-updates"), 0);
    }

    #[test]
    fn test_handler_can_remove_listener_during_dispatch() {
        let registry = Arc::new(ListenerRegistry::new());
        let hits = Arc::new(AtomicUsize::new(0));

        let victim = Arc::new(Mutex::new(None));
        let victim_slot = Arc::clone(&victim);
        let registry_ref = Arc::clone(&registry);
        registry.add(
            "disconnect",
            Arc::new(move |_: &Value| {
                if let Some(id) = *victim_slot.lock().unwrap() {
                    registry_ref.remove("disconnect", id);
                }
            }),
        );
        let id = registry.add("disconnect", counting_handler(&hits));
        *victim.lock().unwrap() = Some(id);

        assert_eq!(registry.dispatch("disconnect", &Value::Null), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
