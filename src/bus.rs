//! Fan-out handler registry shared by the transports and the translator.
//!
//! Handlers are grouped by key and fire in registration order. Registering the
//! same handler twice delivers twice; there is no de-duplication and no
//! unsubscribe. Callers snapshot the handler list before invoking it so a
//! handler may register further handlers (or stop a transport) without
//! holding the registry lock.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// Keyed, ordered list of handlers.
pub struct FanoutRegistry<K, H> {
    handlers: HashMap<K, Vec<H>>,
}

impl<K: Eq + Hash, H: Clone> FanoutRegistry<K, H> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Append a handler for `key`.
    pub fn register(&mut self, key: K, handler: H) {
        self.handlers.entry(key).or_default().push(handler);
    }

    /// Snapshot of the handlers for `key`, in registration order.
    pub fn handlers_for<Q>(&self, key: &Q) -> Vec<H>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.handlers.get(key).cloned().unwrap_or_default()
    }

    /// Number of handlers registered for `key`.
    pub fn count<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.handlers.get(key).map_or(0, Vec::len)
    }

    /// Total handlers across all keys.
    pub fn total(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }
}

impl<K: Eq + Hash, H: Clone> Default for FanoutRegistry<K, H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: fmt::Debug, H> fmt::Debug for FanoutRegistry<K, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, handlers) in &self.handlers {
            map.entry(key, &handlers.len());
        }
        map.finish()
    }
}
