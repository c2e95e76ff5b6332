//! Bookkeeping of the DOM listeners the view has registered.
//!
//! The host attaches one native listener per `(root, event type, observer)`.
//! Registering the same triple twice is refused, which is what keeps
//! disable/enable cycles from double-registering.

use crate::observer::ObserverKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomListener {
    pub root: String,
    pub event_type: String,
    pub observer: ObserverKind,
}

impl DomListener {
    pub fn new(root: impl Into<String>, event_type: impl Into<String>, observer: ObserverKind) -> Self {
        Self {
            root: root.into(),
            event_type: event_type.into(),
            observer,
        }
    }
}

#[derive(Debug, Default)]
pub struct DomContext {
    listeners: BTreeSet<DomListener>,
    registrations: u64,
}

impl DomContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the listener is already registered
    pub fn add_listener(&mut self, listener: DomListener) -> bool {
        if self.listeners.contains(&listener) {
            return false;
        }
        trace!(root = %listener.root, event = %listener.event_type, "Adding DOM listener");
        self.registrations += 1;
        self.listeners.insert(listener)
    }

    pub fn remove_listener(&mut self, listener: &DomListener) -> bool {
        self.listeners.remove(listener)
    }

    /// Drop every listener matching `predicate`, returning how many went
    pub fn remove_where(&mut self, predicate: impl Fn(&DomListener) -> bool) -> usize {
        let before = self.listeners.len();
        self.listeners.retain(|listener| !predicate(listener));
        before - self.listeners.len()
    }

    pub fn has_listener(&self, root: &str, event_type: &str) -> bool {
        self.listeners
            .iter()
            .any(|listener| listener.root == root && listener.event_type == event_type)
    }

    pub fn listeners(&self) -> impl Iterator<Item = &DomListener> {
        self.listeners.iter()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Total successful registrations over the context's lifetime
    pub fn registration_count(&self) -> u64 {
        self.registrations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_double_registration() {
        let mut context = DomContext::new();
        let listener = DomListener::new("main", "keydown", ObserverKind::Key);

        assert!(context.add_listener(listener.clone()));
        assert!(!context.add_listener(listener.clone()));
        assert_eq!(context.listener_count(), 1);
        assert_eq!(context.registration_count(), 1);

        assert!(context.remove_listener(&listener));
        assert!(!context.has_listener("main", "keydown"));
    }
}
