//! # Emitter
//!
//! A typed event bus owned by the stateful types that need one (view
//! document, observers, pending actions). Listeners are called in priority
//! order. Event names are namespaced with `:`; a listener registered for
//! `"insert"` also hears `"insert:paragraph"`.

use crate::priority::{ListenerId, Priority};
use tracing::trace;

/// Bookkeeping passed to every listener of a single `fire` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventInfo {
    pub name: String,
    stopped: bool,
}

impl EventInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stopped: false,
        }
    }

    /// Skip every remaining listener
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

type Listener<E> = Box<dyn FnMut(&mut EventInfo, &mut E)>;

struct Registration<E> {
    id: ListenerId,
    name: String,
    priority: i32,
    listener: Listener<E>,
}

/// Event bus carrying payloads of type `E`
pub struct Emitter<E> {
    registrations: Vec<Registration<E>>,
    next_id: u64,
}

impl<E> Default for Emitter<E> {
    fn default() -> Self {
        Self {
            registrations: Vec::new(),
            next_id: 1,
        }
    }
}

impl<E> std::fmt::Debug for Emitter<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field(
                "events",
                &self
                    .registrations
                    .iter()
                    .map(|r| r.name.as_str())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// `true` when `fired` is `registered` or one of its `:`-separated sub-events
pub fn matches_namespace(registered: &str, fired: &str) -> bool {
    fired == registered
        || (fired.len() > registered.len()
            && fired.starts_with(registered)
            && fired.as_bytes()[registered.len()] == b':')
}

impl<E> Emitter<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&mut self, name: impl Into<String>, priority: Priority, listener: F) -> ListenerId
    where
        F: FnMut(&mut EventInfo, &mut E) + 'static,
    {
        let id = ListenerId(self.next_id);
        self.next_id += 1;

        let value = priority.value();
        let index = self
            .registrations
            .iter()
            .position(|r| r.priority < value)
            .unwrap_or(self.registrations.len());

        self.registrations.insert(
            index,
            Registration {
                id,
                name: name.into(),
                priority: value,
                listener: Box::new(listener),
            },
        );
        id
    }

    /// Returns false when the listener was already removed
    pub fn off(&mut self, id: ListenerId) -> bool {
        let before = self.registrations.len();
        self.registrations.retain(|r| r.id != id);
        before != self.registrations.len()
    }

    pub fn has_listeners(&self, name: &str) -> bool {
        self.registrations
            .iter()
            .any(|r| matches_namespace(&r.name, name))
    }

    pub fn listener_count(&self) -> usize {
        self.registrations.len()
    }

    pub fn fire(&mut self, name: &str, data: &mut E) -> EventInfo {
        let mut info = EventInfo::new(name);
        trace!(event = name, "Firing event");

        for registration in self.registrations.iter_mut() {
            if !matches_namespace(&registration.name, name) {
                continue;
            }
            (registration.listener)(&mut info, data);
            if info.is_stopped() {
                break;
            }
        }
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_fire_in_priority_order() {
        let mut emitter: Emitter<Vec<&'static str>> = Emitter::new();
        emitter.on("keydown", Priority::Low, |_, log| log.push("low"));
        emitter.on("keydown", Priority::High, |_, log| log.push("high"));
        emitter.on("keydown", Priority::Normal, |_, log| log.push("normal"));

        let mut log = Vec::new();
        emitter.fire("keydown", &mut log);
        assert_eq!(log, vec!["high", "normal", "low"]);
    }

    #[test]
    fn test_stop_skips_remaining_listeners() {
        let mut emitter: Emitter<u32> = Emitter::new();
        emitter.on("click", Priority::High, |info, count| {
            *count += 1;
            info.stop();
        });
        emitter.on("click", Priority::Normal, |_, count| *count += 10);

        let mut count = 0;
        let info = emitter.fire("click", &mut count);
        assert!(info.is_stopped());
        assert_eq!(count, 1);
    }

    #[test]
    fn test_namespaced_events_reach_general_listeners() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut emitter: Emitter<()> = Emitter::new();

        let log = seen.clone();
        emitter.on("insert", Priority::Normal, move |info, _| {
            log.borrow_mut().push(format!("general {}", info.name))
        });
        let log = seen.clone();
        emitter.on("insert:paragraph", Priority::High, move |info, _| {
            log.borrow_mut().push(format!("specific {}", info.name))
        });

        emitter.fire("insert:paragraph", &mut ());
        emitter.fire("insert:heading", &mut ());
        emitter.fire("insertion", &mut ());

        assert_eq!(
            *seen.borrow(),
            vec![
                "specific insert:paragraph",
                "general insert:paragraph",
                "general insert:heading"
            ]
        );
    }

    #[test]
    fn test_off_removes_listener() {
        let mut emitter: Emitter<u32> = Emitter::new();
        let id = emitter.on("focus", Priority::Normal, |_, count| *count += 1);

        assert!(emitter.off(id));
        assert!(!emitter.off(id));

        let mut count = 0;
        emitter.fire("focus", &mut count);
        assert_eq!(count, 0);
    }
}
