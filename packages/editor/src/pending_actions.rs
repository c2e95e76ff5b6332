//! Long-running actions the host should know about, e.g. to warn before
//! the page is closed while an upload is still running. They have no
//! effect on editing.

use folio_common::{ListenerId, Observable};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PendingActionId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAction {
    pub id: PendingActionId,
    pub message: String,
}

pub struct PendingActions {
    actions: Vec<PendingAction>,
    has_any: Observable<bool>,
    next_id: u64,
}

impl std::fmt::Debug for PendingActions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingActions").field("actions", &self.actions).finish()
    }
}

impl Default for PendingActions {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingActions {
    pub fn new() -> Self {
        Self {
            actions: Vec::new(),
            has_any: Observable::new(false),
            next_id: 1,
        }
    }

    pub fn add(&mut self, message: impl Into<String>) -> PendingActionId {
        let id = PendingActionId(self.next_id);
        self.next_id += 1;
        let message = message.into();
        debug!(id = id.0, message = %message, "Pending action added");
        self.actions.push(PendingAction { id, message });
        self.has_any.set(true);
        id
    }

    pub fn remove(&mut self, id: PendingActionId) -> bool {
        let before = self.actions.len();
        self.actions.retain(|action| action.id != id);
        let removed = before != self.actions.len();
        if removed {
            self.has_any.set(!self.actions.is_empty());
        }
        removed
    }

    pub fn has_any(&self) -> bool {
        *self.has_any.get()
    }

    pub fn on_has_any_change(&mut self, listener: impl FnMut(&bool, &bool) + 'static) -> ListenerId {
        self.has_any.on_change(listener)
    }

    pub fn first(&self) -> Option<&PendingAction> {
        self.actions.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingAction> {
        self.actions.iter()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_has_any_follows_actions() {
        let changes = Rc::new(RefCell::new(Vec::new()));
        let mut actions = PendingActions::new();
        let seen = Rc::clone(&changes);
        actions.on_has_any_change(move |_, new| seen.borrow_mut().push(*new));

        let upload = actions.add("Uploading image");
        let save = actions.add("Saving");
        assert!(actions.has_any());
        assert_eq!(actions.first().map(|action| action.message.as_str()), Some("Uploading image"));

        assert!(actions.remove(upload));
        assert!(!actions.remove(upload));
        assert!(actions.has_any());
        assert!(actions.remove(save));
        assert!(!actions.has_any());

        assert_eq!(*changes.borrow(), vec![true, false]);
    }
}
