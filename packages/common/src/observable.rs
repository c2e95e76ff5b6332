//! Observable properties.
//!
//! A small component attached by construction to whatever type needs to
//! publish state changes (`is_composing`, `is_read_only`, ...).

use crate::priority::ListenerId;

type ChangeListener<T> = Box<dyn FnMut(&T, &T)>;

pub struct Observable<T> {
    value: T,
    listeners: Vec<(ListenerId, ChangeListener<T>)>,
    next_id: u64,
}

impl<T: PartialEq + Clone> Observable<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            listeners: Vec::new(),
            next_id: 1,
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    /// Set the value; listeners see `(old, new)` only when it actually changes
    pub fn set(&mut self, value: T) -> bool {
        if self.value == value {
            return false;
        }
        let old = std::mem::replace(&mut self.value, value);
        for (_, listener) in self.listeners.iter_mut() {
            listener(&old, &self.value);
        }
        true
    }

    pub fn on_change<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&T, &T) + 'static,
    {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        before != self.listeners.len()
    }
}

impl<T: PartialEq + Clone + Default> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observable")
            .field("value", &self.value)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_notifies_only_on_change() {
        let changes = Rc::new(RefCell::new(Vec::new()));
        let mut flag = Observable::new(false);

        let log = changes.clone();
        flag.on_change(move |old, new| log.borrow_mut().push((*old, *new)));

        assert!(flag.set(true));
        assert!(!flag.set(true));
        assert!(flag.set(false));

        assert_eq!(*changes.borrow(), vec![(false, true), (true, false)]);
        assert!(!*flag.get());
    }

    #[test]
    fn test_off_stops_notifications() {
        let count = Rc::new(RefCell::new(0));
        let mut value = Observable::new(1);

        let counter = count.clone();
        let id = value.on_change(move |_, _| *counter.borrow_mut() += 1);
        value.set(2);
        assert!(value.off(id));
        value.set(3);

        assert_eq!(*count.borrow(), 1);
    }
}
