//! # Priorities
//!
//! Handlers registered on dispatchers and emitters run in priority order,
//! highest first. Handlers sharing a priority run in registration order.

use crate::{CommonError, CommonResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named priority levels plus an escape hatch for exact values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Highest,
    High,
    #[default]
    Normal,
    Low,
    Lowest,
    Custom(i32),
}

impl Priority {
    pub fn value(self) -> i32 {
        match self {
            Priority::Highest => 100_000,
            Priority::High => 1_000,
            Priority::Normal => 0,
            Priority::Low => -1_000,
            Priority::Lowest => -100_000,
            Priority::Custom(value) => value,
        }
    }
}

impl From<i32> for Priority {
    fn from(value: i32) -> Self {
        Priority::Custom(value)
    }
}

impl FromStr for Priority {
    type Err = CommonError;

    fn from_str(s: &str) -> CommonResult<Self> {
        match s {
            "highest" => Ok(Priority::Highest),
            "high" => Ok(Priority::High),
            "normal" => Ok(Priority::Normal),
            "low" => Ok(Priority::Low),
            "lowest" => Ok(Priority::Lowest),
            other => other
                .parse::<i32>()
                .map(Priority::Custom)
                .map_err(|_| CommonError::UnknownPriority(other.to_string())),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Highest => write!(f, "highest"),
            Priority::High => write!(f, "high"),
            Priority::Normal => write!(f, "normal"),
            Priority::Low => write!(f, "low"),
            Priority::Lowest => write!(f, "lowest"),
            Priority::Custom(value) => write!(f, "{}", value),
        }
    }
}

/// Handle returned when registering a handler, used to remove it again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

#[derive(Debug)]
struct HandlerEntry<H> {
    id: ListenerId,
    priority: i32,
    handler: H,
}

/// Handlers kept sorted by descending priority, stable for equal priorities
#[derive(Debug)]
pub struct HandlerList<H> {
    entries: Vec<HandlerEntry<H>>,
    next_id: u64,
}

impl<H> Default for HandlerList<H> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
        }
    }
}

impl<H> HandlerList<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a handler after every handler with the same or higher priority
    pub fn insert(&mut self, priority: Priority, handler: H) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;

        let value = priority.value();
        let index = self
            .entries
            .iter()
            .position(|entry| entry.priority < value)
            .unwrap_or(self.entries.len());

        self.entries.insert(
            index,
            HandlerEntry {
                id,
                priority: value,
                handler,
            },
        );
        id
    }

    pub fn remove(&mut self, id: ListenerId) -> Option<H> {
        let index = self.entries.iter().position(|entry| entry.id == id)?;
        Some(self.entries.remove(index).handler)
    }

    pub fn contains(&self, id: ListenerId) -> bool {
        self.entries.iter().any(|entry| entry.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Handlers in call order
    pub fn iter(&self) -> impl Iterator<Item = &H> {
        self.entries.iter().map(|entry| &entry.handler)
    }

    pub fn iter_with_ids(&self) -> impl Iterator<Item = (ListenerId, &H)> {
        self.entries.iter().map(|entry| (entry.id, &entry.handler))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut H> {
        self.entries.iter_mut().map(|entry| &mut entry.handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orders_by_priority_then_registration() {
        let mut list = HandlerList::new();
        list.insert(Priority::Low, "low");
        list.insert(Priority::Highest, "highest-1");
        list.insert(Priority::Normal, "normal");
        list.insert(Priority::Highest, "highest-2");
        list.insert(Priority::Lowest, "lowest");
        list.insert(Priority::Custom(5), "custom");

        let order: Vec<_> = list.iter().copied().collect();
        assert_eq!(
            order,
            vec!["highest-1", "highest-2", "custom", "normal", "low", "lowest"]
        );
    }

    #[test]
    fn test_remove_handler() {
        let mut list = HandlerList::new();
        let a = list.insert(Priority::Normal, 1);
        let b = list.insert(Priority::Normal, 2);

        assert_eq!(list.remove(a), Some(1));
        assert_eq!(list.remove(a), None);
        assert!(list.contains(b));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_parse_priority() {
        assert_eq!("high".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!("-20".parse::<Priority>().unwrap(), Priority::Custom(-20));
        assert!("urgent".parse::<Priority>().is_err());
    }
}
