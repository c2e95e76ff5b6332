//! Composition (IME) observer.
//!
//! ```text
//!            compositionstart
//!   Idle ───────────────────────▶ Composing ─┐
//!    ▲                               │       │ compositionupdate
//!    └────── compositionend ─────────┘ ◀─────┘
//! ```

use super::{fire, DomEvent, DomEventData, DomEventSource, ObservedEvent, ObserverKind};
use crate::document::ViewDocument;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompositionState {
    #[default]
    Idle,
    Composing,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompositionObserver {
    state: CompositionState,
}

impl CompositionObserver {
    pub fn state(&self) -> CompositionState {
        self.state
    }

    fn next_state(&self, event_type: &str) -> CompositionState {
        match event_type {
            "compositionstart" => CompositionState::Composing,
            "compositionend" => CompositionState::Idle,
            _ => self.state,
        }
    }
}

impl DomEventSource for CompositionObserver {
    fn kind(&self) -> ObserverKind {
        ObserverKind::Composition
    }

    fn dom_event_types(&self) -> &'static [&'static str] {
        &["compositionstart", "compositionupdate", "compositionend"]
    }

    fn on_dom_event(&mut self, event: &DomEvent, document: &mut ViewDocument) -> ObservedEvent {
        let next = self.next_state(&event.event_type);
        if next != self.state {
            debug!(from = ?self.state, to = ?next, "Composition state changed");
            self.state = next;
        }
        document.set_composing(self.state == CompositionState::Composing);

        let data = DomEventData::new(event).with_composition_data(event.data.clone());
        fire(document, data)
    }
}
