//! Keyboard observer

use super::{fire, DomEvent, DomEventData, DomEventSource, ObservedEvent, ObserverKind};
use crate::document::ViewDocument;
use crate::keyboard::KeystrokeInfo;

/// Fires `keydown`/`keyup` with [`KeystrokeInfo`] attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyObserver;

impl DomEventSource for KeyObserver {
    fn kind(&self) -> ObserverKind {
        ObserverKind::Key
    }

    fn dom_event_types(&self) -> &'static [&'static str] {
        &["keydown", "keyup"]
    }

    fn on_dom_event(&mut self, event: &DomEvent, document: &mut ViewDocument) -> ObservedEvent {
        let data = DomEventData::new(event).with_keystroke(KeystrokeInfo::from_dom_event(event));
        fire(document, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::{parse_keystroke, CTRL};
    use folio_common::Priority;

    #[test]
    fn test_keydown_carries_keystroke() {
        let mut document = ViewDocument::new();
        document.on("keydown", Priority::Normal, |info, data| {
            if data.keystroke.is_some_and(|k| k.matches("ctrl+b")) {
                data.prevent_default();
                info.stop();
            }
        });

        let bold = DomEvent::new("keydown", "main").with_key_code(66).with_ctrl();
        let observed = KeyObserver.on_dom_event(&bold, &mut document);
        assert!(observed.data.is_default_prevented());
        assert_eq!(
            observed.data.keystroke.map(|k| k.keystroke),
            Some(parse_keystroke("ctrl+b").expect("Failed to parse"))
        );
        assert_eq!(CTRL + 66, parse_keystroke("ctrl+b").expect("Failed to parse"));

        let plain = DomEvent::new("keydown", "main").with_key_code(66);
        assert!(!KeyObserver.on_dom_event(&plain, &mut document).data.is_default_prevented());
    }
}
