//! End to end: data in, writer edits, DOM patches and DOM events out.

use folio_common::Priority;
use folio_view::{
    apply_patches, DomEvent, DomPatch, HtmlDataProcessor, ObserverKind, View, ViewElement, ViewPosition, ViewRange,
    DEFAULT_PRIORITY,
};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::rc::Rc;

fn loaded_view(html: &str) -> View {
    let mut view = View::new();
    view.document_mut()
        .create_root("main", "div")
        .expect("Failed to create root");
    view.attach_dom_root("main").expect("Failed to attach root");

    let fragment = HtmlDataProcessor::new().to_view(html).expect("Failed to parse");
    view.change(|writer| writer.insert(&ViewPosition::at("main", &[], 0), fragment.into_children()))
        .expect("Failed to insert");
    view
}

#[test]
fn test_patches_keep_dom_mirror_in_sync() {
    let mut view = loaded_view("<p>foo bar</p>");
    let mut dom = view.dom_root("main").cloned().expect("Rendered root");
    view.take_patches();

    view.change(|writer| {
        let range = ViewRange::new(ViewPosition::at("main", &[0, 0], 0), ViewPosition::at("main", &[0, 0], 3))?;
        writer.wrap(&range, &ViewElement::attribute("strong", DEFAULT_PRIORITY))
    })
    .expect("Failed to wrap");

    for root in view.take_patches() {
        apply_patches(&mut dom, &root.patches).expect("Failed to apply patches");
    }
    assert_eq!(Some(&dom), view.dom_root("main"));
}

#[test]
fn test_patches_serialize_for_the_host() {
    let mut view = loaded_view("<p>a</p>");
    view.take_patches();
    view.change(|writer| writer.insert(&ViewPosition::at("main", &[], 1), vec![ViewElement::container("p").into()]))
        .expect("Failed to insert");

    let patches = view.take_patches();
    let json = serde_json::to_value(&patches[0].patches).expect("Failed to serialize");
    assert_eq!(json[0]["type"], "createNode");
    assert_eq!(json[0]["path"], serde_json::json!([1]));
    assert!(matches!(patches[0].patches[0], DomPatch::CreateNode { .. }));
}

#[test]
fn test_read_only_cycle_keeps_events_flowing_once() {
    let mut view = loaded_view("<p>foo</p>");
    view.add_observer(ObserverKind::Click);
    let clicks = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&clicks);
    view.document_mut().on("click", Priority::Normal, move |_, data| {
        log.borrow_mut().push(data.dom_target.clone());
    });

    let click = DomEvent::new("click", "main").with_target(vec![0, 0]);
    view.disable_observers();
    assert!(view.handle_dom_event(&click).is_none());
    view.enable_observers();
    view.enable_observers();

    let observed = view.handle_dom_event(&click).expect("Click observer listens again");
    let target = observed.data.view_target(view.document()).expect("Target resolves");
    assert_eq!(target.name(), "p");
    assert_eq!(*clicks.borrow(), vec![Some(vec![0, 0])]);
}

#[test]
fn test_dom_event_from_json() {
    let event: DomEvent = serde_json::from_str(r#"{"type":"keydown","root":"main","keyCode":90,"ctrlKey":true,"shiftKey":true}"#)
        .expect("Failed to deserialize");
    let mut view = loaded_view("<p>foo</p>");

    let observed = view.handle_dom_event(&event).expect("Key observer listens");
    let keystroke = observed.data.keystroke.expect("Keystroke info");
    assert!(keystroke.matches("ctrl+shift+z"));
}
