#[cfg(target_arch = "wasm32")]
mod common;

#[cfg(target_arch = "wasm32")]
mod web_tests {
    use std::{cell::RefCell, rc::Rc};

    use flow_viewer::{
        ViewerEvent,
        error::LoadFailure,
        loading::LoadCoordinator,
        web::{ElementBinding, dispatch_dom_event},
    };
    use wasm_bindgen::{JsCast, prelude::Closure};
    use wasm_bindgen_test::*;
    use web_sys::{CustomEvent, Event, HtmlElement};

    use crate::common::test_utils::{Harness, cube_asset};

    wasm_bindgen_test_configure!(run_in_browser);

    #[derive(Debug)]
    struct Seen {
        name: String,
        bubbles: bool,
        composed: bool,
        detail: Option<String>,
    }

    /// A fresh element inside `<body>` and everything that bubbled up to the body.
    fn element_in_body() -> (HtmlElement, Rc<RefCell<Vec<Seen>>>, Closure<dyn FnMut(Event)>) {
        let document = web_sys::window().unwrap().document().unwrap();
        let body = document.body().unwrap();
        let element: HtmlElement = document.create_element("div").unwrap().dyn_into().unwrap();
        body.append_child(&element).unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let listener = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            let detail = event
                .dyn_ref::<CustomEvent>()
                .and_then(|custom| custom.detail().as_string());
            sink.borrow_mut().push(Seen {
                name: event.type_(),
                bubbles: event.bubbles(),
                composed: event.composed(),
                detail,
            });
        });
        for name in [ViewerEvent::MODEL_LOADED, ViewerEvent::MODEL_ERROR] {
            body.add_event_listener_with_callback(name, listener.as_ref().unchecked_ref())
                .unwrap();
        }
        (element, seen, listener)
    }

    #[wasm_bindgen_test]
    fn errors_bubble_out_of_the_element() {
        let (element, seen, _listener) = element_in_body();
        let request = LoadCoordinator::new().issue("missing.glb");
        let failure = LoadFailure {
            url: request.url.clone(),
            request: request.id,
            cause: anyhow::anyhow!("404 Not Found"),
        };

        dispatch_dom_event(&element, &ViewerEvent::ModelError(Rc::new(failure))).unwrap();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].name, "model-error");
        assert!(seen[0].bubbles);
        assert!(seen[0].composed);
        let detail = seen[0].detail.as_deref().unwrap();
        assert!(detail.contains("missing.glb"));
        assert!(detail.contains("404 Not Found"));
        element.remove();
    }

    #[wasm_bindgen_test]
    fn binding_forwards_events_and_detaches_on_drop() {
        let (element, seen, _listener) = element_in_body();
        let harness = Harness::attached(&[("model-url", "a.glb")]);
        let binding = ElementBinding::new(&harness.viewer, &element).unwrap();

        harness.complete("a.glb", Ok(cube_asset(1.0)));
        assert_eq!(seen.borrow()[0].name, "model-loaded");
        assert_eq!(seen.borrow()[0].detail.as_deref(), Some("a.glb"));

        drop(binding);
        assert!(!harness.viewer.is_attached());
        assert!(harness.stats.borrow().is_disposed());
        assert!(harness.stats.borrow().models.is_empty());
        element.remove();
    }
}
