//! DOM-side link handling: click interception and prefetch triggers.
//!
//! The decision logic (which clicks to intercept, which prefetch trigger a
//! link gets) lives in `vireo-router`; this module only walks the DOM,
//! extracts attribute snapshots, and wires event listeners.

use js_sys::{Array, Reflect};
use tracing::{debug, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::spawn_local;
use web_sys::{
    AddEventListenerOptions, Document, Element, EventTarget, IntersectionObserver,
    IntersectionObserverEntry, MouseEvent, Window,
};

use vireo_router::link::{KEEP_SCROLL_ATTR, PREFETCH_ATTR, SKIP_ATTR};
use vireo_router::{
    ClickModifiers, LinkSnapshot, NavigationIntent, PrefetchMode, Router, classify_click, skip_link,
};

/// Window property an app can set to turn off link interception globally
/// (e.g. while a third-party widget owns navigation).
pub const DISABLE_INTERCEPTION_PROP: &str = "_vireo_disable_link_interception";

/// Marker attribute recording that prefetch listeners are already attached,
/// so re-running attachment after a render is idempotent.
const PREFETCH_BOUND_ATTR: &str = "data-vireo-prefetch-bound";

fn interception_disabled(window: &Window) -> bool {
    Reflect::get(window, &JsValue::from_str(DISABLE_INTERCEPTION_PROP))
        .map(|value| value.is_truthy())
        .unwrap_or(false)
}

/// The closest enclosing `<a>` of the event target, if any. Clicks usually
/// land on a child of the anchor (an icon, a span).
fn find_anchor(target: Option<EventTarget>) -> Option<Element> {
    let mut current = target.and_then(|t| t.dyn_into::<Element>().ok());
    while let Some(element) = current {
        if element.tag_name().eq_ignore_ascii_case("a") {
            return Some(element);
        }
        current = element.parent_element();
    }
    None
}

fn snapshot(anchor: &Element) -> LinkSnapshot {
    LinkSnapshot {
        href: anchor.get_attribute("href"),
        target: anchor.get_attribute("target"),
        rel: anchor.get_attribute("rel"),
        has_download: anchor.has_attribute("download"),
        has_skip_attr: anchor.has_attribute(SKIP_ATTR),
        keep_scroll_attr: anchor.get_attribute(KEEP_SCROLL_ATTR),
        prefetch_attr: anchor.get_attribute(PREFETCH_ATTR),
    }
}

fn modifiers(event: &MouseEvent) -> ClickModifiers {
    ClickModifiers {
        button: event.button(),
        ctrl: event.ctrl_key(),
        shift: event.shift_key(),
        alt: event.alt_key(),
        meta: event.meta_key(),
    }
}

/// Install the document-level click listener that routes anchor clicks
/// through the render pipeline. The listener stays installed for the page
/// lifetime.
pub fn install_click_interception(router: &Router, window: &Window, document: &Document) {
    let router = router.clone();
    let window = window.clone();
    let on_click = Closure::<dyn FnMut(MouseEvent)>::new(move |event: MouseEvent| {
        if event.default_prevented() {
            return;
        }
        let Some(anchor) = find_anchor(event.target()) else {
            return;
        };
        let link = snapshot(&anchor);
        let Some(click) = classify_click(modifiers(&event), &link, interception_disabled(&window))
        else {
            return;
        };
        event.prevent_default();
        debug!(url = %click.url, "link click intercepted");
        let router = router.clone();
        spawn_local(async move {
            let intent = NavigationIntent::link_click(click.url, click.keep_scroll_position);
            if let Err(err) = router.render_page_client_side(intent).await {
                warn!(%err, "navigation failed");
            }
        });
    });
    if let Err(err) =
        document.add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref())
    {
        warn!(?err, "click listener installation failed");
    }
    on_click.forget();
}

/// Attach prefetch triggers to every unbound internal link in the document.
///
/// Runs after each committed render; already-bound anchors are skipped via a
/// marker attribute, so partial DOM updates only pick up the new links.
pub fn add_link_prefetch_handlers(
    router: &Router,
    document: &Document,
    page_default: Option<PrefetchMode>,
) {
    let Ok(anchors) = document.query_selector_all("a[href]") else {
        return;
    };
    for index in 0..anchors.length() {
        let Some(anchor) = anchors
            .item(index)
            .and_then(|node| node.dyn_into::<Element>().ok())
        else {
            continue;
        };
        if anchor.has_attribute(PREFETCH_BOUND_ATTR) {
            continue;
        }
        let _ = anchor.set_attribute(PREFETCH_BOUND_ATTR, "");

        let link = snapshot(&anchor);
        if skip_link(&link) {
            continue;
        }
        let Some(url) = link.href.clone() else {
            continue;
        };
        let mode = PrefetchMode::resolve(
            link.prefetch_attr.as_deref(),
            page_default,
            router.default_prefetch_mode(),
        );
        match mode {
            PrefetchMode::Disabled => {}
            PrefetchMode::Hover => attach_hover_prefetch(router, &anchor, url),
            PrefetchMode::Viewport => attach_viewport_prefetch(router, &anchor, url),
        }
    }
}

fn prefetch_in_background(router: &Router, url: String) {
    let router = router.clone();
    spawn_local(async move {
        if let Err(err) = router.prefetch_if_routable(&url).await {
            warn!(url, %err, "prefetch failed");
        }
    });
}

fn attach_hover_prefetch(router: &Router, anchor: &Element, url: String) {
    for event_name in ["mouseover", "touchstart"] {
        let router = router.clone();
        let url = url.clone();
        let on_trigger = Closure::<dyn FnMut()>::new(move || {
            prefetch_in_background(&router, url.clone());
        });
        let options = AddEventListenerOptions::new();
        options.set_passive(true);
        if let Err(err) = anchor.add_event_listener_with_callback_and_add_event_listener_options(
            event_name,
            on_trigger.as_ref().unchecked_ref(),
            &options,
        ) {
            warn!(event_name, ?err, "prefetch listener installation failed");
        }
        on_trigger.forget();
    }
}

fn attach_viewport_prefetch(router: &Router, anchor: &Element, url: String) {
    let router = router.clone();
    let on_intersect = Closure::<dyn FnMut(Array, IntersectionObserver)>::new(
        move |entries: Array, observer: IntersectionObserver| {
            for entry in entries.iter() {
                let Ok(entry) = entry.dyn_into::<IntersectionObserverEntry>() else {
                    continue;
                };
                if !entry.is_intersecting() {
                    continue;
                }
                prefetch_in_background(&router, url.clone());
                // One shot per link: once prefetched there is nothing left
                // to observe.
                observer.unobserve(&entry.target());
                observer.disconnect();
            }
        },
    );
    match IntersectionObserver::new(on_intersect.as_ref().unchecked_ref()) {
        Ok(observer) => observer.observe(anchor),
        Err(err) => warn!(?err, "IntersectionObserver creation failed"),
    }
    on_intersect.forget();
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn document() -> Document {
        web_sys::window().unwrap().document().unwrap()
    }

    fn anchor(href: &str) -> Element {
        let a = document().create_element("a").unwrap();
        a.set_attribute("href", href).unwrap();
        a
    }

    #[wasm_bindgen_test]
    fn snapshot_reads_router_attributes() {
        let a = anchor("/docs");
        a.set_attribute(KEEP_SCROLL_ATTR, "").unwrap();
        a.set_attribute(PREFETCH_ATTR, "viewport").unwrap();
        let link = snapshot(&a);
        assert_eq!(link.href.as_deref(), Some("/docs"));
        assert_eq!(link.keep_scroll_attr.as_deref(), Some(""));
        assert_eq!(link.prefetch_attr.as_deref(), Some("viewport"));
        assert!(!link.has_skip_attr);
        assert!(!skip_link(&link));
    }

    #[wasm_bindgen_test]
    fn find_anchor_walks_up_from_nested_children() {
        let a = anchor("/docs");
        let span = document().create_element("span").unwrap();
        a.append_child(&span).unwrap();
        let found = find_anchor(Some(span.into())).unwrap();
        assert_eq!(found.get_attribute("href").as_deref(), Some("/docs"));
    }

    #[wasm_bindgen_test]
    fn find_anchor_gives_up_outside_links() {
        let div = document().create_element("div").unwrap();
        assert!(find_anchor(Some(div.into())).is_none());
    }

    #[wasm_bindgen_test]
    fn skip_attribute_keeps_native_navigation() {
        let a = anchor("/native");
        a.set_attribute(SKIP_ATTR, "").unwrap();
        assert!(skip_link(&snapshot(&a)));
    }
}
