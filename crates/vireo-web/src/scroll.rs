//! [`ScrollHost`] backed by the browser viewport.

use async_trait::async_trait;
use js_sys::Promise;
use tracing::warn;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{Element, ScrollRestoration, Window};

use vireo_router::{ScrollHost, ScrollPosition};

pub struct BrowserScroll {
    window: Window,
}

impl BrowserScroll {
    pub fn new(window: Window) -> Self {
        Self { window }
    }

    /// The element a URL fragment points at: by id first, then by the legacy
    /// `name` attribute, like native anchor navigation.
    fn hash_element(&self, hash: &str) -> Option<Element> {
        let document = self.window.document()?;
        if let Some(element) = document.get_element_by_id(hash) {
            return Some(element);
        }
        document
            .get_elements_by_name(hash)
            .item(0)
            .and_then(|node| node.dyn_into::<Element>().ok())
    }
}

#[async_trait(?Send)]
impl ScrollHost for BrowserScroll {
    fn scroll_position(&self) -> ScrollPosition {
        ScrollPosition::new(
            self.window.scroll_x().unwrap_or(0.0),
            self.window.scroll_y().unwrap_or(0.0),
        )
    }

    fn scroll_to(&self, position: ScrollPosition) {
        self.window.scroll_to_with_x_and_y(position.x, position.y);
    }

    fn scroll_to_hash(&self, hash: &str) -> bool {
        match self.hash_element(hash) {
            Some(element) => {
                element.scroll_into_view();
                true
            }
            None => false,
        }
    }

    fn set_native_restoration(&self, auto: bool) {
        let restoration = if auto {
            ScrollRestoration::Auto
        } else {
            ScrollRestoration::Manual
        };
        if let Ok(history) = self.window.history() {
            if let Err(err) = history.set_scroll_restoration(restoration) {
                warn!(?err, "history.scrollRestoration write failed");
            }
        }
    }

    async fn next_frame(&self) {
        let window = self.window.clone();
        let promise = Promise::new(&mut |resolve, _reject| {
            if window.request_animation_frame(&resolve).is_err() {
                // Frame scheduling unavailable (e.g. a detached window);
                // resolve immediately so the retry ladder keeps moving.
                let _ = resolve.call0(&JsValue::NULL);
            }
        });
        let _ = JsFuture::from(promise).await;
    }

    async fn sleep_ms(&self, ms: u64) {
        let window = self.window.clone();
        let promise = Promise::new(&mut |resolve, _reject| {
            let scheduled = window.set_timeout_with_callback_and_timeout_and_arguments_0(
                &resolve,
                ms.min(i32::MAX as u64) as i32,
            );
            if scheduled.is_err() {
                let _ = resolve.call0(&JsValue::NULL);
            }
        });
        let _ = JsFuture::from(promise).await;
    }
}
