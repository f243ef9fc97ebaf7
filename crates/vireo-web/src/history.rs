//! [`HistoryDriver`] backed by the browser's History API.
//!
//! State payloads cross the JS boundary through `serde-wasm-bindgen`. A
//! payload we did not write (another script's state, or a malformed one)
//! deserializes to `None`, which the core treats as an uninitialized entry.

use tracing::warn;
use wasm_bindgen::JsValue;
use web_sys::{History, Location, Window};

use vireo_router::{HistoryDriver, HistoryEntry};

use crate::error::InstallError;

pub struct BrowserHistory {
    history: History,
    location: Location,
}

impl BrowserHistory {
    pub fn new(window: &Window) -> Result<Self, InstallError> {
        let history = window.history().map_err(|_| InstallError::NoHistory)?;
        Ok(Self {
            history,
            location: window.location(),
        })
    }

    fn entry_to_js(entry: &HistoryEntry) -> JsValue {
        match serde_wasm_bindgen::to_value(entry) {
            Ok(value) => value,
            Err(err) => {
                warn!(%err, "history state serialization failed");
                JsValue::NULL
            }
        }
    }
}

impl HistoryDriver for BrowserHistory {
    fn current_url(&self) -> String {
        let pathname = self.location.pathname().unwrap_or_default();
        let search = self.location.search().unwrap_or_default();
        let hash = self.location.hash().unwrap_or_default();
        format!("{pathname}{search}{hash}")
    }

    fn state(&self) -> Option<HistoryEntry> {
        let state = self.history.state().ok()?;
        if state.is_null() || state.is_undefined() {
            return None;
        }
        serde_wasm_bindgen::from_value(state).ok()
    }

    fn push(&self, url: &str, entry: HistoryEntry) {
        let state = Self::entry_to_js(&entry);
        if let Err(err) = self.history.push_state_with_url(&state, "", Some(url)) {
            warn!(url, ?err, "history.pushState failed");
        }
    }

    fn replace(&self, url: &str, entry: HistoryEntry) {
        let state = Self::entry_to_js(&entry);
        if let Err(err) = self.history.replace_state_with_url(&state, "", Some(url)) {
            warn!(url, ?err, "history.replaceState failed");
        }
    }

    fn navigate_full(&self, url: &str) {
        if let Err(err) = self.location.set_href(url) {
            warn!(url, ?err, "full navigation failed");
        }
    }

    fn now_ms(&self) -> u64 {
        js_sys::Date::now() as u64
    }
}
