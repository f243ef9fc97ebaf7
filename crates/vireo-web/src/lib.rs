//! # vireo-web
//!
//! Browser runtime for the Vireo client router. Implements the platform
//! traits of `vireo-router` over `web-sys` (History API, viewport scrolling,
//! repaint timing) and wires the DOM event sources - link clicks, `popstate`,
//! scrolling, page hide/show - into the render pipeline.
//!
//! The entry point is [`install_client_router`]: the meta-framework's
//! generated client glue constructs its [`PageContextBuilder`] over the
//! page's JS exports and installs the router once per page load.
//!
//! [`PageContextBuilder`]: vireo_router::PageContextBuilder

use wasm_bindgen::prelude::*;

mod error;
mod history;
mod install;
mod links;
mod scroll;

pub use error::InstallError;
pub use history::BrowserHistory;
pub use install::install_client_router;
pub use links::{DISABLE_INTERCEPTION_PROP, add_link_prefetch_handlers};
pub use scroll::BrowserScroll;

/// Better panic messages in the browser console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}
