//! Installation errors.

use thiserror::Error;
use wasm_bindgen::JsValue;

/// Failures while wiring the router into the browser environment.
///
/// These can only happen in non-browser contexts (workers, SSR executing
/// client code by mistake), so they surface at install time rather than
/// being threaded through the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstallError {
    #[error("no global `window` object (not running in a browser?)")]
    NoWindow,
    #[error("`window.document` is missing")]
    NoDocument,
    #[error("`window.history` is not accessible")]
    NoHistory,
}

impl From<InstallError> for JsValue {
    fn from(err: InstallError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}
