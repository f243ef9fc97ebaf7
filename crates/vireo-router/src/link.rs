//! Link click classification.
//!
//! The decision of whether a click on an anchor should be intercepted is pure
//! logic over a snapshot of the anchor's attributes and the mouse event, so
//! it lives here and tests natively; the DOM walking that produces the
//! snapshot lives in `vireo-web`.

/// Attribute marking a link as opted out of client-side routing.
pub const SKIP_ATTR: &str = "data-vireo-skip";
/// Attribute keeping the current scroll position across the navigation.
pub const KEEP_SCROLL_ATTR: &str = "keep-scroll-position";
/// Attribute selecting the per-link prefetch trigger.
pub const PREFETCH_ATTR: &str = "data-prefetch-static-assets";

/// Snapshot of the anchor element a click landed on.
#[derive(Debug, Clone, Default)]
pub struct LinkSnapshot {
    pub href: Option<String>,
    pub target: Option<String>,
    pub rel: Option<String>,
    pub has_download: bool,
    /// `data-vireo-skip` present.
    pub has_skip_attr: bool,
    /// Raw `keep-scroll-position` attribute value, `None` when absent.
    pub keep_scroll_attr: Option<String>,
    /// Raw `data-prefetch-static-assets` attribute value, `None` when absent.
    pub prefetch_attr: Option<String>,
}

/// The mouse-event bits that decide whether a click is a plain primary click.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClickModifiers {
    pub button: i16,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
}

impl ClickModifiers {
    /// Unmodified left-button click. Anything else (middle click,
    /// ctrl/cmd-click to open a tab, ...) keeps native behavior.
    pub fn is_plain_left_click(&self) -> bool {
        self.button == 0 && !self.ctrl && !self.shift && !self.alt && !self.meta
    }
}

/// A click the router should handle.
#[derive(Debug, Clone, PartialEq)]
pub struct InterceptedClick {
    pub url: String,
    pub keep_scroll_position: bool,
}

/// Whether a URL points outside the app: scheme-qualified or
/// protocol-relative URLs are handled by the browser, origin-relative paths
/// by this router.
pub fn is_external_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://") || url.starts_with("//")
}

/// Whether an href uses a protocol the router must never touch
/// (`mailto:`, `tel:`, `javascript:`, ...).
fn has_non_routable_protocol(url: &str) -> bool {
    match url.find(':') {
        Some(idx) => !url[..idx].contains('/'),
        None => false,
    }
}

/// Whether a link must keep native navigation behavior.
pub fn skip_link(link: &LinkSnapshot) -> bool {
    let Some(href) = link.href.as_deref() else {
        return true;
    };
    if href.is_empty() || link.has_skip_attr || link.has_download {
        return true;
    }
    // Hash links scroll natively; popstate handles them without a render.
    if href.starts_with('#') {
        return true;
    }
    if is_external_url(href) || has_non_routable_protocol(href) {
        return true;
    }
    if link
        .target
        .as_deref()
        .is_some_and(|target| !target.is_empty() && target != "_self")
    {
        return true;
    }
    if link
        .rel
        .as_deref()
        .is_some_and(|rel| rel.split_whitespace().any(|token| token == "external"))
    {
        return true;
    }
    false
}

/// The `keep-scroll-position` attribute is truthy when present with any value
/// other than `"false"`.
fn keep_scroll_position(link: &LinkSnapshot) -> bool {
    match link.keep_scroll_attr.as_deref() {
        None => false,
        Some("false") => false,
        Some(_) => true,
    }
}

/// Decide whether a click should be intercepted.
///
/// Returns `None` when native navigation must proceed: modified clicks,
/// skipped links, or the global interception escape hatch.
pub fn classify_click(
    modifiers: ClickModifiers,
    link: &LinkSnapshot,
    interception_disabled: bool,
) -> Option<InterceptedClick> {
    if interception_disabled || !modifiers.is_plain_left_click() || skip_link(link) {
        return None;
    }
    let url = link.href.clone()?;
    Some(InterceptedClick {
        url,
        keep_scroll_position: keep_scroll_position(link),
    })
}
