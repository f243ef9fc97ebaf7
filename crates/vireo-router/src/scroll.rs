//! Scroll restoration.
//!
//! Applying a scroll position right after a render is unreliable: the browser
//! may still be repainting and silently ignore the write. The controller uses
//! a retry ladder (immediate attempt, next animation frame, then short timer
//! retries) bounded by a total time budget, checking after each attempt
//! whether the viewport already matches the target.

use std::cell::Cell;
use std::rc::Rc;

use async_trait::async_trait;
use tracing::trace;

use crate::config::RouterConfig;
use crate::history::{ScrollPosition, url_hash};
use crate::intent::ScrollTarget;

/// The browser surface the scroll controller drives.
///
/// Covers viewport reads/writes, hash-target scrolling, native scroll
/// restoration, and repaint timing. Core tests use a scripted fake.
#[async_trait(?Send)]
pub trait ScrollHost {
    fn scroll_position(&self) -> ScrollPosition;

    fn scroll_to(&self, position: ScrollPosition);

    /// Scroll the element matching the URL fragment into view.
    /// Returns `false` when no element with that id (or name) exists.
    fn scroll_to_hash(&self, hash: &str) -> bool;

    /// Toggle the browser's native scroll restoration
    /// (`history.scrollRestoration`).
    fn set_native_restoration(&self, auto: bool);

    /// Resolves on the next animation frame.
    async fn next_frame(&self);

    async fn sleep_ms(&self, ms: u64);
}

/// Applies scroll targets after render commits.
pub struct ScrollController {
    host: Rc<dyn ScrollHost>,
    settle_budget_ms: u64,
    retry_interval_ms: u64,
}

impl ScrollController {
    pub fn new(host: Rc<dyn ScrollHost>, config: &RouterConfig) -> Self {
        Self {
            host,
            settle_budget_ms: config.scroll_settle_budget_ms,
            retry_interval_ms: config.scroll_retry_interval_ms.max(1),
        }
    }

    pub fn host(&self) -> &Rc<dyn ScrollHost> {
        &self.host
    }

    /// Position the viewport for a committed render of `url`.
    pub async fn apply(&self, target: ScrollTarget, url: &str) {
        match target {
            ScrollTarget::PreserveScroll => {}
            ScrollTarget::Position(position) => self.settle(position).await,
            ScrollTarget::ScrollToTopOrHash => {
                // Replicate the browser: a present-and-found fragment wins,
                // otherwise scroll to the top-left origin. "top" is the
                // browser's built-in pseudo target.
                if let Some(hash) = url_hash(url) {
                    if hash != "top" && self.host.scroll_to_hash(hash) {
                        return;
                    }
                }
                self.settle(ScrollPosition::origin()).await;
            }
        }
    }

    /// Write `position` until the viewport reports it, or the budget runs out.
    async fn settle(&self, position: ScrollPosition) {
        let arrived = || self.host.scroll_position() == position;
        if arrived() {
            return;
        }
        self.host.scroll_to(position);
        if arrived() {
            return;
        }
        self.host.next_frame().await;
        self.host.scroll_to(position);
        if arrived() {
            return;
        }
        // A frame plus a zero timer should suffice, but some engines need
        // more; keep retrying on a short timer until the budget is spent.
        self.host.sleep_ms(0).await;
        self.host.scroll_to(position);
        if arrived() {
            return;
        }
        let mut elapsed = 0;
        while elapsed < self.settle_budget_ms {
            self.host.sleep_ms(self.retry_interval_ms).await;
            elapsed += self.retry_interval_ms;
            self.host.scroll_to(position);
            if arrived() {
                return;
            }
        }
        trace!(?position, "scroll did not settle within budget");
    }
}

/// Rate limiter for scroll-position history writes.
///
/// Safari rejects more than ~100 history writes per 30 seconds, so saves are
/// throttled well below that.
#[derive(Debug)]
pub struct Throttle {
    min_interval_ms: u64,
    last: Cell<Option<u64>>,
}

impl Throttle {
    pub fn new(min_interval_ms: u64) -> Self {
        Self {
            min_interval_ms,
            last: Cell::new(None),
        }
    }

    /// Whether an action at `now_ms` is allowed; records it when it is.
    pub fn allow(&self, now_ms: u64) -> bool {
        match self.last.get() {
            Some(last) if now_ms.saturating_sub(last) < self.min_interval_ms => false,
            _ => {
                self.last.set(Some(now_ms));
                true
            }
        }
    }

    /// Forget the last allowed action so the next one passes immediately.
    /// Used on page-hide, where losing the save would lose the position.
    pub fn reset(&self) {
        self.last.set(None);
    }
}
