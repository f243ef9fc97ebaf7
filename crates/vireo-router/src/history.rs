//! Browser history model.
//!
//! Every history entry written by the router carries a custom state payload:
//! a strictly increasing timestamp plus the last saved scroll position. The
//! timestamp exists because `popstate` does not tell us whether the user went
//! back or forward - we infer the direction by comparing the popped entry's
//! timestamp with the one we last saw.

use serde::{Deserialize, Serialize};
use std::cell::Cell;

/// A viewport scroll offset in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScrollPosition {
    pub x: f64,
    pub y: f64,
}

impl ScrollPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn origin() -> Self {
        Self::default()
    }
}

/// The state payload persisted into `history.state`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Milliseconds since the epoch, tie-broken to be strictly increasing
    /// across entries pushed by this router.
    pub timestamp: u64,
    /// Scroll position saved for back-/forward restoration. `None` until the
    /// first scroll save for this entry.
    pub scroll_position: Option<ScrollPosition>,
}

impl HistoryEntry {
    pub fn new(timestamp: u64) -> Self {
        Self {
            timestamp,
            scroll_position: None,
        }
    }
}

/// The logical history state the popstate classifier compares:
/// the URL with its hash stripped, plus the entry payload (if any).
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalState {
    pub url_without_hash: String,
    pub entry: Option<HistoryEntry>,
}

impl LogicalState {
    pub fn new(url: &str, entry: Option<HistoryEntry>) -> Self {
        Self {
            url_without_hash: strip_hash(url).to_string(),
            entry,
        }
    }
}

/// Strip the `#fragment` part of a URL, if any.
pub fn strip_hash(url: &str) -> &str {
    match url.find('#') {
        Some(idx) => &url[..idx],
        None => url,
    }
}

/// Extract the `#fragment` part of a URL, without the `#`.
/// Returns `None` for a missing or empty fragment.
pub fn url_hash(url: &str) -> Option<&str> {
    match url.find('#') {
        Some(idx) if idx + 1 < url.len() => Some(&url[idx + 1..]),
        _ => None,
    }
}

/// Access to the browser's location and history.
///
/// The browser implementation lives in `vireo-web`; core tests use an
/// in-memory fake. All URLs are origin-relative (`/path?query#hash`) - full
/// URLs only appear when leaving the app through [`HistoryDriver::navigate_full`].
pub trait HistoryDriver {
    /// The current URL: pathname + search + hash.
    fn current_url(&self) -> String;

    /// The state payload of the current history entry, if this router wrote one.
    fn state(&self) -> Option<HistoryEntry>;

    /// Push a new history entry with the given payload.
    fn push(&self, url: &str, entry: HistoryEntry);

    /// Replace the current history entry (URL and payload).
    fn replace(&self, url: &str, entry: HistoryEntry);

    /// Leave the client router: a full browser navigation to `url`.
    /// Used for non-routable destinations, external redirects, and the
    /// session-wide fallback after client routing has been disabled.
    fn navigate_full(&self, url: &str);

    /// Wall clock in milliseconds since the epoch.
    fn now_ms(&self) -> u64;
}

/// Produces strictly increasing history timestamps even when the wall clock
/// reports the same millisecond twice.
#[derive(Debug, Default)]
pub struct Timestamper {
    last: Cell<u64>,
}

impl Timestamper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self, now_ms: u64) -> u64 {
        let ts = now_ms.max(self.last.get() + 1);
        self.last.set(ts);
        ts
    }
}

/// How a `popstate` event should be handled.
#[derive(Debug, Clone, PartialEq)]
pub enum PopStateAction {
    /// Only the hash changed: no render, just scroll handling.
    HashNavigation {
        /// `history.state` was `null`, i.e. the browser performed a native
        /// hash jump (anchor click or `location.hash = ...`). The current
        /// scroll position is already correct and must be re-seeded into the
        /// entry; a non-null state means the user traversed history and we
        /// restore the saved position ourselves.
        state_is_uninitialized: bool,
    },
    /// A real navigation: run the render pipeline.
    Navigate {
        /// Direction inferred from entry timestamps; `None` when either side
        /// has no timestamp to compare.
        is_backward_navigation: Option<bool>,
        /// Scroll position saved in the popped entry, if any.
        scroll_position: Option<ScrollPosition>,
    },
}

/// Classify a `popstate` event by comparing the current logical state with
/// the previously observed one.
pub fn classify_popstate(current: &LogicalState, previous: &LogicalState) -> PopStateAction {
    if current.url_without_hash == previous.url_without_hash {
        return PopStateAction::HashNavigation {
            state_is_uninitialized: current.entry.is_none(),
        };
    }
    let is_backward_navigation = match (&current.entry, &previous.entry) {
        (Some(cur), Some(prev)) => Some(cur.timestamp < prev.timestamp),
        _ => None,
    };
    PopStateAction::Navigate {
        is_backward_navigation,
        scroll_position: current.entry.and_then(|e| e.scroll_position),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_hash_handles_absent_and_empty_fragments() {
        assert_eq!(strip_hash("/a/b?q=1"), "/a/b?q=1");
        assert_eq!(strip_hash("/a#sec"), "/a");
        assert_eq!(strip_hash("/a#"), "/a");
    }

    #[test]
    fn url_hash_extracts_nonempty_fragment() {
        assert_eq!(url_hash("/a#sec"), Some("sec"));
        assert_eq!(url_hash("/a#"), None);
        assert_eq!(url_hash("/a"), None);
    }

    #[test]
    fn history_entry_wire_shape_is_stable() {
        // `history.state` payloads outlive deploys (old entries stay in the
        // session history), so the serialized shape is a compatibility
        // contract.
        let mut entry = HistoryEntry::new(1_700_000_000_000);
        entry.scroll_position = Some(ScrollPosition::new(0.0, 420.5));
        let json = serde_json::to_value(entry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "timestamp": 1_700_000_000_000_u64,
                "scroll_position": { "x": 0.0, "y": 420.5 },
            })
        );
        let back: HistoryEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn timestamper_breaks_ties() {
        let ts = Timestamper::new();
        let a = ts.next(1000);
        let b = ts.next(1000);
        let c = ts.next(999);
        assert_eq!(a, 1000);
        assert!(b > a);
        assert!(c > b);
    }

    #[test]
    fn hash_only_popstate_never_navigates() {
        let prev = LogicalState::new("/page#top", Some(HistoryEntry::new(1)));
        let cur = LogicalState::new("/page#details", None);
        assert_eq!(
            classify_popstate(&cur, &prev),
            PopStateAction::HashNavigation {
                state_is_uninitialized: true
            }
        );
    }

    #[test]
    fn hash_popstate_with_state_restores_saved_scroll() {
        let prev = LogicalState::new("/page", Some(HistoryEntry::new(2)));
        let cur = LogicalState::new("/page#a", Some(HistoryEntry::new(1)));
        assert_eq!(
            classify_popstate(&cur, &prev),
            PopStateAction::HashNavigation {
                state_is_uninitialized: false
            }
        );
    }

    #[test]
    fn popstate_direction_comes_from_timestamps() {
        let prev = LogicalState::new("/b", Some(HistoryEntry::new(200)));
        let cur = LogicalState::new("/a", Some(HistoryEntry::new(100)));
        assert_eq!(
            classify_popstate(&cur, &prev),
            PopStateAction::Navigate {
                is_backward_navigation: Some(true),
                scroll_position: None,
            }
        );
    }

    #[test]
    fn popstate_direction_is_unknown_without_timestamps() {
        let prev = LogicalState::new("/b", None);
        let cur = LogicalState::new("/a", Some(HistoryEntry::new(100)));
        let action = classify_popstate(&cur, &prev);
        assert_eq!(
            action,
            PopStateAction::Navigate {
                is_backward_navigation: None,
                scroll_position: None,
            }
        );
    }

    #[test]
    fn popstate_carries_saved_scroll_position() {
        let mut entry = HistoryEntry::new(100);
        entry.scroll_position = Some(ScrollPosition::new(0.0, 640.0));
        let prev = LogicalState::new("/b", Some(HistoryEntry::new(200)));
        let cur = LogicalState::new("/a", Some(entry));
        match classify_popstate(&cur, &prev) {
            PopStateAction::Navigate {
                scroll_position: Some(pos),
                ..
            } => assert_eq!(pos.y, 640.0),
            other => panic!("expected navigate with scroll, got {other:?}"),
        }
    }
}
