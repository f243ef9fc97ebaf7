//! Navigation intents.
//!
//! A [`NavigationIntent`] is the single input of the render pipeline. Link
//! interception, popstate handling, internal redirects, and the initial
//! hydration all funnel into one.

use crate::history::ScrollPosition;

/// Where the viewport should end up after the render commits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollTarget {
    /// Leave the viewport where it is (`keep-scroll-position` links,
    /// hydration).
    PreserveScroll,
    /// Replicate native behavior: scroll to the URL fragment's element when
    /// present and found, otherwise to the top-left origin.
    ScrollToTopOrHash,
    /// Restore an explicit saved position (back-/forward navigation).
    Position(ScrollPosition),
}

/// A single navigation request, consumed once by the router.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationIntent {
    /// Destination URL, origin-relative (`/path?query#hash`).
    pub url: String,
    /// `Some(true)` for history-back, `Some(false)` for forward/new, `None`
    /// when the direction cannot be determined.
    pub is_backward_navigation: Option<bool>,
    pub scroll_target: ScrollTarget,
    /// Replace the current history entry instead of pushing a new one.
    pub overwrite_last_history_entry: bool,
    /// Verify the destination routes client-side before intercepting; set for
    /// link clicks, not for popstate or the initial render (those URLs are
    /// already ours).
    pub check_client_routable: bool,
}

impl NavigationIntent {
    /// Intent for an intercepted link click.
    pub fn link_click(url: impl Into<String>, keep_scroll_position: bool) -> Self {
        Self {
            url: url.into(),
            is_backward_navigation: Some(false),
            scroll_target: if keep_scroll_position {
                ScrollTarget::PreserveScroll
            } else {
                ScrollTarget::ScrollToTopOrHash
            },
            overwrite_last_history_entry: false,
            check_client_routable: true,
        }
    }

    /// Intent for a back-/forward history navigation.
    pub fn history_pop(
        url: impl Into<String>,
        scroll_target: ScrollTarget,
        is_backward_navigation: Option<bool>,
    ) -> Self {
        Self {
            url: url.into(),
            is_backward_navigation,
            scroll_target,
            overwrite_last_history_entry: false,
            check_client_routable: false,
        }
    }

    /// Intent for the initial hydration render.
    pub fn initial(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            is_backward_navigation: None,
            scroll_target: ScrollTarget::PreserveScroll,
            overwrite_last_history_entry: false,
            check_client_routable: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_click_scroll_target_follows_keep_scroll_flag() {
        assert_eq!(
            NavigationIntent::link_click("/a", true).scroll_target,
            ScrollTarget::PreserveScroll
        );
        assert_eq!(
            NavigationIntent::link_click("/a", false).scroll_target,
            ScrollTarget::ScrollToTopOrHash
        );
    }

    #[test]
    fn only_link_clicks_check_routability() {
        assert!(NavigationIntent::link_click("/a", false).check_client_routable);
        assert!(!NavigationIntent::initial("/").check_client_routable);
        assert!(
            !NavigationIntent::history_pop("/a", ScrollTarget::ScrollToTopOrHash, None)
                .check_client_routable
        );
    }
}
