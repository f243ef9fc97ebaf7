//! Router configuration.

use crate::prefetch::PrefetchMode;

/// Tunables for the navigation pipeline.
///
/// The defaults replicate browser-friendly behavior: Safari rejects more than
/// ~100 history writes per 30 seconds, so scroll saving is throttled to three
/// writes per second, and scroll settling is bounded so a slow repaint can
/// never wedge a navigation.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Maximum number of rewrite aborts a single navigation may accumulate
    /// before it is treated as an infinite loop.
    pub max_rewrites: usize,

    /// Maximum number of internal redirects a single navigation may chain.
    pub max_redirects: usize,

    /// Total time budget for the scroll-settling retry ladder.
    pub scroll_settle_budget_ms: u64,

    /// Delay between timer-based scroll retries.
    pub scroll_retry_interval_ms: u64,

    /// Minimum interval between scroll-position history writes.
    pub scroll_save_min_interval_ms: u64,

    /// Prefetch trigger used for links without a per-link override.
    pub default_prefetch_mode: PrefetchMode,

    /// Whether the initial hydration render may be aborted by a newer
    /// navigation. Pages can also opt in through their exports.
    pub hydration_can_be_aborted: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_rewrites: 6,
            max_redirects: 6,
            scroll_settle_budget_ms: 100,
            scroll_retry_interval_ms: 10,
            scroll_save_min_interval_ms: 334,
            default_prefetch_mode: PrefetchMode::Hover,
            hydration_can_be_aborted: false,
        }
    }
}

impl RouterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_rewrites(mut self, n: usize) -> Self {
        self.max_rewrites = n;
        self
    }

    pub fn max_redirects(mut self, n: usize) -> Self {
        self.max_redirects = n;
        self
    }

    pub fn default_prefetch_mode(mut self, mode: PrefetchMode) -> Self {
        self.default_prefetch_mode = mode;
        self
    }

    pub fn abortable_hydration(mut self, enabled: bool) -> Self {
        self.hydration_can_be_aborted = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_bounded() {
        let cfg = RouterConfig::default();
        assert!(cfg.max_rewrites > 0);
        assert!(cfg.max_redirects > 0);
        assert!(cfg.scroll_settle_budget_ms >= cfg.scroll_retry_interval_ms);
        // Three writes per second keeps us under Safari's history write limit.
        assert!(cfg.scroll_save_min_interval_ms >= 333);
    }

    #[test]
    fn builder_methods_override_defaults() {
        let cfg = RouterConfig::new()
            .max_rewrites(2)
            .max_redirects(3)
            .abortable_hydration(true);
        assert_eq!(cfg.max_rewrites, 2);
        assert_eq!(cfg.max_redirects, 3);
        assert!(cfg.hydration_can_be_aborted);
    }
}
