//! Error types for the router core.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RouterError>;

/// Errors surfaced by the navigation pipeline.
///
/// Logical aborts (rewrite / redirect / render-with-status) are *not* errors:
/// they travel through [`ResolveOutcome`](crate::context::ResolveOutcome) so
/// the state machine can branch on them exhaustively.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// A routing hook kept rewriting/redirecting without ever settling on a page.
    #[error(
        "infinite abort loop: {rewrites} rewrite(s) and {redirects} redirect(s) without settling on a page"
    )]
    InfiniteAbortLoop { rewrites: usize, redirects: usize },

    /// A static asset for the destination page could not be fetched.
    /// Usually means a new frontend was deployed while this session was live.
    #[error("failed to fetch static assets for {url}")]
    AssetFetch { url: String },

    /// `prefetch()` was called with a URL on another origin.
    #[error("cannot prefetch cross-origin URL: {url}")]
    CrossOriginPrefetch { url: String },

    /// A user-provided lifecycle hook returned an error.
    #[error("hook '{hook}' failed: {message}")]
    Hook { hook: &'static str, message: String },

    /// Page-context resolution failed for a reason other than a logical abort.
    #[error("{0}")]
    Resolution(String),
}

impl RouterError {
    /// Whether two errors are equivalent for the purpose of error-page
    /// saturation: an error page that fails with the *same* error as the page
    /// it was meant to replace is unrecoverable and must not loop.
    pub fn is_equivalent(&self, other: &RouterError) -> bool {
        self == other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equivalent_errors_compare_by_content() {
        let a = RouterError::Resolution("boom".into());
        let b = RouterError::Resolution("boom".into());
        let c = RouterError::Resolution("other".into());
        assert!(a.is_equivalent(&b));
        assert!(!a.is_equivalent(&c));
    }

    #[test]
    fn abort_loop_message_names_both_counters() {
        let err = RouterError::InfiniteAbortLoop {
            rewrites: 7,
            redirects: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("7 rewrite"));
        assert!(msg.contains("2 redirect"));
    }
}
