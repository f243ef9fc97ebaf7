//! Page lifecycle hooks.
//!
//! Pages export optional lifecycle functions. The browser runtime wraps the
//! page's JS exports into [`Hook`] values; native tests use plain closures.
//! All hooks run through [`execute_hook`] so absence and error propagation are
//! handled in one place.

use std::rc::Rc;

use futures::future::LocalBoxFuture;
use tracing::debug;

use crate::context::PageContext;
use crate::error::{Result, RouterError};

/// A user-provided lifecycle function. Receives the committed page context.
pub type Hook = Rc<dyn Fn(Rc<PageContext>) -> LocalBoxFuture<'static, Result<()>>>;

/// Build a [`Hook`] from an async closure.
pub fn hook<F, Fut>(f: F) -> Hook
where
    F: Fn(Rc<PageContext>) -> Fut + 'static,
    Fut: std::future::Future<Output = Result<()>> + 'static,
{
    Rc::new(move |ctx| Box::pin(f(ctx)))
}

/// The optional lifecycle capability surface of a page.
#[derive(Clone, Default)]
pub struct PageHooks {
    /// Runs once when a page transition starts, before any suspension point.
    pub on_page_transition_start: Option<Hook>,
    /// Runs after the most current render commits, when a transition was active.
    pub on_page_transition_end: Option<Hook>,
    /// Runs once after the initial hydration render.
    pub on_hydration_end: Option<Hook>,
}

impl std::fmt::Debug for PageHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageHooks")
            .field(
                "on_page_transition_start",
                &self.on_page_transition_start.is_some(),
            )
            .field(
                "on_page_transition_end",
                &self.on_page_transition_end.is_some(),
            )
            .field("on_hydration_end", &self.on_hydration_end.is_some())
            .finish()
    }
}

/// Execute an optional hook, doing nothing when it is absent.
///
/// Hook failures are wrapped with the hook name so the host application's
/// error reporting can attribute them.
pub async fn execute_hook(
    hook: Option<&Hook>,
    name: &'static str,
    ctx: Rc<PageContext>,
) -> Result<()> {
    let Some(hook) = hook else {
        return Ok(());
    };
    debug!(hook = name, url = %ctx.url, "executing page hook");
    hook(ctx).await.map_err(|err| RouterError::Hook {
        hook: name,
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn ctx() -> Rc<PageContext> {
        Rc::new(PageContext::new("/", None))
    }

    #[tokio::test]
    async fn absent_hook_is_a_no_op() {
        assert!(execute_hook(None, "onHydrationEnd", ctx()).await.is_ok());
    }

    #[tokio::test]
    async fn hook_runs_and_sees_the_context() {
        let seen = Rc::new(Cell::new(false));
        let seen2 = seen.clone();
        let h = hook(move |ctx: Rc<PageContext>| {
            let seen = seen2.clone();
            async move {
                assert_eq!(ctx.url, "/");
                seen.set(true);
                Ok(())
            }
        });
        execute_hook(Some(&h), "onPageTransitionStart", ctx())
            .await
            .unwrap();
        assert!(seen.get());
    }

    #[tokio::test]
    async fn hook_failure_is_attributed() {
        let h = hook(|_| async { Err(RouterError::Resolution("kaput".into())) });
        let err = execute_hook(Some(&h), "onPageTransitionEnd", ctx())
            .await
            .unwrap_err();
        match err {
            RouterError::Hook { hook, message } => {
                assert_eq!(hook, "onPageTransitionEnd");
                assert!(message.contains("kaput"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
