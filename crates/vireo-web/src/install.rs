//! Router installation: construct the browser-backed router and wire every
//! DOM event source into it.

use std::rc::Rc;

use futures::FutureExt;
use tracing::{error, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Event, Window};

use vireo_router::{HistoryDriver, PageContextBuilder, Router, RouterConfig};

use crate::error::InstallError;
use crate::history::BrowserHistory;
use crate::links::{add_link_prefetch_handlers, install_click_interception};
use crate::scroll::BrowserScroll;

/// Install the client router into the current browser window.
///
/// Wires click interception, `popstate`, throttled scroll saving, and
/// page-hide/-show handling, then kicks off the hydration render in the
/// background. Returns the router for programmatic navigation and prefetch.
pub fn install_client_router(
    builder: Rc<dyn PageContextBuilder>,
    config: RouterConfig,
) -> Result<Router, InstallError> {
    let window = web_sys::window().ok_or(InstallError::NoWindow)?;
    let document = window.document().ok_or(InstallError::NoDocument)?;

    let history = Rc::new(BrowserHistory::new(&window)?);
    let scroll = Rc::new(BrowserScroll::new(window.clone()));
    // The assets of the currently served page are obviously loaded already.
    let current_url = history.current_url();
    let router = Router::new(config, builder, history, scroll);

    // The browser restores the pre-reload position for the first paint; the
    // router takes over from the first committed render.
    router.enable_native_restoration_for_first_paint();
    router.mark_prefetched(&current_url);

    // Each committed render re-scans the document for new links to prefetch.
    {
        let router_for_prefetch = router.clone();
        let document = document.clone();
        router.set_after_render(Rc::new(move |ctx| {
            let router = router_for_prefetch.clone();
            let document = document.clone();
            async move {
                add_link_prefetch_handlers(&router, &document, ctx.exports.prefetch_mode);
            }
            .boxed_local()
        }));
    }

    install_click_interception(&router, &window, &document);
    install_popstate(&router, &window);
    install_scroll_saving(&router, &window);
    install_page_visibility(&router, &window);

    let router_for_hydration = router.clone();
    spawn_local(async move {
        if let Err(err) = router_for_hydration.initial_render().await {
            error!(%err, "hydration render failed");
        }
    });

    Ok(router)
}

fn install_popstate(router: &Router, window: &Window) {
    let router = router.clone();
    let on_popstate = Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
        let router = router.clone();
        spawn_local(async move {
            if let Err(err) = router.on_popstate().await {
                warn!(%err, "history navigation failed");
            }
        });
    });
    if let Err(err) =
        window.add_event_listener_with_callback("popstate", on_popstate.as_ref().unchecked_ref())
    {
        warn!(?err, "popstate listener installation failed");
    }
    on_popstate.forget();
}

fn install_scroll_saving(router: &Router, window: &Window) {
    let router = router.clone();
    let on_scroll = Closure::<dyn FnMut()>::new(move || {
        router.save_scroll_position_throttled();
    });
    if let Err(err) =
        window.add_event_listener_with_callback("scroll", on_scroll.as_ref().unchecked_ref())
    {
        warn!(?err, "scroll listener installation failed");
    }
    on_scroll.forget();
}

/// Page-hide saves the position unthrottled and hands scroll restoration back
/// to the browser so a BFCache restore lands right; page-show reclaims it.
fn install_page_visibility(router: &Router, window: &Window) {
    {
        let router = router.clone();
        let on_hide = Closure::<dyn FnMut()>::new(move || {
            router.on_page_hide();
        });
        if let Err(err) =
            window.add_event_listener_with_callback("pagehide", on_hide.as_ref().unchecked_ref())
        {
            warn!(?err, "pagehide listener installation failed");
        }
        on_hide.forget();
    }
    {
        let router = router.clone();
        let on_show = Closure::<dyn FnMut()>::new(move || {
            router.on_page_show();
        });
        if let Err(err) =
            window.add_event_listener_with_callback("pageshow", on_show.as_ref().unchecked_ref())
        {
            warn!(?err, "pageshow listener installation failed");
        }
        on_show.forget();
    }
}
