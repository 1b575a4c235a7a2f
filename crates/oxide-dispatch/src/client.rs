//! Browser-side router: one current controller, location and layout glue.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::controller::{DispatchContext, RouteController};
use crate::error::{DispatchError, Result};
use crate::options::keys;
use crate::route::{PathOptions, Route, Where};
use crate::router::Router;

/// Template rendered when nothing handles a URL.
pub const DEFAULT_NOT_FOUND_TEMPLATE: &str = "__NotFound__";

/// Extra parts appended to a navigation target.
pub type GoOptions = PathOptions;

/// A snapshot of the browser location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationState {
    /// The full URL.
    pub href: String,
    /// Everything before the fragment.
    pub path: String,
    /// Fragment without the leading `#`.
    pub hash: Option<String>,
}

impl LocationState {
    /// Splits `href` at the fragment.
    pub fn new(href: impl Into<String>) -> Self {
        let href = href.into();
        let (path, hash) = match href.split_once('#') {
            Some((path, hash)) => (path.to_string(), Some(hash.to_string())),
            None => (href.clone(), None),
        };
        Self { href, path, hash }
    }

    fn only_hash_changed(&self, next: &Self) -> bool {
        self.path == next.path && self.hash != next.hash
    }
}

/// The browser location and history.
pub trait Location: Send + Sync {
    /// Returns the current location.
    fn current(&self) -> LocationState;

    /// Pushes a new history entry.
    fn go(&self, path: &str);

    /// Performs a full page load of `url`.
    fn redirect(&self, url: &str);

    /// Reverts the last location change.
    fn cancel_url_change(&self);

    /// Scrolls to the element named by the fragment.
    fn scroll_to_hash(&self, _hash: &str) {}
}

/// Where the layout is inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertOptions {
    /// Selector of the parent element.
    pub el: String,
}

impl Default for InsertOptions {
    fn default() -> Self {
        Self {
            el: "body".to_string(),
        }
    }
}

/// A view of the layout that the host can place anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutView {
    /// Layout template, if one is configured.
    pub template: Option<String>,
}

/// The rendering surface the client router draws into.
pub trait Layout: Send + Sync {
    /// Sets the layout template.
    fn set_template(&self, template: Option<&str>);

    /// Inserts the layout into the page.
    fn insert(&self, options: &InsertOptions);

    /// Creates a detached view of the layout.
    fn create_view(&self) -> LayoutView;

    /// Renders `template` into the main region.
    fn render(&self, template: &str, data: Option<&Value>);
}

/// Why observers are being notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// A new controller was installed.
    Replaced,
    /// The current controller was reconfigured for a new URL.
    Reconfigured,
}

/// How a client dispatch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientOutcome {
    /// A step or hook handled the URL; queued renders were flushed.
    Handled,
    /// Only the server handles the URL; a full page load was requested.
    RedirectedToServer {
        /// Target of the page load.
        url: String,
    },
    /// Nothing handles the URL; the not-found template was rendered.
    NotFound {
        /// The template rendered.
        template: String,
    },
    /// Only the fragment changed; the current controller was kept.
    HashChanged,
}

type Observer = Box<dyn Fn(Change, &RouteController) + Send + Sync>;

/// Handle returned by [`ClientRouter::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Client-side router.
///
/// Owns the single current controller. A dispatch to the route that is
/// already current reconfigures the controller in place; any other dispatch
/// stops it and installs a new one.
pub struct ClientRouter {
    router: Arc<Router>,
    location: Arc<dyn Location>,
    layout: Arc<dyn Layout>,
    current: Option<RouteController>,
    current_route: Option<Arc<Route>>,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: u64,
    previous_location: Option<LocationState>,
    started: bool,
}

impl ClientRouter {
    /// Creates a client router drawing into `layout`.
    pub fn new(router: Arc<Router>, location: Arc<dyn Location>, layout: Arc<dyn Layout>) -> Self {
        layout.set_template(router.options().str(keys::LAYOUT_TEMPLATE));
        Self {
            router,
            location,
            layout,
            current: None,
            current_route: None,
            observers: Vec::new(),
            next_subscription: 0,
            previous_location: None,
            started: false,
        }
    }

    /// Returns the shared router core.
    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Returns the current controller.
    pub fn current(&self) -> Option<&RouteController> {
        self.current.as_ref()
    }

    /// Returns the current controller for mutation.
    pub fn current_mut(&mut self) -> Option<&mut RouteController> {
        self.current.as_mut()
    }

    /// Returns true between [`start`](Self::start) and [`stop`](Self::stop).
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Registers an observer notified after every dispatch.
    pub fn subscribe<F>(&mut self, f: F) -> SubscriptionId
    where
        F: Fn(Change, &RouteController) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, Box::new(f)));
        id
    }

    /// Removes an observer. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sid, _)| *sid != id);
        self.observers.len() != before
    }

    /// Inserts the layout into the page.
    pub fn insert(&self, options: &InsertOptions) -> &Self {
        self.layout.insert(options);
        self
    }

    /// Creates a view of the layout.
    pub fn create_view(&self) -> LayoutView {
        self.layout.create_view()
    }

    /// Stops the superseded controller, then makes `controller` current.
    ///
    /// A failing stop hook of the old controller is logged; it never keeps
    /// the new one from being installed.
    fn install(&mut self, controller: RouteController) {
        if let Some(mut previous) = self.current.take() {
            debug!(url = %previous.url(), "stopping superseded controller");
            if let Err(err) = previous.stop() {
                warn!(url = %previous.url(), error = %err, "failed to stop superseded controller");
            }
        }
        self.current = Some(controller);
    }

    fn notify(&self, change: Change) {
        if let Some(controller) = &self.current {
            for (_, observer) in &self.observers {
                observer(change, controller);
            }
        }
    }

    /// Dispatches `url` to the matching route.
    pub async fn dispatch(
        &mut self,
        url: &str,
        context: Option<DispatchContext>,
    ) -> Result<ClientOutcome> {
        if url.is_empty() {
            return Err(DispatchError::InvalidArgument(
                "expected url string in router dispatch".to_string(),
            ));
        }

        let route = self.router.find_first_route(url);
        let same_route = match (&route, &self.current_route) {
            (Some(next), Some(prev)) => Arc::ptr_eq(next, prev),
            _ => false,
        };
        self.current_route = route.clone();

        let change = match self.current.as_mut() {
            Some(controller) if same_route => {
                debug!(%url, "reusing controller");
                controller.configure_from_url(url, context)?;
                Change::Reconfigured
            }
            _ => {
                let controller =
                    self.router
                        .create_controller_for(route, url, Where::Client, context)?;
                self.install(controller);
                Change::Replaced
            }
        };
        self.notify(change);

        let Some(controller) = self.current.as_mut() else {
            return Err(DispatchError::InvalidArgument(
                "no controller installed".to_string(),
            ));
        };
        let router = Arc::clone(&self.router);
        controller.run_configured(router.stack()).await?;

        if controller.is_handled() {
            for render in controller.take_renders() {
                self.layout.render(&render.template, render.data.as_ref());
            }
            return Ok(ClientOutcome::Handled);
        }

        if controller.will_be_handled_on_server() {
            let url = controller.url().to_string();
            info!(%url, "handing off to the server");
            self.location.redirect(&url);
            return Ok(ClientOutcome::RedirectedToServer { url });
        }

        let data = json!({ "url": controller.url() });
        let template = controller
            .lookup_str(keys::NOT_FOUND_TEMPLATE)
            .unwrap_or(DEFAULT_NOT_FOUND_TEMPLATE)
            .to_string();
        warn!(%url, %template, "no route handles url");
        self.layout.render(&template, Some(&data));
        Ok(ClientOutcome::NotFound { template })
    }

    /// Reacts to the current browser location.
    ///
    /// A change of fragment alone keeps the current controller and scrolls;
    /// anything else dispatches, cancelling the URL change if the server
    /// takes over. Returns `None` while the router is stopped.
    pub async fn on_location_change(&mut self) -> Result<Option<ClientOutcome>> {
        if !self.started {
            debug!("router stopped, ignoring location change");
            return Ok(None);
        }
        let location = self.location.current();
        let hash_only = self
            .previous_location
            .as_ref()
            .is_some_and(|prev| prev.only_hash_changed(&location));

        let outcome = if hash_only && self.current.is_some() {
            if let Some(hash) = &location.hash {
                self.location.scroll_to_hash(hash);
            }
            if let Some(controller) = self.current.as_mut() {
                controller.configure_from_url(&location.href, None)?;
            }
            self.notify(Change::Reconfigured);
            ClientOutcome::HashChanged
        } else {
            let outcome = self.dispatch(&location.href, None).await?;
            if self
                .current
                .as_ref()
                .is_some_and(RouteController::will_be_handled_on_server)
            {
                self.location.cancel_url_change();
            }
            outcome
        };

        self.previous_location = Some(location);
        Ok(Some(outcome))
    }

    /// Starts reacting to location changes and processes the current one.
    ///
    /// The layout is inserted into the page first unless `autoRender` is
    /// false. Calling this twice is a no-op.
    pub async fn start(&mut self) -> Result<Option<ClientOutcome>> {
        if self.started {
            return Ok(None);
        }
        self.started = true;
        if self.router.options().bool(keys::AUTO_RENDER) != Some(false) {
            self.layout.insert(&InsertOptions::default());
        }
        self.on_location_change().await
    }

    /// Stops reacting to location changes and stops the current controller.
    pub fn stop(&mut self) -> Result<()> {
        if !self.started {
            return Ok(());
        }
        self.started = false;
        self.previous_location = None;
        match self.current.as_mut() {
            Some(controller) => controller.stop(),
            None => Ok(()),
        }
    }

    /// Navigates to a path or a named route.
    ///
    /// Returns the path handed to the location.
    pub fn go(
        &self,
        target: &str,
        params: &HashMap<String, String>,
        options: &GoOptions,
    ) -> Result<String> {
        let path = self.router.resolve_target(target, params, options)?;
        debug!(%target, %path, "go");
        self.location.go(&path);
        Ok(path)
    }
}

impl std::fmt::Debug for ClientRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRouter")
            .field("current", &self.current)
            .field("observers", &self.observers.len())
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory [`Location`] keeping a history stack.
#[derive(Debug)]
pub struct MemoryLocation {
    history: Mutex<Vec<String>>,
    redirects: Mutex<Vec<String>>,
    scrolled: Mutex<Vec<String>>,
}

impl MemoryLocation {
    /// Starts at `href`.
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            history: Mutex::new(vec![href.into()]),
            redirects: Mutex::new(Vec::new()),
            scrolled: Mutex::new(Vec::new()),
        }
    }

    /// Returns every entry pushed so far, oldest first.
    pub fn history(&self) -> Vec<String> {
        lock(&self.history).clone()
    }

    /// Returns the full page loads requested.
    pub fn redirects(&self) -> Vec<String> {
        lock(&self.redirects).clone()
    }

    /// Returns the fragments scrolled to.
    pub fn scrolled(&self) -> Vec<String> {
        lock(&self.scrolled).clone()
    }
}

impl Location for MemoryLocation {
    fn current(&self) -> LocationState {
        LocationState::new(lock(&self.history).last().cloned().unwrap_or_else(|| "/".to_string()))
    }

    fn go(&self, path: &str) {
        lock(&self.history).push(path.to_string());
    }

    fn redirect(&self, url: &str) {
        lock(&self.redirects).push(url.to_string());
    }

    fn cancel_url_change(&self) {
        let mut history = lock(&self.history);
        if history.len() > 1 {
            history.pop();
        }
    }

    fn scroll_to_hash(&self, hash: &str) {
        lock(&self.scrolled).push(hash.to_string());
    }
}

/// A [`Layout`] that records what it was asked to draw.
#[derive(Debug, Default)]
pub struct RecordingLayout {
    template: Mutex<Option<String>>,
    inserted: Mutex<Vec<InsertOptions>>,
    renders: Mutex<Vec<(String, Option<Value>)>>,
}

impl RecordingLayout {
    /// Creates an empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the renders so far, oldest first.
    pub fn renders(&self) -> Vec<(String, Option<Value>)> {
        lock(&self.renders).clone()
    }

    /// Returns the last rendered template.
    pub fn last_template(&self) -> Option<String> {
        lock(&self.renders).last().map(|(t, _)| t.clone())
    }

    /// Returns true once inserted into the page.
    pub fn is_inserted(&self) -> bool {
        !lock(&self.inserted).is_empty()
    }
}

impl Layout for RecordingLayout {
    fn set_template(&self, template: Option<&str>) {
        *lock(&self.template) = template.map(str::to_string);
    }

    fn insert(&self, options: &InsertOptions) {
        lock(&self.inserted).push(options.clone());
    }

    fn create_view(&self) -> LayoutView {
        LayoutView {
            template: lock(&self.template).clone(),
        }
    }

    fn render(&self, template: &str, data: Option<&Value>) {
        lock(&self.renders).push((template.to_string(), data.cloned()));
    }
}
