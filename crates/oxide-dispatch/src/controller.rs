//! Per-route controller: option lookup, hooks, handled state, cleanup.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace};

use crate::class::ControllerClass;
use crate::error::{DispatchError, Result};
use crate::hooks;
use crate::middleware::MiddlewareStack;
use crate::options::{keys, DataFn, Hook, HookRef, OptionValue, Options};
use crate::params::Params;
use crate::request::{Method, Request};
use crate::response::Response;
use crate::route::{Route, Where};
use crate::router::Router;

/// Transport objects and overrides handed to a dispatch.
///
/// Every field is optional; missing ones fall back to the dispatched URL or
/// to empty transport objects.
#[derive(Debug, Clone, Default)]
pub struct DispatchContext {
    /// The host request (server side).
    pub request: Option<Request>,
    /// The host response (server side).
    pub response: Option<Response>,
    /// URL override.
    pub url: Option<String>,
    /// URL as first seen by the host.
    pub original_url: Option<String>,
    /// Innermost ambient option scope, see [`CurrentOptions`](crate::CurrentOptions).
    pub current_options: Option<Arc<Options>>,
    /// Own options of a newly created controller; they shadow every other
    /// lookup level. Ignored when an existing controller is reconfigured.
    pub controller_options: Option<Options>,
}

impl DispatchContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the request.
    #[must_use]
    pub fn request(mut self, request: Request) -> Self {
        self.request = Some(request);
        self
    }

    /// Sets the response.
    #[must_use]
    pub fn response(mut self, response: Response) -> Self {
        self.response = Some(response);
        self
    }

    /// Sets the original URL.
    #[must_use]
    pub fn original_url(mut self, url: impl Into<String>) -> Self {
        self.original_url = Some(url.into());
        self
    }

    /// Sets the ambient option scope.
    #[must_use]
    pub fn current_options(mut self, options: Option<Arc<Options>>) -> Self {
        self.current_options = options;
        self
    }

    /// Sets the options of the controller created for this dispatch.
    #[must_use]
    pub fn controller_options(mut self, options: Options) -> Self {
        self.controller_options = Some(options);
        self
    }
}

/// A template render queued by a client-side controller.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    /// Template name.
    pub template: String,
    /// Data context for the template.
    pub data: Option<Value>,
}

type StopCallback = Box<dyn FnOnce() + Send>;

/// Execution state for one matched route.
pub struct RouteController {
    router: Arc<Router>,
    route: Option<Arc<Route>>,
    class: Arc<ControllerClass>,
    env: Where,
    options: Options,
    /// Values assigned on this instance; they shadow class statics.
    fields: Options,
    params: Params,
    params_version: u64,
    url: String,
    original_url: String,
    method: Option<Method>,
    request: Request,
    response: Response,
    current_options: Option<Arc<Options>>,
    handled: bool,
    data: DataFn,
    stop_callbacks: Vec<StopCallback>,
    renders: Vec<RenderRequest>,
    reactive: bool,
    dispatches: u64,
    stopped: bool,
}

impl RouteController {
    /// Builds a controller. Use [`Router::create_controller`] to get one bound
    /// to the route matching a URL.
    pub fn new(
        router: Arc<Router>,
        route: Option<Arc<Route>>,
        class: Arc<ControllerClass>,
        env: Where,
        options: Options,
        current_options: Option<Arc<Options>>,
    ) -> Self {
        let mut controller = Self {
            router,
            route,
            class,
            env,
            options,
            fields: Options::new(),
            params: Params::new(),
            params_version: 0,
            url: String::new(),
            original_url: String::new(),
            method: None,
            request: Request::default(),
            response: Response::default(),
            current_options,
            handled: false,
            data: Arc::new(|_| Value::Null),
            stop_callbacks: Vec::new(),
            renders: Vec::new(),
            reactive: false,
            dispatches: 0,
            stopped: false,
        };
        controller.data = controller.resolve_data();
        controller.init();
        controller
    }

    fn resolve_data(&self) -> DataFn {
        match self.lookup_option(keys::DATA) {
            Some(OptionValue::Data(f)) => Arc::clone(f),
            Some(OptionValue::Value(v)) => {
                let value = v.clone();
                Arc::new(move |_| value.clone())
            }
            Some(OptionValue::Hooks(_)) | None => Arc::new(|_| Value::Null),
        }
    }

    /// Environment-specific setup.
    fn init(&mut self) {
        match self.env {
            Where::Client | Where::Both => self.reactive = true,
            Where::Server => {}
        }
    }

    /// Looks up an option following the precedence chain:
    ///
    /// 1. this controller's own options
    /// 2. instance fields, then the class hierarchy (most specific first)
    /// 3. the ambient current options of the dispatch
    /// 4. the route's options
    /// 5. the router's options
    pub fn lookup_option(&self, key: &str) -> Option<&OptionValue> {
        if let Some(value) = self.options.get(key) {
            return Some(value);
        }
        if let Some(value) = self.fields.get(key).or_else(|| self.class.lookup(key)) {
            return Some(value);
        }
        if let Some(value) = self.current_options.as_ref().and_then(|o| o.get(key)) {
            return Some(value);
        }
        if let Some(value) = self.route.as_ref().and_then(|r| r.get_options().get(key)) {
            return Some(value);
        }
        self.router.options().get(key)
    }

    /// Looks up a string option.
    pub fn lookup_str(&self, key: &str) -> Option<&str> {
        self.lookup_option(key)
            .and_then(OptionValue::as_value)
            .and_then(Value::as_str)
    }

    /// Looks up a boolean option.
    pub fn lookup_bool(&self, key: &str) -> Option<bool> {
        self.lookup_option(key)
            .and_then(OptionValue::as_value)
            .and_then(Value::as_bool)
    }

    /// Invokes the data function resolved at construction.
    pub fn data(&self) -> Value {
        (self.data)(self)
    }

    /// Points this controller at `url`, taking transport objects from `context`.
    ///
    /// Safe to call repeatedly; the parameters always reflect the last call.
    pub fn configure_from_url(&mut self, url: &str, context: Option<DispatchContext>) -> Result<()> {
        if url.is_empty() {
            return Err(DispatchError::InvalidArgument(
                "url must be a non-empty string".to_string(),
            ));
        }

        let context = context.unwrap_or_default();
        self.method = context.request.as_ref().map(|r| r.method);
        self.request = context.request.unwrap_or_default();
        self.response = context.response.unwrap_or_default();
        self.url = context.url.unwrap_or_else(|| url.to_string());
        self.original_url = context.original_url.unwrap_or_else(|| url.to_string());
        self.current_options = context.current_options;

        if let Some(route) = self.route.clone() {
            let params = route.params(url)?;
            self.set_params(params);
        }
        Ok(())
    }

    /// Keeps the transport objects of the previous configuration.
    fn carried_context(&mut self) -> DispatchContext {
        DispatchContext {
            request: self.method.map(|_| std::mem::take(&mut self.request)),
            response: Some(std::mem::take(&mut self.response)),
            url: None,
            original_url: Some(self.original_url.clone()),
            current_options: self.current_options.clone(),
            controller_options: None,
        }
    }

    /// Gathers the hooks registered under any of `names`.
    ///
    /// Sources are visited in this order, each one alias by alias:
    /// router-wide hooks (filtered by route name), route options, the class
    /// hierarchy base first, and finally this instance's own fields.
    pub fn collect_hooks(&self, names: &[&str]) -> Result<Vec<Hook>> {
        let registry = self.router.hooks();
        let route_name = self.route.as_ref().and_then(|r| r.get_name());

        let mut refs: Vec<HookRef> = Vec::new();
        for name in names {
            refs.extend(registry.get_hooks(name, route_name));
        }
        if let Some(route) = &self.route {
            for name in names {
                refs.extend(route.get_options().hooks(name));
            }
        }
        for name in names {
            refs.extend(self.class.hooks(name));
        }
        for name in names {
            refs.extend(self.fields.hooks(name));
        }

        refs.iter().map(|h| registry.lookup(h)).collect()
    }

    /// Runs every hook registered under `names` and returns how many ran.
    pub fn run_hooks(&mut self, names: &[&str]) -> Result<usize> {
        let hooks = self.collect_hooks(names)?;
        for hook in &hooks {
            hook(self);
        }
        if !hooks.is_empty() {
            trace!(hook = names.first().copied().unwrap_or_default(), count = hooks.len(), "ran hooks");
        }
        Ok(hooks.len())
    }

    /// Configures for `url`, then runs hooks and the middleware stack.
    ///
    /// Without a context the transport objects of the last configuration are
    /// kept. After hooks run even when the stack handled the request, but
    /// not when a step failed.
    pub async fn dispatch(
        &mut self,
        stack: &MiddlewareStack,
        url: &str,
        context: Option<DispatchContext>,
    ) -> Result<()> {
        let context = match context {
            Some(context) => context,
            None => self.carried_context(),
        };
        self.configure_from_url(url, Some(context))?;
        self.run_configured(stack).await
    }

    /// Runs hooks and the middleware stack for the URL this controller was
    /// last configured for.
    pub async fn run_configured(&mut self, stack: &MiddlewareStack) -> Result<()> {
        self.stopped = false;
        self.handled = false;
        self.renders.clear();

        let first = self.dispatches == 0;
        self.dispatches += 1;
        self.run_hooks(if first { hooks::RUN } else { hooks::RERUN })?;
        self.run_hooks(hooks::BEFORE)?;

        if self.handled {
            debug!(url = %self.url, "before hook handled the request, skipping stack");
        } else {
            let url = self.url.clone();
            let env = self.env;
            stack.run(&url, env, self).await?;
        }

        self.run_hooks(hooks::AFTER)?;
        Ok(())
    }

    /// Runs stop hooks and every registered stop callback, once.
    pub fn stop(&mut self) -> Result<()> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;
        let hooks = self.run_hooks(hooks::STOP);
        let callbacks = std::mem::take(&mut self.stop_callbacks);
        debug!(url = %self.url, callbacks = callbacks.len(), "stopping controller");
        for callback in callbacks {
            callback();
        }
        hooks.map(|_| ())
    }

    /// Registers a cleanup callback run when the controller stops.
    pub fn on_stop(&mut self, callback: impl FnOnce() + Send + 'static) {
        self.stop_callbacks.push(Box::new(callback));
    }

    /// Returns true once a step or hook handled this dispatch.
    pub fn is_handled(&self) -> bool {
        self.handled
    }

    /// Marks the dispatch as handled (or not).
    pub fn set_handled(&mut self, handled: bool) {
        self.handled = handled;
    }

    /// Returns true if a server-side route step claims this URL.
    pub fn will_be_handled_on_server(&self) -> bool {
        self.router.stack().will_handle(&self.url, Where::Server)
    }

    /// Returns true if a client-side route step claims this URL.
    pub fn will_be_handled_on_client(&self) -> bool {
        self.router.stack().will_handle(&self.url, Where::Client)
    }

    /// Queues a template render and marks the dispatch handled.
    pub fn render(&mut self, template: impl Into<String>, data: Option<Value>) {
        self.renders.push(RenderRequest {
            template: template.into(),
            data,
        });
        self.handled = true;
    }

    /// Takes the queued renders.
    pub fn take_renders(&mut self) -> Vec<RenderRequest> {
        std::mem::take(&mut self.renders)
    }

    /// Writes a complete HTML response and marks the dispatch handled.
    pub fn respond(&mut self, status: u16, body: impl Into<String>) {
        let body = body.into();
        self.response
            .set_status(status)
            .set_header("Content-Type", "text/html; charset=utf-8");
        if self.method == Some(Method::Head) {
            self.response.end(b"");
        } else {
            self.response.end(body);
        }
        self.handled = true;
    }

    /// Returns the parameters for the current URL.
    pub fn get_params(&self) -> &Params {
        &self.params
    }

    /// Replaces the parameters wholesale.
    pub fn set_params(&mut self, params: Params) -> &mut Self {
        self.params = params;
        if self.reactive {
            self.params_version += 1;
        }
        self
    }

    /// Bumped on every parameter change of a client controller, so observers
    /// can tell whether they need to re-read [`get_params`](Self::get_params).
    pub fn params_version(&self) -> u64 {
        self.params_version
    }

    /// Assigns an instance field.
    pub fn set_field(&mut self, key: impl Into<String>, value: OptionValue) {
        self.fields.insert(key, value);
    }

    /// Adds an instance hook; it runs after every other source.
    pub fn add_hook<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&mut RouteController) + Send + Sync + 'static,
    {
        self.fields.push_hook(name, HookRef::func(f));
    }

    /// Returns the matched route.
    pub fn route(&self) -> Option<&Arc<Route>> {
        self.route.as_ref()
    }

    /// Returns the router this controller belongs to.
    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Returns the controller class.
    pub fn class(&self) -> &ControllerClass {
        &self.class
    }

    /// Returns the environment this controller dispatches in.
    pub fn environment(&self) -> Where {
        self.env
    }

    /// Returns this controller's own options.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Returns the current URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the URL as first seen.
    pub fn original_url(&self) -> &str {
        &self.original_url
    }

    /// Returns the request method, when dispatched with a request.
    pub fn method(&self) -> Option<Method> {
        self.method
    }

    /// Returns the host request.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Returns the host response.
    pub fn response(&self) -> &Response {
        &self.response
    }

    /// Returns the host response for writing.
    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// Takes the host response out of the controller.
    pub fn take_response(&mut self) -> Response {
        std::mem::take(&mut self.response)
    }

    /// Returns true once stopped and not dispatched again since.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

impl fmt::Debug for RouteController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteController")
            .field("class", &self.class.name())
            .field("route", &self.route.as_ref().and_then(|r| r.get_name()))
            .field("env", &self.env)
            .field("url", &self.url)
            .field("params", &self.params)
            .field("handled", &self.handled)
            .field("stopped", &self.stopped)
            .finish_non_exhaustive()
    }
}
