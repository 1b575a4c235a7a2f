//! Route table, middleware stack and controller construction.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::class::ControllerClass;
use crate::controller::{DispatchContext, RouteController};
use crate::error::{DispatchError, Result};
use crate::hooks::{HookFilter, HookRegistry};
use crate::middleware::{FnMiddleware, Middleware, MiddlewareStack, Step, StepResult};
use crate::options::{keys, HookRef, Options};
use crate::route::{PathOptions, Route, Where};

/// The router core shared by the client and server routers.
///
/// Built once at startup and then frozen behind an `Arc`: the route table,
/// middleware stack, hooks and controller classes are read-only while
/// dispatching.
pub struct Router {
    /// Registered routes, in registration order.
    routes: Vec<Arc<Route>>,
    /// Named routes for reverse URL lookup.
    named_routes: HashMap<String, Arc<Route>>,
    stack: MiddlewareStack,
    hooks: HookRegistry,
    classes: HashMap<String, Arc<ControllerClass>>,
    base_class: Arc<ControllerClass>,
    options: Options,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Creates a new empty router.
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            named_routes: HashMap::new(),
            stack: MiddlewareStack::new(),
            hooks: HookRegistry::new(),
            classes: HashMap::new(),
            base_class: ControllerClass::base(),
            options: Options::new(),
        }
    }

    /// Sets the router-wide options.
    #[must_use]
    pub fn configure(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Adds a route and the step that handles it.
    ///
    /// The step runs in the route's environment and only for URLs the route
    /// matches.
    pub fn route(mut self, route: Route, handler: impl Middleware + 'static) -> Result<Self> {
        self.add_route(route, handler)?;
        Ok(self)
    }

    /// Adds a route handled by a synchronous closure.
    pub fn route_fn<F>(self, route: Route, f: F) -> Result<Self>
    where
        F: Fn(&mut RouteController) -> StepResult + Send + Sync + 'static,
    {
        self.route(route, FnMiddleware::new(f))
    }

    /// Adds a route in place and returns the shared handle.
    pub fn add_route(&mut self, route: Route, handler: impl Middleware + 'static) -> Result<Arc<Route>> {
        if let Some(name) = route.get_name() {
            if self.named_routes.contains_key(name) {
                return Err(DispatchError::DuplicateRoute(name.to_string()));
            }
        }

        let route = Arc::new(route);
        let step_name = route
            .get_name()
            .unwrap_or_else(|| route.pattern().pattern())
            .to_string();
        self.stack.push(
            Step::new(step_name, route.get_where(), handler).for_route(Arc::clone(&route)),
        );
        if let Some(name) = route.get_name() {
            self.named_routes.insert(name.to_string(), Arc::clone(&route));
        }
        self.routes.push(Arc::clone(&route));
        Ok(route)
    }

    /// Adds middleware that runs for every URL in both environments.
    #[must_use]
    pub fn middleware(self, mw: impl Middleware + 'static) -> Self {
        self.middleware_in("middleware", Where::Both, mw)
    }

    /// Adds named middleware for one environment.
    #[must_use]
    pub fn middleware_in(
        mut self,
        name: impl Into<String>,
        where_: Where,
        mw: impl Middleware + 'static,
    ) -> Self {
        self.stack.push(Step::new(name, where_, mw));
        self
    }

    /// Adds a router-wide hook under `hook_name`.
    #[must_use]
    pub fn hook(mut self, hook_name: impl Into<String>, hook: HookRef, filter: HookFilter) -> Self {
        self.hooks.add(hook_name, hook, filter);
        self
    }

    /// Registers a hook that options can refer to by name.
    #[must_use]
    pub fn register_hook<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut RouteController) + Send + Sync + 'static,
    {
        self.hooks.register(name, f);
        self
    }

    /// Declares a controller class, optionally extending a declared parent.
    pub fn controller_class(
        mut self,
        name: impl Into<String>,
        parent: Option<&str>,
        statics: Options,
    ) -> Result<Self> {
        let parent = match parent {
            Some(parent) => self.classes.get(parent).cloned().ok_or_else(|| {
                DispatchError::InvalidArgument(format!("unknown parent controller {parent:?}"))
            })?,
            None => Arc::clone(&self.base_class),
        };
        let name = name.into();
        let class = ControllerClass::extend(&parent, name.clone(), statics);
        self.classes.insert(name, class);
        Ok(self)
    }

    /// Returns the router-wide options.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Returns the middleware stack.
    pub fn stack(&self) -> &MiddlewareStack {
        &self.stack
    }

    /// Returns the hook registry.
    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// Returns the routes in registration order.
    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    /// Returns a route by name.
    pub fn get_route(&self, name: &str) -> Option<&Arc<Route>> {
        self.named_routes.get(name)
    }

    /// Returns the first route, in registration order, matching `url`.
    pub fn find_first_route(&self, url: &str) -> Option<Arc<Route>> {
        self.routes.iter().find(|r| r.matches(url)).cloned()
    }

    /// Picks the controller class for a route.
    ///
    /// An explicit `controller` option wins; otherwise a class named after
    /// the route (`itemsShow` → `ItemsShowController`) is used if declared;
    /// otherwise the base class.
    pub fn controller_class_for(&self, route: Option<&Route>) -> Arc<ControllerClass> {
        let Some(route) = route else {
            return Arc::clone(&self.base_class);
        };
        let explicit = route.get_options().str(keys::CONTROLLER);
        let conventional = route.get_name().map(conventional_class_name);
        explicit
            .and_then(|name| self.classes.get(name))
            .or_else(|| conventional.and_then(|name| self.classes.get(&name)))
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.base_class))
    }

    /// Creates a controller for `url`, bound to the first matching route.
    pub fn create_controller(
        self: &Arc<Self>,
        url: &str,
        env: Where,
        context: Option<DispatchContext>,
    ) -> Result<RouteController> {
        let route = self.find_first_route(url);
        self.create_controller_for(route, url, env, context)
    }

    /// Creates a controller for an already resolved route.
    pub fn create_controller_for(
        self: &Arc<Self>,
        route: Option<Arc<Route>>,
        url: &str,
        env: Where,
        mut context: Option<DispatchContext>,
    ) -> Result<RouteController> {
        let class = self.controller_class_for(route.as_deref());
        debug!(
            %url,
            route = route.as_ref().and_then(|r| r.get_name()).unwrap_or("-"),
            class = class.name(),
            "creating controller"
        );
        let current_options = context.as_ref().and_then(|c| c.current_options.clone());
        let own_options = context
            .as_mut()
            .and_then(|c| c.controller_options.take())
            .unwrap_or_default();
        let mut controller = RouteController::new(
            Arc::clone(self),
            route,
            class,
            env,
            own_options,
            current_options,
        );
        controller.configure_from_url(url, context)?;
        Ok(controller)
    }

    /// Generates the path of a named route.
    pub fn path_for(
        &self,
        name: &str,
        params: &HashMap<String, String>,
        options: &PathOptions,
    ) -> Result<String> {
        let route = self
            .get_route(name)
            .ok_or_else(|| DispatchError::RouteNotFound(name.to_string()))?;
        route.path(params, options)
    }

    /// Resolves a navigation target to a path.
    ///
    /// Absolute paths and full URLs are used as given, with `options`
    /// appended; anything else is a route name.
    pub fn resolve_target(
        &self,
        target: &str,
        params: &HashMap<String, String>,
        options: &PathOptions,
    ) -> Result<String> {
        if target.is_empty() {
            return Err(DispatchError::InvalidArgument(
                "navigation target must not be empty".to_string(),
            ));
        }
        if is_path(target) {
            Ok(options.apply(target.to_string()))
        } else {
            self.path_for(target, params, options)
        }
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes.len())
            .field("stack", &self.stack)
            .field("classes", &self.classes.keys().collect::<Vec<_>>())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn is_path(target: &str) -> bool {
    target.starts_with('/') || target.starts_with("http://") || target.starts_with("https://")
}

/// `items.show` / `items-show` / `itemsShow` → `ItemsShowController`.
fn conventional_class_name(route_name: &str) -> String {
    let mut name: String = route_name
        .split(['.', '-', '_'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect();
    name.push_str("Controller");
    name
}
