//! Middleware stack run by a controller during dispatch.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, info};

use crate::controller::RouteController;
use crate::error::MiddlewareError;
use crate::route::{Route, Where};

/// A boxed future for async middleware operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What the stack does after a step returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Continue to the next step.
    Next,
    /// End the chain; the controller counts as handled.
    Stop,
}

/// Result of a single middleware step.
pub type StepResult = std::result::Result<Flow, MiddlewareError>;

/// A step in the middleware stack.
///
/// Steps receive the controller by mutable reference and settle exactly once,
/// either with a [`Flow`] or with an error that aborts the chain.
///
/// # Example
///
/// ```ignore
/// struct Render;
///
/// impl Middleware for Render {
///     fn handle<'a>(&'a self, ctrl: &'a mut RouteController) -> BoxFuture<'a, StepResult> {
///         Box::pin(async move {
///             ctrl.render("ItemsShow", None);
///             Ok(Flow::Stop)
///         })
///     }
/// }
/// ```
pub trait Middleware: Send + Sync {
    /// Runs the step.
    fn handle<'a>(&'a self, ctrl: &'a mut RouteController) -> BoxFuture<'a, StepResult>;
}

/// Adapts a synchronous closure into a [`Middleware`].
pub struct FnMiddleware<F>(F);

impl<F> FnMiddleware<F>
where
    F: Fn(&mut RouteController) -> StepResult + Send + Sync,
{
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&mut RouteController) -> StepResult + Send + Sync,
{
    fn handle<'a>(&'a self, ctrl: &'a mut RouteController) -> BoxFuture<'a, StepResult> {
        futures::future::ready((self.0)(ctrl)).boxed()
    }
}

/// Middleware that logs each dispatch through `tracing`.
pub struct LoggingMiddleware;

impl Middleware for LoggingMiddleware {
    fn handle<'a>(&'a self, ctrl: &'a mut RouteController) -> BoxFuture<'a, StepResult> {
        Box::pin(async move {
            info!(
                method = ctrl.method().map_or("-", |m| m.as_str()),
                url = %ctrl.url(),
                route = ctrl.route().and_then(|r| r.get_name()).unwrap_or("-"),
                "dispatch"
            );
            Ok(Flow::Next)
        })
    }
}

/// A registered step.
#[derive(Clone)]
pub struct Step {
    name: String,
    where_: Where,
    route: Option<Arc<Route>>,
    handler: Arc<dyn Middleware>,
}

impl Step {
    /// Creates a step that runs for every URL.
    pub fn new(name: impl Into<String>, where_: Where, handler: impl Middleware + 'static) -> Self {
        Self {
            name: name.into(),
            where_,
            route: None,
            handler: Arc::new(handler),
        }
    }

    /// Binds the step to a route; it then only runs for matching URLs.
    #[must_use]
    pub fn for_route(mut self, route: Arc<Route>) -> Self {
        self.route = Some(route);
        self
    }

    /// Returns the step name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns where the step runs.
    pub fn get_where(&self) -> Where {
        self.where_
    }

    fn applies(&self, url: &str, env: Where) -> bool {
        self.where_.includes(env) && self.route.as_ref().is_none_or(|r| r.matches(url))
    }

    /// A route-bound step eligible for `env` claims the URL.
    fn claims(&self, url: &str, env: Where) -> bool {
        self.where_.includes(env) && self.route.as_ref().is_some_and(|r| r.matches(url))
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("where", &self.where_)
            .field("route", &self.route.as_ref().map(|r| r.pattern().pattern().to_string()))
            .finish_non_exhaustive()
    }
}

/// An ordered list of middleware steps.
#[derive(Debug, Clone, Default)]
pub struct MiddlewareStack {
    steps: Vec<Step>,
}

impl MiddlewareStack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a step.
    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    /// Returns the steps in order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true when no step is registered.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns true if some route-bound step for `env` matches `url`.
    ///
    /// Unbound steps (logging and the like) never claim a URL.
    pub fn will_handle(&self, url: &str, env: Where) -> bool {
        self.steps.iter().any(|s| s.claims(url, env))
    }

    /// Runs the steps eligible for `env` and `url` in order.
    ///
    /// Stops at the first step returning [`Flow::Stop`] (marking the
    /// controller handled) or failing.
    pub async fn run(
        &self,
        url: &str,
        env: Where,
        ctrl: &mut RouteController,
    ) -> std::result::Result<(), MiddlewareError> {
        for step in self.steps.iter().filter(|s| s.applies(url, env)) {
            debug!(step = %step.name, %url, "running middleware step");
            match step.handler.handle(ctrl).await? {
                Flow::Next => {}
                Flow::Stop => {
                    ctrl.set_handled(true);
                    break;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut RouteController) -> StepResult {
        Ok(Flow::Next)
    }

    #[test]
    fn test_will_handle_only_counts_route_steps() {
        let route = Arc::new(Route::new("/items/:_id").unwrap());
        let mut stack = MiddlewareStack::new();
        stack.push(Step::new("log", Where::Both, FnMiddleware::new(noop)));
        assert!(!stack.will_handle("/items/1", Where::Client));

        stack.push(Step::new("items", Where::Server, FnMiddleware::new(noop)).for_route(route));
        assert!(stack.will_handle("/items/1", Where::Server));
        assert!(!stack.will_handle("/items/1", Where::Client));
        assert!(!stack.will_handle("/other", Where::Server));
    }
}
