//! Server-side router and the host request pipeline it mounts on.

use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::controller::{DispatchContext, RouteController};
use crate::error::{DispatchError, MiddlewareError, Result};
use crate::middleware::BoxFuture;
use crate::request::{Method, Request};
use crate::response::Response;
use crate::route::Where;
use crate::router::Router;

/// Environment variable selecting the deployment mode.
pub const ENV_VAR: &str = "OXIDE_ENV";

const WELCOME_PAGE: &str = "<div style='font-family: helvetica; color: #777; max-width: 600px; margin: 20px auto;'>
  <h1 style='text-align: center; margin: 0; font-size: 48pt;'>oxide-dispatch</h1>
  <p style='text-align: center; font-size: 1.3em;'>No routes are defined yet.</p>
  <pre style='background: #f2f2f2; margin: 50px 0; padding: 10px;'>Router::new()
    .route_fn(Route::new(\"/\")?, |c| {
        c.render(\"Home\", None);
        Ok(Flow::Stop)
    })?</pre>
</div>";

const NO_CLIENT_ROUTES_PAGE: &str = "<p>It looks like you don't have any client routes defined, \
but you had at least one server handler. You probably want to define some client side routes!</p>\n";

/// Server deployment settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    /// Development mode puts error details into error responses.
    pub development: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self { development: true }
    }
}

impl ServerOptions {
    /// Reads `OXIDE_ENV`; anything other than `development` (the default)
    /// disables error details.
    pub fn from_env() -> Self {
        let mode = env::var(ENV_VAR).unwrap_or_else(|_| "development".to_string());
        Self::from_mode(&mode)
    }

    /// Builds options for a named mode.
    pub fn from_mode(mode: &str) -> Self {
        Self {
            development: mode.eq_ignore_ascii_case("development"),
        }
    }
}

/// The host's request and response for one dispatch.
#[derive(Debug, Clone, Default)]
pub struct ServerContext {
    /// Inbound request.
    pub request: Request,
    /// Response being written.
    pub response: Response,
}

impl ServerContext {
    /// Pairs a request with a fresh response.
    pub fn new(request: Request) -> Self {
        Self {
            request,
            response: Response::ok(),
        }
    }
}

impl From<ServerContext> for DispatchContext {
    fn from(ctx: ServerContext) -> Self {
        DispatchContext::new()
            .original_url(ctx.request.original_url.clone())
            .request(ctx.request)
            .response(ctx.response)
    }
}

/// How a server dispatch ended.
#[derive(Debug, Clone)]
pub enum ServerOutcome {
    /// The response is complete.
    Finished(Response),
    /// The router did not finish the response; the host should continue.
    Next(Response),
    /// The connection was terminated mid-response.
    ConnectionDestroyed(Response),
}

impl ServerOutcome {
    /// Returns the response carried by the outcome.
    pub fn response(&self) -> &Response {
        match self {
            Self::Finished(res) | Self::Next(res) | Self::ConnectionDestroyed(res) => res,
        }
    }

    /// Consumes the outcome, returning the response.
    pub fn into_response(self) -> Response {
        match self {
            Self::Finished(res) | Self::Next(res) | Self::ConnectionDestroyed(res) => res,
        }
    }
}

/// A request handler mounted on a [`Pipeline`].
pub trait PipelineHandler: Send + Sync {
    /// Handles a request, or hands the response on with [`ServerOutcome::Next`].
    fn handle<'a>(&'a self, request: Request, response: Response)
        -> BoxFuture<'a, Result<ServerOutcome>>;
}

/// Ordered request handlers, as a host HTTP server would run them.
#[derive(Default)]
pub struct Pipeline {
    handlers: Vec<(String, Arc<dyn PipelineHandler>)>,
}

impl Pipeline {
    /// Creates an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler.
    pub fn mount(&mut self, name: impl Into<String>, handler: Arc<dyn PipelineHandler>) {
        self.handlers.push((name.into(), handler));
    }

    /// Removes handlers registered under `name`. Returns false if none were.
    pub fn unmount(&mut self, name: &str) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(n, _)| n != name);
        self.handlers.len() != before
    }

    /// Number of mounted handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true when nothing is mounted.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Runs `request` through the handlers.
    ///
    /// Falls back to 404 when every handler passes, and to 500 when a
    /// handler fails.
    pub async fn run(&self, request: Request) -> Response {
        let mut response = Response::ok();
        for (name, handler) in &self.handlers {
            match handler.handle(request.clone(), response).await {
                Ok(ServerOutcome::Next(res)) => response = res,
                Ok(ServerOutcome::Finished(res) | ServerOutcome::ConnectionDestroyed(res)) => {
                    return res
                }
                Err(e) => {
                    error!(handler = %name, error = %e, "request handler failed");
                    return Response::html(500, "Internal Server Error");
                }
            }
        }
        if response.is_finished() {
            response
        } else {
            debug!(url = %request.original_url, "no handler finished the request");
            Response::not_found()
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.handlers.iter().map(|(name, _)| name))
            .finish()
    }
}

/// Name the router mounts itself under.
const PIPELINE_NAME: &str = "oxide-dispatch";

/// Server-side router.
///
/// Every request gets a fresh controller; the router core is shared and
/// never mutated, so one instance serves concurrent requests.
#[derive(Debug)]
pub struct ServerRouter {
    router: Arc<Router>,
    options: ServerOptions,
    started: AtomicBool,
}

impl ServerRouter {
    /// Creates a server router.
    pub fn new(router: Arc<Router>, options: ServerOptions) -> Self {
        Self {
            router,
            options,
            started: AtomicBool::new(false),
        }
    }

    /// Returns the shared router core.
    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Returns the deployment settings.
    pub fn options(&self) -> &ServerOptions {
        &self.options
    }

    /// Mounts the router on `pipeline`. Does nothing if already started.
    pub fn start(self: &Arc<Self>, pipeline: &mut Pipeline) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(routes = self.router.routes().len(), "mounting router");
        pipeline.mount(PIPELINE_NAME, Arc::clone(self) as Arc<dyn PipelineHandler>);
    }

    /// Unmounts the router. Does nothing if not started.
    pub fn stop(&self, pipeline: &mut Pipeline) {
        if !self.started.swap(false, Ordering::SeqCst) {
            return;
        }
        pipeline.unmount(PIPELINE_NAME);
    }

    /// Returns true while mounted.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Dispatches one request.
    ///
    /// Middleware failures become error responses; any other error is
    /// returned to the host.
    pub async fn dispatch(&self, url: &str, context: Option<ServerContext>) -> Result<ServerOutcome> {
        if url.is_empty() {
            return Err(DispatchError::InvalidArgument(
                "expected url string in router dispatch".to_string(),
            ));
        }
        let context = context.ok_or_else(|| {
            DispatchError::InvalidArgument("expected context in router dispatch".to_string())
        })?;

        if self.router.stack().is_empty() {
            let mut response = context.response;
            response.set_header("Content-Type", "text/html");
            response.end(format!("{WELCOME_PAGE}\n"));
            return Ok(ServerOutcome::Finished(response));
        }

        let mut controller = self
            .router
            .create_controller(url, Where::Server, Some(context.into()))?;
        let result = controller.dispatch(self.router.stack(), url, None).await;

        let outcome = match result {
            Ok(()) => Ok(self.settle(&mut controller)),
            Err(DispatchError::Middleware(err)) => Ok(self.error_response(&mut controller, &err)),
            Err(e) => Err(e),
        };

        if let Err(e) = controller.stop() {
            warn!(%url, error = %e, "failed to stop controller");
        }
        outcome
    }

    fn settle(&self, controller: &mut RouteController) -> ServerOutcome {
        let handled = controller.is_handled();
        let on_client = controller.will_be_handled_on_client();
        let head = controller.method() == Some(Method::Head);
        let mut response = controller.take_response();

        if on_client {
            debug!(url = %controller.url(), "leaving request to the client app");
            return ServerOutcome::Next(response);
        }
        if !handled {
            debug!(url = %controller.url(), "no server handler");
            return ServerOutcome::Next(response);
        }
        if !response.is_finished() {
            response.set_header("Content-Type", "text/html");
            if head {
                response.end(b"");
            } else {
                response.end(NO_CLIENT_ROUTES_PAGE);
            }
        }
        ServerOutcome::Finished(response)
    }

    fn error_response(&self, controller: &mut RouteController, err: &MiddlewareError) -> ServerOutcome {
        let head = controller.method() == Some(Method::Head);
        let mut response = controller.take_response();

        if response.status < 400 {
            response.status = 500;
        }
        if let Some(status) = err.status {
            response.status = status;
        }

        let detail = err.detail();
        error!(url = %controller.url(), status = response.status, error = %detail, "dispatch failed");

        if response.headers_sent() {
            response.destroy();
            return ServerOutcome::ConnectionDestroyed(response);
        }

        let msg = if self.options.development {
            format!("{detail}\n")
        } else {
            "Server error.".to_string()
        };
        response
            .set_header("Content-Type", "text/html")
            .set_header("Content-Length", msg.len().to_string());
        if head {
            response.end(b"");
        } else {
            response.end(msg);
        }
        ServerOutcome::Finished(response)
    }
}

impl PipelineHandler for ServerRouter {
    fn handle<'a>(
        &'a self,
        request: Request,
        response: Response,
    ) -> BoxFuture<'a, Result<ServerOutcome>> {
        Box::pin(async move {
            let url = request.original_url.clone();
            self.dispatch(&url, Some(ServerContext { request, response }))
                .await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{Flow, FnMiddleware, StepResult};
    use crate::route::Route;

    fn hello(c: &mut RouteController) -> StepResult {
        c.respond(200, "hello");
        Ok(Flow::Stop)
    }

    fn forbidden(_: &mut RouteController) -> StepResult {
        Err(MiddlewareError::new("not allowed").with_status(403))
    }

    type Handler = fn(&mut RouteController) -> StepResult;

    fn server(route: Route, f: Handler, development: bool) -> ServerRouter {
        let router = Router::new()
            .route(route.where_(Where::Server), FnMiddleware::new(f))
            .unwrap();
        ServerRouter::new(Arc::new(router), ServerOptions { development })
    }

    #[test]
    fn test_options_from_mode() {
        assert!(ServerOptions::from_mode("development").development);
        assert!(!ServerOptions::from_mode("production").development);
    }

    #[tokio::test]
    async fn test_requires_context() {
        let server = server(Route::new("/").unwrap(), hello, true);
        assert!(matches!(
            server.dispatch("/", None).await,
            Err(DispatchError::InvalidArgument(_))
        ));
        assert!(matches!(
            server.dispatch("", Some(ServerContext::default())).await,
            Err(DispatchError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_stack_serves_welcome_page() {
        let server = ServerRouter::new(Arc::new(Router::new()), ServerOptions::default());
        let outcome = server
            .dispatch("/", Some(ServerContext::new(Request::get("/"))))
            .await
            .unwrap();
        let res = outcome.response();
        assert!(res.is_finished());
        assert!(res.body_string().unwrap().contains("No routes are defined yet."));
    }

    #[tokio::test]
    async fn test_handled_response() {
        let server = server(Route::new("/hello").unwrap(), hello, true);
        let outcome = server
            .dispatch("/hello", Some(ServerContext::new(Request::get("/hello"))))
            .await
            .unwrap();
        assert!(matches!(outcome, ServerOutcome::Finished(_)));
        assert_eq!(outcome.response().body_string().as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_unmatched_passes_to_host() {
        let server = server(Route::new("/hello").unwrap(), hello, true);
        let outcome = server
            .dispatch("/other", Some(ServerContext::new(Request::get("/other"))))
            .await
            .unwrap();
        assert!(matches!(outcome, ServerOutcome::Next(_)));
    }

    #[tokio::test]
    async fn test_error_detail_only_in_development() {
        for (development, expected) in [(true, "Error: not allowed\n"), (false, "Server error.")] {
            let server = server(Route::new("/admin").unwrap(), forbidden, development);
            let outcome = server
                .dispatch("/admin", Some(ServerContext::new(Request::get("/admin"))))
                .await
                .unwrap();
            let res = outcome.response();
            assert_eq!(res.status, 403);
            assert_eq!(res.body_string().as_deref(), Some(expected));
            assert_eq!(
                res.get_header("Content-Length"),
                Some(expected.len().to_string().as_str())
            );
        }
    }

    #[tokio::test]
    async fn test_head_error_has_empty_body() {
        let server = server(Route::new("/admin").unwrap(), forbidden, true);
        let outcome = server
            .dispatch("/admin", Some(ServerContext::new(Request::head("/admin"))))
            .await
            .unwrap();
        assert_eq!(outcome.response().status, 403);
        assert!(outcome.response().body.is_empty());
    }

    #[tokio::test]
    async fn test_error_after_headers_sent_destroys_connection() {
        fn partial(c: &mut RouteController) -> StepResult {
            c.response_mut().write("partial");
            Err(MiddlewareError::new("midway"))
        }
        let server = server(Route::new("/stream").unwrap(), partial, true);
        let outcome = server
            .dispatch("/stream", Some(ServerContext::new(Request::get("/stream"))))
            .await
            .unwrap();
        assert!(matches!(outcome, ServerOutcome::ConnectionDestroyed(_)));
        assert_eq!(outcome.response().status, 500);
        assert!(outcome.response().is_destroyed());
    }

    #[tokio::test]
    async fn test_handled_without_response_gets_info_page() {
        fn silent(_: &mut RouteController) -> StepResult {
            Ok(Flow::Stop)
        }
        let server = server(Route::new("/quiet").unwrap(), silent, true);
        let outcome = server
            .dispatch("/quiet", Some(ServerContext::new(Request::get("/quiet"))))
            .await
            .unwrap();
        assert!(outcome
            .response()
            .body_string()
            .unwrap()
            .contains("client side routes"));
    }

    #[tokio::test]
    async fn test_client_route_passes_to_host() {
        let router = Router::new()
            .route(Route::new("/app").unwrap(), FnMiddleware::new(hello))
            .unwrap();
        let server = ServerRouter::new(Arc::new(router), ServerOptions::default());
        let outcome = server
            .dispatch("/app", Some(ServerContext::new(Request::get("/app"))))
            .await
            .unwrap();
        assert!(matches!(outcome, ServerOutcome::Next(_)));
    }

    #[tokio::test]
    async fn test_pipeline_mount_and_fallback() {
        let server = Arc::new(server(Route::new("/hello").unwrap(), hello, true));
        let mut pipeline = Pipeline::new();
        server.start(&mut pipeline);
        server.start(&mut pipeline);
        assert_eq!(pipeline.len(), 1);

        let res = pipeline.run(Request::get("/hello")).await;
        assert_eq!(res.body_string().as_deref(), Some("hello"));
        let res = pipeline.run(Request::get("/missing")).await;
        assert_eq!(res.status, 404);

        server.stop(&mut pipeline);
        server.stop(&mut pipeline);
        assert!(pipeline.is_empty());
        assert!(!server.is_started());
    }
}
