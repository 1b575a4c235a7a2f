//! Route tables loaded from JSON.
//!
//! ```json
//! {
//!   "options": { "notFoundTemplate": "NotFound" },
//!   "controllers": [{ "name": "ItemsController", "options": { "layout": "Items" } }],
//!   "routes": [
//!     { "name": "itemsShow", "path": "/items/:_id", "template": "ItemsShow" },
//!     { "path": "/health", "where": "server", "body": "ok" }
//!   ]
//! }
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::controller::RouteController;
use crate::error::{DispatchError, Result};
use crate::middleware::{BoxFuture, Flow, Middleware, StepResult};
use crate::options::Options;
use crate::route::{Route, Where};
use crate::router::Router;

/// A controller class declaration.
#[derive(Debug, Clone, Deserialize)]
pub struct ControllerConfig {
    /// Class name.
    pub name: String,
    /// Parent class, declared earlier in the table.
    #[serde(default)]
    pub parent: Option<String>,
    /// Static option values.
    #[serde(default)]
    pub options: Options,
}

/// A route entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteConfig {
    /// Route name.
    #[serde(default)]
    pub name: Option<String>,
    /// Path pattern.
    pub path: String,
    /// Environment; overrides a `where` key in `options`.
    #[serde(default, rename = "where")]
    pub where_: Option<Where>,
    /// Controller class name.
    #[serde(default)]
    pub controller: Option<String>,
    /// Route options.
    #[serde(default)]
    pub options: Options,
    /// Fixed response body written on the server.
    #[serde(default)]
    pub body: Option<String>,
    /// Status for `body`.
    #[serde(default = "default_status")]
    pub status: u16,
    /// Template rendered on the client.
    #[serde(default)]
    pub template: Option<String>,
}

fn default_status() -> u16 {
    200
}

/// Global options, controller classes and routes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouteTable {
    /// Router-wide options.
    #[serde(default)]
    pub options: Options,
    /// Controller classes, parents first.
    #[serde(default)]
    pub controllers: Vec<ControllerConfig>,
    /// Routes in match order.
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

impl RouteTable {
    /// Parses a table from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a table from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading route table");
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    /// Adds the table's options, classes and routes to `router`.
    pub fn build_router(self, router: Router) -> Result<Router> {
        let mut router = router.configure(self.options);
        for class in self.controllers {
            router = router.controller_class(class.name, class.parent.as_deref(), class.options)?;
        }
        for entry in self.routes {
            let mut route = Route::new(&entry.path)?.options(entry.options);
            if let Some(name) = entry.name {
                route = route.name(name);
            }
            if let Some(where_) = entry.where_ {
                route = route.where_(where_);
            }
            if let Some(controller) = entry.controller {
                route = route.controller(controller);
            }
            router = router.route(
                route,
                StaticRoute {
                    body: entry.body,
                    status: entry.status,
                    template: entry.template,
                },
            )?;
        }
        Ok(router)
    }
}

/// Handler for a configured route.
///
/// On the server it writes the fixed body; on the client it renders the
/// template with the controller's data. Without either it passes on.
#[derive(Debug, Clone)]
pub struct StaticRoute {
    body: Option<String>,
    status: u16,
    template: Option<String>,
}

impl Middleware for StaticRoute {
    fn handle<'a>(&'a self, ctrl: &'a mut RouteController) -> BoxFuture<'a, StepResult> {
        Box::pin(async move {
            match (ctrl.environment(), &self.body, &self.template) {
                (Where::Server, Some(body), _) => {
                    ctrl.respond(self.status, body.clone());
                    Ok(Flow::Stop)
                }
                (Where::Client | Where::Both, _, Some(template)) => {
                    let data = ctrl.data();
                    let data = (!data.is_null()).then_some(data);
                    ctrl.render(template.clone(), data);
                    Ok(Flow::Stop)
                }
                _ => Ok(Flow::Next),
            }
        })
    }
}

/// Reads `key=value` pairs, as given on the command line.
pub fn parse_params<'a>(pairs: impl IntoIterator<Item = &'a str>) -> Result<HashMap<String, String>> {
    pairs
        .into_iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| {
                    DispatchError::InvalidArgument(format!("expected key=value, got {pair:?}"))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;

    use super::*;

    const TABLE: &str = r#"{
        "options": { "notFoundTemplate": "NotFound" },
        "controllers": [
            { "name": "BaseController", "options": { "layout": "Main" } },
            { "name": "ItemsController", "parent": "BaseController" }
        ],
        "routes": [
            { "name": "itemsShow", "path": "/items/:_id", "template": "ItemsShow", "controller": "ItemsController" },
            { "name": "health", "path": "/health", "where": "server", "body": "ok", "status": 203 }
        ]
    }"#;

    #[test]
    fn test_build_router_from_table() {
        let router = RouteTable::from_json_str(TABLE)
            .unwrap()
            .build_router(Router::new())
            .unwrap();
        let router = Arc::new(router);

        assert_eq!(router.routes().len(), 2);
        assert_eq!(router.options().str("notFoundTemplate"), Some("NotFound"));
        assert_eq!(router.get_route("health").unwrap().get_where(), Where::Server);

        let ctrl = router
            .create_controller("/items/3", Where::Client, None)
            .unwrap();
        assert_eq!(ctrl.class().name(), "ItemsController");
        assert_eq!(ctrl.lookup_str("layout"), Some("Main"));
    }

    #[tokio::test]
    async fn test_static_body_on_server() {
        let router = RouteTable::from_json_str(TABLE)
            .unwrap()
            .build_router(Router::new())
            .unwrap();
        let router = Arc::new(router);
        let mut ctrl = router
            .create_controller("/health", Where::Server, None)
            .unwrap();
        ctrl.dispatch(router.stack(), "/health", None).await.unwrap();
        assert!(ctrl.is_handled());
        assert_eq!(ctrl.response().status, 203);
        assert_eq!(ctrl.response().body_string().as_deref(), Some("ok"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TABLE.as_bytes()).unwrap();
        let table = RouteTable::load(file.path()).unwrap();
        assert_eq!(table.routes.len(), 2);
        assert_eq!(table.routes[1].status, 203);

        assert!(matches!(
            RouteTable::load("/definitely/not/here.json"),
            Err(DispatchError::Io(_))
        ));
    }

    #[test]
    fn test_bad_table() {
        assert!(matches!(
            RouteTable::from_json_str(r#"{"routes": [{"name": "x"}]}"#),
            Err(DispatchError::Config(_))
        ));
        assert!(matches!(
            RouteTable::from_json_str(
                r#"{"routes": [{"path": "/a", "options": {"before": ["auth", 5]}}]}"#
            ),
            Err(DispatchError::Config(_))
        ));
        let table = RouteTable::from_json_str(r#"{"routes": [{"path": "/a"}, {"path": "/b", "name": "a"}, {"path": "/c", "name": "a"}]}"#)
            .unwrap();
        assert!(matches!(
            table.build_router(Router::new()),
            Err(DispatchError::DuplicateRoute(_))
        ));
    }

    #[test]
    fn test_parse_params() {
        let params = parse_params(["_id=5", "q=a=b"]).unwrap();
        assert_eq!(params.get("_id").map(String::as_str), Some("5"));
        assert_eq!(params.get("q").map(String::as_str), Some("a=b"));
        assert!(parse_params(["nope"]).is_err());
    }
}
