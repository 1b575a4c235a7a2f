//! # oxide-dispatch
//!
//! Client/server URL dispatch with per-route controllers.
//!
//! This crate provides:
//! - Routes with `:param`, `:optional?` and `*wildcard` patterns
//! - A middleware stack whose steps run on the client, the server, or both
//! - Route controllers with layered option lookup and lifecycle hooks
//! - A client router that reuses the current controller for same-route
//!   navigation
//! - A server router that turns dispatch results into HTTP outcomes
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use oxide_dispatch::{Flow, Route, Router, ServerContext, ServerOptions, ServerRouter, Where};
//!
//! let router = Router::new()
//!     .route_fn(Route::new("/items/:_id")?.name("itemsShow"), |c| {
//!         c.render("ItemsShow", None);
//!         Ok(Flow::Stop)
//!     })?
//!     .route_fn(Route::new("/api/health")?.where_(Where::Server), |c| {
//!         c.respond(200, "ok");
//!         Ok(Flow::Stop)
//!     })?;
//!
//! let server = ServerRouter::new(Arc::new(router), ServerOptions::from_env());
//! let outcome = server
//!     .dispatch("/api/health", Some(ServerContext::new(Request::get("/api/health"))))
//!     .await?;
//! ```
//!
//! ## Option Lookup
//!
//! Controllers resolve options from, in order: their own options, instance
//! fields and the controller class hierarchy, the ambient
//! [`CurrentOptions`] scope, the route, and the router.
//!
//! ## Hooks
//!
//! ```ignore
//! let router = Router::new()
//!     .hook("onBeforeAction", HookRef::from("requireLogin"), HookFilter::except(&["login"]))
//!     .register_hook("requireLogin", |c| {
//!         if c.request().get_header("Cookie").is_none() {
//!             c.render("Login", None);
//!         }
//!     });
//! ```
//!
//! Hooks run router-wide first, then from the route, then from the
//! controller class (base class first), then from the instance.

mod class;
mod client;
mod config;
mod controller;
mod error;
mod hooks;
mod middleware;
mod options;
mod params;
mod path;
mod request;
mod response;
mod route;
mod router;
mod server;

pub use class::{ControllerClass, BASE_CLASS};
pub use client::{
    Change, ClientOutcome, ClientRouter, GoOptions, InsertOptions, Layout, LayoutView, Location,
    LocationState, MemoryLocation, RecordingLayout, SubscriptionId, DEFAULT_NOT_FOUND_TEMPLATE,
};
pub use config::{parse_params, ControllerConfig, RouteConfig, RouteTable, StaticRoute};
pub use controller::{DispatchContext, RenderRequest, RouteController};
pub use error::{DispatchError, MiddlewareError, Result};
pub use hooks::{HookFilter, HookRegistry};
pub use middleware::{
    BoxFuture, Flow, FnMiddleware, LoggingMiddleware, Middleware, MiddlewareStack, Step,
    StepResult,
};
pub use options::{keys, CurrentOptions, DataFn, Hook, HookRef, OptionValue, Options};
pub use params::{Params, UrlParts};
pub use path::PathPattern;
pub use request::{Method, Request};
pub use response::Response;
pub use route::{PathOptions, Route, Where};
pub use router::Router;
pub use server::{
    Pipeline, PipelineHandler, ServerContext, ServerOptions, ServerOutcome, ServerRouter, ENV_VAR,
};

/// Hook names recognized by [`RouteController`], each with its alias.
pub mod hook_names {
    pub use crate::hooks::{AFTER, BEFORE, RERUN, RUN, STOP};
}
