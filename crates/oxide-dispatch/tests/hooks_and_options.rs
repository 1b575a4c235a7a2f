//! Hook ordering and filtering, and the option lookup chain.

mod common;

use std::sync::Arc;

use common::*;
use oxide_dispatch::{
    CurrentOptions, DispatchContext, DispatchError, HookFilter, HookRef, OptionValue, Options,
    Route, RouteTable, Router, Where,
};
use serde_json::json;

fn layered_router(log: &Log) -> Router {
    Router::new()
        .configure(Options::new().set("level", "router").set("router_only", 1))
        .hook("before", HookRef::func(record(log, "G")), HookFilter::All)
        .controller_class(
            "BaseController",
            None,
            Options::new()
                .set("level", "base")
                .hook("before", record(log, "B")),
        )
        .unwrap()
        .controller_class(
            "ItemsShowController",
            Some("BaseController"),
            Options::new()
                .set("level", "sub")
                .hook("before", record(log, "S")),
        )
        .unwrap()
        .route(
            Route::new("/items/:_id").unwrap().name("itemsShow").options(
                Options::new()
                    .set("route_only", true)
                    .set("level", "route")
                    .hook("before", record(log, "R")),
            ),
            render("ItemsShow"),
        )
        .unwrap()
}

#[tokio::test]
async fn hooks_run_global_route_base_sub_instance() {
    let log = log();
    let mut h = client(layered_router(&log), "/");
    h.client.dispatch("/items/1", None).await.unwrap();
    assert_eq!(entries(&log), vec!["G", "R", "B", "S"]);

    log.lock().unwrap().clear();
    h.client
        .current_mut()
        .unwrap()
        .add_hook("before", record(&log, "I"));
    h.client.dispatch("/items/2", None).await.unwrap();
    assert_eq!(entries(&log), vec!["G", "R", "B", "S", "I"]);
}

#[test]
fn option_lookup_precedence() {
    let log = log();
    let router = Arc::new(layered_router(&log));
    let mut ctrl = router
        .create_controller("/items/1", Where::Client, None)
        .unwrap();

    // class wins over route and router
    assert_eq!(ctrl.class().name(), "ItemsShowController");
    assert_eq!(ctrl.lookup_str("level"), Some("sub"));
    assert_eq!(ctrl.lookup_bool("route_only"), Some(true));
    assert_eq!(
        ctrl.lookup_option("router_only").and_then(OptionValue::as_value),
        Some(&json!(1))
    );

    ctrl.set_field("level", OptionValue::Value(json!("field")));
    assert_eq!(ctrl.lookup_str("level"), Some("field"));
    assert!(ctrl.lookup_option("nowhere").is_none());
}

#[tokio::test]
async fn own_options_shadow_every_other_level() {
    let log = log();
    let mut h = client(layered_router(&log), "/");

    let mut scope = CurrentOptions::new();
    scope.push(Options::new().set("level", "ambient"));
    let ctx = DispatchContext::new()
        .current_options(scope.get())
        .controller_options(Options::new().set("level", "own"));
    h.client.dispatch("/items/1", Some(ctx)).await.unwrap();

    let ctrl = h.client.current_mut().unwrap();
    ctrl.set_field("level", OptionValue::Value(json!("field")));
    assert_eq!(ctrl.options().str("level"), Some("own"));
    assert_eq!(ctrl.lookup_str("level"), Some("own"));
    assert_eq!(ctrl.lookup_bool("route_only"), Some(true));

    // a plain dispatch builds a controller without own options
    h.client.dispatch("/", None).await.unwrap();
    assert!(h.client.current().unwrap().options().is_empty());
}

#[test]
fn ambient_options_sit_between_class_and_route() {
    let router = Arc::new(
        Router::new()
            .route(
                Route::new("/x")
                    .unwrap()
                    .options(Options::new().set("layoutTemplate", "RouteLayout")),
                render("X"),
            )
            .unwrap(),
    );

    let mut scope = CurrentOptions::new();
    scope.push(Options::new().set("layoutTemplate", "Outer"));
    scope.push(Options::new().set("layoutTemplate", "Inner"));
    let ctx = DispatchContext::new().current_options(scope.get());
    let ctrl = router
        .create_controller("/x", Where::Client, Some(ctx))
        .unwrap();
    assert_eq!(ctrl.lookup_str("layoutTemplate"), Some("Inner"));

    scope.pop();
    scope.pop();
    let ctx = DispatchContext::new().current_options(scope.get());
    let ctrl = router
        .create_controller("/x", Where::Client, Some(ctx))
        .unwrap();
    assert_eq!(ctrl.lookup_str("layoutTemplate"), Some("RouteLayout"));
}

#[tokio::test]
async fn global_hook_filters() {
    let log = log();
    let router = Router::new()
        .hook(
            "onBeforeAction",
            HookRef::func(record(&log, "only-a")),
            HookFilter::only(&["a"]),
        )
        .hook(
            "onBeforeAction",
            HookRef::func(record(&log, "except-a")),
            HookFilter::except(&["a"]),
        )
        .route(Route::new("/a").unwrap().name("a"), render("A"))
        .unwrap()
        .route(Route::new("/b").unwrap().name("b"), render("B"))
        .unwrap();
    let mut h = client(router, "/");

    h.client.dispatch("/a", None).await.unwrap();
    h.client.dispatch("/b", None).await.unwrap();
    assert_eq!(entries(&log), vec!["only-a", "except-a"]);
}

#[tokio::test]
async fn named_hooks_resolve_through_router() {
    let log = log();
    let router = Router::new()
        .register_hook("audit", record(&log, "audit"))
        .hook("onAfterAction", HookRef::from("audit"), HookFilter::All)
        .route(
            Route::new("/a")
                .unwrap()
                .options(Options::new().hook_named("onAfterAction", "audit")),
            render("A"),
        )
        .unwrap()
        .route(
            Route::new("/broken")
                .unwrap()
                .options(Options::new().hook_named("before", "missing")),
            render("Broken"),
        )
        .unwrap();
    let mut h = client(router, "/");

    h.client.dispatch("/a", None).await.unwrap();
    assert_eq!(entries(&log), vec!["audit", "audit"]);

    assert!(matches!(
        h.client.dispatch("/broken", None).await,
        Err(DispatchError::HookNotFound(name)) if name == "missing"
    ));
}

#[tokio::test]
async fn configured_routes_render_with_data() {
    let table = RouteTable::from_json_str(
        r#"{
            "routes": [
                { "name": "itemsShow", "path": "/items/:_id", "template": "ItemsShow",
                  "options": { "data": { "title": "An item" } } }
            ]
        }"#,
    )
    .unwrap();
    let router = table.build_router(Router::new()).unwrap();
    let mut h = client(router, "/");
    h.client.dispatch("/items/9", None).await.unwrap();
    assert_eq!(
        h.layout.renders(),
        vec![("ItemsShow".to_string(), Some(json!({"title": "An item"})))]
    );
}
