#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use oxide_dispatch::{
    ClientRouter, Flow, FnMiddleware, Layout, Location, MemoryLocation, Middleware,
    RecordingLayout, RouteController, Router, ServerOptions, ServerRouter,
};

pub type Log = Arc<Mutex<Vec<String>>>;

pub fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// A hook that appends `tag` to `log`.
pub fn record(log: &Log, tag: &str) -> impl Fn(&mut RouteController) + Send + Sync + 'static {
    let log = Arc::clone(log);
    let tag = tag.to_string();
    move |_| log.lock().unwrap().push(tag.clone())
}

/// A step that renders `template` and ends the chain.
pub fn render(template: &'static str) -> impl Middleware + 'static {
    FnMiddleware::new(move |c: &mut RouteController| {
        c.render(template, None);
        Ok(Flow::Stop)
    })
}

/// A step that writes `body` and ends the chain.
pub fn respond(body: &'static str) -> impl Middleware + 'static {
    FnMiddleware::new(move |c: &mut RouteController| {
        c.respond(200, body);
        Ok(Flow::Stop)
    })
}

pub fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

pub struct ClientHarness {
    pub client: ClientRouter,
    pub location: Arc<MemoryLocation>,
    pub layout: Arc<RecordingLayout>,
}

pub fn client(router: Router, href: &str) -> ClientHarness {
    let location = Arc::new(MemoryLocation::new(href));
    let layout = Arc::new(RecordingLayout::new());
    let client = ClientRouter::new(
        Arc::new(router),
        Arc::clone(&location) as Arc<dyn Location>,
        Arc::clone(&layout) as Arc<dyn Layout>,
    );
    ClientHarness {
        client,
        location,
        layout,
    }
}

pub fn server(router: Router, development: bool) -> Arc<ServerRouter> {
    Arc::new(ServerRouter::new(
        Arc::new(router),
        ServerOptions { development },
    ))
}
