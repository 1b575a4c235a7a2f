//! oxide-dispatch CLI
//!
//! Loads a route table and dispatches URLs against it.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_dispatch::{
    parse_params, ClientRouter, Layout, Location, MemoryLocation, Method, PathOptions,
    Pipeline, RecordingLayout, Request, RouteTable, Router, ServerOptions, ServerRouter,
};

/// Client/server URL dispatch.
#[derive(Parser)]
#[command(name = "oxide-dispatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Route table (JSON).
    #[arg(short, long, env = "OXIDE_ROUTES")]
    routes: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dispatch a URL and print the outcome.
    Dispatch {
        /// URL to dispatch.
        url: String,

        /// HTTP method for server dispatch.
        #[arg(short, long, default_value = "GET")]
        method: String,

        /// Dispatch as the client router instead of the server.
        #[arg(long)]
        client: bool,
    },

    /// Generate the path of a named route.
    Path {
        /// Route name.
        name: String,

        /// Parameters as key=value.
        params: Vec<String>,

        /// Query parameters as key=value.
        #[arg(short, long)]
        query: Vec<String>,

        /// Fragment.
        #[arg(long)]
        hash: Option<String>,
    },

    /// List the routes in match order.
    Routes,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let table = match &cli.routes {
        Some(path) => RouteTable::load(path)?,
        None => {
            info!("No route table given, starting with an empty router.");
            RouteTable::default()
        }
    };
    let router = Arc::new(table.build_router(Router::new())?);

    match cli.command {
        Commands::Dispatch {
            url,
            method,
            client,
        } => {
            if client {
                let location = Arc::new(MemoryLocation::new(url));
                let layout = Arc::new(RecordingLayout::new());
                let mut client = ClientRouter::new(
                    router,
                    Arc::clone(&location) as Arc<dyn Location>,
                    Arc::clone(&layout) as Arc<dyn Layout>,
                );
                let outcome = client.start().await?;
                println!("{outcome:?}");
                for (template, data) in layout.renders() {
                    match data {
                        Some(data) => println!("render {template} {data}"),
                        None => println!("render {template}"),
                    }
                }
                for redirect in location.redirects() {
                    println!("redirect {redirect}");
                }
                client.stop()?;
            } else {
                let method: Method = method.parse()?;
                let server = Arc::new(ServerRouter::new(router, ServerOptions::from_env()));
                let mut pipeline = Pipeline::new();
                server.start(&mut pipeline);

                let response = pipeline.run(Request::new(method, url)).await;
                println!("{} {}", response.status, response.status_text());
                let mut headers: Vec<_> = response.headers.iter().collect();
                headers.sort();
                for (key, value) in headers {
                    println!("{key}: {value}");
                }
                println!();
                println!("{}", String::from_utf8_lossy(&response.body));
                server.stop(&mut pipeline);
            }
        }

        Commands::Path {
            name,
            params,
            query,
            hash,
        } => {
            let params = parse_params(params.iter().map(String::as_str))?;
            let mut options = PathOptions::new();
            for (key, value) in parse_params(query.iter().map(String::as_str))? {
                options = options.query(key, value);
            }
            if let Some(hash) = hash {
                options = options.hash(hash);
            }
            println!("{}", router.path_for(&name, &params, &options)?);
        }

        Commands::Routes => {
            for route in router.routes() {
                println!(
                    "{:<24} {:<8} {}",
                    route.get_name().unwrap_or("-"),
                    route.get_where().as_str(),
                    route.pattern().pattern()
                );
            }
        }
    }

    Ok(())
}
