//! # InsightIO CLI Entry Point
//!
//! ## Usage
//!
//! ```bash
//! # Start the server (keys may also come from INSIGHTIO_API_KEY)
//! insightio serve --api-key secret --port 50051 --window 60
//!
//! # Send one event
//! insightio send --type page_view --user-id u1 --meta plan=pro --api-key secret
//!
//! # Query metrics (all four when no --name is given)
//! insightio metrics --name total_events --api-key secret | jq .
//! ```

use std::collections::HashMap;
use std::net::IpAddr;

use anyhow::{anyhow, Result};
use argh::FromArgs;
use insightio_cli::client::InsightClient;
use insightio_cli::parse_metadata;
use insightio_common::{Event, GetMetricsRequest};
use insightio_server::config::{
    split_keys, ENV_API_KEY, ENV_ENV, ENV_METRICS_WINDOW, ENV_PORT, ENV_QUEUE_CAPACITY,
};
use insightio_server::{Server, ServerConfig};

const DEFAULT_URL: &str = "http://127.0.0.1:50051";

#[derive(FromArgs)]
/// InsightIO - telemetry ingestion and metrics server
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Serve(ServeArgs),
    Send(SendArgs),
    Metrics(MetricsArgs),
}

/// Arguments for running the server.
///
/// Every flag overrides the matching `INSIGHTIO_*` environment variable.
#[derive(FromArgs)]
#[argh(subcommand, name = "serve")]
/// run the InsightIO server
struct ServeArgs {
    /// port to listen on (default 50051)
    #[argh(option, short = 'p')]
    port: Option<u16>,

    /// sliding metrics window in seconds (default 60)
    #[argh(option, short = 'w')]
    window: Option<u64>,

    /// accepted API key; may be given several times
    #[argh(option, long = "api-key")]
    api_keys: Vec<String>,

    /// deployment environment label (default "dev")
    #[argh(option)]
    env: Option<String>,

    /// capacity of the ingestion queue (default 1000)
    #[argh(option, long = "queue-capacity")]
    queue_capacity: Option<usize>,

    /// interface to bind to
    #[argh(option, long = "bind-host", default = "IpAddr::from([0, 0, 0, 0])")]
    bind_host: IpAddr,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "send")]
/// send one event to a server
struct SendArgs {
    /// event type, e.g. page_view
    #[argh(option, long = "type", short = 't')]
    event_type: String,

    /// id of the user the event belongs to
    #[argh(option, long = "user-id")]
    user_id: Option<String>,

    /// numeric value attached to the event
    #[argh(option)]
    value: Option<f64>,

    /// metadata entry as key=value; may be given several times
    #[argh(option, long = "meta")]
    meta: Vec<String>,

    /// API key (defaults to the first key in INSIGHTIO_API_KEY)
    #[argh(option, long = "api-key")]
    api_key: Option<String>,

    /// server address including http://
    #[argh(option, default = "DEFAULT_URL.to_string()")]
    url: String,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "metrics")]
/// query current metric values
struct MetricsArgs {
    /// metric to fetch; may be given several times, all when omitted
    #[argh(option, long = "name", short = 'n')]
    names: Vec<String>,

    /// API key (defaults to the first key in INSIGHTIO_API_KEY)
    #[argh(option, long = "api-key")]
    api_key: Option<String>,

    /// server address including http://
    #[argh(option, default = "DEFAULT_URL.to_string()")]
    url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    match cli.command {
        Commands::Serve(args) => {
            // Logging only for the server; client commands print raw JSON
            let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
            tracing_subscriber::fmt().with_env_filter(env_filter).init();

            let config = server_config(&args, |key| std::env::var(key).ok())?;
            let addr = config.socket_addr();
            tracing::info!(env = %config.env, "Starting InsightIO server on {}", addr);

            Server::new(config)?.run(addr).await?;
            Ok(())
        }
        Commands::Send(args) => run_send(args).await,
        Commands::Metrics(args) => run_metrics(args).await,
    }
}

/// Builds the server configuration, flags first, then `env`.
fn server_config<F>(args: &ServeArgs, env: F) -> Result<ServerConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut overrides: HashMap<&str, String> = HashMap::new();
    if let Some(port) = args.port {
        overrides.insert(ENV_PORT, port.to_string());
    }
    if let Some(window) = args.window {
        overrides.insert(ENV_METRICS_WINDOW, window.to_string());
    }
    if !args.api_keys.is_empty() {
        overrides.insert(ENV_API_KEY, args.api_keys.join(","));
    }
    if let Some(env_name) = &args.env {
        overrides.insert(ENV_ENV, env_name.clone());
    }
    if let Some(capacity) = args.queue_capacity {
        overrides.insert(ENV_QUEUE_CAPACITY, capacity.to_string());
    }

    let mut config =
        ServerConfig::from_lookup(|key| overrides.get(key).cloned().or_else(|| env(key)))?;
    config.bind_host = args.bind_host;
    Ok(config)
}

fn resolve_api_key<F>(flag: Option<String>, env: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    flag.or_else(|| env(ENV_API_KEY).and_then(|raw| split_keys(&raw).into_iter().next()))
        .ok_or_else(|| anyhow!("No API key: pass --api-key or set {}", ENV_API_KEY))
}

async fn run_send(args: SendArgs) -> Result<()> {
    let api_key = resolve_api_key(args.api_key, |key| std::env::var(key).ok())?;
    let client = InsightClient::new(&args.url, api_key)?;

    let mut event = Event::new(args.event_type);
    event.user_id = args.user_id;
    event.value = args.value;
    event.metadata = parse_metadata(&args.meta)?;

    let ack = client.send_event(&event).await?;
    println!("{}", serde_json::to_string(&ack)?);
    Ok(())
}

async fn run_metrics(args: MetricsArgs) -> Result<()> {
    let api_key = resolve_api_key(args.api_key, |key| std::env::var(key).ok())?;
    let client = InsightClient::new(&args.url, api_key)?;

    let response = client.get_metrics(&GetMetricsRequest::new(args.names)).await?;
    println!("{}", serde_json::to_string(&response)?);
    Ok(())
}
