use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use agentlink_core::connections::TcpConnectorFactory;
use agentlink_core::storage::KeyringSecrets;
use agentlink_core::{
    EndpointId, EndpointRegistry, JsonEndpointStore, NewEndpoint, Notice, Reply, Request,
    StatusSnapshot, Supervisor, SupervisorClient, SupervisorConfig,
};
use anyhow::{bail, Context};
use clap::{Args as ClapArgs, Parser, Subcommand};
use log::{info, warn};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "agentlink", version, subcommand_required = true)]
pub struct Args {
    /// Directory holding the endpoint JSON files (defaults to the user config dir)
    #[arg(long, global = true)]
    pub store_dir: Option<PathBuf>,
    /// Keep endpoint passwords in the OS keyring
    #[arg(long, global = true)]
    pub keyring: bool,
    /// Seconds to wait for a TCP connection to be established
    #[arg(long, global = true, default_value_t = 10)]
    pub connect_timeout: u64,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show every registered endpoint
    List,
    /// Register an endpoint without starting it
    Add(EndpointArgs),
    /// Remove an endpoint
    Remove {
        #[arg(long)]
        id: EndpointId,
    },
    /// Register an endpoint, start it and watch its status
    Connect(EndpointArgs),
    /// Start endpoints and watch their status until Ctrl-C
    Run {
        /// Endpoint to start; repeat for several
        #[arg(long = "id")]
        ids: Vec<EndpointId>,
        /// Also start every endpoint that was enabled last time
        #[arg(long)]
        resume: bool,
    },
    /// Print a status snapshot of the registered endpoints without starting
    /// any; every entry reads OFFLINE, so this is a listing in protocol form
    Status {
        /// Print the raw protocol reply as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(ClapArgs, Debug, Clone)]
pub struct EndpointArgs {
    /// Unique name; generated when omitted
    #[arg(long)]
    name: Option<String>,
    /// Remote host
    #[arg(long)]
    host: String,
    /// Remote port
    #[arg(long, default_value_t = 31415)]
    port: u16,
    /// Connect over TLS
    #[arg(long)]
    ssl: bool,
    #[arg(long)]
    ssl_truststore_path: Option<String>,
    #[arg(long)]
    ssl_truststore_password: Option<String>,
    /// Password presented to the remote
    #[arg(long)]
    password: Option<String>,
}

impl From<EndpointArgs> for NewEndpoint {
    fn from(a: EndpointArgs) -> Self {
        NewEndpoint {
            name: a.name,
            host: a.host,
            port: a.port,
            ssl: a.ssl,
            ssl_truststore_path: a.ssl_truststore_path,
            ssl_truststore_password: a.ssl_truststore_password,
            password: a.password,
        }
    }
}

fn open_registry(args: &Args) -> anyhow::Result<EndpointRegistry> {
    let store = match &args.store_dir {
        Some(dir) => JsonEndpointStore::at(dir),
        None => JsonEndpointStore::new(),
    }
    .context("opening endpoint store")?;
    let store = if args.keyring {
        store.with_keyring(KeyringSecrets::default())
    } else {
        store
    };
    info!("Using endpoint store at {:?}", store.dir());
    Ok(EndpointRegistry::open(Box::new(store))?)
}

fn spawn_supervisor(args: &Args, registry: EndpointRegistry) -> (SupervisorClient, JoinHandle<()>) {
    let config = SupervisorConfig {
        connect_timeout: Duration::from_secs(args.connect_timeout),
        ..SupervisorConfig::default()
    };
    let connectors = Arc::new(TcpConnectorFactory::new(config.connect_timeout));
    Supervisor::new(config, registry, connectors).spawn()
}

pub async fn run_cli(args: Args) -> anyhow::Result<()> {
    let mut registry = open_registry(&args)?;

    match args.command {
        Command::List => {
            for e in registry.all() {
                println!(
                    "{:>4}  {:<24} {:<28} ssl={:<5} enabled={}",
                    e.id,
                    e.name,
                    e.connection_string(),
                    e.ssl,
                    e.enabled
                );
            }
        }
        Command::Add(ref endpoint) => {
            let id = registry.add(NewEndpoint::from(endpoint.clone()))?;
            println!("Registered endpoint {id}");
        }
        Command::Remove { id } => {
            let removed = registry.remove(id)?;
            println!("Removed endpoint {} ({})", id, removed.name);
        }
        Command::Connect(ref endpoint) => {
            let (client, task) = spawn_supervisor(&args, registry);
            let notices = client.notices();
            let id = client
                .create_endpoint(NewEndpoint::from(endpoint.clone()))
                .await?;
            println!("Started endpoint {id}");
            watch(&client, notices).await?;
            task.await?;
        }
        Command::Run { ref ids, resume } => {
            if ids.is_empty() && !resume {
                bail!("nothing to run: pass --id or --resume");
            }
            let (client, task) = spawn_supervisor(&args, registry);
            let notices = client.notices();
            if resume {
                let started = client.resume_enabled().await?;
                info!("Resumed {} enabled endpoint(s)", started);
            }
            for id in ids {
                match client.call(Request::StartEndpoint { endpoint_id: *id }).await? {
                    Reply::Failed { error, .. } => warn!("Could not start endpoint {}: {}", id, error),
                    reply => print_reply(&reply),
                }
            }
            watch(&client, notices).await?;
            task.await?;
        }
        Command::Status { json } => {
            let (client, task) = spawn_supervisor(&args, registry);
            let reply = client.call(Request::GetEndpointsStatus).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&reply)?);
            } else {
                print_reply(&reply);
            }
            client.shutdown().await?;
            task.await?;
        }
    }
    Ok(())
}

fn print_snapshot(snapshot: &StatusSnapshot) {
    let line: Vec<String> = snapshot
        .iter()
        .map(|(id, status)| format!("{id}={status}"))
        .collect();
    println!("[status] {}", line.join(" "));
}

fn print_reply(reply: &Reply) {
    match reply {
        Reply::EndpointsStatus { endpoints } => print_snapshot(endpoints),
        Reply::DetailedEndpointStatus(d) => println!("[detail] {d:?}"),
        Reply::SslFingerprint {
            endpoint_id,
            fingerprint,
        } => println!("[fingerprint] {endpoint_id}: {fingerprint}"),
        Reply::Failed { request, error } => println!("[error] {request:?}: {error}"),
    }
}

/// Binds as a subscriber and prints snapshots and notices until Ctrl-C.
/// `notices` should be subscribed before the endpoints are started.
async fn watch(
    client: &SupervisorClient,
    mut notices: broadcast::Receiver<Notice>,
) -> anyhow::Result<()> {
    let (reply_tx, mut replies) = mpsc::channel::<Reply>(32);
    let subscriber = client.bind(reply_tx).await?;
    info!("Watching endpoints. Press Ctrl-C to stop.");

    loop {
        tokio::select! {
            Some(reply) = replies.recv() => print_reply(&reply),
            notice = notices.recv() => match notice {
                Ok(Notice::Started { endpoint_id, connection }) => {
                    println!("[notice] endpoint {endpoint_id} started ({connection})")
                }
                Ok(Notice::Stopped { endpoint_id, connection }) => {
                    println!("[notice] endpoint {endpoint_id} stopped ({connection})")
                }
                Ok(Notice::Log { endpoint_id, record }) => {
                    println!("[{}] endpoint {endpoint_id}: {}", record.level, record.message)
                }
                Err(broadcast::error::RecvError::Lagged(n)) => warn!("Missed {} notices", n),
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping...");
                break;
            }
        }
    }

    let _ = client.unbind(subscriber).await;
    client.shutdown().await?;
    Ok(())
}
