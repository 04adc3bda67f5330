//! # flyprint
//!
//! Local print agent: pairs with a flyPush server, then polls for label
//! jobs and drives the printer through CUPS.

mod agent;
mod client;
mod config;
mod error;
mod printer;

use clap::{Parser, Subcommand};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{reload, EnvFilter};

use crate::agent::Agent;
use crate::client::{ApiClient, PairRequest};
use crate::config::{ConfigStore, Credentials, LocalSettings};

#[derive(Parser)]
#[command(name = "flyprint", version, about = "flyPush local print agent")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Pair this machine with a flyPush server
    Pair {
        /// Server base URL, e.g. http://lab-server:8080
        #[arg(long)]
        server: String,
        /// Pairing code shown in the web UI; optional when only one
        /// pairing is open
        #[arg(long)]
        code: Option<String>,
        /// Agent name (defaults to this machine's hostname)
        #[arg(long)]
        name: Option<String>,
        /// Printer queue to use (defaults to server-side assignment)
        #[arg(long)]
        printer: Option<String>,
    },
    /// Run the poll loop
    Run,
    /// Check server connectivity and printer availability
    Test,
    /// Print the local configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let store = ConfigStore::open()?;
    let initial_level = store
        .load_settings()
        .map(|s| s.log_level)
        .unwrap_or_else(|_| "info".to_string());

    let (filter, log_reload) = reload::Layer::new(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&initial_level)),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Pair {
            server,
            code,
            name,
            printer,
        } => pair(&store, server, code, name, printer).await,
        Command::Run => run(store, log_reload).await,
        Command::Test => test(&store).await,
        Command::ShowConfig => show_config(&store),
    }
}

async fn pair(
    store: &ConfigStore,
    server: String,
    code: Option<String>,
    name: Option<String>,
    printer: Option<String>,
) -> anyhow::Result<()> {
    let name = name.unwrap_or_else(|| {
        hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "print-agent".to_string())
    });
    let printers = printer::list_printers().await.unwrap_or_default();

    let response = ApiClient::pair(
        &server,
        &PairRequest {
            code,
            agent_name: Some(name),
            printer_name: printer,
            available_printers: Some(printers),
        },
    )
    .await?;

    store.save_credentials(&Credentials {
        server_url: server,
        api_key: response.api_key.clone(),
        agent_id: response.agent_id.clone(),
    })?;
    store.save_settings(&LocalSettings::from_server(&response.config))?;

    println!("Paired as '{}' (agent {})", response.config.agent_name, response.agent_id);
    println!("Tenant:  {}", response.tenant_id);
    println!("Config:  {}", store.dir().display());
    Ok(())
}

async fn run(store: ConfigStore, log_reload: agent::LogReloadHandle) -> anyhow::Result<()> {
    let credentials = store.load_credentials()?;
    let settings = store.load_settings()?;
    let client = ApiClient::new(&credentials.server_url, &credentials.api_key)?;

    let mut agent = Agent::new(client, store, settings).with_log_reload(log_reload);
    agent.run().await?;
    Ok(())
}

async fn test(store: &ConfigStore) -> anyhow::Result<()> {
    let credentials = store.load_credentials()?;
    let settings = store.load_settings()?;
    let client = ApiClient::new(&credentials.server_url, &credentials.api_key)?;

    print!("Server {} ... ", credentials.server_url);
    let heartbeat = client.heartbeat(&Default::default()).await?;
    println!("ok (config v{})", heartbeat.config_version);

    match &settings.printer_name {
        Some(name) => {
            print!("Printer {} ... ", name);
            if printer::printer_available(name).await? {
                println!("ok");
            } else {
                println!("NOT FOUND");
                let available = printer::list_printers().await?;
                println!("Available queues: {}", available.join(", "));
            }
        }
        None => println!("Printer ... none configured"),
    }
    Ok(())
}

fn show_config(store: &ConfigStore) -> anyhow::Result<()> {
    match store.load_credentials() {
        Ok(credentials) => {
            let key_preview: String = credentials.api_key.chars().take(8).collect();
            println!("Server:   {}", credentials.server_url);
            println!("Agent ID: {}", credentials.agent_id);
            println!("API key:  {}…", key_preview);
        }
        Err(e) => println!("Credentials: {}", e),
    }

    let settings = store.load_settings()?;
    println!("Printer:       {}", settings.printer_name.as_deref().unwrap_or("<none>"));
    println!("Poll interval: {}s", settings.poll_interval);
    println!("Label format:  {}", settings.label_format);
    println!("Log level:     {}", settings.log_level);
    println!("Config ver:    {}", settings.config_version);
    Ok(())
}
