use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use compute_balancer::control::{ControlClient, ControlCommand};

#[derive(Parser)]
#[command(name = "lb-cli")]
#[command(about = "Management CLI for the compute balancer", long_about = None)]
struct Cli {
    /// Admin API base URL
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Control-plane address
    #[arg(short, long, default_value = "127.0.0.1:9090")]
    control: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Balancer totals, algorithm and cached health
    Status,
    /// List registered backends
    Servers,
    /// Backend health (live unless --cached)
    Health {
        #[arg(long)]
        cached: bool,
        /// Probe a single backend
        #[arg(long)]
        id: Option<String>,
    },
    /// Switch the selection algorithm
    Algorithm { name: String },
    /// Show current configuration
    Config,
    /// Forward one packet
    Forward {
        #[arg(long)]
        target: Option<String>,
        #[arg(long)]
        cpu: Option<u32>,
        #[arg(long)]
        ram: Option<u32>,
        #[arg(long = "time-ms")]
        time_ms: Option<u64>,
        #[arg(long)]
        payload: Option<String>,
    },
    /// Talk to the TCP control plane
    Control {
        #[command(subcommand)]
        action: ControlAction,
    },
}

#[derive(Subcommand)]
enum ControlAction {
    Ping,
    Status,
    Open { server_url: String },
    Close { server_url: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::builder().no_proxy().build()?;
    let api = format!("{}/api/lb", cli.url.trim_end_matches('/'));

    match cli.command {
        Commands::Status => {
            print_response(client.get(format!("{api}/status")).send().await?).await?;
        }
        Commands::Servers => {
            print_response(client.get(format!("{api}/servers")).send().await?).await?;
        }
        Commands::Health { cached, id } => {
            let url = match (id, cached) {
                (Some(id), _) => format!("{api}/server/health/{id}"),
                (None, true) => format!("{api}/server/healths/cached"),
                (None, false) => format!("{api}/server/healths"),
            };
            print_response(client.get(url).send().await?).await?;
        }
        Commands::Algorithm { name } => {
            let res = client
                .post(format!("{api}/config/algorithm"))
                .query(&[("algorithm", name)])
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Config => {
            print_response(client.get(format!("{api}/config")).send().await?).await?;
        }
        Commands::Forward { target, cpu, ram, time_ms, payload } => {
            let body = json!({
                "targetServerId": target,
                "cpuIntensity": cpu,
                "ramIntensity": ram,
                "processingTimeMs": time_ms,
                "payload": payload,
            });
            print_response(client.post(format!("{api}/forward")).json(&body).send().await?).await?;
        }
        Commands::Control { action } => {
            let command = match action {
                ControlAction::Ping => ControlCommand::ping(),
                ControlAction::Status => ControlCommand::get_status(),
                ControlAction::Open { server_url } => ControlCommand::open(server_url),
                ControlAction::Close { server_url } => ControlCommand::close(server_url),
            };
            let mut control = ControlClient::connect(&cli.control, Duration::from_secs(5)).await?;
            let response = control.send(&command).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
