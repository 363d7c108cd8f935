use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "hostgate-ctl")]
#[command(about = "Control CLI for a running hostgate", long_about = None)]
struct Cli {
    /// Control interface base URL
    #[arg(short, long, default_value = "http://127.0.0.1:8081")]
    url: String,

    /// Bearer key, if the control interface requires one
    #[arg(short, long, env = "HOSTGATE_CONTROL_KEY")]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Re-read the config file and refresh listener policies
    Reload,
    /// Show version and counts
    Status,
    /// Show each listener's active policy
    Listeners,
    /// Dump the current routing table
    Table,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {key}"))?);
    }

    let base = cli.url.trim_end_matches('/');
    let request = match cli.command {
        Commands::Reload => client.post(format!("{base}/reload")),
        Commands::Status => client.get(format!("{base}/status")),
        Commands::Listeners => client.get(format!("{base}/listeners")),
        Commands::Table => client.get(format!("{base}/routing-table")),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: control interface returned status {status}");
        if let Ok(text) = res.text().await {
            eprintln!("Response: {text}");
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
