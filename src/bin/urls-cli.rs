use std::collections::BTreeMap;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, COOKIE};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "urls-cli")]
#[command(about = "Command-line client for the urls-panel admin API", long_about = None)]
struct Cli {
    #[arg(short, long, env = "URLS_PANEL_URL", default_value = "http://127.0.0.1:8090")]
    url: String,

    #[arg(short, long, env = "URLS_PANEL_API_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check panel status
    Status,
    /// List routes, optionally filtered
    List {
        /// Case-insensitive search over pattern, name and handler
        #[arg(short, long)]
        query: Option<String>,
    },
    /// Routes grouped by namespace
    Grouped,
    /// Route counts and namespaces
    Stats,
    /// Show one route with its test URL
    Detail { pattern: String },
    /// Fire a test request through the panel
    Execute(ProbeArgs),
    /// Print the equivalent curl command
    Curl(ProbeArgs),
}

#[derive(clap::Args)]
struct ProbeArgs {
    url: String,

    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// Extra request header as "Name: value"; repeatable
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    #[arg(short, long)]
    data: Option<String>,

    /// none, session, session_cookie_value, basic, bearer or token
    #[arg(long, default_value = "none")]
    auth_mode: String,

    #[arg(long)]
    auth_value: Option<String>,

    #[arg(long)]
    timeout: Option<u64>,

    /// Session cookie forwarded as the caller's own ("sessionid=...")
    #[arg(long)]
    cookie: Option<String>,
}

impl ProbeArgs {
    fn payload(&self) -> Result<Value, Box<dyn std::error::Error>> {
        let mut headers = BTreeMap::new();
        for raw in &self.headers {
            let (name, value) = raw
                .split_once(':')
                .ok_or_else(|| format!("header '{raw}' must look like 'Name: value'"))?;
            headers.insert(name.trim().to_string(), value.trim().to_string());
        }
        Ok(json!({
            "url": self.url,
            "method": self.method,
            "headers": headers,
            "body": self.data,
            "auth_mode": self.auth_mode,
            "auth_value": self.auth_value,
            "timeout_secs": self.timeout,
        }))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let request = match &cli.command {
        Commands::Status => client.get(format!("{base}/admin/status")),
        Commands::List { query } => {
            let request = client.get(format!("{base}/admin/urls"));
            match query {
                Some(q) => request.query(&[("q", q)]),
                None => request,
            }
        }
        Commands::Grouped => client.get(format!("{base}/admin/urls/grouped")),
        Commands::Stats => client.get(format!("{base}/admin/urls/stats")),
        Commands::Detail { pattern } => client
            .get(format!("{base}/admin/urls/detail"))
            .query(&[("pattern", pattern)]),
        Commands::Execute(args) => {
            if let Some(cookie) = &args.cookie {
                headers.insert(COOKIE, HeaderValue::from_str(cookie)?);
            }
            client
                .post(format!("{base}/admin/urls/execute"))
                .json(&args.payload()?)
        }
        Commands::Curl(args) => client
            .post(format!("{base}/admin/urls/curl"))
            .json(&args.payload()?),
    };

    let res = request.headers(headers).send().await?;
    if let Commands::Curl(_) = cli.command {
        return print_command(res).await;
    }
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

async fn print_command(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    if !res.status().is_success() {
        return print_response(res).await;
    }
    let json: Value = res.json().await?;
    println!("{}", json["command"].as_str().unwrap_or_default());
    Ok(())
}
