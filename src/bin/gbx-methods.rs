//! List every method a dedicated server exposes, with its signatures and
//! help text.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use gbxremote_client::codec::{Value, XmlRpcCodec};
use gbxremote_client::Client;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "gbx-methods")]
#[command(about = "List the RPC methods of a GBXRemote server", long_about = None)]
struct Cli {
    /// Server address
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(long, default_value_t = 5001)]
    port: u16,

    /// Authenticate as this user before listing
    #[arg(long, requires = "password")]
    login: Option<String>,

    /// Password for --login
    #[arg(long)]
    password: Option<String>,

    /// Read timeout in seconds
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    /// Print the catalog as JSON instead of logging it
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut client = Client::builder(cli.host.as_str(), cli.port)
        .read_timeout(Duration::from_secs(cli.timeout))
        .connect(XmlRpcCodec)
        .await
        .with_context(|| format!("Failed to connect to {}:{}", cli.host, cli.port))?;

    if let (Some(login), Some(password)) = (cli.login, cli.password) {
        let params = [Value::from(login), Value::from(password)];
        if let Err(fault) = client.query("Authenticate", &params).await? {
            bail!("Authentication failed: {}", fault);
        }
    }

    let catalog = client.populate_catalog().await?;
    if cli.json {
        println!("{}", catalog.to_json_pretty()?);
    } else {
        for descriptor in catalog.descriptors() {
            info!("{} - {}", descriptor, descriptor.help);
        }
    }

    client.close().await?;
    Ok(())
}
