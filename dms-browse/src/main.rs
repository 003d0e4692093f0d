mod config;
mod shell;

use std::sync::Arc;

use anyhow::Context;
use dms_core::DmsClient;
use uuid::Uuid;

use crate::config::BrowseConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CliMode {
    Run { folder: Option<Uuid> },
    Help,
}

fn parse_cli_mode<I>(args: I) -> anyhow::Result<CliMode>
where
    I: IntoIterator<Item = String>,
{
    let mut folder = None;
    let mut args = args.into_iter().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(CliMode::Help),
            "--folder" => {
                let value = args.next().context("--folder expects a folder id")?;
                folder = Some(
                    Uuid::parse_str(&value)
                        .with_context(|| format!("invalid folder id: {value}"))?,
                );
            }
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }
    Ok(CliMode::Run { folder })
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let folder = match parse_cli_mode(std::env::args())? {
        CliMode::Help => {
            println!("Usage: dms-browse [--folder <id>]");
            println!("  --folder <id>   Start in the given folder instead of the root");
            println!();
            println!("Reads DMS_API_URL and DMS_TOKEN from the environment or .env");
            return Ok(());
        }
        CliMode::Run { folder } => folder,
    };
    init_tracing();

    let config = BrowseConfig::from_env()?;
    tracing::debug!(?config, "starting browser");
    let client = DmsClient::with_base_url(&config.api_url, config.token.clone())
        .with_context(|| format!("invalid DMS_API_URL: {}", config.api_url))?;
    let (handle, events) = dms_view::spawn(Arc::new(client), config.view.clone());
    shell::run(handle, events, folder, config.view.allow_duplicate_names).await
}
