//! HealthBridge binary
//!
//! Parses the command line, loads configuration, sets up logging on stderr
//! and hands data commands to the shared router. `mcp serve` runs the tool
//! server on stdin/stdout.

use anyhow::Context;
use clap::Parser;
use healthbridge::cli::{Cli, Commands, McpCommand};
use healthbridge::config::{generate_default_config, Config, LoggingConfig};
use healthbridge::dispatch::{Router, Surface};
use healthbridge::mcp::{tool_descriptors, McpServer};
use healthbridge::store::StoreHandle;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let (config, skipped) = Config::load_default(cli.config.as_deref())?;
    init_logging(&config.logging);
    for e in &skipped {
        tracing::warn!("Skipping config: {}", e);
    }

    if let Commands::Config { output } = &cli.command {
        let content = generate_default_config();
        match output {
            Some(path) => {
                std::fs::write(path, content)
                    .with_context(|| format!("writing {}", path.display()))?;
                eprintln!("Config written to {}", path.display());
            }
            None => print!("{}", content),
        }
        return Ok(());
    }

    let router = Arc::new(Router::new(StoreHandle::new(config.store.clone())));

    if let Commands::Mcp { action } = &cli.command {
        return match action {
            McpCommand::Serve => {
                let server = Arc::new(McpServer::new(router, &config.mcp));
                let stdin = BufReader::new(tokio::io::stdin());
                server.run(stdin, tokio::io::stdout()).await?;
                Ok(())
            }
            McpCommand::Tools => {
                print_tools(cli.json)?;
                Ok(())
            }
        };
    }

    let invocation = cli
        .command
        .invocation()
        .context("command has no matching operation")?;
    let rendered = router
        .dispatch(Surface::Cli, invocation.operation, &invocation.args)
        .await?;

    if cli.json {
        println!("{}", rendered.pretty());
    } else {
        println!("{}", rendered.text);
    }
    Ok(())
}

fn print_tools(json: bool) -> anyhow::Result<()> {
    let tools = tool_descriptors();
    if json {
        println!("{}", serde_json::to_string_pretty(&tools)?);
        return Ok(());
    }

    for tool in &tools {
        let name = tool["name"].as_str().unwrap_or_default();
        let description = tool["description"].as_str().unwrap_or_default();
        println!("{:<24} {}", name, description);
    }
    Ok(())
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("healthbridge={}", logging.level)));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
