//! Hartrace CLI

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use hartrace::config::Config;
use hartrace::network::{HttpClient, ProxyServer};
use hartrace::proxy::HttpProxy;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,hartrace=debug";

#[tokio::main]
async fn main() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        eprintln!("Hartrace v{}", env!("CARGO_PKG_VERSION"));
        eprintln!();
        eprintln!("Usage: hartrace <command> <config.toml>");
        eprintln!();
        eprintln!("Commands:");
        eprintln!("  record    Start the recording proxy, export on Ctrl-C");
        eprintln!("  validate  Check a configuration file");
        process::exit(1);
    }

    let command = &args[1];
    let config_path = PathBuf::from(&args[2]);

    let result = match command.as_str() {
        "record" => record(&config_path).await,
        "validate" => validate(&config_path),
        _ => {
            eprintln!("Unknown command: {command}");
            eprintln!("Run 'hartrace' for usage information.");
            process::exit(1);
        }
    };

    if let Err(e) = result {
        error!("{e:#}");
        process::exit(1);
    }
}

fn load_config(path: &Path) -> Result<Config> {
    Config::from_file(path).with_context(|| format!("Failed to load config from {}", path.display()))
}

fn validate(path: &Path) -> Result<()> {
    let config = load_config(path)?;

    println!("Configuration OK: {}", path.display());
    println!("  listen port:  {}", config.listen_port);
    println!("  origin:       {}", config.recorder.origin);
    println!(
        "  upstream:     {}",
        config.upstream.as_deref().unwrap_or("(absolute URLs only)")
    );
    println!("  responders:   {}", config.responders.len());
    println!("  excluded:     {}", config.filter.exclude.join(", "));
    Ok(())
}

async fn record(path: &Path) -> Result<()> {
    let config = load_config(path)?;

    let client = HttpClient::new(config.upstream.clone(), config.limits.max_body_size);
    let proxy = HttpProxy::new(&config, client);
    let server = ProxyServer::new(proxy, &config.limits);

    let listener = TcpListener::bind(("0.0.0.0", config.listen_port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.listen_port))?;

    let shutdown_tx = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received SIGINT, shutting down");
            let _ = shutdown_tx.send(());
        }
    });

    server.run(listener).await.context("Proxy server failed")?;

    if let Some(dir) = &config.export_dir {
        let export = server
            .proxy()
            .export()
            .await
            .context("Failed to export session")?;
        let written = export
            .write_to(dir)
            .with_context(|| format!("Failed to write archive to {}", dir.display()))?;
        println!("Archive written: {}", written.display());
    }

    Ok(())
}
