use color_eyre::{eyre::eyre, Result};
use multisense_kart::command::UdpCommandChannel;
use multisense_kart::config::AppConfig;
use multisense_kart::controller::ControllerHandle;
use multisense_kart::relay::Relay;
use multisense_kart::server::{InputServer, KeyboardExecutor};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

const USAGE: &str = "usage: multisense-kart [serve|relay]";

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = setup_config().await?;

    match std::env::args().nth(1).as_deref() {
        None | Some("serve") => serve(config).await,
        Some("relay") => relay(config).await,
        Some(other) => Err(eyre!("Unknown mode {:?}, {}", other, USAGE)),
    }
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

async fn setup_config() -> Result<AppConfig> {
    match AppConfig::ensure_default_config().await {
        Ok(path) => AppConfig::load_from(&path).await,
        Err(e) => {
            warn!("No usable config location ({}), using defaults", e);
            Ok(AppConfig::default())
        }
    }
}

/// Input server with the keyboard executor, until STOPSERVEUR or Ctrl-C
async fn serve(config: AppConfig) -> Result<()> {
    let executor = Arc::new(KeyboardExecutor::new());
    let server = InputServer::bind(&config.network.input_server, executor).await?;

    let token = server.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, stopping input server");
            token.cancel();
        }
    });

    let stats = server.run().await?;
    info!("Served {} commands", stats.executed);
    Ok(())
}

/// Readings from stdin, commands to the configured destination
async fn relay(config: AppConfig) -> Result<()> {
    let channel = UdpCommandChannel::connect(config.network.destination).await?;
    let mut controller = ControllerHandle::spawn(config, Arc::new(channel))?;
    let mut relay = Relay::new(&mut controller);

    info!("Relaying readings from stdin");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, stopping relay");
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => relay.on_line(&line),
                Ok(None) => {
                    info!("End of input");
                    break;
                }
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    }

    relay.reset();
    for (name, stats) in controller.loop_stats() {
        info!(
            "{}: {} ticks, {} late, max lag {:?}",
            name, stats.ticks, stats.late_ticks, stats.max_lag
        );
    }
    controller.shutdown().await?;
    Ok(())
}
