//! Robot Agent
//!
//! Opens the robot's serial port and serves the operator control page.

mod web_ui;

use anyhow::{Context, Result};
use clap::Parser;
use robobridge_core::{Bridge, BridgeOptions, CommandPolicy, LinkConfig};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Robot Agent - web controller for a serial-attached robot
#[derive(Parser, Debug)]
#[command(name = "robotagent")]
#[command(author = "Robobridge Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Web controller for a line-following robot over serial", long_about = None)]
struct Args {
    /// Serial port (e.g. /dev/ttyACM0 or COM3)
    #[arg(long, env = "ROBOT_SERIAL_PORT", default_value = robobridge_core::DEFAULT_SERIAL_PORT)]
    serial_port: String,

    /// Baud rate
    #[arg(long, env = "ROBOT_BAUD", default_value_t = robobridge_core::DEFAULT_BAUD_RATE)]
    baud: u32,

    /// HTTP listen port
    #[arg(short, long, env = "ROBOT_HTTP_PORT", default_value_t = 8800)]
    port: u16,

    /// HTTP listen address
    #[arg(long, env = "ROBOT_HTTP_HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Wait after opening the port while the board resets (ms)
    #[arg(long, default_value_t = 2000)]
    settle_ms: u64,

    /// Serial reader poll interval (ms)
    #[arg(long, default_value_t = 10)]
    poll_ms: u64,

    /// Keep at most this many undrained responses (oldest dropped)
    #[arg(long)]
    max_responses: Option<usize>,

    /// Refuse command codes other than f, b and s
    #[arg(long, default_value = "false")]
    strict_commands: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn link_config(&self) -> LinkConfig {
        LinkConfig::new(self.serial_port.clone(), self.baud)
            .with_settle_delay(Duration::from_millis(self.settle_ms))
    }

    fn bridge_options(&self) -> BridgeOptions {
        BridgeOptions {
            poll_interval: Duration::from_millis(self.poll_ms),
            max_responses: self.max_responses,
            policy: if self.strict_commands {
                CommandPolicy::Reject
            } else {
                CommandPolicy::PassThrough
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    setup_logging(&args.log_level)?;

    info!("Starting Robot Agent v{}", env!("CARGO_PKG_VERSION"));
    info!("Opening {} at {} baud", args.serial_port, args.baud);

    // Connection failure is fatal: no reader, no web server
    let bridge = Bridge::connect(args.link_config(), args.bridge_options())
        .await
        .with_context(|| format!("Failed to connect to robot on {}", args.serial_port))?;
    let bridge = Arc::new(bridge);

    let bind_addr = SocketAddr::new(args.host, args.port);
    let web_server = web_ui::WebServer::new(bridge.clone());
    let (web_addr, server_handle) = web_server
        .start(bind_addr)
        .await
        .context("Failed to start web server")?;

    println!("============================================");
    println!("Robot controller: http://{}", web_addr);
    println!("Serial: {} @ {} baud", args.serial_port, args.baud);
    println!("============================================");

    let outcome = tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
            Ok(())
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
            Ok(())
        }
        result = server_handle => {
            match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => {
                    error!("Web server error: {:#}", e);
                    Err(e)
                }
                Err(e) => Err(anyhow::Error::new(e).context("Web server task failed")),
            }
        }
    };

    // Always leave the robot stopped
    bridge.shutdown().await;
    info!("Shutdown complete");
    outcome
}

/// Setup logging with tracing
fn setup_logging(level: &str) -> Result<()> {
    let log_level = level.parse::<Level>().unwrap_or(Level::INFO);

    let filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

/// Resolves on SIGTERM (never on non-unix targets)
#[cfg(unix)]
async fn terminate() {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!("Failed to setup SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
