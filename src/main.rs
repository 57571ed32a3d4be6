// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! spp-link console application

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use spp_link::commands::{self, ConsoleCommand, Flow};
use spp_link::config::{Config, TransportKind};
use spp_link::events::EventProcessor;
use spp_link::radio::{RadioObserver, RadioState};
use spp_link::spp::{ChannelListener, SppManager};
use spp_link::state::AppState;
use spp_link::transport::{TcpTransport, Transport};

/// Serial link console.
#[derive(Debug, Parser)]
#[command(name = "spp-link", version, about)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Transport to use, overriding the configuration.
    #[arg(short, long, value_enum)]
    transport: Option<TransportKind>,

    /// Peer to connect to right after start.
    #[arg(long)]
    connect: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(kind) = cli.transport {
        config.transport.kind = kind;
    }

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    println!("spp-link v{}", spp_link::VERSION);
    info!("Configuration loaded, transport: {:?}", config.transport.kind);

    match config.transport.kind {
        TransportKind::Tcp => {
            let transport = TcpTransport::new(config.transport.tcp_bind);
            println!("Listening on {}", transport.bind_addr());
            run(transport, &config, cli.connect, None).await
        }
        TransportKind::Rfcomm => run_rfcomm(&config, cli.connect).await,
    }
}

#[cfg(feature = "rfcomm")]
async fn run_rfcomm(config: &Config, connect: Option<String>) -> Result<()> {
    use spp_link::transport::RfcommTransport;

    let transport = RfcommTransport::open(config.transport.rfcomm_channel).await?;
    if let Some(name) = &config.transport.device_name {
        transport.set_name(name).await?;
    }
    println!("Local address: {}", transport.address().await?);

    let paired = transport.paired_devices().await?;
    if paired.is_empty() {
        println!("No paired devices");
    } else {
        println!("Paired devices:");
        for device in &paired {
            println!("  {}  {}", device.address, device.name);
        }
    }

    let radio = transport.watch_power().await?;
    run(transport, config, connect, Some(radio)).await
}

#[cfg(not(feature = "rfcomm"))]
async fn run_rfcomm(_config: &Config, _connect: Option<String>) -> Result<()> {
    anyhow::bail!("RFCOMM support not compiled in; rebuild with --features rfcomm")
}

/// Drive the link from the console until quit or Ctrl+C.
async fn run<T: Transport>(
    transport: T,
    config: &Config,
    connect: Option<String>,
    radio: Option<mpsc::Receiver<RadioState>>,
) -> Result<()> {
    let manager = SppManager::new(transport, config.link.clone());
    let state = AppState::new();

    let (listener, events) = ChannelListener::new();
    manager.register_listener(listener);

    let processor = EventProcessor::new(manager.clone(), state.clone(), std::io::stdout())
        .with_greeting(config.console.greet_on_connect);
    tokio::spawn(processor.run(events));

    if let Some(radio) = radio {
        tokio::spawn(RadioObserver::new(manager.clone()).run(radio));
    }

    manager.start();
    if let Some(peer) = connect {
        manager.connect(&peer);
    }

    info!("Ready. Type /help for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut out = std::io::stdout();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("Console input closed");
                    break;
                };
                match commands::execute(ConsoleCommand::parse(&line), &manager, &mut out).await {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Quit) => break,
                    Err(e) => error!("Console error: {}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    manager.stop();
    info!(
        "spp-link stopped after receiving {} bytes",
        state.get_bytes_received()
    );
    Ok(())
}
