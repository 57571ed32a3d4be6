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

//! Console command module.
//!
//! Maps typed lines to link operations.

use anyhow::Result;
use std::io::Write;
use std::sync::Arc;
use tracing::debug;

use crate::spp::SppManager;
use crate::transport::Transport;

pub const HELP: &str = "\
Commands:
  /connect <peer>  connect to a peer
  /disconnect      drop the connected peer and listen again
  /start           start listening
  /stop            stop everything
  /state           show the link state
  /help            show this help
  /quit            exit
Any other line is sent to the connected peer.";

/// Console command types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Connect to a peer.
    Connect(String),
    /// Disconnect from the current peer.
    Disconnect,
    /// Start listening.
    Start,
    /// Stop the link.
    Stop,
    /// Print the link state.
    Status,
    /// Print usage.
    Help,
    /// Exit the console.
    Quit,
    /// Send a line to the peer.
    Send(String),
    /// Blank line, nothing to do.
    Empty,
    /// Unrecognized slash command.
    Unknown(String),
}

impl ConsoleCommand {
    /// Parse one console line.
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return Self::Empty;
        }

        let Some(rest) = line.strip_prefix('/') else {
            return Self::Send(line.to_string());
        };

        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default().to_lowercase();
        let arg = parts.next();

        match (name.as_str(), arg) {
            ("connect", Some(peer)) => Self::Connect(peer.to_string()),
            ("disconnect", _) => Self::Disconnect,
            ("start", _) => Self::Start,
            ("stop", _) => Self::Stop,
            ("state", _) | ("status", _) => Self::Status,
            ("help", _) => Self::Help,
            ("quit", _) | ("exit", _) => Self::Quit,
            _ => Self::Unknown(line.to_string()),
        }
    }
}

/// Whether the console keeps reading after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Execute a console command against the link, writing feedback to `out`.
pub async fn execute<T: Transport, W: Write>(
    command: ConsoleCommand,
    manager: &Arc<SppManager<T>>,
    out: &mut W,
) -> Result<Flow> {
    debug!("Executing command: {:?}", command);

    match command {
        ConsoleCommand::Connect(peer) => {
            if manager.state().is_connected() {
                writeln!(out, "Already connected!")?;
            } else {
                writeln!(out, "Connecting to {}...", peer)?;
                manager.connect(&peer);
            }
        }
        ConsoleCommand::Disconnect => {
            if let Err(e) = manager.disconnect() {
                writeln!(out, "{}", e)?;
            }
        }
        ConsoleCommand::Start => manager.start(),
        ConsoleCommand::Stop => manager.stop(),
        ConsoleCommand::Status => {
            let state = manager.state();
            match manager.remote_peer() {
                Some(peer) if state.is_connected() => writeln!(
                    out,
                    "{} to {} via {}",
                    state.as_str(),
                    peer,
                    manager.transport_name()
                )?,
                _ => writeln!(out, "{}", state.as_str())?,
            }
        }
        ConsoleCommand::Help => writeln!(out, "{}", HELP)?,
        ConsoleCommand::Quit => return Ok(Flow::Quit),
        ConsoleCommand::Send(text) => {
            if !manager.state().is_connected() {
                writeln!(out, "Not connected")?;
            } else if let Err(e) = manager.send(text.as_bytes()).await {
                writeln!(out, "Send failed: {}", e)?;
            }
        }
        ConsoleCommand::Empty => {}
        ConsoleCommand::Unknown(line) => {
            writeln!(out, "Unknown command: {} (try /help)", line)?;
        }
    }
    out.flush()?;
    Ok(Flow::Continue)
}
