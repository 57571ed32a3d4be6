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

//! In-process transport built on `tokio::io::duplex` pipes.
//!
//! Simulated remote peers dial in with [`MemoryTransport::dial`] and are
//! queued until a listen worker accepts them. Outbound connects resolve
//! against peers registered with [`MemoryTransport::add_peer`] or
//! [`MemoryTransport::add_unresponsive_peer`].

use std::collections::HashMap;
use std::future::Future;
use std::io;

use parking_lot::Mutex;
use tokio::io::DuplexStream;
use tracing::debug;

use super::{invalid_address, Acceptor, Link, Transport};

const PIPE_CAPACITY: usize = 64 * 1024;

enum RemotePeer {
    /// Accepts connections; the remote half of each pipe is handed out here.
    Accepting(async_channel::Sender<DuplexStream>),
    /// Never answers; a connect to it stays pending until cancelled.
    Unresponsive,
}

/// Loopback transport for tests and simulations.
pub struct MemoryTransport {
    inbound_tx: async_channel::Sender<Link<DuplexStream>>,
    inbound_rx: async_channel::Receiver<Link<DuplexStream>>,
    peers: Mutex<HashMap<String, RemotePeer>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = async_channel::unbounded();
        Self {
            inbound_tx,
            inbound_rx,
            peers: Mutex::new(HashMap::new()),
        }
    }

    /// Simulate a remote peer named `peer` connecting in.
    ///
    /// Returns the remote side of the new endpoint.
    pub fn dial(&self, peer: &str) -> io::Result<DuplexStream> {
        let (local, remote) = tokio::io::duplex(PIPE_CAPACITY);
        self.inbound_tx
            .try_send(Link::new(local, peer))
            .map_err(|_| io::Error::new(io::ErrorKind::ConnectionRefused, "transport closed"))?;
        debug!("Simulated inbound connection from {}", peer);
        Ok(remote)
    }

    /// Register a reachable remote peer.
    ///
    /// Every successful outbound connect to `peer` yields the remote side of
    /// the endpoint on the returned receiver.
    pub fn add_peer(&self, peer: &str) -> async_channel::Receiver<DuplexStream> {
        let (tx, rx) = async_channel::unbounded();
        self.peers
            .lock()
            .insert(peer.to_string(), RemotePeer::Accepting(tx));
        rx
    }

    /// Register a peer whose connect attempts never complete.
    pub fn add_unresponsive_peer(&self, peer: &str) {
        self.peers
            .lock()
            .insert(peer.to_string(), RemotePeer::Unresponsive);
    }

    /// Number of inbound connections not yet accepted.
    pub fn pending_inbound(&self) -> usize {
        self.inbound_rx.len()
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MemoryTransport {
    type Endpoint = DuplexStream;
    type Acceptor = MemoryAcceptor;

    fn name(&self) -> &'static str {
        "memory"
    }

    fn listen(&self) -> impl Future<Output = io::Result<MemoryAcceptor>> + Send + '_ {
        let inbound = self.inbound_rx.clone();
        async move { Ok(MemoryAcceptor { inbound }) }
    }

    fn connect<'a>(
        &'a self,
        peer: &'a str,
    ) -> impl Future<Output = io::Result<Link<DuplexStream>>> + Send + 'a {
        async move {
            let remote_tx = match self.peers.lock().get(peer) {
                Some(RemotePeer::Accepting(tx)) => Some(tx.clone()),
                Some(RemotePeer::Unresponsive) => None,
                None => return Err(invalid_address(peer, "no such peer")),
            };

            let Some(remote_tx) = remote_tx else {
                return std::future::pending::<io::Result<Link<DuplexStream>>>().await;
            };

            let (local, remote) = tokio::io::duplex(PIPE_CAPACITY);
            remote_tx
                .send(remote)
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::ConnectionRefused, "peer gone"))?;
            Ok(Link::new(local, peer))
        }
    }
}

/// Listening handle of a [`MemoryTransport`].
pub struct MemoryAcceptor {
    inbound: async_channel::Receiver<Link<DuplexStream>>,
}

impl Acceptor for MemoryAcceptor {
    type Endpoint = DuplexStream;

    fn accept(&mut self) -> impl Future<Output = io::Result<Link<DuplexStream>>> + Send + '_ {
        async move {
            self.inbound
                .recv()
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "transport closed"))
        }
    }
}
