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

//! TCP transport.
//!
//! Peer addresses are `host:port` strings; the listening side binds the
//! configured address every time the manager re-arms.

use std::future::Future;
use std::io;
use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

use super::{invalid_address, Acceptor, Link, Transport};

/// Transport over plain TCP sockets.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    bind_addr: SocketAddr,
}

impl TcpTransport {
    /// Create a transport that listens on `bind_addr`.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self { bind_addr }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }
}

impl Transport for TcpTransport {
    type Endpoint = TcpStream;
    type Acceptor = TcpAcceptor;

    fn name(&self) -> &'static str {
        "tcp"
    }

    fn listen(&self) -> impl Future<Output = io::Result<TcpAcceptor>> + Send + '_ {
        async move {
            let listener = TcpListener::bind(self.bind_addr).await?;
            info!("TCP listener bound on {}", listener.local_addr()?);
            Ok(TcpAcceptor { listener })
        }
    }

    fn connect<'a>(
        &'a self,
        peer: &'a str,
    ) -> impl Future<Output = io::Result<Link<TcpStream>>> + Send + 'a {
        async move {
            let addr: SocketAddr = peer.parse().map_err(|e| invalid_address(peer, e))?;
            debug!("Connecting to {}", addr);
            let stream = TcpStream::connect(addr).await?;
            stream.set_nodelay(true)?;
            Ok(Link::new(stream, addr.to_string()))
        }
    }
}

/// Listening handle of a [`TcpTransport`].
pub struct TcpAcceptor {
    listener: TcpListener,
}

impl TcpAcceptor {
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Acceptor for TcpAcceptor {
    type Endpoint = TcpStream;

    fn accept(&mut self) -> impl Future<Output = io::Result<Link<TcpStream>>> + Send + '_ {
        async move {
            let (stream, remote_addr) = self.listener.accept().await?;
            stream.set_nodelay(true)?;
            Ok(Link::new(stream, remote_addr.to_string()))
        }
    }
}
