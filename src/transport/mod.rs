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

//! Stream transports the link manager runs over.
//!
//! A transport hands out connection endpoints, either by passively accepting
//! one ([`Transport::listen`] then [`Acceptor::accept`]) or by actively
//! connecting to a peer address ([`Transport::connect`]). An endpoint is any
//! bidirectional byte stream.

use std::future::Future;
use std::io;

use tokio::io::{AsyncRead, AsyncWrite};

pub mod memory;
#[cfg(feature = "rfcomm")]
pub mod rfcomm;
pub mod tcp;

pub use memory::MemoryTransport;
#[cfg(feature = "rfcomm")]
pub use rfcomm::RfcommTransport;
pub use tcp::TcpTransport;

/// An established bidirectional byte stream to one peer.
pub trait Endpoint: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> Endpoint for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// An endpoint together with the identity of the peer on the other end.
#[derive(Debug)]
pub struct Link<E> {
    pub endpoint: E,
    pub peer: String,
}

impl<E> Link<E> {
    pub fn new(endpoint: E, peer: impl Into<String>) -> Self {
        Self {
            endpoint,
            peer: peer.into(),
        }
    }
}

/// A passive listening handle.
///
/// Dropping the acceptor closes the listening socket. Dropping a pending
/// `accept()` future aborts the accept without losing a queued endpoint.
pub trait Acceptor: Send + 'static {
    type Endpoint: Endpoint;

    /// Wait for one inbound endpoint.
    fn accept(&mut self) -> impl Future<Output = io::Result<Link<Self::Endpoint>>> + Send + '_;
}

/// Factory for inbound and outbound endpoints.
pub trait Transport: Send + Sync + 'static {
    type Endpoint: Endpoint;
    type Acceptor: Acceptor<Endpoint = Self::Endpoint>;

    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Open a listening handle.
    fn listen(&self) -> impl Future<Output = io::Result<Self::Acceptor>> + Send + '_;

    /// Open one outbound endpoint to `peer`.
    ///
    /// An address the transport cannot parse fails immediately with
    /// [`io::ErrorKind::InvalidInput`]. No timeout is applied beyond the one
    /// the transport itself enforces.
    fn connect<'a>(
        &'a self,
        peer: &'a str,
    ) -> impl Future<Output = io::Result<Link<Self::Endpoint>>> + Send + 'a;
}

pub(crate) fn invalid_address(peer: &str, reason: impl std::fmt::Display) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("invalid peer address '{}': {}", peer, reason),
    )
}
