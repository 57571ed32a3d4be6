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

//! Bluetooth RFCOMM (Serial Port Profile) transport on BlueZ.

use std::future::Future;
use std::io;

use anyhow::Result;
use bluer::rfcomm::{Listener, SocketAddr, Stream};
use bluer::{Adapter, AdapterEvent, AdapterProperty, Address};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{invalid_address, Acceptor, Link, Transport};
use crate::radio::RadioState;

/// Default RFCOMM channel to use.
pub const DEFAULT_RFCOMM_CHANNEL: u8 = 1;

/// Transport over RFCOMM sockets of the default Bluetooth adapter.
#[derive(Clone)]
pub struct RfcommTransport {
    adapter: Adapter,
    channel: u8,
}

impl RfcommTransport {
    /// Open the default adapter, power it on and make it reachable.
    pub async fn open(channel: u8) -> Result<Self> {
        info!("Initializing Bluetooth RFCOMM transport...");

        let session = bluer::Session::new().await?;
        info!("BlueZ session created");

        let adapter = session.default_adapter().await?;
        info!("Using Bluetooth adapter: {}", adapter.name());

        if !adapter.is_powered().await? {
            info!("Powering on Bluetooth adapter...");
            adapter.set_powered(true).await?;
        }

        let transport = Self { adapter, channel };
        transport.make_discoverable().await?;
        Ok(transport)
    }

    /// Make the adapter discoverable and pairable.
    pub async fn make_discoverable(&self) -> Result<()> {
        self.adapter.set_discoverable(true).await?;
        self.adapter.set_pairable(true).await?;
        info!("Adapter is discoverable and pairable");
        Ok(())
    }

    /// Get the adapter address.
    pub async fn address(&self) -> Result<Address> {
        Ok(self.adapter.address().await?)
    }

    /// Set the name other devices see.
    pub async fn set_name(&self, name: &str) -> Result<()> {
        self.adapter.set_alias(name.to_string()).await?;
        info!("Bluetooth name set to: {}", name);
        Ok(())
    }

    /// Get paired devices, for picking a peer to connect to.
    pub async fn paired_devices(&self) -> Result<Vec<PairedDevice>> {
        let mut devices = Vec::new();

        for addr in self.adapter.device_addresses().await? {
            let device = self.adapter.device(addr)?;
            if device.is_paired().await? {
                let name = device.alias().await.unwrap_or_else(|_| addr.to_string());
                devices.push(PairedDevice {
                    address: addr,
                    name,
                });
            }
        }

        Ok(devices)
    }

    /// Follow the adapter's power state.
    ///
    /// Emits [`RadioState::On`] / [`RadioState::Off`] whenever the `Powered`
    /// property changes.
    pub async fn watch_power(&self) -> Result<mpsc::Receiver<RadioState>> {
        let events = self.adapter.events().await?;
        let (state_tx, state_rx) = mpsc::channel(8);

        tokio::spawn(async move {
            futures::pin_mut!(events);
            while let Some(event) = events.next().await {
                if let AdapterEvent::PropertyChanged(AdapterProperty::Powered(powered)) = event {
                    let state = if powered { RadioState::On } else { RadioState::Off };
                    debug!("Adapter power changed: {:?}", state);
                    if state_tx.send(state).await.is_err() {
                        break;
                    }
                }
            }
        });

        Ok(state_rx)
    }

    async fn peer_name(adapter: &Adapter, addr: Address) -> String {
        match adapter.device(addr) {
            Ok(device) => device.alias().await.unwrap_or_else(|_| addr.to_string()),
            Err(_) => addr.to_string(),
        }
    }
}

impl Transport for RfcommTransport {
    type Endpoint = Stream;
    type Acceptor = RfcommAcceptor;

    fn name(&self) -> &'static str {
        "rfcomm"
    }

    fn listen(&self) -> impl Future<Output = io::Result<RfcommAcceptor>> + Send + '_ {
        async move {
            let local_addr = SocketAddr::new(Address::any(), self.channel);
            let listener = Listener::bind(local_addr).await?;
            info!("RFCOMM server listening on channel {}", self.channel);
            Ok(RfcommAcceptor {
                listener,
                adapter: self.adapter.clone(),
            })
        }
    }

    fn connect<'a>(
        &'a self,
        peer: &'a str,
    ) -> impl Future<Output = io::Result<Link<Stream>>> + Send + 'a {
        async move {
            let addr: Address = peer.parse().map_err(|e| invalid_address(peer, e))?;
            debug!("Connecting to {} on channel {}", addr, self.channel);
            let stream = Stream::connect(SocketAddr::new(addr, self.channel)).await?;
            let name = Self::peer_name(&self.adapter, addr).await;
            Ok(Link::new(stream, name))
        }
    }
}

/// Listening handle of an [`RfcommTransport`].
pub struct RfcommAcceptor {
    listener: Listener,
    adapter: Adapter,
}

impl Acceptor for RfcommAcceptor {
    type Endpoint = Stream;

    fn accept(&mut self) -> impl Future<Output = io::Result<Link<Stream>>> + Send + '_ {
        async move {
            let (stream, remote_addr) = self.listener.accept().await?;
            info!("Connection from: {}", remote_addr.addr);
            let name = RfcommTransport::peer_name(&self.adapter, remote_addr.addr).await;
            Ok(Link::new(stream, name))
        }
    }
}

/// A paired Bluetooth device.
#[derive(Debug, Clone)]
pub struct PairedDevice {
    pub address: Address,
    pub name: String,
}
