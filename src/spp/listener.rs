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

//! Notifications emitted by the link manager.

use std::sync::Arc;

use tracing::debug;

use super::state::ConnectionState;

/// Receiver of link notifications.
///
/// All methods are fire-and-forget and are called from the manager's
/// dispatcher task, one at a time, in the order the events occurred.
/// Implementations that drive a UI should hand the work off to their own
/// thread rather than block here.
pub trait SppListener: Send + Sync {
    /// The link moved to a new state.
    fn on_state_changed(&self, _state: ConnectionState) {}

    /// A peer was accepted or connected; `peer` is its identity.
    fn on_remote_device_connected(&self, _peer: &str) {}

    /// Bytes arrived from the peer.
    fn on_data_received(&self, _data: &[u8]) {}

    /// An established link terminated unexpectedly.
    fn on_connection_lost(&self) {}

    /// An outbound attempt did not succeed.
    fn on_connection_failed(&self) {}
}

/// A single notification, as queued between workers and the listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SppEvent {
    /// State changed.
    StateChanged(ConnectionState),
    /// Remote peer identified.
    RemoteDeviceConnected(String),
    /// Data received from the peer.
    DataReceived(Vec<u8>),
    /// Established link lost.
    ConnectionLost,
    /// Outbound attempt failed.
    ConnectionFailed,
}

impl SppEvent {
    /// Deliver this event to a listener.
    pub fn dispatch(&self, listener: &dyn SppListener) {
        match self {
            SppEvent::StateChanged(state) => listener.on_state_changed(*state),
            SppEvent::RemoteDeviceConnected(peer) => listener.on_remote_device_connected(peer),
            SppEvent::DataReceived(data) => listener.on_data_received(data),
            SppEvent::ConnectionLost => listener.on_connection_lost(),
            SppEvent::ConnectionFailed => listener.on_connection_failed(),
        }
    }
}

/// Listener that forwards every notification into a queue.
///
/// The consumer drains the receiver on its own schedule, from async code with
/// `recv().await` or from a plain thread with `recv_blocking()`.
pub struct ChannelListener {
    event_tx: async_channel::Sender<SppEvent>,
}

impl ChannelListener {
    /// Create a listener and the receiving end of its queue.
    pub fn new() -> (Arc<Self>, async_channel::Receiver<SppEvent>) {
        let (event_tx, event_rx) = async_channel::unbounded();
        (Arc::new(Self { event_tx }), event_rx)
    }

    fn forward(&self, event: SppEvent) {
        if self.event_tx.try_send(event).is_err() {
            debug!("Event receiver dropped, discarding notification");
        }
    }
}

impl SppListener for ChannelListener {
    fn on_state_changed(&self, state: ConnectionState) {
        self.forward(SppEvent::StateChanged(state));
    }

    fn on_remote_device_connected(&self, peer: &str) {
        self.forward(SppEvent::RemoteDeviceConnected(peer.to_string()));
    }

    fn on_data_received(&self, data: &[u8]) {
        self.forward(SppEvent::DataReceived(data.to_vec()));
    }

    fn on_connection_lost(&self) {
        self.forward(SppEvent::ConnectionLost);
    }

    fn on_connection_failed(&self) {
        self.forward(SppEvent::ConnectionFailed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_listener_preserves_order() {
        let (listener, rx) = ChannelListener::new();

        let events = vec![
            SppEvent::StateChanged(ConnectionState::Connected),
            SppEvent::RemoteDeviceConnected("00:11:22:33:44:55".to_string()),
            SppEvent::DataReceived(b"hello".to_vec()),
            SppEvent::ConnectionLost,
            SppEvent::StateChanged(ConnectionState::Listen),
        ];
        for event in &events {
            event.dispatch(listener.as_ref());
        }

        let received: Vec<SppEvent> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(received, events);
    }

    #[test]
    fn test_dropped_receiver_is_ignored() {
        let (listener, rx) = ChannelListener::new();
        drop(rx);
        listener.on_connection_failed();
    }

    #[test]
    fn test_default_methods_are_noops() {
        struct Quiet;
        impl SppListener for Quiet {}

        SppEvent::DataReceived(vec![1, 2, 3]).dispatch(&Quiet);
        SppEvent::ConnectionFailed.dispatch(&Quiet);
    }
}
