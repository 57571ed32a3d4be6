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

//! Application state management.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::spp::ConnectionState;

/// Shared console state, updated from link notifications.
#[derive(Debug)]
pub struct AppState {
    /// Last state reported by the link.
    pub connection_state: RwLock<ConnectionState>,

    /// Connected device name.
    pub connected_device: RwLock<Option<String>>,

    /// Last received data, decoded lossily.
    pub last_received: RwLock<Option<String>>,

    /// Number of bytes received over the lifetime of the process.
    pub bytes_received: RwLock<u64>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            connection_state: RwLock::new(ConnectionState::None),
            connected_device: RwLock::new(None),
            last_received: RwLock::new(None),
            bytes_received: RwLock::new(0),
        }
    }
}

impl AppState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_state(&self, state: ConnectionState) {
        *self.connection_state.write() = state;
        if !state.is_connected() {
            *self.connected_device.write() = None;
        }
    }

    pub fn set_connected_device(&self, device_name: String) {
        *self.connected_device.write() = Some(device_name);
    }

    pub fn get_state(&self) -> ConnectionState {
        *self.connection_state.read()
    }

    pub fn is_connected(&self) -> bool {
        self.get_state().is_connected()
    }

    pub fn get_device_name(&self) -> Option<String> {
        self.connected_device.read().clone()
    }

    pub fn record_received(&self, data: &[u8]) {
        *self.bytes_received.write() += data.len() as u64;
        *self.last_received.write() = Some(String::from_utf8_lossy(data).into_owned());
    }

    pub fn get_last_received(&self) -> Option<String> {
        self.last_received.read().clone()
    }

    pub fn get_bytes_received(&self) -> u64 {
        *self.bytes_received.read()
    }

    /// Status line shown by the console.
    pub fn status_line(&self) -> String {
        match self.get_device_name() {
            Some(device) if self.is_connected() => {
                format!("{} to {}", self.get_state().as_str(), device)
            }
            _ => self.get_state().as_str().to_string(),
        }
    }
}
