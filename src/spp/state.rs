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

//! Connection state of the link manager.

use std::fmt;

/// State of the serial link.
///
/// Exactly one state holds at a time; it is owned by the
/// [`SppManager`](super::SppManager) and only changes under its lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Idle, no worker running.
    #[default]
    None,
    /// Waiting for an inbound peer.
    Listen,
    /// Outbound attempt in progress.
    Connecting,
    /// Transfer worker active.
    Connected,
}

impl ConnectionState {
    /// Status line shown to the user.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::None => "Not Connected",
            ConnectionState::Listen => "Listening...",
            ConnectionState::Connecting => "Connecting...",
            ConnectionState::Connected => "Connected",
        }
    }

    pub fn is_connected(&self) -> bool {
        *self == ConnectionState::Connected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::None => "NONE",
            ConnectionState::Listen => "LISTEN",
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Connected => "CONNECTED",
        };
        f.write_str(name)
    }
}
