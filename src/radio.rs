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

//! Radio power observer.
//!
//! Radio off stops the link; radio on starts listening again.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use crate::spp::SppManager;
use crate::transport::Transport;

/// Power state of the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioState {
    On,
    Off,
}

/// Maps radio power changes onto the link manager.
pub struct RadioObserver<T: Transport> {
    manager: Arc<SppManager<T>>,
}

impl<T: Transport> RadioObserver<T> {
    pub fn new(manager: Arc<SppManager<T>>) -> Self {
        Self { manager }
    }

    pub fn on_radio_state(&self, state: RadioState) {
        info!("Radio turned {:?}", state);
        match state {
            RadioState::Off => self.manager.stop(),
            RadioState::On => self.manager.start(),
        }
    }

    /// Apply every state received until the sender goes away.
    pub async fn run(self, mut state_rx: mpsc::Receiver<RadioState>) {
        while let Some(state) = state_rx.recv().await {
            self.on_radio_state(state);
        }
    }
}
