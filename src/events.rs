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

//! Event processing for the console.

use anyhow::Result;
use chrono::NaiveDateTime;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::spp::{ConnectionState, SppEvent, SppManager};
use crate::state::AppState;
use crate::transport::Transport;

/// Timestamp sent to a peer right after it connects.
pub fn greeting(now: NaiveDateTime) -> String {
    now.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Process link notifications: update state, print notices, greet peers.
pub struct EventProcessor<T: Transport, W: Write> {
    manager: Arc<SppManager<T>>,
    state: Arc<AppState>,
    greet_on_connect: bool,
    out: W,
}

impl<T: Transport, W: Write> EventProcessor<T, W> {
    /// Create a new event processor writing notices to `out`.
    pub fn new(manager: Arc<SppManager<T>>, state: Arc<AppState>, out: W) -> Self {
        Self {
            manager,
            state,
            greet_on_connect: false,
            out,
        }
    }

    /// Send the local time to every peer that connects.
    pub fn with_greeting(mut self, enabled: bool) -> Self {
        self.greet_on_connect = enabled;
        self
    }

    /// Process a single event.
    pub async fn process_event(&mut self, event: SppEvent) -> Result<()> {
        match event {
            SppEvent::StateChanged(new_state) => {
                self.state.set_state(new_state);
                writeln!(self.out, "Status: {}", new_state.as_str())?;
                if new_state == ConnectionState::Connected && self.greet_on_connect {
                    self.send_greeting().await;
                }
            }
            SppEvent::RemoteDeviceConnected(peer) => {
                info!("Device connected: {}", peer);
                writeln!(self.out, "Connection to {} Successful", peer)?;
                self.state.set_connected_device(peer);
            }
            SppEvent::DataReceived(data) => {
                debug!("Processing {} received bytes", data.len());
                self.state.record_received(&data);
                let sender = self
                    .state
                    .get_device_name()
                    .unwrap_or_else(|| "peer".to_string());
                let text = String::from_utf8_lossy(&data);
                writeln!(self.out, "{}: {}", sender, text.trim_end_matches(['\r', '\n']))?;
            }
            SppEvent::ConnectionLost => {
                warn!("Connection lost");
                writeln!(self.out, "Connection Lost")?;
            }
            SppEvent::ConnectionFailed => {
                warn!("Connection failed");
                writeln!(self.out, "Connection Failed")?;
            }
        }
        self.out.flush()?;
        Ok(())
    }

    /// Drain `events` until the queue closes.
    pub async fn run(mut self, events: async_channel::Receiver<SppEvent>) {
        while let Ok(event) = events.recv().await {
            if let Err(e) = self.process_event(event).await {
                error!("Error processing link event: {}", e);
            }
        }
        debug!("Event queue closed");
    }

    async fn send_greeting(&self) {
        let text = greeting(chrono::Local::now().naive_local());
        if let Err(e) = self.manager.send(text.as_bytes()).await {
            warn!("Failed to send greeting: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LinkConfig;
    use crate::spp::ChannelListener;
    use crate::transport::MemoryTransport;
    use chrono::NaiveDate;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;

    fn processor() -> EventProcessor<MemoryTransport, Vec<u8>> {
        let manager = SppManager::new(MemoryTransport::new(), LinkConfig::default());
        EventProcessor::new(manager, AppState::new(), Vec::new())
    }

    fn output(processor: &EventProcessor<MemoryTransport, Vec<u8>>) -> String {
        String::from_utf8(processor.out.clone()).unwrap()
    }

    #[test]
    fn test_greeting_format() {
        let now = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        assert_eq!(greeting(now), "2024-01-02 03:04:05");
    }

    #[tokio::test]
    async fn test_session_notices() {
        let mut processor = processor();

        processor
            .process_event(SppEvent::StateChanged(ConnectionState::Connected))
            .await
            .unwrap();
        processor
            .process_event(SppEvent::RemoteDeviceConnected("phone".to_string()))
            .await
            .unwrap();
        processor
            .process_event(SppEvent::DataReceived(b"hello\r\n".to_vec()))
            .await
            .unwrap();
        assert_eq!(processor.state.status_line(), "Connected to phone");

        processor.process_event(SppEvent::ConnectionLost).await.unwrap();
        processor
            .process_event(SppEvent::StateChanged(ConnectionState::Listen))
            .await
            .unwrap();

        assert_eq!(
            output(&processor),
            "Status: Connected\n\
             Connection to phone Successful\n\
             phone: hello\n\
             Connection Lost\n\
             Status: Listening...\n"
        );
        assert_eq!(processor.state.get_device_name(), None);
    }

    #[tokio::test]
    async fn test_failed_notice() {
        let mut processor = processor();
        processor.process_event(SppEvent::ConnectionFailed).await.unwrap();
        assert_eq!(output(&processor), "Connection Failed\n");
    }

    #[tokio::test]
    async fn test_greets_connected_peer() {
        let manager = SppManager::new(MemoryTransport::new(), LinkConfig::default());
        let (listener, events) = ChannelListener::new();
        manager.register_listener(listener);

        manager.start();
        let mut remote = manager.transport().dial("phone").unwrap();

        let processor = EventProcessor::new(manager.clone(), AppState::new(), Vec::new())
            .with_greeting(true);
        tokio::spawn(processor.run(events));

        let mut buf = [0u8; 19];
        tokio::time::timeout(Duration::from_secs(2), remote.read_exact(&mut buf))
            .await
            .expect("timed out waiting for greeting")
            .unwrap();
        let text = std::str::from_utf8(&buf).unwrap();
        assert!(NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").is_ok());
    }
}
