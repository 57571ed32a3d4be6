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

//! Connect worker: one outbound attempt to a peer address.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::manager::SppManager;
use super::worker::{WorkerId, WorkerOutcome};
use crate::transport::Transport;

/// Run one connect attempt and report its outcome.
pub(crate) async fn run<T: Transport>(
    manager: Arc<SppManager<T>>,
    id: WorkerId,
    cancel: CancellationToken,
    peer: String,
) {
    info!("[{}] Connecting to {}", id, peer);
    let outcome = connect_once(manager.transport(), &peer, &cancel).await;
    debug!("[{}] Connect worker finished: {:?}", id, outcome);
    manager.report(id, outcome);
}

async fn connect_once<T: Transport>(
    transport: &T,
    peer: &str,
    cancel: &CancellationToken,
) -> WorkerOutcome<T::Endpoint> {
    // Dropping the connect future on cancellation closes any half-open socket.
    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => return WorkerOutcome::Cancelled,
        result = transport.connect(peer) => result,
    };

    match result {
        Ok(_) if cancel.is_cancelled() => WorkerOutcome::Cancelled,
        Ok(link) => WorkerOutcome::Accepted(link),
        Err(e) => WorkerOutcome::Failed(format!("connect to {} failed: {}", peer, e)),
    }
}
