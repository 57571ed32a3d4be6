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

//! Listen worker: waits for one inbound peer.

use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::manager::SppManager;
use super::worker::{WorkerId, WorkerOutcome};
use crate::transport::{Acceptor, Transport};

/// Run one listen attempt and report its outcome.
pub(crate) async fn run<T: Transport>(
    manager: Arc<SppManager<T>>,
    id: WorkerId,
    cancel: CancellationToken,
) {
    info!("[{}] Waiting for connections...", id);
    let outcome = accept_one(manager.transport(), manager.listen_gate(), &cancel).await;
    debug!("[{}] Listen worker finished: {:?}", id, outcome);
    manager.report(id, outcome);
}

/// Accept one peer.
///
/// `gate` is taken before binding and released only after the acceptor is
/// dropped, so a replacement worker never binds while this one still holds
/// the address or channel.
async fn accept_one<T: Transport>(
    transport: &T,
    gate: Arc<AsyncMutex<()>>,
    cancel: &CancellationToken,
) -> WorkerOutcome<T::Endpoint> {
    // Declared before the acceptor so it is released after it on every path.
    let _gate = tokio::select! {
        biased;
        _ = cancel.cancelled() => return WorkerOutcome::Cancelled,
        guard = gate.lock_owned() => guard,
    };

    let mut acceptor = tokio::select! {
        biased;
        _ = cancel.cancelled() => return WorkerOutcome::Cancelled,
        result = transport.listen() => match result {
            Ok(acceptor) => acceptor,
            Err(e) => return WorkerOutcome::Failed(format!("listen failed: {}", e)),
        },
    };

    let accepted = tokio::select! {
        biased;
        _ = cancel.cancelled() => return WorkerOutcome::Cancelled,
        result = acceptor.accept() => result,
    };

    // Only one peer at a time; stop listening as soon as one is in.
    drop(acceptor);

    match accepted {
        // An endpoint that raced with cancellation is closed here.
        Ok(_) if cancel.is_cancelled() => WorkerOutcome::Cancelled,
        Ok(link) => WorkerOutcome::Accepted(link),
        Err(_) if cancel.is_cancelled() => WorkerOutcome::Cancelled,
        Err(e) => WorkerOutcome::Failed(format!("accept failed: {}", e)),
    }
}
