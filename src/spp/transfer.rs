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

//! Transfer worker: owns an open endpoint, reads from it and writes to it.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf};
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::manager::SppManager;
use super::worker::{WorkerId, WorkerOutcome};
use crate::transport::{Endpoint, Transport};

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Write side of an endpoint owned by a transfer worker.
///
/// Cloned out of the manager for the duration of one `send`; the endpoint
/// closes once the read loop has exited and every clone is gone.
#[derive(Clone)]
pub(crate) struct TransferWriter {
    inner: Arc<AsyncMutex<BoxedWriter>>,
}

impl TransferWriter {
    /// Write all of `data` and flush it.
    pub(crate) async fn write(&self, data: &[u8]) -> io::Result<()> {
        let mut writer = self.inner.lock().await;
        writer.write_all(data).await?;
        writer.flush().await
    }
}

/// Split an endpoint into the read half for the loop and a shared writer.
pub(crate) fn split<E: Endpoint>(endpoint: E) -> (ReadHalf<E>, TransferWriter) {
    let (reader, writer) = tokio::io::split(endpoint);
    let writer = TransferWriter {
        inner: Arc::new(AsyncMutex::new(Box::new(writer))),
    };
    (reader, writer)
}

/// Run the read loop until the link breaks or the worker is cancelled.
pub(crate) async fn run<T: Transport>(
    manager: Arc<SppManager<T>>,
    id: WorkerId,
    cancel: CancellationToken,
    reader: ReadHalf<T::Endpoint>,
    buffer_size: usize,
) {
    info!("[{}] Transfer worker started", id);
    let outcome = read_loop(reader, buffer_size, &cancel, |data| {
        manager.deliver_data(id, data)
    })
    .await;
    info!("[{}] Transfer worker finished: {:?}", id, outcome);
    manager.report(id, outcome);
}

/// Read until failure or cancellation, handing each chunk to `deliver`.
///
/// `deliver` returns `false` once this worker has been superseded, which
/// ends the loop as cancelled.
async fn read_loop<R, E, F>(
    mut reader: R,
    buffer_size: usize,
    cancel: &CancellationToken,
    mut deliver: F,
) -> WorkerOutcome<E>
where
    R: AsyncRead + Unpin,
    F: FnMut(&[u8]) -> bool,
{
    let mut buf = vec![0u8; buffer_size];

    loop {
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => return WorkerOutcome::Cancelled,
            read = reader.read(&mut buf) => read,
        };

        match read {
            Ok(0) => {
                info!("Connection closed by remote");
                return WorkerOutcome::Failed("closed by remote".to_string());
            }
            Ok(n) => {
                debug!("Received {} bytes", n);
                if !deliver(&buf[..n]) {
                    return WorkerOutcome::Cancelled;
                }
            }
            Err(_) if cancel.is_cancelled() => return WorkerOutcome::Cancelled,
            Err(e) => return WorkerOutcome::Failed(format!("read error: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_remote_close_is_failure() {
        let (local, remote) = tokio::io::duplex(64);
        drop(remote);

        let outcome: WorkerOutcome<()> =
            read_loop(local, 16, &CancellationToken::new(), |_| true).await;
        assert!(matches!(outcome, WorkerOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_chunks_are_delivered_in_order() {
        let (local, mut remote) = tokio::io::duplex(64);

        let writer = tokio::spawn(async move {
            remote.write_all(b"hello ").await.unwrap();
            remote.write_all(b"serial ").await.unwrap();
            remote.write_all(b"world").await.unwrap();
        });

        let mut received = Vec::new();
        let outcome: WorkerOutcome<()> = read_loop(local, 4, &CancellationToken::new(), |data| {
            received.extend_from_slice(data);
            true
        })
        .await;
        writer.await.unwrap();

        assert!(matches!(outcome, WorkerOutcome::Failed(_)));
        assert_eq!(received, b"hello serial world");
    }

    #[tokio::test]
    async fn test_cancel_is_not_failure() {
        let (local, _remote) = tokio::io::duplex(64);
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let outcome: WorkerOutcome<()> = read_loop(local, 16, &cancel, |_| true).await;
        assert!(matches!(outcome, WorkerOutcome::Cancelled));
    }

    #[tokio::test]
    async fn test_superseded_worker_stops() {
        let (local, mut remote) = tokio::io::duplex(64);
        remote.write_all(b"late").await.unwrap();

        let outcome: WorkerOutcome<()> =
            read_loop(local, 16, &CancellationToken::new(), |_| false).await;
        assert!(matches!(outcome, WorkerOutcome::Cancelled));
    }

    #[tokio::test]
    async fn test_writer_reaches_remote() {
        let (local, mut remote) = tokio::io::duplex(64);
        let (_reader, writer) = split(local);

        writer.write(b"ping").await.unwrap();

        let mut buf = [0u8; 4];
        remote.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
    }
}
