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

//! The link manager.
//!
//! Owns the connection state and at most one active worker (listen, connect
//! or transfer). Every transition, whether requested by a caller or reported
//! by a worker, happens under one lock. Notifications are queued while that
//! lock is held and delivered to the listener by a separate dispatcher task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::error::{Result, SppError};
use super::listener::{SppEvent, SppListener};
use super::state::ConnectionState;
use super::transfer::{self, TransferWriter};
use super::worker::{WorkerId, WorkerOutcome, WorkerRole};
use super::{connect, listen};
use crate::config::LinkConfig;
use crate::transport::{Link, Transport};

type ListenerSlot = Arc<RwLock<Option<Arc<dyn SppListener>>>>;

/// The worker currently owning the link.
struct ActiveWorker {
    id: WorkerId,
    role: WorkerRole,
    cancel: CancellationToken,
    /// Set for transfer workers only.
    writer: Option<TransferWriter>,
    peer: Option<String>,
}

struct Inner {
    state: ConnectionState,
    active: Option<ActiveWorker>,
}

/// Manager of a single point-to-point serial link.
///
/// Created once per process with [`SppManager::new`] and shared as an
/// `Arc`. Control operations return immediately; the blocking work happens
/// on worker tasks spawned on the runtime the manager was created in.
pub struct SppManager<T: Transport> {
    transport: T,
    config: LinkConfig,
    runtime: Handle,
    next_worker_id: AtomicU64,
    inner: Mutex<Inner>,
    listener: ListenerSlot,
    event_tx: mpsc::UnboundedSender<SppEvent>,
    /// Held by a listen worker from before bind until its acceptor is closed.
    listen_gate: Arc<AsyncMutex<()>>,
}

impl<T: Transport> SppManager<T> {
    /// Create a manager over `transport`.
    ///
    /// Must be called from within a tokio runtime; workers and the
    /// notification dispatcher run on that runtime.
    pub fn new(transport: T, mut config: LinkConfig) -> Arc<Self> {
        if config.read_buffer_size == 0 {
            let default_size = LinkConfig::default().read_buffer_size;
            warn!("read_buffer_size of 0 is unusable, using {}", default_size);
            config.read_buffer_size = default_size;
        }

        let runtime = Handle::current();
        let listener: ListenerSlot = Arc::new(RwLock::new(None));
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        runtime.spawn(dispatch_events(event_rx, listener.clone()));

        info!("Link manager created on {} transport", transport.name());

        Arc::new(Self {
            transport,
            config,
            runtime,
            next_worker_id: AtomicU64::new(1),
            inner: Mutex::new(Inner {
                state: ConnectionState::None,
                active: None,
            }),
            listener,
            event_tx,
            listen_gate: Arc::new(AsyncMutex::new(())),
        })
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    /// Identity of the connected peer, if any.
    pub fn remote_peer(&self) -> Option<String> {
        let inner = self.inner.lock();
        inner
            .active
            .as_ref()
            .filter(|w| w.role == WorkerRole::Transfer)
            .and_then(|w| w.peer.clone())
    }

    /// Short name of the underlying transport.
    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    pub(crate) fn listen_gate(&self) -> Arc<AsyncMutex<()>> {
        self.listen_gate.clone()
    }

    /// Register the listener, replacing any previous one.
    pub fn register_listener(&self, listener: Arc<dyn SppListener>) {
        *self.listener.write() = Some(listener);
    }

    /// Unregister `listener` if it is the one currently registered.
    pub fn unregister_listener(&self, listener: &Arc<dyn SppListener>) {
        let mut slot = self.listener.write();
        if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, listener)) {
            *slot = None;
        }
    }

    /// Start listening for an inbound peer.
    ///
    /// Does nothing unless the link is idle.
    pub fn start(self: &Arc<Self>) {
        let mut inner = self.inner.lock();
        if inner.state != ConnectionState::None {
            debug!("start() ignored in state {}", inner.state);
            return;
        }
        self.arm_listen(&mut inner);
    }

    /// Cancel whatever is running and go idle.
    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        self.retire_active(&mut inner);
        self.set_state(&mut inner, ConnectionState::None);
        info!("Link stopped");
    }

    /// Connect to `peer`, abandoning any listen, attempt or link in progress.
    pub fn connect(self: &Arc<Self>, peer: &str) {
        let mut inner = self.inner.lock();
        self.retire_active(&mut inner);

        let id = self.next_id();
        let cancel = CancellationToken::new();
        self.runtime.spawn(connect::run(
            self.clone(),
            id,
            cancel.clone(),
            peer.to_string(),
        ));
        inner.active = Some(ActiveWorker {
            id,
            role: WorkerRole::Connect,
            cancel,
            writer: None,
            peer: Some(peer.to_string()),
        });
        self.set_state(&mut inner, ConnectionState::Connecting);
    }

    /// Drop the connected peer and listen again.
    pub fn disconnect(self: &Arc<Self>) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state != ConnectionState::Connected {
            return Err(SppError::invalid("disconnect", inner.state));
        }
        info!("Disconnecting from peer");
        self.retire_active(&mut inner);
        self.arm_listen(&mut inner);
        Ok(())
    }

    /// Send `data` to the connected peer.
    ///
    /// Returns once the bytes are written. A write failure tears the link
    /// down (connection-lost is notified) and is also returned here.
    pub async fn send(self: &Arc<Self>, data: &[u8]) -> Result<()> {
        let (id, writer) = {
            let inner = self.inner.lock();
            match inner.active.as_ref() {
                Some(ActiveWorker {
                    id,
                    writer: Some(writer),
                    ..
                }) if inner.state == ConnectionState::Connected => (*id, writer.clone()),
                _ => return Err(SppError::invalid("send", inner.state)),
            }
        };

        if data.is_empty() {
            return Ok(());
        }

        match writer.write(data).await {
            Ok(()) => {
                debug!("[{}] Sent {} bytes", id, data.len());
                Ok(())
            }
            Err(e) => {
                warn!("[{}] Write failed: {}", id, e);
                self.report(id, WorkerOutcome::Failed(format!("write error: {}", e)));
                Err(SppError::Io(e))
            }
        }
    }

    /// Handle a worker's terminal report.
    ///
    /// Reports from a worker that is no longer the active one are dropped.
    pub(crate) fn report(self: &Arc<Self>, id: WorkerId, outcome: WorkerOutcome<T::Endpoint>) {
        let mut inner = self.inner.lock();
        let role = match inner.active.as_ref() {
            Some(active) if active.id == id => active.role,
            _ => {
                debug!("[{}] Dropping stale report: {:?}", id, outcome);
                return;
            }
        };

        match (role, outcome) {
            (_, WorkerOutcome::Cancelled) => {
                // Cancellation always comes from the manager, which clears the slot first.
                debug!("[{}] Active worker reported cancellation", id);
            }
            (WorkerRole::Listen | WorkerRole::Connect, WorkerOutcome::Accepted(link)) => {
                self.retire_active(&mut inner);
                self.install_transfer(&mut inner, link);
            }
            (WorkerRole::Transfer, WorkerOutcome::Accepted(link)) => {
                error!("[{}] Transfer worker reported a new link from {}", id, link.peer);
            }
            (WorkerRole::Listen, WorkerOutcome::Failed(reason)) => {
                error!("[{}] Listening failed: {}", id, reason);
                self.retire_active(&mut inner);
                self.set_state(&mut inner, ConnectionState::None);
            }
            (WorkerRole::Connect, WorkerOutcome::Failed(reason)) => {
                warn!("[{}] Connection failed: {}", id, reason);
                self.retire_active(&mut inner);
                self.emit(SppEvent::ConnectionFailed);
                self.rearm_after_failure(&mut inner);
            }
            (WorkerRole::Transfer, WorkerOutcome::Failed(reason)) => {
                warn!("[{}] Connection lost: {}", id, reason);
                self.retire_active(&mut inner);
                self.emit(SppEvent::ConnectionLost);
                self.rearm_after_failure(&mut inner);
            }
        }
    }

    /// Queue received bytes from transfer worker `id`.
    ///
    /// Returns `false` if `id` has been superseded; nothing is queued then.
    pub(crate) fn deliver_data(&self, id: WorkerId, data: &[u8]) -> bool {
        let inner = self.inner.lock();
        match inner.active.as_ref() {
            Some(active) if active.id == id => {
                self.emit(SppEvent::DataReceived(data.to_vec()));
                true
            }
            _ => false,
        }
    }

    fn next_id(&self) -> WorkerId {
        WorkerId(self.next_worker_id.fetch_add(1, Ordering::Relaxed))
    }

    fn arm_listen(self: &Arc<Self>, inner: &mut Inner) {
        let id = self.next_id();
        let cancel = CancellationToken::new();
        self.runtime
            .spawn(listen::run(self.clone(), id, cancel.clone()));
        inner.active = Some(ActiveWorker {
            id,
            role: WorkerRole::Listen,
            cancel,
            writer: None,
            peer: None,
        });
        self.set_state(inner, ConnectionState::Listen);
    }

    fn install_transfer(self: &Arc<Self>, inner: &mut Inner, link: Link<T::Endpoint>) {
        let id = self.next_id();
        let cancel = CancellationToken::new();
        let (reader, writer) = transfer::split(link.endpoint);
        self.runtime.spawn(transfer::run(
            self.clone(),
            id,
            cancel.clone(),
            reader,
            self.config.read_buffer_size,
        ));
        inner.active = Some(ActiveWorker {
            id,
            role: WorkerRole::Transfer,
            cancel,
            writer: Some(writer),
            peer: Some(link.peer.clone()),
        });

        info!("Connected to {}", link.peer);
        self.set_state(inner, ConnectionState::Connected);
        self.emit(SppEvent::RemoteDeviceConnected(link.peer));
    }

    fn rearm_after_failure(self: &Arc<Self>, inner: &mut Inner) {
        if self.config.auto_relisten {
            self.arm_listen(inner);
        } else {
            self.set_state(inner, ConnectionState::None);
        }
    }

    /// Cancel and forget the active worker. Its endpoint closes once the
    /// worker task drops it.
    fn retire_active(&self, inner: &mut Inner) {
        if let Some(active) = inner.active.take() {
            debug!("[{}] Cancelling {:?} worker", active.id, active.role);
            active.cancel.cancel();
        }
    }

    fn set_state(&self, inner: &mut Inner, state: ConnectionState) {
        if inner.state != state {
            info!("State: {} -> {}", inner.state, state);
            inner.state = state;
            self.emit(SppEvent::StateChanged(state));
        }
    }

    fn emit(&self, event: SppEvent) {
        if self.event_tx.send(event).is_err() {
            debug!("Event dispatcher gone, dropping notification");
        }
    }
}

/// Deliver queued notifications to whichever listener is registered.
async fn dispatch_events(mut event_rx: mpsc::UnboundedReceiver<SppEvent>, listener: ListenerSlot) {
    while let Some(event) = event_rx.recv().await {
        let current = listener.read().clone();
        match current {
            Some(listener) => event.dispatch(listener.as_ref()),
            None => debug!("No listener registered, dropping {:?}", event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spp::ChannelListener;
    use crate::transport::{Acceptor, MemoryTransport};
    use std::future::Future;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use std::time::Duration;
    use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};

    /// Endpoint that never yields data and rejects every write.
    struct BrokenWriter;

    impl AsyncRead for BrokenWriter {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Pending
        }
    }

    impl AsyncWrite for BrokenWriter {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    /// Transport whose outbound links break on first write.
    struct BrokenWriterTransport;

    struct IdleAcceptor;

    impl Acceptor for IdleAcceptor {
        type Endpoint = BrokenWriter;

        fn accept(&mut self) -> impl Future<Output = io::Result<Link<BrokenWriter>>> + Send + '_ {
            std::future::pending()
        }
    }

    impl Transport for BrokenWriterTransport {
        type Endpoint = BrokenWriter;
        type Acceptor = IdleAcceptor;

        fn name(&self) -> &'static str {
            "broken"
        }

        fn listen(&self) -> impl Future<Output = io::Result<IdleAcceptor>> + Send + '_ {
            async { Ok(IdleAcceptor) }
        }

        fn connect<'a>(
            &'a self,
            peer: &'a str,
        ) -> impl Future<Output = io::Result<Link<BrokenWriter>>> + Send + 'a {
            async move { Ok(Link::new(BrokenWriter, peer)) }
        }
    }

    fn manager_with_listener(
        config: LinkConfig,
    ) -> (
        Arc<SppManager<MemoryTransport>>,
        async_channel::Receiver<SppEvent>,
    ) {
        let manager = SppManager::new(MemoryTransport::new(), config);
        let (listener, events) = ChannelListener::new();
        manager.register_listener(listener);
        (manager, events)
    }

    async fn next_event(events: &async_channel::Receiver<SppEvent>) -> SppEvent {
        tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    async fn assert_quiet(events: &async_channel::Receiver<SppEvent>) {
        let result = tokio::time::timeout(Duration::from_millis(100), events.recv()).await;
        assert!(result.is_err(), "unexpected event: {:?}", result);
    }

    async fn connect_inbound(
        manager: &Arc<SppManager<MemoryTransport>>,
        events: &async_channel::Receiver<SppEvent>,
        peer: &str,
    ) -> tokio::io::DuplexStream {
        manager.start();
        assert_eq!(
            next_event(events).await,
            SppEvent::StateChanged(ConnectionState::Listen)
        );
        let remote = manager.transport().dial(peer).unwrap();
        assert_eq!(
            next_event(events).await,
            SppEvent::StateChanged(ConnectionState::Connected)
        );
        assert_eq!(
            next_event(events).await,
            SppEvent::RemoteDeviceConnected(peer.to_string())
        );
        remote
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let (manager, events) = manager_with_listener(LinkConfig::default());

        manager.start();
        manager.start();
        assert_eq!(manager.state(), ConnectionState::Listen);
        assert_eq!(
            next_event(&events).await,
            SppEvent::StateChanged(ConnectionState::Listen)
        );
        assert_quiet(&events).await;
    }

    #[tokio::test]
    async fn test_inbound_session_scenario() {
        let (manager, events) = manager_with_listener(LinkConfig::default());
        let mut remote = connect_inbound(&manager, &events, "phone").await;
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(manager.remote_peer().as_deref(), Some("phone"));

        manager.send(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        remote.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");

        drop(remote);
        assert_eq!(next_event(&events).await, SppEvent::ConnectionLost);
        assert_eq!(
            next_event(&events).await,
            SppEvent::StateChanged(ConnectionState::Listen)
        );
        assert_eq!(manager.state(), ConnectionState::Listen);
        assert_eq!(manager.remote_peer(), None);
    }

    #[tokio::test]
    async fn test_rearms_after_connection_lost() {
        let (manager, events) = manager_with_listener(LinkConfig::default());
        let remote = connect_inbound(&manager, &events, "phone").await;

        drop(remote);
        assert_eq!(next_event(&events).await, SppEvent::ConnectionLost);
        assert_eq!(
            next_event(&events).await,
            SppEvent::StateChanged(ConnectionState::Listen)
        );

        let _second = manager.transport().dial("tablet").unwrap();
        assert_eq!(
            next_event(&events).await,
            SppEvent::StateChanged(ConnectionState::Connected)
        );
        assert_eq!(
            next_event(&events).await,
            SppEvent::RemoteDeviceConnected("tablet".to_string())
        );
    }

    #[tokio::test]
    async fn test_lost_connection_without_relisten_goes_idle() {
        let config = LinkConfig {
            auto_relisten: false,
            ..LinkConfig::default()
        };
        let (manager, events) = manager_with_listener(config);
        let remote = connect_inbound(&manager, &events, "phone").await;

        drop(remote);
        assert_eq!(next_event(&events).await, SppEvent::ConnectionLost);
        assert_eq!(
            next_event(&events).await,
            SppEvent::StateChanged(ConnectionState::None)
        );
        assert_eq!(manager.state(), ConnectionState::None);
    }

    #[tokio::test]
    async fn test_received_bytes_are_reported_in_order() {
        let (manager, events) = manager_with_listener(LinkConfig {
            read_buffer_size: 3,
            ..LinkConfig::default()
        });
        let mut remote = connect_inbound(&manager, &events, "phone").await;

        let payload = b"the quick brown fox".to_vec();
        remote.write_all(&payload).await.unwrap();

        let mut received = Vec::new();
        while received.len() < payload.len() {
            match next_event(&events).await {
                SppEvent::DataReceived(chunk) => {
                    assert!(!chunk.is_empty() && chunk.len() <= 3);
                    received.extend_from_slice(&chunk);
                }
                other => panic!("unexpected event: {:?}", other),
            }
        }
        assert_eq!(received, payload);
    }

    #[tokio::test]
    async fn test_outbound_connect_success() {
        let (manager, events) = manager_with_listener(LinkConfig::default());
        let remote_rx = manager.transport().add_peer("00:11:22:33:44:55");

        manager.connect("00:11:22:33:44:55");
        assert_eq!(
            next_event(&events).await,
            SppEvent::StateChanged(ConnectionState::Connecting)
        );
        assert_eq!(
            next_event(&events).await,
            SppEvent::StateChanged(ConnectionState::Connected)
        );
        assert_eq!(
            next_event(&events).await,
            SppEvent::RemoteDeviceConnected("00:11:22:33:44:55".to_string())
        );
        assert_quiet(&events).await;
        assert_eq!(manager.state(), ConnectionState::Connected);

        let mut remote = remote_rx.recv().await.unwrap();
        remote.write_all(b"hi").await.unwrap();
        assert_eq!(
            next_event(&events).await,
            SppEvent::DataReceived(b"hi".to_vec())
        );
    }

    #[tokio::test]
    async fn test_invalid_address_fails_and_rearms() {
        let (manager, events) = manager_with_listener(LinkConfig::default());

        manager.connect("not a peer");
        assert_eq!(
            next_event(&events).await,
            SppEvent::StateChanged(ConnectionState::Connecting)
        );
        assert_eq!(next_event(&events).await, SppEvent::ConnectionFailed);
        assert_eq!(
            next_event(&events).await,
            SppEvent::StateChanged(ConnectionState::Listen)
        );
        assert_eq!(manager.state(), ConnectionState::Listen);
    }

    #[tokio::test]
    async fn test_connect_replaces_listen_worker() {
        let (manager, events) = manager_with_listener(LinkConfig::default());
        manager.transport().add_unresponsive_peer("silent");

        manager.start();
        assert_eq!(
            next_event(&events).await,
            SppEvent::StateChanged(ConnectionState::Listen)
        );
        manager.connect("silent");
        assert_eq!(
            next_event(&events).await,
            SppEvent::StateChanged(ConnectionState::Connecting)
        );

        // The cancelled listen worker must not pick this one up.
        let _remote = manager.transport().dial("phone").unwrap();
        assert_quiet(&events).await;
        assert_eq!(manager.state(), ConnectionState::Connecting);
        assert_eq!(manager.transport().pending_inbound(), 1);
    }

    #[tokio::test]
    async fn test_connect_while_connected_is_not_a_loss() {
        let (manager, events) = manager_with_listener(LinkConfig::default());
        let _remote = connect_inbound(&manager, &events, "phone").await;
        let _remote_rx = manager.transport().add_peer("headset");

        manager.connect("headset");
        assert_eq!(
            next_event(&events).await,
            SppEvent::StateChanged(ConnectionState::Connecting)
        );
        assert_eq!(
            next_event(&events).await,
            SppEvent::StateChanged(ConnectionState::Connected)
        );
        assert_eq!(
            next_event(&events).await,
            SppEvent::RemoteDeviceConnected("headset".to_string())
        );
        assert_quiet(&events).await;
    }

    #[tokio::test]
    async fn test_stop_from_every_state_is_silent() {
        let (manager, events) = manager_with_listener(LinkConfig::default());

        manager.stop();
        assert_eq!(manager.state(), ConnectionState::None);
        assert_quiet(&events).await;

        let _remote = connect_inbound(&manager, &events, "phone").await;
        manager.stop();
        assert_eq!(
            next_event(&events).await,
            SppEvent::StateChanged(ConnectionState::None)
        );
        assert_quiet(&events).await;

        manager.transport().add_unresponsive_peer("silent");
        manager.connect("silent");
        assert_eq!(
            next_event(&events).await,
            SppEvent::StateChanged(ConnectionState::Connecting)
        );
        manager.stop();
        assert_eq!(
            next_event(&events).await,
            SppEvent::StateChanged(ConnectionState::None)
        );
        assert_quiet(&events).await;
        assert_eq!(manager.state(), ConnectionState::None);
    }

    #[tokio::test]
    async fn test_disconnect_requires_connection() {
        let (manager, events) = manager_with_listener(LinkConfig::default());
        manager.start();
        assert_eq!(
            next_event(&events).await,
            SppEvent::StateChanged(ConnectionState::Listen)
        );

        let err = manager.disconnect().unwrap_err();
        assert!(err.is_invalid_operation());
        assert_eq!(manager.state(), ConnectionState::Listen);
        assert_quiet(&events).await;
    }

    #[tokio::test]
    async fn test_disconnect_rearms_listening() {
        let (manager, events) = manager_with_listener(LinkConfig::default());
        let mut remote = connect_inbound(&manager, &events, "phone").await;

        manager.disconnect().unwrap();
        assert_eq!(
            next_event(&events).await,
            SppEvent::StateChanged(ConnectionState::Listen)
        );
        assert_quiet(&events).await;

        // Remote side sees the endpoint close.
        let mut buf = [0u8; 1];
        let n = tokio::time::timeout(Duration::from_secs(2), remote.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_send_requires_connection() {
        let (manager, events) = manager_with_listener(LinkConfig::default());

        let err = manager.send(b"data").await.unwrap_err();
        assert!(err.is_invalid_operation());
        assert_eq!(manager.state(), ConnectionState::None);
        assert_quiet(&events).await;
    }

    #[tokio::test]
    async fn test_write_failure_is_one_connection_loss() {
        let manager = SppManager::new(BrokenWriterTransport, LinkConfig::default());
        let (listener, events) = ChannelListener::new();
        manager.register_listener(listener);

        manager.connect("sink");
        assert_eq!(
            next_event(&events).await,
            SppEvent::StateChanged(ConnectionState::Connecting)
        );
        assert_eq!(
            next_event(&events).await,
            SppEvent::StateChanged(ConnectionState::Connected)
        );
        assert_eq!(
            next_event(&events).await,
            SppEvent::RemoteDeviceConnected("sink".to_string())
        );

        match manager.send(b"data").await {
            Err(SppError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
            other => panic!("unexpected send result: {:?}", other),
        }
        assert_eq!(next_event(&events).await, SppEvent::ConnectionLost);
        assert_eq!(
            next_event(&events).await,
            SppEvent::StateChanged(ConnectionState::Listen)
        );
        assert_quiet(&events).await;
        assert_eq!(manager.state(), ConnectionState::Listen);

        // The link is gone; a second send is refused, not retried.
        assert!(manager.send(b"more").await.unwrap_err().is_invalid_operation());
        assert_quiet(&events).await;
    }

    #[tokio::test]
    async fn test_zero_buffer_size_still_transfers() {
        let (manager, events) = manager_with_listener(LinkConfig {
            read_buffer_size: 0,
            ..LinkConfig::default()
        });
        let mut remote = connect_inbound(&manager, &events, "phone").await;

        remote.write_all(b"abc").await.unwrap();
        assert_eq!(
            next_event(&events).await,
            SppEvent::DataReceived(b"abc".to_vec())
        );
        assert_eq!(manager.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_stale_reports_are_ignored() {
        let (manager, events) = manager_with_listener(LinkConfig::default());
        manager.start();
        assert_eq!(
            next_event(&events).await,
            SppEvent::StateChanged(ConnectionState::Listen)
        );

        let (local, _remote) = tokio::io::duplex(64);
        let stale = WorkerId(u64::MAX);
        manager.report(stale, WorkerOutcome::Accepted(Link::new(local, "ghost")));
        manager.report(stale, WorkerOutcome::Failed("late failure".to_string()));
        assert!(!manager.deliver_data(stale, b"late data"));

        assert_eq!(manager.state(), ConnectionState::Listen);
        assert_quiet(&events).await;
    }

    #[tokio::test]
    async fn test_listener_replace_and_unregister() {
        let manager = SppManager::new(MemoryTransport::new(), LinkConfig::default());
        let (first, first_events) = ChannelListener::new();
        let (second, second_events) = ChannelListener::new();
        let first: Arc<dyn SppListener> = first;
        let second: Arc<dyn SppListener> = second;

        manager.register_listener(first.clone());
        manager.register_listener(second.clone());

        // Unregistering a listener that is not current leaves the slot alone.
        manager.unregister_listener(&first);

        manager.start();
        assert_eq!(
            next_event(&second_events).await,
            SppEvent::StateChanged(ConnectionState::Listen)
        );
        assert!(first_events.try_recv().is_err());

        manager.unregister_listener(&second);
        manager.stop();
        assert_quiet(&second_events).await;
    }
}
