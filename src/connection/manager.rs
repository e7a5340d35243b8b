//! The connection manager and its send path.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{ConnectionState, DeviceDescriptor};
use crate::error::{ConnectionError, LinkError};
use crate::transport::{Connector, DeviceLink, LinkEvent, LinkEvents};

type ReadySlot = oneshot::Sender<Result<(), ConnectionError>>;

/// Owns the device link and the connection state machine.
///
/// All state changes happen inside this type. Other components only read
/// the state or write through a [`DeviceSender`].
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

/// The send path handed to the print pipeline.
///
/// It can check the state and write to the current link, nothing else: it
/// cannot connect, disconnect, or keep a link alive past a state change.
#[derive(Clone)]
pub struct DeviceSender {
    shared: Arc<Shared>,
}

struct Shared {
    connector: Arc<dyn Connector>,
    timeout: Duration,
    events_tx: mpsc::UnboundedSender<(u64, LinkEvent)>,
    session: Mutex<Session>,
}

#[derive(Default)]
struct Session {
    state: ConnectionState,
    /// Bumped by every `connect()` and `disconnect()`; events and attempts
    /// from older generations are ignored.
    generation: u64,
    device: Option<DeviceDescriptor>,
    handle: Option<Arc<dyn DeviceLink>>,
    last_error: Option<String>,
    /// Completed by the first ready/failed event of the current attempt.
    pending: Option<ReadySlot>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_connected(&self) -> bool {
        let session = self.lock();
        session.state == ConnectionState::Connected && session.handle.is_some()
    }

    fn on_event(&self, generation: u64, event: LinkEvent) {
        let mut session = self.lock();
        if generation != session.generation {
            debug!(generation, current = session.generation, ?event, "ignoring stale link event");
            return;
        }

        let mut stale = None;
        match (event, session.state) {
            (LinkEvent::Ready, ConnectionState::Connecting) => {
                session.state = ConnectionState::Connected;
                session.last_error = None;
                if let Some(slot) = session.pending.take() {
                    let _ = slot.send(Ok(()));
                }
                info!(generation, "printer connected");
            }
            (LinkEvent::Failed(reason), ConnectionState::Connecting) => {
                warn!(generation, %reason, "link failed to open");
                stale = session.handle.take();
                session.state = ConnectionState::Failed;
                session.last_error = Some(reason.clone());
                if let Some(slot) = session.pending.take() {
                    let _ = slot.send(Err(ConnectionError::Link(reason)));
                }
            }
            (LinkEvent::Dropped, ConnectionState::Connecting) => {
                let err = ConnectionError::Interrupted("link dropped during handshake".to_string());
                warn!(generation, "link dropped while connecting");
                stale = session.handle.take();
                session.state = ConnectionState::Failed;
                session.last_error = Some(err.to_string());
                if let Some(slot) = session.pending.take() {
                    let _ = slot.send(Err(err));
                }
            }
            (LinkEvent::Dropped, ConnectionState::Connected) => {
                warn!(generation, "connection interrupted");
                stale = session.handle.take();
                session.state = ConnectionState::Interrupted;
                session.last_error = Some("Connection interrupted".to_string());
            }
            (event, state) => {
                debug!(generation, ?event, %state, "ignoring link event");
            }
        }
        drop(session);

        if let Some(handle) = stale {
            handle.close();
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let session = self.session.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = session.handle.take() {
            handle.close();
        }
    }
}

/// Drains link events for one manager until the manager is gone.
async fn listen(shared: Weak<Shared>, mut events: mpsc::UnboundedReceiver<(u64, LinkEvent)>) {
    while let Some((generation, event)) = events.recv().await {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        shared.on_event(generation, event);
    }
}

impl ConnectionManager {
    /// Create a manager and start its link event listener.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(connector: Arc<dyn Connector>, timeout: Duration) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            connector,
            timeout,
            events_tx,
            session: Mutex::new(Session::default()),
        });

        tokio::spawn(listen(Arc::downgrade(&shared), events_rx));

        Self { shared }
    }

    /// Connect to the printer at `address`.
    ///
    /// Any open link or in-flight attempt is disposed first. The attempt
    /// (device lookup, dial, and the wait for the ready event) races the
    /// connect timeout; whichever finishes first decides the outcome.
    ///
    /// ## Errors
    ///
    /// - [`ConnectionError::InvalidAddress`]: empty address
    /// - [`ConnectionError::DeviceNotFound`]: unknown or unpaired device
    /// - [`ConnectionError::Timeout`]: no ready event within the timeout
    /// - [`ConnectionError::Link`] / [`ConnectionError::Interrupted`]: the link
    ///   failed or dropped during the handshake
    /// - [`ConnectionError::Cancelled`]: a later `connect()` or `disconnect()`
    ///   took over
    pub async fn connect(&self, address: &str) -> Result<DeviceDescriptor, ConnectionError> {
        let address = address.trim();
        if address.is_empty() {
            let err = ConnectionError::InvalidAddress(address.to_string());
            self.shared.lock().last_error = Some(err.to_string());
            return Err(err);
        }

        let (generation, ready) = self.begin_attempt(address);
        let deadline = Instant::now() + self.shared.timeout;

        let outcome = tokio::select! {
            biased;
            result = self.attempt(generation, address, ready) => result,
            _ = tokio::time::sleep_until(deadline) => {
                Err(ConnectionError::Timeout(self.shared.timeout))
            }
        };

        self.finish_attempt(generation, outcome)
    }

    /// Drop the link and return to `Disconnected`.
    ///
    /// Cancels an in-flight `connect()`. Calling it while already
    /// disconnected does nothing.
    pub fn disconnect(&self) {
        let stale = {
            let mut session = self.shared.lock();
            if session.state == ConnectionState::Disconnected
                && session.handle.is_none()
                && session.pending.is_none()
            {
                debug!("already disconnected");
                return;
            }

            session.generation += 1;
            session.state = ConnectionState::Disconnected;
            session.device = None;
            session.pending = None;
            session.handle.take()
        };

        if let Some(handle) = stale {
            handle.close();
        }
        info!("printer disconnected");
    }

    /// True iff the state is `Connected` and a link is held.
    pub fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    /// The connected (or last attempted) device, if any.
    pub fn device(&self) -> Option<DeviceDescriptor> {
        self.shared.lock().device.clone()
    }

    /// Message of the most recent connection failure.
    pub fn last_error(&self) -> Option<String> {
        self.shared.lock().last_error.clone()
    }

    pub fn timeout(&self) -> Duration {
        self.shared.timeout
    }

    /// The send path for print jobs.
    pub fn sender(&self) -> DeviceSender {
        DeviceSender {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Enter `Connecting` under a new generation, disposing whatever the
    /// previous generation left behind.
    fn begin_attempt(
        &self,
        address: &str,
    ) -> (u64, oneshot::Receiver<Result<(), ConnectionError>>) {
        let (slot, ready) = oneshot::channel();

        let (generation, stale) = {
            let mut session = self.shared.lock();
            if session.state == ConnectionState::Connecting {
                debug!(generation = session.generation, "superseding in-flight attempt");
            }
            session.generation += 1;
            session.state = ConnectionState::Connecting;
            session.device = None;
            session.last_error = None;
            // Dropping the old slot resolves the old attempt as cancelled.
            session.pending = Some(slot);
            (session.generation, session.handle.take())
        };

        if let Some(handle) = stale {
            debug!("closing previous link");
            handle.close();
        }
        info!(generation, address, "connecting to printer");
        (generation, ready)
    }

    async fn attempt(
        &self,
        generation: u64,
        address: &str,
        ready: oneshot::Receiver<Result<(), ConnectionError>>,
    ) -> Result<DeviceDescriptor, ConnectionError> {
        let device = self.shared.connector.resolve(address).await?;
        debug!(generation, %device, "device resolved");

        let events = LinkEvents::new(generation, self.shared.events_tx.clone());
        let handle = self.shared.connector.dial(&device, events)?;
        self.attach(generation, &device, handle)?;

        match ready.await {
            Ok(Ok(())) => Ok(device),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(ConnectionError::Cancelled),
        }
    }

    /// Hand a freshly dialed link to the session.
    fn attach(
        &self,
        generation: u64,
        device: &DeviceDescriptor,
        handle: Arc<dyn DeviceLink>,
    ) -> Result<(), ConnectionError> {
        let mut session = self.shared.lock();
        if session.generation != generation {
            drop(session);
            handle.close();
            return Err(ConnectionError::Cancelled);
        }

        session.device = Some(device.clone());
        match session.state {
            ConnectionState::Connecting | ConnectionState::Connected => {
                session.handle = Some(handle);
            }
            _ => {
                // Already failed or dropped; the ready slot carries the reason.
                drop(session);
                handle.close();
            }
        }
        Ok(())
    }

    /// Settle the state once the attempt or the timer has won.
    fn finish_attempt(
        &self,
        generation: u64,
        outcome: Result<DeviceDescriptor, ConnectionError>,
    ) -> Result<DeviceDescriptor, ConnectionError> {
        let mut session = self.shared.lock();
        if session.generation != generation {
            debug!(generation, "attempt superseded");
            return Err(ConnectionError::Cancelled);
        }

        // First transition out of Connecting wins, even if the timer fired
        // right after the ready event.
        if session.state == ConnectionState::Connected && session.handle.is_some() {
            if let Some(device) = session.device.clone() {
                return Ok(device);
            }
        }

        let err = match outcome {
            Err(err) => err,
            Ok(_) => ConnectionError::Interrupted("link dropped during handshake".to_string()),
        };

        if matches!(
            session.state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            session.state = ConnectionState::Failed;
        }
        session.last_error = Some(err.to_string());
        session.pending = None;
        let stale = session.handle.take();
        drop(session);

        if let Some(handle) = stale {
            handle.close();
        }
        warn!(generation, error = %err, "connection failed");
        Err(err)
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let session = self.shared.lock();
        f.debug_struct("ConnectionManager")
            .field("state", &session.state)
            .field("device", &session.device)
            .field("last_error", &session.last_error)
            .finish()
    }
}

impl DeviceSender {
    pub fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }

    /// Write one buffer to the current link.
    ///
    /// The write runs on the blocking pool. A link closed by `disconnect()`
    /// while the write is in flight makes the write fail.
    pub async fn send(&self, data: Vec<u8>) -> Result<(), LinkError> {
        let handle = {
            let session = self.shared.lock();
            if session.state != ConnectionState::Connected {
                return Err(LinkError::NotOpen);
            }
            session.handle.clone().ok_or(LinkError::NotOpen)?
        };

        tokio::task::spawn_blocking(move || handle.write(&data))
            .await
            .map_err(|e| LinkError::Io(io::Error::other(e)))?
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct NullLink {
        closed: AtomicBool,
    }

    impl DeviceLink for NullLink {
        fn write(&self, _data: &[u8]) -> Result<(), LinkError> {
            if self.closed.load(Ordering::SeqCst) {
                return Err(LinkError::NotOpen);
            }
            Ok(())
        }

        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    /// Dials links that never report anything on their own.
    struct SilentConnector;

    #[async_trait]
    impl Connector for SilentConnector {
        async fn resolve(&self, address: &str) -> Result<DeviceDescriptor, ConnectionError> {
            Ok(DeviceDescriptor::new(address, "silent"))
        }

        fn dial(
            &self,
            _device: &DeviceDescriptor,
            _events: LinkEvents,
        ) -> Result<Arc<dyn DeviceLink>, ConnectionError> {
            Ok(Arc::new(NullLink::default()))
        }
    }

    fn connecting_manager() -> (ConnectionManager, u64, Arc<NullLink>) {
        let manager = ConnectionManager::new(Arc::new(SilentConnector), Duration::from_secs(10));
        let (generation, _ready) = manager.begin_attempt("00:11:22:33:44:55");
        let link = Arc::new(NullLink::default());
        manager
            .attach(
                generation,
                &DeviceDescriptor::new("00:11:22:33:44:55", "x"),
                link.clone(),
            )
            .unwrap();
        (manager, generation, link)
    }

    #[tokio::test]
    async fn test_ready_event_connects() {
        let (manager, generation, _link) = connecting_manager();
        manager.shared.on_event(generation, LinkEvent::Ready);
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert!(manager.is_connected());
    }

    #[tokio::test]
    async fn test_stale_generation_is_ignored() {
        let (manager, generation, _link) = connecting_manager();
        manager.shared.on_event(generation - 1, LinkEvent::Ready);
        assert_eq!(manager.state(), ConnectionState::Connecting);
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn test_drop_after_connect_interrupts_and_closes() {
        let (manager, generation, link) = connecting_manager();
        manager.shared.on_event(generation, LinkEvent::Ready);
        manager.shared.on_event(generation, LinkEvent::Dropped);

        assert_eq!(manager.state(), ConnectionState::Interrupted);
        assert!(!manager.is_connected());
        assert!(link.closed.load(Ordering::SeqCst));
        assert_eq!(manager.last_error().as_deref(), Some("Connection interrupted"));

        // Terminal: a late ready does not revive it
        manager.shared.on_event(generation, LinkEvent::Ready);
        assert_eq!(manager.state(), ConnectionState::Interrupted);
    }

    #[tokio::test]
    async fn test_failed_event_during_handshake() {
        let (manager, generation, link) = connecting_manager();
        manager
            .shared
            .on_event(generation, LinkEvent::Failed("refused".into()));

        assert_eq!(manager.state(), ConnectionState::Failed);
        assert_eq!(manager.last_error().as_deref(), Some("refused"));
        assert!(link.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_attach_after_supersede_closes_link() {
        let manager = ConnectionManager::new(Arc::new(SilentConnector), Duration::from_secs(10));
        let (old, _ready) = manager.begin_attempt("00:11:22:33:44:55");
        let (_new, _ready2) = manager.begin_attempt("00:11:22:33:44:55");

        let link = Arc::new(NullLink::default());
        let err = manager
            .attach(old, &DeviceDescriptor::new("a", "b"), link.clone())
            .unwrap_err();
        assert_eq!(err, ConnectionError::Cancelled);
        assert!(link.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_sender_refuses_when_not_connected() {
        let (manager, _generation, _link) = connecting_manager();
        let sender = manager.sender();
        assert!(!sender.is_connected());
        assert!(matches!(sender.send(b"^XA^XZ".to_vec()).await, Err(LinkError::NotOpen)));
    }
}
