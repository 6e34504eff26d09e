use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::mpsc;

use crate::client::{
    ClientEvent, EventReceiver, EventSender, Identity, MessagingClient, OutboundRequest, RequestId,
};
use crate::config::ClientConfig;
use crate::error::TransportError;

/// Scriptable stand-in for the wrapped client.
///
/// Tests drive it from the "server" side: `register`, `drop_socket`,
/// `push_message`, `respond`. Every `start` opens a fresh event channel.
#[derive(Default)]
pub(crate) struct MockClient {
    connected: AtomicBool,
    starts: AtomicUsize,
    closes: AtomicUsize,
    fail_start: AtomicBool,
    fail_send: AtomicBool,
    keep_events: AtomicBool,
    events: Mutex<Option<EventSender>>,
    sent: Mutex<Vec<OutboundRequest>>,
    configs: Mutex<Vec<ClientConfig>>,
}

impl MockClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_starts(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_send.store(fail, Ordering::SeqCst);
    }

    /// Keep the event sender across `close`, as a client whose socket
    /// delivers a few more events after being told to stop.
    pub fn keep_events_open(&self, keep: bool) {
        self.keep_events.store(keep, Ordering::SeqCst);
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<OutboundRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last_config(&self) -> Option<ClientConfig> {
        self.configs.lock().unwrap().last().cloned()
    }

    /// Deliver an event on the current channel. Returns false if there is
    /// no open channel.
    pub fn emit(&self, event: ClientEvent) -> bool {
        match self.events.lock().unwrap().as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    pub fn register(&self, application: &str, token: &str) {
        self.connected.store(true, Ordering::SeqCst);
        self.emit(ClientEvent::Registered(Identity {
            application: application.into(),
            token: token.into(),
        }));
    }

    pub fn reregister(&self, application: &str, token: &str) {
        self.connected.store(true, Ordering::SeqCst);
        self.emit(ClientEvent::Reregistered(Identity {
            application: application.into(),
            token: token.into(),
        }));
    }

    pub fn drop_socket(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.emit(ClientEvent::SocketDisconnected);
    }

    pub fn push_message(&self, envelope: Value) {
        self.emit(ClientEvent::Message(envelope));
    }

    pub fn respond(&self, request_id: RequestId, response: Value) {
        self.emit(ClientEvent::Response {
            request_id,
            outcome: Ok(response),
        });
    }

    /// Drop the event sender, as a client that has shut down would.
    pub fn hang_up(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.events.lock().unwrap().take();
    }
}

impl MessagingClient for MockClient {
    fn start(&self, config: &ClientConfig) -> Result<EventReceiver, TransportError> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(TransportError::StartFailed("refused".into()));
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.configs.lock().unwrap().push(config.clone());

        let (tx, rx) = mpsc::unbounded_channel();
        *self.events.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    fn send(&self, request: OutboundRequest) -> Result<(), TransportError> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed("socket closed".into()));
        }
        self.sent.lock().unwrap().push(request);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        if !self.keep_events.load(Ordering::SeqCst) {
            self.events.lock().unwrap().take();
        }
    }
}

/// Yield to the runtime until `cond` holds. Panics if it never does.
pub(crate) async fn wait_until<F>(mut cond: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..1000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

/// Let already-queued events drain through the pump.
pub(crate) async fn flush() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}
