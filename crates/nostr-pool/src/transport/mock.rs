// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! In-memory transport used by tests

use std::collections::{HashMap, HashSet};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use async_utility::{task, time};
use futures::channel::mpsc as fmpsc;
use futures::{Sink, SinkExt, StreamExt};
use nostr_proto::prelude::*;
use nostr_proto::secp256k1::{Keypair, SECP256K1};
use tokio::sync::{Mutex as AsyncMutex, mpsc};

use super::error::TransportError;
use super::{BoxSink, BoxStream, BoxedFuture, Transport, WireMessage};

const RECV_TIMEOUT: Duration = Duration::from_secs(3);

type Incoming = (
    mpsc::UnboundedSender<MockSession>,
    Arc<AsyncMutex<mpsc::UnboundedReceiver<MockSession>>>,
);

#[derive(Debug, Default)]
struct State {
    refused: HashSet<RelayUrl>,
    stalled: HashSet<RelayUrl>,
    attempts: HashMap<RelayUrl, usize>,
    delay: Option<Duration>,
}

/// In-memory network of relays
#[derive(Debug, Clone, Default)]
pub(crate) struct MockNetwork {
    state: Arc<Mutex<State>>,
    incoming: Arc<Mutex<HashMap<RelayUrl, Incoming>>>,
}

impl MockNetwork {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Refuse every connection to `url`
    pub(crate) fn refuse(&self, url: &RelayUrl) {
        self.state.lock().unwrap().refused.insert(url.clone());
    }

    /// Accept connections to `url` again
    pub(crate) fn allow(&self, url: &RelayUrl) {
        self.state.lock().unwrap().refused.remove(url);
    }

    /// Open connections to `url` whose outbound side never accepts a frame
    pub(crate) fn stall(&self, url: &RelayUrl) {
        self.state.lock().unwrap().stalled.insert(url.clone());
    }

    /// Delay every connection attempt
    pub(crate) fn connect_delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = Some(delay);
    }

    /// Number of connection attempts made to `url`
    pub(crate) fn attempts(&self, url: &RelayUrl) -> usize {
        self.state
            .lock()
            .unwrap()
            .attempts
            .get(url)
            .copied()
            .unwrap_or_default()
    }

    fn incoming(&self, url: &RelayUrl) -> Incoming {
        let mut incoming = self.incoming.lock().unwrap();
        incoming
            .entry(url.clone())
            .or_insert_with(|| {
                let (tx, rx) = mpsc::unbounded_channel();
                (tx, Arc::new(AsyncMutex::new(rx)))
            })
            .clone()
    }

    /// Wait for the next client connection to `url`
    pub(crate) async fn accept(&self, url: &RelayUrl) -> MockSession {
        let (_, rx) = self.incoming(url);
        let mut rx = rx.lock().await;
        time::timeout(Some(RECV_TIMEOUT), rx.recv())
            .await
            .flatten()
            .expect("no connection accepted")
    }

    /// Spawn a scripted relay serving `url`
    pub(crate) fn serve(&self, url: &RelayUrl, behavior: MockBehavior) -> MockRelay {
        let relay = MockRelay {
            events: Arc::new(Mutex::new(behavior.events.clone())),
            received: Arc::new(Mutex::new(Vec::new())),
        };

        let network = self.clone();
        let url = url.clone();
        let events = relay.events.clone();
        let received = relay.received.clone();
        task::spawn(async move {
            let (_, rx) = network.incoming(&url);
            let mut rx = rx.lock().await;
            while let Some(session) = rx.recv().await {
                task::spawn(serve_session(
                    session,
                    behavior.clone(),
                    events.clone(),
                    received.clone(),
                ));
            }
        });

        relay
    }
}

impl Transport for MockNetwork {
    fn connect<'a>(
        &'a self,
        url: &'a RelayUrl,
        timeout: Duration,
    ) -> BoxedFuture<'a, Result<(BoxSink, BoxStream), TransportError>> {
        Box::pin(async move {
            let (refused, stalled, delay) = {
                let mut state = self.state.lock().unwrap();
                *state.attempts.entry(url.clone()).or_default() += 1;
                (
                    state.refused.contains(url),
                    state.stalled.contains(url),
                    state.delay,
                )
            };

            if let Some(delay) = delay {
                if delay >= timeout {
                    time::sleep(timeout).await;
                    return Err(TransportError::Timeout);
                }
                time::sleep(delay).await;
            }

            if refused {
                return Err(TransportError::backend(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "connection refused",
                )));
            }

            let (client_tx, relay_rx) = fmpsc::unbounded::<WireMessage>();
            let (relay_tx, client_rx) = fmpsc::unbounded::<Result<WireMessage, TransportError>>();

            let session = MockSession {
                url: url.clone(),
                tx: relay_tx,
                rx: relay_rx,
            };

            let (tx, _) = self.incoming(url);
            tx.send(session).map_err(|_| TransportError::Timeout)?;

            let sink: BoxSink = if stalled {
                Box::new(StalledSink)
            } else {
                Box::new(client_tx.sink_map_err(TransportError::backend))
            };
            let stream: BoxStream = Box::new(client_rx);
            Ok((sink, stream))
        })
    }
}

/// Sink that is never ready to send
struct StalledSink;

impl Sink<WireMessage> for StalledSink {
    type Error = TransportError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Pending
    }

    fn start_send(self: Pin<&mut Self>, _item: WireMessage) -> Result<(), Self::Error> {
        Ok(())
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }
}

/// Relay side of an accepted connection
///
/// Dropping it simulates a connection loss.
#[derive(Debug)]
pub(crate) struct MockSession {
    pub(crate) url: RelayUrl,
    tx: fmpsc::UnboundedSender<Result<WireMessage, TransportError>>,
    rx: fmpsc::UnboundedReceiver<WireMessage>,
}

impl MockSession {
    /// Next client message, `None` if the client closed the connection
    pub(crate) async fn recv(&mut self) -> Option<ClientMessage> {
        loop {
            let msg = time::timeout(Some(RECV_TIMEOUT), self.rx.next())
                .await
                .expect("timeout waiting for client message")?;
            match msg {
                WireMessage::Text(json) => return Some(ClientMessage::from_json(json).unwrap()),
                WireMessage::Close(..) => return None,
                WireMessage::Binary(..) => continue,
            }
        }
    }

    /// Assert that nothing is received for `wait`
    pub(crate) async fn recv_nothing(&mut self, wait: Duration) {
        if let Some(Some(msg)) = time::timeout(Some(wait), self.rx.next()).await {
            panic!("unexpected message: {msg:?}");
        }
    }

    pub(crate) async fn expect_req(&mut self) -> (SubscriptionId, Vec<Filter>) {
        match self.recv().await {
            Some(ClientMessage::Req {
                subscription_id,
                filters,
            }) => (subscription_id, filters),
            other => panic!("expected REQ, got {other:?}"),
        }
    }

    pub(crate) async fn expect_event(&mut self) -> Event {
        match self.recv().await {
            Some(ClientMessage::Event(event)) => *event,
            other => panic!("expected EVENT, got {other:?}"),
        }
    }

    pub(crate) fn send(&self, msg: RelayMessage) {
        self.send_raw(msg.as_json());
    }

    pub(crate) fn send_raw<S>(&self, text: S)
    where
        S: Into<String>,
    {
        let _ = self.tx.unbounded_send(Ok(WireMessage::Text(text.into())));
    }

    pub(crate) fn send_close(&self, reason: &str) {
        let _ = self
            .tx
            .unbounded_send(Ok(WireMessage::Close(Some(reason.to_string()))));
    }
}

/// How a scripted relay answers
#[derive(Debug, Clone)]
pub(crate) struct MockBehavior {
    pub(crate) events: Vec<Event>,
    /// Send EOSE after stored events
    pub(crate) eose: bool,
    /// Answer EVENT with OK
    pub(crate) ack: bool,
    /// Accept published events
    pub(crate) accept: bool,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            eose: true,
            ack: true,
            accept: true,
        }
    }
}

impl MockBehavior {
    pub(crate) fn events(mut self, events: Vec<Event>) -> Self {
        self.events = events;
        self
    }

    pub(crate) fn silent(mut self) -> Self {
        self.eose = false;
        self
    }

    pub(crate) fn no_ack(mut self) -> Self {
        self.ack = false;
        self
    }

    pub(crate) fn reject(mut self) -> Self {
        self.accept = false;
        self
    }
}

/// Handle to a scripted relay
#[derive(Debug, Clone)]
pub(crate) struct MockRelay {
    events: Arc<Mutex<Vec<Event>>>,
    received: Arc<Mutex<Vec<ClientMessage>>>,
}

impl MockRelay {
    /// Messages received so far, across all sessions
    pub(crate) fn received(&self) -> Vec<ClientMessage> {
        self.received.lock().unwrap().clone()
    }

    pub(crate) fn reqs(&self) -> usize {
        self.received()
            .iter()
            .filter(|m| matches!(m, ClientMessage::Req { .. }))
            .count()
    }

    pub(crate) fn stored(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

async fn serve_session(
    mut session: MockSession,
    behavior: MockBehavior,
    events: Arc<Mutex<Vec<Event>>>,
    received: Arc<Mutex<Vec<ClientMessage>>>,
) {
    while let Some(Some(msg)) = session.rx.next().await.map(|msg| match msg {
        WireMessage::Text(json) => ClientMessage::from_json(json).ok(),
        _ => None,
    }) {
        received.lock().unwrap().push(msg.clone());

        match msg {
            ClientMessage::Req {
                subscription_id,
                filters,
            } => {
                let matching: Vec<Event> = events
                    .lock()
                    .unwrap()
                    .iter()
                    .filter(|e| Filter::match_any(&filters, e))
                    .cloned()
                    .collect();
                for event in matching {
                    session.send(RelayMessage::event(subscription_id.clone(), event));
                }
                if behavior.eose {
                    session.send(RelayMessage::eose(subscription_id));
                }
            }
            ClientMessage::Event(event) => {
                if behavior.accept {
                    events.lock().unwrap().push((*event).clone());
                }
                if behavior.ack {
                    let message = if behavior.accept { "" } else { "blocked: test" };
                    session.send(RelayMessage::ok(event.id, behavior.accept, message));
                }
            }
            ClientMessage::Count {
                subscription_id,
                filters,
            } => {
                let count: usize = events
                    .lock()
                    .unwrap()
                    .iter()
                    .filter(|e| Filter::match_any(&filters, e))
                    .count();
                session.send(RelayMessage::Count {
                    subscription_id,
                    count,
                });
            }
            ClientMessage::Close(..) | ClientMessage::Auth(..) => {}
        }
    }
}

pub(crate) fn keypair(seed: u8) -> Keypair {
    Keypair::from_seckey_slice(SECP256K1, &[seed; 32]).unwrap()
}

/// Signed text note
pub(crate) fn note(seed: u8, created_at: u64, content: &str) -> Event {
    let keys = keypair(seed);
    UnsignedEvent::new(
        PublicKey::from(keys.x_only_public_key().0),
        Timestamp::from(created_at),
        Kind::TEXT_NOTE,
        Vec::new(),
        content,
    )
    .sign_with_keypair(&keys)
}

pub(crate) fn url(s: &str) -> RelayUrl {
    RelayUrl::parse(s).unwrap()
}
