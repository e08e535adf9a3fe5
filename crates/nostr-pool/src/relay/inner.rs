// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_utility::{task, time};
use atomic_destructor::AtomicDestroyer;
use futures::{SinkExt, StreamExt};
use nostr_proto::prelude::*;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::sync::{Mutex, RwLock, broadcast, oneshot, watch};

use super::constants::{
    CLOSED_BY_CLIENT, CONNECTION_CLOSED, OUTBOUND_CHANNEL_SIZE, WAIT_FOR_SHUTDOWN_TIMEOUT,
    WEBSOCKET_TX_TIMEOUT,
};
use super::options::RelayOptions;
use super::outcome::PublishOutcome;
use super::stats::RelayConnectionStats;
use super::status::AtomicRelayStatus;
use super::subscription::{SubscriptionHandler, SubscriptionState};
use super::{Error, RelayNotification, RelayStatus};
use crate::shared::SharedState;
use crate::transport::{BoxSink, BoxStream, WireMessage};

type ClientMessageJson = String;

/// Everything a connection task needs to run a session
type Connection = (BoxSink, BoxStream, Receiver<ClientMessageJson>);

struct SubscriptionData {
    filters: Vec<Filter>,
    state: SubscriptionState,
    /// Session in which the `REQ` was sent (`0` if never sent)
    session: u64,
    handler: Arc<dyn SubscriptionHandler>,
}

impl fmt::Debug for SubscriptionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionData")
            .field("filters", &self.filters)
            .field("state", &self.state)
            .field("session", &self.session)
            .finish()
    }
}

/// Outbound queue of the current websocket session
#[derive(Debug)]
struct Session {
    id: u64,
    tx: Sender<ClientMessageJson>,
}

impl Session {
    fn send(&self, msg: &ClientMessage) -> Result<(), Error> {
        self.tx
            .try_send(msg.as_json())
            .map_err(|_| Error::CantSendChannelMessage {
                channel: String::from("outbound"),
            })
    }
}

// Instead of wrap every field in an `Arc<T>`, which increases the number of atomic operations,
// put all fields that require an `Arc` here.
#[derive(Debug)]
pub(super) struct AtomicPrivateData {
    status: AtomicRelayStatus,
    session: RwLock<Option<Session>>,
    session_counter: AtomicU64,
    subscriptions: RwLock<HashMap<SubscriptionId, SubscriptionData>>,
    subscription_counter: AtomicU64,
    publishes: Mutex<HashMap<EventId, Vec<oneshot::Sender<PublishOutcome>>>>,
    counts: Mutex<HashMap<SubscriptionId, oneshot::Sender<Result<usize, String>>>>,
    challenge: RwLock<Option<String>>,
    backoff_attempt: AtomicU32,
    last_error: Mutex<Option<String>>,
    connect_lock: Mutex<()>,
    /// Incremented every time a [`InnerRelay::connect`] attempt completes
    connect_epoch: AtomicU64,
    terminate: watch::Sender<bool>,
    running: watch::Sender<bool>,
}

#[derive(Debug, Clone)]
pub(crate) struct InnerRelay {
    pub(super) url: RelayUrl,
    atomic: Arc<AtomicPrivateData>,
    pub(super) opts: RelayOptions,
    pub(super) stats: RelayConnectionStats,
    state: SharedState,
    pub(super) internal_notification_sender: broadcast::Sender<RelayNotification>,
}

impl AtomicDestroyer for InnerRelay {
    fn on_destroy(&self) {
        self.terminate();
    }
}

impl InnerRelay {
    pub(super) fn new(url: RelayUrl, state: SharedState, opts: RelayOptions) -> Self {
        let (relay_notification_sender, ..) =
            broadcast::channel::<RelayNotification>(opts.notification_channel_size);

        Self {
            url,
            atomic: Arc::new(AtomicPrivateData {
                status: AtomicRelayStatus::default(),
                session: RwLock::new(None),
                session_counter: AtomicU64::new(0),
                subscriptions: RwLock::new(HashMap::new()),
                subscription_counter: AtomicU64::new(0),
                publishes: Mutex::new(HashMap::new()),
                counts: Mutex::new(HashMap::new()),
                challenge: RwLock::new(None),
                backoff_attempt: AtomicU32::new(0),
                last_error: Mutex::new(None),
                connect_lock: Mutex::new(()),
                connect_epoch: AtomicU64::new(0),
                terminate: watch::Sender::new(false),
                running: watch::Sender::new(false),
            }),
            opts,
            stats: RelayConnectionStats::default(),
            state,
            internal_notification_sender: relay_notification_sender,
        }
    }

    /// Check if the connection task is running
    #[inline]
    pub(super) fn is_running(&self) -> bool {
        *self.atomic.running.borrow()
    }

    #[inline]
    fn is_terminated(&self) -> bool {
        *self.atomic.terminate.borrow()
    }

    #[inline]
    pub fn status(&self) -> RelayStatus {
        self.atomic.status.load()
    }

    pub(super) fn set_status(&self, status: RelayStatus, log: bool) {
        // Change status
        self.atomic.status.set(status);

        // Log
        if log {
            match status {
                RelayStatus::Disconnected => tracing::info!("Disconnected from '{}'", self.url),
                RelayStatus::Connecting => tracing::debug!("Connecting to '{}'", self.url),
                RelayStatus::Connected => tracing::info!("Connected to '{}'", self.url),
                RelayStatus::Reconnecting => {
                    tracing::info!("Connection to '{}' lost, reconnecting", self.url)
                }
                RelayStatus::Closing => tracing::debug!("Closing connection to '{}'", self.url),
            }
        }

        // Send notification
        self.send_notification(RelayNotification::RelayStatus { status });
    }

    #[inline]
    fn send_notification(&self, notification: RelayNotification) {
        let _ = self.internal_notification_sender.send(notification);
    }

    #[inline]
    fn terminate(&self) {
        self.atomic.terminate.send_replace(true);
    }

    #[inline]
    async fn handle_terminate(&self) {
        let mut rx = self.atomic.terminate.subscribe();
        let _ = rx.wait_for(|terminate| *terminate).await;
    }

    pub(super) async fn challenge(&self) -> Option<String> {
        self.atomic.challenge.read().await.clone()
    }

    pub(super) async fn subscriptions(&self) -> HashMap<SubscriptionId, Vec<Filter>> {
        let subscriptions = self.atomic.subscriptions.read().await;
        subscriptions
            .iter()
            .map(|(id, data)| (id.clone(), data.filters.clone()))
            .collect()
    }

    pub(super) async fn subscription_state(&self, id: &SubscriptionId) -> Option<SubscriptionState> {
        let subscriptions = self.atomic.subscriptions.read().await;
        subscriptions.get(id).map(|data| data.state)
    }

    pub(super) async fn connect(&self) -> Result<(), Error> {
        // Taken before the lock, to detect an attempt completed by a concurrent caller
        let epoch: u64 = self.atomic.connect_epoch.load(Ordering::SeqCst);

        let lock = self.atomic.connect_lock.lock().await;

        // The connection task is running: connected or reconnecting in background
        if self.is_running() {
            drop(lock);
            return self.wait_for_connection(self.opts.connect_timeout).await;
        }

        // A concurrent caller just failed to connect: share its result
        if self.atomic.connect_epoch.load(Ordering::SeqCst) != epoch {
            let error: Option<String> = self.atomic.last_error.lock().await.clone();
            return Err(Error::Connect(error.unwrap_or_default()));
        }

        let res: Result<(), Error> = self.start_connection().await;

        self.atomic.connect_epoch.fetch_add(1, Ordering::SeqCst);

        res
    }

    /// This **MUST** be called only by the [`InnerRelay::connect`] method, with the lock held!
    async fn start_connection(&self) -> Result<(), Error> {
        // Reset termination request of a previous `close`
        self.atomic.terminate.send_replace(false);

        self.set_status(RelayStatus::Connecting, true);

        let (mut ws_tx, ws_rx) = self.try_connect(RelayStatus::Disconnected).await?;

        // `close` called while the transport was opening
        if self.is_terminated() {
            let _ = close_ws(&mut ws_tx).await;
            return Err(Error::TerminationRequest);
        }

        let connection: Connection = self.start_session(ws_tx, ws_rx).await;

        // Mark as running before releasing the lock
        self.atomic.running.send_replace(true);

        // Spawn connection task
        let relay: InnerRelay = self.clone();
        task::spawn(relay.connection_task(connection));

        Ok(())
    }

    async fn wait_for_connection(&self, timeout: Duration) -> Result<(), Error> {
        let mut notifications = self.internal_notification_sender.subscribe();

        if self.status().is_connected() {
            return Ok(());
        }

        time::timeout(Some(timeout), async {
            loop {
                match notifications.recv().await {
                    Ok(RelayNotification::RelayStatus { status }) => match status {
                        RelayStatus::Connected => return Ok(()),
                        RelayStatus::Disconnected | RelayStatus::Closing => {
                            return Err(Error::NotConnected);
                        }
                        RelayStatus::Connecting | RelayStatus::Reconnecting => {}
                    },
                    Ok(..) => {}
                    Err(broadcast::error::RecvError::Lagged(..)) => {
                        if self.status().is_connected() {
                            return Ok(());
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => return Err(Error::NotConnected),
                }
            }
        })
        .await
        .ok_or(Error::Timeout)?
    }

    async fn try_connect(&self, status_on_failure: RelayStatus) -> Result<(BoxSink, BoxStream), Error> {
        // Increase the attempts
        self.stats.new_attempt();

        let timeout: Duration = self.opts.connect_timeout;

        // If during connection the termination request is received, abort the connection and return error.
        let res = tokio::select! {
            res = time::timeout(Some(timeout), self.state.transport.connect(&self.url, timeout)) => match res {
                Some(Ok(stream)) => Ok(stream),
                Some(Err(e)) => Err(e.to_string()),
                None => Err(String::from("timeout")),
            },
            _ = self.handle_terminate() => return Err(Error::TerminationRequest),
        };

        match res {
            Ok((ws_tx, ws_rx)) => {
                // Increment success stats
                self.stats.new_success();

                Ok((ws_tx, ws_rx))
            }
            Err(e) => {
                tracing::warn!(url = %self.url, error = %e, "Impossible to connect to relay.");

                // Save the error for coalesced callers
                let mut last_error = self.atomic.last_error.lock().await;
                *last_error = Some(e.clone());

                // Update status
                self.set_status(status_on_failure, false);

                Err(Error::Connect(e))
            }
        }
    }

    /// Install the outbound queue of a new session and re-send the open subscriptions.
    async fn start_session(&self, ws_tx: BoxSink, ws_rx: BoxStream) -> Connection {
        let (tx, rx) = mpsc::channel(OUTBOUND_CHANNEL_SIZE);

        let id: u64 = self.atomic.session_counter.fetch_add(1, Ordering::SeqCst) + 1;

        {
            let mut session = self.atomic.session.write().await;
            *session = Some(Session { id, tx: tx.clone() });
        }

        // Reset backoff
        self.atomic.backoff_attempt.store(0, Ordering::SeqCst);

        self.set_status(RelayStatus::Connected, true);

        self.resubscribe(&Session { id, tx }).await;

        (ws_tx, ws_rx, rx)
    }

    async fn end_session(&self) {
        // Drop the outbound queue: envelopes not yet sent are discarded
        {
            let mut session = self.atomic.session.write().await;
            *session = None;
        }

        self.fail_pending().await;
    }

    /// Fail pending publishes and counts
    async fn fail_pending(&self) {
        let publishes = {
            let mut publishes = self.atomic.publishes.lock().await;
            std::mem::take(&mut *publishes)
        };

        for (id, waiters) in publishes.into_iter() {
            tracing::debug!(url = %self.url, id = %id, "Publish failed: connection closed.");
            for waiter in waiters.into_iter() {
                let _ = waiter.send(PublishOutcome::connection_closed());
            }
        }

        let counts = {
            let mut counts = self.atomic.counts.lock().await;
            std::mem::take(&mut *counts)
        };

        for (_, waiter) in counts.into_iter() {
            let _ = waiter.send(Err(String::from(CONNECTION_CLOSED)));
        }
    }

    /// Send `REQ` for every subscription not yet sent in this session
    ///
    /// Subscriptions whose `REQ` can't be queued are removed and closed with the error.
    async fn resubscribe(&self, session: &Session) {
        let mut failed: Vec<(SubscriptionData, Error)> = Vec::new();
        let mut sent: usize = 0;

        {
            let mut subscriptions = self.atomic.subscriptions.write().await;
            let mut unsent: Vec<(SubscriptionId, Error)> = Vec::new();

            for (id, data) in subscriptions.iter_mut() {
                if data.session == session.id {
                    continue;
                }

                match session.send(&ClientMessage::req(id.clone(), data.filters.clone())) {
                    Ok(()) => {
                        data.session = session.id;

                        if data.state == SubscriptionState::Pending {
                            data.state = SubscriptionState::Active;
                        }

                        sent += 1;
                    }
                    Err(e) => {
                        tracing::error!(url = %self.url, id = %id, error = %e, "Impossible to resubscribe.");
                        unsent.push((id.clone(), e));
                    }
                }
            }

            for (id, e) in unsent.into_iter() {
                if let Some(data) = subscriptions.remove(&id) {
                    failed.push((data, e));
                }
            }
        }

        if sent > 0 {
            tracing::debug!(url = %self.url, "Re-sent {sent} subscriptions.");
        }

        for (data, e) in failed.into_iter() {
            data.handler.on_close(&e.to_string());
        }
    }

    /// This **MUST** be called only by the [`InnerRelay::start_connection`] method!
    async fn connection_task(self, mut connection: Connection) {
        loop {
            let (mut ws_tx, ws_rx, rx) = connection;

            // Run message handlers until the connection is lost or termination is requested
            self.post_connection(&mut ws_tx, ws_rx, rx).await;

            // Always try to close the WebSocket connection
            match close_ws(&mut ws_tx).await {
                Ok(..) => tracing::debug!(url = %self.url, "WebSocket connection closed."),
                Err(e) => {
                    tracing::error!(url = %self.url, error = %e, "Can't close WebSocket connection.")
                }
            }

            self.end_session().await;

            // Requested by `close` or by drop
            if self.is_terminated() {
                // `close` sets the final status itself
                if !self.status().is_closing() {
                    self.close_all_subscriptions(CONNECTION_CLOSED).await;
                    self.set_status(RelayStatus::Disconnected, true);
                }
                break;
            }

            // Check if reconnection is enabled
            if !self.opts.reconnect {
                tracing::debug!(url = %self.url, "Reconnection disabled, breaking loop.");

                self.close_all_subscriptions(CONNECTION_CLOSED).await;
                self.set_status(RelayStatus::Disconnected, true);
                break;
            }

            match self.reconnect().await {
                Some(new) => connection = new,
                None => break,
            }
        }

        // Mark the connection task as stopped.
        self.atomic.running.send_replace(false);

        tracing::debug!(url = %self.url, "Connection task terminated.");
    }

    /// Retry to connect, with backoff, until success or termination.
    async fn reconnect(&self) -> Option<Connection> {
        self.set_status(RelayStatus::Reconnecting, true);

        loop {
            let attempt: u32 = self.atomic.backoff_attempt.fetch_add(1, Ordering::SeqCst) + 1;
            let interval: Duration = self.opts.backoff.delay(attempt);

            tracing::debug!(
                url = %self.url,
                attempt,
                "Reconnecting in {} ms",
                interval.as_millis()
            );

            // Handle termination to allow exiting immediately if request is received during the sleep.
            tokio::select! {
                _ = time::sleep(interval) => {},
                _ = self.handle_terminate() => return None,
            }

            match self.try_connect(RelayStatus::Reconnecting).await {
                Ok((ws_tx, ws_rx)) => return Some(self.start_session(ws_tx, ws_rx).await),
                Err(Error::TerminationRequest) => return None,
                Err(..) => continue,
            }
        }
    }

    async fn post_connection(
        &self,
        ws_tx: &mut BoxSink,
        ws_rx: BoxStream,
        rx: Receiver<ClientMessageJson>,
    ) {
        tokio::select! {
            // Message sender handler
            res = self.sender_message_handler(ws_tx, rx) => match res {
                Ok(()) => tracing::trace!(url = %self.url, "Relay sender exited."),
                Err(e) => tracing::error!(url = %self.url, error = %e, "Relay sender exited with error.")
            },
            // Message receiver handler
            res = self.receiver_message_handler(ws_rx) => match res {
                Ok(()) => tracing::trace!(url = %self.url, "Relay receiver exited."),
                Err(e) => tracing::error!(url = %self.url, error = %e, "Relay receiver exited with error.")
            },
            // Termination handler
            _ = self.handle_terminate() => {},
        }
    }

    async fn sender_message_handler(
        &self,
        ws_tx: &mut BoxSink,
        mut rx: Receiver<ClientMessageJson>,
    ) -> Result<(), Error> {
        while let Some(json) = rx.recv().await {
            // Batch messages already queued
            let mut msgs: Vec<WireMessage> = vec![WireMessage::Text(json)];
            while let Ok(json) = rx.try_recv() {
                msgs.push(WireMessage::Text(json));
            }

            // Calculate messages size
            let size: usize = msgs.iter().map(|msg| msg.len()).sum();
            let len: usize = msgs.len();

            // Log
            if let [WireMessage::Text(json)] = msgs.as_slice() {
                tracing::debug!("Sending '{json}' to '{}' (size: {size} bytes)", self.url);
            } else {
                tracing::debug!("Sending {len} messages to '{}' (size: {size} bytes)", self.url);
            }

            // Send WebSocket messages
            send_ws_msgs(ws_tx, msgs).await?;

            // Increase sent bytes
            self.stats.add_bytes_sent(size);
        }

        Ok(())
    }

    async fn receiver_message_handler(&self, mut ws_rx: BoxStream) -> Result<(), Error> {
        while let Some(msg) = ws_rx.next().await {
            match msg? {
                WireMessage::Text(json) => {
                    self.stats.add_bytes_received(json.len());
                    self.handle_relay_message(&json).await;
                }
                WireMessage::Binary(_) => {
                    tracing::warn!(url = %self.url, "Binary messages aren't supported.");
                }
                WireMessage::Close(None) => break,
                WireMessage::Close(Some(reason)) => {
                    tracing::info!(url = %self.url, reason = %reason, "Connection closed by peer.");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn handle_relay_message(&self, msg: &str) {
        tracing::trace!(url = %self.url, "Received message: {msg}");

        match RelayMessage::from_json(msg) {
            Ok(message) => self.handle_message(message).await,
            // Forward-compatibility
            Err(MessageHandleError::UnknownTag(tag)) => {
                tracing::trace!(url = %self.url, tag = %tag, "Ignoring unknown message.");
            }
            Err(e) => {
                let e: Error = Error::from(e);
                tracing::error!(url = %self.url, error = %e, "Impossible to handle relay message: {msg}");
            }
        }
    }

    async fn handle_message(&self, message: RelayMessage) {
        match message {
            RelayMessage::Event {
                subscription_id,
                event,
            } => self.handle_event(subscription_id, *event).await,
            RelayMessage::EndOfStoredEvents(subscription_id) => {
                tracing::debug!(url = %self.url, id = %subscription_id, "Received EOSE.");

                let mut subscriptions = self.atomic.subscriptions.write().await;
                if let Some(data) = subscriptions.get_mut(&subscription_id) {
                    if !data.state.is_eose_received() {
                        data.state = SubscriptionState::EoseReceived;
                        data.handler.on_eose();
                    }
                }
            }
            RelayMessage::Ok {
                event_id,
                status,
                message,
            } => {
                tracing::debug!(
                    url = %self.url,
                    id = %event_id,
                    status,
                    message = %message,
                    "Received OK."
                );

                let waiters = {
                    let mut publishes = self.atomic.publishes.lock().await;
                    publishes.remove(&event_id)
                };

                match waiters {
                    Some(waiters) => {
                        let outcome: PublishOutcome = PublishOutcome::new(status, message);
                        for waiter in waiters.into_iter() {
                            let _ = waiter.send(outcome.clone());
                        }
                    }
                    None => {
                        tracing::trace!(url = %self.url, id = %event_id, "No publish waiting for this OK.")
                    }
                }
            }
            RelayMessage::Notice(message) => {
                tracing::warn!(url = %self.url, msg = %message, "Received NOTICE.");
                self.send_notification(RelayNotification::Notice { message });
            }
            RelayMessage::Closed {
                subscription_id,
                message,
            } => {
                tracing::info!(
                    url = %self.url,
                    id = %subscription_id,
                    message = %message,
                    "Subscription closed by relay."
                );

                let data = {
                    let mut subscriptions = self.atomic.subscriptions.write().await;
                    subscriptions.remove(&subscription_id)
                };

                match data {
                    Some(data) => data.handler.on_close(&message),
                    None => {
                        let mut counts = self.atomic.counts.lock().await;
                        if let Some(waiter) = counts.remove(&subscription_id) {
                            let _ = waiter.send(Err(message));
                        }
                    }
                }
            }
            RelayMessage::Auth { challenge } => {
                tracing::info!(url = %self.url, "Received AUTH challenge.");

                {
                    let mut current = self.atomic.challenge.write().await;
                    *current = Some(challenge.clone());
                }

                self.send_notification(RelayNotification::AuthRequired { challenge });
            }
            RelayMessage::Count {
                subscription_id,
                count,
            } => {
                tracing::debug!(url = %self.url, id = %subscription_id, count, "Received COUNT.");

                let mut counts = self.atomic.counts.lock().await;
                if let Some(waiter) = counts.remove(&subscription_id) {
                    let _ = waiter.send(Ok(count));
                }
            }
        }
    }

    async fn handle_event(&self, subscription_id: SubscriptionId, event: Event) {
        // Keep the lock while delivering: `close_subscription` waits for in-flight deliveries
        let subscriptions = self.atomic.subscriptions.read().await;

        let Some(data) = subscriptions.get(&subscription_id) else {
            tracing::trace!(url = %self.url, id = %subscription_id, "Event for unknown subscription.");
            return;
        };

        // Verification failures are dropped, never delivered
        if !self.state.verify(&event).await {
            tracing::warn!(url = %self.url, id = %event.id, "Dropping event that failed verification.");
            return;
        }

        if self.opts.verify_subscriptions && !Filter::match_any(&data.filters, &event) {
            tracing::warn!(
                url = %self.url,
                id = %event.id,
                subscription = %subscription_id,
                "Dropping event that doesn't match the subscription filters."
            );
            return;
        }

        data.handler.on_event(event);
    }

    fn next_subscription_id(&self) -> SubscriptionId {
        let n: u64 = self.atomic.subscription_counter.fetch_add(1, Ordering::SeqCst) + 1;
        SubscriptionId::new(format!("sub:{n}"))
    }

    async fn send_msg(&self, msg: ClientMessage) -> Result<(), Error> {
        let session = self.atomic.session.read().await;
        match session.as_ref() {
            Some(session) => session.send(&msg),
            None => Err(Error::NotConnected),
        }
    }

    pub(super) async fn subscribe(
        &self,
        filters: Vec<Filter>,
        handler: Arc<dyn SubscriptionHandler>,
    ) -> Result<SubscriptionId, Error> {
        if filters.is_empty() {
            return Err(Error::FiltersEmpty);
        }

        if !self.is_running() || self.status().is_closing() {
            return Err(Error::NotConnected);
        }

        let id: SubscriptionId = self.next_subscription_id();

        let mut data = SubscriptionData {
            filters,
            state: SubscriptionState::Pending,
            session: 0,
            handler,
        };

        let mut subscriptions = self.atomic.subscriptions.write().await;

        // Send now if a session is up, otherwise the next session will send it
        let session = self.atomic.session.read().await;
        if let Some(session) = session.as_ref() {
            session.send(&ClientMessage::req(id.clone(), data.filters.clone()))?;
            data.state = SubscriptionState::Active;
            data.session = session.id;
        }

        subscriptions.insert(id.clone(), data);

        Ok(id)
    }

    pub(super) async fn close_subscription(&self, id: &SubscriptionId) {
        let data = {
            let mut subscriptions = self.atomic.subscriptions.write().await;
            subscriptions.remove(id)
        };

        // Already closed
        let Some(data) = data else {
            return;
        };

        if self.status().is_connected() {
            if let Err(e) = self.send_msg(ClientMessage::close(id.clone())).await {
                tracing::debug!(url = %self.url, id = %id, error = %e, "Can't send CLOSE.");
            }
        }

        data.handler.on_close(CLOSED_BY_CLIENT);
    }

    async fn close_all_subscriptions(&self, reason: &str) {
        let subscriptions = {
            let mut subscriptions = self.atomic.subscriptions.write().await;
            std::mem::take(&mut *subscriptions)
        };

        for (_, data) in subscriptions.into_iter() {
            data.handler.on_close(reason);
        }
    }

    pub(super) async fn publish(&self, event: Event) -> PublishOutcome {
        let id: EventId = event.id;
        self.send_and_wait_ok(ClientMessage::event(event), id).await
    }

    pub(super) async fn authenticate(&self, event: Event) -> PublishOutcome {
        let id: EventId = event.id;
        self.send_and_wait_ok(ClientMessage::auth(event), id).await
    }

    async fn send_and_wait_ok(&self, msg: ClientMessage, id: EventId) -> PublishOutcome {
        // Register the waiter before sending, the OK may arrive immediately
        let (tx, rx) = oneshot::channel();
        {
            let mut publishes = self.atomic.publishes.lock().await;
            publishes.entry(id).or_default().push(tx);
        }

        if let Err(e) = self.send_msg(msg).await {
            tracing::debug!(url = %self.url, id = %id, error = %e, "Can't send message.");
            self.remove_publish_waiter(&id).await;
            return PublishOutcome::connection_closed();
        }

        match time::timeout(Some(self.opts.publish_timeout), rx).await {
            Some(Ok(outcome)) => outcome,
            // Waiter dropped without an answer
            Some(Err(..)) => PublishOutcome::connection_closed(),
            None => {
                tracing::debug!(url = %self.url, id = %id, "Timeout waiting for OK.");
                self.remove_publish_waiter(&id).await;
                PublishOutcome::timeout()
            }
        }
    }

    /// Remove the waiters whose receiver has been dropped
    async fn remove_publish_waiter(&self, id: &EventId) {
        let mut publishes = self.atomic.publishes.lock().await;
        if let Some(waiters) = publishes.get_mut(id) {
            waiters.retain(|waiter| !waiter.is_closed());
            if waiters.is_empty() {
                publishes.remove(id);
            }
        }
    }

    #[cfg(test)]
    pub(super) async fn pending_publishes(&self) -> usize {
        self.atomic.publishes.lock().await.len()
    }

    pub(super) async fn count(&self, filters: Vec<Filter>, timeout: Duration) -> Result<usize, Error> {
        if filters.is_empty() {
            return Err(Error::FiltersEmpty);
        }

        let id: SubscriptionId = self.next_subscription_id();

        let (tx, rx) = oneshot::channel();
        {
            let mut counts = self.atomic.counts.lock().await;
            counts.insert(id.clone(), tx);
        }

        if let Err(e) = self.send_msg(ClientMessage::count(id.clone(), filters)).await {
            self.atomic.counts.lock().await.remove(&id);
            return Err(e);
        }

        match time::timeout(Some(timeout), rx).await {
            Some(Ok(Ok(count))) => Ok(count),
            Some(Ok(Err(message))) if message == CONNECTION_CLOSED => Err(Error::ConnectionClosed),
            Some(Ok(Err(message))) => Err(Error::Rejected(message)),
            Some(Err(..)) => Err(Error::ConnectionClosed),
            None => {
                self.atomic.counts.lock().await.remove(&id);
                Err(Error::Timeout)
            }
        }
    }

    pub(super) async fn close(&self) {
        let status: RelayStatus = self.status();

        // Already closed or closing
        if status.is_closing() || (status.is_disconnected() && !self.is_running()) {
            return;
        }

        self.set_status(RelayStatus::Closing, true);

        // Stop the connection task
        self.terminate();

        let mut running = self.atomic.running.subscribe();
        if time::timeout(Some(WAIT_FOR_SHUTDOWN_TIMEOUT), running.wait_for(|running| !*running))
            .await
            .is_none()
        {
            tracing::warn!(url = %self.url, "Timeout waiting for the connection task to stop.");
        }

        self.end_session().await;
        self.close_all_subscriptions(CONNECTION_CLOSED).await;

        self.set_status(RelayStatus::Disconnected, true);
        self.send_notification(RelayNotification::Shutdown);
    }
}

/// Send WebSocket messages with timeout set to [WEBSOCKET_TX_TIMEOUT].
async fn send_ws_msgs(tx: &mut BoxSink, msgs: Vec<WireMessage>) -> Result<(), Error> {
    let mut stream = futures::stream::iter(msgs.into_iter().map(Ok));
    match time::timeout(Some(WEBSOCKET_TX_TIMEOUT), tx.send_all(&mut stream)).await {
        Some(res) => Ok(res?),
        None => Err(Error::Timeout),
    }
}

/// Close the WebSocket connection with timeout set to [WEBSOCKET_TX_TIMEOUT].
async fn close_ws(tx: &mut BoxSink) -> Result<(), Error> {
    match time::timeout(Some(WEBSOCKET_TX_TIMEOUT), tx.close()).await {
        Some(res) => Ok(res?),
        None => Err(Error::Timeout),
    }
}
