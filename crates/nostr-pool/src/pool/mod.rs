// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Relay Pool

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_utility::{task, time};
use atomic_destructor::AtomicDestructor;
use futures::future;
use nostr_proto::prelude::*;
use tokio::sync::mpsc;

mod builder;
pub mod constants;
mod error;
mod inner;
pub mod options;
mod subscription;

pub use self::builder::RelayPoolBuilder;
pub use self::error::Error;
use self::inner::InnerRelayPool;
pub use self::options::RelayPoolOptions;
pub use self::subscription::PoolSubscription;
use self::subscription::{CloseOnEose, Merger, RelayLeg};
use crate::relay::{self, PublishOutcome, Relay, SubscriptionActivity, SubscriptionHandler};
use crate::shared::SharedState;

/// Relay Pool
///
/// Shares one connection per relay url between all the callers, closing connections
/// no longer referenced after a grace period.
#[derive(Debug, Clone)]
pub struct RelayPool {
    inner: AtomicDestructor<InnerRelayPool>,
}

impl Default for RelayPool {
    #[inline]
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RelayPool {
    /// Create new relay pool with **default** options
    ///
    /// Use [`RelayPool::builder`] for customizing it.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create new relay pool with custom options
    #[inline]
    pub fn with_opts(opts: RelayPoolOptions) -> Self {
        Self::builder().opts(opts).build()
    }

    /// Construct a new relay pool builder
    #[inline]
    pub fn builder() -> RelayPoolBuilder {
        RelayPoolBuilder::default()
    }

    fn from_builder(builder: RelayPoolBuilder) -> Self {
        let state = SharedState::new(builder.transport, builder.verifier);
        Self {
            inner: AtomicDestructor::new(InnerRelayPool::new(state, builder.opts)),
        }
    }

    /// Get options
    #[inline]
    pub fn opts(&self) -> &RelayPoolOptions {
        &self.inner.opts
    }

    /// Check if the pool has been closed
    #[inline]
    pub fn is_shutdown(&self) -> bool {
        self.inner.is_shutdown()
    }

    /// Get relays of the pool, including the idle ones not closed yet
    #[inline]
    pub async fn relays(&self) -> HashMap<RelayUrl, Relay> {
        self.inner.relays().await
    }

    /// Number of callers currently using the relay, `None` if not in the pool
    #[inline]
    pub async fn ref_count<U>(&self, url: U) -> Result<Option<usize>, Error>
    where
        U: TryIntoUrl,
    {
        let url: RelayUrl = url.try_into_url()?;
        Ok(self.inner.ref_count(&url).await)
    }

    /// Get a connected relay, creating it if needed, and increase its reference count
    ///
    /// Concurrent calls for the same url share a single connection attempt.
    /// Every successful call must be balanced by a [`RelayPool::release_connection`].
    pub async fn ensure_connection<U>(&self, url: U) -> Result<Relay, Error>
    where
        U: TryIntoUrl,
    {
        let url: RelayUrl = url.try_into_url()?;
        self.inner.ensure_connection(&url).await
    }

    /// Decrease the reference count of a relay
    ///
    /// When it reaches zero, the connection is closed after the idle grace period
    /// unless acquired again in the meantime.
    pub async fn release_connection<U>(&self, url: U) -> Result<(), Error>
    where
        U: TryIntoUrl,
    {
        let url: RelayUrl = url.try_into_url()?;
        self.inner.release_connection(&url).await;
        Ok(())
    }

    /// Subscribe to the same filters on several relays
    ///
    /// Events are delivered once, whichever relay sent them first. `on_eose` is called once
    /// every relay reported the end of stored events, timed out or failed.
    /// Relays that can't be connected are skipped.
    pub async fn subscribe_many<I, U, H>(
        &self,
        urls: I,
        filters: Vec<Filter>,
        handler: H,
    ) -> Result<PoolSubscription, Error>
    where
        I: IntoIterator<Item = U>,
        U: TryIntoUrl,
        H: SubscriptionHandler + 'static,
    {
        let urls: Vec<RelayUrl> = parse_urls(urls)?;
        self.open_subscription(urls, filters, Arc::new(handler)).await
    }

    /// Like [`RelayPool::subscribe_many`], but the subscription closes itself after the end of
    /// stored events
    pub async fn subscribe_many_eose<I, U, H>(
        &self,
        urls: I,
        filters: Vec<Filter>,
        handler: H,
    ) -> Result<PoolSubscription, Error>
    where
        I: IntoIterator<Item = U>,
        U: TryIntoUrl,
        H: SubscriptionHandler + 'static,
    {
        let urls: Vec<RelayUrl> = parse_urls(urls)?;
        let (handler, done) = CloseOnEose::new(handler);
        let subscription: PoolSubscription =
            self.open_subscription(urls, filters, Arc::new(handler)).await?;

        let sub = subscription.clone();
        task::spawn(async move {
            let _ = done.await;
            sub.close().await;
        });

        Ok(subscription)
    }

    async fn open_subscription(
        &self,
        urls: Vec<RelayUrl>,
        filters: Vec<Filter>,
        handler: Arc<dyn SubscriptionHandler>,
    ) -> Result<PoolSubscription, Error> {
        if self.is_shutdown() {
            return Err(Error::Shutdown);
        }

        if filters.is_empty() {
            return Err(Error::Relay(relay::Error::FiltersEmpty));
        }

        let id: SubscriptionId = self.inner.next_subscription_id();
        let merger: Arc<Merger> = Arc::new(Merger::new(handler, &urls));

        let legs = future::join_all(
            urls.iter()
                .map(|url| self.open_leg(url, filters.clone(), merger.clone())),
        )
        .await;
        let legs: Vec<(RelayUrl, Relay, SubscriptionId)> = legs.into_iter().flatten().collect();

        tracing::debug!(
            id = %id,
            relays = legs.len(),
            requested = urls.len(),
            "Opened pool subscription."
        );

        // Relays that haven't sent EOSE in time are considered done
        let eose_timeout: Duration = self.inner.opts.eose_timeout;
        let timer = Arc::downgrade(&merger);
        task::spawn(async move {
            time::sleep(eose_timeout).await;
            if let Some(merger) = timer.upgrade() {
                merger.eose_timeout();
            }
        });

        Ok(PoolSubscription::new(
            id,
            InnerRelayPool::clone(&self.inner),
            merger,
            legs,
        ))
    }

    async fn open_leg(
        &self,
        url: &RelayUrl,
        filters: Vec<Filter>,
        merger: Arc<Merger>,
    ) -> Option<(RelayUrl, Relay, SubscriptionId)> {
        let relay: Relay = match self.inner.ensure_connection(url).await {
            Ok(relay) => relay,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Can't open subscription.");
                merger.relay_closed(url, &e.to_string());
                return None;
            }
        };

        let leg = RelayLeg {
            url: url.clone(),
            merger: merger.clone(),
        };

        match relay.subscribe(filters, leg).await {
            Ok(id) => Some((url.clone(), relay, id)),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Can't open subscription.");
                merger.relay_closed(url, &e.to_string());
                self.inner.release_connection(url).await;
                None
            }
        }
    }

    /// Publish an event to several relays
    ///
    /// Never fails on relay errors: every relay gets an outcome, a relay that can't be connected
    /// is reported as `{ok: false, message: "connection failed: ..."}`.
    pub async fn publish<I, U>(
        &self,
        urls: I,
        event: &Event,
    ) -> Result<HashMap<RelayUrl, PublishOutcome>, Error>
    where
        I: IntoIterator<Item = U>,
        U: TryIntoUrl,
    {
        if self.is_shutdown() {
            return Err(Error::Shutdown);
        }

        let urls: Vec<RelayUrl> = parse_urls(urls)?;

        let outcomes = future::join_all(urls.into_iter().map(|url| async move {
            let outcome: PublishOutcome = match self.inner.ensure_connection(&url).await {
                Ok(relay) => {
                    let outcome: PublishOutcome = relay.publish(event).await;
                    self.inner.release_connection(&url).await;
                    outcome
                }
                Err(e) => PublishOutcome::failed(e.to_string()),
            };

            tracing::debug!(url = %url, id = %event.id, outcome = %outcome, "Publish outcome.");

            (url, outcome)
        }))
        .await;

        Ok(outcomes.into_iter().collect())
    }

    /// Fetch stored events from several relays
    ///
    /// Events are collected until the end of stored events or the `timeout`, then returned
    /// deduplicated and sorted by `created_at` (ascending, ties broken by id).
    pub async fn query_sync<I, U>(
        &self,
        urls: I,
        filters: Vec<Filter>,
        timeout: Duration,
    ) -> Result<Vec<Event>, Error>
    where
        I: IntoIterator<Item = U>,
        U: TryIntoUrl,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<SubscriptionActivity>();
        let subscription: PoolSubscription = self.subscribe_many(urls, filters, tx).await?;

        let mut events: Vec<Event> = Vec::new();

        let completed: Option<()> = time::timeout(Some(timeout), async {
            while let Some(activity) = rx.recv().await {
                match activity {
                    SubscriptionActivity::Event(event) => events.push(*event),
                    SubscriptionActivity::EndOfStoredEvents | SubscriptionActivity::Closed(..) => {
                        break
                    }
                }
            }
        })
        .await;

        if completed.is_none() {
            tracing::debug!(id = %subscription.id(), "Query timed out, returning partial result.");
        }

        subscription.close().await;

        events.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        Ok(events)
    }

    /// Fetch the newest event matching the filter
    pub async fn get<I, U>(
        &self,
        urls: I,
        filter: Filter,
        timeout: Duration,
    ) -> Result<Option<Event>, Error>
    where
        I: IntoIterator<Item = U>,
        U: TryIntoUrl,
    {
        let mut events: Vec<Event> = self.query_sync(urls, vec![filter.limit(1)], timeout).await?;
        Ok(events.pop())
    }

    /// Close all relays and mark the pool as shutdown
    ///
    /// Idempotent. Every following operation returns [`Error::Shutdown`].
    #[inline]
    pub async fn close(&self) {
        self.inner.close().await
    }
}

/// Parse and deduplicate urls, keeping their order
fn parse_urls<I, U>(urls: I) -> Result<Vec<RelayUrl>, Error>
where
    I: IntoIterator<Item = U>,
    U: TryIntoUrl,
{
    let mut list: Vec<RelayUrl> = Vec::new();

    for url in urls.into_iter() {
        let url: RelayUrl = url.try_into_url()?;
        if !list.contains(&url) {
            list.push(url);
        }
    }

    if list.is_empty() {
        return Err(Error::NoRelaysSpecified);
    }

    Ok(list)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::future::Future;
    use std::time::Instant;

    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::relay::{RelayOptions, RelayStatus};
    use crate::transport::mock::{MockBehavior, MockNetwork, note, url};

    const WAIT: Duration = Duration::from_secs(3);

    fn fast_opts() -> RelayPoolOptions {
        RelayPoolOptions::new()
            .relay(
                RelayOptions::default()
                    .connect_timeout(Duration::from_millis(500))
                    .publish_timeout(Duration::from_millis(300)),
            )
            .eose_timeout(Duration::from_millis(300))
            .idle_grace_period(Duration::from_secs(60))
    }

    fn pool(network: &MockNetwork, opts: RelayPoolOptions) -> RelayPool {
        RelayPool::builder()
            .transport(network.clone())
            .opts(opts)
            .build()
    }

    fn text_notes() -> Vec<Filter> {
        vec![Filter::new().kind(Kind::TEXT_NOTE).limit(10)]
    }

    async fn next(rx: &mut UnboundedReceiver<SubscriptionActivity>) -> SubscriptionActivity {
        time::timeout(Some(WAIT), rx.recv())
            .await
            .flatten()
            .expect("no subscription activity")
    }

    async fn nothing(rx: &mut UnboundedReceiver<SubscriptionActivity>) {
        if let Some(Some(activity)) = time::timeout(Some(Duration::from_millis(100)), rx.recv()).await
        {
            panic!("unexpected activity: {activity:?}");
        }
    }

    /// Collect events until the end of stored events
    async fn until_eose(rx: &mut UnboundedReceiver<SubscriptionActivity>) -> Vec<Event> {
        let mut events = Vec::new();
        loop {
            match next(rx).await {
                SubscriptionActivity::Event(event) => events.push(*event),
                SubscriptionActivity::EndOfStoredEvents => return events,
                SubscriptionActivity::Closed(reason) => panic!("closed: {reason}"),
            }
        }
    }

    async fn wait_until<F, Fut>(mut condition: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        time::timeout(Some(WAIT), async {
            while !condition().await {
                time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached");
    }

    #[tokio::test]
    async fn test_subscribe_many_deduplicates_events() {
        let network = MockNetwork::new();
        let a = url("wss://a.example.com");
        let b = url("wss://b.example.com");
        let e1 = note(1, 10, "e1");
        let e2 = note(2, 20, "e2");
        let e3 = note(3, 30, "e3");
        network.serve(&a, MockBehavior::default().events(vec![e1.clone(), e2.clone()]));
        network.serve(&b, MockBehavior::default().events(vec![e2.clone(), e3.clone()]));

        let pool = pool(&network, fast_opts());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = pool
            .subscribe_many([&a, &b], text_notes(), tx)
            .await
            .unwrap();

        assert_eq!(sub.relays().len(), 2);

        let events = until_eose(&mut rx).await;
        let ids: HashSet<EventId> = events.iter().map(|e| e.id).collect();
        assert_eq!(events.len(), 3);
        assert_eq!(ids, HashSet::from([e1.id, e2.id, e3.id]));

        // A single merged EOSE
        nothing(&mut rx).await;
    }

    #[tokio::test]
    async fn test_merged_eose_waits_for_slow_relay() {
        let network = MockNetwork::new();
        let a = url("wss://a.example.com");
        let slow = url("wss://slow.example.com");
        let e1 = note(1, 10, "e1");
        network.serve(&a, MockBehavior::default().events(vec![e1.clone()]));
        network.serve(&slow, MockBehavior::default().silent());

        let pool = pool(&network, fast_opts());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let start = Instant::now();
        let _sub = pool
            .subscribe_many([&a, &slow], text_notes(), tx)
            .await
            .unwrap();

        assert_eq!(next(&mut rx).await, SubscriptionActivity::Event(Box::new(e1)));

        // The slow relay is still pending
        nothing(&mut rx).await;

        assert_eq!(next(&mut rx).await, SubscriptionActivity::EndOfStoredEvents);
        assert!(start.elapsed() >= Duration::from_millis(300));

        nothing(&mut rx).await;
    }

    #[tokio::test]
    async fn test_eose_timeout_starts_after_connecting() {
        let network = MockNetwork::new();
        let slow = url("wss://slow.example.com");
        network.serve(&slow, MockBehavior::default().silent());
        network.connect_delay(Duration::from_millis(200));

        let pool = pool(&network, fast_opts());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let start = Instant::now();
        let _sub = pool.subscribe_many([&slow], text_notes(), tx).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(200));

        assert_eq!(next(&mut rx).await, SubscriptionActivity::EndOfStoredEvents);
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_unreachable_relay_counts_as_done() {
        let network = MockNetwork::new();
        let a = url("wss://a.example.com");
        let down = url("wss://down.example.com");
        network.serve(&a, MockBehavior::default().events(vec![note(1, 10, "e1")]));
        network.refuse(&down);

        let pool = pool(&network, fast_opts().eose_timeout(Duration::from_secs(60)));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = pool
            .subscribe_many([&a, &down], text_notes(), tx)
            .await
            .unwrap();

        assert_eq!(sub.relays().len(), 1);
        assert!(sub.relays().contains_key(&a));
        assert_eq!(pool.ref_count(&down).await.unwrap(), Some(0));

        let events = until_eose(&mut rx).await;
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn test_all_relays_unreachable() {
        let network = MockNetwork::new();
        let a = url("wss://a.example.com");
        let b = url("wss://b.example.com");
        network.refuse(&a);
        network.refuse(&b);

        let pool = pool(&network, fast_opts());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = pool
            .subscribe_many([&a, &b], text_notes(), tx)
            .await
            .unwrap();

        assert!(sub.relays().is_empty());
        assert_eq!(next(&mut rx).await, SubscriptionActivity::EndOfStoredEvents);
        match next(&mut rx).await {
            SubscriptionActivity::Closed(reason) => assert!(reason.starts_with("connection failed")),
            activity => panic!("unexpected activity: {activity:?}"),
        }
        assert!(sub.is_closed());

        // Already closed
        sub.close().await;
        nothing(&mut rx).await;
    }

    #[tokio::test]
    async fn test_relay_closes_subscription() {
        let network = MockNetwork::new();
        let a = url("wss://a.example.com");

        let pool = pool(&network, fast_opts());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = pool.subscribe_many([&a], text_notes(), tx).await.unwrap();

        let mut session = network.accept(&a).await;
        let (id, _) = session.expect_req().await;
        assert_eq!(sub.relays().get(&a), Some(&id));

        session.send(RelayMessage::closed(id, "error: shutting down"));

        assert_eq!(next(&mut rx).await, SubscriptionActivity::EndOfStoredEvents);
        assert_eq!(
            next(&mut rx).await,
            SubscriptionActivity::Closed(String::from("error: shutting down"))
        );
        assert!(sub.is_closed());

        // References are released on close
        assert_eq!(pool.ref_count(&a).await.unwrap(), Some(1));
        sub.close().await;
        assert_eq!(pool.ref_count(&a).await.unwrap(), Some(0));
        nothing(&mut rx).await;
    }

    #[tokio::test]
    async fn test_close_subscription_is_idempotent() {
        let network = MockNetwork::new();
        let a = url("wss://a.example.com");
        let relay = network.serve(&a, MockBehavior::default());

        let pool = pool(&network, fast_opts());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = pool.subscribe_many([&a], text_notes(), tx).await.unwrap();

        assert_eq!(next(&mut rx).await, SubscriptionActivity::EndOfStoredEvents);
        assert_eq!(pool.ref_count(&a).await.unwrap(), Some(1));
        assert!(!sub.is_closed());

        sub.close().await;
        sub.close().await;

        assert!(sub.is_closed());
        assert_eq!(
            next(&mut rx).await,
            SubscriptionActivity::Closed(String::from("closed-by-client"))
        );
        nothing(&mut rx).await;
        assert_eq!(pool.ref_count(&a).await.unwrap(), Some(0));

        let relay = &relay;
        wait_until(move || async move {
            relay
                .received()
                .iter()
                .any(|m| matches!(m, ClientMessage::Close(..)))
        })
        .await;
    }

    #[tokio::test]
    async fn test_subscribe_many_eose_closes_itself() {
        let network = MockNetwork::new();
        let a = url("wss://a.example.com");
        let b = url("wss://b.example.com");
        network.serve(&a, MockBehavior::default().events(vec![note(1, 10, "e1")]));
        network.serve(&b, MockBehavior::default());

        let pool = pool(&network, fast_opts());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = pool
            .subscribe_many_eose([&a, &b], text_notes(), tx)
            .await
            .unwrap();

        let events = until_eose(&mut rx).await;
        assert_eq!(events.len(), 1);
        assert_eq!(
            next(&mut rx).await,
            SubscriptionActivity::Closed(String::from("closed-by-client"))
        );
        assert!(sub.is_closed());

        let (pool, a) = (&pool, &a);
        wait_until(move || async move { pool.ref_count(a).await.unwrap() == Some(0) }).await;
    }

    #[tokio::test]
    async fn test_dropped_subscription_releases_connections() {
        let network = MockNetwork::new();
        let a = url("wss://a.example.com");
        network.serve(&a, MockBehavior::default());

        let pool = pool(&network, fast_opts());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = pool.subscribe_many([&a], text_notes(), tx).await.unwrap();
        assert_eq!(next(&mut rx).await, SubscriptionActivity::EndOfStoredEvents);

        drop(sub);

        assert_eq!(
            next(&mut rx).await,
            SubscriptionActivity::Closed(String::from("closed-by-client"))
        );
        let (pool, a) = (&pool, &a);
        wait_until(move || async move { pool.ref_count(a).await.unwrap() == Some(0) }).await;
    }

    #[tokio::test]
    async fn test_publish_reports_every_relay() {
        let network = MockNetwork::new();
        let ok = url("wss://ok.example.com");
        let rejecting = url("wss://rejecting.example.com");
        let mute = url("wss://mute.example.com");
        let down = url("wss://down.example.com");
        let ok_relay = network.serve(&ok, MockBehavior::default());
        network.serve(&rejecting, MockBehavior::default().reject());
        network.serve(&mute, MockBehavior::default().no_ack());
        network.refuse(&down);

        let pool = pool(&network, fast_opts());
        let event = note(1, 10, "hello");

        let outcomes = pool
            .publish([&ok, &rejecting, &mute, &down], &event)
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 4);

        assert!(outcomes[&ok].ok);
        assert_eq!(ok_relay.stored(), vec![event.clone()]);

        assert!(!outcomes[&rejecting].ok);
        assert_eq!(outcomes[&rejecting].message, "blocked: test");

        assert!(!outcomes[&mute].ok);
        assert!(outcomes[&mute].is_timeout());

        assert!(!outcomes[&down].ok);
        assert!(outcomes[&down].message.starts_with("connection failed"));

        // References released after publishing
        assert_eq!(pool.ref_count(&ok).await.unwrap(), Some(0));
        assert_eq!(pool.ref_count(&down).await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_query_sync_is_deduplicated_and_sorted() {
        let network = MockNetwork::new();
        let a = url("wss://a.example.com");
        let b = url("wss://b.example.com");
        let e1 = note(1, 20, "e1");
        let e2 = note(2, 10, "e2");
        let e3 = note(3, 10, "e3");
        let e4 = note(4, 30, "e4");
        network.serve(&a, MockBehavior::default().events(vec![e1.clone(), e2.clone()]));
        network.serve(
            &b,
            MockBehavior::default().events(vec![e2.clone(), e3.clone(), e4.clone()]),
        );

        let pool = pool(&network, fast_opts());
        let events = pool
            .query_sync([&a, &b], text_notes(), WAIT)
            .await
            .unwrap();

        assert_eq!(events.len(), 4);

        // e2 and e3 share the same timestamp: ordered by id
        let (first, second) = if e2.id < e3.id { (&e2, &e3) } else { (&e3, &e2) };
        assert_eq!(events, vec![first.clone(), second.clone(), e1, e4]);

        // Subscription closed
        assert_eq!(pool.ref_count(&a).await.unwrap(), Some(0));
        assert_eq!(pool.ref_count(&b).await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_query_sync_timeout_returns_partial_result() {
        let network = MockNetwork::new();
        let a = url("wss://a.example.com");
        network.serve(
            &a,
            MockBehavior::default()
                .events(vec![note(1, 10, "e1")])
                .silent(),
        );

        let pool = pool(&network, fast_opts().eose_timeout(Duration::from_secs(60)));
        let start = Instant::now();
        let events = pool
            .query_sync([&a], text_notes(), Duration::from_millis(200))
            .await
            .unwrap();

        assert_eq!(events.len(), 1);
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_get_newest_event() {
        let network = MockNetwork::new();
        let a = url("wss://a.example.com");
        let b = url("wss://b.example.com");
        let newest = note(2, 30, "newest");
        network.serve(&a, MockBehavior::default().events(vec![note(1, 10, "old")]));
        network.serve(&b, MockBehavior::default().events(vec![newest.clone()]));

        let pool = pool(&network, fast_opts());
        let event = pool
            .get([&a, &b], Filter::new().kind(Kind::TEXT_NOTE), WAIT)
            .await
            .unwrap();
        assert_eq!(event, Some(newest));

        let event = pool
            .get([&a], Filter::new().kind(Kind::METADATA), WAIT)
            .await
            .unwrap();
        assert_eq!(event, None);
    }

    #[tokio::test]
    async fn test_ensure_connection_is_shared() {
        let network = MockNetwork::new();
        let a = url("wss://a.example.com");
        network.serve(&a, MockBehavior::default());
        network.connect_delay(Duration::from_millis(100));

        let pool = pool(&network, fast_opts());

        let (r1, r2) = tokio::join!(pool.ensure_connection(&a), pool.ensure_connection(&a));
        let (r1, r2) = (r1.unwrap(), r2.unwrap());

        assert_eq!(r1, r2);
        assert!(r1.is_connected());
        assert_eq!(network.attempts(&a), 1);
        assert_eq!(pool.ref_count(&a).await.unwrap(), Some(2));
        assert_eq!(pool.relays().await.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_connection_is_not_referenced() {
        let network = MockNetwork::new();
        let a = url("wss://a.example.com");
        network.refuse(&a);

        let pool = pool(&network, fast_opts());

        let res = pool.ensure_connection(&a).await;
        assert!(matches!(res.unwrap_err(), Error::Relay(relay::Error::Connect(..))));
        assert_eq!(pool.ref_count(&a).await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_release_closes_after_grace_period() {
        let network = MockNetwork::new();
        let a = url("wss://a.example.com");
        network.serve(&a, MockBehavior::default());

        let pool = pool(&network, fast_opts().idle_grace_period(Duration::from_millis(100)));

        let relay = pool.ensure_connection(&a).await.unwrap();
        pool.release_connection(&a).await.unwrap();

        // Still open during the grace period
        assert_eq!(pool.ref_count(&a).await.unwrap(), Some(0));
        assert!(relay.is_connected());

        let p = &pool;
        wait_until(move || async move { p.relays().await.is_empty() }).await;

        let r = &relay;
        wait_until(move || async move { r.status() == RelayStatus::Disconnected }).await;

        // Release without reference does nothing
        pool.release_connection(&a).await.unwrap();
        assert_eq!(pool.ref_count(&a).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reacquire_during_grace_period() {
        let network = MockNetwork::new();
        let a = url("wss://a.example.com");
        network.serve(&a, MockBehavior::default());

        let pool = pool(&network, fast_opts().idle_grace_period(Duration::from_millis(200)));

        let relay = pool.ensure_connection(&a).await.unwrap();
        pool.release_connection(&a).await.unwrap();
        let again = pool.ensure_connection(&a).await.unwrap();

        time::sleep(Duration::from_millis(400)).await;

        assert_eq!(relay, again);
        assert!(again.is_connected());
        assert_eq!(pool.ref_count(&a).await.unwrap(), Some(1));
        assert_eq!(network.attempts(&a), 1);
    }

    #[tokio::test]
    async fn test_invalid_urls() {
        let pool = pool(&MockNetwork::new(), fast_opts());

        let (tx, _rx) = mpsc::unbounded_channel();
        let res = pool.subscribe_many(["ftp://a.example.com"], text_notes(), tx);
        assert!(matches!(res.await.unwrap_err(), Error::Url(..)));

        let urls: Vec<RelayUrl> = Vec::new();
        let res = pool.publish(urls, &note(1, 10, "hello")).await;
        assert!(matches!(res.unwrap_err(), Error::NoRelaysSpecified));
    }

    #[tokio::test]
    async fn test_close_pool() {
        let network = MockNetwork::new();
        let a = url("wss://a.example.com");
        network.serve(&a, MockBehavior::default().silent());

        let pool = pool(&network, fast_opts());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = pool.subscribe_many([&a], text_notes(), tx).await.unwrap();
        let relay = pool.ensure_connection(&a).await.unwrap();

        pool.close().await;
        pool.close().await;

        assert!(pool.is_shutdown());
        assert!(pool.relays().await.is_empty());
        assert_eq!(relay.status(), RelayStatus::Disconnected);

        // Subscriptions are closed with the connection
        assert_eq!(next(&mut rx).await, SubscriptionActivity::EndOfStoredEvents);
        assert_eq!(
            next(&mut rx).await,
            SubscriptionActivity::Closed(String::from("connection-closed"))
        );
        assert!(sub.is_closed());

        assert!(matches!(
            pool.ensure_connection(&a).await.unwrap_err(),
            Error::Shutdown
        ));
        assert!(matches!(
            pool.publish([&a], &note(1, 10, "hello")).await.unwrap_err(),
            Error::Shutdown
        ));
        assert!(matches!(
            pool.query_sync([&a], text_notes(), WAIT).await.unwrap_err(),
            Error::Shutdown
        ));
    }
}
