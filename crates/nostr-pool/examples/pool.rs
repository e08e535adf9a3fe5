// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

use std::time::Duration;

use nostr_pool::prelude::*;

const RELAYS: [&str; 3] = ["wss://relay.damus.io", "wss://nos.lol", "wss://relay.primal.net"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let opts = RelayPoolOptions::new()
        .eose_timeout(Duration::from_secs(10))
        .idle_grace_period(Duration::from_secs(5));
    let pool = RelayPool::with_opts(opts);

    // Stored events, deduplicated and sorted
    let filter = Filter::new().kind(Kind::TEXT_NOTE).limit(5);
    let events = pool
        .query_sync(RELAYS, vec![filter], Duration::from_secs(15))
        .await?;

    for event in events.iter() {
        println!("{} {}: {}", event.created_at, event.id, event.content);
    }

    // Live events
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let filter = Filter::new().kind(Kind::TEXT_NOTE).limit(0);
    let subscription = pool.subscribe_many(RELAYS, vec![filter], tx).await?;

    println!("Subscribed to {} relays", subscription.relays().len());

    let mut received: usize = 0;
    while let Some(activity) = rx.recv().await {
        match activity {
            SubscriptionActivity::Event(event) => {
                println!("Live: {}", event.content);
                received += 1;
                if received >= 10 {
                    break;
                }
            }
            SubscriptionActivity::EndOfStoredEvents => println!("End of stored events"),
            SubscriptionActivity::Closed(reason) => {
                println!("Closed: {reason}");
                break;
            }
        }
    }

    subscription.close().await;
    pool.close().await;

    Ok(())
}
