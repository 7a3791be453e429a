//! services/api/src/adapters/notify.rs
//!
//! In-process broadcast hub implementing the `ChangeFeed` port. One channel per
//! business; the PostgreSQL listener publishes into it.

use async_trait::async_trait;
use booking_core::domain::{BookingChange, BusinessId};
use booking_core::ports::{BookingChangeStream, ChangeFeed, PortResult};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

const CHANNEL_CAPACITY: usize = 256;

type Channels = Arc<DashMap<BusinessId, broadcast::Sender<BookingChange>>>;

pub struct ChangeHub {
    channels: Channels,
}

/// A receiver that removes its business channel once the last one is dropped.
struct Subscription {
    rx: Option<broadcast::Receiver<BookingChange>>,
    channels: Channels,
    business_id: BusinessId,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.rx.take();
        self.channels
            .remove_if(&self.business_id, |_, sender| sender.receiver_count() == 0);
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeHub {
    pub fn new() -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
        }
    }

    /// Send a change to the subscribers of its business. No-op if nobody is listening.
    pub fn publish(&self, change: BookingChange) {
        let business_id = change.business_id.clone();
        if let Some(sender) = self.channels.get(&business_id) {
            if sender.send(change).is_ok() {
                return;
            }
        }
        // Every receiver is gone.
        self.channels
            .remove_if(&business_id, |_, sender| sender.receiver_count() == 0);
    }

    /// Tells every subscriber to re-fetch, e.g. after the upstream connection dropped.
    pub fn resync_all(&self) {
        for entry in self.channels.iter() {
            let _ = entry.value().send(BookingChange::resync(entry.key().clone()));
        }
    }
}

#[async_trait]
impl ChangeFeed for ChangeHub {
    async fn subscribe(&self, business_id: &BusinessId) -> PortResult<BookingChangeStream> {
        let rx = self
            .channels
            .entry(business_id.clone())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe();
        let business_id = business_id.clone();
        let mut subscription = Subscription {
            rx: Some(rx),
            channels: self.channels.clone(),
            business_id: business_id.clone(),
        };

        let stream = async_stream::stream! {
            while let Some(rx) = subscription.rx.as_mut() {
                match rx.recv().await {
                    Ok(change) => yield change,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Subscriber of '{}' skipped {} changes; forcing resync", business_id, skipped);
                        yield BookingChange::resync(business_id.clone());
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        };
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use booking_core::domain::{Booking, BookingStatus};
    use chrono::{NaiveDate, NaiveTime};
    use futures::StreamExt;
    use uuid::Uuid;

    fn change_for(business: &str) -> BookingChange {
        let business_id = BusinessId::parse(business).unwrap();
        BookingChange {
            business_id: business_id.clone(),
            old: None,
            new: Some(Booking {
                id: Uuid::new_v4(),
                business_id,
                customer_name: "Ana".into(),
                phone: String::new(),
                service: "Corte".into(),
                date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
                start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                status: BookingStatus::Scheduled,
            }),
        }
    }

    #[tokio::test]
    async fn subscribe_and_receive() {
        let hub = ChangeHub::new();
        let mut feed = hub.subscribe(&BusinessId::parse("centro").unwrap()).await.unwrap();

        hub.publish(change_for("norte"));
        let change = change_for("centro");
        hub.publish(change.clone());

        assert_eq!(feed.next().await, Some(change));
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_noop() {
        let hub = ChangeHub::new();
        hub.publish(change_for("centro"));
        assert!(hub.channels.is_empty());
    }

    #[tokio::test]
    async fn resync_reaches_every_subscriber() {
        let hub = ChangeHub::new();
        let mut feed = hub.subscribe(&BusinessId::parse("centro").unwrap()).await.unwrap();
        hub.resync_all();
        assert!(feed.next().await.unwrap().is_resync());
    }

    #[tokio::test]
    async fn lagging_subscriber_gets_a_resync_notice() {
        let hub = ChangeHub::new();
        let mut feed = hub.subscribe(&BusinessId::parse("centro").unwrap()).await.unwrap();
        for _ in 0..(CHANNEL_CAPACITY + 5) {
            hub.publish(change_for("centro"));
        }
        assert!(feed.next().await.unwrap().is_resync());
        assert!(!feed.next().await.unwrap().is_resync());
    }

    #[tokio::test]
    async fn dropped_subscriptions_release_their_channel() {
        let hub = ChangeHub::new();
        for i in 0..100 {
            let id = BusinessId::parse(&format!("nadie-{}", i)).unwrap();
            drop(hub.subscribe(&id).await.unwrap());
        }
        assert!(hub.channels.is_empty());

        let centro = BusinessId::parse("centro").unwrap();
        let first = hub.subscribe(&centro).await.unwrap();
        let mut second = hub.subscribe(&centro).await.unwrap();
        drop(first);
        assert_eq!(hub.channels.len(), 1);

        let change = change_for("centro");
        hub.publish(change.clone());
        assert_eq!(second.next().await, Some(change));
        drop(second);
        assert!(hub.channels.is_empty());
    }
}
