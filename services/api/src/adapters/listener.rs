//! services/api/src/adapters/listener.rs
//!
//! Bridges PostgreSQL `NOTIFY booking_changes` into the in-process `ChangeHub`.

use crate::adapters::db::BookingRecord;
use crate::adapters::notify::ChangeHub;
use booking_core::domain::{BookingChange, BusinessId};
use booking_core::ports::{PortError, PortResult};
use serde::Deserialize;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Channel the `bookings` trigger notifies on.
pub const CHANGE_CHANNEL: &str = "booking_changes";

const RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Deserialize)]
struct ChangePayload {
    business_id: String,
    old: Option<BookingRecord>,
    new: Option<BookingRecord>,
}

/// Decodes the JSON body produced by the `notify_booking_change` trigger.
pub fn parse_payload(payload: &str) -> PortResult<BookingChange> {
    let raw: ChangePayload = serde_json::from_str(payload)
        .map_err(|e| PortError::Unexpected(format!("Malformed change payload: {}", e)))?;
    let business_id = BusinessId::parse(&raw.business_id)
        .ok_or_else(|| PortError::Unexpected("Change payload without business".to_string()))?;
    Ok(BookingChange {
        business_id,
        old: raw.old.map(BookingRecord::to_domain).transpose()?,
        new: raw.new.map(BookingRecord::to_domain).transpose()?,
    })
}

/// Listens forever. When the connection drops, `PgListener` reconnects and every
/// subscriber is told to resync, since notifications sent meanwhile are lost.
pub async fn run_change_listener(pool: PgPool, hub: Arc<ChangeHub>) -> Result<(), sqlx::Error> {
    let mut listener = PgListener::connect_with(&pool).await?;
    listener.listen(CHANGE_CHANNEL).await?;
    info!("Listening for booking changes on '{}'", CHANGE_CHANNEL);

    loop {
        match listener.try_recv().await? {
            Some(notification) => match parse_payload(notification.payload()) {
                Ok(change) => hub.publish(change),
                Err(e) => warn!("Ignoring change notification: {}", e),
            },
            None => {
                warn!("Change listener connection lost; reconnecting and resyncing subscribers.");
                hub.resync_all();
            }
        }
    }
}

/// Runs the listener for the life of the process. After each failure every
/// subscriber is told to resync and the listener is started again.
pub async fn supervise_change_listener(pool: PgPool, hub: Arc<ChangeHub>) {
    restart_on_failure(&hub, RETRY_DELAY, || {
        run_change_listener(pool.clone(), hub.clone())
    })
    .await
}

async fn restart_on_failure<F, Fut>(hub: &ChangeHub, delay: Duration, mut run: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), sqlx::Error>>,
{
    let mut failures: u32 = 0;
    loop {
        match run().await {
            Ok(()) => return,
            Err(e) => {
                failures += 1;
                error!(
                    "Change listener failed ({} so far): {:?}. Retrying in {:?}.",
                    failures, e, delay
                );
                hub.resync_all();
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use booking_core::domain::BookingStatus;
    use chrono::NaiveDate;

    const UPDATE_PAYLOAD: &str = r#"{
        "business_id": "centro",
        "old": {"id": "5f0c6a52-7d4e-4c5b-9a43-0e6f4c1d2a10", "business_id": "centro",
                "customer_name": "Ana", "phone": "", "service": "Corte",
                "date": "2026-10-20", "start_time": "14:00:00", "status": "scheduled",
                "created_at": "2026-10-16T10:00:00.000+00:00"},
        "new": {"id": "5f0c6a52-7d4e-4c5b-9a43-0e6f4c1d2a10", "business_id": "centro",
                "customer_name": "Ana", "phone": "", "service": "Corte",
                "date": "2026-10-20", "start_time": "14:00:00", "status": "completed",
                "created_at": "2026-10-16T10:00:00.000+00:00"}
    }"#;

    #[test]
    fn decodes_trigger_payload() {
        let change = parse_payload(UPDATE_PAYLOAD).unwrap();
        assert_eq!(change.business_id.as_str(), "centro");
        assert_eq!(change.old.unwrap().status, BookingStatus::Scheduled);
        let new = change.new.unwrap();
        assert_eq!(new.status, BookingStatus::Completed);
        assert_eq!(new.date, NaiveDate::from_ymd_opt(2026, 10, 20).unwrap());
    }

    #[test]
    fn empty_payload_reads_as_resync() {
        let payload = r#"{"business_id": "centro", "old": null, "new": null}"#;
        let change = parse_payload(payload).unwrap();
        assert!(change.is_resync());
    }

    #[tokio::test]
    async fn failed_listener_is_restarted_after_a_resync() {
        use booking_core::ports::ChangeFeed;
        use futures::StreamExt;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let hub = ChangeHub::new();
        let mut feed = hub.subscribe(&BusinessId::parse("centro").unwrap()).await.unwrap();
        let runs = AtomicUsize::new(0);

        restart_on_failure(&hub, Duration::from_millis(1), || {
            let run = runs.fetch_add(1, Ordering::SeqCst);
            async move {
                if run < 2 {
                    Err(sqlx::Error::PoolTimedOut)
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert!(feed.next().await.unwrap().is_resync());
        assert!(feed.next().await.unwrap().is_resync());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_payload("not json").is_err());
        assert!(parse_payload(r#"{"business_id": " ", "old": null, "new": null}"#).is_err());
    }
}
