//! crates/booking_core/src/memory.rs
//!
//! An in-process implementation of every port. It enforces the same uniqueness
//! rule as the database schema and pushes a `BookingChange` to subscribers on each
//! write, so it backs both the tests and a database-less development server.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use futures::channel::mpsc::{self, UnboundedSender};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::domain::{
    AdminCredentials, AdminIdentity, Booking, BookingChange, BookingStatus, BusinessConfig,
    BusinessId, NewBooking, Service,
};
use crate::ports::{
    AuthStore, BookingChangeStream, BookingRepository, BusinessConfigProvider, ChangeFeed,
    PortError, PortResult, ServiceCatalog,
};

#[derive(Default)]
struct Tables {
    configs: HashMap<BusinessId, BusinessConfig>,
    services: HashMap<BusinessId, Vec<(Service, bool)>>,
    bookings: Vec<Booking>,
    admins: Vec<AdminCredentials>,
    sessions: HashMap<String, (Uuid, DateTime<Utc>)>,
    subscribers: HashMap<BusinessId, Vec<UnboundedSender<BookingChange>>>,
}

impl Tables {
    fn publish(&mut self, change: BookingChange) {
        if let Some(senders) = self.subscribers.get_mut(&change.business_id) {
            senders.retain(|tx| tx.unbounded_send(change.clone()).is_ok());
            if senders.is_empty() {
                self.subscribers.remove(&change.business_id);
            }
        }
    }

    /// Drops senders whose stream is gone, and businesses left without any.
    fn prune_subscribers(&mut self) {
        self.subscribers.retain(|_, senders| {
            senders.retain(|tx| !tx.is_closed());
            !senders.is_empty()
        });
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> PortResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| PortError::Unexpected("in-memory store lock poisoned".to_string()))
    }

    pub fn put_config(&self, business_id: &BusinessId, config: BusinessConfig) -> PortResult<()> {
        self.tables()?.configs.insert(business_id.clone(), config);
        Ok(())
    }

    pub fn add_service(
        &self,
        business_id: &BusinessId,
        service: Service,
        active: bool,
    ) -> PortResult<()> {
        let mut tables = self.tables()?;
        let services = tables.services.entry(business_id.clone()).or_default();
        if services.iter().any(|(s, _)| s.name == service.name) {
            return Err(PortError::UniqueViolation(format!(
                "service '{}' already exists",
                service.name
            )));
        }
        services.push((service, active));
        Ok(())
    }
}

#[async_trait]
impl BusinessConfigProvider for InMemoryStore {
    async fn get_config(&self, business_id: &BusinessId) -> PortResult<Option<BusinessConfig>> {
        Ok(self.tables()?.configs.get(business_id).cloned())
    }
}

#[async_trait]
impl ServiceCatalog for InMemoryStore {
    async fn list_active_services(&self, business_id: &BusinessId) -> PortResult<Vec<Service>> {
        let tables = self.tables()?;
        let mut services: Vec<Service> = tables
            .services
            .get(business_id)
            .map(|all| {
                all.iter()
                    .filter(|(_, active)| *active)
                    .map(|(s, _)| s.clone())
                    .collect()
            })
            .unwrap_or_default();
        services.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(services)
    }
}

#[async_trait]
impl BookingRepository for InMemoryStore {
    async fn list_for_date(
        &self,
        business_id: &BusinessId,
        date: NaiveDate,
    ) -> PortResult<Vec<Booking>> {
        let tables = self.tables()?;
        let mut bookings: Vec<Booking> = tables
            .bookings
            .iter()
            .filter(|b| &b.business_id == business_id && b.date == date)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.start_time);
        Ok(bookings)
    }

    async fn list_for_business(&self, business_id: &BusinessId) -> PortResult<Vec<Booking>> {
        let tables = self.tables()?;
        Ok(tables
            .bookings
            .iter()
            .filter(|b| &b.business_id == business_id)
            .cloned()
            .collect())
    }

    async fn get_booking(&self, booking_id: Uuid) -> PortResult<Booking> {
        self.tables()?
            .bookings
            .iter()
            .find(|b| b.id == booking_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Booking {} not found", booking_id)))
    }

    async fn insert(&self, booking: NewBooking) -> PortResult<Booking> {
        let mut tables = self.tables()?;
        let collides = tables.bookings.iter().any(|b| {
            b.business_id == booking.business_id
                && b.date == booking.date
                && b.start_time == booking.start_time
                && b.status.occupies_slot()
        });
        if collides {
            return Err(PortError::UniqueViolation(format!(
                "{} {} {} is already booked",
                booking.business_id, booking.date, booking.start_time
            )));
        }

        let stored = Booking {
            id: Uuid::new_v4(),
            business_id: booking.business_id,
            customer_name: booking.customer_name,
            phone: booking.phone,
            service: booking.service,
            date: booking.date,
            start_time: booking.start_time,
            status: BookingStatus::Scheduled,
        };
        tables.bookings.push(stored.clone());
        tables.publish(BookingChange {
            business_id: stored.business_id.clone(),
            old: None,
            new: Some(stored.clone()),
        });
        Ok(stored)
    }

    async fn update_status(&self, booking_id: Uuid, status: BookingStatus) -> PortResult<Booking> {
        let mut tables = self.tables()?;
        let booking = tables
            .bookings
            .iter_mut()
            .find(|b| b.id == booking_id && b.status == BookingStatus::Scheduled)
            .ok_or_else(|| {
                PortError::NotFound(format!("Scheduled booking {} not found", booking_id))
            })?;

        let old = booking.clone();
        booking.status = status;
        let updated = booking.clone();
        tables.publish(BookingChange {
            business_id: updated.business_id.clone(),
            old: Some(old),
            new: Some(updated.clone()),
        });
        Ok(updated)
    }
}

#[async_trait]
impl ChangeFeed for InMemoryStore {
    async fn subscribe(&self, business_id: &BusinessId) -> PortResult<BookingChangeStream> {
        let (tx, rx) = mpsc::unbounded();
        let mut tables = self.tables()?;
        tables.prune_subscribers();
        tables
            .subscribers
            .entry(business_id.clone())
            .or_default()
            .push(tx);
        Ok(Box::pin(rx))
    }
}

#[async_trait]
impl AuthStore for InMemoryStore {
    async fn create_admin(
        &self,
        business_id: &BusinessId,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<AdminIdentity> {
        let mut tables = self.tables()?;
        if tables.admins.iter().any(|a| a.email.eq_ignore_ascii_case(email)) {
            return Err(PortError::UniqueViolation(format!("admin {} already exists", email)));
        }
        let admin = AdminCredentials {
            admin_id: Uuid::new_v4(),
            business_id: business_id.clone(),
            email: email.to_string(),
            hashed_password: hashed_password.to_string(),
        };
        let identity = AdminIdentity {
            admin_id: admin.admin_id,
            business_id: admin.business_id.clone(),
        };
        tables.admins.push(admin);
        Ok(identity)
    }

    async fn get_admin_by_email(&self, email: &str) -> PortResult<AdminCredentials> {
        self.tables()?
            .admins
            .iter()
            .find(|a| a.email.eq_ignore_ascii_case(email))
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Admin {} not found", email)))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        admin_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.tables()?
            .sessions
            .insert(session_id.to_string(), (admin_id, expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<AdminIdentity> {
        let mut tables = self.tables()?;
        let (admin_id, expires_at) = *tables
            .sessions
            .get(session_id)
            .ok_or(PortError::Unauthorized)?;
        if expires_at <= Utc::now() {
            tables.sessions.remove(session_id);
            return Err(PortError::Unauthorized);
        }
        tables
            .admins
            .iter()
            .find(|a| a.admin_id == admin_id)
            .map(|a| AdminIdentity {
                admin_id: a.admin_id,
                business_id: a.business_id.clone(),
            })
            .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.tables()?.sessions.remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveTime};
    use futures::StreamExt;

    fn centro() -> BusinessId {
        BusinessId::parse("centro").unwrap()
    }

    fn new_booking(hour: u32) -> NewBooking {
        NewBooking {
            business_id: centro(),
            customer_name: "Ana".into(),
            phone: String::new(),
            service: "Corte".into(),
            date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
            start_time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn cancelled_booking_frees_its_slot() {
        let store = InMemoryStore::new();
        let first = store.insert(new_booking(10)).await.unwrap();
        assert!(matches!(
            store.insert(new_booking(10)).await,
            Err(PortError::UniqueViolation(_))
        ));

        store
            .update_status(first.id, BookingStatus::Cancelled)
            .await
            .unwrap();
        assert!(store.insert(new_booking(10)).await.is_ok());
    }

    #[tokio::test]
    async fn update_only_applies_to_scheduled_bookings() {
        let store = InMemoryStore::new();
        let booking = store.insert(new_booking(11)).await.unwrap();
        store
            .update_status(booking.id, BookingStatus::Completed)
            .await
            .unwrap();
        assert!(matches!(
            store.update_status(booking.id, BookingStatus::Cancelled).await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn subscribers_only_see_their_business() {
        let store = InMemoryStore::new();
        let mut feed = store.subscribe(&centro()).await.unwrap();

        let mut other = new_booking(9);
        other.business_id = BusinessId::parse("norte").unwrap();
        store.insert(other).await.unwrap();
        let ours = store.insert(new_booking(9)).await.unwrap();

        let change = feed.next().await.unwrap();
        assert_eq!(change.new.map(|b| b.id), Some(ours.id));
        assert!(change.old.is_none());
    }

    #[tokio::test]
    async fn dropped_subscribers_are_pruned() {
        let store = InMemoryStore::new();
        let feed = store.subscribe(&centro()).await.unwrap();
        drop(feed);
        store.insert(new_booking(12)).await.unwrap();
        let tables = store.tables().unwrap();
        assert!(!tables.subscribers.contains_key(&centro()));
    }

    #[tokio::test]
    async fn abandoned_subscriptions_do_not_accumulate() {
        let store = InMemoryStore::new();
        for i in 0..100 {
            let id = BusinessId::parse(&format!("nadie-{}", i)).unwrap();
            drop(store.subscribe(&id).await.unwrap());
        }
        let _live = store.subscribe(&centro()).await.unwrap();

        let tables = store.tables().unwrap();
        assert_eq!(tables.subscribers.len(), 1);
        assert_eq!(tables.subscribers[&centro()].len(), 1);
    }

    #[tokio::test]
    async fn expired_sessions_are_rejected() {
        let store = InMemoryStore::new();
        let admin = store.create_admin(&centro(), "jefe@centro.test", "hash").await.unwrap();
        store
            .create_auth_session("old", admin.admin_id, Utc::now() - Duration::minutes(1))
            .await
            .unwrap();
        store
            .create_auth_session("fresh", admin.admin_id, Utc::now() + Duration::days(1))
            .await
            .unwrap();

        assert!(matches!(
            store.validate_auth_session("old").await,
            Err(PortError::Unauthorized)
        ));
        assert_eq!(store.validate_auth_session("fresh").await.unwrap(), admin);
    }
}
