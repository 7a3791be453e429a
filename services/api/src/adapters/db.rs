//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the PostgreSQL implementation of the
//! booking ports from the `core` crate. It handles all interactions with the
//! database using `sqlx`.

use async_trait::async_trait;
use booking_core::domain::{
    AdminCredentials, AdminIdentity, Booking, BookingStatus, BusinessConfig, BusinessId,
    NewBooking, Service,
};
use booking_core::ports::{
    AuthStore, BookingRepository, BusinessConfigProvider, PortError, PortResult, ServiceCatalog,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::Deserialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the booking ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

/// Maps a write error, keeping unique-key collisions distinguishable from other failures.
fn map_write_error(e: sqlx::Error) -> PortError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            PortError::UniqueViolation(db.message().to_string())
        }
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn map_read_error(e: sqlx::Error, what: impl FnOnce() -> String) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what()),
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ConfigRecord {
    opening_time: NaiveTime,
    closing_time: NaiveTime,
    operating_days: Vec<String>,
}
impl ConfigRecord {
    fn to_domain(self) -> PortResult<BusinessConfig> {
        let operating_days = self
            .operating_days
            .iter()
            .map(|day| {
                day.parse::<Weekday>()
                    .map_err(|_| PortError::Unexpected(format!("Invalid operating day '{}'", day)))
            })
            .collect::<PortResult<Vec<Weekday>>>()?;
        Ok(BusinessConfig {
            opening_time: self.opening_time,
            closing_time: self.closing_time,
            operating_days,
        })
    }
}

#[derive(FromRow)]
struct ServiceRecord {
    name: String,
    duration_minutes: i32,
}
impl ServiceRecord {
    fn to_domain(self) -> PortResult<Service> {
        let duration_minutes = u32::try_from(self.duration_minutes).map_err(|_| {
            PortError::Unexpected(format!(
                "Service '{}' has invalid duration {}",
                self.name, self.duration_minutes
            ))
        })?;
        Ok(Service {
            name: self.name,
            duration_minutes,
        })
    }
}

/// A `bookings` row. Also decoded from the JSON of change notifications.
#[derive(FromRow, Deserialize, Debug, Clone)]
pub(crate) struct BookingRecord {
    id: Uuid,
    business_id: String,
    customer_name: String,
    phone: String,
    service: String,
    date: NaiveDate,
    start_time: NaiveTime,
    status: String,
}
impl BookingRecord {
    pub(crate) fn to_domain(self) -> PortResult<Booking> {
        let business_id = BusinessId::parse(&self.business_id)
            .ok_or_else(|| PortError::Unexpected(format!("Booking {} has no business", self.id)))?;
        let status = self
            .status
            .parse::<BookingStatus>()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(Booking {
            id: self.id,
            business_id,
            customer_name: self.customer_name,
            phone: self.phone,
            service: self.service,
            date: self.date,
            start_time: self.start_time,
            status,
        })
    }
}

const BOOKING_COLUMNS: &str =
    "id, business_id, customer_name, phone, service, date, start_time, status";

#[derive(FromRow)]
struct AdminRecord {
    id: Uuid,
    business_id: String,
    email: String,
    hashed_password: String,
}
impl AdminRecord {
    fn to_domain(self) -> PortResult<AdminCredentials> {
        let business_id = BusinessId::parse(&self.business_id)
            .ok_or_else(|| PortError::Unexpected(format!("Admin {} has no business", self.id)))?;
        Ok(AdminCredentials {
            admin_id: self.id,
            business_id,
            email: self.email,
            hashed_password: self.hashed_password,
        })
    }
}

//=========================================================================================
// Port Implementations
//=========================================================================================

#[async_trait]
impl BusinessConfigProvider for DbAdapter {
    async fn get_config(&self, business_id: &BusinessId) -> PortResult<Option<BusinessConfig>> {
        let record = sqlx::query_as::<_, ConfigRecord>(
            "SELECT opening_time, closing_time, operating_days FROM business_config WHERE business_id = $1",
        )
        .bind(business_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        record.map(ConfigRecord::to_domain).transpose()
    }
}

#[async_trait]
impl ServiceCatalog for DbAdapter {
    async fn list_active_services(&self, business_id: &BusinessId) -> PortResult<Vec<Service>> {
        let records = sqlx::query_as::<_, ServiceRecord>(
            "SELECT name, duration_minutes FROM services WHERE business_id = $1 AND active ORDER BY name ASC",
        )
        .bind(business_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        records.into_iter().map(ServiceRecord::to_domain).collect()
    }
}

#[async_trait]
impl BookingRepository for DbAdapter {
    async fn list_for_date(
        &self,
        business_id: &BusinessId,
        date: NaiveDate,
    ) -> PortResult<Vec<Booking>> {
        let records = sqlx::query_as::<_, BookingRecord>(&format!(
            "SELECT {} FROM bookings WHERE business_id = $1 AND date = $2 ORDER BY start_time ASC",
            BOOKING_COLUMNS
        ))
        .bind(business_id.as_str())
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        records.into_iter().map(BookingRecord::to_domain).collect()
    }

    async fn list_for_business(&self, business_id: &BusinessId) -> PortResult<Vec<Booking>> {
        let records = sqlx::query_as::<_, BookingRecord>(&format!(
            "SELECT {} FROM bookings WHERE business_id = $1 ORDER BY date ASC, start_time ASC",
            BOOKING_COLUMNS
        ))
        .bind(business_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        records.into_iter().map(BookingRecord::to_domain).collect()
    }

    async fn get_booking(&self, booking_id: Uuid) -> PortResult<Booking> {
        let record = sqlx::query_as::<_, BookingRecord>(&format!(
            "SELECT {} FROM bookings WHERE id = $1",
            BOOKING_COLUMNS
        ))
        .bind(booking_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_read_error(e, || format!("Booking {} not found", booking_id)))?;

        record.to_domain()
    }

    async fn insert(&self, booking: NewBooking) -> PortResult<Booking> {
        let record = sqlx::query_as::<_, BookingRecord>(&format!(
            "INSERT INTO bookings (id, business_id, customer_name, phone, service, date, start_time, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            BOOKING_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(booking.business_id.as_str())
        .bind(&booking.customer_name)
        .bind(&booking.phone)
        .bind(&booking.service)
        .bind(booking.date)
        .bind(booking.start_time)
        .bind(BookingStatus::Scheduled.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)?;

        record.to_domain()
    }

    async fn update_status(&self, booking_id: Uuid, status: BookingStatus) -> PortResult<Booking> {
        let record = sqlx::query_as::<_, BookingRecord>(&format!(
            "UPDATE bookings SET status = $1 WHERE id = $2 AND status = $3 RETURNING {}",
            BOOKING_COLUMNS
        ))
        .bind(status.as_str())
        .bind(booking_id)
        .bind(BookingStatus::Scheduled.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_read_error(e, || format!("Scheduled booking {} not found", booking_id)))?;

        record.to_domain()
    }
}

#[async_trait]
impl AuthStore for DbAdapter {
    async fn create_admin(
        &self,
        business_id: &BusinessId,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<AdminIdentity> {
        let admin_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO admins (id, business_id, email, hashed_password) VALUES ($1, $2, $3, $4)",
        )
        .bind(admin_id)
        .bind(business_id.as_str())
        .bind(email)
        .bind(hashed_password)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(AdminIdentity {
            admin_id,
            business_id: business_id.clone(),
        })
    }

    async fn get_admin_by_email(&self, email: &str) -> PortResult<AdminCredentials> {
        let record = sqlx::query_as::<_, AdminRecord>(
            "SELECT id, business_id, email, hashed_password FROM admins WHERE lower(email) = lower($1)",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_read_error(e, || format!("Admin {} not found", email)))?;

        record.to_domain()
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        admin_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, admin_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(admin_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<AdminIdentity> {
        let row = sqlx::query_as::<_, (Uuid, String)>(
            "SELECT a.id, a.business_id FROM auth_sessions s \
             JOIN admins a ON a.id = s.admin_id \
             WHERE s.id = $1 AND s.expires_at > now()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let (admin_id, business_id) = row.ok_or(PortError::Unauthorized)?;
        let business_id = BusinessId::parse(&business_id).ok_or(PortError::Unauthorized)?;
        Ok(AdminIdentity {
            admin_id,
            business_id,
        })
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }
}
