//! Appointment Service - slot booking rules
//!
//! Start-time validation and the conflict scan are pure functions over the
//! day's appointment set. The availability check and the insert are separate
//! steps, so two concurrent bookings can both pass the check before either
//! commits; the first committer wins. Callers needing a hard guarantee would
//! have to add a uniqueness constraint on the slot instant.

use chrono::{DateTime, Days, Duration, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use sea_orm::*;

use super::ServiceError;
use crate::models::appointment::{self, Entity as Appointment};

/// First bookable hour of the day (inclusive)
pub const OPENING_HOUR: u32 = 9;
/// End of business hours (exclusive, last bookable start is 16:00)
pub const CLOSING_HOUR: u32 = 17;

/// Parse a client-supplied timestamp. Accepts RFC 3339 or a bare
/// `YYYY-MM-DDTHH:MM[:SS]`, which is taken as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M") {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    Err(format!("Invalid date/time: {}", raw))
}

fn store_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// Start-time checks: on the hour, and at least one full calendar day ahead.
/// Violations accumulate; the conflict scan only runs once these pass.
pub fn validate_start(now: DateTime<Utc>, candidate: DateTime<Utc>) -> Vec<String> {
    let mut violations = Vec::new();

    if candidate.minute() != 0 || candidate.second() != 0 {
        violations
            .push("Appointments must start on the hour (e.g. 09:00, 10:00, 11:00).".to_string());
    }

    // Compare in UTC against tomorrow 00:00 to avoid time-zone drift
    let min_start = (now.date_naive() + Days::new(1))
        .and_hms_opt(0, 0, 0)
        .map(|n| Utc.from_utc_datetime(&n));
    if let Some(min_start) = min_start {
        if candidate < min_start {
            violations.push("Appointment date must be from tomorrow onward.".to_string());
        }
    }

    violations
}

/// True when a non-Cancelled appointment falls inside `[candidate, candidate + 1h)`.
/// Intervals are half-open, so back-to-back slots do not conflict.
pub fn conflicts(
    candidate: DateTime<Utc>,
    existing: &[appointment::Model],
    exclude_id: Option<i32>,
) -> bool {
    let slot_end = candidate + Duration::hours(1);
    existing.iter().any(|a| {
        if a.status == "Cancelled" {
            return false;
        }
        if Some(a.id) == exclude_id {
            return false;
        }
        match parse_timestamp(&a.scheduled_at) {
            Ok(at) => at >= candidate && at < slot_end,
            Err(_) => false,
        }
    })
}

/// Hourly starts between 09:00 and 16:00 with no overlapping non-Cancelled
/// appointment, as "HH:mm" strings in ascending order.
pub fn available_slots(date: NaiveDate, existing: &[appointment::Model]) -> Vec<String> {
    let mut slots = Vec::new();
    for hour in OPENING_HOUR..CLOSING_HOUR {
        let slot_start = match date.and_hms_opt(hour, 0, 0) {
            Some(n) => Utc.from_utc_datetime(&n),
            None => continue,
        };
        if !conflicts(slot_start, existing, None) {
            slots.push(format!("{:02}:00", hour));
        }
    }
    slots
}

async fn appointments_on(
    db: &DatabaseConnection,
    date: NaiveDate,
) -> Result<Vec<appointment::Model>, ServiceError> {
    let day_start = date
        .and_hms_opt(0, 0, 0)
        .map(|n| Utc.from_utc_datetime(&n))
        .ok_or_else(|| ServiceError::Validation("Invalid date".to_string()))?;
    let day_end = day_start + Duration::days(1);

    let appointments = Appointment::find()
        .filter(appointment::Column::ScheduledAt.gte(store_timestamp(day_start)))
        .filter(appointment::Column::ScheduledAt.lt(store_timestamp(day_end)))
        .all(db)
        .await?;

    Ok(appointments)
}

/// Run the full slot validation for a candidate start against the stored
/// appointment set. Returns the violation list; empty means bookable.
pub async fn check_slot(
    db: &DatabaseConnection,
    candidate: DateTime<Utc>,
    exclude_id: Option<i32>,
) -> Result<Vec<String>, ServiceError> {
    let mut violations = validate_start(Utc::now(), candidate);

    if violations.is_empty() {
        let existing = appointments_on(db, candidate.date_naive()).await?;
        if conflicts(candidate, &existing, exclude_id) {
            violations.push("This time slot is already taken.".to_string());
        }
    }

    Ok(violations)
}

/// Free hourly slots for a given date
pub async fn list_available_slots(
    db: &DatabaseConnection,
    date: NaiveDate,
) -> Result<Vec<String>, ServiceError> {
    let existing = appointments_on(db, date).await?;
    Ok(available_slots(date, &existing))
}

/// Book a new appointment after slot validation
pub async fn create_appointment(
    db: &DatabaseConnection,
    customer_id: i32,
    vehicle_id: Option<i32>,
    scheduled_at: DateTime<Utc>,
    reason: Option<String>,
) -> Result<appointment::Model, ServiceError> {
    let violations = check_slot(db, scheduled_at, None).await?;
    if !violations.is_empty() {
        return Err(ServiceError::Validation(violations.join(" ")));
    }

    let now = Utc::now().to_rfc3339();
    let new_appointment = appointment::ActiveModel {
        customer_id: Set(customer_id),
        vehicle_id: Set(vehicle_id),
        scheduled_at: Set(store_timestamp(scheduled_at)),
        reason: Set(reason),
        status: Set("Pending".to_owned()),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };

    Ok(new_appointment.insert(db).await?)
}

/// Reschedule or edit an appointment; the slot scan skips the appointment itself
pub async fn update_appointment(
    db: &DatabaseConnection,
    id: i32,
    vehicle_id: Option<i32>,
    scheduled_at: DateTime<Utc>,
    reason: Option<String>,
    status: Option<String>,
) -> Result<appointment::Model, ServiceError> {
    let existing = Appointment::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    if let Some(status) = &status {
        if !["Pending", "Confirmed", "Completed", "Cancelled"].contains(&status.as_str()) {
            return Err(ServiceError::Validation(format!(
                "Unknown appointment status: {}",
                status
            )));
        }
    }

    let violations = check_slot(db, scheduled_at, Some(id)).await?;
    if !violations.is_empty() {
        return Err(ServiceError::Validation(violations.join(" ")));
    }

    let mut active: appointment::ActiveModel = existing.into();
    active.vehicle_id = Set(vehicle_id);
    active.scheduled_at = Set(store_timestamp(scheduled_at));
    active.reason = Set(reason);
    if let Some(status) = status {
        active.status = Set(status);
    }
    active.updated_at = Set(Utc::now().to_rfc3339());

    Ok(active.update(db).await?)
}

/// Cancel an appointment, freeing its slot
pub async fn cancel_appointment(
    db: &DatabaseConnection,
    id: i32,
) -> Result<appointment::Model, ServiceError> {
    let existing = Appointment::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    if existing.status == "Cancelled" {
        return Err(ServiceError::Validation(
            "Appointment is already cancelled".to_string(),
        ));
    }

    let mut active: appointment::ActiveModel = existing.into();
    active.status = Set("Cancelled".to_owned());
    active.updated_at = Set(Utc::now().to_rfc3339());

    Ok(active.update(db).await?)
}
