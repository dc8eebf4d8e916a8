//! Services Layer
//!
//! Business rules extracted from HTTP handlers. Scheduling and invoice
//! reconciliation keep their decision logic in pure functions so the rules
//! can be exercised without a database.

pub mod appointment_service;
pub mod assistant_service;
pub mod customer_service;
pub mod dashboard_service;
pub mod invoice_service;
pub mod work_order_service;

/// Error type for service operations
#[derive(Debug)]
pub enum ServiceError {
    Database(String),
    NotFound,
    Validation(String),
    Conflict(String),
    External(String),
}

impl From<sea_orm::DbErr> for ServiceError {
    fn from(e: sea_orm::DbErr) -> Self {
        ServiceError::Database(e.to_string())
    }
}
