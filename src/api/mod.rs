pub mod admin;
pub mod appointments;
pub mod auth;
pub mod chat;
pub mod customers;
pub mod dashboard;
pub mod health;
pub mod invoices;
pub mod parts;
pub mod payments;
pub mod vehicles;
pub mod work_orders;

use axum::{
    http::StatusCode,
    routing::{delete, get, post, put},
    Router,
};
use sea_orm::DatabaseConnection;

use crate::services::ServiceError;

/// Map service failures onto HTTP status codes
pub(crate) fn err(e: ServiceError) -> (StatusCode, String) {
    match e {
        ServiceError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
        ServiceError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
        ServiceError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        ServiceError::External(msg) => (StatusCode::BAD_GATEWAY, msg),
        ServiceError::Database(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
    }
}

/// Resolve a non-admin actor to their customer record id
pub(crate) async fn own_customer_id(
    db: &DatabaseConnection,
    actor: &crate::auth::Actor,
) -> Result<i32, (StatusCode, String)> {
    crate::services::customer_service::customer_for_user(db, actor.user_id)
        .await
        .map_err(err)?
        .map(|c| c.id)
        .ok_or((
            StatusCode::FORBIDDEN,
            "No customer profile is linked to this account.".to_string(),
        ))
}

pub fn api_router(db: DatabaseConnection) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Auth
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::get_me))
        // Customers
        .route(
            "/customers",
            get(customers::list_customers).post(customers::create_customer),
        )
        .route(
            "/customers/:id",
            get(customers::get_customer)
                .put(customers::update_customer)
                .delete(customers::delete_customer),
        )
        .route(
            "/customers/:id/provision-login",
            post(customers::provision_login),
        )
        .route("/customers/:id/revoke-login", post(customers::revoke_login))
        // Vehicles
        .route(
            "/vehicles",
            get(vehicles::list_vehicles).post(vehicles::create_vehicle),
        )
        .route(
            "/vehicles/:id",
            get(vehicles::get_vehicle)
                .put(vehicles::update_vehicle)
                .delete(vehicles::delete_vehicle),
        )
        // Parts
        .route("/parts", get(parts::list_parts).post(parts::create_part))
        .route(
            "/parts/:id",
            get(parts::get_part)
                .put(parts::update_part)
                .delete(parts::delete_part),
        )
        // Appointments
        .route(
            "/appointments",
            get(appointments::list_appointments).post(appointments::create_appointment),
        )
        .route("/appointments/slots", get(appointments::available_slots))
        .route(
            "/appointments/:id",
            get(appointments::get_appointment)
                .put(appointments::update_appointment)
                .delete(appointments::delete_appointment),
        )
        .route(
            "/appointments/:id/cancel",
            post(appointments::cancel_appointment),
        )
        // Work orders
        .route(
            "/work-orders",
            get(work_orders::list_work_orders).post(work_orders::create_work_order),
        )
        .route(
            "/work-orders/:id",
            get(work_orders::get_work_order).delete(work_orders::delete_work_order),
        )
        .route("/work-orders/:id/status", put(work_orders::update_status))
        .route("/work-orders/:id/items", post(work_orders::add_item))
        .route(
            "/work-orders/:id/items/:item_id",
            delete(work_orders::delete_item),
        )
        .route("/work-orders/:id/invoice", post(invoices::generate_invoice))
        .route("/work-orders/:id/chat", post(chat::start_work_order_chat))
        // Invoices
        .route("/invoices", get(invoices::list_invoices))
        .route(
            "/invoices/:id",
            get(invoices::get_invoice)
                .put(invoices::update_invoice)
                .delete(invoices::delete_invoice),
        )
        .route(
            "/invoices/:id/payments",
            get(payments::list_payments).post(payments::record_payment),
        )
        .route("/invoices/:id/checkout", post(payments::begin_checkout))
        .route("/payments/:id", delete(payments::delete_payment))
        // Gateway callbacks
        .route("/webhooks/stripe", post(payments::stripe_webhook))
        // Assistant
        .route("/assistant/suggest", post(chat::suggest))
        .route(
            "/chat/conversations",
            get(chat::list_conversations).post(chat::create_conversation),
        )
        .route(
            "/chat/conversations/:id",
            get(chat::get_conversation).delete(chat::delete_conversation),
        )
        .route("/chat/conversations/:id/messages", post(chat::send_message))
        // Dashboard
        .route("/dashboard", get(dashboard::stats))
        // User administration
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/:id/promote", post(admin::promote_user))
        .route("/admin/users/:id/demote", post(admin::demote_user))
        .with_state(db)
}
