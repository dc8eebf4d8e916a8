//! Customer Service - customer records, self-registration and login provisioning
//!
//! A customer row may exist without a login. Accounts are only created through
//! self-registration or an explicit admin provisioning action, never as a side
//! effect of other operations.

use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use sea_orm::*;

use super::ServiceError;
use crate::auth::hash_password;
use crate::models::customer::{self, CustomerDto, Entity as Customer};
use crate::models::user::{self, Entity as User};
use crate::models::vehicle::{self, Entity as Vehicle};

/// Self-registration: one user account plus one linked customer record,
/// committed together.
pub async fn register_account(
    db: &DatabaseConnection,
    email: &str,
    password: &str,
    display_name: &str,
) -> Result<(user::Model, customer::Model), ServiceError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || password.is_empty() {
        return Err(ServiceError::Validation(
            "Email and password are required.".to_string(),
        ));
    }

    let existing = User::find()
        .filter(user::Column::Email.eq(&email))
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(ServiceError::Conflict(
            "User with this email already exists".to_string(),
        ));
    }

    let password_hash =
        hash_password(password).map_err(|e| ServiceError::Validation(e.to_string()))?;

    // Split the display name into first/last; fall back to the email prefix
    let display_name = display_name.trim();
    let (first_name, last_name) = match display_name.split_once(' ') {
        Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
        None if !display_name.is_empty() => (display_name.to_string(), String::new()),
        None => {
            let prefix = email.split('@').next().unwrap_or("Customer");
            (prefix.to_string(), "User".to_string())
        }
    };

    let now = Utc::now().to_rfc3339();
    let txn = db.begin().await?;

    let saved_user = user::ActiveModel {
        email: Set(email.clone()),
        password_hash: Set(password_hash),
        display_name: Set(if display_name.is_empty() {
            email.clone()
        } else {
            display_name.to_string()
        }),
        role: Set("customer".to_owned()),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let saved_customer = customer::ActiveModel {
        first_name: Set(first_name),
        last_name: Set(last_name),
        email: Set(Some(email)),
        phone: Set(None),
        user_id: Set(Some(saved_user.id)),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    Ok((saved_user, saved_customer))
}

pub async fn customer_for_user(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<Option<customer::Model>, ServiceError> {
    let found = Customer::find()
        .filter(customer::Column::UserId.eq(user_id))
        .one(db)
        .await?;
    Ok(found)
}

pub async fn list_customers(
    db: &DatabaseConnection,
    query: Option<String>,
) -> Result<Vec<customer::Model>, ServiceError> {
    let mut select = Customer::find();

    if let Some(q) = query.filter(|q| !q.trim().is_empty()) {
        let q = q.trim().to_string();
        select = select.filter(
            Condition::any()
                .add(customer::Column::FirstName.contains(&q))
                .add(customer::Column::LastName.contains(&q))
                .add(customer::Column::Email.contains(&q))
                .add(customer::Column::Phone.contains(&q)),
        );
    }

    let customers = select
        .order_by_asc(customer::Column::LastName)
        .order_by_asc(customer::Column::FirstName)
        .all(db)
        .await?;
    Ok(customers)
}

pub async fn create_customer(
    db: &DatabaseConnection,
    dto: CustomerDto,
) -> Result<customer::Model, ServiceError> {
    if dto.first_name.trim().is_empty() || dto.last_name.trim().is_empty() {
        return Err(ServiceError::Validation(
            "First and last name are required.".to_string(),
        ));
    }

    let now = Utc::now().to_rfc3339();
    let new_customer = customer::ActiveModel {
        first_name: Set(dto.first_name.trim().to_string()),
        last_name: Set(dto.last_name.trim().to_string()),
        email: Set(dto.email),
        phone: Set(dto.phone),
        user_id: Set(None),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };

    Ok(new_customer.insert(db).await?)
}

pub async fn update_customer(
    db: &DatabaseConnection,
    id: i32,
    dto: CustomerDto,
) -> Result<customer::Model, ServiceError> {
    let found = Customer::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    if dto.first_name.trim().is_empty() || dto.last_name.trim().is_empty() {
        return Err(ServiceError::Validation(
            "First and last name are required.".to_string(),
        ));
    }

    let mut active: customer::ActiveModel = found.into();
    active.first_name = Set(dto.first_name.trim().to_string());
    active.last_name = Set(dto.last_name.trim().to_string());
    active.email = Set(dto.email);
    active.phone = Set(dto.phone);
    active.updated_at = Set(Utc::now().to_rfc3339());

    Ok(active.update(db).await?)
}

/// Vehicles block deletion; appointments and invoices cascade with the row
pub async fn delete_customer(db: &DatabaseConnection, id: i32) -> Result<(), ServiceError> {
    let found = Customer::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    let vehicle_count = Vehicle::find()
        .filter(vehicle::Column::CustomerId.eq(id))
        .count(db)
        .await?;
    if vehicle_count > 0 {
        return Err(ServiceError::Conflict(
            "Customer still has vehicles on file. Delete or reassign them first.".to_string(),
        ));
    }

    found.delete(db).await?;
    Ok(())
}

/// Create a login for an existing customer and hand back the one-time
/// temporary password. The customer must have an email on file.
pub async fn provision_login(
    db: &DatabaseConnection,
    customer_id: i32,
) -> Result<(user::Model, String), ServiceError> {
    let found = Customer::find_by_id(customer_id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    if found.user_id.is_some() {
        return Err(ServiceError::Conflict(
            "Customer already has a login.".to_string(),
        ));
    }

    let email = found
        .email
        .clone()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .ok_or_else(|| {
            ServiceError::Validation(
                "Customer needs an email address before a login can be created.".to_string(),
            )
        })?;

    let taken = User::find()
        .filter(user::Column::Email.eq(&email))
        .one(db)
        .await?;
    if taken.is_some() {
        return Err(ServiceError::Conflict(
            "User with this email already exists".to_string(),
        ));
    }

    let temp_password: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect();
    let password_hash =
        hash_password(&temp_password).map_err(|e| ServiceError::Validation(e.to_string()))?;

    let now = Utc::now().to_rfc3339();
    let txn = db.begin().await?;

    let saved_user = user::ActiveModel {
        email: Set(email),
        password_hash: Set(password_hash),
        display_name: Set(found.full_name()),
        role: Set("customer".to_owned()),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let mut active: customer::ActiveModel = found.into();
    active.user_id = Set(Some(saved_user.id));
    active.updated_at = Set(now);
    active.update(&txn).await?;

    txn.commit().await?;

    Ok((saved_user, temp_password))
}

/// Remove a customer's login. Admin accounts cannot be revoked this way.
pub async fn revoke_login(
    db: &DatabaseConnection,
    customer_id: i32,
) -> Result<(), ServiceError> {
    let found = Customer::find_by_id(customer_id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    let user_id = found.user_id.ok_or_else(|| {
        ServiceError::Validation("Customer has no login to revoke.".to_string())
    })?;

    let account = User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    if account.role == "admin" {
        return Err(ServiceError::Conflict(
            "Cannot revoke login for an admin user.".to_string(),
        ));
    }

    let txn = db.begin().await?;

    let mut active: customer::ActiveModel = found.into();
    active.user_id = Set(None);
    active.updated_at = Set(Utc::now().to_rfc3339());
    active.update(&txn).await?;

    account.delete(&txn).await?;

    txn.commit().await?;

    Ok(())
}
