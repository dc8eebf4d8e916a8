//! Work Order Service - repair jobs and their part/labor line items
//!
//! Part stock moves in the same transaction as the item row, so an
//! insufficient-stock rejection never leaves a half-applied mutation.

use chrono::Utc;
use sea_orm::*;

use super::{invoice_service, ServiceError};
use crate::models::customer::{self, Entity as Customer};
use crate::models::part::{self, Entity as Part};
use crate::models::vehicle::{self, Entity as Vehicle};
use crate::models::work_order::{self, Entity as WorkOrder, WorkOrderDto};
use crate::models::work_order_item::{self, Entity as WorkOrderItem, WorkOrderItemDto};

/// Work order with its vehicle, owner and items; total is derived on read
#[derive(Debug, Clone)]
pub struct WorkOrderDetails {
    pub work_order: work_order::Model,
    pub vehicle: Option<vehicle::Model>,
    pub customer: Option<customer::Model>,
    pub items: Vec<work_order_item::Model>,
    pub total: f64,
}

/// Filter parameters for listing work orders
#[derive(Debug, Default, Clone)]
pub struct WorkOrderFilter {
    pub status: Option<String>,
    pub customer_id: Option<i32>,
}

pub async fn list_work_orders(
    db: &DatabaseConnection,
    filter: WorkOrderFilter,
) -> Result<Vec<WorkOrderDetails>, ServiceError> {
    let mut condition = Condition::all();

    if let Some(status) = filter.status {
        condition = condition.add(work_order::Column::Status.eq(status));
    }

    if let Some(customer_id) = filter.customer_id {
        let vehicle_ids: Vec<i32> = Vehicle::find()
            .filter(vehicle::Column::CustomerId.eq(customer_id))
            .all(db)
            .await?
            .into_iter()
            .map(|v| v.id)
            .collect();
        condition = condition.add(work_order::Column::VehicleId.is_in(vehicle_ids));
    }

    let orders_with_vehicles = WorkOrder::find()
        .filter(condition)
        .order_by_desc(work_order::Column::CreatedAt)
        .find_also_related(Vehicle)
        .all(db)
        .await?;

    let mut result = Vec::with_capacity(orders_with_vehicles.len());
    for (wo, vehicle) in orders_with_vehicles {
        let items = items_for(db, wo.id).await?;
        let customer = match &vehicle {
            Some(v) => Customer::find_by_id(v.customer_id).one(db).await?,
            None => None,
        };
        let total = invoice_service::items_subtotal(&items);
        result.push(WorkOrderDetails {
            work_order: wo,
            vehicle,
            customer,
            items,
            total,
        });
    }

    Ok(result)
}

pub async fn items_for(
    db: &DatabaseConnection,
    work_order_id: i32,
) -> Result<Vec<work_order_item::Model>, ServiceError> {
    let items = WorkOrderItem::find()
        .filter(work_order_item::Column::WorkOrderId.eq(work_order_id))
        .order_by_asc(work_order_item::Column::Id)
        .all(db)
        .await?;
    Ok(items)
}

pub async fn work_order_details(
    db: &DatabaseConnection,
    id: i32,
) -> Result<WorkOrderDetails, ServiceError> {
    let wo = WorkOrder::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    let vehicle = Vehicle::find_by_id(wo.vehicle_id).one(db).await?;
    let customer = match &vehicle {
        Some(v) => Customer::find_by_id(v.customer_id).one(db).await?,
        None => None,
    };
    let items = items_for(db, wo.id).await?;
    let total = invoice_service::items_subtotal(&items);

    Ok(WorkOrderDetails {
        work_order: wo,
        vehicle,
        customer,
        items,
        total,
    })
}

/// Open a new work order against a vehicle
pub async fn create_work_order(
    db: &DatabaseConnection,
    dto: WorkOrderDto,
) -> Result<work_order::Model, ServiceError> {
    Vehicle::find_by_id(dto.vehicle_id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    if dto.problem_description.trim().is_empty() {
        return Err(ServiceError::Validation(
            "Problem description is required.".to_string(),
        ));
    }

    let now = Utc::now().to_rfc3339();
    let new_order = work_order::ActiveModel {
        vehicle_id: Set(dto.vehicle_id),
        status: Set("Open".to_owned()),
        problem_description: Set(dto.problem_description),
        odometer: Set(dto.odometer),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };

    Ok(new_order.insert(db).await?)
}

pub async fn set_status(
    db: &DatabaseConnection,
    id: i32,
    status: String,
) -> Result<work_order::Model, ServiceError> {
    if !["Open", "InProgress", "Completed", "Invoiced"].contains(&status.as_str()) {
        return Err(ServiceError::Validation(format!(
            "Unknown work order status: {}",
            status
        )));
    }

    let wo = WorkOrder::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    let mut active: work_order::ActiveModel = wo.into();
    active.status = Set(status);
    active.updated_at = Set(Utc::now().to_rfc3339());

    Ok(active.update(db).await?)
}

/// Add a part or labor line to a work order.
///
/// Part lines must reference a part with enough stock for the ceiling of the
/// requested quantity; the stock decrement commits atomically with the item.
/// Labor lines carry no part reference and require a description.
pub async fn add_item(
    db: &DatabaseConnection,
    work_order_id: i32,
    dto: WorkOrderItemDto,
) -> Result<work_order_item::Model, ServiceError> {
    WorkOrder::find_by_id(work_order_id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    let txn = db.begin().await?;

    let mut violations: Vec<String> = Vec::new();
    if dto.quantity <= 0.0 {
        violations.push("Quantity must be greater than zero.".to_string());
    }

    let mut part_id = dto.part_id;
    let mut description = dto.description.unwrap_or_default().trim().to_string();
    let mut unit_price = dto.unit_price.unwrap_or(0.0);
    let mut stock_move: Option<(part::Model, i32)> = None;

    match dto.item_type.as_str() {
        "Part" => {
            let found = match dto.part_id {
                Some(pid) => Part::find_by_id(pid).one(&txn).await?,
                None => None,
            };
            match found {
                None => violations.push("Select a part.".to_string()),
                Some(part) => {
                    if dto.quantity.fract() != 0.0 {
                        violations.push("Part quantity must be a whole number.".to_string());
                    }
                    let units_needed = dto.quantity.ceil() as i32;
                    if part.stock_quantity < units_needed {
                        violations.push(format!(
                            "Not enough stock for {}. Available: {}.",
                            part.name, part.stock_quantity
                        ));
                    }
                    if description.is_empty() {
                        description = part.name.clone();
                    }
                    if unit_price <= 0.0 {
                        unit_price = part.unit_price;
                    }
                    stock_move = Some((part, units_needed));
                }
            }
        }
        "Labor" => {
            part_id = None;
            stock_move = None;
            if description.is_empty() {
                violations.push("Description is required for labor.".to_string());
            }
        }
        other => {
            violations.push(format!("Unknown item type: {}", other));
        }
    }

    if !violations.is_empty() {
        // Dropping the transaction rolls it back
        return Err(ServiceError::Validation(violations.join(" ")));
    }

    let now = Utc::now().to_rfc3339();
    let new_item = work_order_item::ActiveModel {
        work_order_id: Set(work_order_id),
        item_type: Set(dto.item_type),
        part_id: Set(part_id),
        description: Set(description),
        quantity: Set(dto.quantity),
        unit_price: Set(unit_price),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    };
    let saved = new_item.insert(&txn).await?;

    if let Some((part, units_needed)) = stock_move {
        let remaining = part.stock_quantity - units_needed;
        let mut part_active: part::ActiveModel = part.into();
        part_active.stock_quantity = Set(remaining);
        part_active.updated_at = Set(now);
        part_active.update(&txn).await?;
    }

    txn.commit().await?;

    invoice_service::reconcile_for_work_order(db, work_order_id).await?;

    Ok(saved)
}

/// Delete a work order; items and any invoice go with it.
/// Consumed stock is not returned, parts are assumed already used on the job.
pub async fn delete_work_order(db: &DatabaseConnection, id: i32) -> Result<(), ServiceError> {
    let wo = WorkOrder::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;
    wo.delete(db).await?;
    Ok(())
}

/// Remove a line item, restoring part stock for part lines
pub async fn delete_item(
    db: &DatabaseConnection,
    work_order_id: i32,
    item_id: i32,
) -> Result<(), ServiceError> {
    let item = WorkOrderItem::find_by_id(item_id)
        .one(db)
        .await?
        .filter(|i| i.work_order_id == work_order_id)
        .ok_or(ServiceError::NotFound)?;

    let txn = db.begin().await?;

    if let Some(part_id) = item.part_id {
        if let Some(part) = Part::find_by_id(part_id).one(&txn).await? {
            let restored = part.stock_quantity + item.quantity.ceil() as i32;
            let mut part_active: part::ActiveModel = part.into();
            part_active.stock_quantity = Set(restored);
            part_active.updated_at = Set(Utc::now().to_rfc3339());
            part_active.update(&txn).await?;
        }
    }

    item.delete(&txn).await?;
    txn.commit().await?;

    invoice_service::reconcile_for_work_order(db, work_order_id).await?;

    Ok(())
}
