//! Dashboard Service - shop activity aggregates for the admin landing page
//!
//! Periods are UTC: today, the week starting Monday, the calendar month.
//! Timestamps are stored as RFC3339 strings, so period filters are plain
//! string range comparisons.

use chrono::{Datelike, Days, NaiveDate, TimeZone, Utc};
use sea_orm::*;
use serde::Serialize;
use std::collections::HashMap;

use super::{invoice_service, ServiceError};
use crate::models::appointment::{self, Entity as Appointment};
use crate::models::customer::Entity as Customer;
use crate::models::invoice::{self, Entity as Invoice};
use crate::models::payment::{self, Entity as Payment};
use crate::models::work_order::{self, Entity as WorkOrder};
use crate::models::work_order_item::{self, Entity as WorkOrderItem};

const CLOSED_STATUSES: [&str; 2] = ["Completed", "Invoiced"];

#[derive(Debug, Serialize)]
pub struct PeriodCounts {
    pub today: u64,
    pub this_week: u64,
    pub this_month: u64,
}

#[derive(Debug, Serialize)]
pub struct PaymentTotals {
    pub today: f64,
    pub this_week: f64,
    pub this_month: f64,
}

#[derive(Debug, Serialize)]
pub struct RevenueSplit {
    pub parts: f64,
    pub labor: f64,
}

#[derive(Debug, Serialize)]
pub struct LaborRevenueRange {
    pub from: String,
    pub to: String,
    pub total: f64,
}

#[derive(Debug, Serialize)]
pub struct OutstandingInvoice {
    pub invoice_id: i32,
    pub customer_name: Option<String>,
    pub total: f64,
    pub outstanding: f64,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct TodayAppointment {
    pub id: i32,
    pub scheduled_at: String,
    pub reason: Option<String>,
    pub status: String,
    pub customer_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub work_orders_created: PeriodCounts,
    pub work_orders_closed: PeriodCounts,
    pub payments_received: PaymentTotals,
    pub revenue: RevenueSplit,
    pub labor_revenue_range: LaborRevenueRange,
    pub outstanding_total: f64,
    pub top_outstanding: Vec<OutstandingInvoice>,
    pub todays_appointments: Vec<TodayAppointment>,
}

fn day_start(date: NaiveDate) -> Option<String> {
    let start = date.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&start).to_rfc3339())
}

/// Build the full dashboard. `from`/`to` bound the labor revenue series and
/// default to the last 30 days; a reversed range is swapped, not rejected.
pub async fn stats(
    db: &DatabaseConnection,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<DashboardStats, ServiceError> {
    let now = Utc::now();
    let today = now.date_naive();

    let today_start = day_start(today)
        .ok_or_else(|| ServiceError::Validation("Invalid date".to_string()))?;
    let tomorrow_start = today
        .checked_add_days(Days::new(1))
        .and_then(day_start)
        .ok_or_else(|| ServiceError::Validation("Invalid date".to_string()))?;
    let week_start = today
        .checked_sub_days(Days::new(today.weekday().num_days_from_monday() as u64))
        .and_then(day_start)
        .ok_or_else(|| ServiceError::Validation("Invalid date".to_string()))?;
    let month_start = today
        .with_day(1)
        .and_then(day_start)
        .ok_or_else(|| ServiceError::Validation("Invalid date".to_string()))?;

    let work_orders_created = PeriodCounts {
        today: created_since(db, &today_start).await?,
        this_week: created_since(db, &week_start).await?,
        this_month: created_since(db, &month_start).await?,
    };
    let work_orders_closed = PeriodCounts {
        today: closed_since(db, &today_start).await?,
        this_week: closed_since(db, &week_start).await?,
        this_month: closed_since(db, &month_start).await?,
    };

    // Week and month starts can precede each other; fetch from the earlier one
    let earliest = if week_start < month_start {
        week_start.clone()
    } else {
        month_start.clone()
    };
    let recent_payments = Payment::find()
        .filter(payment::Column::PaidAt.gte(earliest))
        .all(db)
        .await?;
    let sum_since = |bound: &str| {
        recent_payments
            .iter()
            .filter(|p| p.paid_at.as_str() >= bound)
            .map(|p| p.amount)
            .sum::<f64>()
    };
    let payments_received = PaymentTotals {
        today: sum_since(&today_start),
        this_week: sum_since(&week_start),
        this_month: sum_since(&month_start),
    };

    let all_items = WorkOrderItem::find().all(db).await?;
    let revenue = RevenueSplit {
        parts: all_items
            .iter()
            .filter(|i| i.item_type == "Part")
            .map(invoice_service::line_total)
            .sum(),
        labor: all_items
            .iter()
            .filter(|i| i.item_type == "Labor")
            .map(invoice_service::line_total)
            .sum(),
    };

    let range_to = to.unwrap_or(today);
    let range_from = from.unwrap_or_else(|| {
        range_to
            .checked_sub_days(Days::new(30))
            .unwrap_or(range_to)
    });
    let (range_from, range_to) = if range_from > range_to {
        (range_to, range_from)
    } else {
        (range_from, range_to)
    };
    let range_lower = day_start(range_from)
        .ok_or_else(|| ServiceError::Validation("Invalid date".to_string()))?;
    let range_upper = range_to
        .checked_add_days(Days::new(1))
        .and_then(day_start)
        .ok_or_else(|| ServiceError::Validation("Invalid date".to_string()))?;
    let labor_revenue_range = LaborRevenueRange {
        from: range_from.to_string(),
        to: range_to.to_string(),
        total: all_items
            .iter()
            .filter(|i| {
                i.item_type == "Labor"
                    && i.created_at.as_str() >= range_lower.as_str()
                    && i.created_at.as_str() < range_upper.as_str()
            })
            .map(invoice_service::line_total)
            .sum(),
    };

    let invoices = Invoice::find().find_also_related(Customer).all(db).await?;
    let all_payments = Payment::find().all(db).await?;
    let mut paid_by_invoice: HashMap<i32, f64> = HashMap::new();
    for p in &all_payments {
        *paid_by_invoice.entry(p.invoice_id).or_insert(0.0) += p.amount;
    }

    let mut outstanding_total = 0.0;
    let mut open_invoices: Vec<OutstandingInvoice> = Vec::new();
    for (inv, customer) in &invoices {
        let due = inv.total - paid_by_invoice.get(&inv.id).copied().unwrap_or(0.0);
        if invoice_service::is_settled(due) {
            continue;
        }
        outstanding_total += due;
        open_invoices.push(OutstandingInvoice {
            invoice_id: inv.id,
            customer_name: customer.as_ref().map(|c| c.full_name()),
            total: inv.total,
            outstanding: due,
            status: inv.status.clone(),
        });
    }
    open_invoices.sort_by(|a, b| {
        b.outstanding
            .partial_cmp(&a.outstanding)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    open_invoices.truncate(10);

    let todays_appointments = Appointment::find()
        .filter(appointment::Column::ScheduledAt.gte(today_start))
        .filter(appointment::Column::ScheduledAt.lt(tomorrow_start))
        .order_by_asc(appointment::Column::ScheduledAt)
        .find_also_related(Customer)
        .all(db)
        .await?
        .into_iter()
        .map(|(appt, customer)| TodayAppointment {
            id: appt.id,
            scheduled_at: appt.scheduled_at,
            reason: appt.reason,
            status: appt.status,
            customer_name: customer.map(|c| c.full_name()),
        })
        .collect();

    Ok(DashboardStats {
        work_orders_created,
        work_orders_closed,
        payments_received,
        revenue,
        labor_revenue_range,
        outstanding_total,
        top_outstanding: open_invoices,
        todays_appointments,
    })
}

async fn created_since(db: &DatabaseConnection, bound: &str) -> Result<u64, ServiceError> {
    let count = WorkOrder::find()
        .filter(work_order::Column::CreatedAt.gte(bound))
        .count(db)
        .await?;
    Ok(count)
}

/// Closed work orders counted by their last update, the closing transition
async fn closed_since(db: &DatabaseConnection, bound: &str) -> Result<u64, ServiceError> {
    let count = WorkOrder::find()
        .filter(work_order::Column::Status.is_in(CLOSED_STATUSES))
        .filter(work_order::Column::UpdatedAt.gte(bound))
        .count(db)
        .await?;
    Ok(count)
}
