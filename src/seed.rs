use crate::auth::hash_password;
use crate::models::{appointment, customer, part, user, vehicle};
use chrono::{Days, TimeZone, Utc};
use sea_orm::*;

pub async fn seed_demo_data(db: &DatabaseConnection) -> Result<(), DbErr> {
    let now = Utc::now().to_rfc3339();

    // 1. Admin login
    let admin_password =
        hash_password("Admin!12345").map_err(|e| DbErr::Custom(format!("Seed hash failed: {}", e)))?;

    let admin = user::ActiveModel {
        email: Set("admin@garage.local".to_owned()),
        password_hash: Set(admin_password),
        display_name: Set("Garage Admin".to_owned()),
        role: Set("admin".to_owned()),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    };

    user::Entity::insert(admin)
        .on_conflict(
            sea_orm::sea_query::OnConflict::column(user::Column::Email)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    // 2. Demo customer with a small fleet. Customers have no unique column,
    // so re-runs are guarded by an existence check instead of on-conflict.
    let existing = customer::Entity::find()
        .filter(customer::Column::Email.eq("john.doe@test.com"))
        .one(db)
        .await?;

    if existing.is_none() {
        let john = customer::ActiveModel {
            first_name: Set("John".to_owned()),
            last_name: Set("Doe".to_owned()),
            email: Set(Some("john.doe@test.com".to_owned())),
            phone: Set(Some("555-0100".to_owned())),
            created_at: Set(now.clone()),
            updated_at: Set(now.clone()),
            ..Default::default()
        }
        .insert(db)
        .await?;

        let fleet = [
            ("ABC123", "Toyota", "Corolla", 2018, 65000),
            ("XYZ789", "Honda", "Civic", 2020, 42000),
            ("JKL456", "Ford", "F-150", 2019, 75000),
        ];

        let mut vehicle_ids = Vec::new();
        for (plate, make, model, year, odometer) in fleet {
            let vehicle = vehicle::ActiveModel {
                customer_id: Set(john.id),
                plate_number: Set(plate.to_owned()),
                make: Set(make.to_owned()),
                model: Set(model.to_owned()),
                year: Set(year),
                odometer: Set(Some(odometer)),
                created_at: Set(now.clone()),
                updated_at: Set(now.clone()),
                ..Default::default()
            }
            .insert(db)
            .await?;
            vehicle_ids.push(vehicle.id);
        }

        // 3. Upcoming appointments, always on the hour
        let today = Utc::now().date_naive();
        let upcoming = [
            (0usize, 2u64, 10u32, "Oil change and tire rotation", "Pending"),
            (1, 5, 14, "Brake inspection", "Confirmed"),
            (2, 7, 9, "Check engine light diagnosis", "Pending"),
        ];

        for (vehicle_idx, days_ahead, hour, reason, status) in upcoming {
            let slot = (today + Days::new(days_ahead))
                .and_hms_opt(hour, 0, 0)
                .map(|n| Utc.from_utc_datetime(&n));
            let slot = match slot {
                Some(s) => s,
                None => continue,
            };

            appointment::ActiveModel {
                customer_id: Set(john.id),
                vehicle_id: Set(vehicle_ids.get(vehicle_idx).copied()),
                scheduled_at: Set(slot.to_rfc3339()),
                reason: Set(Some(reason.to_owned())),
                status: Set(status.to_owned()),
                created_at: Set(now.clone()),
                updated_at: Set(now.clone()),
                ..Default::default()
            }
            .insert(db)
            .await?;
        }
    }

    // 4. Stock for the parts counter
    let demo_parts = [
        ("Oil Filter", Some("OF-2108"), 12.50, 40),
        ("Front Brake Pads", Some("BP-4415"), 64.99, 18),
        ("Engine Air Filter", Some("AF-3302"), 21.75, 25),
    ];

    for (name, part_number, unit_price, stock_quantity) in demo_parts {
        let already = part::Entity::find()
            .filter(part::Column::Name.eq(name))
            .one(db)
            .await?;
        if already.is_some() {
            continue;
        }

        part::ActiveModel {
            name: Set(name.to_owned()),
            part_number: Set(part_number.map(|p| p.to_owned())),
            unit_price: Set(unit_price),
            stock_quantity: Set(stock_quantity),
            created_at: Set(now.clone()),
            updated_at: Set(now.clone()),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    tracing::info!("🌱 Demo data seeded");

    Ok(())
}
