use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "appointments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub customer_id: i32,
    pub vehicle_id: Option<i32>,
    // UTC, always exactly on the hour
    pub scheduled_at: String,
    pub reason: Option<String>,
    pub status: String, // 'Pending', 'Confirmed', 'Completed', 'Cancelled'
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Customer,
    #[sea_orm(
        belongs_to = "super::vehicle::Entity",
        from = "Column::VehicleId",
        to = "super::vehicle::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Vehicle,
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::vehicle::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vehicle.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

// DTO for API payloads
#[derive(Debug, Serialize, Deserialize)]
pub struct AppointmentDto {
    pub id: Option<i32>,
    pub customer_id: Option<i32>,
    pub vehicle_id: Option<i32>,
    pub scheduled_at: String,
    pub reason: Option<String>,
    pub status: Option<String>,
}
