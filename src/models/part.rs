use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "parts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub part_number: Option<String>,
    pub unit_price: f64,
    // Mutated only through work-order item creation/deletion
    pub stock_quantity: i32,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::work_order_item::Entity")]
    WorkOrderItem,
}

impl Related<super::work_order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WorkOrderItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

// DTO for API payloads
#[derive(Debug, Serialize, Deserialize)]
pub struct PartDto {
    pub id: Option<i32>,
    pub name: String,
    pub part_number: Option<String>,
    pub unit_price: f64,
    pub stock_quantity: i32,
}
