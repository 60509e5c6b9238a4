use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub order_no: String,
    pub company_id: i64,
    pub customer_id: i64,
    pub status: String,
    pub notes: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub subtotal: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub total_discount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub final_total: Decimal,
    pub submitted_at: DateTimeWithTimeZone,
    pub approved_at: Option<DateTimeWithTimeZone>,
    pub delivered_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_items::Entity")]
    OrderItems,
    #[sea_orm(has_many = "super::order_status_logs::Entity")]
    OrderStatusLogs,
}

impl Related<super::order_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::order_status_logs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderStatusLogs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
