use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "offers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub company_id: i64,
    pub title: String,
    pub scope: String,
    pub status: String,
    pub starts_at: Option<DateTimeWithTimeZone>,
    pub ends_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::offer_rules::Entity")]
    OfferRules,
    #[sea_orm(has_many = "super::offer_targets::Entity")]
    OfferTargets,
}

impl Related<super::offer_rules::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OfferRules.def()
    }
}

impl Related<super::offer_targets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OfferTargets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
