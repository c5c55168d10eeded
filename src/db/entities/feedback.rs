//! `SeaORM` entity for the `feedback` table.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "feedback")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// 0 = no feedback yet, 1 = positive, 2 = negative.
    pub feed_back_value: i32,
    pub prob_cat: f64,
    pub prob_dog: f64,
    pub last_modified: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::monitoring::Entity")]
    Monitoring,
}

impl Related<super::monitoring::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Monitoring.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
