use sea_orm::entity::prelude::*;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "farms")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub rowid: i64,
    #[sea_orm(unique)]
    pub id: String,
    pub county: String,
    pub farm_size: f64,
    pub user_id: String,
    pub date_generated: String,
}

impl ActiveModelBehavior for ActiveModel {}
