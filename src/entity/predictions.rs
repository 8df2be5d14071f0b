use sea_orm::entity::prelude::*;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "predictions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub rowid: i64,
    #[sea_orm(unique)]
    pub id: String,
    pub farm_id: String,
    pub user_id: String,
    pub crop: String,
    pub predicted_yield: Option<f64>,
    /// JSON text.
    pub input_summary: String,
    pub market_price: Option<f64>,
    pub profit_margin: Option<f64>,
    pub date_generated: String,
}

impl ActiveModelBehavior for ActiveModel {}
