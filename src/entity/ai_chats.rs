use sea_orm::entity::prelude::*;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "ai_chats")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub rowid: i64,
    #[sea_orm(unique)]
    pub id: String,
    pub user_id: String,
    pub farm_id: String,
    pub message: String,
    pub context: String,
    pub date_generated: String,
}

impl ActiveModelBehavior for ActiveModel {}
