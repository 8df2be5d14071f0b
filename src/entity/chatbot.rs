use sea_orm::entity::prelude::*;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "chatbot")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub rowid: i64,
    /// The owning user's id; one row per user.
    #[sea_orm(unique)]
    pub id: String,
    /// JSON array of request/response pairs.
    pub chats: String,
}

impl ActiveModelBehavior for ActiveModel {}
