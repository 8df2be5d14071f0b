use crate::auth::AuthUser;
use crate::entity::{ai_chats, chatbot, farms, predictions, users};
use crate::error::{AppError, Result};
use crate::model::{
    AiChatMessage, ChatRow, Farm, NewAiChat, NewFarm, NewPrediction, Prediction, UserProfile,
};
use crate::store::types::RemoteStore;
use async_trait::async_trait;
use chrono::SecondsFormat;
use sea_orm::sea_query::Expr;
use sea_orm::*;
use serde_json::Value;
use std::path::Path;
use tracing::info;

const DB_FILE: &str = "mkulima.db";

/// Local SQLite stand-in for the remote store, same tables and semantics.
pub struct SqliteStore {
    db_url: String,
}

impl SqliteStore {
    pub async fn open(data_dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let db_path = data_dir.join(DB_FILE);
        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        tokio::task::spawn_blocking({
            let db_url = db_url.clone();
            move || -> anyhow::Result<()> {
                let db = Database::connect(&db_url)?;

                db.get_schema_builder()
                    .register(farms::Entity)
                    .register(predictions::Entity)
                    .register(ai_chats::Entity)
                    .register(chatbot::Entity)
                    .register(users::Entity)
                    .apply(&db)?;

                Ok(())
            }
        })
        .await??;

        info!("SQLite store ready ({})", db_path.display());
        Ok(Self { db_url })
    }

    async fn with_db<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&DatabaseConnection) -> std::result::Result<T, DbErr> + Send + 'static,
    {
        let db_url = self.db_url.clone();
        tokio::task::spawn_blocking(move || {
            let db = Database::connect(&db_url)?;
            f(&db)
        })
        .await
        .map_err(AppError::persistence)?
        .map_err(AppError::persistence)
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl From<farms::Model> for Farm {
    fn from(r: farms::Model) -> Self {
        Self {
            id: r.id,
            county: r.county,
            farm_size: r.farm_size,
            user_id: r.user_id,
            date_generated: Some(r.date_generated),
        }
    }
}

impl From<predictions::Model> for Prediction {
    fn from(r: predictions::Model) -> Self {
        let input_summary =
            serde_json::from_str(&r.input_summary).unwrap_or(Value::String(r.input_summary));
        Self {
            id: r.id,
            farm_id: r.farm_id,
            user_id: r.user_id,
            crop: r.crop,
            predicted_yield: r.predicted_yield,
            input_summary,
            market_price: r.market_price,
            profit_margin: r.profit_margin,
            date_generated: Some(r.date_generated),
        }
    }
}

impl From<ai_chats::Model> for AiChatMessage {
    fn from(r: ai_chats::Model) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            farm_id: r.farm_id,
            message: Some(r.message),
            context: Some(r.context),
            date_generated: Some(r.date_generated),
        }
    }
}

fn chat_row(r: chatbot::Model) -> ChatRow {
    // Stored as text; a row that is not valid JSON is handed up as a string for the decoder.
    let chats = serde_json::from_str(&r.chats).unwrap_or(Value::String(r.chats));
    ChatRow { id: r.id, chats }
}

#[async_trait]
impl RemoteStore for SqliteStore {
    async fn insert_farm(&self, _user: &AuthUser, farm: NewFarm) -> Result<Farm> {
        let model = farms::Model {
            rowid: 0,
            id: new_id(),
            county: farm.county,
            farm_size: farm.farm_size,
            user_id: farm.user_id,
            date_generated: now(),
        };
        let record = farms::ActiveModel {
            rowid: NotSet,
            id: Set(model.id.clone()),
            county: Set(model.county.clone()),
            farm_size: Set(model.farm_size),
            user_id: Set(model.user_id.clone()),
            date_generated: Set(model.date_generated.clone()),
        };

        self.with_db(move |db| {
            farms::Entity::insert(record).exec(db)?;
            Ok(model.into())
        })
        .await
    }

    async fn latest_farm(&self, user: &AuthUser) -> Result<Option<Farm>> {
        let user_id = user.id.clone();
        self.with_db(move |db| {
            let row = farms::Entity::find()
                .filter(farms::Column::UserId.eq(user_id))
                .order_by_desc(farms::Column::DateGenerated)
                .order_by_desc(farms::Column::Rowid)
                .one(db)?;
            Ok(row.map(Farm::from))
        })
        .await
    }

    async fn insert_prediction(
        &self,
        _user: &AuthUser,
        prediction: NewPrediction,
    ) -> Result<Prediction> {
        let model = predictions::Model {
            rowid: 0,
            id: new_id(),
            farm_id: prediction.farm_id,
            user_id: prediction.user_id,
            crop: prediction.crop,
            predicted_yield: prediction.predicted_yield,
            input_summary: prediction.input_summary.to_string(),
            market_price: prediction.market_price,
            profit_margin: prediction.profit_margin,
            date_generated: now(),
        };
        let record = predictions::ActiveModel {
            rowid: NotSet,
            id: Set(model.id.clone()),
            farm_id: Set(model.farm_id.clone()),
            user_id: Set(model.user_id.clone()),
            crop: Set(model.crop.clone()),
            predicted_yield: Set(model.predicted_yield),
            input_summary: Set(model.input_summary.clone()),
            market_price: Set(model.market_price),
            profit_margin: Set(model.profit_margin),
            date_generated: Set(model.date_generated.clone()),
        };

        self.with_db(move |db| {
            predictions::Entity::insert(record).exec(db)?;
            Ok(model.into())
        })
        .await
    }

    async fn list_predictions(&self, user: Option<&AuthUser>) -> Result<Vec<Prediction>> {
        let user_id = user.map(|u| u.id.clone());
        self.with_db(move |db| {
            let mut query = predictions::Entity::find();
            if let Some(user_id) = user_id {
                query = query.filter(predictions::Column::UserId.eq(user_id));
            }
            let rows = query
                .order_by_desc(predictions::Column::DateGenerated)
                .order_by_desc(predictions::Column::Rowid)
                .all(db)?;
            Ok(rows.into_iter().map(Prediction::from).collect())
        })
        .await
    }

    async fn count_predictions(&self, user: &AuthUser) -> Result<u64> {
        let user_id = user.id.clone();
        self.with_db(move |db| {
            predictions::Entity::find()
                .filter(predictions::Column::UserId.eq(user_id))
                .count(db)
        })
        .await
    }

    async fn insert_ai_chat(&self, _user: &AuthUser, message: NewAiChat) -> Result<AiChatMessage> {
        let model = ai_chats::Model {
            rowid: 0,
            id: new_id(),
            user_id: message.user_id,
            farm_id: message.farm_id,
            message: message.message,
            context: message.context,
            date_generated: now(),
        };
        let record = ai_chats::ActiveModel {
            rowid: NotSet,
            id: Set(model.id.clone()),
            user_id: Set(model.user_id.clone()),
            farm_id: Set(model.farm_id.clone()),
            message: Set(model.message.clone()),
            context: Set(model.context.clone()),
            date_generated: Set(model.date_generated.clone()),
        };

        self.with_db(move |db| {
            ai_chats::Entity::insert(record).exec(db)?;
            Ok(model.into())
        })
        .await
    }

    async fn ai_chats_for_farm(
        &self,
        user: Option<&AuthUser>,
        farm_id: &str,
    ) -> Result<Vec<AiChatMessage>> {
        let user_id = user.map(|u| u.id.clone());
        let farm_id = farm_id.to_string();
        self.with_db(move |db| {
            let mut query = ai_chats::Entity::find().filter(ai_chats::Column::FarmId.eq(farm_id));
            if let Some(user_id) = user_id {
                query = query.filter(ai_chats::Column::UserId.eq(user_id));
            }
            let rows = query
                .order_by_desc(ai_chats::Column::DateGenerated)
                .order_by_desc(ai_chats::Column::Rowid)
                .all(db)?;
            Ok(rows.into_iter().map(AiChatMessage::from).collect())
        })
        .await
    }

    async fn chat_row(&self, user: &AuthUser) -> Result<Option<ChatRow>> {
        let user_id = user.id.clone();
        self.with_db(move |db| {
            let row = chatbot::Entity::find()
                .filter(chatbot::Column::Id.eq(user_id))
                .one(db)?;
            Ok(row.map(chat_row))
        })
        .await
    }

    async fn insert_chat_row(&self, user: &AuthUser, chats: Value) -> Result<ChatRow> {
        let row = ChatRow {
            id: user.id.clone(),
            chats,
        };
        let record = chatbot::ActiveModel {
            rowid: NotSet,
            id: Set(row.id.clone()),
            chats: Set(row.chats.to_string()),
        };

        self.with_db(move |db| {
            chatbot::Entity::insert(record).exec(db)?;
            Ok(row)
        })
        .await
    }

    async fn update_chat_row(&self, user: &AuthUser, chats: Value) -> Result<ChatRow> {
        let row = ChatRow {
            id: user.id.clone(),
            chats,
        };
        let user_id = row.id.clone();
        let text = row.chats.to_string();

        let affected = self
            .with_db(move |db| {
                let result = chatbot::Entity::update_many()
                    .col_expr(chatbot::Column::Chats, Expr::value(text))
                    .filter(chatbot::Column::Id.eq(user_id))
                    .exec(db)?;
                Ok(result.rows_affected)
            })
            .await?;

        if affected == 0 {
            return Err(AppError::Persistence(format!(
                "no chat row for user {}",
                row.id
            )));
        }
        Ok(row)
    }

    async fn insert_user(&self, _user: &AuthUser, profile: UserProfile) -> Result<UserProfile> {
        let record = users::ActiveModel {
            rowid: NotSet,
            id: Set(profile.id.clone()),
            name: Set(profile.name.clone()),
            email: Set(profile.email.clone()),
        };

        self.with_db(move |db| {
            users::Entity::insert(record).exec(db)?;
            Ok(profile)
        })
        .await
    }
}
