mod sqlite;
mod supabase;
mod types;

use crate::config::{Config, StoreBackend};
use anyhow::Result;
pub use sqlite::SqliteStore;
use std::sync::Arc;
pub use supabase::SupabaseStore;
pub use types::RemoteStore;

pub async fn create_store(config: &Config, client: reqwest::Client) -> Result<Arc<dyn RemoteStore>> {
    match &config.store {
        StoreBackend::Supabase { url, anon_key } => {
            Ok(Arc::new(SupabaseStore::new(client, url, anon_key)))
        }
        StoreBackend::Sqlite { data_dir } => Ok(Arc::new(SqliteStore::open(data_dir).await?)),
    }
}
