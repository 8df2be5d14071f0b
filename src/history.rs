use crate::auth::AuthSession;
use crate::deadline;
use crate::error::{AppError, Result};
use crate::model::Prediction;
use crate::report::InsightReport;
use crate::store::RemoteStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Saved predictions and the insight reports stored against their farms.
pub struct ReportHistory {
    store: Arc<dyn RemoteStore>,
    auth: Arc<dyn AuthSession>,
    timeout: Duration,
}

impl ReportHistory {
    pub fn new(store: Arc<dyn RemoteStore>, auth: Arc<dyn AuthSession>, timeout: Duration) -> Self {
        Self {
            store,
            auth,
            timeout,
        }
    }

    /// Newest first; scoped to the signed-in user when there is one.
    pub async fn list(&self) -> Result<Vec<Prediction>> {
        let user = self.auth.current_user().await;
        let rows = deadline::persist(
            self.timeout,
            "prediction list",
            self.store.list_predictions(user.as_ref()),
        )
        .await?;
        debug!("Listed {} predictions", rows.len());
        Ok(rows)
    }

    pub async fn count(&self) -> Result<u64> {
        let Some(user) = self.auth.current_user().await else {
            return Ok(0);
        };
        deadline::persist(
            self.timeout,
            "prediction count",
            self.store.count_predictions(&user),
        )
        .await
    }

    /// Latest report stored for the prediction's own farm.
    pub async fn open(&self, prediction: &Prediction) -> Result<InsightReport> {
        let user = self.auth.current_user().await;
        let messages = deadline::persist(
            self.timeout,
            "insight report lookup",
            self.store
                .ai_chats_for_farm(user.as_ref(), &prediction.farm_id),
        )
        .await?;

        let stored = messages
            .into_iter()
            .find_map(|m| m.message.filter(|text| !text.trim().is_empty()))
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "no insight report saved for farm {}",
                    prediction.farm_id
                ))
            })?;

        info!(
            "Opened report for prediction {} (farm {})",
            prediction.id, prediction.farm_id
        );
        Ok(InsightReport::from_stored(&stored))
    }
}
