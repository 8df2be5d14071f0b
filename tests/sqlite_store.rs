mod common;

use common::{FakeService, USER, signed_in};
use mkulima::auth::AuthUser;
use mkulima::chat::ChatSession;
use mkulima::deadline::DEFAULT_TIMEOUT;
use mkulima::error::AppError;
use mkulima::history::ReportHistory;
use mkulima::model::{NewFarm, NewPrediction};
use mkulima::store::{RemoteStore, SqliteStore};
use mkulima::workflow::{CostMode, Stage, WorkflowConfig, WorkflowOrchestrator};
use serde_json::json;
use std::sync::Arc;

fn farmer() -> AuthUser {
    AuthUser::local(USER)
}

#[tokio::test]
async fn farms_and_predictions_round_through_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(dir.path()).await.unwrap();
    let user = farmer();

    let farm = store
        .insert_farm(
            &user,
            NewFarm {
                county: "Makueni".into(),
                farm_size: 2.0,
                user_id: USER.into(),
            },
        )
        .await
        .unwrap();
    assert_eq!(store.latest_farm(&user).await.unwrap(), Some(farm.clone()));
    assert_eq!(store.latest_farm(&AuthUser::local("other")).await.unwrap(), None);

    for crop in ["maize", "beans"] {
        store
            .insert_prediction(
                &user,
                NewPrediction {
                    farm_id: farm.id.clone(),
                    user_id: USER.into(),
                    crop: crop.into(),
                    predicted_yield: Some(1.2),
                    input_summary: json!({"county": "Makueni"}),
                    market_price: None,
                    profit_margin: Some(41.6),
                },
            )
            .await
            .unwrap();
    }

    let listed = store.list_predictions(Some(&user)).await.unwrap();
    let crops: Vec<&str> = listed.iter().map(|p| p.crop.as_str()).collect();
    assert_eq!(crops, ["beans", "maize"]);
    assert_eq!(listed[0].input_summary, json!({"county": "Makueni"}));
    assert_eq!(store.count_predictions(&user).await.unwrap(), 2);
    assert_eq!(store.count_predictions(&AuthUser::local("other")).await.unwrap(), 0);
}

#[tokio::test]
async fn chat_row_is_one_per_user() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(dir.path()).await.unwrap();
    let user = farmer();

    assert_eq!(store.chat_row(&user).await.unwrap(), None);
    assert!(matches!(
        store.update_chat_row(&user, json!([])).await,
        Err(AppError::Persistence(_))
    ));

    store
        .insert_chat_row(&user, json!([{"request": "a", "response": "b"}]))
        .await
        .unwrap();
    assert!(store.insert_chat_row(&user, json!([])).await.is_err());

    let both = json!([
        {"request": "a", "response": "b"},
        {"request": "c", "response": "d"}
    ]);
    store.update_chat_row(&user, both).await.unwrap();
    let row = store.chat_row(&user).await.unwrap().unwrap();
    assert_eq!(row.chats.as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn full_plan_and_chat_against_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn RemoteStore> = Arc::new(SqliteStore::open(dir.path()).await.unwrap());
    let service = FakeService::new();
    let auth = signed_in();

    let mut workflow = WorkflowOrchestrator::new(
        service.clone(),
        store.clone(),
        auth.clone(),
        WorkflowConfig::default(),
    );
    workflow.submit_location("Makueni", 2.0).await.unwrap();
    workflow.select_crop("maize").unwrap();
    workflow.choose_cost_mode(CostMode::Default).unwrap();
    workflow.compute_analysis(None).await.unwrap();
    let outcome = workflow.persist_and_report().await.unwrap();
    assert_eq!(workflow.stage(), Stage::ReportReady);
    assert!(outcome.warnings.is_empty());

    let history = ReportHistory::new(store.clone(), auth.clone(), DEFAULT_TIMEOUT);
    let listed = history.list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(Some(listed[0].farm_id.clone()), outcome.farm_id);
    let report = history.open(&listed[0]).await.unwrap();
    assert_eq!(report, outcome.report);

    let chat = ChatSession::new(store.clone(), service.clone(), auth.clone(), DEFAULT_TIMEOUT);
    chat.send("first").await.unwrap();
    chat.send("second").await.unwrap();
    let reopened = ChatSession::new(store, service, auth, DEFAULT_TIMEOUT);
    assert_eq!(reopened.load().await.unwrap().len(), 4);
}
