use anyhow::{Context, Result};
use mkulima::auth::{AuthUser, SessionStore, SupabaseAuth};
use mkulima::chat::ChatSession;
use mkulima::config::{Config, StoreBackend};
use mkulima::console::Console;
use mkulima::history::ReportHistory;
use mkulima::service::create_prediction_service;
use mkulima::store::create_store;
use mkulima::workflow::{WorkflowConfig, WorkflowOrchestrator};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::args().nth(1);
    let config = Config::load(config_path.as_deref())?;

    let client = reqwest::Client::builder()
        .timeout(config.timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let service = create_prediction_service(&config)?;
    let store = create_store(&config, client.clone()).await?;
    let session = SessionStore::new(None);

    match &config.store {
        StoreBackend::Supabase { url, anon_key } => {
            match (&config.email, &config.password) {
                (Some(email), Some(password)) => {
                    let auth = SupabaseAuth::new(client, url, anon_key);
                    let user = auth
                        .sign_in(email, password)
                        .await
                        .context("Sign-in failed")?;
                    session.sign_in(user).await;
                }
                _ => warn!("No credentials in [auth]; saving and chat are disabled"),
            }
        }
        StoreBackend::Sqlite { .. } => {
            let id = config.user_id.as_deref().unwrap_or("local");
            session.sign_in(AuthUser::local(id)).await;
        }
    }

    let workflow = WorkflowOrchestrator::new(
        service.clone(),
        store.clone(),
        session.clone(),
        WorkflowConfig {
            timeout: config.timeout,
            latest_farm_fallback: config.latest_farm_fallback,
        },
    );
    let chat = ChatSession::new(store.clone(), service.clone(), session.clone(), config.timeout);
    let history = ReportHistory::new(store, session, config.timeout);
    let console = Console::new(workflow, chat, history, service);

    tokio::select! {
        res = console.run() => res?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
    }

    info!("Shutdown complete");
    Ok(())
}
