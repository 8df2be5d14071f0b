use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
struct ConfigFile {
    api: ApiConfig,
    store: StoreConfig,
    #[serde(default)]
    auth: AuthConfig,
    #[serde(default)]
    workflow: WorkflowSection,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiConfig {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
struct StoreConfig {
    backend: String,
    url: Option<String>,
    anon_key: Option<String>,
    data_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct AuthConfig {
    email: Option<String>,
    password: Option<String>,
    user_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct WorkflowSection {
    #[serde(default)]
    latest_farm_fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Supabase { url: String, anon_key: String },
    Sqlite { data_dir: PathBuf },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub timeout: Duration,
    pub store: StoreBackend,
    pub email: Option<String>,
    pub password: Option<String>,
    pub user_id: Option<String>,
    pub latest_farm_fallback: bool,
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config_file: ConfigFile =
            toml::from_str(content).context("Failed to parse config file")?;

        let store = match config_file.store.backend.as_str() {
            "supabase" => StoreBackend::Supabase {
                url: config_file
                    .store
                    .url
                    .context("store.url is required for the supabase backend")?,
                anon_key: config_file
                    .store
                    .anon_key
                    .context("store.anon_key is required for the supabase backend")?,
            },
            "sqlite" => StoreBackend::Sqlite {
                data_dir: config_file
                    .store
                    .data_dir
                    .unwrap_or_else(|| "data".into())
                    .into(),
            },
            other => bail!("Unknown store backend: {}", other),
        };

        Ok(Self {
            api_url: config_file
                .api
                .base_url
                .unwrap_or_else(|| crate::service::DEFAULT_BASE_URL.into()),
            timeout: config_file
                .api
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(crate::deadline::DEFAULT_TIMEOUT),
            store,
            email: config_file.auth.email,
            password: config_file.auth.password,
            user_id: config_file.auth.user_id,
            latest_farm_fallback: config_file.workflow.latest_farm_fallback,
        })
    }

    pub fn load(path: Option<&str>) -> Result<Self> {
        Self::from_file(path.unwrap_or("config.toml"))
    }
}
