use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::generation::client::GenerationClient;
use crate::generation::provider::OpenAiProvider;
use crate::plan::store::{PgPlanStore, PlanStore};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn PlanStore>,
    pub generator: Arc<GenerationClient>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await?;

        let provider = Arc::new(OpenAiProvider::new(&config.openai));
        let generator = Arc::new(GenerationClient::new(provider));
        let store = Arc::new(PgPlanStore::new(db.clone())) as Arc<dyn PlanStore>;

        Ok(Self {
            db,
            config,
            store,
            generator,
        })
    }
}
