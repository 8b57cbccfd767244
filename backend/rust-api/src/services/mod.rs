use crate::config::Config;
use crate::middlewares::auth::{AuthProvider, JwtAuthService};
use mongodb::bson::doc;
use mongodb::Client as MongoClient;
use std::sync::Arc;

use gemini_service::{AgentProvisioner, GeminiLiveClient};
use store::{MongoQuestionStore, MongoSessionStore, QuestionStore, SessionStore};

/// Long-lived collaborator handles, constructed once at startup and shared
/// by reference into every request-scoped operation. No ambient singletons.
pub struct AppState {
    pub config: Config,
    pub auth: Arc<dyn AuthProvider>,
    pub sessions: Arc<dyn SessionStore>,
    pub questions: Arc<dyn QuestionStore>,
    pub provisioner: Arc<dyn AgentProvisioner>,
}

impl AppState {
    pub async fn new(config: Config, mongo_client: MongoClient) -> anyhow::Result<Self> {
        let mongo = mongo_client.database(&config.mongo_database);

        tracing::info!("Verifying MongoDB connection...");

        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            mongo.run_command(doc! { "ping": 1 }),
        )
        .await
        .map_err(|_| anyhow::anyhow!("MongoDB ping timeout after 5s"))??;

        tracing::info!("MongoDB connection established");

        let auth: Arc<dyn AuthProvider> = Arc::new(JwtAuthService::new(&config.jwt_secret));
        let sessions: Arc<dyn SessionStore> = Arc::new(MongoSessionStore::new(mongo.clone()));
        let questions: Arc<dyn QuestionStore> = Arc::new(MongoQuestionStore::new(mongo));
        let provisioner: Arc<dyn AgentProvisioner> = Arc::new(GeminiLiveClient::new(
            config.gemini_api_key.clone(),
            config.gemini_base_url.clone(),
        ));

        Ok(Self {
            config,
            auth,
            sessions,
            questions,
            provisioner,
        })
    }
}

pub mod contract;
pub mod gemini_service;
pub mod store;
pub mod viva_service;
