use serde::Deserialize;
use std::env;

use crate::services::contract::ExamProtocol;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mongo_uri: String,
    pub mongo_database: String,
    pub jwt_secret: String,
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub exam: ExamConfig,
}

/// Tuning knobs for the exam orchestration itself, as opposed to the
/// infrastructure wiring above.
#[derive(Debug, Clone, Deserialize)]
pub struct ExamConfig {
    /// Which behavioral-contract shape the agent is provisioned with.
    pub protocol: ExamProtocol,
    /// Declared maximum length of a live session. The ephemeral credential
    /// never outlives this.
    pub session_duration_minutes: i64,
    pub default_voice: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Load environment variables from root .env file (two levels up)
        // Try root .env first, then fallback to local .env
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        // Determine environment (defaults to dev)
        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let config_builder = config::Config::builder()
            .add_source(
                config::File::with_name(&format!("config/{}", app_env)).required(false),
            )
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        let settings = config_builder.build()?;

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or_else(|_| {
                if app_env == "prod" {
                    panic!("FATAL: MONGO_URI must be set in production!");
                }
                eprintln!("WARNING: Using local MongoDB default (dev mode only!)");
                "mongodb://localhost:27017".to_string()
            });

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or_else(|_| "veenoe".to_string());

        let jwt_secret = settings
            .get_string("auth.jwt_secret")
            .or_else(|_| env::var("JWT_SECRET"))
            .unwrap_or_else(|_| {
                if app_env == "prod" {
                    panic!("FATAL: JWT_SECRET must be set in production!");
                }
                eprintln!("WARNING: Using default JWT_SECRET (dev mode only!)");
                "dev-secret-only-for-local-testing".to_string()
            });

        let gemini_api_key = settings
            .get_string("gemini.api_key")
            .or_else(|_| env::var("GEMINI_API_KEY"))
            .unwrap_or_else(|_| {
                if app_env == "prod" {
                    panic!("FATAL: GEMINI_API_KEY must be set in production!");
                }
                eprintln!("WARNING: GEMINI_API_KEY not set; provisioning will fail");
                String::new()
            });

        let gemini_base_url = settings
            .get_string("gemini.base_url")
            .or_else(|_| env::var("GEMINI_BASE_URL"))
            .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string());

        let protocol = settings
            .get_string("exam.protocol")
            .or_else(|_| env::var("EXAM_PROTOCOL"))
            .ok()
            .map(|raw| match raw.parse::<ExamProtocol>() {
                Ok(protocol) => protocol,
                Err(_) => {
                    eprintln!("WARNING: Unknown exam protocol {:?}, using single_call", raw);
                    ExamProtocol::SingleCall
                }
            })
            .unwrap_or(ExamProtocol::SingleCall);

        let session_duration_minutes = settings
            .get_int("exam.session_duration_minutes")
            .ok()
            .or_else(|| {
                env::var("SESSION_DURATION_MINUTES")
                    .ok()
                    .and_then(|v| v.parse().ok())
            })
            .filter(|v| (1..=60).contains(v))
            .unwrap_or(5);

        let default_voice = settings
            .get_string("exam.default_voice")
            .or_else(|_| env::var("DEFAULT_VOICE_NAME"))
            .unwrap_or_else(|_| "Kore".to_string());

        Ok(Config {
            mongo_uri,
            mongo_database,
            jwt_secret,
            gemini_api_key,
            gemini_base_url,
            exam: ExamConfig {
                protocol,
                session_duration_minutes,
                default_voice,
            },
        })
    }
}
