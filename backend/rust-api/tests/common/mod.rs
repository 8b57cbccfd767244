#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Duration, Utc};
use mongodb::bson::oid::ObjectId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use veenoe_api::config::{Config, ExamConfig};
use veenoe_api::create_router;
use veenoe_api::middlewares::auth::{JwtAuthService, JwtClaims};
use veenoe_api::models::{QuestionBankEntry, SessionStatus, SessionType, VivaSession};
use veenoe_api::services::contract::{BehavioralContract, ExamProtocol};
use veenoe_api::services::gemini_service::{AgentProvisioner, ProvisionedCredential, MODEL_NAME};
use veenoe_api::services::store::{QuestionStore, SessionStore};
use veenoe_api::services::AppState;

/// In-memory session store implementing the same contract as the MongoDB
/// one, so the whole router can be exercised without external services.
#[derive(Default)]
pub struct MemorySessionStore {
    inner: Mutex<HashMap<String, VivaSession>>,
}

impl MemorySessionStore {
    pub fn snapshot(&self, id: &str) -> Option<VivaSession> {
        self.inner.lock().unwrap().get(id).cloned()
    }

    pub fn seed(&self, session: VivaSession) -> String {
        let oid = session.id.unwrap_or_else(ObjectId::new);
        let mut session = session;
        session.id = Some(oid);
        self.inner.lock().unwrap().insert(oid.to_hex(), session);
        oid.to_hex()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, mut session: VivaSession) -> anyhow::Result<String> {
        let oid = ObjectId::new();
        session.id = Some(oid);
        self.inner.lock().unwrap().insert(oid.to_hex(), session);
        Ok(oid.to_hex())
    }

    async fn get(&self, id: &str) -> anyhow::Result<Option<VivaSession>> {
        Ok(self.inner.lock().unwrap().get(id).cloned())
    }

    async fn save(&self, session: &VivaSession) -> anyhow::Result<()> {
        let oid = session
            .id
            .ok_or_else(|| anyhow::anyhow!("session has no id"))?;
        self.inner
            .lock()
            .unwrap()
            .insert(oid.to_hex(), session.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> anyhow::Result<()> {
        self.inner.lock().unwrap().remove(id);
        Ok(())
    }

    async fn find_by_owner(&self, user_id: &str) -> anyhow::Result<Vec<VivaSession>> {
        let mut sessions: Vec<VivaSession> = self
            .inner
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(sessions)
    }

    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryQuestionStore {
    questions: Mutex<Vec<QuestionBankEntry>>,
}

impl MemoryQuestionStore {
    pub fn seed(&self, question: QuestionBankEntry) -> String {
        let id = question.id.to_hex();
        self.questions.lock().unwrap().push(question);
        id
    }
}

#[async_trait]
impl QuestionStore for MemoryQuestionStore {
    async fn find_unasked(
        &self,
        topic: &str,
        class_level: i32,
        difficulty: Option<i32>,
        excluding: &[String],
    ) -> anyhow::Result<Option<QuestionBankEntry>> {
        let mut candidates: Vec<QuestionBankEntry> = self
            .questions
            .lock()
            .unwrap()
            .iter()
            .filter(|q| q.topic == topic && q.class_level == class_level)
            .filter(|q| difficulty.map_or(true, |d| q.difficulty == d))
            .filter(|q| !excluding.contains(&q.id.to_hex()))
            .cloned()
            .collect();
        candidates.sort_by_key(|q| q.id.to_hex());
        Ok(candidates.into_iter().next())
    }
}

/// Provisioner stub: records the contract it was handed and can be switched
/// into failure mode to exercise the orphan-session path.
#[derive(Default)]
pub struct StubProvisioner {
    pub fail: AtomicBool,
    pub last_contract: Mutex<Option<BehavioralContract>>,
}

#[async_trait]
impl AgentProvisioner for StubProvisioner {
    async fn provision(
        &self,
        contract: &BehavioralContract,
        _ttl: Duration,
    ) -> anyhow::Result<ProvisionedCredential> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("stub provisioner offline");
        }
        *self.last_contract.lock().unwrap() = Some(contract.clone());
        Ok(ProvisionedCredential {
            token: "authTokens/test-ephemeral".to_string(),
            model_name: MODEL_NAME.to_string(),
        })
    }
}

pub struct TestApp {
    pub router: Router,
    pub sessions: Arc<MemorySessionStore>,
    pub questions: Arc<MemoryQuestionStore>,
    pub provisioner: Arc<StubProvisioner>,
    jwt: JwtAuthService,
}

impl TestApp {
    pub fn token_for(&self, user_id: &str) -> String {
        let now = Utc::now().timestamp();
        let claims = JwtClaims {
            sub: user_id.to_string(),
            email: None,
            sid: None,
            exp: (now + 3600) as usize,
            iat: now as usize,
        };
        self.jwt.generate_token(&claims).unwrap()
    }
}

pub fn create_test_app() -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let config = Config {
        mongo_uri: "mongodb://unused-in-tests".to_string(),
        mongo_database: "veenoe_test".to_string(),
        jwt_secret: "test-secret".to_string(),
        gemini_api_key: String::new(),
        gemini_base_url: "http://localhost:0".to_string(),
        exam: ExamConfig {
            protocol: ExamProtocol::SingleCall,
            session_duration_minutes: 5,
            default_voice: "Kore".to_string(),
        },
    };

    let sessions = Arc::new(MemorySessionStore::default());
    let questions = Arc::new(MemoryQuestionStore::default());
    let provisioner = Arc::new(StubProvisioner::default());

    let app_state = Arc::new(AppState {
        config,
        auth: Arc::new(JwtAuthService::new("test-secret")),
        sessions: sessions.clone(),
        questions: questions.clone(),
        provisioner: provisioner.clone(),
    });

    TestApp {
        router: create_router(app_state),
        sessions,
        questions,
        provisioner,
        jwt: JwtAuthService::new("test-secret"),
    }
}

pub fn seed_session(
    owner_id: &str,
    title: &str,
    started_at: DateTime<Utc>,
) -> VivaSession {
    VivaSession {
        id: None,
        student_name: "Seeded Student".to_string(),
        user_id: owner_id.to_string(),
        title: title.to_string(),
        session_type: SessionType::Viva,
        topic: title.to_string(),
        class_level: 10,
        started_at,
        ended_at: None,
        status: SessionStatus::InProgress,
        feedback: None,
        turns: Vec::new(),
    }
}

pub fn seed_question(topic: &str, class_level: i32, difficulty: i32, text: &str) -> QuestionBankEntry {
    QuestionBankEntry {
        id: ObjectId::new(),
        topic: topic.to_string(),
        class_level,
        difficulty,
        question_text: text.to_string(),
        expected_answer_keywords: None,
    }
}

/// Fire one request at the router and decode the JSON response (or `null`
/// for empty bodies).
pub async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }

    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };

    (status, json)
}
