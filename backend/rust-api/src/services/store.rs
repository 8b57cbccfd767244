use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use mongodb::options::{FindOneOptions, FindOptions};
use mongodb::{Collection, Database};

use crate::models::{QuestionBankEntry, VivaSession};

/// Persistence seam for viva sessions. The orchestrator only ever talks to
/// this trait; the MongoDB implementation below is wired in at startup.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new session and return the store-assigned 24-hex id.
    async fn insert(&self, session: VivaSession) -> Result<String>;
    async fn get(&self, id: &str) -> Result<Option<VivaSession>>;
    /// Replace the whole stored document with `session`.
    async fn save(&self, session: &VivaSession) -> Result<()>;
    async fn delete(&self, id: &str) -> Result<()>;
    /// All sessions owned by `user_id`, most recently started first.
    async fn find_by_owner(&self, user_id: &str) -> Result<Vec<VivaSession>>;
    async fn ping(&self) -> Result<()>;
}

/// Read-only access to the curated question bank (multi-tool protocol).
#[async_trait]
pub trait QuestionStore: Send + Sync {
    /// One question matching topic/class level that is not in `excluding`.
    /// `difficulty: None` relaxes the difficulty constraint. Candidate
    /// order must be deterministic for a given store state.
    async fn find_unasked(
        &self,
        topic: &str,
        class_level: i32,
        difficulty: Option<i32>,
        excluding: &[String],
    ) -> Result<Option<QuestionBankEntry>>;
}

pub struct MongoSessionStore {
    db: Database,
    collection: Collection<VivaSession>,
}

impl MongoSessionStore {
    pub fn new(db: Database) -> Self {
        let collection = db.collection::<VivaSession>("viva_sessions");
        Self { db, collection }
    }
}

#[async_trait]
impl SessionStore for MongoSessionStore {
    async fn insert(&self, session: VivaSession) -> Result<String> {
        let result = self
            .collection
            .insert_one(&session)
            .await
            .context("Failed to insert viva session")?;

        match result.inserted_id {
            Bson::ObjectId(oid) => Ok(oid.to_hex()),
            other => Err(anyhow!("Unexpected inserted _id type: {:?}", other)),
        }
    }

    async fn get(&self, id: &str) -> Result<Option<VivaSession>> {
        let Ok(oid) = ObjectId::parse_str(id) else {
            return Ok(None);
        };

        self.collection
            .find_one(doc! { "_id": oid })
            .await
            .context("Failed to query viva session")
    }

    async fn save(&self, session: &VivaSession) -> Result<()> {
        let oid = session
            .id
            .ok_or_else(|| anyhow!("Cannot save a session without an id"))?;

        self.collection
            .replace_one(doc! { "_id": oid }, session)
            .await
            .context("Failed to save viva session")?;

        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let oid = ObjectId::parse_str(id).context("Invalid session id")?;

        self.collection
            .delete_one(doc! { "_id": oid })
            .await
            .context("Failed to delete viva session")?;

        Ok(())
    }

    async fn find_by_owner(&self, user_id: &str) -> Result<Vec<VivaSession>> {
        let options = FindOptions::builder()
            .sort(doc! { "started_at": -1 })
            .build();

        let mut cursor = self
            .collection
            .find(doc! { "user_id": user_id })
            .with_options(options)
            .await
            .context("Failed to query sessions by owner")?;

        let mut sessions = Vec::new();
        while let Some(session) = cursor
            .try_next()
            .await
            .context("Session cursor error")?
        {
            sessions.push(session);
        }

        Ok(sessions)
    }

    async fn ping(&self) -> Result<()> {
        self.db
            .run_command(doc! { "ping": 1 })
            .await
            .context("MongoDB ping failed")?;
        Ok(())
    }
}

pub struct MongoQuestionStore {
    collection: Collection<QuestionBankEntry>,
}

impl MongoQuestionStore {
    pub fn new(db: Database) -> Self {
        let collection = db.collection::<QuestionBankEntry>("question_bank");
        Self { collection }
    }
}

#[async_trait]
impl QuestionStore for MongoQuestionStore {
    async fn find_unasked(
        &self,
        topic: &str,
        class_level: i32,
        difficulty: Option<i32>,
        excluding: &[String],
    ) -> Result<Option<QuestionBankEntry>> {
        let excluded_ids: Vec<ObjectId> = excluding
            .iter()
            .filter_map(|id| ObjectId::parse_str(id).ok())
            .collect();

        let mut filter: Document = doc! {
            "topic": topic,
            "class_level": class_level,
            "_id": { "$nin": excluded_ids },
        };
        if let Some(difficulty) = difficulty {
            filter.insert("difficulty", difficulty);
        }

        // Lowest _id wins among candidates, so selection is reproducible
        // for a given bank state.
        let options = FindOneOptions::builder().sort(doc! { "_id": 1 }).build();

        self.collection
            .find_one(filter)
            .with_options(options)
            .await
            .context("Failed to query question bank")
    }
}
