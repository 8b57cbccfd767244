use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{Duration, SecondsFormat, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::contract::BehavioralContract;

/// The Gemini model viva sessions connect to.
pub const MODEL_NAME: &str = "gemini-2.5-flash-native-audio-preview-09-2025";

/// A single-use, time-limited credential letting the client open one live
/// conversation under the contract it was provisioned for.
#[derive(Debug, Clone)]
pub struct ProvisionedCredential {
    pub token: String,
    pub model_name: String,
}

/// Capability interface for issuing live-session credentials, so the agent
/// provider can be swapped without touching the orchestrator.
#[async_trait]
pub trait AgentProvisioner: Send + Sync {
    /// Request a credential scoped to `contract`, expiring after `ttl` and
    /// invalid after its first connection use.
    async fn provision(
        &self,
        contract: &BehavioralContract,
        ttl: Duration,
    ) -> Result<ProvisionedCredential>;
}

/// Ephemeral auth-token client for the Gemini Live API.
pub struct GeminiLiveClient {
    api_key: String,
    base_url: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct AuthTokenResponse {
    name: String,
}

impl GeminiLiveClient {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url,
            http: Client::new(),
        }
    }
}

#[async_trait]
impl AgentProvisioner for GeminiLiveClient {
    async fn provision(
        &self,
        contract: &BehavioralContract,
        ttl: Duration,
    ) -> Result<ProvisionedCredential> {
        let expire_time = Utc::now() + ttl;
        let body = auth_token_request(contract, &expire_time.to_rfc3339_opts(SecondsFormat::Secs, true));

        let url = format!("{}/v1alpha/authTokens", self.base_url);

        tracing::debug!("Requesting ephemeral token from {}", url);

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .context("Failed to call the ephemeral token endpoint")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!(
                "Token endpoint returned {}: {}",
                status,
                error_text
            ));
        }

        let token: AuthTokenResponse = response
            .json()
            .await
            .context("Failed to parse ephemeral token response")?;

        Ok(ProvisionedCredential {
            token: token.name,
            model_name: MODEL_NAME.to_string(),
        })
    }
}

/// Wire body for the token request: one use, explicit expiry, and the live
/// connection pinned to the contract's instruction, tools, and modality.
fn auth_token_request(contract: &BehavioralContract, expire_time: &str) -> Value {
    let mut live_config = json!({
        "sessionResumption": {},
        "responseModalities": contract.modality.response_modalities,
        "systemInstruction": {
            "parts": [{ "text": contract.system_instruction }],
        },
        "tools": [{ "functionDeclarations": contract.tools }],
        "inputAudioTranscription": {},
        "outputAudioTranscription": {},
    });

    if let Some(voice) = &contract.modality.voice_name {
        live_config["speechConfig"] = json!({
            "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": voice } },
        });
    }

    json!({
        "uses": 1,
        "expireTime": expire_time,
        "liveConnectConstraints": {
            "model": MODEL_NAME,
            "config": live_config,
        },
    })
}
