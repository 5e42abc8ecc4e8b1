//! Natural-language answers about current traffic, grounded in the latest
//! aggregate snapshot.

use crate::config::AdvisoryConfig;
use crate::error::{AdvisoryError, AdvisoryResult};
use crate::types::TrafficSnapshot;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tracing::{error, info, warn};

pub const NO_CREDENTIAL_REPLY: &str = "I'm sorry, but I can't connect to my brain right now (Gemini API Key missing). Please check the server logs.";
pub const FAILURE_REPLY: &str = "I encountered an error while processing your request. Please try again later.";

pub trait TextGenerator: Send + Sync {
    fn generate<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, AdvisoryResult<String>>;
}

// ===== Gemini =====

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

pub struct GeminiClient {
    api_key: String,
    model: String,
    endpoint: String,
    http_client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: String, cfg: &AdvisoryConfig) -> AdvisoryResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            api_key,
            model: cfg.model.clone(),
            endpoint: cfg.endpoint.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    async fn generate_content(&self, prompt: &str) -> AdvisoryResult<String> {
        let url = format!("{}/models/{}:generateContent", self.endpoint, self.model);
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .http_client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdvisoryError::Status(status.as_u16()));
        }

        let parsed: GenerateResponse = response.json().await?;
        let text: String = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(AdvisoryError::EmptyResponse);
        }
        Ok(text)
    }
}

impl TextGenerator for GeminiClient {
    fn generate<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, AdvisoryResult<String>> {
        Box::pin(self.generate_content(prompt))
    }
}

// ===== Advisory Service =====

/// Fixed-template context block describing the snapshot.
pub fn build_context(snapshot: &TrafficSnapshot) -> String {
    let location_lines = snapshot
        .locations
        .iter()
        .map(|loc| {
            format!(
                "- {}: {} vehicles ({})",
                loc.name,
                loc.total,
                loc.intensity.as_str().to_uppercase()
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are TrafficAI, an intelligent assistant for a smart city traffic monitoring system.\n\
         Here is the real-time traffic data for Kochi, India:\n\
         \n\
         Global Status:\n\
         - Total Vehicles Detected across all sensors: {}\n\
         \n\
         Location Specifics:\n\
         {}\n\
         \n\
         Instructions:\n\
         1. Answer the user's question concisely based strictly on the above data.\n\
         2. If the user asks about traffic conditions, cite specific numbers and locations.\n\
         3. If a location is 'CONGESTION' or 'HIGH', warn the user.\n\
         4. Keep the tone professional, helpful, and futuristic.\n\
         5. If the answer is not in the data, say you don't have that information.\n",
        snapshot.total_vehicles, location_lines
    )
}

pub fn build_prompt(snapshot: &TrafficSnapshot, question: &str) -> String {
    format!(
        "{}\n\nUser Question: {}\nAnswer:",
        build_context(snapshot),
        question
    )
}

pub struct AdvisoryService {
    generator: Option<Arc<dyn TextGenerator>>,
}

impl AdvisoryService {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>) -> Self {
        Self { generator }
    }

    /// Gemini-backed service when a key is configured, canned replies otherwise.
    pub fn from_config(cfg: &AdvisoryConfig) -> Self {
        let Some(api_key) = cfg.api_key.clone().filter(|k| !k.trim().is_empty()) else {
            warn!("GEMINI_API_KEY not found, chat will return canned responses");
            return Self::new(None);
        };

        match GeminiClient::new(api_key, cfg) {
            Ok(client) => {
                info!(model = %cfg.model, "Gemini client configured");
                Self::new(Some(Arc::new(client)))
            }
            Err(e) => {
                error!(error = %e, "Failed to configure Gemini client");
                Self::new(None)
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.generator.is_some()
    }

    /// Always returns user-safe text.
    pub async fn answer(&self, question: &str, snapshot: &TrafficSnapshot) -> String {
        let Some(generator) = &self.generator else {
            return NO_CREDENTIAL_REPLY.to_string();
        };

        let prompt = build_prompt(snapshot, question);
        match generator.generate(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "Error generating response");
                FAILURE_REPLY.to_string()
            }
        }
    }
}
