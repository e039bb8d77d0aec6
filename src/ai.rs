//! Optional text generation for product names and descriptions.
//!
//! Generation is never allowed to fail a caller: a missing key or any
//! upstream error degrades to a fixed fallback string.
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::config::Config;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/";

/// Something that turns a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

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

impl GenerateResponse {
    fn text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().map(|p| p.text).collect();
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

/// Client for the Gemini `generateContent` REST endpoint.
pub struct GeminiClient {
    http: Client,
    base_url: Url,
    api_key: String,
    model: String,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Result<Self> {
        let base_url = Url::parse(GEMINI_BASE_URL).context("invalid Gemini base URL")?;
        Self::with_base_url(base_url, api_key, model)
    }

    pub fn with_base_url(base_url: Url, api_key: String, model: String) -> Result<Self> {
        let http = Client::builder()
            .user_agent("noco-odoo-sync/0.1")
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url,
            api_key,
            model,
        })
    }

    fn endpoint(&self) -> Result<Url> {
        self.base_url
            .join(&format!("v1beta/models/{}:generateContent", self.model))
            .context("invalid Gemini endpoint")
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };
        let url = self.endpoint()?;
        debug!(%url, "sending gemini request");
        let res = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("failed to reach Gemini")?;
        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(anyhow!("gemini error {}: {}", status, text));
        }
        let parsed: GenerateResponse = res.json().await.context("invalid Gemini response")?;
        parsed.text().ok_or_else(|| anyhow!("gemini returned no text"))
    }
}

/// Product copy generation with deterministic fallbacks.
#[derive(Clone)]
pub struct AiService {
    generator: Option<Arc<dyn TextGenerator>>,
    brand: String,
}

impl AiService {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>, brand: impl Into<String>) -> Self {
        Self {
            generator,
            brand: brand.into(),
        }
    }

    /// Gemini when a key is configured, fallbacks only otherwise.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let generator: Option<Arc<dyn TextGenerator>> = if cfg.ai.enabled() {
            Some(Arc::new(GeminiClient::new(
                cfg.ai.gemini_api_key.clone(),
                cfg.ai.model.clone(),
            )?))
        } else {
            warn!("no Gemini API key configured; AI generation disabled");
            None
        };
        Ok(Self::new(generator, cfg.app.brand.clone()))
    }

    pub fn is_available(&self) -> bool {
        self.generator.is_some()
    }

    pub fn fallback_name(&self, machine_name: &str) -> String {
        format!("{} {}", self.brand, machine_name)
    }

    pub fn fallback_description(product_name: &str) -> String {
        format!("{product_name} - Professional corrugated packaging equipment.")
    }

    async fn generate_or(&self, prompt: String, fallback: String) -> String {
        let Some(generator) = &self.generator else {
            return fallback;
        };
        match generator.generate(&prompt).await {
            Ok(text) => text,
            Err(err) => {
                error!(?err, "text generation failed; using fallback");
                fallback
            }
        }
    }

    pub async fn generate_product_name(
        &self,
        product_code: &str,
        machine_name: &str,
        size: Option<&str>,
    ) -> String {
        let prompt = format!(
            "Generate a professional, sales-friendly product name for:\n\
             - Machine Code: {product_code}\n\
             - Machine Type: {machine_name}\n\
             - Size: {}\n\n\
             Return ONLY the product name, no explanation.\n\
             Example format: \"{} Smart Line 120 (3-Ply)\"\n",
            size.unwrap_or("Standard"),
            self.brand,
        );
        self.generate_or(prompt, self.fallback_name(machine_name))
            .await
    }

    pub async fn generate_product_description(
        &self,
        product_name: &str,
        category: Option<&str>,
        specifications: Option<&str>,
    ) -> String {
        let prompt = format!(
            "Generate a professional, SEO-friendly product description for:\n\
             - Product: {product_name}\n\
             - Category: {}\n\
             - Specifications: {}\n\n\
             Write 2-3 paragraphs highlighting key features and benefits.\n\
             Focus on: reliability, efficiency, quality output, and ROI.\n",
            category.unwrap_or("Industrial Machinery"),
            specifications.unwrap_or("Standard"),
        );
        self.generate_or(prompt, Self::fallback_description(product_name))
            .await
    }
}
