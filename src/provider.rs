//! Provider registry: chat and embedding backend resolution and dispatch.
//!
//! Providers form a closed set (groq, openai, gemini, grok). Resolution is
//! a pure function of the configured credentials — no ambient environment
//! reads happen here; [`crate::config::load_config`] fills credentials once
//! at startup.
//!
//! Chat and embedding resolution are independent: "can I index/search" and
//! "can I answer" are separate capabilities, and the two backends may come
//! from different providers. An invalid credential is treated exactly like
//! an absent one — capability downgrades, nothing raises.
//!
//! Also provides vector utilities for the chunk store:
//! - [`cosine_similarity`] — similarity between two embedding vectors
//! - [`vec_to_blob`] — encode a `Vec<f32>` as little-endian bytes for SQLite
//! - [`blob_to_vec`] — decode a SQLite BLOB back into a `Vec<f32>`

use anyhow::{anyhow, bail, Result};
use std::time::Duration;

use crate::config::ProvidersConfig;

const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const GROK_BASE_URL: &str = "https://api.x.ai/v1";
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const GROQ_DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
const OPENAI_DEFAULT_MODEL: &str = "gpt-4-turbo-preview";
const GEMINI_DEFAULT_MODEL: &str = "gemini-1.5-pro";
const GROK_DEFAULT_MODEL: &str = "grok-beta";

const GEMINI_EMBEDDING_MODEL: &str = "embedding-001";
const OPENAI_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Placeholder values left in credential slots by setup templates.
const PLACEHOLDER_KEYS: &[&str] = &["sua_chave_aqui", "your_key_here"];

/// The closed set of supported providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Groq,
    Openai,
    Gemini,
    Grok,
}

impl Provider {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "groq" => Some(Provider::Groq),
            "openai" => Some(Provider::Openai),
            "gemini" => Some(Provider::Gemini),
            "grok" => Some(Provider::Grok),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Groq => "groq",
            Provider::Openai => "openai",
            Provider::Gemini => "gemini",
            Provider::Grok => "grok",
        }
    }
}

/// A credential is valid iff present, longer than 20 characters, and not a
/// known placeholder. Invalid is indistinguishable from absent.
pub fn credential_valid(key: Option<&str>) -> bool {
    match key {
        Some(k) => k.len() > 20 && !PLACEHOLDER_KEYS.iter().any(|p| k.contains(p)),
        None => false,
    }
}

fn provider_key<'a>(providers: &'a ProvidersConfig, provider: Provider) -> Option<&'a str> {
    match provider {
        Provider::Groq => providers.groq_api_key.as_deref(),
        Provider::Openai => providers.openai_api_key.as_deref(),
        Provider::Gemini => providers.gemini_api_key.as_deref(),
        Provider::Grok => providers.grok_api_key.as_deref(),
    }
}

/// Resolve the default provider: explicit override first, then the first
/// provider in the preference order with a valid credential, then groq.
/// The preference order is a cost/latency policy, not a correctness rule.
pub fn default_provider(providers: &ProvidersConfig) -> Provider {
    if let Some(p) = providers.default.as_deref().and_then(Provider::from_name) {
        return p;
    }
    for name in &providers.preference {
        if let Some(p) = Provider::from_name(name) {
            if credential_valid(provider_key(providers, p)) {
                return p;
            }
        }
    }
    Provider::Groq
}

/// Whether any embedding-capable credential is configured at all. False is
/// a normal state, not an error: indexing skips and answering falls back
/// to raw text.
pub fn has_embedding_capability(providers: &ProvidersConfig) -> bool {
    credential_valid(providers.gemini_api_key.as_deref())
        || credential_valid(providers.openai_api_key.as_deref())
}

/// Resolve the embedding backend. Gemini's embedding model is preferred
/// whenever its credential is valid, regardless of which provider computes
/// the chat answer; OpenAI is the fallback; `None` means no capability.
pub fn embedding_backend(
    providers: &ProvidersConfig,
    _requested: Option<Provider>,
) -> Option<EmbeddingBackend> {
    let timeout = providers.request_timeout_secs;
    if credential_valid(providers.gemini_api_key.as_deref()) {
        return Some(EmbeddingBackend::Gemini {
            base_url: providers
                .gemini_base_url
                .clone()
                .unwrap_or_else(|| GEMINI_BASE_URL.to_string()),
            api_key: providers.gemini_api_key.clone().unwrap_or_default(),
            model: GEMINI_EMBEDDING_MODEL.to_string(),
            timeout_secs: timeout,
        });
    }
    if credential_valid(providers.openai_api_key.as_deref()) {
        return Some(EmbeddingBackend::OpenAi {
            base_url: providers
                .openai_base_url
                .clone()
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
            api_key: providers.openai_api_key.clone().unwrap_or_default(),
            model: OPENAI_EMBEDDING_MODEL.to_string(),
            timeout_secs: timeout,
        });
    }
    None
}

/// Resolve the chat backend. Never absent: an unresolved or unconfigured
/// provider still yields a concrete backend (the request will fail at call
/// time if the credential is genuinely unusable), so the answer engine can
/// always proceed to generation once context is obtained.
pub fn chat_backend(providers: &ProvidersConfig, requested: Option<Provider>) -> ChatBackend {
    let resolved = requested.unwrap_or_else(|| default_provider(providers));
    let timeout = providers.request_timeout_secs;
    match resolved {
        Provider::Gemini => ChatBackend::Gemini {
            base_url: providers
                .gemini_base_url
                .clone()
                .unwrap_or_else(|| GEMINI_BASE_URL.to_string()),
            api_key: providers.gemini_api_key.clone().unwrap_or_default(),
            model: providers
                .gemini_model
                .clone()
                .unwrap_or_else(|| GEMINI_DEFAULT_MODEL.to_string()),
            timeout_secs: timeout,
        },
        Provider::Groq => ChatBackend::OpenAiCompatible {
            base_url: providers
                .groq_base_url
                .clone()
                .unwrap_or_else(|| GROQ_BASE_URL.to_string()),
            api_key: providers.groq_api_key.clone().unwrap_or_default(),
            model: providers
                .groq_model
                .clone()
                .unwrap_or_else(|| GROQ_DEFAULT_MODEL.to_string()),
            timeout_secs: timeout,
        },
        Provider::Grok => ChatBackend::OpenAiCompatible {
            base_url: providers
                .grok_base_url
                .clone()
                .unwrap_or_else(|| GROK_BASE_URL.to_string()),
            api_key: providers.grok_api_key.clone().unwrap_or_default(),
            model: providers
                .grok_model
                .clone()
                .unwrap_or_else(|| GROK_DEFAULT_MODEL.to_string()),
            timeout_secs: timeout,
        },
        Provider::Openai => ChatBackend::OpenAiCompatible {
            base_url: providers
                .openai_base_url
                .clone()
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
            api_key: providers.openai_api_key.clone().unwrap_or_default(),
            model: providers
                .openai_model
                .clone()
                .unwrap_or_else(|| OPENAI_DEFAULT_MODEL.to_string()),
            timeout_secs: timeout,
        },
    }
}

fn http_client(timeout_secs: Option<u64>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(secs) = timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    Ok(builder.build()?)
}

/// Embedding-capable backend, one variant per provider family.
#[derive(Debug, Clone)]
pub enum EmbeddingBackend {
    OpenAi {
        base_url: String,
        api_key: String,
        model: String,
        timeout_secs: Option<u64>,
    },
    Gemini {
        base_url: String,
        api_key: String,
        model: String,
        timeout_secs: Option<u64>,
    },
}

impl EmbeddingBackend {
    /// Embed a single text into a fixed-length vector.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        match self {
            EmbeddingBackend::OpenAi {
                base_url,
                api_key,
                model,
                timeout_secs,
            } => {
                let client = http_client(*timeout_secs)?;
                let body = serde_json::json!({ "model": model, "input": text });
                let response = client
                    .post(format!("{}/embeddings", base_url))
                    .header("Authorization", format!("Bearer {}", api_key))
                    .json(&body)
                    .send()
                    .await?;
                let status = response.status();
                if !status.is_success() {
                    let body_text = response.text().await.unwrap_or_default();
                    bail!("OpenAI embeddings API error {}: {}", status, body_text);
                }
                let json: serde_json::Value = response.json().await?;
                let values = json
                    .pointer("/data/0/embedding")
                    .and_then(|e| e.as_array())
                    .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))?;
                Ok(values
                    .iter()
                    .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                    .collect())
            }
            EmbeddingBackend::Gemini {
                base_url,
                api_key,
                model,
                timeout_secs,
            } => {
                let client = http_client(*timeout_secs)?;
                let body = serde_json::json!({
                    "content": { "parts": [ { "text": text } ] }
                });
                let response = client
                    .post(format!(
                        "{}/models/{}:embedContent?key={}",
                        base_url, model, api_key
                    ))
                    .json(&body)
                    .send()
                    .await?;
                let status = response.status();
                if !status.is_success() {
                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Gemini embedContent API error {}: {}", status, body_text);
                }
                let json: serde_json::Value = response.json().await?;
                let values = json
                    .pointer("/embedding/values")
                    .and_then(|e| e.as_array())
                    .ok_or_else(|| anyhow!("Invalid Gemini response: missing embedding values"))?;
                Ok(values
                    .iter()
                    .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                    .collect())
            }
        }
    }
}

/// Chat-capable backend. Groq, Grok, and OpenAI share the OpenAI chat
/// completions wire shape; Gemini uses `generateContent`.
#[derive(Debug, Clone)]
pub enum ChatBackend {
    OpenAiCompatible {
        base_url: String,
        api_key: String,
        model: String,
        timeout_secs: Option<u64>,
    },
    Gemini {
        base_url: String,
        api_key: String,
        model: String,
        timeout_secs: Option<u64>,
    },
}

impl ChatBackend {
    /// Single-shot completion: one prompt in, one text out. No multi-turn
    /// memory, no streaming.
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        match self {
            ChatBackend::OpenAiCompatible {
                base_url,
                api_key,
                model,
                timeout_secs,
            } => {
                let client = http_client(*timeout_secs)?;
                let body = serde_json::json!({
                    "model": model,
                    "messages": [ { "role": "user", "content": prompt } ]
                });
                let response = client
                    .post(format!("{}/chat/completions", base_url))
                    .header("Authorization", format!("Bearer {}", api_key))
                    .json(&body)
                    .send()
                    .await?;
                let status = response.status();
                if !status.is_success() {
                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Chat completions API error {}: {}", status, body_text);
                }
                let json: serde_json::Value = response.json().await?;
                json.pointer("/choices/0/message/content")
                    .and_then(|c| c.as_str())
                    .map(|s| s.to_string())
                    .ok_or_else(|| anyhow!("Invalid chat response: missing message content"))
            }
            ChatBackend::Gemini {
                base_url,
                api_key,
                model,
                timeout_secs,
            } => {
                let client = http_client(*timeout_secs)?;
                let body = serde_json::json!({
                    "contents": [ { "parts": [ { "text": prompt } ] } ]
                });
                let response = client
                    .post(format!(
                        "{}/models/{}:generateContent?key={}",
                        base_url, model, api_key
                    ))
                    .json(&body)
                    .send()
                    .await?;
                let status = response.status();
                if !status.is_success() {
                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Gemini generateContent API error {}: {}", status, body_text);
                }
                let json: serde_json::Value = response.json().await?;
                json.pointer("/candidates/0/content/parts/0/text")
                    .and_then(|c| c.as_str())
                    .map(|s| s.to_string())
                    .ok_or_else(|| anyhow!("Invalid Gemini response: missing candidate text"))
            }
        }
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`. Returns `0.0` for empty vectors or
/// vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    fn providers() -> ProvidersConfig {
        ProvidersConfig::default()
    }

    const VALID_KEY: &str = "sk-0123456789abcdef0123456789";

    #[test]
    fn absent_credential_is_invalid() {
        assert!(!credential_valid(None));
    }

    #[test]
    fn short_credential_is_invalid() {
        assert!(!credential_valid(Some("sk-short")));
    }

    #[test]
    fn placeholder_credential_is_invalid() {
        assert!(!credential_valid(Some("sua_chave_aqui_padded_out_long")));
        assert!(!credential_valid(Some("your_key_here_padded_out_long")));
    }

    #[test]
    fn long_real_credential_is_valid() {
        assert!(credential_valid(Some(VALID_KEY)));
    }

    #[test]
    fn default_provider_falls_back_to_groq_with_no_credentials() {
        assert_eq!(default_provider(&providers()), Provider::Groq);
    }

    #[test]
    fn default_provider_follows_preference_order() {
        let mut p = providers();
        p.preference = vec!["groq".into(), "openai".into(), "gemini".into(), "grok".into()];
        p.openai_api_key = Some(VALID_KEY.to_string());
        p.gemini_api_key = Some(VALID_KEY.to_string());
        assert_eq!(default_provider(&p), Provider::Openai);
    }

    #[test]
    fn explicit_default_overrides_preference() {
        let mut p = providers();
        p.default = Some("grok".to_string());
        p.openai_api_key = Some(VALID_KEY.to_string());
        assert_eq!(default_provider(&p), Provider::Grok);
    }

    #[test]
    fn embedding_capability_tracks_gemini_and_openai_only() {
        let mut p = providers();
        p.groq_api_key = Some(VALID_KEY.to_string());
        p.grok_api_key = Some(VALID_KEY.to_string());
        assert!(!has_embedding_capability(&p));
        p.openai_api_key = Some(VALID_KEY.to_string());
        assert!(has_embedding_capability(&p));
    }

    #[test]
    fn gemini_embeddings_preferred_over_openai() {
        let mut p = providers();
        p.openai_api_key = Some(VALID_KEY.to_string());
        p.gemini_api_key = Some(VALID_KEY.to_string());
        let backend = embedding_backend(&p, Some(Provider::Groq)).unwrap();
        assert!(matches!(backend, EmbeddingBackend::Gemini { .. }));
    }

    #[test]
    fn embedding_backend_absent_without_credentials() {
        assert!(embedding_backend(&providers(), None).is_none());
    }

    #[test]
    fn chat_backend_never_absent() {
        let backend = chat_backend(&providers(), None);
        assert!(matches!(backend, ChatBackend::OpenAiCompatible { .. }));
    }

    #[test]
    fn chat_and_embeddings_may_come_from_different_providers() {
        let mut p = providers();
        p.groq_api_key = Some(VALID_KEY.to_string());
        p.gemini_api_key = Some(VALID_KEY.to_string());
        assert_eq!(default_provider(&p), Provider::Groq);
        let backend = embedding_backend(&p, Some(Provider::Groq)).unwrap();
        assert!(matches!(backend, EmbeddingBackend::Gemini { .. }));
    }

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        let restored = blob_to_vec(&blob);
        assert_eq!(vec, restored);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }
}
