use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub answer: AnswerConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub editor: EditorConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Directory holding document binaries. `Document.path` is relative to it.
    pub root: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size: default_chunk_size(),
            overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Maximum number of chunks assembled into the retrieved context.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnswerConfig {
    /// Character budget for the raw-text fallback context.
    #[serde(default = "default_context_budget")]
    pub context_budget: usize,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            context_budget: default_context_budget(),
        }
    }
}

fn default_context_budget() -> usize {
    8000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

/// Host substitution for editor save callbacks. The editor reports download
/// URLs using the hostname the browser reaches it by; the backend has to
/// fetch through the internal service address instead.
#[derive(Debug, Deserialize, Clone)]
pub struct EditorConfig {
    #[serde(default = "default_public_host")]
    pub public_host: String,
    #[serde(default = "default_internal_host")]
    pub internal_host: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            public_host: default_public_host(),
            internal_host: default_internal_host(),
        }
    }
}

fn default_public_host() -> String {
    "localhost:8080".to_string()
}
fn default_internal_host() -> String {
    "onlyoffice:80".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexingConfig {
    /// Capacity of the background indexing queue; jobs submitted while the
    /// queue is full are rejected (and reported as such), never blocked on.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            workers: default_workers(),
        }
    }
}

fn default_queue_capacity() -> usize {
    64
}
fn default_workers() -> usize {
    2
}

/// Provider credentials, model overrides, and endpoint overrides.
///
/// Credentials are filled from the environment during [`load_config`]; the
/// rest of the program only ever looks at this struct. Base URL overrides
/// exist for OpenAI-compatible gateways and for tests.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ProvidersConfig {
    /// Explicit default provider (`AI_PROVIDER` or `providers.default`).
    pub default: Option<String>,
    /// Provider preference order used when no explicit default is set.
    #[serde(default = "default_preference")]
    pub preference: Vec<String>,
    /// Optional per-call timeout for provider HTTP requests. Absent means
    /// no timeout; callers impose their own deadline if they need one.
    pub request_timeout_secs: Option<u64>,

    pub groq_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub grok_api_key: Option<String>,

    pub groq_model: Option<String>,
    pub openai_model: Option<String>,
    pub gemini_model: Option<String>,
    pub grok_model: Option<String>,

    pub groq_base_url: Option<String>,
    pub openai_base_url: Option<String>,
    pub gemini_base_url: Option<String>,
    pub grok_base_url: Option<String>,
}

fn default_preference() -> Vec<String> {
    vec![
        "groq".to_string(),
        "openai".to_string(),
        "gemini".to_string(),
        "grok".to_string(),
    ]
}

impl Config {
    /// Minimal in-memory configuration for tests and tooling that does not
    /// need a real config file.
    pub fn minimal() -> Self {
        Self {
            storage: StorageConfig {
                root: PathBuf::from("./storage"),
            },
            db: DbConfig {
                path: PathBuf::from("./data/docshelf.sqlite"),
            },
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            answer: AnswerConfig::default(),
            server: ServerConfig {
                bind: "127.0.0.1:0".to_string(),
            },
            editor: EditorConfig::default(),
            indexing: IndexingConfig::default(),
            providers: ProvidersConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    fill_providers_from_env(&mut config.providers);

    // Validate chunking
    if config.chunking.size == 0 {
        anyhow::bail!("chunking.size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.size {
        anyhow::bail!(
            "chunking.overlap ({}) must be < chunking.size ({})",
            config.chunking.overlap,
            config.chunking.size
        );
    }

    // Validate retrieval and answer budgets
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.answer.context_budget == 0 {
        anyhow::bail!("answer.context_budget must be > 0");
    }

    // Validate indexing queue
    if config.indexing.queue_capacity == 0 {
        anyhow::bail!("indexing.queue_capacity must be >= 1");
    }
    if config.indexing.workers == 0 {
        anyhow::bail!("indexing.workers must be >= 1");
    }

    for name in &config.providers.preference {
        match name.as_str() {
            "groq" | "openai" | "gemini" | "grok" => {}
            other => anyhow::bail!(
                "Unknown provider in providers.preference: '{}'. Must be groq, openai, gemini, or grok.",
                other
            ),
        }
    }

    Ok(config)
}

/// Fill credentials and overrides from the environment. This is the only
/// place in the program that reads environment variables; everything
/// downstream receives the resolved [`Config`].
fn fill_providers_from_env(providers: &mut ProvidersConfig) {
    fn env_fill(slot: &mut Option<String>, var: &str) {
        if slot.is_none() {
            if let Ok(v) = std::env::var(var) {
                if !v.is_empty() {
                    *slot = Some(v);
                }
            }
        }
    }

    env_fill(&mut providers.default, "AI_PROVIDER");
    if let Some(d) = &mut providers.default {
        *d = d.to_lowercase();
    }

    env_fill(&mut providers.groq_api_key, "GROQ_API_KEY");
    env_fill(&mut providers.openai_api_key, "OPENAI_API_KEY");
    env_fill(&mut providers.gemini_api_key, "GEMINI_API_KEY");
    env_fill(&mut providers.grok_api_key, "GROK_API_KEY");

    env_fill(&mut providers.groq_model, "GROQ_MODEL");
    env_fill(&mut providers.openai_model, "OPENAI_MODEL");
    env_fill(&mut providers.gemini_model, "GEMINI_MODEL");
    env_fill(&mut providers.grok_model, "GROK_MODEL");
}
