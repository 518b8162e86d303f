//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory (or
//! the path given with `-f`), then applies `ANALYST_WORK_DIR` and
//! `ANALYST_LOG_LEVEL` env overrides. The LLM API key only ever comes from
//! `LLM_API_KEY`.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// PTY (console) channel configuration.
#[derive(Debug, Clone)]
pub struct PtyConfig {
    pub enabled: bool,
}

/// HTTP (axum) channel configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub enabled: bool,
    /// Socket address to bind the HTTP channel to.
    pub bind: String,
    /// Upper bound for multipart dataset uploads.
    pub max_upload_bytes: usize,
    /// Per-request deadline for agent-backed routes.
    pub request_timeout_seconds: u64,
}

/// Comms subsystem configuration.
#[derive(Debug, Clone)]
pub struct CommsConfig {
    pub pty: PtyConfig,
    pub http: HttpConfig,
}

/// OpenAI / OpenAI-compatible provider configuration (`[llm.openai]`).
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    pub model: String,
    /// Sampling temperature (ignored for models that forbid it).
    pub temperature: f32,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// LLM configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Active provider (`"dummy"`, `"openai"`). Named `default` in the TOML.
    pub provider: String,
    pub openai: OpenAiConfig,
}

/// Agent tuning knobs (`[agents]`).
#[derive(Debug, Clone)]
pub struct AgentsConfig {
    /// Directory holding prompt templates.
    pub prompts_dir: PathBuf,
    /// Rows of raw data shown to the model alongside the column profile.
    pub sample_rows: usize,
    /// Upper bound on rows accepted when parsing a dataset.
    pub max_rows: usize,
}

/// Fully-resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_name: String,
    /// Root of `data/datasets/`, `visualizations/` and `reports/` (no `~`).
    pub work_dir: PathBuf,
    pub log_level: String,
    /// Optional log file; stderr when absent.
    pub log_file: Option<PathBuf>,
    pub comms: CommsConfig,
    pub agents: AgentsConfig,
    pub llm: LlmConfig,
    /// API key from `LLM_API_KEY`; `None` for keyless local models.
    pub llm_api_key: Option<String>,
}

impl Config {
    pub fn comms_pty_should_load(&self) -> bool {
        self.comms.pty.enabled
    }

    pub fn comms_http_should_load(&self) -> bool {
        self.comms.http.enabled
    }
}

/// Raw TOML shape: `serde` target before resolution.
#[derive(Deserialize)]
struct RawConfig {
    bot: RawBot,
    #[serde(default)]
    comms: RawComms,
    #[serde(default)]
    agents: RawAgents,
    #[serde(default)]
    llm: RawLlm,
}

#[derive(Deserialize)]
struct RawBot {
    bot_name: String,
    work_dir: String,
    log_level: String,
    #[serde(default)]
    log_file: Option<String>,
}

#[derive(Deserialize, Default)]
struct RawComms {
    #[serde(default)]
    pty: RawPty,
    #[serde(default)]
    http: RawHttp,
}

#[derive(Deserialize)]
struct RawPty {
    #[serde(default = "default_true")]
    enabled: bool,
}

impl Default for RawPty {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Deserialize)]
struct RawHttp {
    /// Defaults to `false`: HTTP must be explicitly enabled.
    #[serde(default)]
    enabled: bool,
    #[serde(default = "default_http_bind")]
    bind: String,
    #[serde(default = "default_max_upload_bytes")]
    max_upload_bytes: usize,
    #[serde(default = "default_request_timeout_seconds")]
    request_timeout_seconds: u64,
}

impl Default for RawHttp {
    fn default() -> Self {
        Self {
            enabled: false,
            bind: default_http_bind(),
            max_upload_bytes: default_max_upload_bytes(),
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
struct RawLlm {
    #[serde(rename = "default", default = "default_llm_provider")]
    provider: String,
    #[serde(default)]
    openai: RawOpenAiConfig,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self { provider: default_llm_provider(), openai: RawOpenAiConfig::default() }
    }
}

#[derive(Deserialize)]
struct RawOpenAiConfig {
    #[serde(default = "default_openai_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_openai_model")]
    model: String,
    #[serde(default = "default_openai_temperature")]
    temperature: f32,
    #[serde(default = "default_openai_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawOpenAiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_api_base_url(),
            model: default_openai_model(),
            temperature: default_openai_temperature(),
            timeout_seconds: default_openai_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
struct RawAgents {
    #[serde(default = "default_prompts_dir")]
    prompts_dir: String,
    #[serde(default = "default_sample_rows")]
    sample_rows: usize,
    #[serde(default = "default_max_rows")]
    max_rows: usize,
}

impl Default for RawAgents {
    fn default() -> Self {
        Self {
            prompts_dir: default_prompts_dir(),
            sample_rows: default_sample_rows(),
            max_rows: default_max_rows(),
        }
    }
}

fn default_llm_provider() -> String { "dummy".to_string() }
fn default_openai_api_base_url() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_openai_model() -> String { "gpt-4o-mini".to_string() }
fn default_openai_temperature() -> f32 { 0.2 }
fn default_openai_timeout_seconds() -> u64 { 60 }
fn default_prompts_dir() -> String { "config/prompts".to_string() }
fn default_sample_rows() -> usize { 20 }
fn default_max_rows() -> usize { 200_000 }
fn default_http_bind() -> String { "127.0.0.1:8080".to_string() }
fn default_max_upload_bytes() -> usize { 10 * 1024 * 1024 }
fn default_request_timeout_seconds() -> u64 { 120 }

fn default_true() -> bool {
    true
}

/// Load config from `path` (or `config/default.toml`), then apply env-var overrides.
pub fn load(path: Option<&str>) -> Result<Config, AppError> {
    let work_dir_override = env::var("ANALYST_WORK_DIR").ok();
    let log_level_override = env::var("ANALYST_LOG_LEVEL").ok();
    let mut config = load_from(
        Path::new(path.unwrap_or(DEFAULT_CONFIG_PATH)),
        work_dir_override.as_deref(),
        log_level_override.as_deref(),
    )?;
    config.llm_api_key = env::var("LLM_API_KEY").ok().filter(|k| !k.trim().is_empty());
    Ok(config)
}

/// Internal loader. Accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(
    path: &Path,
    work_dir_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let s = parsed.bot;

    let work_dir = expand_home(work_dir_override.unwrap_or(&s.work_dir));
    let log_level = log_level_override.unwrap_or(&s.log_level).to_string();
    let log_file = s.log_file.map(|p| {
        let path = expand_home(&p);
        if path.is_absolute() { path } else { work_dir.join(path) }
    });

    if parsed.agents.max_rows == 0 {
        return Err(AppError::Config("agents.max_rows must be greater than zero".into()));
    }

    Ok(Config {
        bot_name: s.bot_name,
        work_dir,
        log_level,
        log_file,
        comms: CommsConfig {
            pty: PtyConfig { enabled: parsed.comms.pty.enabled },
            http: HttpConfig {
                enabled: parsed.comms.http.enabled,
                bind: parsed.comms.http.bind,
                max_upload_bytes: parsed.comms.http.max_upload_bytes,
                request_timeout_seconds: parsed.comms.http.request_timeout_seconds,
            },
        },
        agents: AgentsConfig {
            prompts_dir: expand_home(&parsed.agents.prompts_dir),
            sample_rows: parsed.agents.sample_rows,
            max_rows: parsed.agents.max_rows,
        },
        llm: LlmConfig {
            provider: parsed.llm.provider,
            openai: OpenAiConfig {
                api_base_url: parsed.llm.openai.api_base_url,
                model: parsed.llm.openai.model,
                temperature: parsed.llm.openai.temperature,
                timeout_seconds: parsed.llm.openai.timeout_seconds,
            },
        },
        llm_api_key: None,
    })
}

/// Expand a leading `~` to the user's home directory.
/// Paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

impl Config {
    /// Safe `Config` for tests: dummy LLM and no API key.
    pub fn test_default(work_dir: &Path) -> Self {
        Self {
            bot_name: "test".into(),
            work_dir: work_dir.to_path_buf(),
            log_level: "info".into(),
            log_file: None,
            comms: CommsConfig {
                pty: PtyConfig { enabled: false },
                http: HttpConfig {
                    enabled: false,
                    bind: default_http_bind(),
                    max_upload_bytes: default_max_upload_bytes(),
                    request_timeout_seconds: 5,
                },
            },
            agents: AgentsConfig {
                prompts_dir: Path::new(env!("CARGO_MANIFEST_DIR")).join("config/prompts"),
                sample_rows: 5,
                max_rows: 10_000,
            },
            llm: LlmConfig {
                provider: "dummy".into(),
                openai: OpenAiConfig {
                    api_base_url: "http://localhost:0/v1/chat/completions".into(),
                    model: "test-model".into(),
                    temperature: 0.0,
                    timeout_seconds: 1,
                },
            },
            llm_api_key: None,
        }
    }
}
