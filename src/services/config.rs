use crate::constants::graph::{API_ROOT, DEFAULT_BASE_URL, SUPPORTED_VERSIONS};
use crate::constants::identity::DEFAULT_ROOT;
use crate::constants::llm::{DEFAULT_BASE_URL as DEFAULT_LLM_BASE_URL, DEFAULT_MODEL};
use crate::constants::network::TIMEOUT_LLM_REQUEST_MS;
use crate::errors::{GraphError, ToolError};
use crate::utils::paths::{resolve_db_path, resolve_secrets_path, resolve_system_prompt_path};
use crate::utils::redact::mask_secret;
use crate::utils::text::strip_wrapping_quotes;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

pub const CONFIG_KEYS: &[&str] = &[
    "LLM_API_KEY",
    "LLM_MODEL",
    "LLM_BASE_URL",
    "LLM_TIMEOUT_MS",
    "MS_GRAPH_TENANT_ID",
    "MS_GRAPH_CLIENT_ID",
    "MS_GRAPH_CLIENT_SECRET",
    "MS_GRAPH_BASE_URL",
    "MS_GRAPH_IDENTITY_URL",
    "COPILOT_DB_PATH",
    "COPILOT_SYSTEM_PROMPT_PATH",
];

static ENV_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("env key regex")
});

/// App registration used for the client-credentials grant.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.tenant_id.trim().is_empty() {
            missing.push("tenant_id");
        }
        if self.client_id.trim().is_empty() {
            missing.push("client_id");
        }
        if self.client_secret.trim().is_empty() {
            missing.push("client_secret");
        }
        missing
    }

    pub fn validate(&self) -> Result<(), GraphError> {
        let missing = self.missing();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(GraphError::MissingCredentials(missing))
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &mask_secret(&self.client_secret))
            .finish()
    }
}

#[derive(Clone)]
pub struct LlmSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_ms: u64,
}

impl fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmSettings")
            .field("api_key", &mask_secret(&self.api_key))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CopilotConfig {
    pub credentials: Credentials,
    pub graph_base_url: String,
    pub identity_root: String,
    pub llm: LlmSettings,
    pub db_path: PathBuf,
    pub system_prompt_path: Option<PathBuf>,
    vars: BTreeMap<String, String>,
}

fn var_or(vars: &BTreeMap<String, String>, key: &str, fallback: &str) -> String {
    vars.get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

impl CopilotConfig {
    /// Process environment overlaid with the secrets file.
    pub fn load() -> Result<Self, ToolError> {
        let mut vars = BTreeMap::new();
        for key in CONFIG_KEYS {
            if let Ok(value) = std::env::var(key) {
                vars.insert(key.to_string(), value);
            }
        }
        let secrets_path = resolve_secrets_path();
        if secrets_path.is_file() {
            let text = std::fs::read_to_string(&secrets_path).map_err(|err| {
                ToolError::config(format!(
                    "Failed to read secrets file {}: {}",
                    secrets_path.display(),
                    err
                ))
            })?;
            vars.extend(parse_env_text(&text)?);
        }
        Ok(Self::from_vars(vars))
    }

    pub fn from_vars(vars: BTreeMap<String, String>) -> Self {
        let timeout_ms = vars
            .get("LLM_TIMEOUT_MS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(TIMEOUT_LLM_REQUEST_MS);
        let db_path = vars
            .get("COPILOT_DB_PATH")
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(resolve_db_path);
        let system_prompt_path = vars
            .get("COPILOT_SYSTEM_PROMPT_PATH")
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(resolve_system_prompt_path);
        Self {
            credentials: Credentials::new(
                var_or(&vars, "MS_GRAPH_TENANT_ID", ""),
                var_or(&vars, "MS_GRAPH_CLIENT_ID", ""),
                var_or(&vars, "MS_GRAPH_CLIENT_SECRET", ""),
            ),
            graph_base_url: var_or(&vars, "MS_GRAPH_BASE_URL", DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            identity_root: var_or(&vars, "MS_GRAPH_IDENTITY_URL", DEFAULT_ROOT)
                .trim_end_matches('/')
                .to_string(),
            llm: LlmSettings {
                api_key: var_or(&vars, "LLM_API_KEY", ""),
                model: var_or(&vars, "LLM_MODEL", DEFAULT_MODEL),
                base_url: var_or(&vars, "LLM_BASE_URL", DEFAULT_LLM_BASE_URL)
                    .trim_end_matches('/')
                    .to_string(),
                timeout_ms,
            },
            db_path,
            system_prompt_path,
            vars,
        }
    }

    /// Copy of this config with `overrides` layered on top.
    pub fn with_overrides(&self, overrides: BTreeMap<String, String>) -> Self {
        let mut vars = self.vars.clone();
        vars.extend(overrides);
        Self::from_vars(vars)
    }

    /// API root without the version segment, e.g. `https://graph.microsoft.com/`.
    pub fn graph_root(&self) -> String {
        let trimmed = self.graph_base_url.trim_end_matches('/');
        for version in SUPPORTED_VERSIONS {
            if let Some(root) = trimmed.strip_suffix(version) {
                if root.ends_with('/') {
                    return root.to_string();
                }
            }
        }
        if trimmed.is_empty() {
            return API_ROOT.to_string();
        }
        format!("{}/", trimmed)
    }

    pub fn status(&self) -> Value {
        serde_json::json!({
            "graph": {
                "base_url": self.graph_base_url,
                "identity_url": self.identity_root,
                "tenant_id": self.credentials.tenant_id,
                "client_id": self.credentials.client_id,
                "client_secret": mask_secret(&self.credentials.client_secret),
                "missing": self.credentials.missing(),
            },
            "llm": {
                "base_url": self.llm.base_url,
                "model": self.llm.model,
                "api_key": mask_secret(&self.llm.api_key),
                "configured": !self.llm.api_key.is_empty(),
                "timeout_ms": self.llm.timeout_ms,
            },
            "db_path": self.db_path.display().to_string(),
            "system_prompt_path": self.system_prompt_path.as_ref().map(|p| p.display().to_string()),
        })
    }
}

/// Parses `KEY=VALUE` lines. Blank lines and `#` comments are skipped.
pub fn parse_env_text(text: &str) -> Result<BTreeMap<String, String>, ToolError> {
    let mut out = BTreeMap::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line).trim_start();
        let Some((key, value)) = line.split_once('=') else {
            return Err(ToolError::invalid_params(format!(
                "Line {} is not KEY=VALUE",
                idx + 1
            )));
        };
        let key = key.trim();
        if !ENV_KEY_RE.is_match(key) {
            return Err(ToolError::invalid_params(format!(
                "Invalid env var key on line {}: {}",
                idx + 1,
                key
            )));
        }
        out.insert(key.to_string(), unquote_env_value(value));
    }
    Ok(out)
}

fn unquote_env_value(value: &str) -> String {
    let trimmed = value.trim();
    let Some(inner) = trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .filter(|_| trimmed.len() >= 2)
    else {
        return strip_wrapping_quotes(trimmed).to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn escape_env_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '"' => escaped.push_str("\\\""),
            _ => escaped.push(ch),
        }
    }
    escaped.push('"');
    escaped
}

pub fn render_env_text(vars: &BTreeMap<String, String>) -> String {
    let mut lines = String::new();
    for (key, value) in vars {
        lines.push_str(key);
        lines.push('=');
        lines.push_str(&escape_env_value(value));
        lines.push('\n');
    }
    lines
}

/// Merges `vars` into the secrets file at `path`, creating it when missing.
pub fn persist_env_vars(path: &Path, vars: &BTreeMap<String, String>) -> Result<(), ToolError> {
    let mut merged = if path.is_file() {
        parse_env_text(&std::fs::read_to_string(path)?)?
    } else {
        BTreeMap::new()
    };
    merged.extend(vars.iter().map(|(k, v)| (k.clone(), v.clone())));
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render_env_text(&merged))?;
    Ok(())
}
