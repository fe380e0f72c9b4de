use crate::constants::graph::API_ROOT;
use crate::constants::llm::{SYNTHESIS_TEMPERATURE, URL_SCHEMA_DESCRIPTION, URL_SCHEMA_NAME};
use crate::errors::ToolError;
use crate::services::llm_client::{CompletionOptions, LlmClient};
use crate::services::logger::Logger;
use crate::services::prompts::url_synthesis_messages;
use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiVersion {
    #[serde(rename = "v1.0")]
    V1,
    #[serde(rename = "beta")]
    Beta,
}

impl ApiVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            ApiVersion::V1 => "v1.0",
            ApiVersion::Beta => "beta",
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured form of a Graph request URL as produced by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UrlDescriptor {
    pub base_url: String,
    pub version: ApiVersion,
    pub endpoint: String,
    pub parameters: Option<Vec<String>>,
}

impl UrlDescriptor {
    /// Renders the URL. Parameters are joined verbatim; the HTTP client
    /// percent-encodes them when the request is sent.
    pub fn render(&self) -> String {
        let mut url = self.base_url.trim().to_string();
        if !url.ends_with('/') {
            url.push('/');
        }
        url.push_str(self.version.as_str());
        url.push('/');
        url.push_str(self.endpoint.trim().trim_matches('/'));

        let params: Vec<&str> = self
            .parameters
            .iter()
            .flatten()
            .map(|param| param.trim().trim_start_matches('?'))
            .filter(|param| !param.is_empty())
            .collect();
        if !params.is_empty() {
            url.push('?');
            url.push_str(&params.join("&"));
        }
        url
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SynthesizedUrl {
    pub url: String,
    pub json: UrlDescriptor,
}

/// Response-format schema for the URL descriptor.
pub fn url_schema(api_root: &str) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "base_url": {
                "type": "string",
                "enum": [api_root],
                "description": "The Microsoft Graph API root."
            },
            "version": {
                "type": "string",
                "enum": ["v1.0", "beta"]
            },
            "endpoint": {
                "type": "string",
                "description": "Resource path without the base URL and without a leading slash, e.g. deviceManagement/managedDevices."
            },
            "parameters": {
                "type": ["array", "null"],
                "items": {"type": "string"},
                "description": "OData query options such as $filter=... or $select=..., or null."
            }
        },
        "required": ["base_url", "version", "endpoint", "parameters"],
        "additionalProperties": false
    })
}

pub struct UrlSynthesizer {
    logger: Logger,
    llm: Arc<LlmClient>,
    schema: Value,
    validator: JSONSchema,
}

impl UrlSynthesizer {
    pub fn new(logger: Logger, llm: Arc<LlmClient>, api_root: Option<&str>) -> Result<Self, ToolError> {
        let schema = url_schema(api_root.unwrap_or(API_ROOT));
        let validator = JSONSchema::compile(&schema)
            .map_err(|err| ToolError::internal(format!("URL schema does not compile: {}", err)))?;
        Ok(Self {
            logger: logger.child("synthesizer"),
            llm,
            schema,
            validator,
        })
    }

    /// Checks model output against the schema and decodes it.
    pub fn decode(&self, raw: &Value) -> Result<UrlDescriptor, ToolError> {
        if let Err(errors) = self.validator.validate(raw) {
            let reasons: Vec<String> = errors
                .map(|err| {
                    let path = err.instance_path.to_string();
                    if path.is_empty() {
                        err.to_string()
                    } else {
                        format!("{}: {}", path, err)
                    }
                })
                .collect();
            return Err(ToolError::upstream("LLM output does not match the URL schema")
                .with_details(serde_json::json!({"errors": reasons, "output": raw})));
        }
        serde_json::from_value(raw.clone()).map_err(|err| {
            ToolError::upstream(format!("LLM output could not be decoded: {}", err))
        })
    }

    pub async fn try_synthesize(
        &self,
        query: &str,
        system_prompt: &str,
    ) -> Result<SynthesizedUrl, ToolError> {
        let messages = url_synthesis_messages(system_prompt, query);
        let raw = self
            .llm
            .complete_json_schema(
                &messages,
                CompletionOptions::default().temperature(SYNTHESIS_TEMPERATURE),
                URL_SCHEMA_NAME,
                URL_SCHEMA_DESCRIPTION,
                &self.schema,
            )
            .await?;
        let descriptor = self.decode(&raw)?;
        let url = descriptor.render();
        self.logger.info(
            "Synthesized Graph URL",
            Some(&serde_json::json!({"url": url})),
        );
        Ok(SynthesizedUrl {
            url,
            json: descriptor,
        })
    }

    /// `None` means no URL was produced; the reason is logged.
    pub async fn synthesize(&self, query: &str, system_prompt: &str) -> Option<SynthesizedUrl> {
        match self.try_synthesize(query, system_prompt).await {
            Ok(synthesized) => Some(synthesized),
            Err(err) => {
                self.logger.warn(
                    "No URL produced",
                    Some(&serde_json::json!({"error": err.message, "details": err.details})),
                );
                None
            }
        }
    }
}
