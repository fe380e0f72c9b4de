use crate::constants::graph::PROBE_QUERY;
use crate::constants::limits::SAMPLE_DATA_LIMIT;
use crate::constants::llm::{
    INTERPRET_MAX_TOKENS, INTERPRET_TEMPERATURE, TITLE_MAX_WORDS, TITLE_TEMPERATURE,
};
use crate::errors::{GraphError, ToolError};
use crate::services::config::CopilotConfig;
use crate::services::graph_client::{ApiResult, GraphClient, HttpMethod};
use crate::services::llm_client::{CompletionOptions, LlmClient};
use crate::services::logger::Logger;
use crate::services::prompts::{
    correction_turn, explain_data_turn, interpret_url_prompt, load_system_prompt, title_prompt,
};
use crate::services::session::{ChatMessage, CopilotSession, RecoveryState, Suggestion};
use crate::services::url_synthesizer::{SynthesizedUrl, UrlDescriptor, UrlSynthesizer};
use crate::utils::text::{capitalize_first, strip_wrapping_quotes};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use url::Url;

/// What a Graph request produced for the interpretation step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Data { url: String, result: ApiResult },
    Suggestion(Suggestion),
}

#[derive(Debug, Clone, Serialize)]
pub struct AskReport {
    pub query: String,
    pub url: String,
    pub descriptor: UrlDescriptor,
    pub outcome: Outcome,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlInterpretation {
    pub interpretation: String,
    pub suggested_changes: String,
    pub modified_url: String,
}

/// `url` with its query replaced by `$top=1`.
pub fn probe_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.set_fragment(None);
            format!("{}?{}", parsed, PROBE_QUERY)
        }
        Err(_) => {
            let base = url.split(['?', '#']).next().unwrap_or(url);
            format!("{}?{}", base, PROBE_QUERY)
        }
    }
}

/// Session-scoped workflow: synthesize, execute, recover, interpret.
pub struct CopilotService {
    logger: Logger,
    graph: Arc<GraphClient>,
    llm: Arc<LlmClient>,
    synthesizer: UrlSynthesizer,
    session: Mutex<CopilotSession>,
    last_outcome: Mutex<Option<Outcome>>,
}

impl CopilotService {
    pub fn new(logger: Logger, config: &CopilotConfig) -> Result<Self, ToolError> {
        let system_prompt = load_system_prompt(config.system_prompt_path.as_deref())?;
        let graph = Arc::new(GraphClient::new(logger.clone(), config)?);
        let llm = Arc::new(LlmClient::new(logger.clone(), config.llm.clone())?);
        let synthesizer =
            UrlSynthesizer::new(logger.clone(), llm.clone(), Some(&config.graph_root()))?;
        Ok(Self::from_parts(logger, graph, llm, synthesizer, system_prompt))
    }

    pub fn from_parts(
        logger: Logger,
        graph: Arc<GraphClient>,
        llm: Arc<LlmClient>,
        synthesizer: UrlSynthesizer,
        system_prompt: String,
    ) -> Self {
        Self {
            logger: logger.child("copilot"),
            graph,
            llm,
            synthesizer,
            session: Mutex::new(CopilotSession::new(system_prompt)),
            last_outcome: Mutex::new(None),
        }
    }

    pub fn graph(&self) -> &GraphClient {
        &self.graph
    }

    pub async fn synthesize(&self, query: &str) -> Option<SynthesizedUrl> {
        let system_prompt = self.session.lock().await.system_prompt().to_string();
        self.synthesizer.synthesize(query, &system_prompt).await
    }

    pub async fn try_synthesize(&self, query: &str) -> Result<SynthesizedUrl, ToolError> {
        let system_prompt = self.session.lock().await.system_prompt().to_string();
        self.synthesizer.try_synthesize(query, &system_prompt).await
    }

    /// Runs `url` once. A bad request triggers exactly one `$top=1` probe and
    /// yields a suggestion; the original request is never retried.
    pub async fn execute(&self, url: &str) -> Result<Outcome, GraphError> {
        let outcome = self.run_with_recovery(url).await;
        *self.last_outcome.lock().await = outcome.as_ref().ok().cloned();
        outcome
    }

    async fn run_with_recovery(&self, url: &str) -> Result<Outcome, GraphError> {
        let resolved = self.graph.resolve_url(url);
        let mut session = self.session.lock().await;
        session.recovery.request(&resolved);
        let result = self.graph.fetch(&resolved).await;
        if !session.recovery.record_result(&result) {
            return result.map(|result| Outcome::Data {
                url: resolved,
                result,
            });
        }

        let probe = probe_url(&resolved);
        session.recovery.start_probe(&probe);
        self.logger.info(
            "Bad request, probing endpoint",
            Some(&serde_json::json!({"url": resolved, "probe_url": probe})),
        );
        let probe_result = self.graph.call(&probe, HttpMethod::Get, None).await;
        match session.recovery.finish_probe(probe_result) {
            Some(suggestion) => Ok(Outcome::Suggestion(suggestion)),
            None => Err(GraphError::Decode(
                "recovery state lost during probe".to_string(),
            )),
        }
    }

    /// Streams an explanation (or a correction for a suggestion) into `sink`
    /// and appends both turns to the history.
    pub async fn interpret<F>(
        &self,
        query: &str,
        outcome: &Outcome,
        sink: F,
    ) -> Result<String, ToolError>
    where
        F: FnMut(&str) + Send,
    {
        let mut session = self.session.lock().await;
        let turn = match outcome {
            Outcome::Data { url, result } => explain_data_turn(query, url, &data_preview(result)),
            Outcome::Suggestion(suggestion) => {
                let pending = session
                    .recovery
                    .take_suggestion()
                    .unwrap_or_else(|| suggestion.clone());
                correction_turn(
                    query,
                    &pending.failed_url,
                    &pending.error,
                    pending.sample.as_ref(),
                    pending.probe_error.as_deref(),
                )
            }
        };
        let mut messages = session.history().to_vec();
        messages.push(ChatMessage::user(turn.clone()));
        let answer = self
            .llm
            .stream_chat(
                &messages,
                CompletionOptions::default()
                    .temperature(INTERPRET_TEMPERATURE)
                    .max_tokens(INTERPRET_MAX_TOKENS),
                sink,
            )
            .await?;
        session.push(ChatMessage::user(turn));
        session.push(ChatMessage::assistant(answer.clone()));
        Ok(answer)
    }

    /// Interprets the outcome of the most recent `execute`.
    pub async fn interpret_last<F>(&self, query: &str, sink: F) -> Result<String, ToolError>
    where
        F: FnMut(&str) + Send,
    {
        let outcome = self.last_outcome.lock().await.take().ok_or_else(|| {
            ToolError::invalid_params("Nothing to interpret yet")
                .with_hint("Run graph_copilot execute (or ask) first.")
        })?;
        self.interpret(query, &outcome, sink).await
    }

    /// Full interaction: query to URL, URL to data (or suggestion), then explanation.
    pub async fn ask<F>(&self, query: &str, sink: F) -> Result<AskReport, ToolError>
    where
        F: FnMut(&str) + Send,
    {
        let synthesized = self.try_synthesize(query).await.map_err(|err| {
            ToolError::upstream(format!("No Graph API URL produced: {}", err.message))
                .with_hint("Rephrase the question or check LLM_API_KEY and LLM_MODEL.")
        })?;
        let outcome = self.run_with_recovery(&synthesized.url).await?;
        // Kept until the explanation succeeds so `interpret_last` can retry it.
        *self.last_outcome.lock().await = Some(outcome.clone());
        let answer = match self.interpret(query, &outcome, sink).await {
            Ok(answer) => answer,
            Err(err) => {
                self.session.lock().await.recovery.reset();
                return Err(err);
            }
        };
        *self.last_outcome.lock().await = None;
        Ok(AskReport {
            query: query.to_string(),
            url: synthesized.url,
            descriptor: synthesized.json,
            outcome,
            answer,
        })
    }

    pub async fn interpret_url(&self, url: &str) -> Result<UrlInterpretation, ToolError> {
        let system_prompt = self.session.lock().await.system_prompt().to_string();
        let messages = vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user(interpret_url_prompt(url)),
        ];
        let text = self
            .llm
            .complete(
                &messages,
                CompletionOptions::default().temperature(INTERPRET_TEMPERATURE),
            )
            .await?;
        parse_url_interpretation(&text)
    }

    pub async fn generate_title(&self, message: &str) -> Result<String, ToolError> {
        let messages = vec![ChatMessage::user(title_prompt(message))];
        let text = self
            .llm
            .complete(
                &messages,
                CompletionOptions::default().temperature(TITLE_TEMPERATURE),
            )
            .await?;
        let title = normalize_title(&text);
        if title.is_empty() {
            return Ok(placeholder_title(message));
        }
        Ok(title)
    }

    pub async fn history(&self) -> Vec<ChatMessage> {
        self.session.lock().await.history().to_vec()
    }

    pub async fn replace_history(&self, messages: Vec<ChatMessage>) {
        self.session.lock().await.replace_history(messages);
    }

    pub async fn recovery_state(&self) -> RecoveryState {
        self.session.lock().await.recovery.clone()
    }

    /// Empties the history, resets recovery and drops the cached token.
    pub async fn clear(&self) {
        self.session.lock().await.clear();
        *self.last_outcome.lock().await = None;
        self.graph.clear_token().await;
        self.logger.info("Session cleared", None);
    }
}

fn data_preview(result: &ApiResult) -> Value {
    match &result.data {
        Some(items) => serde_json::json!({
            "count": items.len(),
            "items": items.iter().take(SAMPLE_DATA_LIMIT).collect::<Vec<_>>(),
            "truncated": items.len() > SAMPLE_DATA_LIMIT,
            "next_link": result.next_link,
        }),
        None => result.entity.clone().unwrap_or(Value::Null),
    }
}

fn section<'a>(text: &'a str, label: &str, next: Option<&str>) -> Option<&'a str> {
    let start = text.find(label)? + label.len();
    let rest = &text[start..];
    let end = next.and_then(|next| rest.find(next)).unwrap_or(rest.len());
    Some(rest[..end].trim().trim_matches('*').trim())
}

pub fn parse_url_interpretation(text: &str) -> Result<UrlInterpretation, ToolError> {
    const INTERPRETATION: &str = "Interpretation:";
    const CHANGES: &str = "Suggested Changes:";
    const MODIFIED: &str = "Modified URL:";

    let parsed = (|| {
        Some(UrlInterpretation {
            interpretation: section(text, INTERPRETATION, Some(CHANGES))?.to_string(),
            suggested_changes: section(text, CHANGES, Some(MODIFIED))?.to_string(),
            modified_url: section(text, MODIFIED, None)?.to_string(),
        })
    })();
    parsed.ok_or_else(|| {
        ToolError::upstream("LLM reply is missing the Interpretation/Suggested Changes/Modified URL sections")
            .with_details(serde_json::json!({ "content": text }))
    })
}

fn normalize_title(raw: &str) -> String {
    let first_line = raw.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    let unquoted = strip_wrapping_quotes(first_line.trim_start_matches("Title:").trim());
    let words: Vec<&str> = unquoted
        .split_whitespace()
        .take(TITLE_MAX_WORDS)
        .collect();
    let joined = words.join(" ");
    capitalize_first(joined.trim_end_matches(['.', '!', '?', ':']))
}

/// Title built from the message itself when no model is available.
pub fn placeholder_title(message: &str) -> String {
    let title = normalize_title(message);
    if title.is_empty() {
        "New conversation".to_string()
    } else {
        title
    }
}
