use crate::constants::llm::TITLE_MAX_WORDS;
use crate::errors::ToolError;
use crate::services::session::ChatMessage;
use serde_json::Value;
use std::path::Path;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a Microsoft Graph API copilot for Microsoft Intune and Entra ID administrators. \
Translate the user's question into a single Microsoft Graph API request and, once the response is available, \
explain what the data means in the context of the original question. \
Prefer the v1.0 endpoints and use beta only when the resource does not exist in v1.0. \
Use OData query options ($filter, $select, $top, $orderby, $count) to keep responses small.";

const FEW_SHOT_EXAMPLES: &[(&str, &str)] = &[
    (
        "Show me all intune windows devices and only device name and os version",
        "https://graph.microsoft.com/v1.0/deviceManagement/managedDevices?$filter=operatingSystem eq 'Windows'&$select=deviceName,osVersion",
    ),
    (
        "Show me all Entra ID windows devices",
        "https://graph.microsoft.com/v1.0/devices?$filter=operatingSystem eq 'Windows'",
    ),
    (
        "Show me all co-managed windows devices",
        "https://graph.microsoft.com/v1.0/deviceManagement/managedDevices?$filter=managementAgent eq 'configurationManagerClientMDM' and operatingSystem eq 'Windows'&$select=deviceName,managementAgent",
    ),
    (
        "Show me all configuration profiles with the word: Enable",
        "https://graph.microsoft.com/beta/deviceManagement/configurationPolicies?$filter=contains(name,'Enable')",
    ),
];

/// Reads the system prompt from `path`, falling back to the built-in prompt.
pub fn load_system_prompt(path: Option<&Path>) -> Result<String, ToolError> {
    let Some(path) = path else {
        return Ok(DEFAULT_SYSTEM_PROMPT.to_string());
    };
    let text = std::fs::read_to_string(path).map_err(|err| {
        ToolError::config(format!(
            "Failed to read system prompt {}: {}",
            path.display(),
            err
        ))
        .with_hint("Unset COPILOT_SYSTEM_PROMPT_PATH to use the built-in prompt.")
    })?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ToolError::config(format!(
            "System prompt {} is empty",
            path.display()
        )));
    }
    Ok(trimmed.to_string())
}

/// Messages sent to the model when asking for a structured URL.
pub fn url_synthesis_messages(system_prompt: &str, query: &str) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(format!(
        "{}\nReturn the Graph API request as a structured URL: the API root, the version, \
the endpoint path without a leading slash, and the query parameters (or null).",
        system_prompt
    ))];
    for (question, url) in FEW_SHOT_EXAMPLES {
        messages.push(ChatMessage::user(*question));
        messages.push(ChatMessage::assistant(*url));
    }
    messages.push(ChatMessage::user(query));
    messages
}

pub fn explain_data_turn(query: &str, url: &str, data: &Value) -> String {
    format!(
        "Question: {}\nGraph API request: {}\nResponse:\n{}\n\nExplain what this data means for the question. \
Be concise and mention anything that looks unexpected.",
        query,
        url,
        serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string())
    )
}

pub fn correction_turn(
    query: &str,
    failed_url: &str,
    error: &str,
    sample: Option<&Value>,
    probe_error: Option<&str>,
) -> String {
    let mut turn = format!(
        "Question: {}\nThe Graph API request {} was rejected as a bad request: {}\n",
        query, failed_url, error
    );
    match (sample, probe_error) {
        (Some(sample), _) => {
            turn.push_str("A $top=1 sample of the same endpoint returned:\n");
            turn.push_str(
                &serde_json::to_string_pretty(sample).unwrap_or_else(|_| sample.to_string()),
            );
            turn.push('\n');
        }
        (None, Some(probe_error)) => {
            turn.push_str(&format!(
                "A $top=1 sample of the same endpoint also failed: {}\n",
                probe_error
            ));
        }
        (None, None) => {}
    }
    turn.push_str(
        "Using the property names shown above, suggest a corrected Graph API request URL and explain the change.",
    );
    turn
}

pub fn interpret_url_prompt(url: &str) -> String {
    format!(
        "Interpret and explain the following Graph API URL: {}\n\n\
Provide a brief explanation of what this URL does and what kind of data it will retrieve.\n\
If you think the URL could be improved or modified, suggest changes and explain why.\n\
Format your response as follows:\n\n\
Interpretation: [Your interpretation here]\n\
Suggested Changes: [Your suggested changes here, or 'None' if no changes are needed]\n\
Modified URL: [The modified URL if changes are suggested, or the original URL if no changes are needed]",
        url
    )
}

pub fn title_prompt(message: &str) -> String {
    format!(
        "Generate a short title of at most {} words for a conversation that starts with the message below. \
Reply with the title only.\n\n{}",
        TITLE_MAX_WORDS, message
    )
}
