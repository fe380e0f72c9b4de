use crate::utils::text::truncate_utf8_prefix;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;

const DEFAULT_REDACTION: &str = "[REDACTED]";
const INLINE_REDACTION: &str = "***REDACTED***";

static SENSITIVE_KEYS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "password",
        "secret",
        "token",
        "api_key",
        "access_token",
        "client_secret",
        "refresh_token",
        "authorization",
        "llm_api_key",
        "ms_graph_client_secret",
    ]
    .into_iter()
    .collect()
});

static INLINE_REDACTION_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"\bsk-proj-[A-Za-z0-9_-]{10,}\b").expect("inline redaction regex"),
            "sk-proj-***REDACTED***",
        ),
        (
            Regex::new(r"\bsk-[A-Za-z0-9_-]{10,}\b").expect("inline redaction regex"),
            "sk-***REDACTED***",
        ),
        (
            Regex::new(r"\beyJ[a-zA-Z0-9_-]{10,}\.[a-zA-Z0-9_-]{10,}\.[a-zA-Z0-9_-]{10,}\b")
                .expect("inline redaction regex"),
            INLINE_REDACTION,
        ),
        (
            Regex::new(r"\b(Bearer)\s+([A-Za-z0-9._~-]{10,})\b").expect("inline redaction regex"),
            "$1 ***REDACTED***",
        ),
        (
            Regex::new(r#"\b(client_secret|api[_-]?key|access[_-]?token|secret|token)\b\s*([:=])\s*([^\s"'`&]+)"#)
                .expect("inline redaction regex"),
            "$1$2***REDACTED***",
        ),
    ]
});

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

pub fn is_sensitive_key(key: &str) -> bool {
    let normalized = normalize_key(key);
    if normalized.is_empty() {
        return false;
    }
    if SENSITIVE_KEYS.contains(normalized.as_str()) {
        return true;
    }
    normalized.contains("secret") || normalized.ends_with("_key") || normalized.contains("token")
}

fn truncate_string(value: &str, max_length: usize) -> String {
    if max_length == usize::MAX || value.len() <= max_length {
        return value.to_string();
    }
    format!("{}...", truncate_utf8_prefix(value, max_length))
}

pub fn redact_text(value: &str, max_string: usize) -> String {
    let mut out = value.to_string();
    for (re, replacement) in INLINE_REDACTION_PATTERNS.iter() {
        if re.is_match(&out) {
            out = re.replace_all(&out, *replacement).to_string();
        }
    }
    truncate_string(&out, max_string)
}

pub fn redact_object(value: &Value, max_string: usize) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::String(text) => Value::String(redact_text(text, max_string)),
        Value::Bool(_) | Value::Number(_) => value.clone(),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| redact_object(item, max_string))
                .collect(),
        ),
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (key, entry) in map.iter() {
                if is_sensitive_key(key) && !entry.is_null() {
                    out.insert(key.clone(), Value::String(DEFAULT_REDACTION.to_string()));
                    continue;
                }
                out.insert(key.clone(), redact_object(entry, max_string));
            }
            Value::Object(out)
        }
    }
}

/// Shows just enough of a secret to tell two values apart.
pub fn mask_secret(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let visible: String = trimmed.chars().take(4).collect();
    if trimmed.chars().count() <= 8 {
        return "*".repeat(8);
    }
    format!("{}{}", visible, "*".repeat(8))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_object_hides_secret_keys_only() {
        let input = serde_json::json!({
            "client_id": "8f1c",
            "client_secret": "very-secret-value",
            "nested": {"access_token": "abc"}
        });
        let out = redact_object(&input, usize::MAX);
        assert_eq!(out["client_id"], Value::String("8f1c".to_string()));
        assert_eq!(out["client_secret"], Value::String("[REDACTED]".to_string()));
        assert_eq!(
            out["nested"]["access_token"],
            Value::String("[REDACTED]".to_string())
        );
    }

    #[test]
    fn redact_text_masks_bearer_tokens() {
        let out = redact_text("Authorization: Bearer abcdefghijklmnop", usize::MAX);
        assert!(out.contains("Bearer ***REDACTED***"));
        assert!(!out.contains("abcdefghijklmnop"));
    }

    #[test]
    fn redact_text_masks_form_secrets() {
        let out = redact_text("client_id=x&client_secret=s3cr3t-value&scope=y", usize::MAX);
        assert!(out.contains("client_secret=***REDACTED***"));
        assert!(out.contains("&scope=y"));
    }

    #[test]
    fn mask_secret_keeps_short_prefix() {
        assert_eq!(mask_secret("sk-abcdefghijkl"), "sk-a********");
        assert_eq!(mask_secret("short"), "********");
        assert_eq!(mask_secret("  "), "");
    }
}
