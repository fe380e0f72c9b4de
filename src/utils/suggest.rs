use crate::errors::ToolError;

fn normalize(value: &str) -> Vec<char> {
    value
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

fn edit_distance(a: &[char], b: &[char]) -> usize {
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = (above + 1)
                .min(row[j] + 1)
                .min(diagonal + usize::from(ca != cb));
            diagonal = above;
        }
    }
    row[b.len()]
}

/// Closest `candidates` to `input`, best first.
pub fn suggest(input: &str, candidates: &[&str], limit: usize) -> Vec<String> {
    let needle = normalize(input);
    if needle.is_empty() {
        return Vec::new();
    }
    let allowed = match needle.len() {
        0..=4 => 1,
        5..=8 => 2,
        len => (len * 35 / 100).max(3),
    };
    let needle_text: String = needle.iter().collect();
    let mut scored: Vec<(usize, &str)> = candidates
        .iter()
        .filter_map(|candidate| {
            let normalized = normalize(candidate);
            if normalized.is_empty() {
                return None;
            }
            let text: String = normalized.iter().collect();
            let score = if text.contains(&needle_text) || needle_text.contains(&text) {
                1
            } else {
                edit_distance(&needle, &normalized)
            };
            (score <= allowed).then_some((score, *candidate))
        })
        .collect();
    scored.sort();
    scored.dedup_by(|a, b| a.1 == b.1);
    scored
        .into_iter()
        .take(limit.max(1))
        .map(|(_, candidate)| candidate.to_string())
        .collect()
}

pub fn unknown_action_error(tool: &str, action: Option<&str>, known: &[&str]) -> ToolError {
    let action = action.unwrap_or("").trim();
    let did_you_mean = suggest(action, known, 3);
    let mut hint = format!("Use one of: {}.", known.join(", "));
    if !did_you_mean.is_empty() {
        hint = format!("Did you mean: {}? {}", did_you_mean.join(", "), hint);
    }
    ToolError::invalid_params(format!("Unknown {} action: {}", tool, action))
        .with_hint(hint)
        .with_details(serde_json::json!({
            "known_actions": known,
            "did_you_mean": did_you_mean,
        }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_near_misses() {
        let known = ["request", "paginate", "status"];
        assert_eq!(suggest("paginat", &known, 3), vec!["paginate"]);
        assert_eq!(suggest("reqest", &known, 3), vec!["request"]);
        assert!(suggest("zzzzzz", &known, 3).is_empty());
    }

    #[test]
    fn unknown_action_error_lists_known_actions() {
        let err = unknown_action_error("mcp_graph", Some("requst"), &["request", "paginate"]);
        assert_eq!(err.code, "INVALID_PARAMS");
        assert!(err.hint.as_deref().unwrap_or("").contains("Did you mean: request?"));
    }
}
