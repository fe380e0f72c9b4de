use std::env;
use std::path::{Path, PathBuf};

fn normalize_env_path(value: Option<String>) -> Option<PathBuf> {
    let raw = value?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lowered = trimmed.to_lowercase();
    if lowered == "undefined" || lowered == "null" {
        return None;
    }
    Some(expand_home_path(trimmed))
}

fn resolve_home_dir() -> Option<PathBuf> {
    env::var("HOME").ok().map(PathBuf::from)
}

fn resolve_xdg_state_dir() -> Option<PathBuf> {
    if let Some(path) = normalize_env_path(env::var("XDG_STATE_HOME").ok()) {
        return Some(path);
    }
    resolve_home_dir().map(|home| home.join(".local").join("state"))
}

pub fn expand_home_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if let Some(str_path) = path.to_str() {
        if let Some(rest) = str_path.strip_prefix("~/") {
            if let Some(home) = resolve_home_dir() {
                return home.join(rest);
            }
        }
        if str_path == "~" {
            if let Some(home) = resolve_home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

pub fn resolve_base_dir() -> PathBuf {
    if let Some(path) = normalize_env_path(env::var("COPILOT_STATE_DIR").ok()) {
        return path;
    }
    if let Some(path) = resolve_xdg_state_dir() {
        return path.join("graph-copilot");
    }
    env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

pub fn resolve_db_path() -> PathBuf {
    if let Some(path) = normalize_env_path(env::var("COPILOT_DB_PATH").ok()) {
        return path;
    }
    resolve_base_dir().join("conversation_history.db")
}

pub fn resolve_secrets_path() -> PathBuf {
    if let Some(path) = normalize_env_path(env::var("COPILOT_SECRETS_PATH").ok()) {
        return path;
    }
    resolve_base_dir().join("secrets.env")
}

pub fn resolve_system_prompt_path() -> Option<PathBuf> {
    normalize_env_path(env::var("COPILOT_SYSTEM_PROMPT_PATH").ok())
}

#[cfg(test)]
mod tests {
    use super::normalize_env_path;
    use std::path::PathBuf;

    #[test]
    fn normalize_env_path_rejects_placeholders() {
        assert_eq!(normalize_env_path(Some("  ".to_string())), None);
        assert_eq!(normalize_env_path(Some("null".to_string())), None);
        assert_eq!(normalize_env_path(None), None);
        assert_eq!(
            normalize_env_path(Some("/tmp/copilot.db".to_string())),
            Some(PathBuf::from("/tmp/copilot.db"))
        );
    }
}
