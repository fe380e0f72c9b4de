pub mod graph {
    pub const API_ROOT: &str = "https://graph.microsoft.com/";
    pub const DEFAULT_BASE_URL: &str = "https://graph.microsoft.com/v1.0";
    pub const SUPPORTED_VERSIONS: &[&str] = &["v1.0", "beta"];
    pub const DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";
    pub const NEXT_LINK_FIELD: &str = "@odata.nextLink";
    pub const COLLECTION_FIELD: &str = "value";
    pub const PROBE_QUERY: &str = "$top=1";
}

pub mod identity {
    pub const DEFAULT_ROOT: &str = "https://login.microsoftonline.com";
    pub const GRANT_TYPE: &str = "client_credentials";
}

pub mod llm {
    pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
    pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
    pub const URL_SCHEMA_NAME: &str = "GraphAPIURL";
    pub const URL_SCHEMA_DESCRIPTION: &str = "A URL for the Microsoft Graph API.";
    pub const SYNTHESIS_TEMPERATURE: f64 = 0.2;
    pub const INTERPRET_TEMPERATURE: f64 = 0.8;
    pub const TITLE_TEMPERATURE: f64 = 0.4;
    pub const INTERPRET_MAX_TOKENS: u32 = 1_000;
    pub const TITLE_MAX_WORDS: usize = 5;
}

pub mod network {
    pub const TIMEOUT_LLM_REQUEST_MS: u64 = 60_000;
    pub const USER_AGENT: &str = "graph-copilot/0.3";
}

pub mod pagination {
    pub const MAX_PAGES: usize = 10;
}

pub mod limits {
    pub const SAMPLE_DATA_LIMIT: usize = 10;
    pub const ERROR_BODY_PREVIEW_BYTES: usize = 4 * 1024;
    pub const LOG_META_PREVIEW_BYTES: usize = 2 * 1024;
}

pub mod buffers {
    pub const LOG_BUFFER_SIZE: usize = 100;
}
