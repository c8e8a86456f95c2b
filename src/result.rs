use serde_derive::Serialize;
use serde_json::{ Map, Value };

pub const ERR_NO_JSON_BLOCK: &str = "no_json_block_found";
pub const ERR_JSON_PARSE: &str = "json_parse_failed";

/// Outcome of one IP lookup. Exactly one record is produced per input
/// address, whether the lookup succeeded, the page didn't parse, or the
/// request never completed.
#[derive(Serialize, Debug, Clone, Default)]
pub struct LookupResult {
    pub ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk: Option<String>,
    /// Auxiliary attributes promoted from the parsed payload.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
    /// The entire parsed block, kept for consumers needing fields that
    /// aren't promoted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_payload: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Truncated candidate text, present only when a located block failed
    /// to parse.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_snippet: Option<String>,
}

impl LookupResult {
    pub fn with_error(ip: &str, error: impl Into<String>) -> Self {
        LookupResult {
            ip: ip.to_string(),
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn parse_failure(ip: &str, snippet: String) -> Self {
        LookupResult {
            ip: ip.to_string(),
            error: Some(ERR_JSON_PARSE.to_string()),
            raw_snippet: Some(snippet),
            ..Default::default()
        }
    }

    /// Report cell content: full payload when parsed, the raw snippet when
    /// parsing failed, empty otherwise.
    pub fn raw_json(&self) -> String {
        if let Some(payload) = &self.raw_payload {
            serde_json::to_string(payload).unwrap_or_default()
        } else if let Some(snippet) = &self.raw_snippet {
            snippet.clone()
        } else {
            String::new()
        }
    }
}
