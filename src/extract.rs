use anyhow::Result;
use regex::Regex;
use serde_json::{ Map, Value };
use tracing::trace;

use crate::result::{ LookupResult, ERR_NO_JSON_BLOCK };

/// Phrase the page prints right before the structured risk block.
const JSON_MARKER: &str = "IP Fraud Risk API";
const RAW_SNIPPET_MAX: usize = 200;
/// Payload keys copied into `LookupResult::extra` when present.
const PROMOTED_FIELDS: [&str; 4] = ["is_blacklisted_external", "operator", "hostname", "asn"];

/// Turns raw page text into a `LookupResult`. Compiled once and shared
/// across lookup tasks; every path returns a result, never an error.
pub struct Extractor {
    html_tag: Regex,
    line_comment: Regex,
    trailing_comma_obj: Regex,
    trailing_comma_arr: Regex,
    field_ip: Regex,
    field_score: Regex,
    field_risk: Regex,
}

impl Extractor {
    pub fn new() -> Result<Extractor> {
        Ok(Extractor {
            html_tag: Regex::new(r"<[^>]+>")?,
            line_comment: Regex::new(r"(?m)//.*?$")?,
            trailing_comma_obj: Regex::new(r",\s*\}")?,
            trailing_comma_arr: Regex::new(r",\s*\]")?,
            field_ip: Regex::new(r#""ip"\s*:\s*"([^"]+)""#)?,
            field_score: Regex::new(r#""score"\s*:\s*"([^"]+)""#)?,
            field_risk: Regex::new(r#""risk"\s*:\s*"([^"]+)""#)?,
        })
    }

    pub fn extract(&self, page: &str, queried_ip: &str) -> LookupResult {
        match self.balanced_block(page) {
            Some(block) => {
                let candidate = self.sanitize(block);
                match self.parse_lenient(&candidate) {
                    Some(parsed) => self.promote(parsed, queried_ip),
                    None =>
                        LookupResult::parse_failure(
                            queried_ip,
                            truncate_chars(&candidate, RAW_SNIPPET_MAX)
                        ),
                }
            }
            // the field scrape only runs when no block was found at all;
            // a located-but-unparseable block stays a parse failure
            None => self.scrape_fields(page, queried_ip),
        }
    }

    /// Returns the substring from the first `{` at or after the marker up
    /// to the `}` where brace depth returns to zero. Without the marker
    /// the scan starts at the beginning of the text.
    fn balanced_block<'a>(&self, text: &'a str) -> Option<&'a str> {
        let origin = text.find(JSON_MARKER).unwrap_or(0);
        let start = origin + text[origin..].find('{')?;
        let mut depth = 0usize;
        for (off, ch) in text[start..].char_indices() {
            match ch {
                '{' => {
                    depth += 1;
                }
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(&text[start..start + off + 1]);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Repairs the usual damage templated HTML inflicts on the block:
    /// stray tags, `...` placeholders, `//` comments, trailing commas.
    fn sanitize(&self, block: &str) -> String {
        let no_tags = self.html_tag.replace_all(block, "");
        let no_ellipsis = no_tags.replace("...", "");
        let no_comments = self.line_comment.replace_all(&no_ellipsis, "");
        let fixed_obj = self.trailing_comma_obj.replace_all(&no_comments, "}");
        let fixed_arr = self.trailing_comma_arr.replace_all(&fixed_obj, "]");
        fixed_arr.into_owned()
    }

    /// Strict parse first, then one retry with single quotes swapped for
    /// double quotes. Anything that isn't a JSON object counts as failed.
    fn parse_lenient(&self, candidate: &str) -> Option<Map<String, Value>> {
        let parsed: Option<Value> = serde_json
            ::from_str(candidate)
            .ok()
            .or_else(|| serde_json::from_str(&candidate.replace('\'', "\"")).ok());
        match parsed {
            Some(Value::Object(map)) => Some(map),
            _ => None,
        }
    }

    fn promote(&self, parsed: Map<String, Value>, queried_ip: &str) -> LookupResult {
        let ip = match parsed.get("ip") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(v) if !v.is_null() => v.to_string(),
            _ => queried_ip.to_string(),
        };
        let score = parsed
            .get("score")
            .filter(|v| !v.is_null())
            .map(value_to_text);
        let risk = parsed
            .get("risk")
            .filter(|v| !v.is_null())
            .map(value_to_text);
        let mut extra = Map::new();
        for key in PROMOTED_FIELDS {
            if let Some(v) = parsed.get(key) {
                extra.insert(key.to_string(), v.clone());
            }
        }
        LookupResult {
            ip,
            score,
            risk,
            extra,
            raw_payload: Some(parsed),
            ..Default::default()
        }
    }

    /// Last resort when no balanced block exists: match the known fields
    /// as quoted key/value pairs anywhere in the raw text.
    fn scrape_fields(&self, text: &str, queried_ip: &str) -> LookupResult {
        let ip = capture(&self.field_ip, text);
        let score = capture(&self.field_score, text);
        let risk = capture(&self.field_risk, text);
        if ip.is_none() && score.is_none() && risk.is_none() {
            return LookupResult::with_error(queried_ip, ERR_NO_JSON_BLOCK);
        }
        trace!(ip = queried_ip, "recovered fields via direct scrape");
        LookupResult {
            ip: ip.unwrap_or_else(|| queried_ip.to_string()),
            score,
            risk,
            ..Default::default()
        }
    }
}

fn value_to_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
