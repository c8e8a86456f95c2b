use std::time::Duration;

use anyhow::Result;
use rand::Rng;
use reqwest::header::{ ACCEPT, USER_AGENT };
use tracing::debug;

use crate::extract::Extractor;
use crate::result::LookupResult;

/// Built-in browser strings used when no user agent list is supplied.
pub const DEFAULT_USER_AGENTS: [&str; 3] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.3",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1.1 Safari/605.1.1",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const ACCEPT_VALUE: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Fetches the per-IP result page and runs extraction on the body.
/// One instance is shared by all lookup tasks; the inner reqwest client
/// pools connections across requests.
pub struct LookupClient {
    http: reqwest::Client,
    base_url: String,
    user_agents: Vec<String>,
    extractor: Extractor,
}

impl LookupClient {
    pub fn new(base_url: &str, user_agents: Vec<String>) -> Result<LookupClient> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let user_agents = if user_agents.is_empty() {
            DEFAULT_USER_AGENTS.iter()
                .map(|s| s.to_string())
                .collect()
        } else {
            user_agents
        };
        Ok(LookupClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agents,
            extractor: Extractor::new()?,
        })
    }

    fn pick_user_agent(&self) -> &str {
        let idx = rand::thread_rng().gen_range(0..self.user_agents.len());
        &self.user_agents[idx]
    }

    /// Look up one IP. Transport failures, timeouts, and non-2xx statuses
    /// become `http_error:` records without attempting extraction; this
    /// never returns an error to the caller.
    pub async fn check_ip(&self, ip: &str) -> LookupResult {
        let url = format!("{}/ip/{}", self.base_url, ip);
        debug!(ip, "fetching {}", url);
        let sent = self.http
            .get(&url)
            .header(USER_AGENT, self.pick_user_agent())
            .header(ACCEPT, ACCEPT_VALUE)
            .send().await
            .and_then(|resp| resp.error_for_status());
        let resp = match sent {
            Ok(r) => r,
            Err(e) => {
                return LookupResult::with_error(ip, format!("http_error: {}", e));
            }
        };
        match resp.text().await {
            Ok(body) => self.extractor.extract(&body, ip),
            Err(e) => LookupResult::with_error(ip, format!("http_error: {}", e)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tracing_test::traced_test;

    const PAGE: &str = concat!(
        "<div>IP Fraud Risk API</div><pre>",
        r#"{"ip":"1.2.3.4","score":"42","risk":"high","operator":"ExampleNet"}"#,
        "</pre>"
    );

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    #[traced_test]
    async fn test_check_ip_extracts_risk_record() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();
        let _m = server
            .mock("GET", "/ip/1.2.3.4")
            .match_header("user-agent", mockito::Matcher::Regex("Mozilla".to_string()))
            .with_status(200)
            .with_body(PAGE)
            .create_async().await;

        let client = LookupClient::new(&url, vec![]).unwrap();
        let res = client.check_ip("1.2.3.4").await;
        assert!(res.error.is_none(), "{:?}", res.error);
        assert_eq!(res.ip, "1.2.3.4");
        assert_eq!(res.score.as_deref(), Some("42"));
        assert_eq!(res.risk.as_deref(), Some("high"));
        assert_eq!(
            res.extra.get("operator").and_then(|v| v.as_str()),
            Some("ExampleNet")
        );
        assert!(logs_contain("fetching"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_non_2xx_status_is_an_http_error() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();
        let _m = server
            .mock("GET", "/ip/6.6.6.6")
            .with_status(503)
            .create_async().await;

        let client = LookupClient::new(&url, vec!["probe-agent/1.0".to_string()]).unwrap();
        let res = client.check_ip("6.6.6.6").await;
        assert_eq!(res.ip, "6.6.6.6");
        let err = res.error.unwrap();
        assert!(err.starts_with("http_error:"), "{}", err);
        assert!(res.score.is_none());
        assert!(res.raw_payload.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_unreachable_host_is_an_http_error() {
        let client = LookupClient::new("http://127.0.0.1:9", vec![]).unwrap();
        let res = client.check_ip("7.7.7.7").await;
        let err = res.error.unwrap();
        assert!(err.starts_with("http_error:"), "{}", err);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_custom_user_agent_is_sent() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();
        let _m = server
            .mock("GET", "/ip/1.2.3.4")
            .match_header("user-agent", "probe-agent/1.0")
            .with_status(200)
            .with_body(PAGE)
            .create_async().await;

        let client = LookupClient::new(&url, vec!["probe-agent/1.0".to_string()]).unwrap();
        let res = client.check_ip("1.2.3.4").await;
        assert!(res.error.is_none(), "{:?}", res.error);
    }
}
