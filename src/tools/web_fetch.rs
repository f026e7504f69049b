//! web_fetch tool - host-side HTTP fetch behind the SSRF gate

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;

use crate::fetch::{FetchError, SafeFetcher};

use super::{Tool, ToolContext, ToolOutcome};

#[derive(Debug, Deserialize)]
struct WebFetchArgs {
    url: String,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    max_bytes: Option<usize>,
}

pub struct WebFetchTool {
    fetcher: Arc<SafeFetcher>,
}

impl WebFetchTool {
    pub fn new(fetcher: Arc<SafeFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl Tool for WebFetchTool {
    fn name(&self) -> &'static str {
        "web_fetch"
    }

    fn description(&self) -> &'static str {
        "Fetch a public http(s) URL and return the response body (capped). \
         Destinations resolving to private, loopback, or otherwise internal \
         addresses are refused, as are redirects pointing at them."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The http or https URL to fetch"
                },
                "method": {
                    "type": "string",
                    "description": "HTTP method (default GET)"
                },
                "max_bytes": {
                    "type": "integer",
                    "description": "Override the response byte cap"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, _ctx: &ToolContext, args: serde_json::Value) -> ToolOutcome {
        let args: WebFetchArgs = match serde_json::from_value(args) {
            Ok(a) => a,
            Err(e) => return ToolOutcome::fail("bad_arguments", e.to_string()),
        };

        let method = match args.method.as_deref() {
            None => Method::GET,
            Some(raw) => match raw.to_ascii_uppercase().parse::<Method>() {
                Ok(m) => m,
                Err(_) => {
                    return ToolOutcome::fail(
                        "bad_arguments",
                        format!("unsupported HTTP method {:?}", raw),
                    )
                }
            },
        };

        match self
            .fetcher
            .fetch(&args.url, method, &[], None, args.max_bytes)
            .await
        {
            Ok(outcome) => {
                let mut text = format!(
                    "Status: {}\nFinal URL: {}\nContent-Type: {}\n\n{}",
                    outcome.status,
                    outcome.final_url,
                    outcome.content_type.as_deref().unwrap_or("unknown"),
                    outcome.body
                );
                if outcome.truncated {
                    text.push_str("\n(response truncated)");
                }
                let mut result = ToolOutcome::ok(text);
                result.truncated = outcome.truncated;
                result
            }
            // The error page itself is often what the model needs to read.
            Err(FetchError::HttpError { status, body }) => ToolOutcome::fail(
                "http_error",
                format!("HTTP status {}\n\n{}", status, body),
            ),
            Err(e) => ToolOutcome::fail(e.kind(), e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchConfig;

    fn tool() -> WebFetchTool {
        WebFetchTool::new(Arc::new(SafeFetcher::new(FetchConfig::default())))
    }

    fn ctx() -> ToolContext {
        ToolContext {
            chat_id: "cli-test".to_string(),
        }
    }

    #[tokio::test]
    async fn rejects_metadata_endpoint() {
        let outcome = tool()
            .execute(
                &ctx(),
                serde_json::json!({"url": "http://169.254.169.254/latest/meta-data/"}),
            )
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.error_kind.as_deref(), Some("blocked_address"));
    }

    #[tokio::test]
    async fn rejects_bad_scheme() {
        let outcome = tool()
            .execute(&ctx(), serde_json::json!({"url": "ftp://example.com/x"}))
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.error_kind.as_deref(), Some("bad_scheme"));
    }

    #[tokio::test]
    async fn rejects_unknown_method() {
        let outcome = tool()
            .execute(
                &ctx(),
                serde_json::json!({"url": "http://example.com/", "method": "TELEPORT "}),
            )
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.error_kind.as_deref(), Some("bad_arguments"));
    }

    #[tokio::test]
    async fn rejects_missing_url() {
        let outcome = tool().execute(&ctx(), serde_json::json!({})).await;
        assert!(!outcome.success);
        assert_eq!(outcome.error_kind.as_deref(), Some("bad_arguments"));
    }
}
