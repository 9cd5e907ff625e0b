use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::json;

use hireboard_types::{
    Application, ApplicationId, HireboardError, JobId, Result, SearchCriteria, StageMetrics,
    Status,
};

use crate::PipelineBackend;

// ---------------------------------------------------------------------------
// HttpBackend
// ---------------------------------------------------------------------------

/// REST adapter for the applicant-tracking API.
#[derive(Debug)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }

    /// Build from `HIREBOARD_API_URL` and the optional `HIREBOARD_API_TOKEN`.
    pub fn from_env() -> Result<Self> {
        let url = std::env::var("HIREBOARD_API_URL")
            .map_err(|_| HireboardError::Config("HIREBOARD_API_URL is not set".into()))?;
        let backend = Self::new(url);
        Ok(match std::env::var("HIREBOARD_API_TOKEN") {
            Ok(token) if !token.is_empty() => backend.with_token(token),
            _ => backend,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| HireboardError::Config(format!("invalid API url '{}': {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| HireboardError::Config(format!("API url '{}' cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(
        &self,
        operation: &str,
        subject: &str,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<String> {
        tracing::debug!(operation, %method, %url, "Backend request");
        let mut request = self.client.request(method, url);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }
        if let Some(ref body) = body {
            request = request.json(body);
        }

        let resp = request.send().await.map_err(|e| HireboardError::Backend {
            operation: operation.into(),
            status: 0,
            message: e.to_string(),
            retryable: true,
        })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| HireboardError::Backend {
            operation: operation.into(),
            status: status.as_u16(),
            message: e.to_string(),
            retryable: true,
        })?;

        if !status.is_success() {
            return Err(map_error(operation, subject, status, &text));
        }
        Ok(text)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        subject: &str,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<T> {
        let text = self.send(operation, subject, method, url, body).await?;
        serde_json::from_str(&text).map_err(|e| HireboardError::Backend {
            operation: operation.into(),
            status: 200,
            message: format!("Failed to parse response JSON: {e}"),
            retryable: false,
        })
    }
}

// ---------------------------------------------------------------------------
// Endpoint and error mapping
// ---------------------------------------------------------------------------

/// Terminal statuses have dedicated endpoints; everything else goes through
/// the generic status patch.
fn status_endpoint(id: &ApplicationId, status: Status) -> (Method, Vec<String>, Option<serde_json::Value>) {
    let id = id.as_str().to_owned();
    match status {
        Status::Rejected => (
            Method::POST,
            vec!["applications".into(), id, "reject".into()],
            None,
        ),
        Status::Withdrawn => (
            Method::POST,
            vec!["applications".into(), id, "withdraw".into()],
            None,
        ),
        Status::Applied | Status::Reviewing | Status::Interview | Status::Offer => (
            Method::PATCH,
            vec!["applications".into(), id, "status".into()],
            Some(json!({ "status": status })),
        ),
    }
}

fn map_error(operation: &str, subject: &str, status: StatusCode, body: &str) -> HireboardError {
    let status_u16 = status.as_u16();
    match status_u16 {
        401 | 403 => HireboardError::AuthError {
            operation: operation.into(),
        },
        404 => HireboardError::NotFound { id: subject.into() },
        408 | 429 | 500..=599 => HireboardError::Backend {
            operation: operation.into(),
            status: status_u16,
            message: extract_error_message(body),
            retryable: true,
        },
        _ => HireboardError::Backend {
            operation: operation.into(),
            status: status_u16,
            message: extract_error_message(body),
            retryable: false,
        },
    }
}

fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v["error"]["message"]
                .as_str()
                .or_else(|| v["message"].as_str())
                .or_else(|| v["error"].as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}

// ---------------------------------------------------------------------------
// PipelineBackend impl
// ---------------------------------------------------------------------------

#[async_trait]
impl PipelineBackend for HttpBackend {
    async fn load_pipeline(&self, job_id: &JobId) -> Result<Vec<Application>> {
        let url = self.url(&["jobs", job_id.as_str(), "applications"])?;
        self.send_json("load_pipeline", job_id.as_str(), Method::GET, url, None)
            .await
    }

    async fn update_status(&self, id: &ApplicationId, status: Status) -> Result<Application> {
        let (method, segments, body) = status_endpoint(id, status);
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
        let url = self.url(&segments)?;
        self.send_json("update_status", id.as_str(), method, url, body)
            .await
    }

    async fn search(
        &self,
        job_id: &JobId,
        criteria: &SearchCriteria,
    ) -> Result<Vec<Application>> {
        let url = self.url(&["jobs", job_id.as_str(), "applications", "search"])?;
        let body = serde_json::to_value(criteria)?;
        self.send_json("search", job_id.as_str(), Method::POST, url, Some(body))
            .await
    }

    async fn delete_application(&self, id: &ApplicationId) -> Result<()> {
        let url = self.url(&["applications", id.as_str()])?;
        self.send("delete_application", id.as_str(), Method::DELETE, url, None)
            .await?;
        Ok(())
    }

    async fn stage_metrics(&self, job_id: &JobId) -> Result<HashMap<Status, StageMetrics>> {
        let url = self.url(&["jobs", job_id.as_str(), "applications", "metrics"])?;
        self.send_json("stage_metrics", job_id.as_str(), Method::GET, url, None)
            .await
    }

    fn name(&self) -> &str {
        "http"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_segments_onto_base_path() {
        let backend = HttpBackend::new("https://ats.example.com/api/v2/");
        let url = backend.url(&["jobs", "job-1", "applications"]).unwrap();
        assert_eq!(url.as_str(), "https://ats.example.com/api/v2/jobs/job-1/applications");
    }

    #[test]
    fn url_escapes_opaque_ids() {
        let backend = HttpBackend::new("https://ats.example.com");
        let url = backend.url(&["applications", "a/b c"]).unwrap();
        assert_eq!(url.as_str(), "https://ats.example.com/applications/a%2Fb%20c");
    }

    #[test]
    fn invalid_base_url_is_config_error() {
        let backend = HttpBackend::new("not a url");
        assert!(matches!(
            backend.url(&["jobs"]),
            Err(HireboardError::Config(_))
        ));
    }

    #[test]
    fn rejected_uses_dedicated_endpoint() {
        let (method, segments, body) = status_endpoint(&ApplicationId::new("a-1"), Status::Rejected);
        assert_eq!(method, Method::POST);
        assert_eq!(segments, vec!["applications", "a-1", "reject"]);
        assert!(body.is_none());
    }

    #[test]
    fn column_moves_patch_status() {
        let (method, segments, body) = status_endpoint(&ApplicationId::new("a-1"), Status::Interview);
        assert_eq!(method, Method::PATCH);
        assert_eq!(segments, vec!["applications", "a-1", "status"]);
        assert_eq!(body, Some(json!({ "status": "interview" })));
    }

    #[test]
    fn map_error_classifies_statuses() {
        assert!(matches!(
            map_error("update_status", "a-1", StatusCode::UNAUTHORIZED, ""),
            HireboardError::AuthError { .. }
        ));
        assert!(matches!(
            map_error("update_status", "a-1", StatusCode::NOT_FOUND, ""),
            HireboardError::NotFound { id } if id == "a-1"
        ));
        assert!(map_error("search", "job", StatusCode::SERVICE_UNAVAILABLE, "").is_retryable());
        assert!(!map_error("search", "job", StatusCode::UNPROCESSABLE_ENTITY, "").is_retryable());
    }

    #[test]
    fn extract_error_message_prefers_json_fields() {
        assert_eq!(
            extract_error_message(r#"{"error":{"message":"stage locked"}}"#),
            "stage locked"
        );
        assert_eq!(extract_error_message(r#"{"message":"nope"}"#), "nope");
        assert_eq!(extract_error_message("plain failure"), "plain failure");
    }
}
