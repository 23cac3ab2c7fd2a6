use std::sync::Arc;
use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use tender_common::{CrawlError, CrawlResult};

use crate::rate_limit::HostRateLimiter;

/// Client settings shared by every adapter session.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: "tender-scout/0.1".to_string(),
        }
    }
}

impl HttpSettings {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// HTTP client scoped to one adapter invocation.
///
/// Every request waits on the adapter's host rate limiter and carries the
/// session timeout. Non-success statuses become typed `CrawlError`s.
pub struct HttpSession {
    client: reqwest::Client,
    limiter: Arc<HostRateLimiter>,
}

impl HttpSession {
    pub fn open(settings: &HttpSettings, limiter: Arc<HostRateLimiter>) -> CrawlResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|e| CrawlError::Transport(Box::new(e)))?;
        Ok(Self { client, limiter })
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    /// Send a request after waiting for the host's rate-limit slot.
    pub async fn send(&self, request: RequestBuilder) -> CrawlResult<Response> {
        let request = request.build().map_err(|e| CrawlError::InvalidUrl {
            url: e.url().map(|u| u.to_string()).unwrap_or_else(|| e.to_string()),
        })?;
        let url = request.url().clone();
        self.limiter.acquire(url.host_str().unwrap_or_default()).await;

        let response = self.client.execute(request).await.map_err(|e| {
            if e.is_timeout() {
                CrawlError::Timeout { url: url.to_string() }
            } else {
                CrawlError::Transport(Box::new(e))
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = url.to_string();
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CrawlError::Unauthorized {
                url,
                status: status.as_u16(),
            },
            StatusCode::TOO_MANY_REQUESTS => CrawlError::RateLimitExceeded { url },
            _ => CrawlError::HttpStatus {
                url,
                status: status.as_u16(),
            },
        })
    }

    pub async fn bytes(&self, request: RequestBuilder) -> CrawlResult<Vec<u8>> {
        let response = self.send(request).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| CrawlError::Transport(Box::new(e)))?;
        Ok(bytes.to_vec())
    }

    pub async fn text(&self, request: RequestBuilder) -> CrawlResult<String> {
        let response = self.send(request).await?;
        response
            .text()
            .await
            .map_err(|e| CrawlError::Transport(Box::new(e)))
    }

    pub async fn json(&self, request: RequestBuilder) -> CrawlResult<serde_json::Value> {
        let response = self.send(request).await?;
        let url = response.url().to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| CrawlError::Transport(Box::new(e)))?;
        serde_json::from_slice(&bytes).map_err(|e| CrawlError::malformed(url, e))
    }
}
