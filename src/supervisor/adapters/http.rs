//! HTTP readiness probe backed by `reqwest`.

use crate::supervisor::ports::{HealthProbe, HealthProbeError, HealthProbeResult};
use async_trait::async_trait;
use std::time::Duration;

/// Readiness probe issuing a `GET` and accepting any 2xx status.
#[derive(Debug, Clone, Default)]
pub struct ReqwestHealthProbe {
    client: reqwest::Client,
}

impl ReqwestHealthProbe {
    /// Creates a probe with a fresh HTTP client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HealthProbe for ReqwestHealthProbe {
    async fn probe(&self, url: &str, timeout: Duration) -> HealthProbeResult<()> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    HealthProbeError::Timeout
                } else {
                    HealthProbeError::Unreachable(err.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(HealthProbeError::UnexpectedStatus(status.as_u16()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn success_status_is_ready() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/cache/stats"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let result = ReqwestHealthProbe::new()
            .probe(
                &format!("{}/api/cache/stats", server.uri()),
                Duration::from_secs(1),
            )
            .await;

        assert_eq!(result, Ok(()));
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = ReqwestHealthProbe::new()
            .probe(&server.uri(), Duration::from_secs(1))
            .await;

        assert_eq!(result, Err(HealthProbeError::UnexpectedStatus(503)));
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let result = ReqwestHealthProbe::new()
            .probe(&server.uri(), Duration::from_millis(50))
            .await;

        assert_eq!(result, Err(HealthProbeError::Timeout));
    }
}
