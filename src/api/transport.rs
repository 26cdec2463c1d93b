use reqwest::Client;
use std::time::Duration;
use url::Url;

use crate::config::ApiToken;
use crate::error::{ApiError, TransportError};

/// Raw result of one HTTP exchange
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
    /// Parsed `Retry-After` header, seconds form only
    pub retry_after: Option<Duration>,
}

/// A single authenticated GET, without retries
///
/// The requestor owns retry and classification; implementations only move
/// bytes.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<RawResponse, TransportError>;
}

/// reqwest-backed transport against the management console
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    token: ApiToken,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(base_url: Url, token: ApiToken, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(format!("s1-export/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Build(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            token,
            timeout,
        })
    }

    /// Join an endpoint path onto the base URL, keeping the base's own path
    pub fn url_for(&self, path: &str, query: &[(String, String)]) -> Result<Url, ApiError> {
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let mut url = Url::parse(&joined).map_err(|e| ApiError::Build(format!("{}: {}", joined, e)))?;

        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }

        Ok(url)
    }
}

impl Transport for HttpTransport {
    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<RawResponse, TransportError> {
        let url = self
            .url_for(path, query)
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        let response = self
            .client
            .get(url)
            .header("Authorization", format!("ApiToken {}", self.token.expose()))
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout(self.timeout)
                } else {
                    TransportError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(self.timeout)
            } else {
                TransportError::Network(format!("failed to read response body: {}", e))
            }
        })?;

        Ok(RawResponse {
            status,
            body,
            retry_after,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(base: &str) -> HttpTransport {
        HttpTransport::new(
            Url::parse(base).unwrap(),
            ApiToken::new("secret".to_string()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_url_keeps_base_path() {
        let t = transport("https://console.example.net/web/api/v2.1");
        let url = t.url_for("/sites", &[]).unwrap();
        assert_eq!(url.as_str(), "https://console.example.net/web/api/v2.1/sites");
    }

    #[test]
    fn test_url_tolerates_trailing_slash_on_base() {
        let t = transport("https://console.example.net/web/api/v2.1/");
        let url = t.url_for("/agents", &[]).unwrap();
        assert_eq!(url.path(), "/web/api/v2.1/agents");
    }

    #[test]
    fn test_url_encodes_query_parameters() {
        let t = transport("https://console.example.net/web/api/v2.1");
        let query = vec![
            ("limit".to_string(), "100".to_string()),
            ("cursor".to_string(), "a b+c==".to_string()),
        ];
        let url = t.url_for("/agents", &query).unwrap();
        assert_eq!(url.query(), Some("limit=100&cursor=a+b%2Bc%3D%3D"));
    }
}
