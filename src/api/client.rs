use super::page::{PageResponse, parse_page};
use super::retry::{RetryPolicy, StatusClass, classify};
use super::transport::Transport;
use crate::error::{ApiError, TransportError};

/// Authenticated requestor with per-call retry
pub struct ApiClient<T> {
    transport: T,
    retry: RetryPolicy,
}

impl<T: Transport> ApiClient<T> {
    pub fn new(transport: T, retry: RetryPolicy) -> Self {
        Self { transport, retry }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    #[cfg(test)]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetch one page using the client's default retry policy
    pub async fn fetch(&self, path: &str, query: &[(String, String)]) -> Result<PageResponse, ApiError> {
        self.fetch_with(path, query, self.retry).await
    }

    /// Fetch one page, retrying transient failures according to `policy`
    ///
    /// 429, 5xx and network errors are retried with exponential backoff.
    /// 401/403, other 4xx and unparseable bodies fail on the first attempt.
    pub async fn fetch_with(
        &self,
        path: &str,
        query: &[(String, String)],
        policy: RetryPolicy,
    ) -> Result<PageResponse, ApiError> {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            tracing::debug!("GET {} {:?} (attempt {}/{})", path, query, attempt, policy.max_attempts);

            let (last_error, requested_delay) = match self.transport.get(path, query).await {
                Ok(response) => match classify(response.status) {
                    StatusClass::Success => {
                        return parse_page(&response.body).map_err(|reason| {
                            tracing::error!("Malformed response from {}: {}", path, reason);
                            ApiError::MalformedResponse {
                                path: path.to_string(),
                                reason,
                            }
                        });
                    }
                    StatusClass::Unauthorized => {
                        tracing::error!("{} rejected credentials ({})", path, response.status);
                        return Err(ApiError::Authentication {
                            status: response.status,
                            path: path.to_string(),
                        });
                    }
                    StatusClass::Rejected => {
                        tracing::error!("{} returned {}", path, response.status);
                        return Err(ApiError::Request {
                            status: response.status,
                            path: path.to_string(),
                        });
                    }
                    StatusClass::Retryable => {
                        // Only rate limiting carries a delay the server asks us to honour
                        let requested = response.retry_after.filter(|_| response.status == 429);
                        (format!("HTTP {}", response.status), requested)
                    }
                },
                Err(TransportError::InvalidRequest(reason)) => {
                    tracing::error!("Cannot build request for {}: {}", path, reason);
                    return Err(ApiError::Build(reason));
                }
                Err(e) => (e.to_string(), None),
            };

            if attempt >= policy.max_attempts {
                tracing::error!(
                    "Giving up on {} after {} attempt(s): {}",
                    path,
                    attempt,
                    last_error
                );
                return Err(ApiError::TransientFailure {
                    path: path.to_string(),
                    attempts: attempt,
                    last_error,
                });
            }

            let delay = match requested_delay {
                Some(requested) => policy.server_delay(requested),
                None => policy.delay_for(attempt),
            };

            tracing::warn!(
                "{} failed (attempt {}/{}): {}; retrying in {:?}",
                path,
                attempt,
                policy.max_attempts,
                last_error,
                delay
            );

            tokio::time::sleep(delay).await;
        }
    }
}
