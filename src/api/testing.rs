//! Scripted in-process stand-in for the console API.

use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use super::transport::{RawResponse, Transport};
use crate::error::TransportError;

/// A request the fake received
#[derive(Debug, Clone)]
pub struct Call {
    pub path: String,
    pub query: Vec<(String, String)>,
    pub at: Instant,
}

impl Call {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Replays queued responses per path, in order
///
/// A path with nothing left queued answers 404, which surfaces as a
/// non-retryable request error in the test that forgot to script it.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<HashMap<String, VecDeque<Result<RawResponse, TransportError>>>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, path: &str, entry: Result<RawResponse, TransportError>) {
        self.script
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(entry);
    }

    pub fn push_body(&self, path: &str, body: String) {
        self.push(
            path,
            Ok(RawResponse {
                status: 200,
                body,
                retry_after: None,
            }),
        );
    }

    pub fn push_status(&self, path: &str, status: u16) {
        self.push(
            path,
            Ok(RawResponse {
                status,
                body: String::new(),
                retry_after: None,
            }),
        );
    }

    pub fn push_retry_after(&self, path: &str, status: u16, after: Duration) {
        self.push(
            path,
            Ok(RawResponse {
                status,
                body: String::new(),
                retry_after: Some(after),
            }),
        );
    }

    pub fn push_network_error(&self, path: &str, message: &str) {
        self.push(path, Err(TransportError::Network(message.to_string())));
    }

    pub fn push_invalid_request(&self, path: &str, message: &str) {
        self.push(path, Err(TransportError::InvalidRequest(message.to_string())));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.path == path).collect()
    }
}

impl Transport for ScriptedTransport {
    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<RawResponse, TransportError> {
        self.calls.lock().unwrap().push(Call {
            path: path.to_string(),
            query: query.to_vec(),
            at: Instant::now(),
        });

        let next = self
            .script
            .lock()
            .unwrap()
            .get_mut(path)
            .and_then(|queue| queue.pop_front());

        next.unwrap_or_else(|| {
            Ok(RawResponse {
                status: 404,
                body: String::new(),
                retry_after: None,
            })
        })
    }
}

/// Build a console-style list body
pub fn page_body(data: Value, next_cursor: Option<&str>) -> String {
    json!({
        "data": data,
        "pagination": {"nextCursor": next_cursor, "totalItems": Value::Null},
    })
    .to_string()
}

/// Build a list body that also reports `totalItems`
pub fn page_body_with_total(data: Value, next_cursor: Option<&str>, total: u64) -> String {
    json!({
        "data": data,
        "pagination": {"nextCursor": next_cursor, "totalItems": total},
    })
    .to_string()
}

/// `count` records `{"id": start.., "name": "item-N"}`
pub fn records(start: usize, count: usize) -> Value {
    Value::Array(
        (start..start + count)
            .map(|i| json!({"id": i, "name": format!("item-{}", i)}))
            .collect(),
    )
}
