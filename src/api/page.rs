use serde_json::{Map, Value};

/// One item returned by the API, field order as received
pub type Record = Map<String, Value>;

/// Parsed body of a single list request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageResponse {
    pub records: Vec<Record>,
    pub next_cursor: Option<String>,
    pub total_count: Option<u64>,
    /// `data` elements that were not objects and were dropped
    pub skipped: usize,
}

/// Parse the console's `{"data": ..., "pagination": {...}}` envelope
///
/// Errors only when the body is not a JSON object. Non-object entries in
/// `data` are counted in `skipped` rather than failing the page.
pub fn parse_page(body: &str) -> Result<PageResponse, String> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| format!("body is not valid JSON: {}", e))?;

    let Value::Object(mut envelope) = value else {
        return Err(format!("expected a JSON object, got {}", kind_of(&value)));
    };

    let mut page = PageResponse::default();

    match envelope.remove("data") {
        None | Some(Value::Null) => {}
        Some(Value::Array(items)) => {
            for (index, item) in items.into_iter().enumerate() {
                match item {
                    Value::Object(record) => page.records.push(record),
                    other => {
                        tracing::warn!(
                            "Skipping data[{}]: expected an object, got {}",
                            index,
                            kind_of(&other)
                        );
                        page.skipped += 1;
                    }
                }
            }
        }
        Some(Value::Object(record)) => page.records.push(record),
        Some(other) => {
            return Err(format!("'data' must be an array or object, got {}", kind_of(&other)));
        }
    }

    if let Some(Value::Object(pagination)) = envelope.get("pagination") {
        page.next_cursor = pagination
            .get("nextCursor")
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
            .map(String::from);
        page.total_count = pagination.get("totalItems").and_then(Value::as_u64);
    }

    Ok(page)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
