use super::client::ApiClient;
use super::page::{PageResponse, Record};
use super::transport::Transport;
use crate::endpoints::{EndpointDescriptor, PaginationKind};
use crate::error::ApiError;

/// Records gathered from one endpoint
///
/// `error` is set when pagination stopped early; `records` then holds every
/// page that was fetched before the failure.
#[derive(Debug)]
pub struct Collection {
    pub records: Vec<Record>,
    pub pages: u32,
    /// Malformed `data` entries dropped across all pages
    pub skipped: usize,
    pub error: Option<ApiError>,
}

impl Collection {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Position {
    Start,
    Cursor(String),
    Offset(u64),
    Done,
}

/// Walks one endpoint page by page
///
/// Single pass: once exhausted (or failed) it yields nothing more. Build a
/// new paginator to start over from the first page.
pub struct Paginator<'a, T> {
    client: &'a ApiClient<T>,
    endpoint: &'a EndpointDescriptor,
    position: Position,
    pages_fetched: u32,
    max_pages: u32,
}

impl<'a, T: Transport> Paginator<'a, T> {
    pub fn new(client: &'a ApiClient<T>, endpoint: &'a EndpointDescriptor, max_pages: u32) -> Self {
        Self {
            client,
            endpoint,
            position: Position::Start,
            pages_fetched: 0,
            max_pages: max_pages.max(1),
        }
    }

    fn query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();

        if self.endpoint.pagination != PaginationKind::None {
            query.push(("limit".to_string(), self.endpoint.page_size.to_string()));
        }

        match &self.position {
            Position::Cursor(cursor) => query.push(("cursor".to_string(), cursor.clone())),
            Position::Offset(skip) => query.push(("skip".to_string(), skip.to_string())),
            Position::Start | Position::Done => {}
        }

        query
    }

    /// Fetch the next page, or `None` once the endpoint is exhausted
    pub async fn next_page(&mut self) -> Result<Option<PageResponse>, ApiError> {
        if self.position == Position::Done {
            return Ok(None);
        }

        if self.pages_fetched >= self.max_pages {
            tracing::warn!(
                "{}: stopping after {} pages (max_pages reached)",
                self.endpoint.name,
                self.pages_fetched
            );
            self.position = Position::Done;
            return Ok(None);
        }

        let query = self.query();
        let page = match self.client.fetch(self.endpoint.path, &query).await {
            Ok(page) => page,
            Err(e) => {
                self.position = Position::Done;
                return Err(e);
            }
        };
        self.pages_fetched += 1;

        tracing::debug!(
            "{}: page {} returned {} record(s)",
            self.endpoint.name,
            self.pages_fetched,
            page.records.len()
        );

        self.position = self.advance(&page);
        Ok(Some(page))
    }

    fn advance(&self, page: &PageResponse) -> Position {
        match self.endpoint.pagination {
            PaginationKind::None => Position::Done,
            PaginationKind::Cursor => {
                if page.records.is_empty() {
                    return Position::Done;
                }
                match &page.next_cursor {
                    None => Position::Done,
                    Some(next) if self.position == Position::Cursor(next.clone()) => {
                        tracing::warn!(
                            "{}: API repeated cursor, stopping to avoid a loop",
                            self.endpoint.name
                        );
                        Position::Done
                    }
                    Some(next) => Position::Cursor(next.clone()),
                }
            }
            PaginationKind::Offset => {
                let skip = match self.position {
                    Position::Offset(skip) => skip,
                    _ => 0,
                };
                let returned = page.records.len() as u64;
                let next = skip + returned;

                let short_page = returned < u64::from(self.endpoint.page_size);
                let reached_total = page.total_count.is_some_and(|total| next >= total);

                if returned == 0 || short_page || reached_total {
                    Position::Done
                } else {
                    Position::Offset(next)
                }
            }
        }
    }

    /// Drain every page into a single collection
    ///
    /// A failing page ends collection; records from earlier pages are kept.
    pub async fn collect(mut self) -> Collection {
        let mut collection = Collection {
            records: Vec::new(),
            pages: 0,
            skipped: 0,
            error: None,
        };

        loop {
            match self.next_page().await {
                Ok(Some(page)) => {
                    collection.pages += 1;
                    collection.skipped += page.skipped;
                    collection.records.extend(page.records);
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(
                        "{}: stopped after {} page(s), {} record(s) kept: {}",
                        self.endpoint.name,
                        collection.pages,
                        collection.records.len(),
                        e
                    );
                    collection.error = Some(e);
                    break;
                }
            }
        }

        collection
    }
}
