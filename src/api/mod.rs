// Console API access
//
// A transport moves bytes, the client layers authentication failures, retry
// and envelope parsing on top, and the paginator threads cursors or offsets
// across successive pages of one endpoint.

mod client;
mod page;
mod paginator;
mod retry;
mod transport;

#[cfg(test)]
pub mod testing;

pub use client::ApiClient;
pub use page::Record;
pub use paginator::Paginator;
pub use retry::RetryPolicy;
pub use transport::{HttpTransport, Transport};
