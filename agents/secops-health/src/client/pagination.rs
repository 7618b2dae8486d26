//! Page-token pagination
//!
//! Drives a page fetch across continuation cursors and concatenates the
//! results in arrival order. There is no page cap: a backend that keeps
//! returning cursors keeps the loop running.

use std::future::Future;

use crate::contracts::Page;
use crate::error::{HealthCheckError, Result};

/// Items gathered across all pages of one paginated fetch
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet<T> {
    items: Vec<T>,
    pages: usize,
}

impl<T> ResultSet<T> {
    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of pages fetched
    pub fn pages(&self) -> usize {
        self.pages
    }
}

/// Fetch every page, starting without a cursor.
///
/// `fetch_page` receives the cursor to continue from and must reuse the
/// parameters of the query that produced it. Collection stops on the first
/// page without a (non-empty) cursor.
///
/// Fails with [`HealthCheckError::DataAbsence`] if the first page has no
/// result list at all. A later page without a result list is counted as empty.
pub async fn collect_pages<T, F, Fut>(mut fetch_page: F) -> Result<ResultSet<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut items = Vec::new();
    let mut pages = 0;
    let mut cursor: Option<String> = None;

    loop {
        let page = fetch_page(cursor.take()).await?;
        pages += 1;

        match page.items {
            Some(batch) => {
                tracing::info!(page = pages, count = batch.len(), "Retrieved page");
                items.extend(batch);
            }
            None if pages == 1 => {
                return Err(HealthCheckError::data_absence(
                    "first page returned no result list",
                ));
            }
            None => {
                tracing::warn!(page = pages, "Page returned no result list, counting it as empty");
            }
        }

        match page.next_cursor.filter(|token| !token.is_empty()) {
            Some(next) => {
                tracing::info!(page_token = %next, "Following page token");
                cursor = Some(next);
            }
            None => break,
        }
    }

    Ok(ResultSet { items, pages })
}
