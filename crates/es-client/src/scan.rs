//! Scroll-based scanning
//!
//! `ElasticClient::scan` opens a scroll context and returns a `ScanCursor` that
//! yields every matching hit once. The scroll context is cleared when the cursor
//! is exhausted, closed, or dropped.

use crate::client::ElasticClient;
use crate::transport::{Request, Response, Transport};
use es_storage_core::prelude::*;
use futures::{stream, Stream};
use reqwest::Method;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// How long the cluster keeps the scroll context alive between pages
pub const SCROLL_KEEP_ALIVE: &str = "5m";

/// Hits per page unless the query sets its own `size`
pub const SCAN_PAGE_SIZE: u64 = 1000;

/// Cursor over all hits of a scroll search
pub struct ScanCursor {
    transport: Arc<Transport>,
    index: String,
    scroll_id: Option<String>,
    page: VecDeque<Value>,
    exhausted: bool,
}

impl ElasticClient {
    /// Scan every document matching `query`
    ///
    /// Hits are returned in index order (`_doc`) unless the query sorts them.
    pub async fn scan(&self, index: &str, query: &Value) -> Result<ScanCursor> {
        let mut body = match query {
            Value::Object(_) => query.clone(),
            Value::Null => json!({}),
            other => {
                return Err(StorageError::invalid_input(format!(
                    "Scan query must be an object, got {}",
                    other
                )))
            }
        };
        if body.get("size").is_none() {
            body["size"] = json!(SCAN_PAGE_SIZE);
        }
        if body.get("sort").is_none() {
            body["sort"] = json!(["_doc"]);
        }

        let request = Request::new("scan", Method::POST, &[index, "_search"])
            .param("scroll", SCROLL_KEEP_ALIVE)
            .json(body);
        let response = self.perform(request).await.with_context(ErrorContext {
            operation: "scan",
            index: Some(index.to_string()),
            document_id: None,
        })?;

        let mut cursor = ScanCursor {
            transport: self.transport.clone(),
            index: index.to_string(),
            scroll_id: None,
            page: VecDeque::new(),
            exhausted: false,
        };
        cursor.absorb(response).await?;
        Ok(cursor)
    }
}

impl ScanCursor {
    /// Next hit, fetching another page when the current one is drained
    pub async fn next(&mut self) -> Result<Option<Value>> {
        loop {
            if let Some(hit) = self.page.pop_front() {
                return Ok(Some(hit));
            }
            if self.exhausted {
                return Ok(None);
            }
            self.fetch_page().await?;
        }
    }

    /// Stop early and clear the scroll context
    pub async fn close(mut self) -> Result<()> {
        self.exhausted = true;
        self.page.clear();
        self.release().await
    }

    /// Adapt the cursor into a stream; the stream ends after the first error
    pub fn into_stream(self) -> impl Stream<Item = Result<Value>> + Send {
        stream::unfold(Some(self), |state| async move {
            let mut cursor = state?;
            match cursor.next().await {
                Ok(Some(hit)) => Some((Ok(hit), Some(cursor))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    /// Whether every page has been fetched
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    async fn fetch_page(&mut self) -> Result<()> {
        let Some(scroll_id) = self.scroll_id.clone() else {
            self.exhausted = true;
            return Ok(());
        };

        let request = Request::new("scroll", Method::POST, &["_search", "scroll"]).json(json!({
            "scroll": SCROLL_KEEP_ALIVE,
            "scroll_id": scroll_id
        }));

        match self.transport.send(request).await.and_then(Response::into_result) {
            Ok(response) => self.absorb(response).await,
            Err(e) => {
                self.exhausted = true;
                if let Err(clear_err) = self.release().await {
                    debug!(error = %clear_err, "Failed to clear scroll after error");
                }
                Err(e)
            }
        }
    }

    async fn absorb(&mut self, mut response: Value) -> Result<()> {
        if let Some(id) = response["_scroll_id"].as_str() {
            self.scroll_id = Some(id.to_string());
        }

        if let Some(message) = shard_failure(&response) {
            self.exhausted = true;
            if let Err(e) = self.release().await {
                debug!(error = %e, "Failed to clear scroll after shard failure");
            }
            return Err(StorageError::scan(message));
        }

        let hits = match response.pointer_mut("/hits/hits").map(Value::take) {
            Some(Value::Array(hits)) => hits,
            _ => Vec::new(),
        };

        if hits.is_empty() {
            self.exhausted = true;
            if let Err(e) = self.release().await {
                debug!(error = %e, "Failed to clear exhausted scroll");
            }
            return Ok(());
        }

        trace!(index = %self.index, hits = hits.len(), "Fetched scroll page");
        self.transport.metrics().record_scan_page(&self.index);
        self.page.extend(hits);
        Ok(())
    }

    async fn release(&mut self) -> Result<()> {
        match self.scroll_id.take() {
            Some(scroll_id) => clear_scroll(&self.transport, scroll_id).await,
            None => Ok(()),
        }
    }
}

impl Drop for ScanCursor {
    fn drop(&mut self) {
        let Some(scroll_id) = self.scroll_id.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let transport = self.transport.clone();
                handle.spawn(async move {
                    if let Err(e) = clear_scroll(&transport, scroll_id).await {
                        warn!(error = %e, "Failed to clear abandoned scroll");
                    }
                });
            }
            Err(_) => {
                warn!(index = %self.index, "Scan cursor dropped outside a runtime, scroll left to expire");
            }
        }
    }
}

async fn clear_scroll(transport: &Transport, scroll_id: String) -> Result<()> {
    let request = Request::new("clear_scroll", Method::DELETE, &["_search", "scroll"])
        .json(json!({ "scroll_id": [scroll_id] }));
    let response = transport.send(request).await?;

    // an already-expired context is gone either way
    if response.status.is_success() || response.status == reqwest::StatusCode::NOT_FOUND {
        return Ok(());
    }
    response.into_result().map(|_| ())
}

fn shard_failure(response: &Value) -> Option<String> {
    let shards = response.get("_shards")?;
    let total = shards["total"].as_u64()?;
    let successful = shards["successful"].as_u64().unwrap_or(0);
    let skipped = shards["skipped"].as_u64().unwrap_or(0);

    (successful + skipped < total).then(|| {
        format!(
            "Scroll request has only succeeded on {} (+{} skipped) shards out of {}",
            successful, skipped, total
        )
    })
}
