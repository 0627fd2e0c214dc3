//! Paginated scan cursors.
//!
//! This module provides [`ScanCursor`], a single-owner iterator over a row
//! range. The cursor pulls rows from the cluster in batches of `cache_size`
//! and hands them out one at a time, so large scans never hold more than one
//! batch in memory.

use std::collections::VecDeque;
use std::ops::Bound;
use std::sync::Arc;

use bytes::Bytes;

use crate::config::validate_cache_size;
use crate::error::{Error, Result};
use crate::filter::Filter;
use crate::metrics::{CallObserver, NoopObserver, observe};
use crate::model::RowResult;
use crate::proto;
use crate::rpc::{RpcClient, ScanBatchRequest};

/// Lifecycle of a [`ScanCursor`].
///
/// `Created → Active → Exhausted | Closed`. `Closed` is reachable from every
/// state. Both `Exhausted` and `Closed` are terminal for iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// No batch has been requested yet; filters may still be added.
    Created,
    /// At least one batch has been requested.
    Active,
    /// The range has been fully read, or a batch failed.
    Exhausted,
    /// The cursor was closed by its owner.
    Closed,
}

/// An iterator over the rows of a table range.
///
/// Created by [`Client::scan`](crate::Client::scan) or [`ScanCursor::new`].
/// Yields rows in row-key order as returned by the server.
///
/// # Ownership
///
/// A cursor is driven through `&mut self` by one owner. To scan in parallel,
/// create one cursor per disjoint key range.
///
/// # Termination
///
/// [`next`](ScanCursor::next) returns `Ok(None)` once the range is read, and
/// from then on [`is_closed`](ScanCursor::is_closed) is `true` as well, so
/// either signal ends a scan loop. A cursor cannot be restarted; create a new
/// one to scan again.
///
/// Call [`close`](ScanCursor::close) when stopping early to release the
/// server-side scanner. Exhausted cursors release it on their own.
///
/// # Example
///
/// ```ignore
/// let mut scan = client.scan("users")?;
/// scan.add_filter(PrefixFilter::new("user-"))?;
/// while let Some(row) = scan.next().await? {
///     println!("{:?}", row.row);
/// }
/// scan.close().await;
/// ```
pub struct ScanCursor {
    rpc: Arc<dyn RpcClient>,
    observer: Arc<dyn CallObserver>,
    table: String,
    cache_size: u32,
    /// Start bound of the next batch request.
    start: Bound<Bytes>,
    stop_row: Option<Bytes>,
    filters: Vec<proto::Filter>,
    buffer: VecDeque<RowResult>,
    scanner_id: Option<u64>,
    more_results: bool,
    state: ScanState,
}

impl ScanCursor {
    /// Creates a cursor over all of `table`, fetching `cache_size` rows per
    /// batch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `cache_size` is zero.
    pub fn new(rpc: Arc<dyn RpcClient>, table: impl Into<String>, cache_size: u32) -> Result<Self> {
        validate_cache_size(cache_size)?;
        Ok(Self {
            rpc,
            observer: Arc::new(NoopObserver),
            table: table.into(),
            cache_size,
            start: Bound::Unbounded,
            stop_row: None,
            filters: Vec::new(),
            buffer: VecDeque::new(),
            scanner_id: None,
            more_results: true,
            state: ScanState::Created,
        })
    }

    /// Reports every batch and release call to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn CallObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Limits the scan to `[start_row, stop_row)`.
    pub fn with_range(mut self, start_row: Option<Bytes>, stop_row: Option<Bytes>) -> Self {
        self.start = match start_row {
            Some(row) => Bound::Included(row),
            None => Bound::Unbounded,
        };
        self.stop_row = stop_row;
        self
    }

    /// Attaches a filter forwarded with every batch request.
    ///
    /// Filters must be added before the first call to [`next`](Self::next).
    ///
    /// # Errors
    ///
    /// Returns [`Error::CursorMisuse`] once scanning has begun or the cursor
    /// is closed; the filter is not attached. Returns [`Error::Encoding`] if
    /// the filter cannot be serialized.
    pub fn add_filter(&mut self, filter: impl Filter) -> Result<()> {
        if self.state != ScanState::Created {
            return Err(Error::CursorMisuse(format!(
                "cannot add a filter to a {:?} scan of {}",
                self.state, self.table
            )));
        }
        self.filters.push(filter.to_proto()?);
        Ok(())
    }

    /// Returns the next row, or `None` once the range is exhausted or the
    /// cursor is closed.
    ///
    /// Issues at most one remote call, and only when the read-ahead buffer
    /// is empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Remote`] if the batch request fails, or
    /// [`Error::Encoding`] if the response cannot be decoded. The cursor is
    /// then exhausted and later calls return `Ok(None)`.
    pub async fn next(&mut self) -> Result<Option<RowResult>> {
        loop {
            if self.is_closed() {
                return Ok(None);
            }

            if let Some(row) = self.buffer.pop_front() {
                self.start = Bound::Excluded(row.row.clone());
                return Ok(Some(row));
            }

            if self.state == ScanState::Active && !self.more_results {
                self.finish().await;
                return Ok(None);
            }

            if let Err(err) = self.fetch_batch().await {
                self.finish().await;
                return Err(err);
            }
        }
    }

    /// Requests the next batch and fills the read-ahead buffer.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(table = %self.table, cache_size = self.cache_size, rows = tracing::field::Empty)
    )]
    async fn fetch_batch(&mut self) -> Result<()> {
        let request = ScanBatchRequest {
            scanner_id: self.scanner_id,
            start: self.start.clone(),
            stop_row: self.stop_row.clone(),
            cache_size: self.cache_size,
            filters: self.filters.clone(),
        };
        self.state = ScanState::Active;

        let batch = observe(
            self.observer.as_ref(),
            self.rpc.scan_batch(&self.table, request),
        )
        .await
        .map_err(|e| Error::remote("scan", self.range_target(), e))?;

        if batch.scanner_id.is_some() {
            self.scanner_id = batch.scanner_id;
        }
        tracing::Span::current().record("rows", batch.results.len());

        for result in batch.results {
            if let Some(row) = RowResult::from_proto(result)? {
                self.buffer.push_back(row);
            }
        }
        self.more_results = batch.more_results && !self.buffer.is_empty();
        Ok(())
    }

    /// Marks the range as read and releases the server scanner.
    async fn finish(&mut self) {
        self.state = ScanState::Exhausted;
        self.buffer.clear();
        self.release_scanner().await;
    }

    async fn release_scanner(&mut self) {
        let Some(scanner_id) = self.scanner_id.take() else {
            return;
        };
        let released = observe(
            self.observer.as_ref(),
            self.rpc.close_scanner(&self.table, scanner_id),
        )
        .await;
        if let Err(err) = released {
            tracing::debug!(
                table = %self.table,
                scanner_id,
                error = %err,
                "Failed to release scanner"
            );
        }
    }

    /// Closes the cursor and releases the server-side scanner.
    ///
    /// Safe to call repeatedly and after exhaustion; the scanner is released
    /// at most once. Release failures are logged and otherwise ignored, so
    /// this succeeds even when the cluster is unreachable.
    pub async fn close(&mut self) {
        if self.state == ScanState::Closed {
            return;
        }
        self.release_scanner().await;
        self.buffer.clear();
        self.state = ScanState::Closed;
    }

    /// Returns `true` once the cursor is closed or exhausted.
    pub fn is_closed(&self) -> bool {
        matches!(self.state, ScanState::Closed | ScanState::Exhausted)
    }

    /// Returns `true` if the range was read to its end or a batch failed.
    pub fn is_exhausted(&self) -> bool {
        self.state == ScanState::Exhausted
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn cache_size(&self) -> u32 {
        self.cache_size
    }

    /// Describes the remaining range for error messages, e.g. `users(b..m)`.
    fn range_target(&self) -> String {
        let start = match &self.start {
            Bound::Unbounded => "[".to_string(),
            Bound::Included(row) => format!("[{}", row.escape_ascii()),
            Bound::Excluded(row) => format!("({}", row.escape_ascii()),
        };
        let stop = self
            .stop_row
            .as_ref()
            .map(|row| row.escape_ascii().to_string())
            .unwrap_or_default();
        format!("{}{}..{})", self.table, start, stop)
    }
}

impl Drop for ScanCursor {
    fn drop(&mut self) {
        if let Some(scanner_id) = self.scanner_id {
            tracing::warn!(
                table = %self.table,
                scanner_id,
                "Scan cursor dropped without close, server scanner left open"
            );
        }
    }
}
