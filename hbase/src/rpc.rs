//! The request-issuing capability.
//!
//! This module provides [`RpcClient`], the trait through which every remote
//! call is made. Implementations own region location, connections, framing
//! and any retry policy; this crate only hands them encoded wire messages and
//! forwards their errors.

use std::ops::Bound;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::RemoteResult;
use crate::proto;

/// One batch request of a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanBatchRequest {
    /// The server-side scanner to continue, or `None` to open a new one.
    pub scanner_id: Option<u64>,

    /// Where the batch starts.
    ///
    /// `Excluded(row)` resumes strictly after the last row the cursor yielded.
    pub start: Bound<Bytes>,

    /// Exclusive upper bound of the scanned range.
    pub stop_row: Option<Bytes>,

    /// Maximum number of rows to return.
    pub cache_size: u32,

    /// Filters the server must apply, in attachment order.
    pub filters: Vec<proto::Filter>,
}

/// One batch of scan results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanBatch {
    /// The scanner serving this scan. Must be released with
    /// [`RpcClient::close_scanner`].
    pub scanner_id: Option<u64>,

    /// Rows in row-key order.
    pub results: Vec<proto::ResultProto>,

    /// `false` once the server has reached the end of the range.
    pub more_results: bool,
}

/// Issues requests against the cluster.
///
/// Each call is a single blocking round trip from the caller's point of view.
/// Errors are returned as-is; the client adds context but never retries.
///
/// # Implementors
///
/// - [`InMemoryCluster`](crate::in_memory::InMemoryCluster): an in-process
///   cluster for tests and benchmarks.
#[async_trait]
pub trait RpcClient: Send + Sync {
    /// Applies a put. Returns whether the server applied it.
    async fn put(&self, table: &str, mutation: proto::MutationProto) -> RemoteResult<bool>;

    /// Reads one row, or `None` if the row has no matching cells.
    async fn get(&self, table: &str, get: proto::Get) -> RemoteResult<Option<proto::ResultProto>>;

    /// Applies a delete. Returns whether the server applied it.
    async fn delete(&self, table: &str, mutation: proto::MutationProto) -> RemoteResult<bool>;

    /// Applies an increment and returns the updated cells.
    async fn mutate(
        &self,
        table: &str,
        mutation: proto::MutationProto,
    ) -> RemoteResult<Option<proto::ResultProto>>;

    /// Fetches the next batch of a scan.
    async fn scan_batch(&self, table: &str, request: ScanBatchRequest) -> RemoteResult<ScanBatch>;

    /// Releases a server-side scanner.
    async fn close_scanner(&self, table: &str, scanner_id: u64) -> RemoteResult<()>;
}
