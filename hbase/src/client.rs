//! The client facade.
//!
//! [`Client`] binds an [`RpcClient`] to an optional [`CallObserver`] and runs
//! single-row operations against it: it encodes the request, issues exactly
//! one remote call, reports the call to the observer and adds context to any
//! failure. It also creates [`ScanCursor`]s that share the same capability.

use std::sync::Arc;

use crate::config::{ClientConfig, ScanOptions};
use crate::error::{Error, Result, row_target};
use crate::get::Get;
use crate::metrics::{CallObserver, NoopObserver, observe};
use crate::model::RowResult;
use crate::mutation::Mutation;
use crate::proto::MutationType;
use crate::rpc::RpcClient;
use crate::scan::ScanCursor;

/// Entry point for reads and writes against one cluster.
///
/// `Client` is cheap to clone and safe to share across tasks. Each operation
/// is independent; failures are returned to the caller and never retried.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use hbase::{Client, Get, Mutation};
///
/// let client = Client::new(rpc);
/// let put = Mutation::put("user-1")?.add_value("info", "name", "ada");
/// assert!(client.put("users", &put).await?);
///
/// let row = client.get("users", &Get::new("user-1")?).await?;
/// ```
#[derive(Clone)]
pub struct Client {
    rpc: Arc<dyn RpcClient>,
    observer: Arc<dyn CallObserver>,
    config: ClientConfig,
}

impl Client {
    /// Creates a client with the default configuration and no instrumentation.
    pub fn new(rpc: Arc<dyn RpcClient>) -> Self {
        Self {
            rpc,
            observer: Arc::new(NoopObserver),
            config: ClientConfig::default(),
        }
    }

    /// Creates a client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the configuration is invalid.
    pub fn with_config(rpc: Arc<dyn RpcClient>, config: ClientConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            rpc,
            observer: Arc::new(NoopObserver),
            config,
        })
    }

    /// Reports every remote call made by this client and its cursors to
    /// `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn CallObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Writes a put mutation. Returns whether the server applied it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `put` is not a put mutation, or
    /// [`Error::Remote`] if the call fails.
    #[tracing::instrument(level = "debug", skip_all, fields(table = table, row = %put.row().escape_ascii()))]
    pub async fn put(&self, table: &str, put: &Mutation) -> Result<bool> {
        expect_kind(put, MutationType::Put, "put")?;
        let applied = observe(self.observer.as_ref(), self.rpc.put(table, put.to_proto()))
            .await
            .map_err(|e| Error::remote("put", row_target(table, put.row()), e))?;
        tracing::debug!(applied, "Put completed");
        Ok(applied)
    }

    /// Applies a delete mutation. Returns whether the server applied it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `delete` is not a delete mutation,
    /// or [`Error::Remote`] if the call fails.
    #[tracing::instrument(level = "debug", skip_all, fields(table = table, row = %delete.row().escape_ascii()))]
    pub async fn delete(&self, table: &str, delete: &Mutation) -> Result<bool> {
        expect_kind(delete, MutationType::Delete, "delete")?;
        let applied = observe(
            self.observer.as_ref(),
            self.rpc.delete(table, delete.to_proto()),
        )
        .await
        .map_err(|e| Error::remote("delete", row_target(table, delete.row()), e))?;
        tracing::debug!(applied, "Delete completed");
        Ok(applied)
    }

    /// Reads one row. Returns `None` if the row has no matching cells.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if the request or response cannot be
    /// converted, or [`Error::Remote`] if the call fails.
    #[tracing::instrument(level = "debug", skip_all, fields(table = table, row = %get.row().escape_ascii()))]
    pub async fn get(&self, table: &str, get: &Get) -> Result<Option<RowResult>> {
        let request = get.to_proto()?;
        let result = observe(self.observer.as_ref(), self.rpc.get(table, request))
            .await
            .map_err(|e| Error::remote("get", row_target(table, get.row()), e))?;
        match result {
            Some(result) => RowResult::from_proto(result),
            None => Ok(None),
        }
    }

    /// Applies an atomic increment and returns the updated counters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `increment` is not an increment
    /// mutation, or [`Error::Remote`] if the call fails.
    #[tracing::instrument(level = "debug", skip_all, fields(table = table, row = %increment.row().escape_ascii()))]
    pub async fn increment(&self, table: &str, increment: &Mutation) -> Result<Option<RowResult>> {
        expect_kind(increment, MutationType::Increment, "increment")?;
        let result = observe(
            self.observer.as_ref(),
            self.rpc.mutate(table, increment.to_proto()),
        )
        .await
        .map_err(|e| Error::remote("increment", row_target(table, increment.row()), e))?;
        match result {
            Some(result) => RowResult::from_proto(result),
            None => Ok(None),
        }
    }

    /// Creates a cursor over all of `table` using the configured cache size.
    pub fn scan(&self, table: &str) -> Result<ScanCursor> {
        self.scan_with_options(table, ScanOptions::default())
    }

    /// Creates a cursor over `table` with custom options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the cache size is zero.
    pub fn scan_with_options(&self, table: &str, options: ScanOptions) -> Result<ScanCursor> {
        let cache_size = options.cache_size.unwrap_or(self.config.scan_cache_size);
        Ok(ScanCursor::new(self.rpc.clone(), table, cache_size)?
            .with_observer(self.observer.clone())
            .with_range(options.start_row, options.stop_row))
    }
}

fn expect_kind(mutation: &Mutation, kind: MutationType, operation: &str) -> Result<()> {
    if mutation.kind() != kind {
        return Err(Error::InvalidInput(format!(
            "{} requires a {:?} mutation, got {:?}",
            operation,
            kind,
            mutation.kind()
        )));
    }
    Ok(())
}
