//! Client layer for HBase-style wide-column clusters.
//!
//! The crate encodes single-row operations ([`Mutation`] for puts, deletes and
//! increments, [`Get`] for reads) into the cluster's protobuf wire format,
//! composes server-side [`Filter`]s, and iterates row ranges through
//! batch-fetching [`ScanCursor`]s. Transport is pluggable through
//! [`RpcClient`]; [`in_memory::InMemoryCluster`] is an in-process
//! implementation for tests. Every remote call can be observed through a
//! [`CallObserver`] such as [`RpcMetrics`].

mod client;
mod config;
mod error;
mod filter;
mod get;
pub mod in_memory;
mod metrics;
mod model;
mod mutation;
pub mod proto;
mod rpc;
mod scan;

pub use client::Client;
pub use config::{ClientConfig, DEFAULT_SCAN_CACHE_SIZE, ScanOptions};
pub use error::{Error, RemoteError, RemoteResult, Result};
pub use filter::{
    FILTER_PACKAGE, Filter, FilterList, FilterOperator, FirstKeyOnlyFilter, KeyOnlyFilter,
    PrefixFilter,
};
pub use get::Get;
pub use metrics::{CallObserver, NoopObserver, RpcMetrics};
pub use model::{Cell, RowResult};
pub use mutation::{LATEST_TIMESTAMP, Mutation};
pub use proto::MutationType;
pub use rpc::{RpcClient, ScanBatch, ScanBatchRequest};
pub use scan::{ScanCursor, ScanState};
