//! In-process cluster for tests and benchmarks.
//!
//! [`InMemoryCluster`] implements [`RpcClient`] by decoding the wire messages
//! it receives and applying them to sorted in-memory tables, the way a region
//! server would. It evaluates the filters this crate can produce, keeps one
//! version per cell, and tracks open scanners so tests can check that cursors
//! release them.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use prost::Message;
use tokio::sync::{Mutex, RwLock};

use crate::error::{RemoteError, RemoteResult};
use crate::filter::FILTER_PACKAGE;
use crate::mutation::LATEST_TIMESTAMP;
use crate::proto::{self, DeleteType, FilterListOperator, MutationType};
use crate::rpc::{RpcClient, ScanBatch, ScanBatchRequest};

#[derive(Debug, Clone)]
struct StoredCell {
    timestamp: u64,
    value: Bytes,
}

/// Cells of one row keyed by `(family, qualifier)`.
type Row = BTreeMap<(Bytes, Bytes), StoredCell>;

type Table = BTreeMap<Bytes, Row>;

/// A filter decoded from its wire form.
#[derive(Debug, Clone)]
enum RowFilter {
    Prefix(Vec<u8>),
    FirstKeyOnly,
    KeyOnly { len_as_val: bool },
    List(FilterListOperator, Vec<RowFilter>),
}

impl RowFilter {
    fn decode(filter: &proto::Filter) -> RemoteResult<Self> {
        let payload = filter.serialized_filter.as_deref().unwrap_or_default();
        let class = filter
            .name
            .strip_prefix(FILTER_PACKAGE)
            .ok_or_else(|| RemoteError::Server(format!("unknown filter {}", filter.name)))?;
        let decode_err = |e: prost::DecodeError| {
            RemoteError::Server(format!("malformed {}: {}", class, e))
        };

        match class {
            "PrefixFilter" => {
                let decoded = proto::PrefixFilter::decode(payload).map_err(decode_err)?;
                Ok(RowFilter::Prefix(decoded.prefix.unwrap_or_default()))
            }
            "FirstKeyOnlyFilter" => Ok(RowFilter::FirstKeyOnly),
            "KeyOnlyFilter" => {
                let decoded = proto::KeyOnlyFilter::decode(payload).map_err(decode_err)?;
                Ok(RowFilter::KeyOnly {
                    len_as_val: decoded.len_as_val,
                })
            }
            "FilterList" => {
                let decoded = proto::FilterList::decode(payload).map_err(decode_err)?;
                let members = decoded
                    .filters
                    .iter()
                    .map(RowFilter::decode)
                    .collect::<RemoteResult<Vec<_>>>()?;
                let operator = FilterListOperator::try_from(decoded.operator).map_err(|_| {
                    RemoteError::Server(format!("unknown filter list operator {}", decoded.operator))
                })?;
                Ok(RowFilter::List(operator, members))
            }
            other => Err(RemoteError::Server(format!("unsupported filter {}", other))),
        }
    }

    /// Returns the cells to send for `row`, or `None` if the row is filtered out.
    fn apply(&self, row: &[u8], cells: Vec<proto::Cell>) -> Option<Vec<proto::Cell>> {
        match self {
            RowFilter::Prefix(prefix) => row.starts_with(prefix).then_some(cells),
            RowFilter::FirstKeyOnly => Some(cells.into_iter().take(1).collect()),
            RowFilter::KeyOnly { len_as_val } => Some(
                cells
                    .into_iter()
                    .map(|mut cell| {
                        let len = cell.value.as_ref().map_or(0, Vec::len) as u32;
                        cell.value = Some(if *len_as_val {
                            len.to_be_bytes().to_vec()
                        } else {
                            Vec::new()
                        });
                        cell
                    })
                    .collect(),
            ),
            RowFilter::List(FilterListOperator::MustPassAll, members) => members
                .iter()
                .try_fold(cells, |cells, member| member.apply(row, cells)),
            RowFilter::List(FilterListOperator::MustPassOne, members) => {
                if members.is_empty() {
                    return Some(cells);
                }
                members
                    .iter()
                    .find_map(|member| member.apply(row, cells.clone()))
            }
        }
    }
}

/// Applies every filter in order; a row must pass all of them.
fn apply_all(
    filters: &[RowFilter],
    row: &[u8],
    cells: Vec<proto::Cell>,
) -> Option<Vec<proto::Cell>> {
    filters
        .iter()
        .try_fold(cells, |cells, filter| filter.apply(row, cells))
}

fn to_cells(key: &Bytes, row: &Row) -> Vec<proto::Cell> {
    row.iter()
        .map(|((family, qualifier), cell)| proto::Cell {
            row: Some(key.to_vec()),
            family: Some(family.to_vec()),
            qualifier: Some(qualifier.to_vec()),
            timestamp: Some(cell.timestamp),
            cell_type: Some(proto::CellType::Put.into()),
            value: Some(cell.value.to_vec()),
        })
        .collect()
}

fn decode_row(mutation: &proto::MutationProto) -> RemoteResult<Bytes> {
    match mutation.row.as_deref() {
        Some(row) if !row.is_empty() => Ok(Bytes::copy_from_slice(row)),
        _ => Err(RemoteError::Server("mutation without row".to_string())),
    }
}

fn expect_type(mutation: &proto::MutationProto, expected: MutationType) -> RemoteResult<()> {
    let actual = mutation.mutate_type();
    if actual != expected {
        return Err(RemoteError::Server(format!(
            "expected {:?} mutation, got {:?}",
            expected, actual
        )));
    }
    Ok(())
}

fn decode_counter(bytes: &[u8], what: &str) -> RemoteResult<i64> {
    let bytes: [u8; 8] = bytes.try_into().map_err(|_| {
        RemoteError::Server(format!("{} must be 8 bytes, got {}", what, bytes.len()))
    })?;
    Ok(i64::from_be_bytes(bytes))
}

/// An in-process cluster.
///
/// Tables are created on first write. Reads of a missing table or row return
/// nothing. Unset and "latest" timestamps are replaced by a logical clock.
#[derive(Default)]
pub struct InMemoryCluster {
    tables: RwLock<HashMap<String, Table>>,
    scanners: Mutex<HashSet<u64>>,
    next_scanner_id: AtomicU64,
    clock: AtomicU64,
    unavailable: AtomicBool,
    scan_batches: AtomicUsize,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with a transport error, or restores
    /// service.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Returns the number of scan batch requests received.
    pub fn scan_batch_count(&self) -> usize {
        self.scan_batches.load(Ordering::SeqCst)
    }

    /// Returns the number of scanners opened and not yet released.
    pub async fn open_scanner_count(&self) -> usize {
        self.scanners.lock().await.len()
    }

    fn check_available(&self) -> RemoteResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RemoteError::Transport("cluster unavailable".to_string()));
        }
        Ok(())
    }

    fn resolve_timestamp(&self, ts: Option<u64>) -> u64 {
        match ts {
            Some(ts) if ts != LATEST_TIMESTAMP => ts,
            _ => self.clock.fetch_add(1, Ordering::SeqCst) + 1,
        }
    }
}

#[async_trait]
impl RpcClient for InMemoryCluster {
    async fn put(&self, table: &str, mutation: proto::MutationProto) -> RemoteResult<bool> {
        self.check_available()?;
        expect_type(&mutation, MutationType::Put)?;
        let key = decode_row(&mutation)?;

        let mut tables = self.tables.write().await;
        let row = tables
            .entry(table.to_string())
            .or_default()
            .entry(key)
            .or_default();
        for column in mutation.column_value {
            let family = Bytes::from(column.family);
            for qv in column.qualifier_value {
                let cell = StoredCell {
                    timestamp: self.resolve_timestamp(qv.timestamp.or(mutation.timestamp)),
                    value: Bytes::from(qv.value.unwrap_or_default()),
                };
                let qualifier = Bytes::from(qv.qualifier.unwrap_or_default());
                row.insert((family.clone(), qualifier), cell);
            }
        }
        Ok(true)
    }

    async fn get(&self, table: &str, get: proto::Get) -> RemoteResult<Option<proto::ResultProto>> {
        self.check_available()?;
        let filter = get.filter.as_ref().map(RowFilter::decode).transpose()?;

        let tables = self.tables.read().await;
        let Some(row) = tables.get(table).and_then(|t| t.get(get.row.as_slice())) else {
            return Ok(None);
        };

        let key = Bytes::from(get.row);
        let selected: Row = row
            .iter()
            .filter(|((family, qualifier), _)| {
                get.column.is_empty()
                    || get.column.iter().any(|c| {
                        c.family.as_slice() == family.as_ref()
                            && (c.qualifier.is_empty()
                                || c.qualifier.iter().any(|q| q.as_slice() == qualifier.as_ref()))
                    })
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let cells = to_cells(&key, &selected);
        let cells = match &filter {
            Some(filter) => filter.apply(&key, cells),
            None => Some(cells),
        };
        Ok(cells
            .filter(|cells| !cells.is_empty())
            .map(|cell| proto::ResultProto { cell, exists: None }))
    }

    async fn delete(&self, table: &str, mutation: proto::MutationProto) -> RemoteResult<bool> {
        self.check_available()?;
        expect_type(&mutation, MutationType::Delete)?;
        let key = decode_row(&mutation)?;

        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(table) else {
            return Ok(true);
        };
        if mutation.column_value.is_empty() {
            rows.remove(&key);
            return Ok(true);
        }
        let Some(row) = rows.get_mut(&key) else {
            return Ok(true);
        };
        for column in &mutation.column_value {
            for qv in &column.qualifier_value {
                if qv.delete_type() == DeleteType::DeleteFamily {
                    row.retain(|(family, _), _| family.as_ref() != column.family.as_slice());
                } else {
                    let qualifier = qv.qualifier.clone().unwrap_or_default();
                    row.remove(&(
                        Bytes::copy_from_slice(&column.family),
                        Bytes::from(qualifier),
                    ));
                }
            }
        }
        if row.is_empty() {
            rows.remove(&key);
        }
        Ok(true)
    }

    async fn mutate(
        &self,
        table: &str,
        mutation: proto::MutationProto,
    ) -> RemoteResult<Option<proto::ResultProto>> {
        self.check_available()?;
        expect_type(&mutation, MutationType::Increment)?;
        let key = decode_row(&mutation)?;

        let mut tables = self.tables.write().await;
        let existing = tables.get(table).and_then(|rows| rows.get(&key));

        // Validate every column before applying any of them.
        let mut updates = Vec::new();
        for column in &mutation.column_value {
            let family = Bytes::copy_from_slice(&column.family);
            for qv in &column.qualifier_value {
                let qualifier = Bytes::from(qv.qualifier.clone().unwrap_or_default());
                let amount =
                    decode_counter(qv.value.as_deref().unwrap_or_default(), "increment amount")?;
                let cell = existing.and_then(|row| row.get(&(family.clone(), qualifier.clone())));
                let current = match cell {
                    Some(cell) => decode_counter(&cell.value, "counter")?,
                    None => 0,
                };
                let next = current.checked_add(amount).ok_or_else(|| {
                    RemoteError::Server(format!(
                        "counter overflow at {}",
                        qualifier.escape_ascii()
                    ))
                })?;
                updates.push((family.clone(), qualifier, next, qv.timestamp));
            }
        }

        if updates.is_empty() {
            return Ok(None);
        }
        let row = tables
            .entry(table.to_string())
            .or_default()
            .entry(key.clone())
            .or_default();
        let mut updated = Row::new();
        for (family, qualifier, value, ts) in updates {
            let cell = StoredCell {
                timestamp: self.resolve_timestamp(ts.or(mutation.timestamp)),
                value: Bytes::copy_from_slice(&value.to_be_bytes()),
            };
            row.insert((family.clone(), qualifier.clone()), cell.clone());
            updated.insert((family, qualifier), cell);
        }

        let cells = to_cells(&key, &updated);
        Ok((!cells.is_empty()).then_some(proto::ResultProto {
            cell: cells,
            exists: None,
        }))
    }

    async fn scan_batch(&self, table: &str, request: ScanBatchRequest) -> RemoteResult<ScanBatch> {
        self.scan_batches.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let filters = request
            .filters
            .iter()
            .map(RowFilter::decode)
            .collect::<RemoteResult<Vec<_>>>()?;

        let scanner_id = {
            let mut scanners = self.scanners.lock().await;
            match request.scanner_id {
                Some(id) if scanners.contains(&id) => id,
                Some(id) => return Err(RemoteError::Server(format!("unknown scanner {}", id))),
                None => {
                    let id = self.next_scanner_id.fetch_add(1, Ordering::SeqCst) + 1;
                    scanners.insert(id);
                    id
                }
            }
        };

        let tables = self.tables.read().await;
        let mut batch = ScanBatch {
            scanner_id: Some(scanner_id),
            results: Vec::new(),
            more_results: false,
        };
        let Some(rows) = tables.get(table) else {
            return Ok(batch);
        };

        if let (Some(stop), Bound::Included(start) | Bound::Excluded(start)) =
            (&request.stop_row, &request.start)
            && start >= stop
        {
            return Ok(batch);
        }
        let end = match request.stop_row {
            Some(stop) => Bound::Excluded(stop),
            None => Bound::Unbounded,
        };

        for (key, row) in rows.range((request.start, end)) {
            let Some(cells) = apply_all(&filters, key, to_cells(key, row)) else {
                continue;
            };
            if cells.is_empty() {
                continue;
            }
            if batch.results.len() == request.cache_size as usize {
                batch.more_results = true;
                break;
            }
            batch.results.push(proto::ResultProto {
                cell: cells,
                exists: None,
            });
        }
        Ok(batch)
    }

    async fn close_scanner(&self, _table: &str, scanner_id: u64) -> RemoteResult<()> {
        self.check_available()?;
        if !self.scanners.lock().await.remove(&scanner_id) {
            return Err(RemoteError::Server(format!(
                "unknown scanner {}",
                scanner_id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{
        Filter, FilterList, FilterOperator, FirstKeyOnlyFilter, KeyOnlyFilter, PrefixFilter,
    };
    use crate::mutation::Mutation;

    async fn put(cluster: &InMemoryCluster, row: &str, qualifier: &str, value: &str) {
        let put = Mutation::put(row).unwrap().add_value("cf", qualifier, value);
        assert!(cluster.put("t", put.to_proto()).await.unwrap());
    }

    fn scan_request(cache_size: u32, filters: Vec<proto::Filter>) -> ScanBatchRequest {
        ScanBatchRequest {
            scanner_id: None,
            start: Bound::Unbounded,
            stop_row: None,
            cache_size,
            filters,
        }
    }

    fn rows(batch: &ScanBatch) -> Vec<Vec<u8>> {
        batch
            .results
            .iter()
            .map(|r| r.cell[0].row.clone().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn should_return_batch_with_more_results_flag() {
        // given
        let cluster = InMemoryCluster::new();
        for key in ["a", "b", "c"] {
            put(&cluster, key, "q", key).await;
        }

        // when
        let first = cluster.scan_batch("t", scan_request(2, vec![])).await.unwrap();
        let mut resume = scan_request(2, vec![]);
        resume.scanner_id = first.scanner_id;
        resume.start = Bound::Excluded(Bytes::from("b"));
        let second = cluster.scan_batch("t", resume).await.unwrap();

        // then
        assert_eq!(rows(&first), vec![b"a".to_vec(), b"b".to_vec()]);
        assert!(first.more_results);
        assert_eq!(rows(&second), vec![b"c".to_vec()]);
        assert!(!second.more_results);
        assert_eq!(cluster.scan_batch_count(), 2);
    }

    #[tokio::test]
    async fn should_reject_unknown_scanner() {
        let cluster = InMemoryCluster::new();
        let mut request = scan_request(1, vec![]);
        request.scanner_id = Some(99);

        let err = cluster.scan_batch("t", request).await.unwrap_err();

        assert!(matches!(err, RemoteError::Server(_)));
    }

    #[tokio::test]
    async fn should_release_scanner_once() {
        // given
        let cluster = InMemoryCluster::new();
        let batch = cluster.scan_batch("t", scan_request(1, vec![])).await.unwrap();
        let id = batch.scanner_id.unwrap();
        assert_eq!(cluster.open_scanner_count().await, 1);

        // when
        let first = cluster.close_scanner("t", id).await;
        let second = cluster.close_scanner("t", id).await;

        // then
        assert!(first.is_ok());
        assert!(second.is_err());
        assert_eq!(cluster.open_scanner_count().await, 0);
    }

    #[tokio::test]
    async fn should_apply_prefix_and_first_key_only_filters() {
        // given
        let cluster = InMemoryCluster::new();
        put(&cluster, "default-1", "q", "x").await;
        put(&cluster, "prefix-1", "a", "1").await;
        put(&cluster, "prefix-1", "b", "2").await;
        put(&cluster, "prefix-2", "a", "3").await;
        let filters = vec![
            PrefixFilter::new("prefix-").to_proto().unwrap(),
            FirstKeyOnlyFilter.to_proto().unwrap(),
        ];

        // when
        let batch = cluster.scan_batch("t", scan_request(10, filters)).await.unwrap();

        // then
        assert_eq!(rows(&batch), vec![b"prefix-1".to_vec(), b"prefix-2".to_vec()]);
        assert_eq!(batch.results[0].cell.len(), 1);
    }

    #[tokio::test]
    async fn should_evaluate_filter_lists() {
        // given
        let cluster = InMemoryCluster::new();
        for key in ["a-1", "b-1", "c-1"] {
            put(&cluster, key, "q", "value").await;
        }
        let either = FilterList::new(FilterOperator::MustPassOne)
            .with(PrefixFilter::new("a-"))
            .with(PrefixFilter::new("c-"));
        let list = FilterList::new(FilterOperator::MustPassAll)
            .with(either)
            .with(KeyOnlyFilter::new(true));

        // when
        let batch = cluster
            .scan_batch("t", scan_request(10, vec![list.to_proto().unwrap()]))
            .await
            .unwrap();

        // then
        assert_eq!(rows(&batch), vec![b"a-1".to_vec(), b"c-1".to_vec()]);
        assert_eq!(batch.results[0].cell[0].value, Some(5u32.to_be_bytes().to_vec()));
    }

    #[tokio::test]
    async fn should_reject_unknown_filter_class() {
        let cluster = InMemoryCluster::new();
        let filter = proto::Filter {
            name: "org.apache.hadoop.hbase.filter.RandomRowFilter".to_string(),
            serialized_filter: None,
        };

        let err = cluster
            .scan_batch("t", scan_request(1, vec![filter]))
            .await
            .unwrap_err();

        assert!(matches!(err, RemoteError::Server(_)));
    }

    #[tokio::test]
    async fn should_return_empty_batch_for_inverted_range() {
        let cluster = InMemoryCluster::new();
        put(&cluster, "m", "q", "v").await;
        let mut request = scan_request(10, vec![]);
        request.start = Bound::Excluded(Bytes::from("m"));
        request.stop_row = Some(Bytes::from("m"));

        let batch = cluster.scan_batch("t", request).await.unwrap();

        assert!(batch.results.is_empty());
        assert!(!batch.more_results);
    }

    #[tokio::test]
    async fn should_fail_every_call_when_unavailable() {
        let cluster = InMemoryCluster::new();
        cluster.set_available(false);

        let put = Mutation::put("r").unwrap().to_proto();

        assert!(matches!(
            cluster.put("t", put).await,
            Err(RemoteError::Transport(_))
        ));
        assert!(matches!(
            cluster.close_scanner("t", 1).await,
            Err(RemoteError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn should_assign_logical_time_to_latest_timestamp() {
        // given
        let cluster = InMemoryCluster::new();
        let put = Mutation::put("r")
            .unwrap()
            .add_value("cf", "q", "v")
            .with_timestamp(0);

        // when
        cluster.put("t", put.to_proto()).await.unwrap();
        let result = cluster
            .get("t", proto::Get { row: b"r".to_vec(), ..Default::default() })
            .await
            .unwrap()
            .unwrap();

        // then
        assert_eq!(result.cell[0].timestamp, Some(1));
    }

    #[tokio::test]
    async fn should_not_create_row_for_rejected_increment() {
        // given
        let cluster = InMemoryCluster::new();
        let bad = Mutation::increment("fresh")
            .unwrap()
            .add_value("cf", "broken", "x");

        // when
        let err = cluster.mutate("t", bad.to_proto()).await.unwrap_err();

        // then
        assert!(matches!(err, RemoteError::Server(_)));
        let batch = cluster.scan_batch("t", scan_request(10, vec![])).await.unwrap();
        assert!(batch.results.is_empty());
        assert!(!cluster.tables.read().await.contains_key("t"));
    }

    #[tokio::test]
    async fn should_leave_counters_untouched_when_an_amount_is_invalid() {
        // given
        let cluster = InMemoryCluster::new();
        let incr = Mutation::increment("r").unwrap().add_amount("cf", "hits", 1);
        cluster.mutate("t", incr.to_proto()).await.unwrap();
        let bad = Mutation::increment("r")
            .unwrap()
            .add_amount("cf", "hits", 5)
            .add_value("cf", "broken", "x");

        // when
        let err = cluster.mutate("t", bad.to_proto()).await.unwrap_err();

        // then
        assert!(matches!(err, RemoteError::Server(_)));
        let get = proto::Get { row: b"r".to_vec(), ..Default::default() };
        let result = cluster.get("t", get).await.unwrap().unwrap();
        assert_eq!(result.cell.len(), 1);
        assert_eq!(result.cell[0].value, Some(1i64.to_be_bytes().to_vec()));
    }
}
