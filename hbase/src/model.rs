//! Core data types for HBase reads.
//!
//! This module defines the decoded form of the cells and rows returned by
//! gets, increments and scans.

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::proto;

/// A single versioned value read from the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    /// The row this cell belongs to.
    pub row: Bytes,

    /// The column family.
    pub family: Bytes,

    /// The column qualifier within the family.
    pub qualifier: Bytes,

    /// The cell version, in server logical time.
    pub timestamp: u64,

    /// The cell payload.
    pub value: Bytes,
}

impl Cell {
    fn from_proto(cell: proto::Cell) -> Result<Self> {
        let row = cell
            .row
            .ok_or_else(|| Error::Encoding("cell without row".to_string()))?;
        Ok(Cell {
            row: Bytes::from(row),
            family: Bytes::from(cell.family.unwrap_or_default()),
            qualifier: Bytes::from(cell.qualifier.unwrap_or_default()),
            timestamp: cell.timestamp.unwrap_or_default(),
            value: Bytes::from(cell.value.unwrap_or_default()),
        })
    }

    pub(crate) fn to_proto(&self) -> proto::Cell {
        proto::Cell {
            row: Some(self.row.to_vec()),
            family: Some(self.family.to_vec()),
            qualifier: Some(self.qualifier.to_vec()),
            timestamp: Some(self.timestamp),
            cell_type: Some(proto::CellType::Put.into()),
            value: Some(self.value.to_vec()),
        }
    }
}

/// A row read from the cluster.
///
/// Cells are kept in the order the server returned them, which is
/// family-then-qualifier order for HBase. The client never re-sorts them.
///
/// # Example
///
/// ```ignore
/// let row = client.get("users", &Get::new("user-1")?).await?;
/// if let Some(row) = row {
///     println!("name={:?}", row.value(b"info", b"name"));
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowResult {
    /// The row key.
    pub row: Bytes,

    /// The row's cells in server order.
    pub cells: Vec<Cell>,
}

impl RowResult {
    /// Decodes a wire result.
    ///
    /// Returns `Ok(None)` for a result with no cells, which is how the cluster
    /// reports a missing row. Fails if the cells disagree on their row key.
    pub fn from_proto(result: proto::ResultProto) -> Result<Option<Self>> {
        let cells = result
            .cell
            .into_iter()
            .map(Cell::from_proto)
            .collect::<Result<Vec<_>>>()?;

        let Some(first) = cells.first() else {
            return Ok(None);
        };
        let row = first.row.clone();
        if let Some(other) = cells.iter().find(|c| c.row != row) {
            return Err(Error::Encoding(format!(
                "result mixes rows {} and {}",
                row.escape_ascii(),
                other.row.escape_ascii()
            )));
        }
        Ok(Some(RowResult { row, cells }))
    }

    /// Encodes this row as a wire result.
    pub fn to_proto(&self) -> proto::ResultProto {
        proto::ResultProto {
            cell: self.cells.iter().map(Cell::to_proto).collect(),
            exists: None,
        }
    }

    /// Returns the value stored at `family:qualifier`, if present.
    pub fn value(&self, family: &[u8], qualifier: &[u8]) -> Option<&Bytes> {
        self.cells
            .iter()
            .find(|c| c.family.as_ref() == family && c.qualifier.as_ref() == qualifier)
            .map(|c| &c.value)
    }

    /// Returns the value at `family:qualifier` read as an increment counter.
    ///
    /// Counters are stored as 8-byte big-endian signed integers. Returns
    /// `Ok(None)` if the column is absent.
    pub fn counter(&self, family: &[u8], qualifier: &[u8]) -> Result<Option<i64>> {
        let Some(value) = self.value(family, qualifier) else {
            return Ok(None);
        };
        let bytes: [u8; 8] = value.as_ref().try_into().map_err(|_| {
            Error::Encoding(format!(
                "counter value must be 8 bytes, got {}",
                value.len()
            ))
        })?;
        Ok(Some(i64::from_be_bytes(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(row: &[u8], qualifier: &[u8], value: &[u8]) -> proto::Cell {
        proto::Cell {
            row: Some(row.to_vec()),
            family: Some(b"cf".to_vec()),
            qualifier: Some(qualifier.to_vec()),
            timestamp: Some(7),
            cell_type: Some(proto::CellType::Put.into()),
            value: Some(value.to_vec()),
        }
    }

    #[test]
    fn should_return_none_for_empty_result() {
        let result = proto::ResultProto::default();

        assert_eq!(RowResult::from_proto(result).unwrap(), None);
    }

    #[test]
    fn should_decode_cells_in_server_order() {
        // given
        let result = proto::ResultProto {
            cell: vec![cell(b"r1", b"b", b"2"), cell(b"r1", b"a", b"1")],
            exists: None,
        };

        // when
        let row = RowResult::from_proto(result).unwrap().unwrap();

        // then
        assert_eq!(row.row, Bytes::from("r1"));
        assert_eq!(row.cells[0].qualifier, Bytes::from("b"));
        assert_eq!(row.cells[1].qualifier, Bytes::from("a"));
        assert_eq!(row.value(b"cf", b"a"), Some(&Bytes::from("1")));
        assert_eq!(row.cells[0].timestamp, 7);
    }

    #[test]
    fn should_reject_result_spanning_rows() {
        let result = proto::ResultProto {
            cell: vec![cell(b"r1", b"a", b"1"), cell(b"r2", b"a", b"1")],
            exists: None,
        };

        let err = RowResult::from_proto(result).unwrap_err();

        assert!(matches!(err, Error::Encoding(_)));
    }

    #[test]
    fn should_read_counter_as_big_endian() {
        // given
        let result = proto::ResultProto {
            cell: vec![cell(b"r1", b"hits", &42i64.to_be_bytes())],
            exists: None,
        };
        let row = RowResult::from_proto(result).unwrap().unwrap();

        // when / then
        assert_eq!(row.counter(b"cf", b"hits").unwrap(), Some(42));
        assert_eq!(row.counter(b"cf", b"missing").unwrap(), None);
    }
}
