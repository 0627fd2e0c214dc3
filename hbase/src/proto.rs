//! Protobuf wire messages.
//!
//! Hand-written prost definitions for the subset of the HBase `Client.proto`,
//! `Filter.proto` and `Cell.proto` messages that this crate produces and
//! consumes. Field numbers and enum values follow the cluster's schema, so the
//! encoded bytes are what a region server expects.

use prost::{Enumeration, Message};

// ============================================================================
// Mutations
// ============================================================================

/// A single-row write: put, delete, increment or append.
#[derive(Clone, PartialEq, Message)]
pub struct MutationProto {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub row: Option<Vec<u8>>,
    #[prost(enumeration = "MutationType", optional, tag = "2")]
    pub mutate_type: Option<i32>,
    #[prost(message, repeated, tag = "3")]
    pub column_value: Vec<ColumnValue>,
    #[prost(uint64, optional, tag = "4")]
    pub timestamp: Option<u64>,
    #[prost(enumeration = "Durability", optional, tag = "6")]
    pub durability: Option<i32>,
}

/// All qualifier values written to one family.
#[derive(Clone, PartialEq, Message)]
pub struct ColumnValue {
    #[prost(bytes = "vec", required, tag = "1")]
    pub family: Vec<u8>,
    #[prost(message, repeated, tag = "2")]
    pub qualifier_value: Vec<QualifierValue>,
}

/// One qualifier within a [`ColumnValue`].
#[derive(Clone, PartialEq, Message)]
pub struct QualifierValue {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub qualifier: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub value: Option<Vec<u8>>,
    #[prost(uint64, optional, tag = "3")]
    pub timestamp: Option<u64>,
    #[prost(enumeration = "DeleteType", optional, tag = "4")]
    pub delete_type: Option<i32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum MutationType {
    Append = 0,
    Increment = 1,
    Put = 2,
    Delete = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum DeleteType {
    DeleteOneVersion = 0,
    DeleteMultipleVersions = 1,
    DeleteFamily = 2,
    DeleteFamilyVersion = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum Durability {
    UseDefault = 0,
    SkipWal = 1,
    AsyncWal = 2,
    SyncWal = 3,
    FsyncWal = 4,
}

// ============================================================================
// Reads
// ============================================================================

/// Column selector: a family and, optionally, specific qualifiers in it.
#[derive(Clone, PartialEq, Message)]
pub struct Column {
    #[prost(bytes = "vec", required, tag = "1")]
    pub family: Vec<u8>,
    #[prost(bytes = "vec", repeated, tag = "2")]
    pub qualifier: Vec<Vec<u8>>,
}

/// Single-row read request.
#[derive(Clone, PartialEq, Message)]
pub struct Get {
    #[prost(bytes = "vec", required, tag = "1")]
    pub row: Vec<u8>,
    #[prost(message, repeated, tag = "2")]
    pub column: Vec<Column>,
    #[prost(message, optional, tag = "4")]
    pub filter: Option<Filter>,
    #[prost(uint32, optional, tag = "6")]
    pub max_versions: Option<u32>,
}

/// The cells of one row as returned by a get, increment or scan.
///
/// This is the `Result` message of the cluster schema.
#[derive(Clone, PartialEq, Message)]
pub struct ResultProto {
    #[prost(message, repeated, tag = "1")]
    pub cell: Vec<Cell>,
    #[prost(bool, optional, tag = "3")]
    pub exists: Option<bool>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Cell {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub row: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub family: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "3")]
    pub qualifier: Option<Vec<u8>>,
    #[prost(uint64, optional, tag = "4")]
    pub timestamp: Option<u64>,
    #[prost(enumeration = "CellType", optional, tag = "5")]
    pub cell_type: Option<i32>,
    #[prost(bytes = "vec", optional, tag = "6")]
    pub value: Option<Vec<u8>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum CellType {
    Minimum = 0,
    Put = 4,
    Delete = 8,
    DeleteFamilyVersion = 10,
    DeleteColumn = 12,
    DeleteFamily = 14,
    Maximum = 255,
}

// ============================================================================
// Filters
// ============================================================================

/// A filter as the server instantiates it: class name plus serialized fields.
#[derive(Clone, PartialEq, Eq, Hash, Message)]
pub struct Filter {
    #[prost(string, required, tag = "1")]
    pub name: String,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub serialized_filter: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, Message)]
pub struct PrefixFilter {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub prefix: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, Message)]
pub struct FirstKeyOnlyFilter {}

#[derive(Clone, PartialEq, Message)]
pub struct KeyOnlyFilter {
    #[prost(bool, required, tag = "1")]
    pub len_as_val: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct FilterList {
    #[prost(enumeration = "FilterListOperator", required, tag = "1")]
    pub operator: i32,
    #[prost(message, repeated, tag = "2")]
    pub filters: Vec<Filter>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum FilterListOperator {
    MustPassAll = 1,
    MustPassOne = 2,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_encode_prefix_filter_with_field_one() {
        // given
        let filter = PrefixFilter {
            prefix: Some(b"abc".to_vec()),
        };

        // when
        let encoded = filter.encode_to_vec();

        // then
        assert_eq!(encoded, vec![0x0a, 0x03, b'a', b'b', b'c']);
    }

    #[test]
    fn should_encode_empty_first_key_only_filter_as_no_bytes() {
        assert!(FirstKeyOnlyFilter {}.encode_to_vec().is_empty());
    }

    #[test]
    fn should_encode_mutation_type_with_cluster_values() {
        assert_eq!(i32::from(MutationType::Put), 2);
        assert_eq!(i32::from(MutationType::Delete), 3);
        assert_eq!(i32::from(MutationType::Increment), 1);
        assert_eq!(i32::from(DeleteType::DeleteFamily), 2);
        assert_eq!(i32::from(CellType::Put), 4);
    }
}
