//! Server-side filters.
//!
//! A [`Filter`] is a predicate the region server evaluates before returning
//! data. On the wire every filter is a fully-qualified class name plus the
//! protobuf encoding of its fields; the server instantiates the class from the
//! name. Each variant is its own type implementing [`Filter`], so new filters
//! are added without touching existing ones.

use std::fmt::Debug;
use std::sync::Arc;

use bytes::Bytes;
use prost::Message;

use crate::error::Result;
use crate::proto::{self, FilterListOperator};

/// Java package of the server-side filter classes.
pub const FILTER_PACKAGE: &str = "org.apache.hadoop.hbase.filter.";

/// A predicate evaluated by the cluster.
///
/// Implementations must be deterministic: equal filters encode to identical
/// bytes, so encoded requests can be compared and retried safely.
pub trait Filter: Debug + Send + Sync {
    /// Converts this filter to its wire form.
    fn to_proto(&self) -> Result<proto::Filter>;
}

/// Encodes `message` as the payload of the filter class `class_name`.
fn encode_filter<M: Message>(class_name: &str, message: &M) -> Result<proto::Filter> {
    let mut payload = Vec::with_capacity(message.encoded_len());
    message.encode(&mut payload)?;
    Ok(proto::Filter {
        name: format!("{}{}", FILTER_PACKAGE, class_name),
        serialized_filter: Some(payload),
    })
}

/// Keeps only rows whose key starts with a prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixFilter {
    prefix: Bytes,
}

impl PrefixFilter {
    pub fn new(prefix: impl AsRef<[u8]>) -> Self {
        Self {
            prefix: Bytes::copy_from_slice(prefix.as_ref()),
        }
    }

    pub fn prefix(&self) -> &Bytes {
        &self.prefix
    }
}

impl Filter for PrefixFilter {
    fn to_proto(&self) -> Result<proto::Filter> {
        encode_filter(
            "PrefixFilter",
            &proto::PrefixFilter {
                prefix: Some(self.prefix.to_vec()),
            },
        )
    }
}

/// Returns only the first cell of each row.
///
/// Useful for counting rows or listing keys without transferring values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FirstKeyOnlyFilter;

impl Filter for FirstKeyOnlyFilter {
    fn to_proto(&self) -> Result<proto::Filter> {
        encode_filter("FirstKeyOnlyFilter", &proto::FirstKeyOnlyFilter {})
    }
}

/// Strips values from returned cells, keeping keys only.
///
/// With `len_as_value` set, each value is replaced by its original length as
/// a 4-byte big-endian integer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyOnlyFilter {
    len_as_value: bool,
}

impl KeyOnlyFilter {
    pub fn new(len_as_value: bool) -> Self {
        Self { len_as_value }
    }
}

impl Filter for KeyOnlyFilter {
    fn to_proto(&self) -> Result<proto::Filter> {
        encode_filter(
            "KeyOnlyFilter",
            &proto::KeyOnlyFilter {
                len_as_val: self.len_as_value,
            },
        )
    }
}

/// How a [`FilterList`] combines its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    /// A row passes only if every member passes.
    MustPassAll,
    /// A row passes if any member passes.
    MustPassOne,
}

impl From<FilterOperator> for FilterListOperator {
    fn from(op: FilterOperator) -> Self {
        match op {
            FilterOperator::MustPassAll => FilterListOperator::MustPassAll,
            FilterOperator::MustPassOne => FilterListOperator::MustPassOne,
        }
    }
}

/// A filter composed of other filters, combined on the server.
#[derive(Debug, Clone)]
pub struct FilterList {
    operator: FilterOperator,
    filters: Vec<Arc<dyn Filter>>,
}

impl FilterList {
    pub fn new(operator: FilterOperator) -> Self {
        Self {
            operator,
            filters: Vec::new(),
        }
    }

    /// Appends `filter`; members are evaluated in insertion order.
    pub fn with(mut self, filter: impl Filter + 'static) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    pub(crate) fn from_filters(operator: FilterOperator, filters: Vec<Arc<dyn Filter>>) -> Self {
        Self { operator, filters }
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl Filter for FilterList {
    fn to_proto(&self) -> Result<proto::Filter> {
        let filters = self
            .filters
            .iter()
            .map(|f| f.to_proto())
            .collect::<Result<Vec<_>>>()?;
        encode_filter(
            "FilterList",
            &proto::FilterList {
                operator: FilterListOperator::from(self.operator).into(),
                filters,
            },
        )
    }
}
