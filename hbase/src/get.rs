//! Single-row reads.

use std::sync::Arc;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::filter::{Filter, FilterList, FilterOperator};
use crate::mutation::ColumnMap;
use crate::proto;

/// A read of one row.
///
/// Without column selectors the whole row is returned. A family selected
/// without qualifiers returns every column of that family.
///
/// # Example
///
/// ```
/// use hbase::{Get, PrefixFilter};
///
/// let get = Get::new("user-1")
///     .unwrap()
///     .add_column("info", "name")
///     .add_family("stats")
///     .add_filter(PrefixFilter::new("user-"));
/// assert!(get.to_proto().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct Get {
    row: Bytes,
    columns: ColumnMap<()>,
    filters: Vec<Arc<dyn Filter>>,
}

impl Get {
    /// Creates a get for `row`, which must be non-empty.
    pub fn new(row: impl AsRef<[u8]>) -> Result<Self> {
        let row = row.as_ref();
        if row.is_empty() {
            return Err(Error::InvalidInput("get requires a non-empty row".to_string()));
        }
        Ok(Self {
            row: Bytes::copy_from_slice(row),
            columns: ColumnMap::default(),
            filters: Vec::new(),
        })
    }

    /// Selects `family:qualifier`.
    pub fn add_column(mut self, family: impl AsRef<[u8]>, qualifier: impl AsRef<[u8]>) -> Self {
        self.columns.upsert(family.as_ref(), qualifier.as_ref(), ());
        self
    }

    /// Selects every column of `family`, superseding any column selectors
    /// of that family.
    pub fn add_family(mut self, family: impl AsRef<[u8]>) -> Self {
        self.columns.add_whole_family(family.as_ref());
        self
    }

    /// Attaches a server-side filter.
    pub fn add_filter(mut self, filter: impl Filter + 'static) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    pub fn row(&self) -> &Bytes {
        &self.row
    }

    /// Converts this get to its wire message.
    ///
    /// The wire message holds one filter, so several attached filters are
    /// sent as a [`FilterList`] that requires all of them to pass.
    pub fn to_proto(&self) -> Result<proto::Get> {
        let filter = match self.filters.as_slice() {
            [] => None,
            [single] => Some(single.to_proto()?),
            many => Some(
                FilterList::from_filters(FilterOperator::MustPassAll, many.to_vec()).to_proto()?,
            ),
        };

        Ok(proto::Get {
            row: self.row.to_vec(),
            column: self
                .columns
                .iter()
                .map(|f| proto::Column {
                    family: f.family.to_vec(),
                    qualifier: if f.whole {
                        Vec::new()
                    } else {
                        f.columns.iter().map(|(q, _)| q.to_vec()).collect()
                    },
                })
                .collect(),
            filter,
            max_versions: None,
        })
    }
}
