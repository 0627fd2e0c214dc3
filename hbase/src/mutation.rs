//! Row mutations: put, delete and increment.
//!
//! A [`Mutation`] targets a single row and groups its columns by family. The
//! kind of mutation is fixed by the constructor and becomes the
//! `mutate_type` tag of the wire message produced by [`Mutation::to_proto`].
//!
//! # Example
//!
//! ```
//! use hbase::Mutation;
//!
//! let put = Mutation::put("user-1")
//!     .unwrap()
//!     .add_value("info", "name", "ada")
//!     .add_value("info", "lang", "en")
//!     .with_timestamp(1_700_000_000_000);
//! assert_eq!(put.families().count(), 1);
//! ```

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::proto::{self, DeleteType, MutationType};

/// Timestamp the cluster interprets as "latest version".
///
/// This is the signed 64-bit maximum, which is what region servers compare
/// against. It is not `u64::MAX`.
pub const LATEST_TIMESTAMP: u64 = i64::MAX as u64;

/// Columns grouped by family, in first-seen order.
///
/// Families are located by byte equality with a linear scan; mutations carry
/// few families. Within a family a qualifier appears at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ColumnMap<V> {
    families: Vec<FamilyColumns<V>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FamilyColumns<V> {
    pub(crate) family: Bytes,
    pub(crate) columns: Vec<(Bytes, V)>,
    /// Set when the family was added as a whole, independent of its columns.
    pub(crate) whole: bool,
}

impl<V> Default for ColumnMap<V> {
    fn default() -> Self {
        Self {
            families: Vec::new(),
        }
    }
}

impl<V> ColumnMap<V> {
    fn position(&self, family: &[u8]) -> Option<usize> {
        self.families
            .iter()
            .position(|f| f.family.as_ref() == family)
    }

    /// Returns the slot for `family`, appending an empty one if it is new.
    pub(crate) fn family_mut(&mut self, family: &[u8]) -> &mut FamilyColumns<V> {
        let pos = match self.position(family) {
            Some(pos) => pos,
            None => {
                self.families.push(FamilyColumns {
                    family: Bytes::copy_from_slice(family),
                    columns: Vec::new(),
                    whole: false,
                });
                self.families.len() - 1
            }
        };
        &mut self.families[pos]
    }

    /// Inserts `qualifier` into `family`, replacing the value in place if the
    /// pair already exists.
    pub(crate) fn upsert(&mut self, family: &[u8], qualifier: &[u8], value: V) {
        let slot = self.family_mut(family);
        match slot
            .columns
            .iter_mut()
            .find(|(q, _)| q.as_ref() == qualifier)
        {
            Some((_, existing)) => *existing = value,
            None => slot
                .columns
                .push((Bytes::copy_from_slice(qualifier), value)),
        }
    }

    /// Marks `family` as selected in full, creating its slot if needed.
    pub(crate) fn add_whole_family(&mut self, family: &[u8]) {
        self.family_mut(family).whole = true;
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &FamilyColumns<V>> {
        self.families.iter()
    }

    pub(crate) fn get(&self, family: &[u8]) -> Option<&FamilyColumns<V>> {
        self.position(family).map(|pos| &self.families[pos])
    }
}

/// A write operation targeting one row.
///
/// Builders consume and return the mutation so calls chain. The row is fixed
/// at construction and must be non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    kind: MutationType,
    row: Bytes,
    columns: ColumnMap<Bytes>,
    timestamp: Option<u64>,
}

impl Mutation {
    fn new(kind: MutationType, row: impl AsRef<[u8]>) -> Result<Self> {
        let row = row.as_ref();
        if row.is_empty() {
            return Err(Error::InvalidInput(format!(
                "{:?} requires a non-empty row",
                kind
            )));
        }
        Ok(Self {
            kind,
            row: Bytes::copy_from_slice(row),
            columns: ColumnMap::default(),
            timestamp: None,
        })
    }

    /// Creates an empty put (overwrite) for `row`.
    pub fn put(row: impl AsRef<[u8]>) -> Result<Self> {
        Self::new(MutationType::Put, row)
    }

    /// Creates an empty delete for `row`.
    ///
    /// A delete with no columns or families removes the whole row.
    pub fn delete(row: impl AsRef<[u8]>) -> Result<Self> {
        Self::new(MutationType::Delete, row)
    }

    /// Creates an empty atomic increment for `row`.
    pub fn increment(row: impl AsRef<[u8]>) -> Result<Self> {
        Self::new(MutationType::Increment, row)
    }

    /// Sets `family:qualifier` to `value`.
    ///
    /// Adding a qualifier that is already present replaces its value and keeps
    /// its position.
    pub fn add_value(
        mut self,
        family: impl AsRef<[u8]>,
        qualifier: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> Self {
        self.columns.upsert(
            family.as_ref(),
            qualifier.as_ref(),
            Bytes::copy_from_slice(value.as_ref()),
        );
        self
    }

    /// Adds `family:qualifier` without a value.
    ///
    /// On a delete this removes every version of the column.
    pub fn add_column(self, family: impl AsRef<[u8]>, qualifier: impl AsRef<[u8]>) -> Self {
        self.add_value(family, qualifier, Bytes::new())
    }

    /// Adds `family` with no qualifiers.
    ///
    /// On a delete this removes the whole family from the row, whether or
    /// not columns of the family were also added.
    pub fn add_family(mut self, family: impl AsRef<[u8]>) -> Self {
        self.columns.add_whole_family(family.as_ref());
        self
    }

    /// Adds `amount` to the counter at `family:qualifier`.
    ///
    /// The amount is sent as 8 big-endian bytes, the cluster's counter format.
    pub fn add_amount(
        self,
        family: impl AsRef<[u8]>,
        qualifier: impl AsRef<[u8]>,
        amount: i64,
    ) -> Self {
        self.add_value(family, qualifier, amount.to_be_bytes())
    }

    /// Sets the logical timestamp applied to every column.
    ///
    /// `0` means "unset" and is replaced with [`LATEST_TIMESTAMP`].
    pub fn with_timestamp(mut self, ts: u64) -> Self {
        self.timestamp = Some(if ts == 0 { LATEST_TIMESTAMP } else { ts });
        self
    }

    pub fn kind(&self) -> MutationType {
        self.kind
    }

    pub fn row(&self) -> &Bytes {
        &self.row
    }

    pub fn timestamp(&self) -> Option<u64> {
        self.timestamp
    }

    /// Returns the families in first-seen order.
    pub fn families(&self) -> impl Iterator<Item = &Bytes> {
        self.columns.iter().map(|f| &f.family)
    }

    /// Returns the `(qualifier, value)` pairs of `family` in insertion order.
    pub fn columns(&self, family: &[u8]) -> impl Iterator<Item = (&Bytes, &Bytes)> {
        self.columns
            .get(family)
            .into_iter()
            .flat_map(|f| f.columns.iter().map(|(q, v)| (q, v)))
    }

    /// Converts this mutation to its wire message.
    ///
    /// Families and qualifiers keep their insertion order. Deletes tag each
    /// qualifier for removal of all versions and append a family removal
    /// marker for every family added with [`add_family`](Self::add_family);
    /// values are omitted.
    pub fn to_proto(&self) -> proto::MutationProto {
        let delete = self.kind == MutationType::Delete;
        let column_value = self
            .columns
            .iter()
            .map(|family| {
                let mut qualifier_value: Vec<proto::QualifierValue> = family
                    .columns
                    .iter()
                    .map(|(qualifier, value)| proto::QualifierValue {
                        qualifier: Some(qualifier.to_vec()),
                        value: (!delete).then(|| value.to_vec()),
                        timestamp: self.timestamp,
                        delete_type: delete.then_some(DeleteType::DeleteMultipleVersions.into()),
                    })
                    .collect();
                if delete && family.whole {
                    qualifier_value.push(proto::QualifierValue {
                        qualifier: None,
                        value: None,
                        timestamp: self.timestamp,
                        delete_type: Some(DeleteType::DeleteFamily.into()),
                    });
                }
                proto::ColumnValue {
                    family: family.family.to_vec(),
                    qualifier_value,
                }
            })
            .collect();

        proto::MutationProto {
            row: Some(self.row.to_vec()),
            mutate_type: Some(self.kind.into()),
            column_value,
            timestamp: self.timestamp,
            durability: None,
        }
    }
}
