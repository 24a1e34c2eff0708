//! Core domain entities, rules, and state transitions for Groupkeep.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

mod draft;
mod navigation;
mod session;
mod store;

pub use draft::{EntryDraft, GroupDraft};
pub use navigation::{Navigator, Transition, View, ViewKind};
pub use session::{Action, CreateDialog, FieldValue, Outcome, Screen, Session, Snapshot};
pub use store::GroupStore;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors returned by core validation and domain rules.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// Returned when a validation rule is violated.
    #[error("validation error: {0}")]
    Validation(String),
    /// Returned when an operation references a group that is not in the store.
    #[error("group {0} not found")]
    NotFound(GroupId),
    /// Returned when an entry position is outside the group's entry list.
    #[error("entry index {index} out of bounds for {len} entries")]
    Index {
        /// Requested position.
        index: usize,
        /// Number of entries at the time of the request.
        len: usize,
    },
}

/// Unique identifier of a group.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct GroupId(Uuid);

impl GroupId {
    /// Allocate a fresh identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique identifier of a field definition.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct FieldId(Uuid);

impl FieldId {
    /// Allocate a fresh identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A named text column in a group's schema.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Field {
    id: FieldId,
    name: String,
}

impl Field {
    /// Create a field with a fresh id, rejecting empty or whitespace-only names.
    pub fn new(name: impl Into<String>) -> CoreResult<Self> {
        let name = gk_utils::normalize_name(&name.into())
            .ok_or_else(|| CoreError::Validation("field name cannot be empty".into()))?;
        Ok(Self {
            id: FieldId::generate(),
            name,
        })
    }

    /// Stable identifier of the field.
    pub fn id(&self) -> FieldId {
        self.id
    }

    /// Field name, also the key for entry values.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// One record in a group: a value for every field name of the group schema.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Entry {
    values: BTreeMap<String, String>,
}

impl Entry {
    /// Build an entry for `fields`, taking values from `source`.
    ///
    /// Keys that are not field names are dropped and missing fields default to
    /// an empty string, so the result always matches the schema.
    pub fn for_fields(fields: &[Field], source: &BTreeMap<String, String>) -> Self {
        let values = fields
            .iter()
            .map(|field| {
                let value = source.get(field.name()).cloned().unwrap_or_default();
                (field.name().to_string(), value)
            })
            .collect();
        Self { values }
    }

    /// Value stored for a field name.
    pub fn get(&self, field_name: &str) -> Option<&str> {
        self.values.get(field_name).map(String::as_str)
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the entry holds no values at all.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether the entry has exactly one value per field name.
    pub fn conforms_to(&self, fields: &[Field]) -> bool {
        self.values.len() == fields.len()
            && fields.iter().all(|field| self.values.contains_key(field.name()))
    }
}

/// A user-defined collection of entries sharing one field schema.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Group {
    id: GroupId,
    name: String,
    fields: Vec<Field>,
    entries: Vec<Entry>,
}

impl Group {
    /// Create an empty group, validating the name and the field schema.
    pub fn new(name: &str, fields: Vec<Field>) -> CoreResult<Self> {
        let name = gk_utils::normalize_name(name)
            .ok_or_else(|| CoreError::Validation("group name cannot be empty".into()))?;
        if fields.is_empty() {
            return Err(CoreError::Validation(
                "group needs at least one field".into(),
            ));
        }
        let duplicates = gk_utils::duplicate_names(fields.iter().map(Field::name));
        if !duplicates.is_empty() {
            return Err(CoreError::Validation(format!(
                "duplicate field names: {}",
                duplicates.join(", ")
            )));
        }

        Ok(Self {
            id: GroupId::generate(),
            name,
            fields,
            entries: Vec::new(),
        })
    }

    /// Stable identifier of the group.
    pub fn id(&self) -> GroupId {
        self.id
    }

    /// Trimmed group name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field schema, frozen at creation.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Entries in display order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Field names in schema order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(Field::name)
    }
}
