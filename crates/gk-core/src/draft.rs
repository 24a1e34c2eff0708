use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::{CoreError, CoreResult, Entry, Field, FieldId, Group, GroupId, GroupStore};

/// In-progress group definition, committed into a [`GroupStore`].
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct GroupDraft {
    name: String,
    fields: Vec<Field>,
    pending_field_name: String,
}

impl GroupDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Field name typed but not yet added.
    pub fn pending_field_name(&self) -> &str {
        &self.pending_field_name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_pending_field_name(&mut self, name: impl Into<String>) {
        self.pending_field_name = name.into();
    }

    /// Append a field with a fresh id and clear the pending name.
    ///
    /// Blank names are ignored. Duplicate names are accepted here and only
    /// rejected when the group is created.
    pub fn add_field(&mut self, name: &str) -> Option<FieldId> {
        let field = Field::new(name).ok()?;
        let id = field.id();
        self.fields.push(field);
        self.pending_field_name.clear();
        Some(id)
    }

    /// Add the pending field name as a field.
    pub fn add_pending_field(&mut self) -> Option<FieldId> {
        let pending = self.pending_field_name.clone();
        self.add_field(&pending)
    }

    /// Remove a field by id. Returns whether anything was removed.
    pub fn remove_field(&mut self, field_id: FieldId) -> bool {
        let before = self.fields.len();
        self.fields.retain(|field| field.id() != field_id);
        before != self.fields.len()
    }

    /// Field names that occur more than once.
    pub fn duplicate_field_names(&self) -> Vec<&str> {
        gk_utils::duplicate_names(self.fields.iter().map(Field::name))
    }

    /// Whether [`GroupDraft::commit`] would succeed.
    pub fn can_commit(&self) -> bool {
        gk_utils::normalize_name(&self.name).is_some()
            && !self.fields.is_empty()
            && self.duplicate_field_names().is_empty()
    }

    /// Create the group in `store` and reset the draft.
    ///
    /// On failure neither the draft nor the store is modified.
    pub fn commit(&mut self, store: &mut GroupStore) -> CoreResult<Arc<Group>> {
        let group = store.create_group(&self.name, self.fields.clone())?;
        self.reset();
        Ok(group)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.fields.is_empty() && self.pending_field_name.is_empty()
    }
}

/// In-progress entry values for the group currently being edited.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct EntryDraft {
    values: BTreeMap<String, String>,
}

impl EntryDraft {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh draft with an empty value for every field of `group`.
    pub fn begin(&mut self, group: &Group) {
        self.values = group
            .field_names()
            .map(|name| (name.to_string(), String::new()))
            .collect();
    }

    pub fn set_value(&mut self, field_name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(field_name.into(), value.into());
    }

    pub fn value(&self, field_name: &str) -> Option<&str> {
        self.values.get(field_name).map(String::as_str)
    }

    /// Append the drafted entry to `group_id` and clear the draft.
    ///
    /// The draft is kept when the group cannot be found.
    pub fn commit(&mut self, store: &mut GroupStore, group_id: GroupId) -> CoreResult<Arc<Group>> {
        let group = store.get(group_id).ok_or(CoreError::NotFound(group_id))?;
        let entry = Entry::for_fields(group.fields(), &self.values);
        let updated = store.append_entry(group_id, entry)?;
        self.cancel();
        Ok(updated)
    }

    /// Drop all drafted values.
    pub fn cancel(&mut self) {
        self.values.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
