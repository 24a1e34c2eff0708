use std::sync::Arc;

use tracing::info;

use crate::{CoreError, CoreResult, Entry, Field, Group, GroupId};

/// Authoritative, insertion-ordered collection of groups.
///
/// Groups are shared as `Arc<Group>`; mutations go through `Arc::make_mut`, so
/// a group handed out earlier keeps the contents it had at that time.
#[derive(Clone, Debug, Default)]
pub struct GroupStore {
    groups: Vec<Arc<Group>>,
}

impl GroupStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and append a new group.
    pub fn create_group(&mut self, name: &str, fields: Vec<Field>) -> CoreResult<Arc<Group>> {
        let group = Arc::new(Group::new(name, fields)?);
        self.groups.push(Arc::clone(&group));
        info!(
            group_id = %group.id(),
            fields = group.fields().len(),
            "group created"
        );
        Ok(group)
    }

    /// Append an entry to a group.
    ///
    /// The entry is fitted to the group schema before it is stored.
    pub fn append_entry(&mut self, group_id: GroupId, entry: Entry) -> CoreResult<Arc<Group>> {
        let slot = self.slot_mut(group_id)?;
        let entry = Entry::for_fields(slot.fields(), &entry.values);
        Arc::make_mut(slot).entries.push(entry);
        info!(%group_id, entries = slot.entries().len(), "entry appended");
        Ok(Arc::clone(slot))
    }

    /// Remove the entry at `index`, shifting later entries down by one.
    pub fn remove_entry(&mut self, group_id: GroupId, index: usize) -> CoreResult<Arc<Group>> {
        let slot = self.slot_mut(group_id)?;
        let len = slot.entries().len();
        if index >= len {
            return Err(CoreError::Index { index, len });
        }
        Arc::make_mut(slot).entries.remove(index);
        info!(%group_id, index, "entry removed");
        Ok(Arc::clone(slot))
    }

    /// All groups in creation order.
    pub fn list_groups(&self) -> &[Arc<Group>] {
        &self.groups
    }

    /// Look up a group by id.
    pub fn get(&self, group_id: GroupId) -> Option<Arc<Group>> {
        self.groups
            .iter()
            .find(|group| group.id() == group_id)
            .cloned()
    }

    /// Whether a group with this id exists.
    pub fn contains(&self, group_id: GroupId) -> bool {
        self.groups.iter().any(|group| group.id() == group_id)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    fn slot_mut(&mut self, group_id: GroupId) -> CoreResult<&mut Arc<Group>> {
        self.groups
            .iter_mut()
            .find(|group| group.id() == group_id)
            .ok_or(CoreError::NotFound(group_id))
    }
}
