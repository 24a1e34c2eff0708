use std::sync::Arc;

use serde::Serialize;

use crate::{CoreError, CoreResult, EntryDraft, Group, GroupId, GroupStore};

/// The active view. Group views hold an id that is resolved against the
/// store on every read, so they always show the current group contents.
#[derive(Clone, Copy, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(tag = "view", content = "group_id", rename_all = "snake_case")]
pub enum View {
    /// Group list and group creation.
    #[default]
    Home,
    /// Entries of one group.
    GroupDetail(GroupId),
    /// New-entry form for one group.
    EntryForm(GroupId),
}

/// View tag without the selected group.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    Home,
    GroupDetail,
    EntryForm,
}

impl View {
    pub fn kind(&self) -> ViewKind {
        match self {
            View::Home => ViewKind::Home,
            View::GroupDetail(_) => ViewKind::GroupDetail,
            View::EntryForm(_) => ViewKind::EntryForm,
        }
    }

    /// The selected group, if any.
    pub fn group_id(&self) -> Option<GroupId> {
        match self {
            View::Home => None,
            View::GroupDetail(id) | View::EntryForm(id) => Some(*id),
        }
    }
}

/// Result of a navigation request that did not fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// The request was carried out.
    Applied,
    /// The request does not apply to the current view.
    Ignored,
}

/// View state machine: `Home`, `GroupDetail(g)` and `EntryForm(g)`.
///
/// A request that names a group missing from the store fails with
/// [`CoreError::NotFound`] and leaves the navigator on `Home`.
#[derive(Clone, Debug, Default)]
pub struct Navigator {
    view: View,
}

impl Navigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> View {
        self.view
    }

    /// `Home -> GroupDetail(g)`.
    pub fn open_group(&mut self, store: &GroupStore, group_id: GroupId) -> CoreResult<Transition> {
        if self.view != View::Home {
            return Ok(Transition::Ignored);
        }
        self.resolve(store, group_id)?;
        self.view = View::GroupDetail(group_id);
        Ok(Transition::Applied)
    }

    /// `GroupDetail(g) -> EntryForm(g)`, starting a fresh entry draft.
    pub fn open_entry_form(
        &mut self,
        store: &GroupStore,
        draft: &mut EntryDraft,
    ) -> CoreResult<Transition> {
        let View::GroupDetail(group_id) = self.view else {
            return Ok(Transition::Ignored);
        };
        let group = self.resolve(store, group_id)?;
        draft.begin(&group);
        self.view = View::EntryForm(group_id);
        Ok(Transition::Applied)
    }

    /// `EntryForm(g) -> GroupDetail(g')`, committing the entry draft.
    pub fn save_entry(
        &mut self,
        store: &mut GroupStore,
        draft: &mut EntryDraft,
    ) -> CoreResult<Transition> {
        let View::EntryForm(group_id) = self.view else {
            return Ok(Transition::Ignored);
        };
        if let Err(err) = draft.commit(store, group_id) {
            self.fall_back_on_missing(&err);
            return Err(err);
        }
        self.view = View::GroupDetail(group_id);
        Ok(Transition::Applied)
    }

    /// `EntryForm(g) -> GroupDetail(g)`, discarding the entry draft.
    pub fn cancel_entry(
        &mut self,
        store: &GroupStore,
        draft: &mut EntryDraft,
    ) -> CoreResult<Transition> {
        let View::EntryForm(group_id) = self.view else {
            return Ok(Transition::Ignored);
        };
        draft.cancel();
        self.resolve(store, group_id)?;
        self.view = View::GroupDetail(group_id);
        Ok(Transition::Applied)
    }

    /// `GroupDetail(g) -> Home`.
    pub fn go_home(&mut self) -> Transition {
        if let View::GroupDetail(_) = self.view {
            self.view = View::Home;
            Transition::Applied
        } else {
            Transition::Ignored
        }
    }

    /// `GroupDetail(g) -> GroupDetail(g')` with the entry at `index` removed.
    ///
    /// An out-of-range index fails with [`CoreError::Index`] and keeps the view.
    pub fn delete_entry(&mut self, store: &mut GroupStore, index: usize) -> CoreResult<Transition> {
        let View::GroupDetail(group_id) = self.view else {
            return Ok(Transition::Ignored);
        };
        if let Err(err) = store.remove_entry(group_id, index) {
            self.fall_back_on_missing(&err);
            return Err(err);
        }
        Ok(Transition::Applied)
    }

    /// Return to `Home` if the selected group is no longer in `store`.
    ///
    /// Returns whether the view changed.
    pub fn reconcile(&mut self, store: &GroupStore) -> bool {
        match self.view.group_id() {
            Some(group_id) if !store.contains(group_id) => {
                self.view = View::Home;
                true
            }
            _ => false,
        }
    }

    /// Group shown by the current view, resolved against `store`.
    pub fn selected_group(&self, store: &GroupStore) -> Option<Arc<Group>> {
        self.view.group_id().and_then(|id| store.get(id))
    }

    fn resolve(&mut self, store: &GroupStore, group_id: GroupId) -> CoreResult<Arc<Group>> {
        store.get(group_id).ok_or_else(|| {
            self.view = View::Home;
            CoreError::NotFound(group_id)
        })
    }

    fn fall_back_on_missing(&mut self, err: &CoreError) {
        if matches!(err, CoreError::NotFound(_)) {
            self.view = View::Home;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Field;

    fn store_with_contacts() -> (GroupStore, GroupId) {
        let mut store = GroupStore::new();
        let fields = vec![Field::new("Email").unwrap(), Field::new("Phone").unwrap()];
        let group = store.create_group("Contacts", fields).unwrap();
        (store, group.id())
    }

    #[test]
    fn starts_home() {
        assert_eq!(Navigator::new().view(), View::Home);
    }

    #[test]
    fn full_entry_round() {
        let (mut store, group_id) = store_with_contacts();
        let mut nav = Navigator::new();
        let mut draft = EntryDraft::new();

        assert_eq!(nav.open_group(&store, group_id), Ok(Transition::Applied));
        assert_eq!(nav.view(), View::GroupDetail(group_id));

        nav.open_entry_form(&store, &mut draft).unwrap();
        assert_eq!(nav.view(), View::EntryForm(group_id));
        assert_eq!(draft.value("Email"), Some(""));

        draft.set_value("Email", "a@b.com");
        nav.save_entry(&mut store, &mut draft).unwrap();
        assert_eq!(nav.view(), View::GroupDetail(group_id));
        assert_eq!(nav.selected_group(&store).unwrap().entries().len(), 1);

        assert_eq!(nav.go_home(), Transition::Applied);
        assert_eq!(nav.view(), View::Home);
        assert!(nav.selected_group(&store).is_none());
    }

    #[test]
    fn cancel_returns_without_entry() {
        let (store, group_id) = store_with_contacts();
        let mut nav = Navigator::new();
        let mut draft = EntryDraft::new();
        nav.open_group(&store, group_id).unwrap();
        nav.open_entry_form(&store, &mut draft).unwrap();
        draft.set_value("Email", "a@b.com");

        nav.cancel_entry(&store, &mut draft).unwrap();

        assert_eq!(nav.view(), View::GroupDetail(group_id));
        assert!(draft.is_empty());
        assert!(store.get(group_id).unwrap().entries().is_empty());
    }

    #[test]
    fn delete_reflects_in_selected_group() {
        let (mut store, group_id) = store_with_contacts();
        let mut nav = Navigator::new();
        let mut draft = EntryDraft::new();
        nav.open_group(&store, group_id).unwrap();
        for email in ["e0", "e1"] {
            nav.open_entry_form(&store, &mut draft).unwrap();
            draft.set_value("Email", email);
            nav.save_entry(&mut store, &mut draft).unwrap();
        }

        nav.delete_entry(&mut store, 0).unwrap();

        let group = nav.selected_group(&store).unwrap();
        assert_eq!(group.entries().len(), 1);
        assert_eq!(group.entries()[0].get("Email"), Some("e1"));
        assert_eq!(nav.view(), View::GroupDetail(group_id));
    }

    #[test]
    fn bad_index_keeps_view() {
        let (mut store, group_id) = store_with_contacts();
        let mut nav = Navigator::new();
        nav.open_group(&store, group_id).unwrap();

        let err = nav.delete_entry(&mut store, 3).unwrap_err();

        assert_eq!(err, CoreError::Index { index: 3, len: 0 });
        assert_eq!(nav.view(), View::GroupDetail(group_id));
    }

    #[test]
    fn missing_group_falls_back_home() {
        let (store, group_id) = store_with_contacts();
        let (mut other, _) = store_with_contacts();
        let mut nav = Navigator::new();
        nav.open_group(&store, group_id).unwrap();

        let err = nav.delete_entry(&mut other, 0).unwrap_err();

        assert_eq!(err, CoreError::NotFound(group_id));
        assert_eq!(nav.view(), View::Home);
    }

    #[test]
    fn reconcile_drops_vanished_group() {
        let (store, group_id) = store_with_contacts();
        let (other, _) = store_with_contacts();
        let mut nav = Navigator::new();
        nav.open_group(&store, group_id).unwrap();

        assert!(!nav.reconcile(&store));
        assert_eq!(nav.view(), View::GroupDetail(group_id));

        assert!(nav.reconcile(&other));
        assert_eq!(nav.view(), View::Home);
        assert!(!nav.reconcile(&other));
    }

    #[test]
    fn unknown_group_cannot_be_opened() {
        let (store, _) = store_with_contacts();
        let mut nav = Navigator::new();
        let missing = GroupId::generate();

        assert_eq!(
            nav.open_group(&store, missing),
            Err(CoreError::NotFound(missing))
        );
        assert_eq!(nav.view(), View::Home);
    }

    #[test]
    fn transitions_outside_their_view_are_ignored() {
        let (mut store, group_id) = store_with_contacts();
        let mut nav = Navigator::new();
        let mut draft = EntryDraft::new();

        assert_eq!(nav.open_entry_form(&store, &mut draft), Ok(Transition::Ignored));
        assert_eq!(nav.save_entry(&mut store, &mut draft), Ok(Transition::Ignored));
        assert_eq!(nav.cancel_entry(&store, &mut draft), Ok(Transition::Ignored));
        assert_eq!(nav.delete_entry(&mut store, 0), Ok(Transition::Ignored));
        assert_eq!(nav.go_home(), Transition::Ignored);

        nav.open_group(&store, group_id).unwrap();
        assert_eq!(nav.open_group(&store, group_id), Ok(Transition::Ignored));
        assert_eq!(nav.view(), View::GroupDetail(group_id));
    }
}
