use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    CoreError, CoreResult, EntryDraft, FieldId, Group, GroupDraft, GroupId, GroupStore, Navigator,
    Transition, View,
};

/// A user-triggered input event.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Show the create-group dialog on the home view.
    OpenCreateDialog,
    /// Hide the create-group dialog and discard the group draft.
    CloseCreateDialog,
    SetGroupName { name: String },
    SetPendingFieldName { name: String },
    AddField { name: String },
    /// Add the pending field name as a field.
    AddPendingField,
    RemoveField { field_id: FieldId },
    /// Commit the group draft.
    CreateGroup,
    OpenGroup { group_id: GroupId },
    OpenEntryForm,
    SetEntryValue { field: String, value: String },
    SaveEntry,
    CancelEntry,
    /// Delete the entry at a display position of the open group.
    DeleteEntry { index: usize },
    GoHome,
}

impl Action {
    /// Short name used in log events.
    pub fn name(&self) -> &'static str {
        match self {
            Action::OpenCreateDialog => "open_create_dialog",
            Action::CloseCreateDialog => "close_create_dialog",
            Action::SetGroupName { .. } => "set_group_name",
            Action::SetPendingFieldName { .. } => "set_pending_field_name",
            Action::AddField { .. } => "add_field",
            Action::AddPendingField => "add_pending_field",
            Action::RemoveField { .. } => "remove_field",
            Action::CreateGroup => "create_group",
            Action::OpenGroup { .. } => "open_group",
            Action::OpenEntryForm => "open_entry_form",
            Action::SetEntryValue { .. } => "set_entry_value",
            Action::SaveEntry => "save_entry",
            Action::CancelEntry => "cancel_entry",
            Action::DeleteEntry { .. } => "delete_entry",
            Action::GoHome => "go_home",
        }
    }
}

/// How the last action was handled.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum Outcome {
    /// No action has been applied yet.
    #[default]
    Idle,
    Applied,
    /// The action does not apply to the current view.
    Ignored,
    /// The action failed; state is unchanged.
    Rejected(String),
}

/// State of the create-group dialog.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct CreateDialog {
    pub draft: GroupDraft,
    /// Whether the create action is enabled.
    pub can_create: bool,
    pub duplicate_field_names: Vec<String>,
}

/// One entry-form input.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct FieldValue {
    pub field_id: FieldId,
    pub name: String,
    pub value: String,
}

/// Render data for the active view.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum Screen {
    Home {
        groups: Vec<Arc<Group>>,
        create_dialog: Option<CreateDialog>,
    },
    GroupDetail {
        group: Arc<Group>,
    },
    EntryForm {
        group: Arc<Group>,
        /// Drafted values in field order.
        values: Vec<FieldValue>,
    },
}

/// Immutable view of the session handed to a rendering surface.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Snapshot {
    pub view: View,
    pub screen: Screen,
    pub outcome: Outcome,
}

/// Owns the group store, the navigator and both drafts.
///
/// Every change goes through [`Session::apply`], one action at a time.
#[derive(Debug, Default)]
pub struct Session {
    store: GroupStore,
    navigator: Navigator,
    group_draft: GroupDraft,
    entry_draft: EntryDraft,
    create_dialog_open: bool,
    last_outcome: Outcome,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> &GroupStore {
        &self.store
    }

    pub fn view(&self) -> View {
        self.navigator.view()
    }

    pub fn group_draft(&self) -> &GroupDraft {
        &self.group_draft
    }

    pub fn entry_draft(&self) -> &EntryDraft {
        &self.entry_draft
    }

    pub fn is_create_dialog_open(&self) -> bool {
        self.create_dialog_open
    }

    pub fn last_outcome(&self) -> &Outcome {
        &self.last_outcome
    }

    /// Apply one action and return the resulting snapshot.
    ///
    /// Errors never escape: a rejected action leaves the state unchanged and is
    /// reported through [`Snapshot::outcome`].
    pub fn apply(&mut self, action: Action) -> Snapshot {
        let name = action.name();
        self.last_outcome = match self.try_apply(action) {
            Ok(Transition::Applied) => Outcome::Applied,
            Ok(Transition::Ignored) => {
                debug!(action = name, view = ?self.navigator.view(), "action ignored");
                Outcome::Ignored
            }
            Err(err @ CoreError::Validation(_)) => {
                debug!(action = name, error = %err, "action refused");
                Outcome::Rejected(err.to_string())
            }
            Err(err) => {
                warn!(action = name, error = %err, "inconsistent action dropped");
                Outcome::Rejected(err.to_string())
            }
        };
        if self.navigator.reconcile(&self.store) {
            warn!(action = name, "selected group vanished, returning home");
        }
        self.snapshot()
    }

    /// Apply one action, returning the error instead of recording it.
    pub fn try_apply(&mut self, action: Action) -> CoreResult<Transition> {
        match action {
            Action::OpenCreateDialog => {
                if self.navigator.view() != View::Home || self.create_dialog_open {
                    return Ok(Transition::Ignored);
                }
                self.create_dialog_open = true;
                Ok(Transition::Applied)
            }
            Action::CloseCreateDialog => {
                if !self.create_dialog_open {
                    return Ok(Transition::Ignored);
                }
                self.create_dialog_open = false;
                self.group_draft.reset();
                Ok(Transition::Applied)
            }
            Action::SetGroupName { name } => {
                self.edit_group_draft(|draft| {
                    draft.set_name(name);
                    true
                })
            }
            Action::SetPendingFieldName { name } => {
                self.edit_group_draft(|draft| {
                    draft.set_pending_field_name(name);
                    true
                })
            }
            Action::AddField { name } => {
                self.edit_group_draft(|draft| draft.add_field(&name).is_some())
            }
            Action::AddPendingField => {
                self.edit_group_draft(|draft| draft.add_pending_field().is_some())
            }
            Action::RemoveField { field_id } => {
                self.edit_group_draft(|draft| draft.remove_field(field_id))
            }
            Action::CreateGroup => {
                if !self.create_dialog_open {
                    return Ok(Transition::Ignored);
                }
                self.group_draft.commit(&mut self.store)?;
                self.create_dialog_open = false;
                Ok(Transition::Applied)
            }
            Action::OpenGroup { group_id } => {
                if self.create_dialog_open {
                    return Ok(Transition::Ignored);
                }
                self.navigator.open_group(&self.store, group_id)
            }
            Action::OpenEntryForm => self
                .navigator
                .open_entry_form(&self.store, &mut self.entry_draft),
            Action::SetEntryValue { field, value } => {
                if !matches!(self.navigator.view(), View::EntryForm(_)) {
                    return Ok(Transition::Ignored);
                }
                self.entry_draft.set_value(field, value);
                Ok(Transition::Applied)
            }
            Action::SaveEntry => self
                .navigator
                .save_entry(&mut self.store, &mut self.entry_draft),
            Action::CancelEntry => self
                .navigator
                .cancel_entry(&self.store, &mut self.entry_draft),
            Action::DeleteEntry { index } => self.navigator.delete_entry(&mut self.store, index),
            Action::GoHome => Ok(self.navigator.go_home()),
        }
    }

    /// Build the render data for the current state.
    pub fn snapshot(&self) -> Snapshot {
        let view = self.navigator.view();
        let screen = match (view, self.navigator.selected_group(&self.store)) {
            (View::GroupDetail(_), Some(group)) => Screen::GroupDetail { group },
            (View::EntryForm(_), Some(group)) => {
                let values = group
                    .fields()
                    .iter()
                    .map(|field| FieldValue {
                        field_id: field.id(),
                        name: field.name().to_string(),
                        value: self
                            .entry_draft
                            .value(field.name())
                            .unwrap_or_default()
                            .to_string(),
                    })
                    .collect();
                Screen::EntryForm { group, values }
            }
            _ => {
                return Snapshot {
                    view: View::Home,
                    screen: self.home_screen(),
                    outcome: self.last_outcome.clone(),
                }
            }
        };

        Snapshot {
            view,
            screen,
            outcome: self.last_outcome.clone(),
        }
    }

    fn home_screen(&self) -> Screen {
        let create_dialog = self.create_dialog_open.then(|| CreateDialog {
            draft: self.group_draft.clone(),
            can_create: self.group_draft.can_commit(),
            duplicate_field_names: self
                .group_draft
                .duplicate_field_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
        });
        Screen::Home {
            groups: self.store.list_groups().to_vec(),
            create_dialog,
        }
    }

    fn edit_group_draft(
        &mut self,
        edit: impl FnOnce(&mut GroupDraft) -> bool,
    ) -> CoreResult<Transition> {
        if !self.create_dialog_open {
            return Ok(Transition::Ignored);
        }
        if edit(&mut self.group_draft) {
            Ok(Transition::Applied)
        } else {
            Ok(Transition::Ignored)
        }
    }
}
