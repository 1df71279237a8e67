// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use url::Url;

use crate::backend::RowBackend;
use crate::error::SyncError;
use crate::forms::RowForm;
use crate::ids::RowKey;
use crate::link::{DEFAULT_LINK_BASE, landing_link};
use crate::model::{DEFAULT_COLOR, Field, FormProfile, Row, RowFields, RowPatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    ModalOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub fn from_sync_error(error: &SyncError) -> Self {
        match error {
            SyncError::Validation(_) => Self::warning(error.to_string()),
            _ => Self::error(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelSettings {
    pub profile: FormProfile,
    pub link_base: String,
    pub default_color: String,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            profile: FormProfile::Rich,
            link_base: DEFAULT_LINK_BASE.to_owned(),
            default_color: DEFAULT_COLOR.to_owned(),
        }
    }
}

/// The row being edited plus the snapshot its diff is computed against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession {
    pub snapshot: Row,
    pub form: RowForm,
}

impl EditSession {
    /// The snapshot with the profile's fields taken from the form.
    pub fn edited_fields(&self, profile: FormProfile) -> RowFields {
        let mut edited = self.snapshot.fields.clone();
        for field in profile.fields() {
            edited.set(*field, self.form.value(*field).to_owned());
        }
        edited
    }

    /// The user's changes so far, relative to the snapshot.
    pub fn pending_patch(&self, profile: FormProfile) -> RowPatch {
        RowPatch::diff(&self.snapshot.fields, &self.edited_fields(profile))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelCommand {
    Load,
    SetAddField(Field, String),
    ResetAdd,
    SubmitAdd,
    OpenEdit(RowKey),
    SetEditField(Field, String),
    SubmitEdit,
    CancelEdit,
    Delete(RowKey),
    OpenLink(RowKey),
    ClearNotice,
}

impl PanelCommand {
    /// Commands that may reach the backend.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::Load | Self::SubmitAdd | Self::SubmitEdit | Self::Delete(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelEvent {
    PhaseChanged(Phase),
    RowsLoaded(usize),
    RowAdded(String),
    RowUpdated { key: RowKey, fields: Vec<Field> },
    RowDeleted(RowKey),
    ModalOpened(RowKey),
    ModalClosed,
    FieldEdited(Field),
    LinkReady(Url),
    NoticeRaised(Notice),
    NoticeCleared,
}

/// Screen state for the codes panel.
///
/// The row list is a cache: every successful mutation is followed by a full
/// reload, and the backend stays the source of truth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelState {
    pub phase: Phase,
    pub rows: Vec<Row>,
    pub add_form: RowForm,
    pub edit: Option<EditSession>,
    pub notice: Option<Notice>,
    settings: PanelSettings,
}

impl Default for PanelState {
    fn default() -> Self {
        Self::new(PanelSettings::default())
    }
}

impl PanelState {
    pub fn new(settings: PanelSettings) -> Self {
        Self {
            phase: Phase::Idle,
            rows: Vec::new(),
            add_form: RowForm::blank(&settings.default_color),
            edit: None,
            notice: None,
            settings,
        }
    }

    pub fn settings(&self) -> &PanelSettings {
        &self.settings
    }

    pub fn find_row(&self, key: &RowKey) -> Option<&Row> {
        self.rows.iter().find(|row| &row.key == key)
    }

    /// Shows the loading indicator ahead of a remote command.
    pub fn mark_loading(&mut self) {
        self.phase = Phase::Loading;
    }

    pub fn set_notice(&mut self, notice: Notice) {
        self.notice = Some(notice);
    }

    pub fn dispatch<B: RowBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        command: PanelCommand,
    ) -> Vec<PanelEvent> {
        let mut events = Vec::new();
        if !command_allowed(self.resting_phase(), &command) {
            self.settle(&mut events);
            return events;
        }

        match command {
            PanelCommand::Load => {
                self.begin_loading(&mut events);
                if let Err(error) = self.reload(backend, &mut events) {
                    self.raise(Notice::from_sync_error(&error), &mut events);
                }
            }
            PanelCommand::SetAddField(field, value) => {
                self.add_form.set(field, value);
                events.push(PanelEvent::FieldEdited(field));
            }
            PanelCommand::ResetAdd => {
                self.add_form = RowForm::blank(&self.settings.default_color);
            }
            PanelCommand::SubmitAdd => self.submit_add(backend, &mut events),
            PanelCommand::OpenEdit(key) => self.open_edit(&key, &mut events),
            PanelCommand::SetEditField(field, value) => {
                if let Some(edit) = self.edit.as_mut() {
                    edit.form.set(field, value);
                    events.push(PanelEvent::FieldEdited(field));
                }
            }
            PanelCommand::SubmitEdit => self.submit_edit(backend, &mut events),
            PanelCommand::CancelEdit => {
                if self.edit.take().is_some() {
                    events.push(PanelEvent::ModalClosed);
                }
            }
            PanelCommand::Delete(key) => self.delete(backend, &key, &mut events),
            PanelCommand::OpenLink(key) => self.open_link(&key, &mut events),
            PanelCommand::ClearNotice => {
                if self.notice.take().is_some() {
                    events.push(PanelEvent::NoticeCleared);
                }
            }
        }

        self.settle(&mut events);
        events
    }

    fn submit_add<B: RowBackend + ?Sized>(&mut self, backend: &mut B, events: &mut Vec<PanelEvent>) {
        let fields = match self.add_form.validate(self.settings.profile) {
            Ok(fields) => fields,
            Err(error) => {
                self.raise(Notice::from_sync_error(&error), events);
                return;
            }
        };

        self.begin_loading(events);
        match backend.add_row(&fields) {
            Ok(()) => {
                events.push(PanelEvent::RowAdded(fields.codes.clone()));
                self.add_form = RowForm::blank(&self.settings.default_color);
                self.raise(Notice::info(format!("added code {}", fields.codes)), events);
                if let Err(error) = self.reload(backend, events) {
                    self.raise(Notice::from_sync_error(&error), events);
                }
            }
            Err(error) => self.raise(Notice::from_sync_error(&error), events),
        }
    }

    fn open_edit(&mut self, key: &RowKey, events: &mut Vec<PanelEvent>) {
        let Some(row) = self.find_row(key).cloned() else {
            self.raise(
                Notice::warning(format!("{key} is no longer loaded -- reload and retry")),
                events,
            );
            return;
        };
        let form = RowForm::from_fields(&row.fields);
        self.edit = Some(EditSession {
            snapshot: row,
            form,
        });
        events.push(PanelEvent::ModalOpened(key.clone()));
    }

    fn submit_edit<B: RowBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        events: &mut Vec<PanelEvent>,
    ) {
        let Some(edit) = self.edit.clone() else {
            return;
        };
        if let Err(error) = edit.form.validate(self.settings.profile) {
            self.raise(Notice::from_sync_error(&error), events);
            return;
        }

        let after = edit.edited_fields(self.settings.profile);
        let patch = edit.pending_patch(self.settings.profile);
        let snapshot = edit.snapshot;
        if patch.is_empty() {
            self.edit = None;
            events.push(PanelEvent::ModalClosed);
            self.raise(Notice::info("no changes to save"), events);
            return;
        }

        self.begin_loading(events);
        match backend.update_row(&snapshot, &patch) {
            Ok(()) => {
                self.edit = None;
                events.push(PanelEvent::ModalClosed);
                events.push(PanelEvent::RowUpdated {
                    key: snapshot.key.clone(),
                    fields: patch.fields(),
                });
                self.raise(Notice::info(format!("saved code {}", after.codes)), events);
                if let Err(error) = self.reload(backend, events) {
                    self.raise(Notice::from_sync_error(&error), events);
                }
            }
            Err(error) => {
                if error.backend_may_have_changed() {
                    if let Err(reload_error) = self.reload(backend, events) {
                        self.raise(Notice::from_sync_error(&reload_error), events);
                    }
                    self.refresh_snapshot(&snapshot.key, events);
                }
                self.raise(Notice::from_sync_error(&error), events);
            }
        }
    }

    // Rebases the modal on what the backend holds now. Only fields the user
    // changed are carried over; everything else shows the fresh values.
    fn refresh_snapshot(&mut self, key: &RowKey, events: &mut Vec<PanelEvent>) {
        let fresh = self.find_row(key).cloned();
        let profile = self.settings.profile;
        match (fresh, self.edit.as_mut()) {
            (Some(row), Some(edit)) => {
                let pending = edit.pending_patch(profile);
                edit.form = RowForm::from_fields(&pending.apply_to(&row.fields));
                edit.snapshot = row;
            }
            (None, Some(_)) => {
                self.edit = None;
                events.push(PanelEvent::ModalClosed);
            }
            (_, None) => {}
        }
    }

    fn delete<B: RowBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        key: &RowKey,
        events: &mut Vec<PanelEvent>,
    ) {
        let Some(row) = self.find_row(key).cloned() else {
            self.raise(
                Notice::warning(format!("{key} is no longer loaded -- reload and retry")),
                events,
            );
            return;
        };

        self.begin_loading(events);
        match backend.delete_row(&row) {
            Ok(()) => {
                events.push(PanelEvent::RowDeleted(key.clone()));
                self.raise(Notice::info(format!("deleted code {}", row.fields.codes)), events);
                if let Err(error) = self.reload(backend, events) {
                    self.raise(Notice::from_sync_error(&error), events);
                }
            }
            Err(error) => self.raise(Notice::from_sync_error(&error), events),
        }
    }

    fn open_link(&mut self, key: &RowKey, events: &mut Vec<PanelEvent>) {
        let Some(row) = self.find_row(key).cloned() else {
            self.raise(
                Notice::warning(format!("{key} is no longer loaded -- reload and retry")),
                events,
            );
            return;
        };
        match landing_link(&self.settings.link_base, &row.fields) {
            Ok(url) => events.push(PanelEvent::LinkReady(url)),
            Err(error) => self.raise(Notice::from_sync_error(&error), events),
        }
    }

    fn reload<B: RowBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        events: &mut Vec<PanelEvent>,
    ) -> Result<(), SyncError> {
        self.rows = backend.fetch_rows()?;
        events.push(PanelEvent::RowsLoaded(self.rows.len()));
        Ok(())
    }

    fn raise(&mut self, notice: Notice, events: &mut Vec<PanelEvent>) {
        self.notice = Some(notice.clone());
        events.push(PanelEvent::NoticeRaised(notice));
    }

    fn resting_phase(&self) -> Phase {
        if self.edit.is_some() {
            Phase::ModalOpen
        } else {
            Phase::Idle
        }
    }

    fn begin_loading(&mut self, events: &mut Vec<PanelEvent>) {
        if self.phase != Phase::Loading {
            self.phase = Phase::Loading;
            events.push(PanelEvent::PhaseChanged(Phase::Loading));
        }
    }

    fn settle(&mut self, events: &mut Vec<PanelEvent>) {
        let phase = self.resting_phase();
        if self.phase != phase {
            self.phase = phase;
            events.push(PanelEvent::PhaseChanged(phase));
        }
    }
}

fn command_allowed(phase: Phase, command: &PanelCommand) -> bool {
    match phase {
        Phase::ModalOpen => matches!(
            command,
            PanelCommand::Load
                | PanelCommand::SetEditField(..)
                | PanelCommand::SubmitEdit
                | PanelCommand::CancelEdit
                | PanelCommand::ClearNotice
        ),
        Phase::Idle | Phase::Loading => !matches!(
            command,
            PanelCommand::SetEditField(..) | PanelCommand::SubmitEdit | PanelCommand::CancelEdit
        ),
    }
}
