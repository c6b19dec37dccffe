//! Dialog form state: one draft record, its dirty flag, and the
//! "discard unsaved changes?" gate in front of closing.

use std::fmt;

use chrono::{Local, NaiveDate};
use shared::{
    domain::{Entity, FieldValue},
    error::RemoteError,
    protocol::{reply_identifier, Command},
    schema::EntityKind,
};
use tracing::{debug, info, warn};

use crate::{
    commands::{build_command, Change, Operation},
    EditorContext, EditorError, EditorResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftState {
    Closed,
    Open,
    ConfirmingDiscard,
    Committing,
}

impl fmt::Display for DraftState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::ConfirmingDiscard => "confirming discard",
            Self::Committing => "committing",
        })
    }
}

/// Result of asking the dialog to close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseRequest {
    Closed,
    /// The draft has unsaved changes; the shell should show a yes/no prompt
    /// and answer with `confirm_discard` or `cancel_discard_prompt`.
    NeedsConfirmation,
}

/// A validated commit whose command is on its way to the backend.
#[must_use = "a pending commit must be settled with DraftEditor::finish_commit"]
#[derive(Debug)]
pub struct PendingCommit {
    command: Command,
    entity: Entity,
    operation: Operation,
    resume: DraftState,
}

impl PendingCommit {
    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }
}

pub struct DraftEditor {
    kind: EntityKind,
    context: EditorContext,
    state: DraftState,
    draft: Option<Entity>,
    dirty: bool,
    on_requires_confirmation: Option<Box<dyn FnMut() + Send>>,
}

impl fmt::Debug for DraftEditor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DraftEditor")
            .field("kind", &self.kind)
            .field("state", &self.state)
            .field("dirty", &self.dirty)
            .field("draft", &self.draft)
            .finish_non_exhaustive()
    }
}

impl DraftEditor {
    pub fn new(kind: EntityKind, context: EditorContext) -> Self {
        Self {
            kind,
            context,
            state: DraftState::Closed,
            draft: None,
            dirty: false,
            on_requires_confirmation: None,
        }
    }

    /// Called every time closing is deferred to a confirmation prompt.
    pub fn on_requires_confirmation(&mut self, hook: impl FnMut() + Send + 'static) {
        self.on_requires_confirmation = Some(Box::new(hook));
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn context(&self) -> &EditorContext {
        &self.context
    }

    pub fn state(&self) -> DraftState {
        self.state
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn draft(&self) -> Option<&Entity> {
        self.draft.as_ref()
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.draft.as_ref().and_then(|draft| draft.field(name))
    }

    /// Opens the dialog on a copy of `initial`, or on a blank record.
    pub fn open(&mut self, initial: Option<Entity>) -> EditorResult<()> {
        self.open_on(initial, Local::now().date_naive())
    }

    /// Like [`open`](Self::open) with an explicit "today" for date defaults.
    pub fn open_on(&mut self, initial: Option<Entity>, today: NaiveDate) -> EditorResult<()> {
        if self.state == DraftState::Committing {
            return Err(EditorError::Busy);
        }
        let draft = initial.unwrap_or_else(|| Entity::new(self.kind.schema().blank(today)));
        debug!(kind = %self.kind, id = ?draft.id, "draft opened");
        self.draft = Some(draft);
        self.dirty = false;
        self.state = DraftState::Open;
        Ok(())
    }

    pub fn set_field(&mut self, name: &str, value: impl Into<FieldValue>) -> EditorResult<()> {
        self.require_state("edit a field", &[DraftState::Open])?;
        if !self.kind.schema().is_known(name) {
            return Err(EditorError::InvalidField {
                kind: self.kind,
                field: name.to_string(),
            });
        }
        if let Some(draft) = self.draft.as_mut() {
            draft.fields.insert(name.to_string(), value.into());
            self.dirty = true;
        }
        Ok(())
    }

    pub fn request_close(&mut self) -> EditorResult<CloseRequest> {
        match self.state {
            DraftState::Closed => Ok(CloseRequest::Closed),
            DraftState::Committing => Err(EditorError::Busy),
            DraftState::ConfirmingDiscard => Ok(CloseRequest::NeedsConfirmation),
            DraftState::Open if !self.dirty => {
                self.discard();
                Ok(CloseRequest::Closed)
            }
            DraftState::Open => {
                self.state = DraftState::ConfirmingDiscard;
                if let Some(hook) = self.on_requires_confirmation.as_mut() {
                    hook();
                }
                Ok(CloseRequest::NeedsConfirmation)
            }
        }
    }

    pub fn confirm_discard(&mut self) -> EditorResult<()> {
        self.require_state("confirm discard", &[DraftState::ConfirmingDiscard])?;
        debug!(kind = %self.kind, "unsaved draft discarded");
        self.discard();
        Ok(())
    }

    pub fn cancel_discard_prompt(&mut self) -> EditorResult<()> {
        self.require_state("cancel the discard prompt", &[DraftState::ConfirmingDiscard])?;
        self.state = DraftState::Open;
        Ok(())
    }

    /// Validates the draft and moves to `Committing`. Nothing is sent when
    /// validation fails and the editor stays where it was.
    ///
    /// Allowed from the discard prompt too: its "save" answer commits.
    pub fn begin_commit(&mut self) -> EditorResult<PendingCommit> {
        self.require_state(
            "commit",
            &[DraftState::Open, DraftState::ConfirmingDiscard],
        )?;
        let Some(draft) = self.draft.as_ref() else {
            return Err(EditorError::InvalidState {
                operation: "commit",
                state: self.state,
            });
        };

        self.kind.schema().validate_complete(&draft.fields)?;

        let change = match draft.id.as_ref() {
            Some(id) => Change::Update(id, &draft.fields),
            None => Change::Add(&draft.fields),
        };
        let operation = change.operation();
        let command = build_command(&self.context, self.kind, change)?;
        let pending = PendingCommit {
            command,
            entity: draft.clone(),
            operation,
            resume: self.state,
        };
        self.state = DraftState::Committing;
        debug!(kind = %self.kind, command = %pending.command.name, "draft commit queued");
        Ok(pending)
    }

    /// Applies the backend's answer. On success the dialog closes and the
    /// committed record (with its assigned id on add) is returned; on failure
    /// the draft is kept as-is so the user can retry.
    pub fn finish_commit(
        &mut self,
        pending: PendingCommit,
        reply: Result<serde_json::Value, RemoteError>,
    ) -> EditorResult<Entity> {
        match reply {
            Ok(reply) => {
                let mut entity = pending.entity;
                if entity.id.is_none() {
                    entity.id = reply_identifier(&reply);
                }
                info!(
                    kind = %self.kind,
                    command = %pending.command.name,
                    id = ?entity.id,
                    "draft committed"
                );
                self.discard();
                Ok(entity)
            }
            Err(error) => {
                warn!(
                    kind = %self.kind,
                    command = %pending.command.name,
                    %error,
                    "draft commit rejected"
                );
                self.state = pending.resume;
                Err(EditorError::Remote(error))
            }
        }
    }

    pub async fn commit<E>(&mut self, executor: &E) -> EditorResult<Entity>
    where
        E: crate::CommandExecutor + ?Sized,
    {
        let pending = self.begin_commit()?;
        let guard = CommitGuard {
            resume: Some(pending.resume),
            editor: self,
        };
        let reply = executor.invoke(pending.command.clone()).await;
        guard.finish(pending, reply)
    }

    fn discard(&mut self) {
        self.draft = None;
        self.dirty = false;
        self.state = DraftState::Closed;
    }

    fn require_state(&self, operation: &'static str, allowed: &[DraftState]) -> EditorResult<()> {
        if allowed.contains(&self.state) {
            return Ok(());
        }
        if self.state == DraftState::Committing {
            return Err(EditorError::Busy);
        }
        Err(EditorError::InvalidState {
            operation,
            state: self.state,
        })
    }
}

/// Puts an abandoned [`DraftEditor::commit`] back where it started.
struct CommitGuard<'a> {
    editor: &'a mut DraftEditor,
    resume: Option<DraftState>,
}

impl CommitGuard<'_> {
    fn finish(
        mut self,
        pending: PendingCommit,
        reply: Result<serde_json::Value, RemoteError>,
    ) -> EditorResult<Entity> {
        self.resume = None;
        self.editor.finish_commit(pending, reply)
    }
}

impl Drop for CommitGuard<'_> {
    fn drop(&mut self) {
        if let Some(resume) = self.resume.take() {
            warn!(kind = %self.editor.kind, state = %resume, "draft commit abandoned");
            self.editor.state = resume;
        }
    }
}

#[cfg(test)]
#[path = "tests/draft_tests.rs"]
mod tests;
