//! Data-grid state: an ordered row set edited optimistically against the
//! backend.
//!
//! Updates and deletes are applied locally before the backend answers and
//! rolled back if it refuses. Adds wait for the backend, because only the
//! backend assigns identifiers. A row with a change in flight refuses further
//! updates and deletes until that change settles.

use std::collections::{HashMap, HashSet};

use shared::{
    domain::{EntityId, FieldMap, Row},
    error::RemoteError,
    protocol::{reply_identifier, Command},
    schema::{Editable, EntityKind, EntitySchema, InvalidValue, ValidationError},
};
use tracing::{debug, info, warn};

use crate::{
    commands::{build_command, Change, Operation},
    CommandExecutor, EditorContext, EditorError, EditorResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InFlight {
    Update,
    Delete,
}

#[derive(Debug)]
enum PendingChange {
    Add { ticket: u64, fields: FieldMap },
    Update { previous: Row },
    Delete { previous: Row, index: usize },
}

/// A row change whose command is on its way to the backend. It must be
/// handed back to [`RowCollectionEditor::settle`] exactly once, even when the
/// caller no longer cares about the outcome.
#[must_use = "a pending row change must be settled with RowCollectionEditor::settle"]
#[derive(Debug)]
pub struct PendingRow {
    command: Command,
    change: PendingChange,
}

impl PendingRow {
    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn operation(&self) -> Operation {
        match self.change {
            PendingChange::Add { .. } => Operation::Add,
            PendingChange::Update { .. } => Operation::Update,
            PendingChange::Delete { .. } => Operation::Delete,
        }
    }

    pub fn row_id(&self) -> Option<&EntityId> {
        match &self.change {
            PendingChange::Add { .. } => None,
            PendingChange::Update { previous } | PendingChange::Delete { previous, .. } => {
                Some(&previous.id)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Added(Row),
    Updated(Row),
    Deleted(EntityId),
}

#[derive(Debug)]
pub struct RowCollectionEditor {
    kind: EntityKind,
    context: EditorContext,
    rows: Vec<Row>,
    in_flight: HashMap<EntityId, InFlight>,
    pending_adds: HashSet<u64>,
    next_ticket: u64,
}

impl RowCollectionEditor {
    pub fn new(kind: EntityKind, context: EditorContext) -> Self {
        Self {
            kind,
            context,
            rows: Vec::new(),
            in_flight: HashMap::new(),
            pending_adds: HashSet::new(),
            next_ticket: 0,
        }
    }

    pub fn with_rows(kind: EntityKind, context: EditorContext, rows: Vec<Row>) -> Self {
        let mut editor = Self::new(kind, context);
        editor.reconcile(rows);
        editor
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn context(&self) -> &EditorContext {
        &self.context
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, id: &EntityId) -> Option<&Row> {
        self.rows.iter().find(|row| &row.id == id)
    }

    pub fn is_in_flight(&self, id: &EntityId) -> bool {
        self.in_flight.contains_key(id)
    }

    pub fn pending_count(&self) -> usize {
        self.in_flight.len() + self.pending_adds.len()
    }

    fn schema(&self) -> &'static EntitySchema {
        self.kind.schema()
    }

    fn position(&self, id: &EntityId) -> Option<usize> {
        self.rows.iter().position(|row| &row.id == id)
    }

    pub fn begin_add(&mut self, fields: FieldMap) -> EditorResult<PendingRow> {
        let (command, ticket, fields) = self.stage_add(fields)?;
        Ok(PendingRow {
            command,
            change: PendingChange::Add { ticket, fields },
        })
    }

    pub fn begin_update(&mut self, id: &EntityId, changes: FieldMap) -> EditorResult<PendingRow> {
        let (command, previous) = self.stage_update(id, changes)?;
        Ok(PendingRow {
            command,
            change: PendingChange::Update { previous },
        })
    }

    pub fn begin_delete(&mut self, id: &EntityId) -> EditorResult<PendingRow> {
        let (command, previous, index) = self.stage_delete(id)?;
        Ok(PendingRow {
            command,
            change: PendingChange::Delete { previous, index },
        })
    }

    fn stage_add(&mut self, fields: FieldMap) -> EditorResult<(Command, u64, FieldMap)> {
        self.check_known(&fields)?;
        let mut error = match self.schema().validate_complete(&fields) {
            Ok(()) => ValidationError::default(),
            Err(error) => error,
        };
        for name in fields.keys() {
            if let Some(spec) = self.schema().field(name) {
                if spec.editable == Editable::Never {
                    error.invalid.push(InvalidValue {
                        field: name.clone(),
                        problem: "is read-only".into(),
                    });
                }
            }
        }
        if !error.is_empty() {
            return Err(error.into());
        }

        let command = build_command(&self.context, self.kind, Change::Add(&fields))?;
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.pending_adds.insert(ticket);
        debug!(kind = %self.kind, command = %command.name, ticket, "row add queued");
        Ok((command, ticket, fields))
    }

    fn stage_update(&mut self, id: &EntityId, changes: FieldMap) -> EditorResult<(Command, Row)> {
        if self.is_in_flight(id) {
            return Err(EditorError::Conflict(id.clone()));
        }
        let index = self
            .position(id)
            .ok_or_else(|| EditorError::NotFound(id.clone()))?;
        self.check_known(&changes)?;

        let mut error = match self.schema().validate_partial(&changes) {
            Ok(()) => ValidationError::default(),
            Err(error) => error,
        };
        for name in changes.keys() {
            if let Some(spec) = self.schema().field(name) {
                if spec.editable != Editable::Always {
                    error.invalid.push(InvalidValue {
                        field: name.clone(),
                        problem: "cannot be changed once the row exists".into(),
                    });
                }
            }
        }
        if !error.is_empty() {
            return Err(error.into());
        }

        let previous = self.rows[index].clone();
        let mut merged = previous.fields.clone();
        merged.extend(changes);
        let command = build_command(&self.context, self.kind, Change::Update(id, &merged))?;

        self.rows[index].fields = merged;
        self.in_flight.insert(id.clone(), InFlight::Update);
        debug!(kind = %self.kind, command = %command.name, row_id = %id, "row update applied optimistically");
        Ok((command, previous))
    }

    fn stage_delete(&mut self, id: &EntityId) -> EditorResult<(Command, Row, usize)> {
        if self.is_in_flight(id) {
            return Err(EditorError::Conflict(id.clone()));
        }
        let index = self
            .position(id)
            .ok_or_else(|| EditorError::NotFound(id.clone()))?;
        let command = build_command(&self.context, self.kind, Change::Delete(id))?;

        let previous = self.rows.remove(index);
        self.in_flight.insert(id.clone(), InFlight::Delete);
        debug!(kind = %self.kind, command = %command.name, row_id = %id, "row removed optimistically");
        Ok((command, previous, index))
    }

    /// Applies the backend's answer to a pending change and clears its
    /// in-flight marker.
    pub fn settle(
        &mut self,
        pending: PendingRow,
        reply: Result<serde_json::Value, RemoteError>,
    ) -> EditorResult<RowOutcome> {
        let command = pending.command.name;
        match pending.change {
            PendingChange::Add { ticket, fields } => self
                .settle_add(&command, ticket, fields, reply)
                .map(RowOutcome::Added),
            PendingChange::Update { previous } => self
                .settle_update(&command, previous, reply)
                .map(RowOutcome::Updated),
            PendingChange::Delete { previous, index } => self
                .settle_delete(&command, previous, index, reply)
                .map(RowOutcome::Deleted),
        }
    }

    fn settle_add(
        &mut self,
        command: &str,
        ticket: u64,
        fields: FieldMap,
        reply: Result<serde_json::Value, RemoteError>,
    ) -> EditorResult<Row> {
        self.pending_adds.remove(&ticket);
        let reply = reply.map_err(|error| {
            warn!(kind = %self.kind, command, %error, "row add rejected");
            EditorError::Remote(error)
        })?;
        let Some(id) = reply_identifier(&reply) else {
            warn!(kind = %self.kind, command, "row add reply carried no identifier");
            return Err(RemoteError::internal(format!(
                "{command} did not return an identifier for the new row"
            ))
            .into());
        };

        let mut row = Row::new(id, fields);
        self.refresh_mirrors(&mut row);
        match self.position(&row.id) {
            Some(index) => self.rows[index] = row.clone(),
            None => self.rows.push(row.clone()),
        }
        info!(kind = %self.kind, command, row_id = %row.id, "row added");
        Ok(row)
    }

    fn settle_update(
        &mut self,
        command: &str,
        previous: Row,
        reply: Result<serde_json::Value, RemoteError>,
    ) -> EditorResult<Row> {
        self.in_flight.remove(&previous.id);
        let index = self.position(&previous.id);
        match reply {
            Ok(_) => {
                let row = match index {
                    Some(index) => {
                        let mut row = self.rows[index].clone();
                        self.refresh_mirrors(&mut row);
                        self.rows[index] = row.clone();
                        row
                    }
                    None => previous,
                };
                info!(kind = %self.kind, command, row_id = %row.id, "row update confirmed");
                Ok(row)
            }
            Err(error) => {
                warn!(kind = %self.kind, command, row_id = %previous.id, %error, "row update rolled back");
                match index {
                    Some(index) => self.rows[index] = previous,
                    None => self.rows.push(previous),
                }
                Err(EditorError::Remote(error))
            }
        }
    }

    fn settle_delete(
        &mut self,
        command: &str,
        previous: Row,
        index: usize,
        reply: Result<serde_json::Value, RemoteError>,
    ) -> EditorResult<EntityId> {
        self.in_flight.remove(&previous.id);
        match reply {
            Ok(_) => {
                info!(kind = %self.kind, command, row_id = %previous.id, "row delete confirmed");
                Ok(previous.id)
            }
            Err(error) => {
                warn!(kind = %self.kind, command, row_id = %previous.id, %error, "row delete rolled back");
                if self.position(&previous.id).is_none() {
                    let index = index.min(self.rows.len());
                    self.rows.insert(index, previous);
                }
                Err(EditorError::Remote(error))
            }
        }
    }

    /// Replaces the row set with a fresh snapshot from the store. Rows with a
    /// change in flight keep their local value: pending updates stay as
    /// edited, pending deletes stay removed.
    pub fn reconcile(&mut self, external: Vec<Row>) {
        let mut seen = HashSet::with_capacity(external.len());
        let mut next = Vec::with_capacity(external.len());
        for row in external {
            if !seen.insert(row.id.clone()) {
                warn!(kind = %self.kind, row_id = %row.id, "duplicate row in snapshot ignored");
                continue;
            }
            match self.in_flight.get(&row.id) {
                Some(InFlight::Delete) => {}
                Some(InFlight::Update) => match self.row(&row.id) {
                    Some(local) => next.push(local.clone()),
                    None => next.push(row),
                },
                None => next.push(row),
            }
        }
        for local in &self.rows {
            if self.in_flight.get(&local.id) == Some(&InFlight::Update) && !seen.contains(&local.id)
            {
                next.push(local.clone());
            }
        }
        debug!(kind = %self.kind, rows = next.len(), in_flight = self.in_flight.len(), "rows reconciled");
        self.rows = next;
    }

    pub async fn add_row<E>(&mut self, executor: &E, fields: FieldMap) -> EditorResult<Row>
    where
        E: CommandExecutor + ?Sized,
    {
        let (command, ticket, fields) = self.stage_add(fields)?;
        let reply = executor.invoke(command.clone()).await;
        self.settle_add(&command.name, ticket, fields, reply)
    }

    pub async fn update_row<E>(
        &mut self,
        executor: &E,
        id: &EntityId,
        changes: FieldMap,
    ) -> EditorResult<Row>
    where
        E: CommandExecutor + ?Sized,
    {
        let (command, previous) = self.stage_update(id, changes)?;
        let reply = executor.invoke(command.clone()).await;
        self.settle_update(&command.name, previous, reply)
    }

    pub async fn delete_row<E>(&mut self, executor: &E, id: &EntityId) -> EditorResult<EntityId>
    where
        E: CommandExecutor + ?Sized,
    {
        let (command, previous, index) = self.stage_delete(id)?;
        let reply = executor.invoke(command.clone()).await;
        self.settle_delete(&command.name, previous, index, reply)
    }

    fn check_known(&self, fields: &FieldMap) -> EditorResult<()> {
        match self.schema().first_unknown(fields) {
            Some(field) => Err(EditorError::InvalidField {
                kind: self.kind,
                field: field.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn refresh_mirrors(&self, row: &mut Row) {
        for spec in self.schema().fields {
            if let Some(source) = spec.mirrors {
                if let Some(value) = row.fields.get(source).cloned() {
                    row.fields.insert(spec.name.to_string(), value);
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/rows_tests.rs"]
mod tests;
