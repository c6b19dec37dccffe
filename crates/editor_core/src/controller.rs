//! Shared handle around a [`RowCollectionEditor`] for async shells.
//!
//! The lock is taken only to begin and to settle a change, never across the
//! executor call.

use std::sync::Arc;

use shared::{
    domain::{Entity, EntityId, FieldMap, Row},
    error::RemoteError,
    schema::EntityKind,
};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::{
    notice::{success_notice, Notice},
    rows::{PendingRow, RowCollectionEditor, RowOutcome},
    store::Subscription,
    CommandExecutor, EditorResult,
};

const NOTICE_CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct SharedRowEditor {
    inner: Arc<Mutex<RowCollectionEditor>>,
    executor: Arc<dyn CommandExecutor>,
    notices: broadcast::Sender<Notice>,
}

impl SharedRowEditor {
    pub fn new(editor: RowCollectionEditor, executor: Arc<dyn CommandExecutor>) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Mutex::new(editor)),
            executor,
            notices,
        }
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    pub async fn kind(&self) -> EntityKind {
        self.inner.lock().await.kind()
    }

    pub async fn rows(&self) -> Vec<Row> {
        self.inner.lock().await.rows().to_vec()
    }

    pub async fn is_in_flight(&self, id: &EntityId) -> bool {
        self.inner.lock().await.is_in_flight(id)
    }

    pub async fn reconcile(&self, external: Vec<Row>) {
        self.inner.lock().await.reconcile(external);
    }

    pub async fn add_row(&self, fields: FieldMap) -> EditorResult<RowOutcome> {
        let begun = self.inner.lock().await.begin_add(fields);
        self.run(begun).await
    }

    pub async fn update_row(&self, id: &EntityId, changes: FieldMap) -> EditorResult<RowOutcome> {
        let begun = self.inner.lock().await.begin_update(id, changes);
        self.run(begun).await
    }

    pub async fn delete_row(&self, id: &EntityId) -> EditorResult<RowOutcome> {
        let begun = self.inner.lock().await.begin_delete(id);
        self.run(begun).await
    }

    /// Invokes and settles on a spawned task, so the change is settled even
    /// when the caller stops waiting for it.
    async fn run(&self, begun: EditorResult<PendingRow>) -> EditorResult<RowOutcome> {
        let pending = match begun {
            Ok(pending) => pending,
            Err(error) => {
                let _ = self.notices.send(Notice::from_error(&error));
                return Err(error);
            }
        };
        let inner = Arc::clone(&self.inner);
        let executor = Arc::clone(&self.executor);
        let notices = self.notices.clone();
        let task = tokio::spawn(async move {
            let operation = pending.operation();
            let reply = executor.invoke(pending.command().clone()).await;

            let mut editor = inner.lock().await;
            let settled = editor.settle(pending, reply);
            let notice = match &settled {
                Ok(_) => success_notice(editor.kind(), operation, editor.context()),
                Err(error) => Notice::from_error(error),
            };
            drop(editor);
            let _ = notices.send(notice);
            settled
        });
        task.await.unwrap_or_else(|error| {
            warn!(%error, "row change task failed");
            Err(RemoteError::internal(format!("row change task failed: {error}")).into())
        })
    }

    /// Reconciles the row set with every snapshot the subscription delivers
    /// until the store closes it.
    pub fn spawn_reconcile_task<F>(&self, mut subscription: Subscription, mapper: F) -> JoinHandle<()>
    where
        F: Fn(Vec<Entity>) -> Vec<Row> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            while let Some(snapshot) = subscription.next().await {
                let rows = mapper(snapshot);
                inner.lock().await.reconcile(rows);
            }
            debug!(topic = %subscription.topic(), "reconcile task finished");
        })
    }
}

/// Default snapshot mapper: every entity that carries an id becomes a row.
pub fn rows_from_entities(entities: Vec<Entity>) -> Vec<Row> {
    entities
        .into_iter()
        .filter_map(|entity| match Row::try_from(entity) {
            Ok(row) => Some(row),
            Err(entity) => {
                warn!(fields = entity.fields.len(), "snapshot entity without id skipped");
                None
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
