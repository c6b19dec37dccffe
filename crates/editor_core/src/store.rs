use std::{
    collections::{BTreeMap, HashMap},
    fmt,
};

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use shared::domain::{Entity, EntityId, FieldValue};
use tokio::sync::{broadcast, RwLock};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, warn};

const SNAPSHOT_CHANNEL_CAPACITY: usize = 64;

/// A named publication plus its parameters, e.g. `peoples` for one company.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic {
    pub name: String,
    pub params: BTreeMap<String, String>,
}

impl Topic {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.params.is_empty() {
            let params = self
                .params
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect::<Vec<_>>()
                .join(",");
            write!(f, "({params})")?;
        }
        Ok(())
    }
}

/// Filter for [`ReactiveStore::query`]. An empty criteria matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Criteria {
    id: Option<EntityId>,
    equals: Vec<(String, FieldValue)>,
}

impl Criteria {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_id(id: impl Into<EntityId>) -> Self {
        Self {
            id: Some(id.into()),
            equals: Vec::new(),
        }
    }

    pub fn field_eq(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.equals.push((name.into(), value.into()));
        self
    }

    pub fn matches(&self, entity: &Entity) -> bool {
        if let Some(id) = &self.id {
            if entity.id.as_ref() != Some(id) {
                return false;
            }
        }
        self.equals
            .iter()
            .all(|(name, value)| entity.field(name) == Some(value))
    }
}

/// Live handle on one topic. Every item is the full current result set.
pub struct Subscription {
    topic: Topic,
    receiver: broadcast::Receiver<Vec<Entity>>,
}

impl Subscription {
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Next snapshot, or `None` once the store is gone. Snapshots missed while
    /// lagging are skipped.
    pub async fn next(&mut self) -> Option<Vec<Entity>> {
        loop {
            match self.receiver.recv().await {
                Ok(snapshot) => return Some(snapshot),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(topic = %self.topic, skipped, "subscription lagged; skipping stale snapshots");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = Vec<Entity>> + Send + 'static {
        BroadcastStream::new(self.receiver).filter_map(|item| async move {
            match item {
                Ok(snapshot) => Some(snapshot),
                Err(BroadcastStreamRecvError::Lagged(_)) => None,
            }
        })
    }
}

/// Subscription-backed live query source the editors reconcile from.
#[async_trait]
pub trait ReactiveStore: Send + Sync {
    async fn subscribe(&self, topic: &Topic) -> Subscription;
    async fn query(&self, topic: &Topic, criteria: &Criteria) -> Vec<Entity>;
}

struct TopicState {
    snapshot: Vec<Entity>,
    sender: broadcast::Sender<Vec<Entity>>,
}

impl TopicState {
    fn new() -> Self {
        let (sender, _) = broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY);
        Self {
            snapshot: Vec::new(),
            sender,
        }
    }
}

/// In-process store: whoever receives publication data calls
/// [`publish`](MemoryStore::publish) and every subscriber sees the snapshot.
#[derive(Default)]
pub struct MemoryStore {
    topics: RwLock<HashMap<Topic, TopicState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn publish(&self, topic: &Topic, entities: Vec<Entity>) {
        let mut topics = self.topics.write().await;
        let state = topics.entry(topic.clone()).or_insert_with(TopicState::new);
        state.snapshot = entities.clone();
        let receivers = state.sender.send(entities).unwrap_or(0);
        debug!(%topic, rows = state.snapshot.len(), receivers, "snapshot published");
    }
}

#[async_trait]
impl ReactiveStore for MemoryStore {
    async fn subscribe(&self, topic: &Topic) -> Subscription {
        let mut topics = self.topics.write().await;
        let state = topics.entry(topic.clone()).or_insert_with(TopicState::new);
        Subscription {
            topic: topic.clone(),
            receiver: state.sender.subscribe(),
        }
    }

    async fn query(&self, topic: &Topic, criteria: &Criteria) -> Vec<Entity> {
        let topics = self.topics.read().await;
        topics
            .get(topic)
            .map(|state| {
                state
                    .snapshot
                    .iter()
                    .filter(|entity| criteria.matches(entity))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
