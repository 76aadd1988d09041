//! Persisted comment history.
//!
//! Appends and clears hold the write lock across the store write, so readers
//! see either the old or the new list, never something in between. The
//! in-memory list only changes after the store accepted the new document.

use crate::clock::Clock;
use crate::error::GameResult;
use crate::store::{DocumentStore, StoreError, COMMENTS_DOC};
use crate::types::CommentMessage;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

struct HistoryInner {
    messages: Vec<CommentMessage>,
    next_seq: u64,
}

pub struct CommentHistory {
    store: Arc<dyn DocumentStore>,
    /// Source of message timestamps
    clock: Arc<dyn Clock>,
    inner: RwLock<HistoryInner>,
    /// 0 = unbounded
    limit: usize,
}

impl CommentHistory {
    /// Load the history document. Entries written by older servers (bare
    /// payloads) are wrapped and numbered in file order.
    pub async fn load(
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        limit: usize,
    ) -> GameResult<Self> {
        let entries = match store.load(COMMENTS_DOC).await? {
            Some(Value::Array(entries)) => entries,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                return Err(crate::error::GameError::Configuration(format!(
                    "Comment history must be a JSON array, found {}",
                    other
                )))
            }
        };

        let mut messages = Vec::with_capacity(entries.len());
        let mut next_seq = 1;
        for entry in entries {
            let message = match serde_json::from_value::<CommentMessage>(entry.clone()) {
                Ok(message) if message.seq >= next_seq => message,
                _ => CommentMessage {
                    seq: next_seq,
                    ts: clock.now().to_rfc3339(),
                    payload: entry,
                },
            };
            next_seq = message.seq + 1;
            messages.push(message);
        }

        if limit > 0 && messages.len() > limit {
            let excess = messages.len() - limit;
            messages.drain(..excess);
        }

        tracing::info!("Loaded {} comments", messages.len());
        Ok(Self {
            store,
            clock,
            inner: RwLock::new(HistoryInner { messages, next_seq }),
            limit,
        })
    }

    /// Current history in delivery order
    pub async fn list(&self) -> Vec<CommentMessage> {
        self.inner.read().await.messages.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.messages.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.messages.is_empty()
    }

    /// Append a payload
    pub async fn append(&self, payload: Value) -> GameResult<CommentMessage> {
        self.append_with(payload, |_| {}).await
    }

    /// Append a payload and run `on_commit` while still holding the write
    /// lock, so nothing else can read or append in between.
    pub(crate) async fn append_with<F>(&self, payload: Value, on_commit: F) -> GameResult<CommentMessage>
    where
        F: FnOnce(&CommentMessage),
    {
        let mut inner = self.inner.write().await;

        let message = CommentMessage {
            seq: inner.next_seq,
            ts: self.clock.now().to_rfc3339(),
            payload,
        };

        let mut next = inner.messages.clone();
        next.push(message.clone());
        if self.limit > 0 && next.len() > self.limit {
            let excess = next.len() - self.limit;
            next.drain(..excess);
        }

        self.store
            .save(
                COMMENTS_DOC,
                &serde_json::to_value(&next).map_err(StoreError::from)?,
            )
            .await?;

        inner.messages = next;
        inner.next_seq += 1;
        on_commit(&message);
        Ok(message)
    }

    /// Run `f` against the history under the read lock. No append or clear
    /// can happen until `f` returns.
    pub(crate) async fn read_with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&[CommentMessage]) -> R,
    {
        let inner = self.inner.read().await;
        f(&inner.messages)
    }

    /// Empty the history. The store is written first; on failure the
    /// in-memory list is left as it was.
    pub async fn clear(&self) -> GameResult<()> {
        let mut inner = self.inner.write().await;
        self.store
            .save(COMMENTS_DOC, &Value::Array(Vec::new()))
            .await?;
        inner.messages.clear();
        tracing::info!("Comment history cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::error::GameError;
    use crate::store::MemoryStore;
    use chrono::NaiveDate;
    use serde_json::json;

    fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::new(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()))
    }

    async fn history(limit: usize) -> (CommentHistory, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let history = CommentHistory::load(store.clone(), clock(), limit)
            .await
            .unwrap();
        (history, store)
    }

    #[tokio::test]
    async fn test_append_preserves_order() {
        let (history, _) = history(0).await;
        history.append(json!("a")).await.unwrap();
        history.append(json!("b")).await.unwrap();
        history.append(json!("c")).await.unwrap();

        let list = history.list().await;
        let payloads: Vec<_> = list.iter().map(|m| m.payload.clone()).collect();
        assert_eq!(payloads, vec![json!("a"), json!("b"), json!("c")]);
        assert!(list.windows(2).all(|w| w[0].seq < w[1].seq));
    }

    #[tokio::test]
    async fn test_append_is_persisted() {
        let (history, store) = history(0).await;
        history.append(json!({"text": "hello"})).await.unwrap();

        let reloaded = CommentHistory::load(store, clock(), 0).await.unwrap();
        let list = reloaded.list().await;
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].payload["text"], "hello");

        // Sequence keeps counting after reload
        let next = reloaded.append(json!("again")).await.unwrap();
        assert_eq!(next.seq, 2);
    }

    #[tokio::test]
    async fn test_clear_empties_memory_and_store() {
        let (history, store) = history(0).await;
        history.append(json!(1)).await.unwrap();
        history.clear().await.unwrap();

        assert!(history.is_empty().await);
        assert_eq!(store.load(COMMENTS_DOC).await.unwrap(), Some(json!([])));
    }

    #[tokio::test]
    async fn test_failed_clear_keeps_memory_and_store_in_step() {
        let (history, store) = history(0).await;
        history.append(json!("yesterday")).await.unwrap();

        store.fail_next_saves(COMMENTS_DOC, 1);
        assert!(matches!(history.clear().await, Err(GameError::Persistence(_))));
        assert_eq!(history.len().await, 1);
        assert_eq!(store.load(COMMENTS_DOC).await.unwrap().unwrap().as_array().unwrap().len(), 1);

        history.clear().await.unwrap();
        assert!(history.is_empty().await);
    }

    #[tokio::test]
    async fn test_timestamps_come_from_clock() {
        let store = Arc::new(MemoryStore::new());
        let clock = clock();
        let history = CommentHistory::load(store, clock.clone(), 0).await.unwrap();

        let first = history.append(json!("a")).await.unwrap();
        assert_eq!(first.ts, "2025-06-01T00:00:00+00:00");

        clock.advance_days(1);
        let second = history.append(json!("b")).await.unwrap();
        assert_eq!(second.ts, "2025-06-02T00:00:00+00:00");
    }

    #[tokio::test]
    async fn test_failed_append_leaves_history_unchanged() {
        let (history, store) = history(0).await;
        history.append(json!("kept")).await.unwrap();

        store.set_fail_writes(true);
        let result = history.append(json!("lost")).await;
        assert!(matches!(result, Err(GameError::Persistence(_))));
        assert_eq!(history.len().await, 1);

        store.set_fail_writes(false);
        let message = history.append(json!("next")).await.unwrap();
        assert_eq!(message.seq, 2);
    }

    #[tokio::test]
    async fn test_limit_drops_oldest() {
        let (history, _) = history(3).await;
        for i in 0..5 {
            history.append(json!(i)).await.unwrap();
        }
        let payloads: Vec<_> = history.list().await.into_iter().map(|m| m.payload).collect();
        assert_eq!(payloads, vec![json!(2), json!(3), json!(4)]);
    }

    #[tokio::test]
    async fn test_load_wraps_legacy_entries() {
        let store = Arc::new(MemoryStore::with_docs([(
            COMMENTS_DOC.to_string(),
            json!([{"user": "ann", "text": "hi"}, {"user": "bo", "text": "yo"}]),
        )]));
        let history = CommentHistory::load(store, clock(), 0).await.unwrap();
        let list = history.list().await;
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].seq, 1);
        assert_eq!(list[1].payload["user"], "bo");
    }

    #[tokio::test]
    async fn test_load_rejects_non_array() {
        let store = Arc::new(MemoryStore::with_docs([(
            COMMENTS_DOC.to_string(),
            json!({"oops": true}),
        )]));
        assert!(matches!(
            CommentHistory::load(store, clock(), 0).await,
            Err(GameError::Configuration(_))
        ));
    }
}
