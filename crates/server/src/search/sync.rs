//! Incremental index updates after database writes.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{IndexDocument, SearchIndex};

/// A change to apply to the index.
#[derive(Debug)]
pub enum IndexEvent {
    Upsert(IndexDocument),
    Delete(Uuid),
}

/// Handle for queueing index changes. Cheap to clone.
///
/// Events are applied in order by a single worker task. Failures are
/// logged and never reach the caller; a full rebuild repairs any drift.
#[derive(Clone)]
pub struct SearchSync {
    tx: mpsc::UnboundedSender<IndexEvent>,
}

impl SearchSync {
    /// Start the worker. It exits once every handle has been dropped and the
    /// queue is drained.
    #[must_use]
    pub fn spawn(index: SearchIndex) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(index, rx));
        (Self { tx }, handle)
    }

    pub fn upsert(&self, doc: impl Into<IndexDocument>) {
        self.send(IndexEvent::Upsert(doc.into()));
    }

    pub fn delete(&self, id: impl Into<Uuid>) {
        self.send(IndexEvent::Delete(id.into()));
    }

    fn send(&self, event: IndexEvent) {
        if let Err(e) = self.tx.send(event) {
            warn!(event = ?e.0, "Search sync worker has stopped; dropping event");
        }
    }
}

async fn run(index: SearchIndex, mut rx: mpsc::UnboundedReceiver<IndexEvent>) {
    while let Some(event) = rx.recv().await {
        let index = index.clone();
        let result = tokio::task::spawn_blocking(move || match event {
            IndexEvent::Upsert(doc) => index.upsert(&doc),
            IndexEvent::Delete(id) => index.delete(id),
        })
        .await;

        match result {
            Ok(Ok(())) => debug!("Applied search index event"),
            Ok(Err(e)) => warn!(error = %e, "Failed to apply search index event"),
            Err(e) => warn!(error = %e, "Search index task panicked"),
        }
    }
    debug!("Search sync worker stopped");
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::search::Collection;

    fn doc(name: &str) -> IndexDocument {
        IndexDocument {
            collection: Collection::Parts,
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: String::new(),
            mpn: None,
            parent_id: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_events_are_applied_in_order() {
        let index = SearchIndex::new().expect("index");
        let (sync, worker) = SearchSync::spawn(index.clone());

        let kept = doc("Capacitor 100nF");
        let removed = doc("Resistor 10k");
        sync.upsert(kept.clone());
        sync.upsert(removed.clone());
        sync.delete(removed.id);
        drop(sync);
        worker.await.expect("worker");

        let hits = index
            .search(Collection::Parts, "", None, 10)
            .expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, kept.id);
    }
}
