//! Live tail fan-out (spec §4.4, design note in §9): SSE clients register
//! a bounded channel and a filter; new rows are offered non-blockingly to
//! every matching client after the ingest transaction commits. A full
//! channel means that client is dropped for, never that ingest blocks.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

pub const MAX_CONCURRENT_CLIENTS: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct LogRow {
    pub id: i64,
    pub timestamp: String,
    pub container: String,
    pub stream: String,
    pub level: String,
    pub message: String,
    pub raw: String,
}

#[derive(Debug, Clone, Default)]
pub struct TailFilter {
    pub container: Option<String>,
    pub level: Option<String>,
}

impl TailFilter {
    fn matches(&self, row: &LogRow) -> bool {
        if let Some(c) = &self.container {
            if c != &row.container {
                return false;
            }
        }
        if let Some(l) = &self.level {
            if l != &row.level {
                return false;
            }
        }
        true
    }
}

struct Client {
    sender: mpsc::Sender<LogRow>,
    filter: TailFilter,
}

#[derive(Clone, Default)]
pub struct TailRegistry {
    clients: Arc<DashMap<Uuid, Client>>,
    active: Arc<AtomicUsize>,
}

impl TailRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Register a new tail client, returning its id and receiver, or
    /// `None` if the concurrent-client cap (spec §4.4: 5) is already hit.
    pub fn register(&self, filter: TailFilter, buffer: usize) -> Option<(Uuid, mpsc::Receiver<LogRow>)> {
        if self.active.load(Ordering::Relaxed) >= MAX_CONCURRENT_CLIENTS {
            return None;
        }
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(buffer.max(1));
        self.clients.insert(id, Client { sender: tx, filter });
        self.active.fetch_add(1, Ordering::Relaxed);
        Some((id, rx))
    }

    pub fn unregister(&self, id: Uuid) {
        if self.clients.remove(&id).is_some() {
            self.active.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Offer `row` to every matching client without blocking. A client
    /// whose channel is full simply misses this row.
    pub fn broadcast(&self, row: &LogRow) {
        for entry in self.clients.iter() {
            let client = entry.value();
            if client.filter.matches(row) {
                let _ = client.sender.try_send(row.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(container: &str, level: &str) -> LogRow {
        LogRow {
            id: 1,
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            container: container.to_string(),
            stream: "stdout".to_string(),
            level: level.to_string(),
            message: "hi".to_string(),
            raw: "{}".to_string(),
        }
    }

    #[tokio::test]
    async fn caps_at_five_concurrent_clients() {
        let registry = TailRegistry::new();
        let mut handles = Vec::new();
        for _ in 0..5 {
            let got = registry.register(TailFilter::default(), 8);
            assert!(got.is_some());
            handles.push(got.unwrap());
        }
        assert!(registry.register(TailFilter::default(), 8).is_none());
        registry.unregister(handles[0].0);
        assert!(registry.register(TailFilter::default(), 8).is_some());
    }

    #[tokio::test]
    async fn broadcast_respects_filter_and_is_non_blocking() {
        let registry = TailRegistry::new();
        let (id, mut rx) = registry.register(
            TailFilter { container: Some("web".to_string()), level: None },
            1,
        ).unwrap();
        registry.broadcast(&row("worker", "INFO"));
        assert!(rx.try_recv().is_err());
        registry.broadcast(&row("web", "ERROR"));
        let received = rx.recv().await.unwrap();
        assert_eq!(received.container, "web");
        registry.unregister(id);
    }

    #[tokio::test]
    async fn full_channel_drops_without_blocking() {
        let registry = TailRegistry::new();
        let (_id, _rx) = registry.register(TailFilter::default(), 1).unwrap();
        // fill the one slot, then broadcast again: must not block or panic
        registry.broadcast(&row("web", "INFO"));
        registry.broadcast(&row("web", "INFO"));
    }
}
