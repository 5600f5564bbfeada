//! Local-path → sandbox-path mapping table.
//!
//! One table per process, shared by every request handler. Writes come only
//! from successful uploads. The table is bounded: the oldest insertion is
//! evicted past `max_entries`, and entries older than `ttl` read as absent.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::types::PathMapConfig;

#[derive(Debug)]
struct Entry {
    remote: String,
    recorded_at: Instant,
    seq: u64,
}

#[derive(Debug, Default)]
struct Table {
    entries: HashMap<String, Entry>,
    /// Insertion order as (key, seq); stale pairs left by overwrites are skipped.
    order: VecDeque<(String, u64)>,
    next_seq: u64,
}

impl Table {
    fn evict_oldest(&mut self) -> Option<String> {
        while let Some((key, seq)) = self.order.pop_front() {
            if self.entries.get(&key).map(|e| e.seq) == Some(seq) {
                self.entries.remove(&key);
                return Some(key);
            }
        }
        None
    }

    fn prune_expired(&mut self, now: Instant, ttl: Duration) {
        while let Some((key, seq)) = self.order.front() {
            match self.entries.get(key) {
                Some(e) if e.seq == *seq => {
                    if now.duration_since(e.recorded_at) < ttl {
                        break;
                    }
                    let key = key.clone();
                    self.entries.remove(&key);
                }
                _ => {}
            }
            self.order.pop_front();
        }
    }

    fn compact_order(&mut self) {
        let mut live: Vec<(String, u64)> = self
            .entries
            .iter()
            .map(|(k, e)| (k.clone(), e.seq))
            .collect();
        live.sort_by_key(|(_, seq)| *seq);
        self.order = live.into();
    }
}

/// Concurrency-safe, bounded path mapping.
#[derive(Debug)]
pub struct PathVirtualizer {
    table: RwLock<Table>,
    max_entries: usize,
    ttl: Duration,
}

impl PathVirtualizer {
    pub fn new(config: &PathMapConfig) -> Self {
        Self {
            table: RwLock::new(Table::default()),
            max_entries: config.max_entries.max(1),
            ttl: config.ttl,
        }
    }

    /// Map `local` to `remote`, replacing any previous mapping for `local`.
    pub async fn record(&self, local: impl Into<String>, remote: impl Into<String>) {
        let local = local.into();
        let remote = remote.into();
        let now = Instant::now();

        let mut table = self.table.write().await;
        table.prune_expired(now, self.ttl);

        let seq = table.next_seq;
        table.next_seq += 1;
        table.entries.insert(
            local.clone(),
            Entry {
                remote: remote.clone(),
                recorded_at: now,
                seq,
            },
        );
        table.order.push_back((local.clone(), seq));

        while table.entries.len() > self.max_entries {
            match table.evict_oldest() {
                Some(evicted) => tracing::debug!(local = %evicted, "path mapping evicted (capacity)"),
                None => break,
            }
        }
        if table.order.len() > self.max_entries * 2 {
            table.compact_order();
        }

        tracing::debug!(local = %local, remote = %remote, "path mapping recorded");
    }

    /// Mapped remote path for `local`, if one is recorded and still fresh.
    pub async fn lookup(&self, local: &str) -> Option<String> {
        let table = self.table.read().await;
        let entry = table.entries.get(local)?;
        if entry.recorded_at.elapsed() >= self.ttl {
            return None;
        }
        Some(entry.remote.clone())
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn virtualizer(max_entries: usize, ttl: Duration) -> PathVirtualizer {
        PathVirtualizer::new(&PathMapConfig { max_entries, ttl })
    }

    #[tokio::test]
    async fn test_record_then_lookup() {
        let paths = virtualizer(16, Duration::from_secs(60));
        paths.record("/tmp/a.bin", "/sandbox/abc123").await;
        assert_eq!(paths.lookup("/tmp/a.bin").await.as_deref(), Some("/sandbox/abc123"));
        assert_eq!(paths.lookup("/tmp/other.bin").await, None);
    }

    #[tokio::test]
    async fn test_record_overwrites() {
        let paths = virtualizer(16, Duration::from_secs(60));
        paths.record("/tmp/a.bin", "/sandbox/first").await;
        paths.record("/tmp/a.bin", "/sandbox/second").await;
        assert_eq!(paths.lookup("/tmp/a.bin").await.as_deref(), Some("/sandbox/second"));
        assert_eq!(paths.len().await, 1);
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest_insertion() {
        let paths = virtualizer(2, Duration::from_secs(60));
        paths.record("a", "/sandbox/a").await;
        paths.record("b", "/sandbox/b").await;
        // Re-recording `a` makes `b` the oldest.
        paths.record("a", "/sandbox/a2").await;
        paths.record("c", "/sandbox/c").await;

        assert_eq!(paths.len().await, 2);
        assert_eq!(paths.lookup("b").await, None);
        assert_eq!(paths.lookup("a").await.as_deref(), Some("/sandbox/a2"));
        assert_eq!(paths.lookup("c").await.as_deref(), Some("/sandbox/c"));
    }

    #[tokio::test]
    async fn test_repeated_overwrites_keep_order_bounded() {
        let paths = virtualizer(4, Duration::from_secs(60));
        for i in 0..100 {
            paths.record("same", format!("/sandbox/{i}")).await;
        }
        assert_eq!(paths.lookup("same").await.as_deref(), Some("/sandbox/99"));
        assert!(paths.table.read().await.order.len() <= 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_read_as_absent() {
        let paths = virtualizer(16, Duration::from_secs(10));
        paths.record("old", "/sandbox/old").await;
        tokio::time::advance(Duration::from_secs(11)).await;

        assert_eq!(paths.lookup("old").await, None);

        paths.record("new", "/sandbox/new").await;
        assert_eq!(paths.len().await, 1, "expired entry pruned on write");
        assert_eq!(paths.lookup("new").await.as_deref(), Some("/sandbox/new"));
    }

    #[tokio::test]
    async fn test_concurrent_writers_and_readers() {
        let paths = std::sync::Arc::new(virtualizer(1024, Duration::from_secs(60)));
        let mut handles = Vec::new();
        for i in 0..32 {
            let paths = paths.clone();
            handles.push(tokio::spawn(async move {
                let local = format!("/tmp/{i}");
                paths.record(local.clone(), format!("/sandbox/{i}")).await;
                paths.lookup(&local).await
            }));
        }
        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await.unwrap(), Some(format!("/sandbox/{i}")));
        }
        assert_eq!(paths.len().await, 32);
    }
}
