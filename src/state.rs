// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Capture store: the append-only, ordered set of traffic records.
//!
//! A single mutex guards both the records and the per-URL queues of pending
//! record ids used by the correlator, so that appending a record and
//! enqueueing it (or popping an id and completing its record) are atomic with
//! respect to each other. Readers take a snapshot under the lock and work on
//! it lock-free. Records are stored behind `Arc`; completing one replaces it
//! copy-on-write, so snapshots are cheap and never observe a half-written
//! record.

use crate::record::{RecordId, ResponseInfo, TrafficRecord};
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

/// Store invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The record is not (or no longer) in the store, e.g. after `clear`.
    #[error("record {0} is not in the store")]
    UnknownRecord(RecordId),
    /// The record already has a response; completion happens exactly once.
    #[error("record {0} is already completed")]
    AlreadyCompleted(RecordId),
}

/// State guarded by the store lock.
#[derive(Debug, Default)]
pub struct Ledger {
    records: Vec<Arc<TrafficRecord>>,
    positions: HashMap<RecordId, usize>,
    pending: HashMap<String, VecDeque<RecordId>>,
    revision: u64,
    orphaned: u64,
}

impl Ledger {
    /// Append a record, returning its id.
    pub fn begin_record(&mut self, record: TrafficRecord) -> RecordId {
        let id = record.id;
        self.positions.insert(id, self.records.len());
        self.records.push(Arc::new(record));
        self.revision += 1;
        id
    }

    /// Set the response half of a pending record.
    pub fn complete_record(
        &mut self,
        id: RecordId,
        status: u16,
        headers_text: String,
        body_text: Option<String>,
    ) -> Result<Arc<TrafficRecord>, StoreError> {
        let pos = *self
            .positions
            .get(&id)
            .ok_or(StoreError::UnknownRecord(id))?;
        let slot = &mut self.records[pos];
        if !slot.is_pending() {
            return Err(StoreError::AlreadyCompleted(id));
        }

        let completed_at = Utc::now();
        let duration_ms = completed_at
            .signed_duration_since(slot.observed_at)
            .num_milliseconds()
            .max(0) as u64;
        Arc::make_mut(slot).response = Some(ResponseInfo {
            status,
            headers_text,
            body_text: body_text.unwrap_or_else(|| crate::record::NO_BODY.to_string()),
            completed_at,
            duration_ms,
        });
        self.revision += 1;
        Ok(slot.clone())
    }

    /// Queue a pending record id under its URL.
    pub fn enqueue_pending(&mut self, url: &str, id: RecordId) {
        self.pending.entry(url.to_string()).or_default().push_back(id);
    }

    /// Pop the oldest pending id for `url`, if any.
    pub fn pop_pending(&mut self, url: &str) -> Option<RecordId> {
        let queue = self.pending.get_mut(url)?;
        let id = queue.pop_front();
        if queue.is_empty() {
            self.pending.remove(url);
        }
        id
    }

    /// Count a response that had no pending record to complete.
    pub fn note_orphan(&mut self) {
        self.orphaned += 1;
    }

    fn clear(&mut self) {
        self.records.clear();
        self.positions.clear();
        self.pending.clear();
        self.revision += 1;
    }
}

/// Lock guard that publishes the store revision when it is released.
pub struct LedgerGuard<'a> {
    ledger: MutexGuard<'a, Ledger>,
    changes: &'a watch::Sender<u64>,
    revision_at_lock: u64,
}

impl Deref for LedgerGuard<'_> {
    type Target = Ledger;

    fn deref(&self) -> &Ledger {
        &self.ledger
    }
}

impl DerefMut for LedgerGuard<'_> {
    fn deref_mut(&mut self) -> &mut Ledger {
        &mut self.ledger
    }
}

impl Drop for LedgerGuard<'_> {
    fn drop(&mut self) {
        if self.ledger.revision != self.revision_at_lock {
            self.changes.send_replace(self.ledger.revision);
        }
    }
}

/// Thread-safe capture store.
pub struct CaptureStore {
    ledger: Mutex<Ledger>,
    changes: watch::Sender<u64>,
}

impl Default for CaptureStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureStore {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            ledger: Mutex::new(Ledger::default()),
            changes,
        }
    }

    /// Take the store lock. Mutations made through the guard are published
    /// to subscribers when it drops.
    pub fn lock(&self) -> LedgerGuard<'_> {
        let ledger = self.ledger.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("CaptureStore lock poisoned, recovering");
            poisoned.into_inner()
        });
        let revision_at_lock = ledger.revision;
        LedgerGuard {
            ledger,
            changes: &self.changes,
            revision_at_lock,
        }
    }

    /// Append a new pending record.
    pub fn begin_record(
        &self,
        method: String,
        url: String,
        request_headers_text: String,
        request_body_text: Option<String>,
    ) -> RecordId {
        let record = TrafficRecord::new(method, url, request_headers_text, request_body_text);
        self.lock().begin_record(record)
    }

    /// Complete a pending record. Fails if the record is unknown or was
    /// already completed.
    pub fn complete_record(
        &self,
        id: RecordId,
        status: u16,
        response_headers_text: String,
        response_body_text: Option<String>,
    ) -> Result<Arc<TrafficRecord>, StoreError> {
        self.lock()
            .complete_record(id, status, response_headers_text, response_body_text)
    }

    /// Point-in-time copy of all records in arrival order.
    pub fn snapshot(&self) -> Vec<Arc<TrafficRecord>> {
        self.lock().records.clone()
    }

    /// Snapshot together with the revision it reflects.
    pub fn snapshot_with_revision(&self) -> (u64, Vec<Arc<TrafficRecord>>) {
        let ledger = self.lock();
        (ledger.revision, ledger.records.clone())
    }

    pub fn get(&self, id: RecordId) -> Option<Arc<TrafficRecord>> {
        let ledger = self.lock();
        ledger
            .positions
            .get(&id)
            .map(|&pos| ledger.records[pos].clone())
    }

    /// Drop every record and every pending correlation.
    pub fn clear(&self) {
        self.lock().clear();
        tracing::debug!("capture store cleared");
    }

    /// Monotonic counter bumped on every mutation.
    pub fn revision(&self) -> u64 {
        self.lock().revision
    }

    /// Receive the revision after each mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of ids still waiting for a response, across all URLs.
    pub fn pending_count(&self) -> usize {
        self.lock().pending.values().map(VecDeque::len).sum()
    }

    /// Responses dropped because no pending record matched their URL.
    pub fn orphaned_responses(&self) -> u64 {
        self.lock().orphaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::begin_test_record;
    use std::thread;

    #[test]
    fn begin_appends_in_order_with_unique_ids() {
        let store = CaptureStore::new();
        let a = begin_test_record(&store, "http://a.example/1");
        let b = begin_test_record(&store, "http://a.example/2");
        assert_ne!(a, b);

        let snap = store.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].id, a);
        assert_eq!(snap[1].id, b);
        assert!(snap.iter().all(|r| r.is_pending()));
    }

    #[test]
    fn complete_sets_response_once() -> anyhow::Result<()> {
        let store = CaptureStore::new();
        let id = begin_test_record(&store, "http://a.example/");

        let done = store.complete_record(id, 201, "HTTP/1.1 201 Created\n".into(), None)?;
        assert_eq!(done.status(), Some(201));
        assert_eq!(done.response_body_text(), crate::record::NO_BODY);

        let again = store.complete_record(id, 500, String::new(), None);
        assert_eq!(again.unwrap_err(), StoreError::AlreadyCompleted(id));
        assert_eq!(store.get(id).and_then(|r| r.status()), Some(201));
        Ok(())
    }

    #[test]
    fn complete_unknown_record_is_an_error() {
        let store = CaptureStore::new();
        let id = uuid::Uuid::new_v4();
        assert_eq!(
            store.complete_record(id, 200, String::new(), None).unwrap_err(),
            StoreError::UnknownRecord(id)
        );
    }

    #[test]
    fn snapshot_is_not_affected_by_later_completion() -> anyhow::Result<()> {
        let store = CaptureStore::new();
        let id = begin_test_record(&store, "http://a.example/");
        let before = store.snapshot();
        store.complete_record(id, 200, String::new(), Some("ok".into()))?;

        assert!(before[0].is_pending());
        assert_eq!(store.snapshot()[0].status(), Some(200));
        Ok(())
    }

    #[test]
    fn clear_empties_records_and_pending_queues() {
        let store = CaptureStore::new();
        let id = begin_test_record(&store, "http://a.example/");
        store.lock().enqueue_pending("http://a.example/", id);
        assert_eq!(store.pending_count(), 1);

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.pending_count(), 0);
        assert!(store.get(id).is_none());
        assert_eq!(
            store.complete_record(id, 200, String::new(), None).unwrap_err(),
            StoreError::UnknownRecord(id)
        );
    }

    #[test]
    fn pending_queue_is_fifo_and_drops_empty_entries() {
        let store = CaptureStore::new();
        let mut ledger = store.lock();
        let a = uuid::Uuid::new_v4();
        let b = uuid::Uuid::new_v4();
        ledger.enqueue_pending("u", a);
        ledger.enqueue_pending("u", b);
        assert_eq!(ledger.pop_pending("u"), Some(a));
        assert_eq!(ledger.pop_pending("u"), Some(b));
        assert_eq!(ledger.pop_pending("u"), None);
        assert!(ledger.pending.is_empty());
    }

    #[test]
    fn revision_bumps_on_every_mutation() -> anyhow::Result<()> {
        let store = CaptureStore::new();
        let r0 = store.revision();
        let id = begin_test_record(&store, "http://a.example/");
        let r1 = store.revision();
        store.complete_record(id, 200, String::new(), None)?;
        let r2 = store.revision();
        store.clear();
        let r3 = store.revision();
        assert!(r0 < r1 && r1 < r2 && r2 < r3);

        // Reads do not bump it.
        let _ = store.snapshot();
        assert_eq!(store.revision(), r3);
        Ok(())
    }

    #[tokio::test]
    async fn subscribers_see_new_revisions() {
        let store = CaptureStore::new();
        let mut rx = store.subscribe();
        begin_test_record(&store, "http://a.example/");
        rx.changed().await.expect("sender alive");
        assert_eq!(*rx.borrow(), store.revision());
    }

    #[test]
    fn concurrent_begin_keeps_ids_unique_and_snapshots_consistent() {
        let store = Arc::new(CaptureStore::new());
        let mut handles = Vec::new();
        for t in 0..8 {
            let store = store.clone();
            handles.push(thread::spawn(move || {
                for i in 0..50 {
                    begin_test_record(&store, &format!("http://t{}.example/{}", t, i));
                    let snap = store.snapshot();
                    assert!(snap.iter().all(|r| r.is_pending()));
                }
            }));
        }
        for h in handles {
            h.join().expect("thread panicked");
        }

        let snap = store.snapshot();
        assert_eq!(snap.len(), 400);
        let ids: std::collections::HashSet<_> = snap.iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), 400);

        // Per-thread arrival order is preserved.
        let t0: Vec<_> = snap
            .iter()
            .filter(|r| r.url.starts_with("http://t0."))
            .map(|r| r.url.clone())
            .collect();
        let expected: Vec<_> = (0..50).map(|i| format!("http://t0.example/{}", i)).collect();
        assert_eq!(t0, expected);
    }
}
