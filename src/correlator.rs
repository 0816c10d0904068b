// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Matches response events to the oldest pending record for the same URL.

use crate::events::{RequestObserved, ResponseObserved};
use crate::record::{RecordId, TrafficRecord};
use crate::state::{CaptureStore, StoreError};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Outcome of handling a response event.
#[derive(Debug, Clone)]
pub enum Correlation {
    /// The oldest pending record for the URL was completed.
    Completed(Arc<TrafficRecord>),
    /// No pending record matched; the store was left untouched.
    Orphaned { url: String, status: u16 },
}

/// Turns proxy events into store mutations.
#[derive(Clone)]
pub struct Correlator {
    store: Arc<CaptureStore>,
    prettify: bool,
}

impl Correlator {
    pub fn new(store: Arc<CaptureStore>, prettify: bool) -> Self {
        Self { store, prettify }
    }

    /// Record a new pending exchange and queue it under its URL.
    pub fn on_request(&self, event: RequestObserved) -> RecordId {
        // Body formatting happens before taking the lock.
        let body = event
            .body
            .into_text(event.content_type.as_deref(), self.prettify);
        let record = TrafficRecord::new(event.method, event.url, event.headers_text, Some(body));
        let url = record.url.clone();

        let mut ledger = self.store.lock();
        let id = ledger.begin_record(record);
        ledger.enqueue_pending(&url, id);
        debug!(%id, %url, "request observed");
        id
    }

    /// Complete the oldest pending record for the response's URL.
    pub fn on_response(&self, event: ResponseObserved) -> Correlation {
        let body = event
            .body
            .into_text(event.content_type.as_deref(), self.prettify);

        let mut ledger = self.store.lock();
        let Some(id) = ledger.pop_pending(&event.url) else {
            ledger.note_orphan();
            drop(ledger);
            warn!(url = %event.url, status = event.status, "response without pending request, dropped");
            return Correlation::Orphaned {
                url: event.url,
                status: event.status,
            };
        };

        match ledger.complete_record(id, event.status, event.headers_text, Some(body)) {
            Ok(record) => {
                debug!(%id, url = %record.url, status = event.status, "response correlated");
                Correlation::Completed(record)
            }
            Err(e) => {
                // Ids leave the queue exactly once and `clear` empties the
                // queues with the records, so neither error can happen while
                // the queue and the store agree.
                ledger.note_orphan();
                drop(ledger);
                debug_assert!(
                    !matches!(e, StoreError::AlreadyCompleted(_)),
                    "pending queue held a completed record: {}",
                    e
                );
                match e {
                    StoreError::UnknownRecord(_) => {
                        debug!(error = %e, "record vanished before completion")
                    }
                    StoreError::AlreadyCompleted(_) => {
                        error!(error = %e, "pending queue held a completed record")
                    }
                }
                Correlation::Orphaned {
                    url: event.url,
                    status: event.status,
                }
            }
        }
    }
}
