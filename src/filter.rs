// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Domain/protocol filtering over store snapshots.

use crate::record::{Protocol, RecordId, TrafficRecord};
use crate::state::CaptureStore;
use serde::Deserialize;
use std::sync::Arc;

/// Protocol half of a filter predicate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolFilter {
    #[default]
    All,
    Http,
    Https,
}

impl ProtocolFilter {
    pub fn matches(&self, protocol: Protocol) -> bool {
        match self {
            ProtocolFilter::All => true,
            ProtocolFilter::Http => protocol == Protocol::Http,
            ProtocolFilter::Https => protocol == Protocol::Https,
        }
    }
}

impl std::str::FromStr for ProtocolFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "" => Ok(ProtocolFilter::All),
            "http" => Ok(ProtocolFilter::Http),
            "https" => Ok(ProtocolFilter::Https),
            other => Err(anyhow::anyhow!("unknown protocol filter: {}", other)),
        }
    }
}

/// Case-insensitive URL substring plus protocol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterPredicate {
    domain: String,
    pub protocol: ProtocolFilter,
}

impl FilterPredicate {
    pub fn new(domain: &str, protocol: ProtocolFilter) -> Self {
        Self {
            domain: domain.trim().to_lowercase(),
            protocol,
        }
    }

    /// Predicate that matches every record.
    pub fn all() -> Self {
        Self::default()
    }

    /// The normalized (trimmed, lowercased) domain substring.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn matches(&self, record: &TrafficRecord) -> bool {
        self.protocol.matches(record.protocol)
            && (self.domain.is_empty() || record.url.to_lowercase().contains(&self.domain))
    }
}

/// The subsequence of `records` matching `predicate`, in order.
pub fn apply(predicate: &FilterPredicate, records: &[Arc<TrafficRecord>]) -> Vec<Arc<TrafficRecord>> {
    records
        .iter()
        .filter(|r| predicate.matches(r))
        .cloned()
        .collect()
}

/// `selected` if that record is still present in `view`.
pub fn retain_selection(view: &[Arc<TrafficRecord>], selected: Option<RecordId>) -> Option<RecordId> {
    selected.filter(|id| view.iter().any(|r| r.id == *id))
}

/// A filtered view that recomputes only when the predicate or the store
/// revision changes.
#[derive(Debug, Default)]
pub struct LiveView {
    predicate: FilterPredicate,
    revision: Option<u64>,
    records: Vec<Arc<TrafficRecord>>,
}

impl LiveView {
    pub fn new(predicate: FilterPredicate) -> Self {
        Self {
            predicate,
            revision: None,
            records: Vec::new(),
        }
    }

    pub fn predicate(&self) -> &FilterPredicate {
        &self.predicate
    }

    pub fn set_predicate(&mut self, predicate: FilterPredicate) {
        if predicate != self.predicate {
            self.predicate = predicate;
            self.revision = None;
        }
    }

    /// Recompute from the store if anything changed. Returns whether the
    /// visible records were recomputed.
    pub fn refresh(&mut self, store: &CaptureStore) -> bool {
        if self.revision == Some(store.revision()) {
            return false;
        }
        let (revision, snapshot) = store.snapshot_with_revision();
        self.records = apply(&self.predicate, &snapshot);
        self.revision = Some(revision);
        true
    }

    pub fn records(&self) -> &[Arc<TrafficRecord>] {
        &self.records
    }
}
