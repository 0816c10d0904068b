// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Interactive inspection session: a filtered list, one selected record and
//! a search state per detail region.

use crate::filter::{FilterPredicate, LiveView};
use crate::record::{RecordId, TrafficRecord};
use crate::search::{Region, SearchEngine, SearchState};
use crate::state::CaptureStore;
use std::sync::Arc;
use tracing::debug;

pub struct Session {
    store: Arc<CaptureStore>,
    view: LiveView,
    selected: Option<Arc<TrafficRecord>>,
    search: SearchEngine,
}

impl Session {
    pub fn new(store: Arc<CaptureStore>, predicate: FilterPredicate) -> Self {
        let mut session = Self {
            store,
            view: LiveView::new(predicate),
            selected: None,
            search: SearchEngine::new(),
        };
        session.refresh();
        session
    }

    pub fn records(&self) -> &[Arc<TrafficRecord>] {
        self.view.records()
    }

    pub fn selected(&self) -> Option<&Arc<TrafficRecord>> {
        self.selected.as_ref()
    }

    pub fn predicate(&self) -> &FilterPredicate {
        self.view.predicate()
    }

    pub fn set_filter(&mut self, predicate: FilterPredicate) -> bool {
        self.view.set_predicate(predicate);
        self.refresh()
    }

    /// Pull store changes into the view. The selection survives only while
    /// the record stays visible; if it completed meanwhile, active queries
    /// are re-run against its new text.
    pub fn refresh(&mut self) -> bool {
        if !self.view.refresh(&self.store) {
            return false;
        }
        let Some(current) = self.selected.take() else {
            return true;
        };
        let fresh = self
            .view
            .records()
            .iter()
            .find(|r| r.id == current.id)
            .cloned();

        match fresh {
            Some(fresh) => {
                if *fresh != *current {
                    let record: &TrafficRecord = &fresh;
                    self.search.reevaluate(|region| region.text(record));
                }
                self.selected = Some(fresh);
            }
            None => {
                debug!(id = %current.id, "selection no longer visible");
                self.search.reset();
            }
        }
        true
    }

    /// Select a visible record. Resets every region's search.
    pub fn select(&mut self, id: RecordId) -> bool {
        let Some(record) = self.view.records().iter().find(|r| r.id == id).cloned() else {
            return false;
        };
        self.selected = Some(record);
        self.search.reset();
        true
    }

    pub fn deselect(&mut self) {
        self.selected = None;
        self.search.reset();
    }

    /// Evaluate `query` against the selected record's text for `region`.
    pub fn search(&mut self, region: Region, query: &str) -> Option<&SearchState> {
        let text = self
            .selected
            .as_deref()
            .map(|r| region.text(r))
            .unwrap_or("");
        self.search.set_query(region, query, text);
        self.search.state(region)
    }

    pub fn next_match(&mut self, region: Region) -> Option<usize> {
        self.search.next(region)
    }

    pub fn search_state(&self, region: Region) -> Option<&SearchState> {
        self.search.state(region)
    }

    /// Empty the store and forget the selection and searches.
    pub fn clear(&mut self) {
        self.store.clear();
        self.selected = None;
        self.search.reset();
        self.view.refresh(&self.store);
    }
}
