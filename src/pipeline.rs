// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Event consumer: correlate proxy events into the store, then stream
//! completed exchanges to the console and the log file.

use crate::capture::LogWriter;
use crate::correlator::{Correlation, Correlator};
use crate::events::{EventReceiver, ProxyEvent};
use crate::filter::FilterPredicate;
use crate::record::TrafficRecord;
use crate::render;
use console::Term;
use std::sync::Arc;
use tracing::{error, info, warn};

struct ConsoleOutput {
    term: Term,
    colored: bool,
}

pub struct Pipeline {
    correlator: Correlator,
    filter: FilterPredicate,
    console: Option<ConsoleOutput>,
    log: Option<LogWriter>,
}

impl Pipeline {
    pub fn new(correlator: Correlator, filter: FilterPredicate) -> Self {
        Self {
            correlator,
            filter,
            console: None,
            log: None,
        }
    }

    pub fn with_console(mut self, term: Term, colored: bool) -> Self {
        self.console = Some(ConsoleOutput { term, colored });
        self
    }

    pub fn with_log(mut self, log: LogWriter) -> Self {
        self.log = Some(log);
        self
    }

    /// Consume events in arrival order until every sender is gone.
    pub async fn run(self, mut events: EventReceiver) {
        while let Some(event) = events.recv().await {
            self.dispatch(event).await;
        }
        info!("event stream closed");
    }

    /// Apply one event. Returns the record it completed, if any.
    pub async fn dispatch(&self, event: ProxyEvent) -> Option<Arc<TrafficRecord>> {
        match event {
            ProxyEvent::Request(req) => {
                self.correlator.on_request(req);
                None
            }
            ProxyEvent::Response(resp) => match self.correlator.on_response(resp) {
                Correlation::Completed(record) => {
                    if self.filter.matches(&record) {
                        self.emit(&record).await;
                    }
                    Some(record)
                }
                Correlation::Orphaned { .. } => None,
            },
        }
    }

    async fn emit(&self, record: &TrafficRecord) {
        if let Some(console) = &self.console {
            let text = if console.colored {
                render::colored_block(record)
            } else {
                render::plain_block(record)
            };
            // Terminal writes block; keep them off the runtime workers.
            let term = console.term.clone();
            match tokio::task::spawn_blocking(move || term.write_str(&text)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "console write failed"),
                Err(e) => warn!(error = %e, "console writer task failed"),
            }
        }
        if let Some(log) = &self.log {
            if let Err(e) = log.append(&render::plain_block(record)).await {
                error!(path = %log.path().display(), error = %e, "log append failed");
            }
        }
    }
}
