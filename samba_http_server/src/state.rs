use std::sync::{PoisonError, RwLock};

use samba::{Trace, TraceDigest};
use tracing::info;

use crate::{
    responses::Error,
    types::{HandleTraceRequestFn, StoredTrace, TraceId, TraceRequest},
};

struct HistoryEntry {
    digest: TraceDigest,
    stored: StoredTrace,
}

/// Traces handed out so far, in the order they were created.
pub(crate) struct HistoryRegistry {
    history: RwLock<Vec<HistoryEntry>>,
    handler: HandleTraceRequestFn,
}

fn poisoned<T>(_: PoisonError<T>) -> Error {
    Error::Internal {
        message: "the trace history is poisoned".to_string(),
    }
}

impl HistoryRegistry {
    pub(crate) fn new(handler: HandleTraceRequestFn) -> Self {
        Self {
            history: RwLock::new(vec![]),
            handler,
        }
    }

    /// Stores `trace` under `trace_id`, unless an identical trace is already stored.
    ///
    /// Returns the stored entry, which carries the older id for duplicates.
    pub(crate) fn insert_trace(&self, trace_id: TraceId, trace: Trace) -> Result<StoredTrace, Error> {
        let digest = trace.digest()?;
        let mut history = self.history.write().map_err(poisoned)?;
        if let Some(existing) = history.iter().find(|e| e.digest == digest) {
            info!(trace_id = %existing.stored.id, "trace already in history");
            return Ok(existing.stored.clone());
        }
        let stored = StoredTrace {
            id: trace_id,
            trace,
        };
        info!(trace_id = %stored.id, algorithm = %stored.trace.algorithm, "trace added to history");
        history.push(HistoryEntry {
            digest,
            stored: stored.clone(),
        });
        Ok(stored)
    }

    pub(crate) fn drop_trace(&self, trace_id: &str) -> Result<bool, Error> {
        let mut history = self.history.write().map_err(poisoned)?;
        let before = history.len();
        history.retain(|e| e.stored.id != trace_id);
        Ok(history.len() < before)
    }

    pub(crate) fn lookup(&self, trace_id: &str) -> Result<StoredTrace, Error> {
        let history = self.history.read().map_err(poisoned)?;
        match history.iter().find(|e| e.stored.id == trace_id) {
            Some(e) => Ok(e.stored.clone()),
            None => Err(Error::NoSuchTraceId {
                trace_id: trace_id.to_string(),
            }),
        }
    }

    pub(crate) fn list(&self) -> Result<Vec<StoredTrace>, Error> {
        let history = self.history.read().map_err(poisoned)?;
        Ok(history.iter().map(|e| e.stored.clone()).collect())
    }

    pub(crate) fn handle_request(&self, request: TraceRequest) -> Result<Trace, String> {
        self.handler.as_ref()(request)
    }
}
