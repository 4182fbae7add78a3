//! Resolution of local references to server-assigned identifiers

use crate::core::descriptor::{BatchRequest, BatchResult, EntityPayload, OperationStatus};
use crate::core::reference::{LocalId, Reference};
use crate::utils::error::{BatchError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tracing::debug;

/// Write-once mapping from local ids to permanent identifiers, built
/// incrementally as batches complete.
///
/// A local id resolves exactly once for the life of a workflow; a second
/// insertion is a `DuplicateResolution` bug, never silently overwritten.
/// Plain owned state is enough here: one workflow run is a linear chain, so
/// the graph is never mutated while a batch is in flight.
#[derive(Debug, Default, Clone)]
pub struct ResolvedGraph {
    entries: HashMap<LocalId, String>,
}

impl ResolvedGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Permanent id a local id resolved to, if it has.
    pub fn permanent_id(&self, local: &LocalId) -> Option<&str> {
        self.entries.get(local).map(String::as_str)
    }

    /// Record one resolution. Write-once.
    pub fn insert(&mut self, local: LocalId, permanent: impl Into<String>) -> Result<()> {
        match self.entries.entry(local) {
            Entry::Occupied(_) => Err(BatchError::DuplicateResolution(local)),
            Entry::Vacant(slot) => {
                let permanent = permanent.into();
                debug!(local = %local, permanent = %permanent, "resolved local reference");
                slot.insert(permanent);
                Ok(())
            }
        }
    }

    /// Fold one batch outcome into the graph.
    ///
    /// Every successful entry keyed by a local id gains a mapping; entries
    /// keyed by position resolve nothing. Successes are recorded before any
    /// failure is reported, so a caller that chooses to continue after an
    /// `OperationFailed` keeps the partial progress — the demo orchestrator
    /// treats it as fatal.
    pub fn absorb(&mut self, request: &BatchRequest, result: &BatchResult) -> Result<()> {
        let mut first_failure: Option<(usize, String)> = None;

        for (index, (descriptor, outcome)) in request
            .entries()
            .iter()
            .zip(result.entries())
            .enumerate()
        {
            match outcome.status {
                OperationStatus::Created | OperationStatus::MatchedExisting => {
                    if let Some(local) = descriptor.local_id() {
                        let permanent = outcome.permanent_id.clone().ok_or_else(|| {
                            BatchError::MalformedPayload(format!(
                                "entry {index} succeeded without a permanent id"
                            ))
                        })?;
                        self.insert(local, permanent)?;
                    }
                }
                OperationStatus::Failed => {
                    if first_failure.is_none() {
                        let detail = outcome
                            .error_detail
                            .clone()
                            .unwrap_or_else(|| "no detail provided".to_string());
                        first_failure = Some((index, detail));
                    }
                }
            }
        }

        match first_failure {
            Some((index, detail)) => Err(BatchError::OperationFailed { index, detail }),
            None => Ok(()),
        }
    }

    /// Materialize a reference against the graph: permanent ids pass
    /// through, local ids must already be resolved.
    pub fn materialize(&self, reference: &Reference) -> Option<String> {
        match reference {
            Reference::Permanent(id) => Some(id.clone()),
            Reference::Local(local) => self.permanent_id(local).map(str::to_string),
        }
    }

    /// Substitute resolved `urn:uuid` placeholders inside a payload, so a
    /// follow-up batch can reference entities created by an earlier one.
    /// Unresolved placeholders are left alone — they may be same-batch
    /// locals the remote resolves itself.
    pub fn rewrite(&self, payload: &mut EntityPayload) {
        match payload {
            Value::String(text) => {
                if let Some(local) = LocalId::parse_urn(text) {
                    if let Some(permanent) = self.permanent_id(&local) {
                        *text = permanent.to_string();
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.rewrite(item);
                }
            }
            Value::Object(fields) => {
                for value in fields.values_mut() {
                    self.rewrite(value);
                }
            }
            _ => {}
        }
    }
}
