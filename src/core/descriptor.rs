//! Batch operation descriptors and per-entry result types

use crate::core::reference::{LocalId, Reference};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque structured document describing the entity to create.
///
/// Owned by the caller until the batch is built; nested relationship fields
/// may hold local (`urn:uuid`) or permanent references as strings.
pub type EntityPayload = Value;

/// Create-if-absent predicate: a field/value equality expression evaluated by
/// the remote system against the target collection. Absence on a create
/// descriptor means unconditional creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalMatch {
    /// Search parameter name, e.g. `identifier`
    pub field: String,
    /// Value the parameter must equal
    pub value: String,
}

impl ConditionalMatch {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Query-string form used by the wire codec, e.g. `identifier=MRN-1`.
    pub fn as_query(&self) -> String {
        format!("{}={}", self.field, self.value)
    }
}

/// Correlation key carried structurally on both request and result entries.
///
/// Entries whose created id is needed later carry a [`LocalId`]; everything
/// else is keyed by its position in the batch. Carrying the key on both sides
/// keeps correlation meaningful even if a future remote protocol stops
/// guaranteeing positional alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CorrelationKey {
    /// Keyed by a local reference whose resolution other entries depend on
    Local(LocalId),
    /// Keyed by batch position only
    Index(usize),
}

/// One unit of work in a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationDescriptor {
    /// What the entry asks the remote to do
    pub kind: OperationKind,
    /// Key correlating this entry with its result
    pub correlation: CorrelationKey,
}

/// The two operation shapes the batch protocol supports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OperationKind {
    /// Create an entity in `collection`, optionally only if nothing matches
    /// the conditional predicate.
    Create {
        /// Target collection, e.g. `Patient`
        collection: String,
        /// Entity document to persist
        payload: EntityPayload,
        /// Create-if-absent predicate; `None` creates unconditionally
        conditional: Option<ConditionalMatch>,
    },
    /// Read an entity by reference.
    ///
    /// The target must be a permanent id or a local id resolved by an
    /// *earlier* batch; a read can never depend on a local id allocated in
    /// the same batch, because the remote's processing order within one batch
    /// is unspecified before read-back.
    Read {
        /// Entity to fetch
        target: Reference,
    },
}

impl OperationDescriptor {
    /// Local id this entry resolves, if it carries one.
    pub fn local_id(&self) -> Option<LocalId> {
        match self.correlation {
            CorrelationKey::Local(id) => Some(id),
            CorrelationKey::Index(_) => None,
        }
    }

    pub fn is_create(&self) -> bool {
        matches!(self.kind, OperationKind::Create { .. })
    }
}

/// Immutable ordered batch; order is the positional correlation contract with
/// the remote and is preserved exactly as built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    entries: Vec<OperationDescriptor>,
}

impl BatchRequest {
    pub(crate) fn new(entries: Vec<OperationDescriptor>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[OperationDescriptor] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&OperationDescriptor> {
        self.entries.get(index)
    }
}

/// Per-entry outcome classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationStatus {
    /// A fresh entity was created
    Created,
    /// A conditional create matched an existing entity; nothing was created
    MatchedExisting,
    /// The remote rejected this entry
    Failed,
}

/// Outcome of one batch entry, aligned 1:1 with the request entry that
/// produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult {
    /// Correlation key copied from the request entry
    pub correlation: CorrelationKey,
    /// Outcome classification
    pub status: OperationStatus,
    /// Server-assigned identifier; present unless the entry failed
    pub permanent_id: Option<String>,
    /// Entity body returned by the remote, when one was returned (reads)
    pub resource: Option<EntityPayload>,
    /// Server-provided error text; present iff the entry failed
    pub error_detail: Option<String>,
}

impl OperationResult {
    pub fn is_success(&self) -> bool {
        self.status != OperationStatus::Failed
    }
}

/// Ordered per-entry results, same length and order as the submitted batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    entries: Vec<OperationResult>,
}

impl BatchResult {
    pub(crate) fn new(entries: Vec<OperationResult>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[OperationResult] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&OperationResult> {
        self.entries.get(index)
    }
}
