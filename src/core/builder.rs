//! Assembles operation descriptors into an immutable batch request.

use crate::core::descriptor::{
    BatchRequest, ConditionalMatch, CorrelationKey, EntityPayload, OperationDescriptor,
    OperationKind,
};
use crate::core::reference::{LocalId, Reference};

/// Ordered batch assembly.
///
/// A pure accumulator: input order is output order, and no dependency
/// validation happens here. The caller owns the invariant that a create
/// referencing a local id only does so if that id was allocated earlier in
/// the same batch or already resolved by a prior one.
#[derive(Debug, Default)]
pub struct BatchBuilder {
    entries: Vec<OperationDescriptor>,
}

impl BatchBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditional create, correlated by batch position.
    pub fn create(self, collection: impl Into<String>, payload: EntityPayload) -> Self {
        let correlation = CorrelationKey::Index(self.entries.len());
        self.push(OperationDescriptor {
            kind: OperationKind::Create {
                collection: collection.into(),
                payload,
                conditional: None,
            },
            correlation,
        })
    }

    /// Unconditional create correlated by a local id, so later batches can
    /// reference the created entity.
    pub fn create_local(
        self,
        local: LocalId,
        collection: impl Into<String>,
        payload: EntityPayload,
    ) -> Self {
        self.push(OperationDescriptor {
            kind: OperationKind::Create {
                collection: collection.into(),
                payload,
                conditional: None,
            },
            correlation: CorrelationKey::Local(local),
        })
    }

    /// Create-if-absent keyed on a match predicate, correlated by a local id.
    /// Re-running the same predicate resolves the same local id to the entity
    /// that already exists instead of duplicating it.
    pub fn create_conditional(
        self,
        local: LocalId,
        collection: impl Into<String>,
        payload: EntityPayload,
        conditional: ConditionalMatch,
    ) -> Self {
        self.push(OperationDescriptor {
            kind: OperationKind::Create {
                collection: collection.into(),
                payload,
                conditional: Some(conditional),
            },
            correlation: CorrelationKey::Local(local),
        })
    }

    /// Read by reference, correlated by batch position.
    pub fn read(self, target: Reference) -> Self {
        let correlation = CorrelationKey::Index(self.entries.len());
        self.push(OperationDescriptor {
            kind: OperationKind::Read { target },
            correlation,
        })
    }

    /// Append a pre-built descriptor verbatim.
    pub fn push(mut self, descriptor: OperationDescriptor) -> Self {
        self.entries.push(descriptor);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Freeze the accumulated entries, preserving insertion order exactly.
    pub fn build(self) -> BatchRequest {
        BatchRequest::new(self.entries)
    }

    /// Hand back the accumulated descriptors without freezing them, for
    /// scenario stages that are materialized against a resolved graph later.
    pub fn operations(self) -> Vec<OperationDescriptor> {
        self.entries
    }
}
