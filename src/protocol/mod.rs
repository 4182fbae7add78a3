//! Wire-format adapters.
//!
//! The engine is protocol-agnostic: a [`WireCodec`] translates between
//! operation descriptors and the remote API's batch schema, isolating
//! field-name and status-convention fragility from the resolution logic.

mod fhir;

pub use fhir::FhirCodec;

use crate::core::descriptor::{BatchRequest, OperationResult};
use crate::utils::error::Result;

/// Serialize batches to the remote's wire schema and parse its responses
/// back into typed per-entry results.
pub trait WireCodec: Send + Sync {
    /// Media type of the encoded body.
    fn content_type(&self) -> &'static str;

    /// Serialize a batch into the outbound request body.
    ///
    /// Fails with `MalformedPayload` when an entity payload cannot be
    /// serialized.
    fn encode(&self, request: &BatchRequest) -> Result<Vec<u8>>;

    /// Parse a response body into per-entry results, preserving order.
    ///
    /// An unparseable body is a `Transport` failure (no per-entry correlation
    /// is possible); a parseable body with the wrong entry count is a
    /// `ResponseShapeMismatch`.
    fn decode(&self, request: &BatchRequest, body: &[u8]) -> Result<Vec<OperationResult>>;
}
