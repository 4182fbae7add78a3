//! # batchlink-rs
//!
//! Local-reference batch builder and resolver for FHIR-style resource APIs.
//!
//! Assembles interdependent create/read operations into a single atomic
//! batch, submits it, and resolves the server-assigned identifiers back into
//! the caller's in-memory graph so follow-up batches and reads can reference
//! the newly created entities by their real ids.
//!
//! ## Building blocks
//!
//! - [`LocalId`] / [`Reference`]: temporary handles letting one
//!   not-yet-created entity reference another within the same batch.
//! - [`BatchBuilder`]: ordered assembly of create/read descriptors,
//!   including conditional (create-if-absent) semantics.
//! - [`BatchExecutor`]: one network round-trip, positional correlation
//!   enforced.
//! - [`ResolvedGraph`]: write-once LocalId → permanent-id mapping.
//! - [`Workflow`]: drives multi-batch scenarios where later batches depend on
//!   identifiers resolved from earlier ones.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use batchlink_rs::{
//!     BatchBuilder, BatchStage, ConditionalMatch, Credentials, FhirCodec, HttpTransport,
//!     LocalId, Scenario, Workflow,
//! };
//! use serde_json::json;
//! use std::time::Duration;
//! use url::Url;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = HttpTransport::new(Duration::from_secs(30))?;
//!     let codec = FhirCodec::new();
//!     let workflow = Workflow::new(
//!         &transport,
//!         &codec,
//!         Url::parse("https://fhir.example/r4")?,
//!         Url::parse("https://auth.example/token")?,
//!         Credentials::new("client-id", "client-secret"),
//!     );
//!
//!     let patient = LocalId::new();
//!     let scenario = Scenario {
//!         stages: vec![BatchStage::new(
//!             "intake",
//!             BatchBuilder::new()
//!                 .create_conditional(
//!                     patient,
//!                     "Patient",
//!                     json!({"resourceType": "Patient"}),
//!                     ConditionalMatch::new("identifier", "MRN-1"),
//!                 )
//!                 .create(
//!                     "ServiceRequest",
//!                     json!({
//!                         "resourceType": "ServiceRequest",
//!                         "subject": {"reference": patient.as_urn()},
//!                     }),
//!                 )
//!                 .operations(),
//!         )],
//!         read_back: None,
//!     };
//!
//!     let outcome = workflow.run(scenario).await;
//!     println!("{outcome:?}");
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub mod auth;
pub mod config;
pub mod core;
pub mod protocol;
pub mod transport;
pub mod utils;

// Re-export the engine surface
pub use crate::auth::{BearerToken, Credentials, authenticate};
pub use crate::core::builder::BatchBuilder;
pub use crate::core::descriptor::{
    BatchRequest, BatchResult, ConditionalMatch, CorrelationKey, EntityPayload,
    OperationDescriptor, OperationKind, OperationResult, OperationStatus,
};
pub use crate::core::executor::BatchExecutor;
pub use crate::core::reference::{LocalId, Reference};
pub use crate::core::resolver::ResolvedGraph;
pub use crate::core::workflow::{
    BatchStage, ReadBack, Scenario, Workflow, WorkflowOutcome, WorkflowStage, extract_references,
};
pub use crate::protocol::{FhirCodec, WireCodec};
pub use crate::transport::{HttpTransport, Method, Transport, TransportRequest, TransportResponse};
pub use crate::utils::error::{BatchError, Result};
