//! Sequential multi-batch workflow orchestration
//!
//! A workflow is a linear chain: authenticate once, then drive batch stages
//! in order, resolving local references after each round-trip so the next
//! stage can reference entities the previous one created, and finally
//! dereference a read-back set discovered inside a previously created entity.
//! Nothing runs concurrently for one graph; any stage failure stops the run.

use crate::auth::{Credentials, authenticate};
use crate::core::builder::BatchBuilder;
use crate::core::descriptor::{
    BatchRequest, BatchResult, EntityPayload, OperationDescriptor, OperationKind,
};
use crate::core::executor::BatchExecutor;
use crate::core::reference::Reference;
use crate::core::resolver::ResolvedGraph;
use crate::protocol::WireCodec;
use crate::transport::Transport;
use crate::utils::error::{BatchError, Result};
use serde_json::Value;
use std::fmt;
use tracing::{info, warn};
use url::Url;

/// Stage the orchestrator last completed, carried on failure outcomes so a
/// run can be diagnosed without re-running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStage {
    Init,
    Authenticated,
    /// Batch `n` (zero-based) went out and a response came back
    BatchSubmitted(usize),
    /// Batch `n`'s local references were folded into the graph
    BatchResolved(usize),
    ReadbackSubmitted,
    Done,
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowStage::Init => f.write_str("init"),
            WorkflowStage::Authenticated => f.write_str("authenticated"),
            WorkflowStage::BatchSubmitted(n) => write!(f, "batch {} submitted", n + 1),
            WorkflowStage::BatchResolved(n) => write!(f, "batch {} resolved", n + 1),
            WorkflowStage::ReadbackSubmitted => f.write_str("read-back submitted"),
            WorkflowStage::Done => f.write_str("done"),
        }
    }
}

/// One batch stage of a scenario.
///
/// Payloads may hold `urn:uuid` placeholders for local ids resolved by
/// *earlier* stages; those are rewritten to permanent ids before submission.
/// A read in a stage must never target a local id allocated in the same
/// stage.
#[derive(Debug, Clone)]
pub struct BatchStage {
    /// Label used in logs and diagnostics
    pub name: String,
    /// Ordered operations for this batch
    pub operations: Vec<OperationDescriptor>,
}

impl BatchStage {
    pub fn new(name: impl Into<String>, operations: Vec<OperationDescriptor>) -> Self {
        Self {
            name: name.into(),
            operations,
        }
    }
}

/// Derives the terminal read-back batch dynamically: `source` is read first,
/// then every reference found under `reference_field` (entries shaped
/// `{"reference": "…"}`) becomes one read operation, in document order. The
/// operation list is unknowable until that earlier read completes.
#[derive(Debug, Clone)]
pub struct ReadBack {
    /// Entity whose references drive the read-back set
    pub source: Reference,
    /// Field of the source entity holding the reference list, e.g. `result`
    pub reference_field: String,
}

/// Ordered batches plus an optional dynamic read-back.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub stages: Vec<BatchStage>,
    pub read_back: Option<ReadBack>,
}

/// Terminal result of a workflow run.
#[derive(Debug)]
pub enum WorkflowOutcome {
    /// All stages finished; carries the final graph and, when a read-back was
    /// requested, its results.
    Completed {
        graph: ResolvedGraph,
        read_back: Option<BatchResult>,
    },
    /// A stage failed; the run stopped with no retry.
    Failed {
        /// Last stage that completed before the failure
        stage: WorkflowStage,
        error: BatchError,
    },
}

impl WorkflowOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, WorkflowOutcome::Completed { .. })
    }
}

/// Drives a [`Scenario`] through sequential batch round-trips.
pub struct Workflow<'a> {
    transport: &'a dyn Transport,
    codec: &'a dyn WireCodec,
    endpoint: Url,
    token_url: Url,
    credentials: Credentials,
}

impl<'a> Workflow<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        codec: &'a dyn WireCodec,
        endpoint: Url,
        token_url: Url,
        credentials: Credentials,
    ) -> Self {
        Self {
            transport,
            codec,
            endpoint,
            token_url,
            credentials,
        }
    }

    /// Run the scenario to completion or first failure.
    pub async fn run(&self, scenario: Scenario) -> WorkflowOutcome {
        let mut stage = WorkflowStage::Init;
        match self.drive(scenario, &mut stage).await {
            Ok((graph, read_back)) => WorkflowOutcome::Completed { graph, read_back },
            Err(error) => {
                warn!(%stage, %error, "workflow failed");
                WorkflowOutcome::Failed { stage, error }
            }
        }
    }

    async fn drive(
        &self,
        scenario: Scenario,
        stage: &mut WorkflowStage,
    ) -> Result<(ResolvedGraph, Option<BatchResult>)> {
        let token =
            authenticate(self.transport, self.token_url.as_str(), &self.credentials).await?;
        *stage = WorkflowStage::Authenticated;

        let executor =
            BatchExecutor::new(self.transport, self.codec, self.endpoint.clone(), token);
        let mut graph = ResolvedGraph::new();

        for (index, batch_stage) in scenario.stages.into_iter().enumerate() {
            let mut operations = batch_stage.operations;
            materialize_operations(&graph, &mut operations)?;

            let request = assemble(operations);
            info!(
                stage = %batch_stage.name,
                entries = request.len(),
                "submitting batch {}",
                index + 1
            );
            let result = executor.execute(&request).await?;
            *stage = WorkflowStage::BatchSubmitted(index);

            graph.absorb(&request, &result)?;
            *stage = WorkflowStage::BatchResolved(index);
        }

        let read_back = match scenario.read_back {
            None => None,
            Some(read_back) => Some(
                self.run_read_back(&executor, &graph, read_back, stage)
                    .await?,
            ),
        };

        *stage = WorkflowStage::Done;
        Ok((graph, read_back))
    }

    /// Read the source entity, pull its reference list, and dereference it
    /// as one final batch of reads.
    async fn run_read_back(
        &self,
        executor: &BatchExecutor<'_>,
        graph: &ResolvedGraph,
        read_back: ReadBack,
        stage: &mut WorkflowStage,
    ) -> Result<BatchResult> {
        let source = graph.materialize(&read_back.source).ok_or_else(|| {
            BatchError::MalformedPayload(
                "read-back source references an unresolved local id".to_string(),
            )
        })?;

        let probe = BatchBuilder::new()
            .read(Reference::permanent(source.clone()))
            .build();
        let probe_result = executor.execute(&probe).await?;
        let entry = probe_result
            .get(0)
            .ok_or(BatchError::ResponseShapeMismatch {
                expected: 1,
                actual: 0,
            })?;
        if !entry.is_success() {
            return Err(BatchError::OperationFailed {
                index: 0,
                detail: entry
                    .error_detail
                    .clone()
                    .unwrap_or_else(|| format!("read of {source} failed")),
            });
        }
        let resource = entry.resource.as_ref().ok_or_else(|| {
            BatchError::MalformedPayload(format!("read of {source} returned no entity body"))
        })?;

        let targets = extract_references(resource, &read_back.reference_field);
        info!(
            source = %source,
            field = %read_back.reference_field,
            count = targets.len(),
            "dereferencing discovered references"
        );

        let mut builder = BatchBuilder::new();
        for target in targets {
            builder = builder.read(Reference::permanent(target));
        }
        let request = builder.build();
        let result = executor.execute(&request).await?;
        *stage = WorkflowStage::ReadbackSubmitted;
        Ok(result)
    }
}

fn assemble(operations: Vec<OperationDescriptor>) -> BatchRequest {
    operations
        .into_iter()
        .fold(BatchBuilder::new(), BatchBuilder::push)
        .build()
}

/// Prepare a stage's operations against the current graph: create payloads
/// get resolved placeholders substituted; read targets that are still local
/// must have been resolved by an earlier batch, otherwise the stage is
/// rejected before anything goes on the wire.
fn materialize_operations(
    graph: &ResolvedGraph,
    operations: &mut [OperationDescriptor],
) -> Result<()> {
    for (index, operation) in operations.iter_mut().enumerate() {
        match &mut operation.kind {
            OperationKind::Create { payload, .. } => graph.rewrite(payload),
            OperationKind::Read { target } => {
                if let Reference::Local(local) = target {
                    let permanent = graph.permanent_id(local).ok_or_else(|| {
                        BatchError::MalformedPayload(format!(
                            "read entry {index} targets a local reference not resolved by an earlier batch"
                        ))
                    })?;
                    *target = Reference::Permanent(permanent.to_string());
                }
            }
        }
    }
    Ok(())
}

/// Pull `{"reference": "…"}` targets out of one field of an entity, in
/// document order.
pub fn extract_references(resource: &EntityPayload, field: &str) -> Vec<String> {
    resource
        .get(field)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("reference").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
