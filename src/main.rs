//! batchlink - demo clinical-ordering workflow against a FHIR-style API
//!
//! Two sequential batches followed by a dynamic read-back: conditionally
//! create a patient plus an order referencing it, then file observations and
//! a report against the resolved ids, then dereference the report's result
//! references.

use anyhow::bail;
use batchlink_rs::config::AppConfig;
use batchlink_rs::{
    BatchBuilder, BatchStage, ConditionalMatch, FhirCodec, HttpTransport, LocalId, ReadBack,
    Reference, Scenario, Workflow, WorkflowOutcome,
};
use clap::Parser;
use serde_json::json;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{Level, info};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let config = AppConfig::parse();
    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    let transport = HttpTransport::new(Duration::from_secs(config.timeout_secs))?;
    let codec = FhirCodec::new();
    let workflow = Workflow::new(
        &transport,
        &codec,
        config.base_url.clone(),
        config.token_url.clone(),
        config.credentials(),
    );

    let scenario = ordering_scenario(&config.mrn);
    match workflow.run(scenario).await {
        WorkflowOutcome::Completed { graph, read_back } => {
            info!(resolved = graph.len(), "workflow completed");
            if let Some(results) = read_back {
                for entry in results.entries() {
                    info!(
                        id = entry.permanent_id.as_deref().unwrap_or("<unknown>"),
                        "read back entity"
                    );
                }
            }
            Ok(())
        }
        WorkflowOutcome::Failed { stage, error } => {
            bail!("workflow failed during '{stage}': {error}")
        }
    }
}

/// Order intake, result filing, and read-back of the report's observations.
fn ordering_scenario(mrn: &str) -> Scenario {
    let patient = LocalId::new();
    let order = LocalId::new();
    let glucose = LocalId::new();
    let hemoglobin = LocalId::new();
    let report = LocalId::new();

    let intake = BatchBuilder::new()
        .create_conditional(
            patient,
            "Patient",
            json!({
                "resourceType": "Patient",
                "identifier": [{"system": "urn:example:mrn", "value": mrn}],
                "name": [{"family": "Demo", "given": ["Batchlink"]}],
            }),
            ConditionalMatch::new("identifier", mrn),
        )
        .create_local(
            order,
            "ServiceRequest",
            json!({
                "resourceType": "ServiceRequest",
                "status": "active",
                "intent": "order",
                "subject": {"reference": patient.as_urn()},
            }),
        )
        .operations();

    // Placeholders for `patient` and `order` are rewritten to the permanent
    // ids resolved from the intake batch; `glucose`/`hemoglobin` stay local
    // because the report is created in the same batch.
    let results = BatchBuilder::new()
        .create_local(
            glucose,
            "Observation",
            json!({
                "resourceType": "Observation",
                "status": "final",
                "code": {"text": "Glucose"},
                "subject": {"reference": patient.as_urn()},
                "basedOn": [{"reference": order.as_urn()}],
            }),
        )
        .create_local(
            hemoglobin,
            "Observation",
            json!({
                "resourceType": "Observation",
                "status": "final",
                "code": {"text": "Hemoglobin A1c"},
                "subject": {"reference": patient.as_urn()},
                "basedOn": [{"reference": order.as_urn()}],
            }),
        )
        .create_local(
            report,
            "DiagnosticReport",
            json!({
                "resourceType": "DiagnosticReport",
                "status": "final",
                "code": {"text": "Metabolic panel"},
                "subject": {"reference": patient.as_urn()},
                "basedOn": [{"reference": order.as_urn()}],
                "result": [
                    {"reference": glucose.as_urn()},
                    {"reference": hemoglobin.as_urn()},
                ],
            }),
        )
        .operations();

    Scenario {
        stages: vec![
            BatchStage::new("order-intake", intake),
            BatchStage::new("result-filing", results),
        ],
        read_back: Some(ReadBack {
            source: Reference::Local(report),
            reference_field: "result".to_string(),
        }),
    }
}
