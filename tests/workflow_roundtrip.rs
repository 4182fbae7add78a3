//! End-to-end workflow against a mock HTTP server: OAuth token exchange,
//! two dependent batches, and a dynamically derived read-back.

use batchlink_rs::{
    BatchBuilder, BatchStage, ConditionalMatch, Credentials, FhirCodec, HttpTransport, LocalId,
    OperationStatus, ReadBack, Reference, Scenario, Workflow, WorkflowOutcome, authenticate,
};
use batchlink_rs::{BatchExecutor, BatchRequest};
use serde_json::json;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_token_endpoint(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(header("Content-Type", "application/x-www-form-urlencoded"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "integration-token",
            "token_type": "bearer",
            "expires_in": 3600,
        })))
        .mount(server)
        .await;
}

fn fhir_url(server: &MockServer) -> Url {
    Url::parse(&format!("{}/r4", server.uri())).unwrap()
}

fn token_url(server: &MockServer) -> Url {
    Url::parse(&format!("{}/token", server.uri())).unwrap()
}

#[tokio::test]
async fn full_workflow_resolves_and_reads_back() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    // Batch 1: conditional patient create + order. Identified by ifNoneExist.
    Mock::given(method("POST"))
        .and(path("/r4"))
        .and(header("Authorization", "Bearer integration-token"))
        .and(body_string_contains("ifNoneExist"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Bundle",
            "type": "transaction-response",
            "entry": [
                {"response": {"status": "201 Created", "location": "Patient/pat-1/_history/1"}},
                {"response": {"status": "201 Created", "location": "ServiceRequest/sr-1/_history/1"}},
            ],
        })))
        .mount(&server)
        .await;

    // Batch 2: observations + report creates ("url":"DiagnosticReport" with a
    // closing quote distinguishes the create from the later read).
    Mock::given(method("POST"))
        .and(path("/r4"))
        .and(body_string_contains("\"url\":\"DiagnosticReport\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Bundle",
            "type": "transaction-response",
            "entry": [
                {"response": {"status": "201 Created", "location": "Observation/obs-1"}},
                {"response": {"status": "201 Created", "location": "Observation/obs-2"}},
                {"response": {"status": "201 Created", "location": "DiagnosticReport/dr-1"}},
            ],
        })))
        .mount(&server)
        .await;

    // Probe read of the created report.
    Mock::given(method("POST"))
        .and(path("/r4"))
        .and(body_string_contains("DiagnosticReport/dr-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Bundle",
            "type": "transaction-response",
            "entry": [{
                "resource": {
                    "resourceType": "DiagnosticReport",
                    "id": "dr-1",
                    "result": [
                        {"reference": "Observation/obs-1"},
                        {"reference": "Observation/obs-2"},
                    ],
                },
                "response": {"status": "200 OK"},
            }],
        })))
        .mount(&server)
        .await;

    // Read-back of the two observations discovered in the report.
    Mock::given(method("POST"))
        .and(path("/r4"))
        .and(body_string_contains("Observation/obs-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Bundle",
            "type": "transaction-response",
            "entry": [
                {
                    "resource": {"resourceType": "Observation", "id": "obs-1"},
                    "response": {"status": "200 OK"},
                },
                {
                    "resource": {"resourceType": "Observation", "id": "obs-2"},
                    "response": {"status": "200 OK"},
                },
            ],
        })))
        .mount(&server)
        .await;

    let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();
    let codec = FhirCodec::new();
    let workflow = Workflow::new(
        &transport,
        &codec,
        fhir_url(&server),
        token_url(&server),
        Credentials::new("client", "secret"),
    );

    let patient = LocalId::new();
    let order = LocalId::new();
    let report = LocalId::new();

    let scenario = Scenario {
        stages: vec![
            BatchStage::new(
                "order-intake",
                BatchBuilder::new()
                    .create_conditional(
                        patient,
                        "Patient",
                        json!({"resourceType": "Patient"}),
                        ConditionalMatch::new("identifier", "MRN-1"),
                    )
                    .create_local(
                        order,
                        "ServiceRequest",
                        json!({
                            "resourceType": "ServiceRequest",
                            "subject": {"reference": patient.as_urn()},
                        }),
                    )
                    .operations(),
            ),
            BatchStage::new(
                "result-filing",
                BatchBuilder::new()
                    .create(
                        "Observation",
                        json!({
                            "resourceType": "Observation",
                            "subject": {"reference": patient.as_urn()},
                        }),
                    )
                    .create(
                        "Observation",
                        json!({
                            "resourceType": "Observation",
                            "subject": {"reference": patient.as_urn()},
                        }),
                    )
                    .create_local(
                        report,
                        "DiagnosticReport",
                        json!({
                            "resourceType": "DiagnosticReport",
                            "subject": {"reference": patient.as_urn()},
                            "basedOn": [{"reference": order.as_urn()}],
                        }),
                    )
                    .operations(),
            ),
        ],
        read_back: Some(ReadBack {
            source: Reference::Local(report),
            reference_field: "result".to_string(),
        }),
    };

    let outcome = workflow.run(scenario).await;
    let WorkflowOutcome::Completed { graph, read_back } = outcome else {
        panic!("workflow should complete: {outcome:?}");
    };

    assert_eq!(graph.permanent_id(&patient), Some("Patient/pat-1"));
    assert_eq!(graph.permanent_id(&order), Some("ServiceRequest/sr-1"));
    assert_eq!(graph.permanent_id(&report), Some("DiagnosticReport/dr-1"));

    let read_back = read_back.expect("read-back results present");
    assert_eq!(read_back.len(), 2);
    assert_eq!(
        read_back.entries()[0].permanent_id.as_deref(),
        Some("Observation/obs-1")
    );
    assert_eq!(
        read_back.entries()[1].permanent_id.as_deref(),
        Some("Observation/obs-2")
    );
    assert!(read_back.entries().iter().all(|entry| entry.resource.is_some()));
}

#[tokio::test]
async fn conditional_create_is_idempotent_across_replays() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    // First submission creates; the replay matches the existing entity.
    Mock::given(method("POST"))
        .and(path("/r4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entry": [{"response": {"status": "201 Created", "location": "Patient/pat-1"}}],
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/r4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entry": [{"response": {"status": "200 OK", "location": "Patient/pat-1"}}],
        })))
        .mount(&server)
        .await;

    let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();
    let codec = FhirCodec::new();
    let token = authenticate(
        &transport,
        token_url(&server).as_str(),
        &Credentials::new("client", "secret"),
    )
    .await
    .unwrap();
    let executor = BatchExecutor::new(&transport, &codec, fhir_url(&server), token);

    let build_request = || -> BatchRequest {
        BatchBuilder::new()
            .create_conditional(
                LocalId::new(),
                "Patient",
                json!({"resourceType": "Patient"}),
                ConditionalMatch::new("identifier", "MRN-1"),
            )
            .build()
    };

    let first = executor.execute(&build_request()).await.unwrap();
    assert_eq!(first.entries()[0].status, OperationStatus::Created);
    assert_eq!(
        first.entries()[0].permanent_id.as_deref(),
        Some("Patient/pat-1")
    );

    let second = executor.execute(&build_request()).await.unwrap();
    assert_eq!(second.entries()[0].status, OperationStatus::MatchedExisting);
    assert_eq!(
        second.entries()[0].permanent_id.as_deref(),
        Some("Patient/pat-1")
    );
}

#[tokio::test]
async fn rejected_credentials_fail_the_run_before_any_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"error": "invalid_client"})),
        )
        .mount(&server)
        .await;

    let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();
    let codec = FhirCodec::new();
    let workflow = Workflow::new(
        &transport,
        &codec,
        fhir_url(&server),
        token_url(&server),
        Credentials::new("client", "wrong-secret"),
    );

    let scenario = Scenario {
        stages: vec![BatchStage::new(
            "intake",
            BatchBuilder::new()
                .create("Patient", json!({"resourceType": "Patient"}))
                .operations(),
        )],
        read_back: None,
    };

    let outcome = workflow.run(scenario).await;
    let WorkflowOutcome::Failed { error, .. } = outcome else {
        panic!("workflow should fail");
    };
    assert!(error.is_auth_error());
}
