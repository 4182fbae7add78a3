//! Single-round-trip batch execution

use crate::auth::BearerToken;
use crate::core::descriptor::{BatchRequest, BatchResult};
use crate::protocol::WireCodec;
use crate::transport::{Method, Transport, TransportRequest};
use crate::utils::error::{BatchError, Result};
use tracing::{debug, warn};
use url::Url;

/// Submits one assembled batch and parses the per-entry outcome sequence.
///
/// The whole request goes out as a single call; the remote decides its own
/// atomicity, so partial per-entry success is an expected outcome, not a
/// terminal error. Only a missing/garbled response body (no correlation
/// possible) or a wrong entry count fails the batch as a whole.
pub struct BatchExecutor<'a> {
    transport: &'a dyn Transport,
    codec: &'a dyn WireCodec,
    endpoint: Url,
    token: BearerToken,
}

impl<'a> BatchExecutor<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        codec: &'a dyn WireCodec,
        endpoint: Url,
        token: BearerToken,
    ) -> Self {
        Self {
            transport,
            codec,
            endpoint,
            token,
        }
    }

    /// One network round-trip: encode, submit, decode, verify alignment.
    pub async fn execute(&self, request: &BatchRequest) -> Result<BatchResult> {
        let body = self.codec.encode(request)?;
        debug!(entries = request.len(), endpoint = %self.endpoint, "submitting batch");

        let response = self
            .transport
            .send(TransportRequest {
                method: Method::Post,
                url: self.endpoint.to_string(),
                headers: vec![
                    ("Authorization".to_string(), self.token.header_value()),
                    (
                        "Content-Type".to_string(),
                        self.codec.content_type().to_string(),
                    ),
                    ("Accept".to_string(), self.codec.content_type().to_string()),
                ],
                body: Some(body),
            })
            .await?;

        if !response.is_success() {
            // Whole-batch rejection carries no per-entry results to correlate.
            warn!(status = response.status, "batch endpoint rejected the bundle");
            return Err(BatchError::Transport(format!(
                "batch endpoint returned {}: {}",
                response.status,
                response.body_text()
            )));
        }

        let entries = self.codec.decode(request, &response.body)?;
        // The codec contract already requires alignment; re-check here so a
        // miscounting codec cannot feed the resolver misaligned entries.
        if entries.len() != request.len() {
            return Err(BatchError::ResponseShapeMismatch {
                expected: request.len(),
                actual: entries.len(),
            });
        }

        Ok(BatchResult::new(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::builder::BatchBuilder;
    use crate::core::descriptor::{ConditionalMatch, OperationStatus};
    use crate::core::reference::LocalId;
    use crate::protocol::FhirCodec;
    use crate::transport::scripted::ScriptedTransport;
    use serde_json::json;

    fn endpoint() -> Url {
        Url::parse("https://fhir.example/r4").unwrap()
    }

    fn two_entry_request() -> BatchRequest {
        let patient = LocalId::new();
        BatchBuilder::new()
            .create_conditional(
                patient,
                "Patient",
                json!({"resourceType": "Patient"}),
                ConditionalMatch::new("identifier", "MRN-1"),
            )
            .create_local(
                LocalId::new(),
                "ServiceRequest",
                json!({"resourceType": "ServiceRequest", "subject": {"reference": patient.as_urn()}}),
            )
            .build()
    }

    #[tokio::test]
    async fn result_aligns_with_request_entries() {
        let codec = FhirCodec::new();
        let transport = ScriptedTransport::new(vec![ScriptedTransport::ok(
            200,
            json!({
                "resourceType": "Bundle",
                "type": "transaction-response",
                "entry": [
                    {"response": {"status": "201 Created", "location": "Patient/X"}},
                    {"response": {"status": "201 Created", "location": "ServiceRequest/Y"}},
                ]
            }),
        )]);
        let executor = BatchExecutor::new(
            &transport,
            &codec,
            endpoint(),
            BearerToken::from_raw("tok"),
        );

        let request = two_entry_request();
        let result = executor.execute(&request).await.unwrap();

        assert_eq!(result.len(), request.len());
        assert_eq!(result.get(0).unwrap().status, OperationStatus::Created);
        assert_eq!(
            result.get(0).unwrap().permanent_id.as_deref(),
            Some("Patient/X")
        );
        assert_eq!(
            result.get(1).unwrap().permanent_id.as_deref(),
            Some("ServiceRequest/Y")
        );

        // The round-trip carried the bearer token and the codec media type.
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert!(
            sent[0]
                .headers
                .iter()
                .any(|(name, value)| name == "Authorization" && value == "Bearer tok")
        );
        assert!(
            sent[0]
                .headers
                .iter()
                .any(|(name, value)| name == "Content-Type" && value == "application/fhir+json")
        );
    }

    #[tokio::test]
    async fn short_response_is_a_shape_mismatch() {
        let codec = FhirCodec::new();
        let transport = ScriptedTransport::new(vec![ScriptedTransport::ok(
            200,
            json!({"entry": [{"response": {"status": "201 Created", "location": "Patient/X"}}]}),
        )]);
        let executor = BatchExecutor::new(
            &transport,
            &codec,
            endpoint(),
            BearerToken::from_raw("tok"),
        );

        let error = executor.execute(&two_entry_request()).await.unwrap_err();
        assert!(matches!(
            error,
            BatchError::ResponseShapeMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[tokio::test]
    async fn whole_batch_rejection_is_a_transport_error() {
        let codec = FhirCodec::new();
        let transport = ScriptedTransport::new(vec![ScriptedTransport::ok(
            500,
            json!({"resourceType": "OperationOutcome"}),
        )]);
        let executor = BatchExecutor::new(
            &transport,
            &codec,
            endpoint(),
            BearerToken::from_raw("tok"),
        );

        let error = executor.execute(&two_entry_request()).await.unwrap_err();
        assert!(error.is_retryable());
    }

    #[tokio::test]
    async fn partial_per_entry_failure_is_not_a_batch_error() {
        let codec = FhirCodec::new();
        let transport = ScriptedTransport::new(vec![ScriptedTransport::ok(
            200,
            json!({
                "entry": [
                    {"response": {"status": "201 Created", "location": "Patient/X"}},
                    {"response": {"status": "422 Unprocessable Entity"}},
                ]
            }),
        )]);
        let executor = BatchExecutor::new(
            &transport,
            &codec,
            endpoint(),
            BearerToken::from_raw("tok"),
        );

        let result = executor.execute(&two_entry_request()).await.unwrap();
        assert!(result.get(0).unwrap().is_success());
        assert_eq!(result.get(1).unwrap().status, OperationStatus::Failed);
    }
}
