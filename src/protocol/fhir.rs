//! FHIR transaction-bundle codec

use crate::core::descriptor::{
    BatchRequest, CorrelationKey, OperationDescriptor, OperationKind, OperationResult,
    OperationStatus,
};
use crate::protocol::WireCodec;
use crate::utils::error::{BatchError, Result};
use serde_json::{Value, json};
use tracing::debug;

/// Codec for FHIR R4-style transaction bundles.
///
/// Outbound entries carry `request.method`/`request.url`, a `fullUrl` in
/// `urn:uuid` form for locally-correlated creates, and the conditional-match
/// predicate as an `ifNoneExist` query string. Inbound entries are classified
/// from `response.status` and `response.location`.
#[derive(Debug, Default, Clone)]
pub struct FhirCodec;

impl FhirCodec {
    pub fn new() -> Self {
        Self
    }

    fn encode_entry(descriptor: &OperationDescriptor) -> Value {
        match &descriptor.kind {
            OperationKind::Create {
                collection,
                payload,
                conditional,
            } => {
                let mut request = json!({
                    "method": "POST",
                    "url": collection,
                });
                if let Some(cond) = conditional {
                    request["ifNoneExist"] = Value::String(cond.as_query());
                }
                let mut entry = json!({
                    "resource": payload,
                    "request": request,
                });
                if let CorrelationKey::Local(local) = descriptor.correlation {
                    entry["fullUrl"] = Value::String(local.as_urn());
                }
                entry
            }
            OperationKind::Read { target } => json!({
                "request": {
                    "method": "GET",
                    "url": target.render(),
                }
            }),
        }
    }

    fn decode_entry(descriptor: &OperationDescriptor, entry: &Value) -> OperationResult {
        let response = entry.get("response");
        let status_text = response
            .and_then(|r| r.get("status"))
            .and_then(Value::as_str)
            .unwrap_or_default();

        let Some(code) = leading_status_code(status_text) else {
            return OperationResult {
                correlation: descriptor.correlation,
                status: OperationStatus::Failed,
                permanent_id: None,
                resource: None,
                error_detail: Some(if status_text.is_empty() {
                    "entry carried no response status".to_string()
                } else {
                    format!("unparseable response status: {status_text}")
                }),
            };
        };

        if !(200..300).contains(&code) {
            return OperationResult {
                correlation: descriptor.correlation,
                status: OperationStatus::Failed,
                permanent_id: None,
                resource: None,
                error_detail: Some(entry_diagnostics(entry, status_text)),
            };
        }

        // 201 is the structural fresh-create marker; any other 2xx on a
        // conditional create means the predicate matched an existing entity.
        // The human-readable suffix ("Created"/"OK") is never inspected.
        let status = if code == 201 {
            OperationStatus::Created
        } else {
            OperationStatus::MatchedExisting
        };

        let location = response
            .and_then(|r| r.get("location"))
            .and_then(Value::as_str)
            .map(strip_history_suffix);

        // Reads usually return only the resource body; fall back to the
        // requested target as the permanent id.
        let permanent_id = location.or_else(|| match &descriptor.kind {
            OperationKind::Read { target } => Some(target.render()),
            OperationKind::Create { .. } => None,
        });

        let resource = entry.get("resource").filter(|r| !r.is_null()).cloned();

        OperationResult {
            correlation: descriptor.correlation,
            status,
            permanent_id,
            resource,
            error_detail: None,
        }
    }
}

impl WireCodec for FhirCodec {
    fn content_type(&self) -> &'static str {
        "application/fhir+json"
    }

    fn encode(&self, request: &BatchRequest) -> Result<Vec<u8>> {
        let entries: Vec<Value> = request.entries().iter().map(Self::encode_entry).collect();
        let bundle = json!({
            "resourceType": "Bundle",
            "type": "transaction",
            "entry": entries,
        });
        debug!(entries = request.len(), "encoded transaction bundle");
        Ok(serde_json::to_vec(&bundle)?)
    }

    fn decode(&self, request: &BatchRequest, body: &[u8]) -> Result<Vec<OperationResult>> {
        let bundle: Value = serde_json::from_slice(body)
            .map_err(|e| BatchError::Transport(format!("unparseable response bundle: {e}")))?;

        let empty = Vec::new();
        let entries = bundle
            .get("entry")
            .and_then(Value::as_array)
            .unwrap_or(&empty);

        if entries.len() != request.len() {
            return Err(BatchError::ResponseShapeMismatch {
                expected: request.len(),
                actual: entries.len(),
            });
        }

        Ok(request
            .entries()
            .iter()
            .zip(entries)
            .map(|(descriptor, entry)| Self::decode_entry(descriptor, entry))
            .collect())
    }
}

/// Numeric HTTP code at the front of a FHIR `response.status` value
/// (e.g. `"201 Created"` → 201).
fn leading_status_code(status: &str) -> Option<u16> {
    let digits: &str = status
        .split(|c: char| !c.is_ascii_digit())
        .next()
        .unwrap_or_default();
    digits.parse().ok()
}

/// Drop the `/_history/{vid}` suffix servers append to entry locations.
fn strip_history_suffix(location: &str) -> String {
    location
        .split("/_history")
        .next()
        .unwrap_or(location)
        .to_string()
}

/// Best server-provided detail for a failed entry: OperationOutcome
/// diagnostics when present, otherwise the raw status line.
fn entry_diagnostics(entry: &Value, status_text: &str) -> String {
    let outcome = entry
        .get("response")
        .and_then(|r| r.get("outcome"))
        .or_else(|| entry.get("resource"));

    outcome
        .and_then(|o| o.get("issue"))
        .and_then(Value::as_array)
        .and_then(|issues| issues.first())
        .and_then(|issue| issue.get("diagnostics"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| status_text.to_string())
}
