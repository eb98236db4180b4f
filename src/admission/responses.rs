//! The admission response shapes: allow, and the three denial codes (400
//! bad request, 401 reference-not-found, 403 escalation denied). Each
//! admitter builds its base `AdmissionResponse` from the incoming request
//! (`(&req).into()`) and passes it through one of these to produce the
//! final decision.

use kube::core::admission::AdmissionResponse;

fn deny(mut resp: AdmissionResponse, code: u16, reason: &str, message: impl Into<String>) -> AdmissionResponse {
    resp.allowed = false;
    resp.result.status = Some("Failure".to_string());
    resp.result.message = Some(message.into());
    resp.result.reason = Some(reason.to_string());
    resp.result.code = Some(code as i32);
    resp
}

/// Invariant violation: wrong or missing field, mutated immutable field.
pub fn bad_request(resp: AdmissionResponse, message: impl Into<String>) -> AdmissionResponse {
    deny(resp, 400, "BadRequest", message)
}

/// Reference not found, outside the per-kind not-found-on-delete exceptions.
pub fn not_found(resp: AdmissionResponse, message: impl Into<String>) -> AdmissionResponse {
    deny(resp, 401, "NotFound", message)
}

/// Escalation denied: the message names the covering-rule gap.
pub fn failed_escalation(resp: AdmissionResponse, message: impl Into<String>) -> AdmissionResponse {
    deny(resp, 403, "Forbidden", message)
}
