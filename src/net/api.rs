//! Typed calls against the triage service contract.
//!
//! ARCHITECTURE
//! ============
//! One function per service operation. Path building is kept in small pure
//! helpers so it can be unit tested without a transport.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use serde::Deserialize;
use tracing::info;

use super::gateway::{Access, ApiRequest, Gateway, GatewayError};
use super::types::{IntakeRequest, QueueEntry, QueueStats, RegisterRequest, TriageResult};

fn attend_endpoint(ticket: &str) -> String {
    format!("/attend/{}", encode_segment(ticket))
}

fn resolve_endpoint(ticket: &str) -> String {
    format!("/resolve/{}", encode_segment(ticket))
}

/// Percent-encode a single path segment (tickets are normally `V-123`).
fn encode_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Exchange username/password for a bearer credential via `POST /token`.
///
/// The credential is returned, not stored; the caller decides when to log in.
///
/// # Errors
///
/// Returns `RequestFailed` with the server's `detail` on rejection.
pub async fn authenticate(gateway: &Gateway, username: &str, password: &str) -> Result<String, GatewayError> {
    let request = ApiRequest::post("/token", Access::Public).form(&[("username", username), ("password", password)]);
    let body: TokenResponse = gateway.send_json(request).await?;
    Ok(body.access_token)
}

/// Create an operator account via `POST /users/register`.
///
/// # Errors
///
/// Returns `RequestFailed` (or `Validation`) when the service rejects it.
pub async fn register(gateway: &Gateway, account: &RegisterRequest) -> Result<serde_json::Value, GatewayError> {
    let body = serde_json::to_value(account).map_err(|e| GatewayError::RequestFailed(e.to_string()))?;
    let created = gateway
        .send(ApiRequest::post("/users/register", Access::Public).json(body))
        .await?;
    info!(username = %account.username, "operator account registered");
    Ok(created)
}

/// Submit intake data for classification via `POST /triage`.
///
/// # Errors
///
/// Returns `Validation` for 422 field errors, `RequestFailed` otherwise.
pub async fn submit_triage(gateway: &Gateway, intake: &IntakeRequest) -> Result<TriageResult, GatewayError> {
    let body = serde_json::to_value(intake).map_err(|e| GatewayError::RequestFailed(e.to_string()))?;
    gateway
        .send_json(ApiRequest::post("/triage", Access::Public).json(body))
        .await
}

/// # Errors
///
/// `AuthExpired` on 401, `RequestFailed` otherwise.
pub async fn list_patients(gateway: &Gateway) -> Result<Vec<QueueEntry>, GatewayError> {
    gateway
        .send_json(ApiRequest::get("/patients", Access::Protected))
        .await
}

/// # Errors
///
/// `AuthExpired` on 401, `RequestFailed` otherwise.
pub async fn fetch_stats(gateway: &Gateway) -> Result<QueueStats, GatewayError> {
    gateway
        .send_json(ApiRequest::get("/stats", Access::Protected))
        .await
}

/// Remove a patient from the queue via `POST /attend/{ticket}`.
///
/// # Errors
///
/// `AuthExpired` on 401, `RequestFailed` otherwise (e.g. unknown ticket).
pub async fn attend(gateway: &Gateway, ticket: &str) -> Result<(), GatewayError> {
    gateway
        .send(ApiRequest::post(attend_endpoint(ticket), Access::Protected))
        .await
        .map(|_| ())
}

/// Close a ticket with a final diagnosis via `POST /resolve/{ticket}`.
///
/// # Errors
///
/// `AuthExpired` on 401, `RequestFailed` otherwise.
pub async fn resolve(gateway: &Gateway, ticket: &str, final_diagnosis: &str) -> Result<(), GatewayError> {
    let request = ApiRequest::post(resolve_endpoint(ticket), Access::Protected)
        .json(serde_json::json!({ "final_diagnosis": final_diagnosis }));
    gateway.send(request).await.map(|_| ())
}
