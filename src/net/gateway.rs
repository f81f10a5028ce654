//! Request gateway: every call to the triage service goes through here.
//!
//! SYSTEM CONTEXT
//! ==============
//! The gateway attaches the session credential to protected calls and maps
//! raw HTTP outcomes onto the three failure shapes callers switch on:
//! `AuthExpired`, `Validation` and `RequestFailed`. It never logs the user out
//! itself; the caller runs the auth-expiry path (see `util::auth`).
//!
//! ERROR HANDLING
//! ==============
//! Each call is attempted exactly once. There is no retry or backoff here;
//! re-invocation belongs to the operator or the next scheduled poll.

#[cfg(test)]
#[path = "gateway_test.rs"]
mod gateway_test;

use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::types::FieldError;
use crate::state::session::Session;

/// Shown when the service cannot be reached or gives no usable message.
pub const NETWORK_FAILURE_MESSAGE: &str = "could not reach the triage server";

/// Shown when a success response cannot be decoded.
pub const UNEXPECTED_RESPONSE_MESSAGE: &str = "unexpected response from the triage server";

// =============================================================================
// TRANSPORT SEAM
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// Whether a call requires the session credential.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Public,
    Protected,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Form(Vec<(String, String)>),
}

/// A fully resolved request handed to the transport.
#[derive(Clone, Debug, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    /// Path relative to the service base URL, e.g. `/patients`.
    pub path: String,
    /// `Bearer <credential>` when attached.
    pub authorization: Option<String>,
    pub body: RequestBody,
}

/// Raw response: status plus undecoded body text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Network-level failure: the request never produced an HTTP status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transport failed: {0}")]
pub struct TransportError(pub String);

/// Sends one request and returns the raw response.
#[async_trait::async_trait(?Send)]
pub trait Transport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

// =============================================================================
// REQUEST / ERROR
// =============================================================================

/// Description of one call to the triage service.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub access: Access,
    pub body: RequestBody,
}

impl ApiRequest {
    #[must_use]
    pub fn get(path: impl Into<String>, access: Access) -> Self {
        Self { method: Method::Get, path: path.into(), access, body: RequestBody::Empty }
    }

    #[must_use]
    pub fn post(path: impl Into<String>, access: Access) -> Self {
        Self { method: Method::Post, path: path.into(), access, body: RequestBody::Empty }
    }

    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    #[must_use]
    pub fn form(mut self, fields: &[(&str, &str)]) -> Self {
        self.body = RequestBody::Form(
            fields
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
        );
        self
    }
}

/// Failure reported to gateway callers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    /// A protected call was rejected with 401.
    #[error("session expired; please log in again")]
    AuthExpired,

    /// 422 with structured per-field detail.
    #[error("{}", join_field_errors(.0))]
    Validation(Vec<FieldError>),

    /// Any other non-success or network failure.
    #[error("{0}")]
    RequestFailed(String),
}

impl GatewayError {
    #[must_use]
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthExpired)
    }
}

/// Join field errors into one display message, one `field: reason` per error.
#[must_use]
pub fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(FieldError::display_line)
        .collect::<Vec<_>>()
        .join("; ")
}

// =============================================================================
// GATEWAY
// =============================================================================

/// Cloneable gateway handle; clones share transport and session.
#[derive(Clone)]
pub struct Gateway {
    transport: Rc<dyn Transport>,
    session: Session,
}

impl Gateway {
    pub fn new(transport: Rc<dyn Transport>, session: Session) -> Self {
        Self { transport, session }
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Issue a call and return the decoded JSON body (`Null` for empty bodies).
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::AuthExpired`] on a protected 401,
    /// [`GatewayError::Validation`] on a structured 422, and
    /// [`GatewayError::RequestFailed`] for anything else that is not 2xx.
    pub async fn send(&self, request: ApiRequest) -> Result<Value, GatewayError> {
        let authorization = match request.access {
            Access::Protected => self.session.credential().map(|c| bearer(&c)),
            Access::Public => None,
        };
        let label = format!("{} {}", request.method.as_str(), request.path);
        let http = HttpRequest {
            method: request.method,
            path: request.path,
            authorization,
            body: request.body,
        };

        let response = self.transport.send(http).await.map_err(|e| {
            warn!(request = %label, error = %e, "request did not reach the triage server");
            GatewayError::RequestFailed(NETWORK_FAILURE_MESSAGE.to_owned())
        })?;

        debug!(request = %label, status = response.status, "response received");
        classify_response(request.access, &response)
    }

    /// Issue a call and decode the success body into `T`.
    ///
    /// # Errors
    ///
    /// As [`Gateway::send`], plus `RequestFailed` when the body does not decode.
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, GatewayError> {
        let value = self.send(request).await?;
        serde_json::from_value(value).map_err(|e| {
            warn!(error = %e, "response body did not match the expected shape");
            GatewayError::RequestFailed(UNEXPECTED_RESPONSE_MESSAGE.to_owned())
        })
    }
}

/// `Authorization` header value for a stored credential.
#[must_use]
pub fn bearer(credential: &str) -> String {
    format!("Bearer {credential}")
}

fn classify_response(access: Access, response: &HttpResponse) -> Result<Value, GatewayError> {
    let body = parse_body(&response.body);
    if (200..300).contains(&response.status) {
        return match body {
            Some(value) => Ok(value),
            None if response.body.trim().is_empty() => Ok(Value::Null),
            None => Err(GatewayError::RequestFailed(UNEXPECTED_RESPONSE_MESSAGE.to_owned())),
        };
    }

    if response.status == 401 && access == Access::Protected {
        return Err(GatewayError::AuthExpired);
    }

    let detail = body.as_ref().and_then(|v| v.get("detail"));
    if response.status == 422 {
        if let Some(errors) = detail.and_then(field_errors) {
            return Err(GatewayError::Validation(errors));
        }
    }

    Err(GatewayError::RequestFailed(
        detail.and_then(detail_message).unwrap_or_else(|| NETWORK_FAILURE_MESSAGE.to_owned()),
    ))
}

fn parse_body(raw: &str) -> Option<Value> {
    if raw.trim().is_empty() {
        return None;
    }
    serde_json::from_str(raw).ok()
}

fn field_errors(detail: &Value) -> Option<Vec<FieldError>> {
    let items = detail.as_array()?;
    if items.is_empty() {
        return None;
    }
    items
        .iter()
        .map(|item| serde_json::from_value::<FieldError>(item.clone()).ok())
        .collect()
}

fn detail_message(detail: &Value) -> Option<String> {
    match detail {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Array(items) => {
            let lines: Vec<String> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str).map(ToOwned::to_owned))
                .collect();
            (!lines.is_empty()).then(|| lines.join("; "))
        }
        _ => None,
    }
}
