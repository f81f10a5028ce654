//! Shared fixtures for unit tests: a scripted transport and a recording navigator.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use serde_json::{Value, json};
use tokio::sync::Notify;

use crate::net::gateway::{Gateway, HttpRequest, HttpResponse, Transport, TransportError};
use crate::net::types::{QueueEntry, QueueStats};
use crate::state::session::{MemoryStorage, Session};
use crate::util::guard::{Navigator, Route};

// =========================================================================
// MockTransport
// =========================================================================

/// Scripted reply for one request.
#[derive(Clone)]
pub(crate) enum Reply {
    Json(u16, Value),
    Text(u16, String),
    Network(String),
    /// Hold the reply until the gate is notified.
    Gated(Rc<Notify>, Box<Reply>),
}

impl Reply {
    pub(crate) fn ok(body: Value) -> Self {
        Self::Json(200, body)
    }

    pub(crate) fn no_content() -> Self {
        Self::Text(204, String::new())
    }

    pub(crate) fn status(status: u16, detail: &str) -> Self {
        Self::Json(status, json!({ "detail": detail }))
    }

    pub(crate) fn unauthorized() -> Self {
        Self::status(401, "Could not validate credentials")
    }

    pub(crate) fn gated(self, gate: &Rc<Notify>) -> Self {
        Self::Gated(gate.clone(), Box::new(self))
    }
}

/// Routes are keyed `"<METHOD> <path>"`. Queued replies are consumed first,
/// then the sticky fallback for the route applies.
#[derive(Default)]
pub(crate) struct MockTransport {
    queued: RefCell<HashMap<String, VecDeque<Reply>>>,
    fallback: RefCell<HashMap<String, Reply>>,
    log: RefCell<Vec<HttpRequest>>,
}

impl MockTransport {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub(crate) fn push(&self, route: &str, reply: Reply) {
        self.queued
            .borrow_mut()
            .entry(route.to_owned())
            .or_default()
            .push_back(reply);
    }

    pub(crate) fn set(&self, route: &str, reply: Reply) {
        self.fallback.borrow_mut().insert(route.to_owned(), reply);
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.log.borrow().clone()
    }

    pub(crate) fn count(&self, route: &str) -> usize {
        self.log
            .borrow()
            .iter()
            .filter(|r| route_key(r) == route)
            .count()
    }

    fn next_reply(&self, key: &str) -> Reply {
        if let Some(reply) = self.queued.borrow_mut().get_mut(key).and_then(VecDeque::pop_front) {
            return reply;
        }
        self.fallback
            .borrow()
            .get(key)
            .cloned()
            .unwrap_or_else(|| Reply::status(404, "no mock route"))
    }
}

fn route_key(request: &HttpRequest) -> String {
    format!("{} {}", request.method.as_str(), request.path)
}

#[async_trait::async_trait(?Send)]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let key = route_key(&request);
        self.log.borrow_mut().push(request);
        let mut reply = self.next_reply(&key);
        loop {
            match reply {
                Reply::Gated(gate, inner) => {
                    gate.notified().await;
                    reply = *inner;
                }
                Reply::Json(status, body) => return Ok(HttpResponse { status, body: body.to_string() }),
                Reply::Text(status, body) => return Ok(HttpResponse { status, body }),
                Reply::Network(message) => return Err(TransportError(message)),
            }
        }
    }
}

// =========================================================================
// Navigator
// =========================================================================

#[derive(Default)]
pub(crate) struct RecordingNavigator {
    visits: RefCell<Vec<(Route, bool)>>,
}

impl RecordingNavigator {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub(crate) fn visits(&self) -> Vec<(Route, bool)> {
        self.visits.borrow().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: Route, session_expired: bool) {
        self.visits.borrow_mut().push((route, session_expired));
    }
}

// =========================================================================
// Builders
// =========================================================================

pub(crate) fn authed_gateway(transport: &Rc<MockTransport>) -> Gateway {
    let session = Session::restore(MemoryStorage::with_token("tok-123"));
    Gateway::new(transport.clone(), session)
}

pub(crate) fn anonymous_gateway(transport: &Rc<MockTransport>) -> Gateway {
    Gateway::new(transport.clone(), Session::ephemeral())
}

pub(crate) fn entry_json(ticket: &str, priority: &str, wait: u32) -> Value {
    json!({
        "ticket": ticket,
        "name": format!("Patient {ticket}"),
        "priority": priority,
        "priority_color": "#000000",
        "priority_description": "",
        "complaint": "Dor peito",
        "wait_time_minutes": wait,
        "ai_suggestions": [{ "disease": "A ser avaliado", "probability": 0.99 }],
        "arrival_time": "2025-01-01T10:00:00"
    })
}

pub(crate) fn entry(ticket: &str, priority: &str, wait: u32) -> QueueEntry {
    serde_json::from_value(entry_json(ticket, priority, wait)).expect("fixture entry decodes")
}

pub(crate) fn stats_json(total: u32, emergencies: u32) -> Value {
    json!({
        "total_in_queue": total,
        "emergency_count": emergencies,
        "avg_wait_time_minutes": 4.0,
        "last_hour_count": total
    })
}

pub(crate) fn stats(total: u32, emergencies: u32) -> QueueStats {
    serde_json::from_value(stats_json(total, emergencies)).expect("fixture stats decode")
}

pub(crate) fn triage_result_json(name: &str, priority: &str) -> Value {
    json!({
        "patient_name": name,
        "classification": {
            "priority": priority,
            "color": "#EF4444",
            "description": "Emergência (Risco Imediato)",
            "ticket": "V-101",
            "estimated_wait_time": "Imediato"
        },
        "ai_suggestions": [
            { "disease": "Infarto Agudo do Miocárdio (IAM)", "probability": 0.88 },
            { "disease": "Embolia Pulmonar (TEP)", "probability": 0.42 }
        ]
    })
}
