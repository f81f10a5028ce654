//! Shared wire DTOs for the client/triage-service boundary.
//!
//! DESIGN
//! ======
//! Field names mirror the triage service's snake_case JSON. camelCase aliases
//! are accepted on input so older payload shapes still decode. Decoding is
//! deliberately lenient where the UI must never fail: unknown priorities
//! collapse to `AZUL` and negative wait times clamp to zero.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// PRIORITY
// =============================================================================

/// Manchester-style severity level assigned by the triage service.
///
/// Ordering follows severity: `Vermelho > Laranja > Amarelo > Verde > Azul`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Vermelho,
    Laranja,
    Amarelo,
    Verde,
    /// Lowest severity; also the fallback for unrecognized values.
    #[default]
    Azul,
}

impl Priority {
    /// All priorities, most severe first.
    pub const ALL: [Priority; 5] = [
        Priority::Vermelho,
        Priority::Laranja,
        Priority::Amarelo,
        Priority::Verde,
        Priority::Azul,
    ];

    /// Parse a wire value. Never fails: anything unrecognized becomes `Azul`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "VERMELHO" => Self::Vermelho,
            "LARANJA" => Self::Laranja,
            "AMARELO" => Self::Amarelo,
            "VERDE" => Self::Verde,
            _ => Self::Azul,
        }
    }

    /// Wire name, e.g. `"VERMELHO"`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vermelho => "VERMELHO",
            Self::Laranja => "LARANJA",
            Self::Amarelo => "AMARELO",
            Self::Verde => "VERDE",
            Self::Azul => "AZUL",
        }
    }

    /// Numeric severity, 5 (most urgent) down to 1.
    #[must_use]
    pub fn level(self) -> u8 {
        match self {
            Self::Vermelho => 5,
            Self::Laranja => 4,
            Self::Amarelo => 3,
            Self::Verde => 2,
            Self::Azul => 1,
        }
    }

    /// Display color (hex).
    #[must_use]
    pub fn color(self) -> &'static str {
        match self {
            Self::Vermelho => "#EF4444",
            Self::Laranja => "#F97316",
            Self::Amarelo => "#EAB308",
            Self::Verde => "#22C55E",
            Self::Azul => "#3B82F6",
        }
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Vermelho => "Emergency (immediate risk)",
            Self::Laranja => "Very urgent",
            Self::Amarelo => "Urgent",
            Self::Verde => "Less urgent",
            Self::Azul => "Not urgent",
        }
    }

    /// Target wait shown to the patient.
    #[must_use]
    pub fn wait_hint(self) -> &'static str {
        match self {
            Self::Vermelho => "Immediate",
            Self::Laranja => "10 min",
            Self::Amarelo => "30 min",
            Self::Verde => "60 min",
            Self::Azul => "120 min",
        }
    }

    /// Whether this level counts toward the dashboard emergency total.
    #[must_use]
    pub fn is_emergency(self) -> bool {
        matches!(self, Self::Vermelho | Self::Laranja)
    }
}

impl From<String> for Priority {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

/// Any JSON value decodes: strings go through [`Priority::parse`], and
/// `null`, numbers or other shapes become `Azul`.
impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Ok(raw.as_str().map_or(Self::Azul, Self::parse))
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.level().cmp(&other.level())
    }
}

// =============================================================================
// TRIAGE RESULT
// =============================================================================

/// One AI diagnosis suggestion with its probability in `[0, 1]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisSuggestion {
    pub disease: String,
    pub probability: f64,
}

/// Priority classification returned by the rule engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub description: String,
    pub ticket: String,
    #[serde(default, alias = "estimatedWaitTime")]
    pub estimated_wait_time: String,
}

/// Full response to a triage submission.
///
/// Created once per successful submission and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TriageResult {
    #[serde(alias = "patientName")]
    pub patient_name: String,
    pub classification: Classification,
    #[serde(default, alias = "aiSuggestions")]
    pub ai_suggestions: Vec<DiagnosisSuggestion>,
}

impl TriageResult {
    /// Highest-probability suggestion, if any were returned.
    #[must_use]
    pub fn top_suggestion(&self) -> Option<&DiagnosisSuggestion> {
        self.ai_suggestions
            .iter()
            .max_by(|a, b| a.probability.total_cmp(&b.probability))
    }
}

// =============================================================================
// QUEUE
// =============================================================================

/// A patient waiting in the server-owned queue.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Unique within the queue.
    pub ticket: String,
    pub name: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub priority_color: Option<String>,
    #[serde(default)]
    pub priority_description: Option<String>,
    #[serde(default)]
    pub complaint: String,
    #[serde(
        rename = "wait_time_minutes",
        alias = "waitMinutes",
        default,
        deserialize_with = "deserialize_minutes"
    )]
    pub wait_minutes: u32,
    #[serde(default, alias = "aiSuggestions")]
    pub ai_suggestions: Vec<DiagnosisSuggestion>,
    #[serde(default, alias = "arrivalTime")]
    pub arrival_time: Option<String>,
}

/// Aggregate queue statistics, replaced wholesale on every poll.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueStats {
    #[serde(alias = "totalInQueue")]
    pub total_in_queue: u32,
    #[serde(alias = "emergencyCount")]
    pub emergency_count: u32,
    #[serde(rename = "avg_wait_time_minutes", alias = "avgWaitMinutes")]
    pub avg_wait_minutes: f64,
    #[serde(alias = "lastHourCount")]
    pub last_hour_count: u32,
}

// =============================================================================
// REQUESTS / ERRORS
// =============================================================================

/// Body of `POST /triage`. Age is sent exactly as typed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeRequest {
    pub name: String,
    pub age: String,
    pub main_complaint: String,
    pub symptoms: String,
    pub medical_history: String,
}

/// Body of `POST /users/register`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub full_name: String,
}

/// One structured field error from a 422 response (`{loc, msg}`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    #[serde(default)]
    pub loc: Vec<serde_json::Value>,
    pub msg: String,
}

impl FieldError {
    /// The offending field name: last element of `loc` (e.g. `["body", "age"]` -> `age`).
    #[must_use]
    pub fn field(&self) -> String {
        match self.loc.last() {
            Some(serde_json::Value::String(name)) => name.clone(),
            Some(other) => other.to_string(),
            None => "request".to_owned(),
        }
    }

    /// `"<field>: <reason>"` line for display.
    #[must_use]
    pub fn display_line(&self) -> String {
        format!("{}: {}", self.field(), self.msg)
    }
}

fn deserialize_minutes<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    if !raw.is_finite() || raw <= 0.0 {
        return Ok(0);
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(raw.min(f64::from(u32::MAX)) as u32)
}
