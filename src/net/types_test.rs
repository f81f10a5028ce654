use super::*;
use serde_json::json;

// =============================================================
// Priority
// =============================================================

#[test]
fn priority_parses_known_values_case_insensitively() {
    assert_eq!(Priority::parse("VERMELHO"), Priority::Vermelho);
    assert_eq!(Priority::parse("laranja"), Priority::Laranja);
    assert_eq!(Priority::parse(" Amarelo "), Priority::Amarelo);
    assert_eq!(Priority::parse("VERDE"), Priority::Verde);
    assert_eq!(Priority::parse("AZUL"), Priority::Azul);
}

#[test]
fn unknown_priority_behaves_like_azul() {
    let unknown = Priority::parse("ROXO");
    let azul = Priority::Azul;
    assert_eq!(unknown, azul);
    assert_eq!(unknown.color(), azul.color());
    assert_eq!(unknown.level(), azul.level());
    assert_eq!(unknown.description(), azul.description());
    assert!(!unknown.is_emergency());
}

#[test]
fn blank_priority_falls_back_to_azul() {
    assert_eq!(Priority::parse(""), Priority::Azul);
}

#[test]
fn priority_orders_by_severity() {
    assert!(Priority::Vermelho > Priority::Laranja);
    assert!(Priority::Laranja > Priority::Amarelo);
    assert!(Priority::Amarelo > Priority::Verde);
    assert!(Priority::Verde > Priority::Azul);
    let mut levels: Vec<u8> = Priority::ALL.iter().map(|p| p.level()).collect();
    levels.dedup();
    assert_eq!(levels, vec![5, 4, 3, 2, 1]);
}

#[test]
fn only_red_and_orange_are_emergencies() {
    let emergencies: Vec<Priority> = Priority::ALL.into_iter().filter(|p| p.is_emergency()).collect();
    assert_eq!(emergencies, vec![Priority::Vermelho, Priority::Laranja]);
}

#[test]
fn priority_serializes_to_wire_name() {
    assert_eq!(serde_json::to_string(&Priority::Amarelo).unwrap(), "\"AMARELO\"");
}

#[test]
fn priority_deserializes_unknown_without_error() {
    let p: Priority = serde_json::from_value(json!("CINZA")).unwrap();
    assert_eq!(p, Priority::Azul);
}

// =============================================================
// TriageResult
// =============================================================

#[test]
fn triage_result_decodes_service_payload() {
    let payload = json!({
        "patient_name": "Ana",
        "classification": {
            "priority": "VERMELHO",
            "color": "#EF4444",
            "description": "Emergência (Risco Imediato)",
            "ticket": "V-123",
            "estimated_wait_time": "Imediato"
        },
        "ai_suggestions": [
            { "disease": "Ansiedade", "probability": 0.15 },
            { "disease": "Infarto Agudo do Miocárdio (IAM)", "probability": 0.88 }
        ]
    });
    let result: TriageResult = serde_json::from_value(payload).unwrap();
    assert_eq!(result.patient_name, "Ana");
    assert_eq!(result.classification.priority, Priority::Vermelho);
    assert_eq!(result.classification.ticket, "V-123");
    assert_eq!(result.ai_suggestions.len(), 2);
    assert_eq!(
        result.top_suggestion().map(|s| s.disease.as_str()),
        Some("Infarto Agudo do Miocárdio (IAM)")
    );
}

#[test]
fn triage_result_accepts_camel_case_aliases() {
    let payload = json!({
        "patientName": "Bia",
        "classification": { "priority": "verde", "ticket": "G-1", "estimatedWaitTime": "60 min" },
        "aiSuggestions": []
    });
    let result: TriageResult = serde_json::from_value(payload).unwrap();
    assert_eq!(result.patient_name, "Bia");
    assert_eq!(result.classification.estimated_wait_time, "60 min");
    assert!(result.top_suggestion().is_none());
}

// =============================================================
// Queue
// =============================================================

#[test]
fn queue_entry_decodes_wait_time_minutes() {
    let entry: QueueEntry = serde_json::from_value(json!({
        "ticket": "L-200",
        "name": "Caio",
        "priority": "LARANJA",
        "complaint": "Febre alta",
        "wait_time_minutes": 12,
        "ai_suggestions": []
    }))
    .unwrap();
    assert_eq!(entry.wait_minutes, 12);
    assert_eq!(entry.priority, Priority::Laranja);
    assert!(entry.arrival_time.is_none());
}

#[test]
fn queue_entry_clamps_negative_wait() {
    let entry: QueueEntry = serde_json::from_value(json!({
        "ticket": "A-1",
        "name": "Dora",
        "priority": "AZUL",
        "wait_time_minutes": -4
    }))
    .unwrap();
    assert_eq!(entry.wait_minutes, 0);
}

#[test]
fn queue_entry_with_unknown_priority_still_decodes() {
    let entry: QueueEntry = serde_json::from_value(json!({
        "ticket": "X-9",
        "name": "Eva",
        "priority": "ULTRAVIOLETA",
        "wait_time_minutes": 3
    }))
    .unwrap();
    assert_eq!(entry.priority, Priority::Azul);
}

#[test]
fn non_string_or_missing_priority_decodes_as_azul() {
    for priority in [json!(null), json!(3), json!({ "level": 5 })] {
        let entry: QueueEntry = serde_json::from_value(json!({
            "ticket": "X-9",
            "name": "Eva",
            "priority": priority,
            "wait_time_minutes": 3
        }))
        .unwrap();
        assert_eq!(entry.priority, Priority::Azul, "priority={priority}");
    }

    let missing: QueueEntry = serde_json::from_value(json!({ "ticket": "X-9", "name": "Eva" })).unwrap();
    assert_eq!(missing.priority, Priority::Azul);
}

#[test]
fn classification_without_priority_decodes_as_azul() {
    let classification: Classification = serde_json::from_value(json!({ "ticket": "A-1" })).unwrap();
    assert_eq!(classification.priority, Priority::Azul);

    let numeric: Classification = serde_json::from_value(json!({ "ticket": "A-1", "priority": 5 })).unwrap();
    assert_eq!(numeric.priority, Priority::Azul);
}

#[test]
fn queue_stats_decodes_service_names() {
    let stats: QueueStats = serde_json::from_value(json!({
        "total_in_queue": 4,
        "emergency_count": 1,
        "avg_wait_time_minutes": 7.5,
        "last_hour_count": 3
    }))
    .unwrap();
    assert_eq!(stats.total_in_queue, 4);
    assert_eq!(stats.emergency_count, 1);
    assert!((stats.avg_wait_minutes - 7.5).abs() < f64::EPSILON);
    assert_eq!(stats.last_hour_count, 3);
}

// =============================================================
// Requests / field errors
// =============================================================

#[test]
fn intake_request_serializes_camel_case_with_age_as_text() {
    let request = IntakeRequest {
        name: "Ana".to_owned(),
        age: "34".to_owned(),
        main_complaint: "dor_peito".to_owned(),
        symptoms: String::new(),
        medical_history: String::new(),
    };
    assert_eq!(
        serde_json::to_value(&request).unwrap(),
        json!({
            "name": "Ana",
            "age": "34",
            "mainComplaint": "dor_peito",
            "symptoms": "",
            "medicalHistory": ""
        })
    );
}

#[test]
fn field_error_uses_last_loc_segment() {
    let err: FieldError = serde_json::from_value(json!({
        "loc": ["body", "age"],
        "msg": "field required",
        "type": "value_error.missing"
    }))
    .unwrap();
    assert_eq!(err.field(), "age");
    assert_eq!(err.display_line(), "age: field required");
}

#[test]
fn field_error_without_loc_names_request() {
    let err = FieldError { loc: vec![], msg: "bad".to_owned() };
    assert_eq!(err.display_line(), "request: bad");
}
