use super::*;
use crate::test_helpers::{MockTransport, Reply, anonymous_gateway, triage_result_json};
use serde_json::json;

fn wizard() -> (WizardController, std::rc::Rc<MockTransport>) {
    let transport = MockTransport::new();
    (WizardController::new(anonymous_gateway(&transport)), transport)
}

fn wizard_at_details() -> (WizardController, std::rc::Rc<MockTransport>) {
    let (mut w, transport) = wizard();
    w.set_name("Ana").unwrap();
    w.set_age("34").unwrap();
    w.advance().unwrap();
    w.select_complaint("dor_peito").unwrap();
    w.advance().unwrap();
    (w, transport)
}

// =============================================================
// Basics gating
// =============================================================

#[test]
fn basics_blocked_iff_name_or_age_blank_after_trim() {
    let cases = [
        ("", "", false),
        ("Ana", "", false),
        ("", "34", false),
        ("   ", "34", false),
        ("Ana", " \t ", false),
        ("Ana", "34", true),
        ("  Ana ", " 34", true),
    ];
    for (name, age, allowed) in cases {
        let (mut w, _) = wizard();
        w.set_name(name).unwrap();
        w.set_age(age).unwrap();
        assert_eq!(w.can_advance(), allowed, "name={name:?} age={age:?}");
        let result = w.advance();
        if allowed {
            assert_eq!(result, Ok(WizardStep::ComplaintSelection));
        } else {
            assert_eq!(result, Err(StepError::MissingBasics));
            assert_eq!(w.step(), WizardStep::Basics);
        }
    }
}

#[test]
fn age_is_kept_as_entered_text() {
    let (mut w, _) = wizard();
    w.set_age(" 034 anos").unwrap();
    assert_eq!(w.form().to_request().age, " 034 anos");
}

// =============================================================
// Complaint selection
// =============================================================

#[test]
fn complaint_step_requires_mode_then_value() {
    let (mut w, _) = wizard();
    w.set_name("Ana").unwrap();
    w.set_age("34").unwrap();
    w.advance().unwrap();

    assert_eq!(w.advance(), Err(StepError::MissingComplaintMode));
    w.set_complaint_mode(ComplaintMode::FreeText).unwrap();
    assert_eq!(w.advance(), Err(StepError::MissingComplaint));
    w.set_main_complaint("dor nas costas").unwrap();
    assert_eq!(w.advance(), Ok(WizardStep::Details));
}

#[test]
fn list_to_free_text_clears_selected_option_key() {
    let (mut w, _) = wizard();
    w.select_complaint("febre_alta").unwrap();
    w.set_complaint_mode(ComplaintMode::FreeText).unwrap();
    assert_eq!(w.form().main_complaint, "");
    assert_eq!(w.form().complaint_mode, ComplaintMode::FreeText);
}

#[test]
fn list_to_free_text_keeps_non_option_value() {
    let (mut w, _) = wizard();
    w.set_complaint_mode(ComplaintMode::List).unwrap();
    w.set_main_complaint("tosse seca").unwrap();
    w.set_complaint_mode(ComplaintMode::FreeText).unwrap();
    assert_eq!(w.form().main_complaint, "tosse seca");
}

#[test]
fn free_text_to_list_never_clears() {
    let (mut w, _) = wizard();
    w.set_complaint_mode(ComplaintMode::FreeText).unwrap();
    w.set_main_complaint("dor_peito").unwrap();
    w.set_complaint_mode(ComplaintMode::List).unwrap();
    assert_eq!(w.form().main_complaint, "dor_peito");
}

#[test]
fn unknown_complaint_key_is_rejected() {
    let (mut w, _) = wizard();
    assert_eq!(
        w.select_complaint("dor_de_cotovelo"),
        Err(StepError::UnknownComplaint("dor_de_cotovelo".to_owned()))
    );
    assert_eq!(w.form().complaint_mode, ComplaintMode::Unset);
}

#[test]
fn every_option_key_is_predefined() {
    for option in COMPLAINT_OPTIONS {
        assert!(is_predefined_complaint(option.key));
        assert!(!option.label.is_empty());
    }
    assert!(!is_predefined_complaint("Chest pain"));
}

// =============================================================
// Backward navigation
// =============================================================

#[test]
fn back_walks_to_previous_steps() {
    let (mut w, _) = wizard_at_details();
    assert_eq!(w.back(), Ok(WizardStep::ComplaintSelection));
    assert_eq!(w.back(), Ok(WizardStep::Basics));
    assert!(matches!(w.back(), Err(StepError::InvalidTransition { .. })));
    assert_eq!(w.form().name, "Ana");
}

#[test]
fn details_cannot_advance_without_submit() {
    let (mut w, _) = wizard_at_details();
    assert!(matches!(w.advance(), Err(StepError::InvalidTransition { .. })));
}

#[test]
fn form_is_read_only_while_submitting() {
    let (mut w, _) = wizard_at_details();
    w.begin_submission().unwrap();
    assert_eq!(w.step(), WizardStep::Submitting);
    assert_eq!(w.set_name("Bia"), Err(StepError::Locked(WizardStep::Submitting)));
    assert_eq!(w.back(), Err(StepError::Locked(WizardStep::Submitting)));
    assert_eq!(w.form().name, "Ana");
}

#[test]
fn outcome_is_ignored_outside_submission() {
    let (mut w, _) = wizard();
    let step = w.complete_submission(SubmissionOutcome::GenericError("late".to_owned()));
    assert_eq!(step, WizardStep::Basics);
    assert!(w.error().is_none());
}

// =============================================================
// Submission
// =============================================================

#[tokio::test]
async fn successful_submission_lands_on_result() {
    let (mut w, transport) = wizard_at_details();
    transport.set("POST /triage", Reply::ok(triage_result_json("Ana", "VERMELHO")));

    assert_eq!(w.submit().await, Ok(WizardStep::Result));
    let result = w.result().unwrap();
    assert_eq!(result.patient_name, "Ana");
    assert_eq!(result.classification.ticket, "V-101");
    assert!(w.error().is_none());
    assert_eq!(w.set_age("40"), Err(StepError::Locked(WizardStep::Result)));
}

#[tokio::test]
async fn submission_sends_form_verbatim() {
    let (mut w, transport) = wizard_at_details();
    transport.set("POST /triage", Reply::ok(triage_result_json("Ana", "VERMELHO")));
    w.submit().await.unwrap();

    assert_eq!(
        transport.requests()[0].body,
        crate::net::gateway::RequestBody::Json(json!({
            "name": "Ana",
            "age": "34",
            "mainComplaint": "dor_peito",
            "symptoms": "",
            "medicalHistory": ""
        }))
    );
}

#[tokio::test]
async fn restart_after_result_clears_everything() {
    let (mut w, transport) = wizard_at_details();
    transport.set("POST /triage", Reply::ok(triage_result_json("Ana", "VERMELHO")));
    w.submit().await.unwrap();

    w.restart();
    assert_eq!(w.step(), WizardStep::Basics);
    assert_eq!(w.form(), &IntakeForm::default());
    assert!(w.result().is_none());
    assert!(w.error().is_none());
}

#[tokio::test]
async fn field_errors_return_to_details_with_one_line_each() {
    let (mut w, transport) = wizard_at_details();
    transport.set(
        "POST /triage",
        Reply::Json(
            422,
            json!({ "detail": [
                { "loc": ["body", "age"], "msg": "value is not a valid integer" },
                { "loc": ["body", "symptoms"], "msg": "field required" }
            ]}),
        ),
    );

    assert_eq!(w.submit().await, Ok(WizardStep::Details));
    assert!(w.result().is_none());
    let error = w.error().unwrap();
    assert_eq!(
        error.lines(),
        vec!["age: value is not a valid integer".to_owned(), "symptoms: field required".to_owned()]
    );
    assert_eq!(error.message(), "age: value is not a valid integer; symptoms: field required");
}

#[tokio::test]
async fn generic_failure_shows_server_message() {
    let (mut w, transport) = wizard_at_details();
    transport.set("POST /triage", Reply::status(500, "Erro interno no servidor: boom"));

    assert_eq!(w.submit().await, Ok(WizardStep::Details));
    assert_eq!(
        w.error(),
        Some(&SubmissionError::Message("Erro interno no servidor: boom".to_owned()))
    );
}

#[tokio::test]
async fn network_failure_shows_default_message() {
    let (mut w, transport) = wizard_at_details();
    transport.set("POST /triage", Reply::Network("dns failure".to_owned()));

    assert_eq!(w.submit().await, Ok(WizardStep::Details));
    assert_eq!(w.error().map(SubmissionError::message).as_deref(), Some(NETWORK_FAILURE_MESSAGE));
}

#[tokio::test]
async fn retry_after_failure_can_succeed() {
    let (mut w, transport) = wizard_at_details();
    transport.push("POST /triage", Reply::Network("offline".to_owned()));
    transport.push("POST /triage", Reply::ok(triage_result_json("Ana", "LARANJA")));

    assert_eq!(w.submit().await, Ok(WizardStep::Details));
    assert_eq!(w.submit().await, Ok(WizardStep::Result));
    assert!(w.error().is_none());
}

#[tokio::test]
async fn submit_outside_details_is_refused_without_a_call() {
    let (mut w, transport) = wizard();
    assert!(matches!(w.submit().await, Err(StepError::InvalidTransition { .. })));
    assert!(transport.requests().is_empty());
}

#[test]
fn auth_expired_outcome_is_rendered_as_message() {
    let outcome = SubmissionOutcome::from(Err(GatewayError::AuthExpired));
    assert!(matches!(outcome, SubmissionOutcome::GenericError(_)));
}
