//! Intake wizard: step state machine, per-step gating and submission.
//!
//! SYSTEM CONTEXT
//! ==============
//! The kiosk walks a patient through `Basics -> ComplaintSelection -> Details`,
//! submits to the triage service, then shows the classification. A failed
//! submission always lands back on `Details` with a message, never on a
//! blank loading step.
//!
//! DESIGN
//! ======
//! `submit` holds `&mut self` across the network call, so the form cannot be
//! edited while a submission is in flight. The setters also refuse edits in
//! `Submitting`/`Result` for front ends that drive the two halves
//! (`begin_submission` / `complete_submission`) separately.

#[cfg(test)]
#[path = "wizard_test.rs"]
mod wizard_test;

use tracing::{info, warn};

use crate::net::api;
use crate::net::gateway::{Gateway, GatewayError, NETWORK_FAILURE_MESSAGE};
use crate::net::types::{FieldError, IntakeRequest, TriageResult};

// =============================================================================
// COMPLAINT OPTIONS
// =============================================================================

/// A predefined main-complaint choice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComplaintOption {
    /// Wire key sent as `mainComplaint`.
    pub key: &'static str,
    pub label: &'static str,
}

pub const COMPLAINT_OPTIONS: &[ComplaintOption] = &[
    ComplaintOption { key: "dor_peito", label: "Chest pain" },
    ComplaintOption { key: "dificuldade_respirar", label: "Difficulty breathing" },
    ComplaintOption { key: "perda_controle_facial", label: "Loss of facial control" },
    ComplaintOption { key: "febre_alta", label: "High fever" },
    ComplaintOption { key: "dor_abdominal", label: "Abdominal pain" },
    ComplaintOption { key: "tontura_desmaio", label: "Dizziness or fainting" },
    ComplaintOption { key: "ferimento_corte", label: "Wound or cut" },
    ComplaintOption { key: "reacao_alergica", label: "Allergic reaction" },
    ComplaintOption { key: "outros", label: "Other" },
];

#[must_use]
pub fn complaint_option(key: &str) -> Option<&'static ComplaintOption> {
    COMPLAINT_OPTIONS.iter().find(|option| option.key == key)
}

#[must_use]
pub fn is_predefined_complaint(value: &str) -> bool {
    complaint_option(value).is_some()
}

// =============================================================================
// FORM
// =============================================================================

/// How the operator is entering the main complaint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ComplaintMode {
    #[default]
    Unset,
    List,
    FreeText,
}

/// Intake data collected across the wizard steps.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IntakeForm {
    pub name: String,
    /// Kept as typed; never coerced to a number.
    pub age: String,
    pub main_complaint: String,
    pub symptoms: String,
    pub medical_history: String,
    pub complaint_mode: ComplaintMode,
}

impl IntakeForm {
    #[must_use]
    pub fn basics_complete(&self) -> bool {
        !self.name.trim().is_empty() && !self.age.trim().is_empty()
    }

    #[must_use]
    pub fn complaint_complete(&self) -> bool {
        self.complaint_mode != ComplaintMode::Unset && !self.main_complaint.trim().is_empty()
    }

    /// Serialize verbatim for `POST /triage`.
    #[must_use]
    pub fn to_request(&self) -> IntakeRequest {
        IntakeRequest {
            name: self.name.clone(),
            age: self.age.clone(),
            main_complaint: self.main_complaint.clone(),
            symptoms: self.symptoms.clone(),
            medical_history: self.medical_history.clone(),
        }
    }
}

// =============================================================================
// STEPS / ERRORS
// =============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WizardStep {
    #[default]
    Basics,
    ComplaintSelection,
    Details,
    Submitting,
    Result,
}

/// Why a wizard action was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StepError {
    #[error("name and age are required")]
    MissingBasics,
    #[error("choose how to describe the main complaint")]
    MissingComplaintMode,
    #[error("main complaint is required")]
    MissingComplaint,
    #[error("unknown complaint option `{0}`")]
    UnknownComplaint(String),
    #[error("intake is read-only while {0:?}")]
    Locked(WizardStep),
    #[error("cannot {action} from {step:?}")]
    InvalidTransition { action: &'static str, step: WizardStep },
}

/// Submission result, switched on exhaustively by the wizard.
#[derive(Clone, Debug, PartialEq)]
pub enum SubmissionOutcome {
    Ok(TriageResult),
    FieldErrors(Vec<FieldError>),
    GenericError(String),
}

impl From<Result<TriageResult, GatewayError>> for SubmissionOutcome {
    fn from(result: Result<TriageResult, GatewayError>) -> Self {
        match result {
            Ok(triage) => Self::Ok(triage),
            Err(GatewayError::Validation(errors)) => Self::FieldErrors(errors),
            Err(GatewayError::RequestFailed(message)) => Self::GenericError(message),
            // Intake is public; an expired credential cannot block it.
            Err(err @ GatewayError::AuthExpired) => Self::GenericError(err.to_string()),
        }
    }
}

/// Error shown on the `Details` step after a failed submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmissionError {
    /// One `field: reason` line per offending field.
    Fields(Vec<String>),
    Message(String),
}

impl SubmissionError {
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        match self {
            Self::Fields(lines) => lines.clone(),
            Self::Message(message) => vec![message.clone()],
        }
    }

    /// Single display string; field lines are joined with `"; "`.
    #[must_use]
    pub fn message(&self) -> String {
        self.lines().join("; ")
    }
}

impl std::fmt::Display for SubmissionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

// =============================================================================
// CONTROLLER
// =============================================================================

pub struct WizardController {
    gateway: Gateway,
    form: IntakeForm,
    step: WizardStep,
    error: Option<SubmissionError>,
    result: Option<TriageResult>,
}

impl WizardController {
    pub fn new(gateway: Gateway) -> Self {
        Self {
            gateway,
            form: IntakeForm::default(),
            step: WizardStep::Basics,
            error: None,
            result: None,
        }
    }

    #[must_use]
    pub fn step(&self) -> WizardStep {
        self.step
    }

    #[must_use]
    pub fn form(&self) -> &IntakeForm {
        &self.form
    }

    #[must_use]
    pub fn error(&self) -> Option<&SubmissionError> {
        self.error.as_ref()
    }

    #[must_use]
    pub fn result(&self) -> Option<&TriageResult> {
        self.result.as_ref()
    }

    // -------------------------------------------------------------------------
    // Field edits
    // -------------------------------------------------------------------------

    fn editable(&mut self) -> Result<&mut IntakeForm, StepError> {
        match self.step {
            WizardStep::Submitting | WizardStep::Result => Err(StepError::Locked(self.step)),
            _ => Ok(&mut self.form),
        }
    }

    /// # Errors
    ///
    /// `Locked` while submitting or showing a result.
    pub fn set_name(&mut self, value: &str) -> Result<(), StepError> {
        self.editable()?.name = value.to_owned();
        Ok(())
    }

    /// # Errors
    ///
    /// `Locked` while submitting or showing a result.
    pub fn set_age(&mut self, value: &str) -> Result<(), StepError> {
        self.editable()?.age = value.to_owned();
        Ok(())
    }

    /// # Errors
    ///
    /// `Locked` while submitting or showing a result.
    pub fn set_symptoms(&mut self, value: &str) -> Result<(), StepError> {
        self.editable()?.symptoms = value.to_owned();
        Ok(())
    }

    /// # Errors
    ///
    /// `Locked` while submitting or showing a result.
    pub fn set_medical_history(&mut self, value: &str) -> Result<(), StepError> {
        self.editable()?.medical_history = value.to_owned();
        Ok(())
    }

    /// Type the main complaint as free text.
    ///
    /// # Errors
    ///
    /// `Locked` while submitting or showing a result.
    pub fn set_main_complaint(&mut self, value: &str) -> Result<(), StepError> {
        self.editable()?.main_complaint = value.to_owned();
        Ok(())
    }

    /// Pick a predefined complaint; switches to list mode.
    ///
    /// # Errors
    ///
    /// `UnknownComplaint` for keys outside [`COMPLAINT_OPTIONS`], `Locked` while
    /// submitting or showing a result.
    pub fn select_complaint(&mut self, key: &str) -> Result<(), StepError> {
        if !is_predefined_complaint(key) {
            return Err(StepError::UnknownComplaint(key.to_owned()));
        }
        let form = self.editable()?;
        form.complaint_mode = ComplaintMode::List;
        form.main_complaint = key.to_owned();
        Ok(())
    }

    /// Switch complaint input mode.
    ///
    /// List -> free text clears a selected option key so it cannot leak into
    /// the free-text field. Free text -> list keeps whatever was typed.
    ///
    /// # Errors
    ///
    /// `Locked` while submitting or showing a result.
    pub fn set_complaint_mode(&mut self, mode: ComplaintMode) -> Result<(), StepError> {
        let form = self.editable()?;
        if form.complaint_mode == ComplaintMode::List
            && mode == ComplaintMode::FreeText
            && is_predefined_complaint(&form.main_complaint)
        {
            form.main_complaint.clear();
        }
        form.complaint_mode = mode;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Navigation
    // -------------------------------------------------------------------------

    /// Whether `advance` would succeed from the current step.
    #[must_use]
    pub fn can_advance(&self) -> bool {
        match self.step {
            WizardStep::Basics => self.form.basics_complete(),
            WizardStep::ComplaintSelection => self.form.complaint_complete(),
            WizardStep::Details | WizardStep::Submitting | WizardStep::Result => false,
        }
    }

    /// Move forward one data-collection step.
    ///
    /// # Errors
    ///
    /// The gating reason when the current step is incomplete; `Details` must
    /// go through `submit` instead.
    pub fn advance(&mut self) -> Result<WizardStep, StepError> {
        let next = match self.step {
            WizardStep::Basics if self.form.basics_complete() => WizardStep::ComplaintSelection,
            WizardStep::Basics => return Err(StepError::MissingBasics),
            WizardStep::ComplaintSelection => {
                if self.form.complaint_mode == ComplaintMode::Unset {
                    return Err(StepError::MissingComplaintMode);
                }
                if self.form.main_complaint.trim().is_empty() {
                    return Err(StepError::MissingComplaint);
                }
                WizardStep::Details
            }
            WizardStep::Details => {
                return Err(StepError::InvalidTransition { action: "advance", step: self.step });
            }
            WizardStep::Submitting | WizardStep::Result => return Err(StepError::Locked(self.step)),
        };
        self.step = next;
        self.error = None;
        Ok(next)
    }

    /// Move back one data-collection step.
    ///
    /// # Errors
    ///
    /// `Locked` from `Submitting`/`Result`; `InvalidTransition` from `Basics`.
    pub fn back(&mut self) -> Result<WizardStep, StepError> {
        let previous = match self.step {
            WizardStep::ComplaintSelection => WizardStep::Basics,
            WizardStep::Details => WizardStep::ComplaintSelection,
            WizardStep::Basics => return Err(StepError::InvalidTransition { action: "go back", step: self.step }),
            WizardStep::Submitting | WizardStep::Result => return Err(StepError::Locked(self.step)),
        };
        self.step = previous;
        self.error = None;
        Ok(previous)
    }

    /// Start over with an empty form. Allowed from any step.
    pub fn restart(&mut self) {
        self.form = IntakeForm::default();
        self.step = WizardStep::Basics;
        self.error = None;
        self.result = None;
    }

    // -------------------------------------------------------------------------
    // Submission
    // -------------------------------------------------------------------------

    /// `Details -> Submitting`; returns the payload to send.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` unless the wizard is on `Details`.
    pub fn begin_submission(&mut self) -> Result<IntakeRequest, StepError> {
        if self.step != WizardStep::Details {
            return Err(StepError::InvalidTransition { action: "submit", step: self.step });
        }
        self.step = WizardStep::Submitting;
        self.error = None;
        Ok(self.form.to_request())
    }

    /// Apply a submission outcome. Ignored unless a submission is in flight.
    pub fn complete_submission(&mut self, outcome: SubmissionOutcome) -> WizardStep {
        if self.step != WizardStep::Submitting {
            return self.step;
        }
        match outcome {
            SubmissionOutcome::Ok(triage) => {
                info!(
                    ticket = %triage.classification.ticket,
                    priority = %triage.classification.priority,
                    "triage submitted"
                );
                self.result = Some(triage);
                self.step = WizardStep::Result;
            }
            SubmissionOutcome::FieldErrors(errors) => {
                warn!(fields = errors.len(), "triage submission rejected");
                self.error = Some(if errors.is_empty() {
                    SubmissionError::Message(NETWORK_FAILURE_MESSAGE.to_owned())
                } else {
                    SubmissionError::Fields(errors.iter().map(FieldError::display_line).collect())
                });
                self.step = WizardStep::Details;
            }
            SubmissionOutcome::GenericError(message) => {
                warn!(error = %message, "triage submission failed");
                let message = if message.trim().is_empty() { NETWORK_FAILURE_MESSAGE.to_owned() } else { message };
                self.error = Some(SubmissionError::Message(message));
                self.step = WizardStep::Details;
            }
        }
        self.step
    }

    /// Submit the form and land on `Result` or back on `Details`.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` unless the wizard is on `Details`. Service failures
    /// are not errors here; they are recorded in [`WizardController::error`].
    pub async fn submit(&mut self) -> Result<WizardStep, StepError> {
        let request = self.begin_submission()?;
        let outcome = SubmissionOutcome::from(api::submit_triage(&self.gateway, &request).await);
        Ok(self.complete_submission(outcome))
    }
}
