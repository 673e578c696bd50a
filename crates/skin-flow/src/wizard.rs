use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use skin_analysis::{Acknowledgement, AnalysisApi, AnalysisError};

/// Shortest time the "Processing submission" indicator stays up
pub const MIN_SUBMIT_DURATION: Duration = Duration::from_millis(2500);

/// Name and city typed into the intake screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub full_name: String,
    pub city: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum WizardState {
    CollectingName,
    #[serde(rename_all = "camelCase")]
    CollectingCity { full_name: String },
    Submitting { identity: Identity },
    Succeeded { identity: Identity },
}

/// What the intake screen renders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Input,
    Loading,
    Success,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Step {
    Name,
    City,
}

/// Outcome of an accepted confirm
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    NameAccepted,
    /// The caller must submit this identity, then report back
    Submit(Identity),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WizardError {
    #[error("input is empty")]
    EmptyInput,
    #[error("a submission is already in progress")]
    Busy,
    #[error("intake already completed")]
    Finished,
    #[error("no submission in progress")]
    NotSubmitting,
}

/// Two-step name/city intake
#[derive(Debug, Clone)]
pub struct IntakeWizard {
    state: WizardState,
    input: String,
    focus_requested: bool,
}

impl Default for IntakeWizard {
    fn default() -> Self {
        Self::new()
    }
}

impl IntakeWizard {
    pub fn new() -> Self {
        Self {
            state: WizardState::CollectingName,
            input: String::new(),
            focus_requested: true,
        }
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            WizardState::CollectingName | WizardState::CollectingCity { .. } => Phase::Input,
            WizardState::Submitting { .. } => Phase::Loading,
            WizardState::Succeeded { .. } => Phase::Success,
        }
    }

    /// Which text step is showing. `None` outside the input phase.
    pub fn step(&self) -> Option<Step> {
        match self.state {
            WizardState::CollectingName => Some(Step::Name),
            WizardState::CollectingCity { .. } => Some(Step::City),
            _ => None,
        }
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn is_input_enabled(&self) -> bool {
        self.phase() == Phase::Input
    }

    pub fn can_proceed(&self) -> bool {
        matches!(self.state, WizardState::Succeeded { .. })
    }

    pub fn identity(&self) -> Option<&Identity> {
        match &self.state {
            WizardState::Submitting { identity } | WizardState::Succeeded { identity } => {
                Some(identity)
            }
            _ => None,
        }
    }

    /// Replace the text field contents. Ignored while the field is disabled.
    pub fn set_input(&mut self, value: &str) {
        if self.is_input_enabled() {
            self.input = value.to_string();
        }
    }

    /// Returns true once per entry into a text-collecting state
    pub fn take_focus_request(&mut self) -> bool {
        std::mem::take(&mut self.focus_requested)
    }

    /// The Enter key
    pub fn confirm(&mut self) -> Result<Transition, WizardError> {
        let value = self.input.trim().to_string();

        match &self.state {
            WizardState::Submitting { .. } => Err(WizardError::Busy),
            WizardState::Succeeded { .. } => Err(WizardError::Finished),
            _ if value.is_empty() => Err(WizardError::EmptyInput),
            WizardState::CollectingName => {
                debug!("Name accepted");
                self.input.clear();
                self.enter(WizardState::CollectingCity { full_name: value });
                Ok(Transition::NameAccepted)
            }
            WizardState::CollectingCity { full_name } => {
                let identity = Identity {
                    full_name: full_name.clone(),
                    city: value,
                };
                self.input.clear();
                self.enter(WizardState::Submitting {
                    identity: identity.clone(),
                });
                Ok(Transition::Submit(identity))
            }
        }
    }

    pub fn submission_succeeded(&mut self) -> Result<(), WizardError> {
        match &self.state {
            WizardState::Submitting { identity } => {
                info!("Intake submitted for {}", identity.full_name);
                let identity = identity.clone();
                self.enter(WizardState::Succeeded { identity });
                Ok(())
            }
            _ => Err(WizardError::NotSubmitting),
        }
    }

    /// Back to the city step. The typed city is not restored.
    pub fn submission_failed(&mut self, reason: &str) -> Result<(), WizardError> {
        match &self.state {
            WizardState::Submitting { identity } => {
                warn!("Intake submission failed: {}", reason);
                let full_name = identity.full_name.clone();
                self.input.clear();
                self.enter(WizardState::CollectingCity { full_name });
                Ok(())
            }
            _ => Err(WizardError::NotSubmitting),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn enter(&mut self, state: WizardState) {
        self.state = state;
        if self.is_input_enabled() {
            self.focus_requested = true;
        }
    }

    pub fn view(&self) -> WizardView {
        let step = self.step();
        WizardView {
            phase: self.phase(),
            step,
            prompt: match step {
                Some(Step::Name) => "CLICK TO TYPE",
                Some(Step::City) => "YOUR CITY NAME",
                None => "",
            },
            placeholder: match step {
                Some(Step::Name) => "Introduce Yourself",
                Some(Step::City) => "Your city name",
                None => "",
            },
            input: self.input.clone(),
            input_enabled: self.is_input_enabled(),
            can_proceed: self.can_proceed(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardView {
    pub phase: Phase,
    pub step: Option<Step>,
    pub prompt: &'static str,
    pub placeholder: &'static str,
    pub input: String,
    pub input_enabled: bool,
    pub can_proceed: bool,
}

/// Await `fut`, then keep waiting until at least `floor` has passed since
/// the call. Time past the floor is not clipped.
pub async fn run_with_floor<F, T>(fut: F, floor: Duration) -> T
where
    F: Future<Output = T>,
{
    let start = Instant::now();
    let out = fut.await;
    let elapsed = start.elapsed();
    if elapsed < floor {
        tokio::time::sleep(floor - elapsed).await;
    }
    out
}

/// Submit an identity with the minimum visible waiting time applied
pub async fn submit_identity(
    api: &dyn AnalysisApi,
    identity: &Identity,
) -> Result<Acknowledgement, AnalysisError> {
    run_with_floor(
        api.submit_identity(&identity.full_name, &identity.city),
        MIN_SUBMIT_DURATION,
    )
    .await
}
