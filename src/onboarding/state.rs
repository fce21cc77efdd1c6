//! Wizard state machine — status, step pointer, completed steps, answers.
//!
//! Validation is advisory: `can_go_next` tells the presenting layer whether
//! to offer the advance action, but no transition here ever rejects.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::conversation::{self, ConversationTurn};
use super::model::{ResponsePatch, ResponseRecord, ResponseUpdate};
use super::steps::StepId;

/// Lifecycle of one onboarding session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl std::fmt::Display for WizardStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

/// The session aggregate. Mutated only through the methods below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WizardState {
    pub status: WizardStatus,
    pub current_step: StepId,
    pub completed_steps: BTreeSet<StepId>,
    pub responses: ResponseRecord,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Default for WizardState {
    fn default() -> Self {
        Self {
            status: WizardStatus::NotStarted,
            current_step: StepId::first(),
            completed_steps: BTreeSet::new(),
            responses: ResponseRecord::default(),
            started_at: None,
            completed_at: None,
        }
    }
}

impl WizardState {
    /// Begin (or resume) the session, seeding blank fields from `prefill`.
    pub fn start(&mut self, prefill: &ResponsePatch) {
        self.responses.fill_blanks(prefill);
        self.status = WizardStatus::InProgress;
        self.current_step = StepId::first_actionable();
        self.completed_steps.insert(StepId::Welcome);
        self.started_at = Some(Utc::now());
        self.completed_at = None;
    }

    pub fn update_response(&mut self, update: ResponseUpdate) {
        self.responses.apply(update);
    }

    pub fn toggle_need(&mut self, need: &str) {
        self.responses.toggle_need(need);
    }

    pub fn add_competency(&mut self, draft: &str) -> bool {
        self.responses.add_competency(draft)
    }

    pub fn update_competency_at(&mut self, index: usize, value: &str) -> bool {
        self.responses.update_competency_at(index, value)
    }

    pub fn remove_competency_at(&mut self, index: usize) -> bool {
        self.responses.remove_competency_at(index)
    }

    /// Jump to `step`. Only blocked before `start`, for anything but the
    /// intro. Returns whether the pointer moved.
    pub fn go_to(&mut self, step: StepId) -> bool {
        if self.status == WizardStatus::NotStarted && step != StepId::Welcome {
            return false;
        }
        let moved = self.current_step != step;
        self.current_step = step;
        moved
    }

    pub fn mark_step_complete(&mut self, step: StepId) {
        self.completed_steps.insert(step);
    }

    /// Move to the following step; stays put on the last one.
    pub fn next(&mut self) -> bool {
        match self.current_step.next() {
            Some(step) => {
                self.current_step = step;
                true
            }
            None => false,
        }
    }

    /// Move to the preceding step; stays put on the intro and on the first
    /// actionable step.
    pub fn prev(&mut self) -> bool {
        if self.current_step <= StepId::first_actionable() {
            return false;
        }
        match self.current_step.previous() {
            Some(step) => {
                self.current_step = step;
                true
            }
            None => false,
        }
    }

    /// Finalize the session. The record is ready for hand-off afterwards.
    pub fn complete(&mut self) {
        self.status = WizardStatus::Completed;
        self.current_step = StepId::last();
        self.completed_steps.extend(StepId::all());
        self.completed_at = Some(Utc::now());
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Minimal required-field check for the current step.
    pub fn can_go_next(&self) -> bool {
        can_advance_from(self.current_step, &self.responses)
    }

    /// Share of actionable steps completed, 0..=100.
    pub fn progress_percent(&self) -> u8 {
        let total = StepId::all().filter(StepId::is_actionable).count();
        let done = self
            .completed_steps
            .iter()
            .filter(|s| s.is_actionable())
            .count();
        if total == 0 {
            return 0;
        }
        ((done as f64 / total as f64) * 100.0).round() as u8
    }

    /// Start the scripted conversation. See [`conversation::begin`].
    pub fn begin_conversation(&mut self) -> Option<String> {
        conversation::begin(&mut self.responses)
    }

    /// Feed one chat message to the scripted conversation.
    pub fn submit_message(&mut self, text: &str) -> Option<ConversationTurn> {
        conversation::submit(&mut self.responses, text)
    }
}

/// Loose shape of a persisted state. Older payloads may carry step or
/// status names that no longer exist, so everything is parsed by hand.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PersistedState {
    status: Option<String>,
    current_step: Option<String>,
    completed_steps: Vec<String>,
    responses: Option<serde_json::Value>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl WizardState {
    /// Rebuild a state from a persisted payload, migrating stale values:
    /// the retired `memory` step maps to review, unknown steps to the intro,
    /// unknown completed ids are dropped and missing answers defaulted.
    pub fn restore(value: serde_json::Value) -> Self {
        let persisted: PersistedState = match serde_json::from_value(value) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("Discarding unreadable onboarding state: {}", e);
                return Self::default();
            }
        };

        let status = match persisted.status.as_deref() {
            Some("in_progress") | Some("review") => WizardStatus::InProgress,
            Some("completed") => WizardStatus::Completed,
            _ => WizardStatus::NotStarted,
        };

        let current_step = persisted
            .current_step
            .as_deref()
            .map(migrate_step)
            .unwrap_or_else(StepId::first);

        let completed_steps = persisted
            .completed_steps
            .iter()
            .filter_map(|s| match s.as_str() {
                "memory" => Some(StepId::Review),
                other => other.parse().ok(),
            })
            .collect();

        let responses = persisted
            .responses
            .map(restore_responses)
            .unwrap_or_default();

        Self {
            status,
            current_step,
            completed_steps,
            responses,
            started_at: persisted.started_at,
            completed_at: persisted.completed_at,
        }
    }
}

/// Decode stored answers field by field; a field that no longer fits its
/// type falls back to its default while the rest are kept.
fn restore_responses(value: serde_json::Value) -> ResponseRecord {
    let fields = match value {
        serde_json::Value::Object(fields) => fields,
        other => {
            tracing::warn!(kind = ?other, "Discarding non-object onboarding responses");
            return ResponseRecord::default();
        }
    };

    let mut kept = serde_json::Map::new();
    for (key, field) in fields {
        let mut candidate = kept.clone();
        candidate.insert(key.clone(), field);
        match serde_json::from_value::<ResponseRecord>(serde_json::Value::Object(candidate.clone())) {
            Ok(_) => kept = candidate,
            Err(e) => tracing::warn!(field = %key, "Dropping unreadable onboarding answer: {}", e),
        }
    }
    serde_json::from_value(serde_json::Value::Object(kept)).unwrap_or_default()
}

fn migrate_step(name: &str) -> StepId {
    match name {
        "memory" => StepId::Review,
        other => other.parse().unwrap_or_else(|_| StepId::first()),
    }
}

/// Whether the required fields of `step` are filled in `responses`.
pub fn can_advance_from(step: StepId, responses: &ResponseRecord) -> bool {
    let filled = |s: &str| !s.trim().is_empty();
    match step {
        StepId::Profile => filled(&responses.full_name) && filled(&responses.email),
        StepId::Organization => filled(&responses.company),
        StepId::Goals => filled(&responses.primary_objective),
        _ => true,
    }
}
