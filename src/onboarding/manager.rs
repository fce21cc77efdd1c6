//! OnboardingManager — owns the wizard session, talks to the resolvers and
//! persists every mutation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use crate::store::Database;

use super::conversation::ConversationTurn;
use super::handoff::OnboardingHandoff;
use super::model::{ResponsePatch, ResponseRecord, ResponseUpdate, settings_keys};
use super::relevance::RelevanceTracker;
use super::resolvers::{OrgChart, OrgChartResolver, PrefillResolver};
use super::state::{WizardState, WizardStatus};
use super::steps::{StepId, title_for};

const ORG_CHART_HINT: &str = "Revise seu e-mail no passo Perfil ou reporte um problema.";

/// What the org-chart step currently shows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrgChartPanel {
    /// Email the chart was (or is being) fetched for.
    pub key: Option<String>,
    pub loading: bool,
    pub chart: Option<OrgChart>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<&'static str>,
}

/// Snapshot returned by the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct WizardSnapshot {
    pub status: WizardStatus,
    pub current_step: StepId,
    pub current_title: &'static str,
    pub completed_steps: Vec<StepId>,
    pub can_go_next: bool,
    pub progress_percent: u8,
    pub responses: ResponseRecord,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefill_error: Option<String>,
    pub org_chart: OrgChartPanel,
}

/// Result of the gated advance action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AdvanceOutcome {
    Advanced { from: StepId, to: StepId },
    /// Required fields of `step` are still blank.
    Blocked { step: StepId },
    /// Already on the last step.
    AtEnd { step: StepId },
}

/// Coordinates one user's onboarding session.
pub struct OnboardingManager {
    db: Arc<dyn Database>,
    user_id: String,
    user_email: Option<String>,
    prefill: Option<Arc<dyn PrefillResolver>>,
    org_chart: Option<Arc<dyn OrgChartResolver>>,
    state: Arc<RwLock<WizardState>>,
    panel: Arc<RwLock<OrgChartPanel>>,
    prefill_error: Arc<RwLock<Option<String>>>,
    relevance: RelevanceTracker,
    persist_lock: Mutex<()>,
}

impl OnboardingManager {
    pub fn new(db: Arc<dyn Database>, user_id: impl Into<String>) -> Self {
        Self {
            db,
            user_id: user_id.into(),
            user_email: None,
            prefill: None,
            org_chart: None,
            state: Arc::new(RwLock::new(WizardState::default())),
            panel: Arc::new(RwLock::new(OrgChartPanel::default())),
            prefill_error: Arc::new(RwLock::new(None)),
            relevance: RelevanceTracker::new(),
            persist_lock: Mutex::new(()),
        }
    }

    /// Authenticated email; takes precedence over the typed one as org-chart key.
    pub fn with_user_email(mut self, email: Option<String>) -> Self {
        self.user_email = email
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty());
        self
    }

    pub fn with_prefill_resolver(mut self, resolver: Arc<dyn PrefillResolver>) -> Self {
        self.prefill = Some(resolver);
        self
    }

    pub fn with_org_chart_resolver(mut self, resolver: Arc<dyn OrgChartResolver>) -> Self {
        self.org_chart = Some(resolver);
        self
    }

    /// Restore the persisted session, if any.
    pub async fn load(&self) {
        match self
            .db
            .get_setting(&self.user_id, settings_keys::ONBOARDING_STATE)
            .await
        {
            Ok(Some(value)) => {
                let restored = WizardState::restore(value);
                tracing::info!(
                    user_id = %self.user_id,
                    status = %restored.status,
                    step = %restored.current_step,
                    "Restored onboarding session"
                );
                *self.state.write().await = restored;
            }
            Ok(None) => {
                tracing::debug!(user_id = %self.user_id, "No persisted onboarding session");
            }
            Err(e) => {
                tracing::warn!("Failed to load onboarding state: {}", e);
            }
        }
        self.sync_org_chart().await;
    }

    pub async fn snapshot(&self) -> WizardSnapshot {
        let state = self.state.read().await;
        WizardSnapshot {
            status: state.status,
            current_step: state.current_step,
            current_title: title_for(state.current_step),
            completed_steps: state.completed_steps.iter().copied().collect(),
            can_go_next: state.can_go_next(),
            progress_percent: state.progress_percent(),
            responses: state.responses.clone(),
            started_at: state.started_at,
            completed_at: state.completed_at,
            prefill_error: self.prefill_error.read().await.clone(),
            org_chart: self.panel.read().await.clone(),
        }
    }

    pub async fn state(&self) -> WizardState {
        self.state.read().await.clone()
    }

    /// Begin the session. `patch` carries values known by the caller (the
    /// signed-in user); the prefill resolver fills whatever is still missing.
    pub async fn start(&self, patch: ResponsePatch) {
        let wants_prefill = self.state.read().await.responses.wants_prefill();
        let mut patch = patch;

        if wants_prefill {
            if let Some(resolver) = self.prefill.clone() {
                match resolver.prefill().await {
                    Ok(Some(data)) => {
                        patch = patch.merged_with(data.into_patch());
                        *self.prefill_error.write().await = None;
                    }
                    Ok(None) => {
                        *self.prefill_error.write().await = None;
                    }
                    Err(e) => {
                        tracing::warn!("Prefill lookup failed: {}", e);
                        *self.prefill_error.write().await = Some(e.display_message());
                    }
                }
            }
        }

        {
            let mut state = self.state.write().await;
            state.start(&patch);
            tracing::info!(user_id = %self.user_id, "Onboarding started");
        }
        self.persist_state().await;
        self.sync_org_chart().await;
    }

    pub async fn update_response(&self, update: ResponseUpdate) {
        let refetch = {
            let mut state = self.state.write().await;
            let before = state.responses.email.clone();
            state.update_response(update);
            state.current_step == StepId::OrgChart && state.responses.email != before
        };
        self.persist_state().await;
        if refetch {
            self.sync_org_chart().await;
        }
    }

    pub async fn toggle_need(&self, need: &str) {
        self.state.write().await.toggle_need(need);
        self.persist_state().await;
    }

    pub async fn add_competency(&self, value: &str) -> bool {
        let added = self.state.write().await.add_competency(value);
        if added {
            self.persist_state().await;
        }
        added
    }

    pub async fn update_competency(&self, index: usize, value: &str) -> bool {
        let updated = self
            .state
            .write()
            .await
            .update_competency_at(index, value);
        if updated {
            self.persist_state().await;
        }
        updated
    }

    pub async fn remove_competency(&self, index: usize) -> bool {
        let removed = self.state.write().await.remove_competency_at(index);
        if removed {
            self.persist_state().await;
        }
        removed
    }

    /// Jump to `step`. Returns false only when blocked before `start`.
    pub async fn go_to(&self, step: StepId) -> bool {
        let (allowed, from) = {
            let mut state = self.state.write().await;
            let from = state.current_step;
            state.go_to(step);
            (state.current_step == step, from)
        };
        if allowed {
            self.persist_state().await;
            self.after_move(from).await;
        }
        allowed
    }

    pub async fn mark_step_complete(&self, step: StepId) {
        self.state.write().await.mark_step_complete(step);
        self.persist_state().await;
    }

    /// Ungated move forward.
    pub async fn next(&self) -> bool {
        let (moved, from) = {
            let mut state = self.state.write().await;
            let from = state.current_step;
            (state.next(), from)
        };
        if moved {
            self.persist_state().await;
            self.after_move(from).await;
        }
        moved
    }

    pub async fn prev(&self) -> bool {
        let (moved, from) = {
            let mut state = self.state.write().await;
            let from = state.current_step;
            (state.prev(), from)
        };
        if moved {
            self.persist_state().await;
            self.after_move(from).await;
        }
        moved
    }

    /// The presenting layer's "next" button: mark the current step complete
    /// and move on, but only when its required fields are filled.
    pub async fn advance(&self) -> AdvanceOutcome {
        let outcome = {
            let mut state = self.state.write().await;
            let from = state.current_step;
            if !state.can_go_next() {
                AdvanceOutcome::Blocked { step: from }
            } else {
                state.mark_step_complete(from);
                if state.next() {
                    AdvanceOutcome::Advanced {
                        from,
                        to: state.current_step,
                    }
                } else {
                    AdvanceOutcome::AtEnd { step: from }
                }
            }
        };

        match outcome {
            AdvanceOutcome::Blocked { step } => {
                tracing::debug!(%step, "Advance blocked by required fields");
            }
            AdvanceOutcome::Advanced { from, .. } => {
                self.persist_state().await;
                self.after_move(from).await;
            }
            AdvanceOutcome::AtEnd { .. } => {
                self.persist_state().await;
            }
        }
        outcome
    }

    /// Finalize the session and store the hand-off record.
    pub async fn complete(&self) -> OnboardingHandoff {
        let handoff = {
            let mut state = self.state.write().await;
            state.complete();
            let completed_at = state.completed_at.unwrap_or_else(Utc::now);
            OnboardingHandoff::new(&self.user_id, &state.responses, completed_at)
        };
        self.relevance.invalidate();
        self.panel.write().await.loading = false;

        self.persist_state().await;
        self.persist_handoff(&handoff).await;
        tracing::info!(user_id = %self.user_id, "Onboarding completed");
        handoff
    }

    pub async fn reset(&self) {
        self.relevance.invalidate();
        self.state.write().await.reset();
        *self.panel.write().await = OrgChartPanel::default();
        *self.prefill_error.write().await = None;

        self.persist_state().await;
        if let Err(e) = self
            .db
            .delete_setting(&self.user_id, settings_keys::ONBOARDING_RECORD)
            .await
        {
            tracing::warn!("Failed to clear onboarding record: {}", e);
        }
        tracing::info!(user_id = %self.user_id, "Onboarding reset");
    }

    /// Open the scripted conversation. Only offered on the goals step of an
    /// unfinished session.
    pub async fn begin_conversation(&self) -> Option<String> {
        let greeting = {
            let mut state = self.state.write().await;
            if state.status == WizardStatus::Completed || state.current_step != StepId::Goals {
                return None;
            }
            state.begin_conversation()
        };
        if greeting.is_some() {
            self.persist_state().await;
        }
        greeting
    }

    pub async fn submit_message(&self, text: &str) -> Option<ConversationTurn> {
        let turn = self.state.write().await.submit_message(text);
        if let Some(ref turn) = turn {
            tracing::debug!(phase = %turn.phase, advanced = turn.advanced, "Conversation turn");
            if turn.phase.is_terminal() {
                tracing::info!(user_id = %self.user_id, "Onboarding conversation finished");
            }
            self.persist_state().await;
        }
        turn
    }

    pub async fn org_chart_panel(&self) -> OrgChartPanel {
        self.panel.read().await.clone()
    }

    /// Re-run the org-chart lookup for the current key.
    pub async fn refresh_org_chart(&self) {
        self.sync_org_chart().await;
    }

    /// Hand-off record as it would look if the session completed now.
    pub async fn preview(&self) -> OnboardingHandoff {
        let state = self.state.read().await;
        let at = state.completed_at.unwrap_or_else(Utc::now);
        OnboardingHandoff::new(&self.user_id, &state.responses, at)
    }

    async fn after_move(&self, from: StepId) {
        let current = self.state.read().await.current_step;
        if current == StepId::OrgChart {
            self.sync_org_chart().await;
        } else if from == StepId::OrgChart {
            // Leaving the step: any in-flight lookup is now irrelevant.
            self.relevance.invalidate();
            self.panel.write().await.loading = false;
        }
    }

    fn org_chart_key(&self, responses: &ResponseRecord) -> Option<String> {
        self.user_email.clone().or_else(|| {
            let typed = responses.email.trim().to_lowercase();
            (!typed.is_empty()).then_some(typed)
        })
    }

    /// Fetch the org chart when the step is active. Results from a lookup
    /// that was superseded while awaiting are dropped.
    async fn sync_org_chart(&self) {
        let Some(resolver) = self.org_chart.clone() else {
            return;
        };
        // The token is issued under the state guard so a concurrent step
        // change can only invalidate it afterwards, never in between.
        let lookup = {
            let state = self.state.read().await;
            if state.current_step != StepId::OrgChart {
                return;
            }
            match self.org_chart_key(&state.responses) {
                Some(key) => Some((key, self.relevance.issue())),
                None => {
                    self.relevance.invalidate();
                    None
                }
            }
        };

        let Some((key, token)) = lookup else {
            *self.panel.write().await = OrgChartPanel::default();
            return;
        };

        {
            let mut panel = self.panel.write().await;
            if !token.is_current() {
                return;
            }
            panel.key = Some(key.clone());
            panel.loading = true;
            panel.error = None;
            panel.hint = None;
        }

        let result = resolver.org_chart(&key).await;

        let mut panel = self.panel.write().await;
        if !token.is_current() {
            tracing::debug!(
                generation = token.generation(),
                %key,
                "Discarding stale org chart response"
            );
            return;
        }
        panel.loading = false;
        match result {
            Ok(chart) => {
                panel.chart = Some(chart);
                panel.error = None;
                panel.hint = None;
            }
            Err(e) => {
                tracing::warn!(%key, "Org chart lookup failed: {}", e);
                panel.chart = None;
                panel.error = Some(e.display_message());
                panel.hint = Some(ORG_CHART_HINT);
            }
        }
    }

    /// Persist the current WizardState to the settings table.
    /// Writes are serialized by `persist_lock` so an older snapshot can
    /// never land after a newer one.
    async fn persist_state(&self) {
        let _persist = self.persist_lock.lock().await;
        let state = self.state.read().await;
        let value = match serde_json::to_value(&*state) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("Failed to serialize onboarding state: {}", e);
                return;
            }
        };
        drop(state);
        if let Err(e) = self
            .db
            .set_setting(&self.user_id, settings_keys::ONBOARDING_STATE, &value)
            .await
        {
            tracing::warn!("Failed to persist onboarding state: {}", e);
        }
    }

    async fn persist_handoff(&self, handoff: &OnboardingHandoff) {
        let value = match serde_json::to_value(handoff) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("Failed to serialize onboarding record: {}", e);
                return;
            }
        };
        if let Err(e) = self
            .db
            .set_setting(&self.user_id, settings_keys::ONBOARDING_RECORD, &value)
            .await
        {
            tracing::warn!("Failed to persist onboarding record: {}", e);
        }
    }
}
