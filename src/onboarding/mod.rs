//! Onboarding wizard — a linear, step-by-step flow that collects a new
//! user's profile, organization context, goals and AI preferences.
//!
//! `state` holds the pure state machine; `manager` wraps it with
//! persistence and the read-only resolvers; `routes` exposes it over REST.

pub mod conversation;
pub mod handoff;
pub mod manager;
pub mod model;
pub mod relevance;
pub mod resolvers;
pub mod routes;
pub mod state;
pub mod steps;

pub use conversation::{ConversationPhase, ConversationTurn};
pub use handoff::{GraphNode, OnboardingHandoff};
pub use manager::{AdvanceOutcome, OnboardingManager, OrgChartPanel, WizardSnapshot};
pub use model::{NEED_OPTIONS, ResponsePatch, ResponseRecord, ResponseUpdate};
pub use resolvers::{HttpResolver, OrgChart, OrgChartResolver, PrefillData, PrefillResolver};
pub use routes::{OnboardingRouteState, onboarding_routes};
pub use state::{WizardState, WizardStatus};
pub use steps::{ONBOARDING_STEPS, StepId};
