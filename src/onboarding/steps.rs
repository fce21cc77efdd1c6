//! Step registry — the fixed, ordered list of wizard screens.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One screen of the linear onboarding flow.
///
/// Declaration order is navigation order; `Ord` follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    Welcome,
    Profile,
    Organization,
    OrgChart,
    Competencies,
    Goals,
    AiProfile,
    Review,
    Done,
}

/// Registry entry: a step and its display title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepDescriptor {
    pub id: StepId,
    pub title: &'static str,
}

pub const ONBOARDING_STEPS: &[StepDescriptor] = &[
    StepDescriptor { id: StepId::Welcome, title: "Início" },
    StepDescriptor { id: StepId::Profile, title: "Perfil" },
    StepDescriptor { id: StepId::Organization, title: "Organização" },
    StepDescriptor { id: StepId::OrgChart, title: "Seu Organograma" },
    StepDescriptor { id: StepId::Competencies, title: "Competências" },
    StepDescriptor { id: StepId::Goals, title: "Objetivos" },
    StepDescriptor { id: StepId::AiProfile, title: "AI Profile" },
    StepDescriptor { id: StepId::Review, title: "Revisão" },
    StepDescriptor { id: StepId::Done, title: "Concluído" },
];

/// Display title for a step, falling back to its wire name.
pub fn title_for(id: StepId) -> &'static str {
    ONBOARDING_STEPS
        .iter()
        .find(|s| s.id == id)
        .map(|s| s.title)
        .unwrap_or_else(|| id.as_str())
}

impl StepId {
    /// All steps in navigation order.
    pub fn all() -> impl Iterator<Item = StepId> {
        ONBOARDING_STEPS.iter().map(|s| s.id)
    }

    pub fn first() -> StepId {
        StepId::Welcome
    }

    pub fn last() -> StepId {
        StepId::Done
    }

    /// First step that collects input (the one `start` lands on).
    pub fn first_actionable() -> StepId {
        StepId::Profile
    }

    /// Index in the registry.
    pub fn position(&self) -> usize {
        ONBOARDING_STEPS
            .iter()
            .position(|s| s.id == *self)
            .unwrap_or(0)
    }

    pub fn next(&self) -> Option<StepId> {
        ONBOARDING_STEPS.get(self.position() + 1).map(|s| s.id)
    }

    pub fn previous(&self) -> Option<StepId> {
        self.position()
            .checked_sub(1)
            .and_then(|i| ONBOARDING_STEPS.get(i))
            .map(|s| s.id)
    }

    /// Whether the step counts towards progress (everything except the
    /// intro and the terminal screen).
    pub fn is_actionable(&self) -> bool {
        !matches!(self, Self::Welcome | Self::Done)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Welcome => "welcome",
            Self::Profile => "profile",
            Self::Organization => "organization",
            Self::OrgChart => "org_chart",
            Self::Competencies => "competencies",
            Self::Goals => "goals",
            Self::AiProfile => "ai_profile",
            Self::Review => "review",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown onboarding step: {0}")]
pub struct UnknownStep(pub String);

impl FromStr for StepId {
    type Err = UnknownStep;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StepId::all()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| UnknownStep(s.to_string()))
    }
}
