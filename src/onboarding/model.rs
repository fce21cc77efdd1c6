//! Response accumulator — every answer collected across the wizard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::conversation::ConversationPhase;

/// Options offered on the AI-profile step for `needs`.
pub const NEED_OPTIONS: &[&str] = &[
    "Mapear conhecimento",
    "Criar tarefas e planos",
    "Organizar personas",
    "RAG / fontes",
    "Governança (corporate)",
];

/// Self-assessed familiarity with AI tooling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AiExperienceLevel {
    #[default]
    #[serde(rename = "iniciante")]
    Beginner,
    #[serde(rename = "intermediário")]
    Intermediate,
    #[serde(rename = "técnico")]
    Technical,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreferredLanguage {
    #[default]
    #[serde(rename = "simples")]
    Plain,
    #[serde(rename = "técnica")]
    Technical,
}

/// Who sees information the user stores by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Corporate,
    Personal,
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Corporate => write!(f, "corporate"),
            Self::Personal => write!(f, "personal"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryLevel {
    Short,
    Medium,
    #[default]
    Long,
}

/// All answers of one onboarding session.
///
/// Every field has a default, so a record is serializable before any step
/// is visited and payloads missing newer fields still deserialize.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseRecord {
    pub full_name: String,
    pub email: String,
    pub job_role: String,
    pub profile_description: String,

    pub company: String,
    pub department: String,
    /// What the user does in the institution.
    pub role_description: String,
    /// What the user's area does in the organization.
    pub department_description: String,

    pub org_chart_validated: bool,

    pub competencies: Vec<String>,

    pub primary_objective: String,
    pub top_challenges: String,

    pub ai_experience_level: AiExperienceLevel,
    pub technical_path: bool,
    pub needs: Vec<String>,
    pub preferred_language: PreferredLanguage,

    pub default_visibility: Visibility,
    pub memory_level: MemoryLevel,

    pub conversation_phase: ConversationPhase,
    /// Append-only audit trail of what the conversation extracted.
    pub conversation_signals: Vec<String>,
    pub conversation_started_at: Option<DateTime<Utc>>,
    pub conversation_completed_at: Option<DateTime<Utc>>,
}

/// A single-field write, as issued by the presenting layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum ResponseUpdate {
    FullName(String),
    Email(String),
    JobRole(String),
    ProfileDescription(String),
    Company(String),
    Department(String),
    RoleDescription(String),
    DepartmentDescription(String),
    OrgChartValidated(bool),
    Competencies(Vec<String>),
    PrimaryObjective(String),
    TopChallenges(String),
    AiExperienceLevel(AiExperienceLevel),
    TechnicalPath(bool),
    Needs(Vec<String>),
    PreferredLanguage(PreferredLanguage),
    DefaultVisibility(Visibility),
    MemoryLevel(MemoryLevel),
}

/// Partial record used to seed text fields the user has not filled yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponsePatch {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub job_role: Option<String>,
    pub profile_description: Option<String>,
    pub company: Option<String>,
    pub department: Option<String>,
    pub role_description: Option<String>,
    pub department_description: Option<String>,
}

impl ResponsePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fill fields missing (or blank) in `self` from `fallback`.
    pub fn merged_with(self, fallback: ResponsePatch) -> ResponsePatch {
        fn pick(primary: Option<String>, fallback: Option<String>) -> Option<String> {
            match primary {
                Some(v) if !is_blank(&v) => Some(v),
                _ => fallback.filter(|v| !is_blank(v)),
            }
        }
        ResponsePatch {
            full_name: pick(self.full_name, fallback.full_name),
            email: pick(self.email, fallback.email),
            job_role: pick(self.job_role, fallback.job_role),
            profile_description: pick(self.profile_description, fallback.profile_description),
            company: pick(self.company, fallback.company),
            department: pick(self.department, fallback.department),
            role_description: pick(self.role_description, fallback.role_description),
            department_description: pick(
                self.department_description,
                fallback.department_description,
            ),
        }
    }
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

fn fill_if_blank(slot: &mut String, value: &Option<String>) {
    if let Some(value) = value {
        if is_blank(slot) && !is_blank(value) {
            *slot = value.clone();
        }
    }
}

impl ResponseRecord {
    /// Write one field. No validation happens here.
    pub fn apply(&mut self, update: ResponseUpdate) {
        match update {
            ResponseUpdate::FullName(v) => self.full_name = v,
            ResponseUpdate::Email(v) => self.email = v,
            ResponseUpdate::JobRole(v) => self.job_role = v,
            ResponseUpdate::ProfileDescription(v) => self.profile_description = v,
            ResponseUpdate::Company(v) => self.company = v,
            ResponseUpdate::Department(v) => self.department = v,
            ResponseUpdate::RoleDescription(v) => self.role_description = v,
            ResponseUpdate::DepartmentDescription(v) => self.department_description = v,
            ResponseUpdate::OrgChartValidated(v) => self.org_chart_validated = v,
            ResponseUpdate::Competencies(v) => self.competencies = v,
            ResponseUpdate::PrimaryObjective(v) => self.primary_objective = v,
            ResponseUpdate::TopChallenges(v) => self.top_challenges = v,
            ResponseUpdate::AiExperienceLevel(v) => self.ai_experience_level = v,
            ResponseUpdate::TechnicalPath(v) => self.technical_path = v,
            ResponseUpdate::Needs(v) => self.needs = v,
            ResponseUpdate::PreferredLanguage(v) => self.preferred_language = v,
            ResponseUpdate::DefaultVisibility(v) => self.default_visibility = v,
            ResponseUpdate::MemoryLevel(v) => self.memory_level = v,
        }
    }

    /// Merge `patch` into fields that are still blank; typed values win.
    pub fn fill_blanks(&mut self, patch: &ResponsePatch) {
        fill_if_blank(&mut self.full_name, &patch.full_name);
        fill_if_blank(&mut self.email, &patch.email);
        fill_if_blank(&mut self.job_role, &patch.job_role);
        fill_if_blank(&mut self.profile_description, &patch.profile_description);
        fill_if_blank(&mut self.company, &patch.company);
        fill_if_blank(&mut self.department, &patch.department);
        fill_if_blank(&mut self.role_description, &patch.role_description);
        fill_if_blank(&mut self.department_description, &patch.department_description);
    }

    /// Whether any field a prefill lookup could supply is still blank.
    pub fn wants_prefill(&self) -> bool {
        [
            &self.full_name,
            &self.email,
            &self.company,
            &self.department,
            &self.job_role,
        ]
        .iter()
        .any(|s| is_blank(s))
    }

    /// Add `need` if absent, remove it if present.
    pub fn toggle_need(&mut self, need: &str) {
        if let Some(pos) = self.needs.iter().position(|n| n == need) {
            self.needs.remove(pos);
        } else {
            self.needs.push(need.to_string());
        }
    }

    /// Append a trimmed competency. Blank drafts are ignored.
    pub fn add_competency(&mut self, draft: &str) -> bool {
        let value = draft.trim();
        if value.is_empty() {
            return false;
        }
        self.competencies.push(value.to_string());
        true
    }

    /// Replace the competency at `index`. Out-of-range indices are ignored.
    pub fn update_competency_at(&mut self, index: usize, value: &str) -> bool {
        match self.competencies.get_mut(index) {
            Some(slot) => {
                *slot = value.to_string();
                true
            }
            None => false,
        }
    }

    pub fn remove_competency_at(&mut self, index: usize) -> bool {
        if index < self.competencies.len() {
            self.competencies.remove(index);
            true
        } else {
            false
        }
    }
}

/// Settings keys used for onboarding persistence.
pub mod settings_keys {
    /// Key for the wizard aggregate.
    pub const ONBOARDING_STATE: &str = "onboarding_state";
    /// Key for the record handed off when the wizard completes.
    pub const ONBOARDING_RECORD: &str = "onboarding_record";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_record_has_documented_defaults() {
        let r = ResponseRecord::default();
        assert!(r.full_name.is_empty());
        assert!(r.email.is_empty());
        assert!(!r.org_chart_validated);
        assert!(r.competencies.is_empty());
        assert_eq!(r.ai_experience_level, AiExperienceLevel::Beginner);
        assert!(!r.technical_path);
        assert!(r.needs.is_empty());
        assert_eq!(r.preferred_language, PreferredLanguage::Plain);
        assert_eq!(r.default_visibility, Visibility::Corporate);
        assert_eq!(r.memory_level, MemoryLevel::Long);
        assert_eq!(r.conversation_phase, ConversationPhase::NotStarted);
        assert!(r.conversation_signals.is_empty());
        assert!(r.conversation_started_at.is_none());
    }

    #[test]
    fn enum_wire_names() {
        assert_eq!(
            serde_json::to_string(&AiExperienceLevel::Intermediate).unwrap(),
            "\"intermediário\""
        );
        assert_eq!(
            serde_json::from_str::<AiExperienceLevel>("\"técnico\"").unwrap(),
            AiExperienceLevel::Technical
        );
        assert_eq!(
            serde_json::to_string(&PreferredLanguage::Technical).unwrap(),
            "\"técnica\""
        );
        assert_eq!(serde_json::to_string(&Visibility::Personal).unwrap(), "\"personal\"");
    }

    #[test]
    fn record_deserializes_from_partial_payload() {
        let r: ResponseRecord =
            serde_json::from_str(r#"{"full_name": "Ana", "needs": ["RAG / fontes"]}"#).unwrap();
        assert_eq!(r.full_name, "Ana");
        assert_eq!(r.needs, vec!["RAG / fontes".to_string()]);
        assert_eq!(r.memory_level, MemoryLevel::Long);
    }

    #[test]
    fn update_wire_format() {
        let update: ResponseUpdate =
            serde_json::from_str(r#"{"field": "company", "value": "Acme"}"#).unwrap();
        assert_eq!(update, ResponseUpdate::Company("Acme".into()));

        let update: ResponseUpdate =
            serde_json::from_str(r#"{"field": "default_visibility", "value": "personal"}"#)
                .unwrap();
        let mut r = ResponseRecord::default();
        r.apply(update);
        assert_eq!(r.default_visibility, Visibility::Personal);
    }

    #[test]
    fn apply_writes_exactly_one_field() {
        let mut r = ResponseRecord::default();
        r.apply(ResponseUpdate::FullName("  ".into()));
        assert_eq!(r.full_name, "  ");
        let mut expected = ResponseRecord::default();
        expected.full_name = "  ".into();
        assert_eq!(r, expected);
    }

    #[test]
    fn fill_blanks_keeps_typed_values() {
        let mut r = ResponseRecord {
            full_name: "Alice".into(),
            ..Default::default()
        };
        r.fill_blanks(&ResponsePatch {
            full_name: Some("Bob".into()),
            email: Some("b@x.com".into()),
            company: Some("   ".into()),
            ..Default::default()
        });
        assert_eq!(r.full_name, "Alice");
        assert_eq!(r.email, "b@x.com");
        assert!(r.company.is_empty());
    }

    #[test]
    fn wants_prefill_only_when_something_is_blank() {
        let mut r = ResponseRecord {
            full_name: "A".into(),
            email: "a@x".into(),
            company: "C".into(),
            department: "D".into(),
            job_role: "R".into(),
            ..Default::default()
        };
        assert!(!r.wants_prefill());
        r.department.clear();
        assert!(r.wants_prefill());
    }

    #[test]
    fn toggle_need_is_symmetric() {
        let mut r = ResponseRecord::default();
        r.toggle_need(NEED_OPTIONS[0]);
        r.toggle_need(NEED_OPTIONS[3]);
        let before = r.needs.clone();
        r.toggle_need("X");
        assert_eq!(r.needs.len(), 3);
        r.toggle_need("X");
        assert_eq!(r.needs, before);
    }

    #[test]
    fn competency_editing() {
        let mut r = ResponseRecord::default();
        assert!(r.add_competency("  Rust  "));
        assert!(!r.add_competency("   "));
        assert!(r.add_competency("BPMN"));
        assert_eq!(r.competencies, vec!["Rust", "BPMN"]);

        assert!(r.update_competency_at(1, "BPMN 2.0"));
        assert!(!r.update_competency_at(5, "nope"));
        assert_eq!(r.competencies[1], "BPMN 2.0");

        assert!(r.remove_competency_at(0));
        assert!(!r.remove_competency_at(3));
        assert_eq!(r.competencies, vec!["BPMN 2.0"]);
    }

    #[test]
    fn merged_with_prefers_non_blank_primary() {
        let primary = ResponsePatch {
            full_name: Some("Ana".into()),
            company: Some(" ".into()),
            ..Default::default()
        };
        let fallback = ResponsePatch {
            full_name: Some("Directory Ana".into()),
            company: Some("Acme".into()),
            department: Some("TI".into()),
            ..Default::default()
        };
        let merged = primary.merged_with(fallback);
        assert_eq!(merged.full_name.as_deref(), Some("Ana"));
        assert_eq!(merged.company.as_deref(), Some("Acme"));
        assert_eq!(merged.department.as_deref(), Some("TI"));
        assert!(merged.email.is_none());
    }

    #[test]
    fn patch_is_empty() {
        assert!(ResponsePatch::default().is_empty());
        assert!(
            !ResponsePatch {
                company: Some("x".into()),
                ..Default::default()
            }
            .is_empty()
        );
    }
}
