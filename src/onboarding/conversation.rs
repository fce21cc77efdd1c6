//! Scripted conversation run on the "goals" step.
//!
//! The conversation asks three questions in turn (objective, challenges,
//! visibility preference), then asks the user to confirm. Each answer is
//! written into the `ResponseRecord` and leaves a signal in the record's
//! audit trail. The phase pointer only ever moves forward one phase at a
//! time; `validation` is the only phase that can repeat.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::model::{ResponseRecord, Visibility};

/// Phases of the scripted conversation, independent of the step pointer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationPhase {
    #[default]
    NotStarted,
    Goals,
    Challenges,
    Preferences,
    Validation,
    Done,
}

impl ConversationPhase {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: ConversationPhase) -> bool {
        use ConversationPhase::*;
        matches!(
            (self, target),
            (NotStarted, Goals)
                | (Goals, Challenges)
                | (Challenges, Preferences)
                | (Preferences, Validation)
                | (Validation, Validation)
                | (Validation, Done)
        )
    }

    /// Whether the phase accepts user answers.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::NotStarted | Self::Done)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl std::fmt::Display for ConversationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotStarted => "not_started",
            Self::Goals => "goals",
            Self::Challenges => "challenges",
            Self::Preferences => "preferences",
            Self::Validation => "validation",
            Self::Done => "done",
        };
        write!(f, "{s}")
    }
}

/// Outcome of one user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationTurn {
    /// Scripted assistant reply to show in the chat surface.
    pub reply: String,
    /// Phase after the message was consumed.
    pub phase: ConversationPhase,
    /// Whether the phase pointer moved.
    pub advanced: bool,
}

const CORPORATE_KEYWORDS: &[&str] = &["corporat", "empresa", "todos"];
const AFFIRMATIVE_KEYWORDS: &[&str] = &["sim", "correto", "ok"];

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    let lowered = text.to_lowercase();
    keywords.iter().any(|k| lowered.contains(k))
}

/// Whether a free-text answer asks for corporate (shared) visibility.
pub fn prefers_corporate_visibility(text: &str) -> bool {
    contains_any(text, CORPORATE_KEYWORDS)
}

/// Whether a free-text answer confirms the summary.
pub fn is_affirmative(text: &str) -> bool {
    contains_any(text, AFFIRMATIVE_KEYWORDS)
}

/// First `max` characters of `s`, with an ellipsis when cut.
fn preview(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{cut}...")
    }
}

/// Opening message, personalised with what the earlier steps collected.
pub fn greeting(record: &ResponseRecord) -> String {
    let mut intro = format!("Olá {}", record.full_name.trim());
    let intro_len = intro.len();
    if !record.company.trim().is_empty() {
        intro.push_str(&format!(", vi que você trabalha na **{}**", record.company.trim()));
    }
    if !record.job_role.trim().is_empty() {
        if intro.len() == intro_len {
            intro.push_str(", vi que você atua");
        }
        intro.push_str(&format!(" como **{}**", record.job_role.trim()));
    }
    intro.push('.');

    let mut parts = vec![intro];
    if !record.competencies.is_empty() {
        let top: Vec<&str> = record.competencies.iter().take(3).map(String::as_str).collect();
        parts.push(format!("Notei algumas competências interessantes: {}...", top.join(", ")));
    }
    parts.push(
        "Vamos conversar um pouco para eu entender melhor seu contexto. \
         **Qual é seu objetivo principal ao usar este sistema?**"
            .to_string(),
    );
    parts.join("\n\n")
}

/// Open the conversation. Returns the greeting, or `None` if it already ran.
pub fn begin(record: &mut ResponseRecord) -> Option<String> {
    if record.conversation_phase != ConversationPhase::NotStarted {
        return None;
    }
    record.conversation_phase = ConversationPhase::Goals;
    record.conversation_started_at = Some(Utc::now());
    Some(greeting(record))
}

/// Consume one user message for the current phase.
///
/// Returns `None` when nothing happened: blank text, or a conversation that
/// has not started or is already done.
pub fn submit(record: &mut ResponseRecord, text: &str) -> Option<ConversationTurn> {
    let text = text.trim();
    if text.is_empty() || !record.conversation_phase.is_active() {
        return None;
    }

    let from = record.conversation_phase;
    let (to, reply) = match from {
        ConversationPhase::Goals => {
            record.primary_objective = text.to_string();
            record.conversation_signals.push(format!("objetivo: {text}"));
            (
                ConversationPhase::Challenges,
                format!(
                    "Ótimo! Entendi que seu objetivo é: \"{}\"\n\n**E quais são seus maiores \
                     desafios** para alcançar isso? Pode ser falta de tempo, dificuldade em \
                     organizar informações, falta de visibilidade, etc.",
                    preview(text, 100)
                ),
            )
        }
        ConversationPhase::Challenges => {
            record.top_challenges = text.to_string();
            record.conversation_signals.push(format!("desafios: {text}"));
            (
                ConversationPhase::Preferences,
                "Entendo. Vou te ajudar com isso.\n\nÚltima pergunta: **você prefere que o \
                 sistema armazene informações por padrão como Corporativas** (visíveis para \
                 todos da empresa) **ou Pessoais** (apenas você vê)?"
                    .to_string(),
            )
        }
        ConversationPhase::Preferences => {
            let visibility = if prefers_corporate_visibility(text) {
                Visibility::Corporate
            } else {
                Visibility::Personal
            };
            record.default_visibility = visibility;
            record.conversation_signals.push(format!("visibilidade: {visibility}"));
            let label = match visibility {
                Visibility::Corporate => "Corporativo",
                Visibility::Personal => "Pessoal",
            };
            (
                ConversationPhase::Validation,
                format!(
                    "Perfeito! Configurado como **{label}**.\n\nResumo do seu perfil:\n\
                     - Objetivo: {}\n- Desafios: {}\n- Memória: {label}\n\n\
                     **Está tudo correto?** (Responda sim para finalizar ou me diga o que quer ajustar)",
                    preview(&record.primary_objective, 80),
                    preview(&record.top_challenges, 80),
                ),
            )
        }
        ConversationPhase::Validation => {
            if is_affirmative(text) {
                record.conversation_completed_at = Some(Utc::now());
                record.conversation_signals.push("validação: confirmado".to_string());
                (
                    ConversationPhase::Done,
                    "**Onboarding completo!**\n\nJá tenho tudo que preciso para personalizar \
                     sua experiência. Avance para revisar e finalizar."
                        .to_string(),
                )
            } else {
                record.conversation_signals.push(format!("ajuste: {text}"));
                (
                    ConversationPhase::Validation,
                    "Sem problema! Me diga o que quer ajustar e eu atualizo.".to_string(),
                )
            }
        }
        ConversationPhase::NotStarted | ConversationPhase::Done => return None,
    };

    debug_assert!(from.can_transition_to(to));
    record.conversation_phase = to;
    Some(ConversationTurn {
        reply,
        phase: to,
        advanced: from != to,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started() -> ResponseRecord {
        let mut r = ResponseRecord {
            full_name: "Ana".into(),
            ..Default::default()
        };
        begin(&mut r).unwrap();
        r
    }

    #[test]
    fn valid_transitions() {
        use ConversationPhase::*;
        for (from, to) in [
            (NotStarted, Goals),
            (Goals, Challenges),
            (Challenges, Preferences),
            (Preferences, Validation),
            (Validation, Validation),
            (Validation, Done),
        ] {
            assert!(from.can_transition_to(to), "{from} should transition to {to}");
        }
    }

    #[test]
    fn invalid_transitions() {
        use ConversationPhase::*;
        assert!(!Goals.can_transition_to(Preferences));
        assert!(!Challenges.can_transition_to(Goals));
        assert!(!Done.can_transition_to(NotStarted));
        assert!(!Goals.can_transition_to(Goals));
    }

    #[test]
    fn begin_only_once() {
        let mut r = ResponseRecord::default();
        let greeting = begin(&mut r).unwrap();
        assert!(greeting.contains("objetivo principal"));
        assert_eq!(r.conversation_phase, ConversationPhase::Goals);
        assert!(r.conversation_started_at.is_some());
        assert!(begin(&mut r).is_none());
    }

    #[test]
    fn greeting_mentions_collected_context() {
        let r = ResponseRecord {
            full_name: "Ana".into(),
            company: "Acme".into(),
            job_role: "Analista".into(),
            competencies: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            ..Default::default()
        };
        let text = greeting(&r);
        assert!(text.starts_with("Olá Ana, vi que você trabalha na **Acme** como **Analista**."));
        assert!(text.contains("a, b, c..."));
        assert!(!text.contains(", d"));
    }

    #[test]
    fn goals_answer_sets_objective_and_advances() {
        let mut r = started();
        let turn = submit(&mut r, "Organizar o conhecimento da área").unwrap();
        assert!(turn.advanced);
        assert_eq!(turn.phase, ConversationPhase::Challenges);
        assert_eq!(r.primary_objective, "Organizar o conhecimento da área");
        assert_eq!(
            r.conversation_signals,
            vec!["objetivo: Organizar o conhecimento da área".to_string()]
        );
    }

    #[test]
    fn full_script_reaches_done() {
        let mut r = started();
        submit(&mut r, "objetivo").unwrap();
        submit(&mut r, "falta de tempo").unwrap();
        assert_eq!(r.top_challenges, "falta de tempo");

        let turn = submit(&mut r, "Prefiro pessoal").unwrap();
        assert_eq!(turn.phase, ConversationPhase::Validation);
        assert_eq!(r.default_visibility, Visibility::Personal);
        assert!(turn.reply.contains("Objetivo: objetivo"));

        let turn = submit(&mut r, "Sim, pode seguir").unwrap();
        assert_eq!(turn.phase, ConversationPhase::Done);
        assert!(r.conversation_completed_at.is_some());
        assert_eq!(r.conversation_signals.len(), 4);

        // Done is terminal for the sub-flow.
        assert!(submit(&mut r, "mais uma coisa").is_none());
        assert_eq!(r.conversation_phase, ConversationPhase::Done);
    }

    #[test]
    fn validation_loops_until_affirmative() {
        let mut r = started();
        submit(&mut r, "a").unwrap();
        submit(&mut r, "b").unwrap();
        submit(&mut r, "para a empresa").unwrap();
        assert_eq!(r.default_visibility, Visibility::Corporate);

        let turn = submit(&mut r, "não, mude o objetivo").unwrap();
        assert!(!turn.advanced);
        assert_eq!(turn.phase, ConversationPhase::Validation);
        assert_eq!(r.conversation_signals.last().unwrap(), "ajuste: não, mude o objetivo");

        let turn = submit(&mut r, "ok").unwrap();
        assert_eq!(turn.phase, ConversationPhase::Done);
    }

    #[test]
    fn blank_or_inactive_input_is_ignored() {
        let mut r = ResponseRecord::default();
        assert!(submit(&mut r, "hello").is_none());
        assert_eq!(r.conversation_phase, ConversationPhase::NotStarted);

        let mut r = started();
        assert!(submit(&mut r, "   ").is_none());
        assert_eq!(r.conversation_phase, ConversationPhase::Goals);
        assert!(r.conversation_signals.is_empty());
    }

    #[test]
    fn visibility_predicate() {
        assert!(prefers_corporate_visibility("CORPORATIVO"));
        assert!(prefers_corporate_visibility("visível para todos"));
        assert!(prefers_corporate_visibility("da empresa"));
        assert!(!prefers_corporate_visibility("só eu"));
    }

    #[test]
    fn affirmative_predicate() {
        assert!(is_affirmative("Sim"));
        assert!(is_affirmative("está correto"));
        assert!(is_affirmative("OK!"));
        assert!(!is_affirmative("não"));
    }

    #[test]
    fn preview_is_char_safe() {
        assert_eq!(preview("ação", 2), "aç...");
        assert_eq!(preview("abc", 3), "abc");
    }

    #[test]
    fn display_matches_serde() {
        use ConversationPhase::*;
        for phase in [NotStarted, Goals, Challenges, Preferences, Validation, Done] {
            let json = serde_json::to_string(&phase).unwrap();
            assert_eq!(format!("\"{phase}\""), json);
        }
    }
}
