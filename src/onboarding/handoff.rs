//! Completion hand-off: the record and the knowledge-graph nodes it would
//! materialize once the wizard finishes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value, json};

use super::model::ResponseRecord;

/// A node to be created in the knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub label: &'static str,
    pub data: Value,
}

/// Everything a persistence collaborator needs after `complete()`.
#[derive(Debug, Clone, Serialize)]
pub struct OnboardingHandoff {
    pub owner_id: String,
    pub completed_at: DateTime<Utc>,
    pub responses: ResponseRecord,
    pub nodes: Vec<GraphNode>,
}

impl OnboardingHandoff {
    pub fn new(owner_id: &str, responses: &ResponseRecord, completed_at: DateTime<Utc>) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            completed_at,
            responses: responses.clone(),
            nodes: node_preview(responses, owner_id, completed_at),
        }
    }
}

/// Merge `extra` object fields over the provenance block.
fn with_base(base: &Map<String, Value>, extra: Value) -> Value {
    let mut data = base.clone();
    if let Value::Object(fields) = extra {
        data.extend(fields);
    }
    Value::Object(data)
}

/// Nodes created from the answers: User, AIProfile, PersonaVersion,
/// Preferences and the raw OnboardingResponses.
pub fn node_preview(responses: &ResponseRecord, owner_id: &str, now: DateTime<Utc>) -> Vec<GraphNode> {
    let now = now.to_rfc3339();
    let owner_id = if owner_id.trim().is_empty() {
        "unknown"
    } else {
        owner_id
    };

    let base = match json!({
        "created_at": now,
        "updated_at": now,
        "source_type": "form",
        "source_ref": "onboarding",
        "owner_id": owner_id,
        "visibility": responses.default_visibility,
        "confidence": 1,
        "expires_at": null,
    }) {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    let mut raw = serde_json::to_value(responses).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to serialize onboarding responses");
        Value::Object(Map::new())
    });
    if let Value::Object(ref mut fields) = raw {
        fields.insert("id".to_string(), json!(format!("onboarding:{owner_id}")));
    }

    vec![
        GraphNode {
            label: "User",
            data: with_base(
                &base,
                json!({
                    "id": format!("user:{owner_id}"),
                    "email": responses.email,
                    "name": responses.full_name,
                }),
            ),
        },
        GraphNode {
            label: "AIProfile",
            data: with_base(
                &base,
                json!({
                    "id": format!("ai_profile:{owner_id}"),
                    "ai_experience_level": responses.ai_experience_level,
                    "technical_path": responses.technical_path,
                    "preferred_language": responses.preferred_language,
                    "needs": responses.needs,
                }),
            ),
        },
        GraphNode {
            label: "PersonaVersion",
            data: with_base(
                &base,
                json!({
                    "id": format!("persona_version:{owner_id}"),
                    "job_role": responses.job_role,
                    "company": responses.company,
                    "department": responses.department,
                }),
            ),
        },
        GraphNode {
            label: "Preferences",
            data: with_base(
                &base,
                json!({
                    "id": format!("preferences:{owner_id}"),
                    "default_visibility": responses.default_visibility,
                }),
            ),
        },
        GraphNode {
            label: "OnboardingResponses",
            data: with_base(&base, raw),
        },
    ]
}
