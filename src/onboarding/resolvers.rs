//! Read-only lookups consulted by the wizard: prefill and org chart.
//!
//! Both speak the backend's `{success, data?, error?}` envelope. Failures
//! surface as `ResolverError` values; callers degrade instead of failing.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::model::ResponsePatch;
use crate::error::ResolverError;

const PREFILL: &str = "prefill";
const ORG_CHART: &str = "org_chart";

/// Response envelope used by the backend for every lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverEnvelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ResolverEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    /// Unwrap the envelope, mapping failures to `ResolverError::Unavailable`.
    pub fn into_result(self, resolver: &str) -> Result<T, ResolverError> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            (true, None) => Err(ResolverError::InvalidResponse {
                resolver: resolver.to_string(),
                reason: "success envelope without data".to_string(),
            }),
            (false, _) => Err(ResolverError::Unavailable {
                resolver: resolver.to_string(),
                reason: self.error.unwrap_or_else(|| "unknown error".to_string()),
            }),
        }
    }
}

/// Directory data known about the signed-in user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrefillData {
    pub name: Option<String>,
    pub email: Option<String>,
    pub company: Option<String>,
    pub department: Option<String>,
    pub job_title: Option<String>,
}

impl PrefillData {
    pub fn into_patch(self) -> ResponsePatch {
        ResponsePatch {
            full_name: self.name,
            email: self.email,
            company: self.company,
            department: self.department,
            job_role: self.job_title,
            ..Default::default()
        }
    }
}

/// `data` of the prefill envelope; `userId` and extra fields are ignored.
#[derive(Debug, Clone, Deserialize)]
struct PrefillPayload {
    prefill: PrefillData,
}

/// One node of the organization chart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrgChartPerson {
    pub id: String,
    pub name: String,
    pub email: String,
    pub company: String,
    pub role: String,
    pub department: String,
}

/// The requesting user's position: manager, peers and direct reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgChart {
    pub user: OrgChartPerson,
    #[serde(default)]
    pub manager: Option<OrgChartPerson>,
    #[serde(default)]
    pub peers: Vec<OrgChartPerson>,
    #[serde(default)]
    pub subordinates: Vec<OrgChartPerson>,
}

#[async_trait]
pub trait PrefillResolver: Send + Sync {
    /// Directory data for the signed-in user, `None` when there is none.
    async fn prefill(&self) -> Result<Option<PrefillData>, ResolverError>;
}

#[async_trait]
pub trait OrgChartResolver: Send + Sync {
    /// Org-chart neighbourhood of the user identified by `key` (an email).
    async fn org_chart(&self, key: &str) -> Result<OrgChart, ResolverError>;
}

/// Resolver backed by the Hub REST API.
pub struct HttpResolver {
    client: reqwest::Client,
    base_url: String,
    token: Option<SecretString>,
}

impl HttpResolver {
    pub fn new(base_url: impl Into<String>, token: Option<SecretString>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn url(&self, resolver: &str, segments: &[&str]) -> Result<reqwest::Url, ResolverError> {
        let invalid = |reason: String| ResolverError::InvalidResponse {
            resolver: resolver.to_string(),
            reason,
        };
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| invalid(format!("bad base URL {:?}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| invalid(format!("base URL {:?} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET `url` and decode the envelope. Non-2xx answers still carry an
    /// envelope (404 "User not found"), so the body is decoded regardless.
    async fn fetch<T: DeserializeOwned>(
        &self,
        resolver: &str,
        url: reqwest::Url,
    ) -> Result<ResolverEnvelope<T>, ResolverError> {
        let mut request = self.client.get(url.clone());
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await.map_err(|e| ResolverError::Transport {
            resolver: resolver.to_string(),
            reason: e.to_string(),
        })?;
        let status = response.status();
        let body = response.text().await.map_err(|e| ResolverError::Transport {
            resolver: resolver.to_string(),
            reason: e.to_string(),
        })?;

        tracing::debug!(resolver, %url, %status, "Resolver responded");

        serde_json::from_str::<ResolverEnvelope<T>>(&body).map_err(|e| {
            if status.is_success() {
                ResolverError::InvalidResponse {
                    resolver: resolver.to_string(),
                    reason: e.to_string(),
                }
            } else {
                ResolverError::Transport {
                    resolver: resolver.to_string(),
                    reason: format!("HTTP {status}"),
                }
            }
        })
    }
}

#[async_trait]
impl PrefillResolver for HttpResolver {
    async fn prefill(&self) -> Result<Option<PrefillData>, ResolverError> {
        let url = self.url(PREFILL, &["api", "onboarding", "prefill"])?;
        let data = self
            .fetch::<PrefillPayload>(PREFILL, url)
            .await?
            .into_result(PREFILL)?
            .prefill;
        Ok((data != PrefillData::default()).then_some(data))
    }
}

#[async_trait]
impl OrgChartResolver for HttpResolver {
    async fn org_chart(&self, key: &str) -> Result<OrgChart, ResolverError> {
        let key = key.trim().to_lowercase();
        let url = self.url(ORG_CHART, &["api", "orgchart", &key])?;
        self.fetch::<OrgChart>(ORG_CHART, url)
            .await?
            .into_result(ORG_CHART)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_envelope_is_unavailable() {
        let env: ResolverEnvelope<OrgChart> =
            serde_json::from_str(r#"{"success": false, "error": "not found"}"#).unwrap();
        let err = env.into_result(ORG_CHART).unwrap_err();
        assert_eq!(
            err,
            ResolverError::Unavailable {
                resolver: "org_chart".into(),
                reason: "not found".into()
            }
        );
    }

    /// Payload types need not implement `Default` to be decoded.
    #[derive(Debug, Deserialize)]
    struct NoDefault {
        id: u32,
    }

    fn decode<T: DeserializeOwned>(json: &str) -> ResolverEnvelope<T> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn envelope_decodes_any_payload() {
        let env: ResolverEnvelope<NoDefault> = decode(r#"{"success": true, "data": {"id": 7}}"#);
        assert_eq!(env.into_result("x").unwrap().id, 7);
        let env: ResolverEnvelope<NoDefault> = decode(r#"{"success": false}"#);
        assert!(env.data.is_none());
        assert!(env.error.is_none());
    }

    #[test]
    fn success_without_data_is_invalid() {
        let env: ResolverEnvelope<OrgChart> = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(matches!(
            env.into_result(ORG_CHART),
            Err(ResolverError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn org_chart_payload_decodes() {
        let json = r#"{
            "success": true,
            "data": {
                "user": {"id": "u1", "name": "Ana", "email": "ana@x.com", "company": "Acme", "role": "Analista", "department": "Processos"},
                "manager": {"id": "u0", "name": "Bia", "email": "bia@x.com", "company": "Acme", "role": "Gerente", "department": ""},
                "peers": [],
                "subordinates": [{"id": "u2", "name": "Caio", "email": "caio@x.com", "company": "Acme", "role": "Estagiário", "department": "Processos"}]
            }
        }"#;
        let env: ResolverEnvelope<OrgChart> = serde_json::from_str(json).unwrap();
        let chart = env.into_result(ORG_CHART).unwrap();
        assert_eq!(chart.user.name, "Ana");
        assert_eq!(chart.manager.unwrap().role, "Gerente");
        assert_eq!(chart.subordinates.len(), 1);
    }

    #[test]
    fn prefill_payload_decodes_with_nulls() {
        let json = r#"{
            "success": true,
            "data": {"userId": "u1", "prefill": {"name": "Ana", "email": "ana@x.com", "company": null, "jobTitle": "Analista", "department": "Processos", "location": "SP"}}
        }"#;
        let env: ResolverEnvelope<PrefillPayload> = serde_json::from_str(json).unwrap();
        let patch = env.into_result(PREFILL).unwrap().prefill.into_patch();
        assert_eq!(patch.full_name.as_deref(), Some("Ana"));
        assert_eq!(patch.job_role.as_deref(), Some("Analista"));
        assert!(patch.company.is_none());
    }

    #[test]
    fn url_escapes_key_segments() {
        let resolver = HttpResolver::new("http://localhost:3001/", None);
        let url = resolver
            .url(ORG_CHART, &["api", "orgchart", "a b@x.com"])
            .unwrap();
        assert_eq!(url.as_str(), "http://localhost:3001/api/orgchart/a%20b@x.com");
    }

    #[test]
    fn url_keeps_base_path() {
        let resolver = HttpResolver::new("http://hub.local/backend", None);
        let url = resolver.url(PREFILL, &["api", "onboarding", "prefill"]).unwrap();
        assert_eq!(url.as_str(), "http://hub.local/backend/api/onboarding/prefill");
    }
}
